//! Connection parameters and parameter documents.
//!
//! ConnectionParams::{from_config_file, from_flags}
//! Documents::load -> path-keyed map of parsed JSON/YAML objects
//! capture_list(doc) -> Vec<CaptureSpec>

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::capture::{self, CaptureSpec};

pub const DEFAULT_SYSNR: &str = "00";

/// Keys in this section apply to every other section.
const DEFAULTS_SECTION: &str = "DEFAULT";

/// Values are taken verbatim: no quote stripping, no backslash escapes.
fn literal_values() -> ini::ParseOption {
    ini::ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        enabled_indented_mutiline_value: true,
        ..Default::default()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Error reading configuration {}: {source}", path.display())]
    Ini {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("No connection configurations found in {}", .0.display())]
    NoSections(PathBuf),

    #[error("Destination '{0}' not found in config file")]
    UnknownDestination(String),

    #[error("Invalid connection section [{section}]: {source}")]
    Section {
        section: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Error reading {}: {reason}", path.display())]
    Document { path: PathBuf, reason: String },

    #[error("Error reading {}: expected an object at the top level", .0.display())]
    NotAnObject(PathBuf),

    #[error("Invalid capture list in {}: {reason}", path.display())]
    Capture { path: PathBuf, reason: String },
}

/* ---- Connection Parameters ---- */

/// Logon data for one connection. Field names double as config keys.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionParams {
    pub user: String,
    pub passwd: String,
    pub ashost: String,
    pub client: String,
    #[serde(default = "default_sysnr")]
    pub sysnr: String,
    #[serde(default)]
    pub saprouter: Option<String>,
    #[serde(default)]
    pub dest: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub gwserv: Option<String>,
}

fn default_sysnr() -> String {
    DEFAULT_SYSNR.to_string()
}

/// Explicit connection flags, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConnectionFlags {
    pub user: String,
    pub password: String,
    pub target: String,
    pub client: String,
    pub sysnr: Option<String>,
    pub port: Option<u16>,
    pub saprouter: Option<String>,
}

impl ConnectionParams {
    pub fn from_flags(flags: ConnectionFlags) -> Self {
        ConnectionParams {
            user: flags.user,
            passwd: flags.password,
            ashost: flags.target,
            client: flags.client,
            sysnr: flags.sysnr.unwrap_or_else(default_sysnr),
            saprouter: flags.saprouter,
            dest: None,
            lang: None,
            gwserv: flags.port.map(|p| p.to_string()),
        }
    }

    /// Load the section selected by `dest` (matched against each section's
    /// `dest` key), or the first section when `dest` is `None`.
    pub fn from_config_file(path: &Path, dest: Option<&str>) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }
        let conf = ini::Ini::load_from_file_opt(path, literal_values()).map_err(|source| {
            ConfigError::Ini {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let lowered = |props: &ini::Properties| -> HashMap<String, String> {
            props
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect()
        };
        let defaults: HashMap<String, String> = conf
            .iter()
            .filter(|(name, _)| *name == Some(DEFAULTS_SECTION))
            .flat_map(|(_, props)| lowered(props))
            .collect();
        let sections: Vec<(String, HashMap<String, String>)> = conf
            .iter()
            .filter_map(|(name, props)| {
                let name = name.filter(|n| *n != DEFAULTS_SECTION)?;
                let mut map = defaults.clone();
                map.extend(lowered(props));
                Some((name.to_string(), map))
            })
            .collect();
        select_section(path, sections, dest)
    }

    /// Logon parameters in the order they are handed to the RFC library.
    /// `dest` only selects a config section and is never sent.
    #[cfg_attr(not(feature = "nwrfc"), allow(dead_code))]
    pub fn logon_parameters(&self) -> Vec<(&'static str, &str)> {
        let mut out = vec![
            ("user", self.user.as_str()),
            ("passwd", self.passwd.as_str()),
            ("ashost", self.ashost.as_str()),
            ("sysnr", self.sysnr.as_str()),
            ("client", self.client.as_str()),
        ];
        if let Some(r) = &self.saprouter {
            out.push(("saprouter", r));
        }
        if let Some(l) = &self.lang {
            out.push(("lang", l));
        }
        if let Some(g) = &self.gwserv {
            out.push(("gwserv", g));
        }
        out
    }
}

fn select_section(
    path: &Path,
    sections: Vec<(String, HashMap<String, String>)>,
    dest: Option<&str>,
) -> Result<ConnectionParams, ConfigError> {
    let (name, props) = match dest {
        Some(wanted) => sections
            .into_iter()
            .find(|(_, props)| props.get("dest").map(String::as_str) == Some(wanted))
            .ok_or_else(|| ConfigError::UnknownDestination(wanted.to_string()))?,
        None => sections
            .into_iter()
            .next()
            .ok_or_else(|| ConfigError::NoSections(path.to_path_buf()))?,
    };
    let value = serde_json::to_value(props).map_err(|source| ConfigError::Section {
        section: name.clone(),
        source,
    })?;
    serde_json::from_value(value).map_err(|source| ConfigError::Section {
        section: name,
        source,
    })
}

/* ---- Parameter Documents ---- */

/// Parsed parameter files, loaded once and keyed by the path as given.
#[derive(Debug, Default)]
pub struct Documents {
    by_path: HashMap<PathBuf, Map<String, Value>>,
}

impl Documents {
    pub fn load<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<Self, ConfigError> {
        let mut by_path = HashMap::new();
        for path in paths {
            if by_path.contains_key(path) {
                continue;
            }
            let doc = load_object(path)?;
            by_path.insert(path.to_path_buf(), doc);
        }
        Ok(Documents { by_path })
    }

    pub fn get(&self, path: &Path) -> Option<&Map<String, Value>> {
        self.by_path.get(path)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }
}

/// Read a JSON (or `.yaml`/`.yml`) file that must hold an object.
pub fn load_object(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    let doc_err = |reason: String| ConfigError::Document {
        path: path.to_path_buf(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| doc_err(e.to_string()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    let value: Value = if is_yaml {
        let yaml_v: serde_yaml::Value =
            serde_yaml::from_str(&raw).map_err(|e| doc_err(e.to_string()))?;
        serde_json::to_value(yaml_v).map_err(|e| doc_err(e.to_string()))?
    } else {
        serde_json::from_str(&raw).map_err(|e| doc_err(e.to_string()))?
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::NotAnObject(path.to_path_buf())),
    }
}

/// The `"capture"` array of an export document. Absent means capture all.
pub fn capture_list(path: &Path, doc: &Map<String, Value>) -> Result<Vec<CaptureSpec>, ConfigError> {
    let capture_err = |reason: &str| ConfigError::Capture {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    let Some(entry) = doc.get("capture") else {
        return Ok(Vec::new());
    };
    let items = entry
        .as_array()
        .ok_or_else(|| capture_err("\"capture\" must be an array"))?;
    let names = items
        .iter()
        .map(|v| v.as_str().ok_or_else(|| capture_err("entries must be strings")))
        .collect::<Result<Vec<&str>, _>>()?;
    Ok(capture::parse_capture_list(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    const TWO_SECTIONS: &str = "\
[dev]
dest = DEV
user = alice
passwd = secret1
ashost = dev.example
client = 100

[prod]
dest = PRD
user = bob
passwd = secret2
ashost = prd.example
client = 200
sysnr = 01
saprouter = /H/router/S/3299
";

    #[test]
    fn dest_selects_matching_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "sap.cfg", TWO_SECTIONS);
        let params = ConnectionParams::from_config_file(&path, Some("PRD")).unwrap();
        assert_eq!(params.user, "bob");
        assert_eq!(params.ashost, "prd.example");
        assert_eq!(params.client, "200");
        assert_eq!(params.sysnr, "01");
        assert_eq!(params.saprouter.as_deref(), Some("/H/router/S/3299"));
        assert_eq!(params.dest.as_deref(), Some("PRD"));
    }

    #[test]
    fn first_section_without_dest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "sap.cfg", TWO_SECTIONS);
        let params = ConnectionParams::from_config_file(&path, None).unwrap();
        assert_eq!(params.user, "alice");
        assert_eq!(params.sysnr, DEFAULT_SYSNR);
        assert_eq!(params.saprouter, None);
    }

    #[test]
    fn unknown_destination_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "sap.cfg", TWO_SECTIONS);
        let err = ConnectionParams::from_config_file(&path, Some("QAS")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDestination(ref d) if d == "QAS"));
    }

    #[test]
    fn missing_file_and_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConnectionParams::from_config_file(&dir.path().join("nope.cfg"), None).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigNotFound(_)));

        let empty = write(&dir, "empty.cfg", "; nothing here\n");
        let err = ConnectionParams::from_config_file(&empty, None).unwrap_err();
        assert!(matches!(err, ConfigError::NoSections(_)));
    }

    #[test]
    fn section_keys_are_case_insensitive_and_checked() {
        let dir = tempfile::tempdir().unwrap();
        let ok = write(
            &dir,
            "upper.cfg",
            "[a]\nUSER = u\nPASSWD = p\nASHOST = h\nCLIENT = 001\nLang = EN\n",
        );
        let params = ConnectionParams::from_config_file(&ok, None).unwrap();
        assert_eq!(params.lang.as_deref(), Some("EN"));

        let missing = write(&dir, "missing.cfg", "[a]\nuser = u\nashost = h\nclient = 001\n");
        let err = ConnectionParams::from_config_file(&missing, None).unwrap_err();
        assert!(err.to_string().contains("passwd"), "got: {err}");

        let unknown = write(
            &dir,
            "unknown.cfg",
            "[a]\nuser = u\npasswd = p\nashost = h\nclient = 001\npool = 5\n",
        );
        let err = ConnectionParams::from_config_file(&unknown, None).unwrap_err();
        assert!(matches!(err, ConfigError::Section { .. }));
    }

    #[test]
    fn values_are_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "sap.cfg",
            "[a]\nuser = u\npasswd = \"Pa\\ss;w#rd\"\nashost = h\nclient = 001\nsaprouter = 'C:\\route'\n",
        );
        let params = ConnectionParams::from_config_file(&path, None).unwrap();
        assert_eq!(params.passwd, "\"Pa\\ss;w#rd\"");
        assert_eq!(params.saprouter.as_deref(), Some("'C:\\route'"));
    }

    #[test]
    fn default_section_is_inherited_not_selected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "sap.cfg",
            "[DEFAULT]\nclient = 001\nsysnr = 02\n\n\
             [dev]\ndest = DEV\nuser = u\npasswd = p\nashost = h\n\n\
             [qas]\ndest = QAS\nuser = q\npasswd = p\nashost = hq\nclient = 300\n",
        );
        let first = ConnectionParams::from_config_file(&path, None).unwrap();
        assert_eq!(first.user, "u", "DEFAULT is never the first section");
        assert_eq!(first.client, "001");
        assert_eq!(first.sysnr, "02");

        let qas = ConnectionParams::from_config_file(&path, Some("QAS")).unwrap();
        assert_eq!(qas.client, "300", "section keys override defaults");
        assert_eq!(qas.sysnr, "02");

        let only_defaults = write(&dir, "defaults.cfg", "[DEFAULT]\nclient = 001\n");
        let err = ConnectionParams::from_config_file(&only_defaults, None).unwrap_err();
        assert!(matches!(err, ConfigError::NoSections(_)));
    }

    #[test]
    fn flags_default_sysnr_and_port() {
        let params = ConnectionParams::from_flags(ConnectionFlags {
            user: "u".into(),
            password: "p".into(),
            target: "10.0.0.1".into(),
            client: "001".into(),
            port: Some(3301),
            ..Default::default()
        });
        assert_eq!(params.sysnr, "00");
        let logon = params.logon_parameters();
        assert!(logon.contains(&("ashost", "10.0.0.1")));
        assert!(logon.contains(&("gwserv", "3301")));
        assert!(!logon.iter().any(|(k, _)| *k == "saprouter"));
    }

    #[test]
    fn logon_parameters_never_include_dest() {
        let params = ConnectionParams {
            user: "u".into(),
            passwd: "p".into(),
            ashost: "h".into(),
            client: "001".into(),
            sysnr: "00".into(),
            saprouter: None,
            dest: Some("DEV".into()),
            lang: Some("EN".into()),
            gwserv: None,
        };
        let keys: Vec<&str> = params.logon_parameters().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["user", "passwd", "ashost", "sysnr", "client", "lang"]);
    }

    #[test]
    fn documents_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let j = write(&dir, "in.json", r#"{"QUERY_TABLE": "T000", "ROWCOUNT": 5}"#);
        let y = write(&dir, "out.yaml", "capture:\n  - DATA[WA]\n  - FIELDS\n");
        let docs = Documents::load([j.as_path(), y.as_path(), j.as_path()]).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs.get(&j).unwrap().get("ROWCOUNT"), Some(&json!(5)));

        let specs = capture_list(&y, docs.get(&y).unwrap()).unwrap();
        let keys: Vec<String> = specs.iter().map(|s| s.to_string()).collect();
        assert_eq!(keys, vec!["DATA[WA]", "FIELDS"]);
    }

    #[test]
    fn documents_must_be_objects() {
        let dir = tempfile::tempdir().unwrap();
        let arr = write(&dir, "arr.json", "[1, 2]");
        assert!(matches!(load_object(&arr), Err(ConfigError::NotAnObject(_))));
        let bad = write(&dir, "bad.json", "{not json");
        assert!(matches!(load_object(&bad), Err(ConfigError::Document { .. })));
        let gone = dir.path().join("gone.json");
        assert!(matches!(load_object(&gone), Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn capture_list_shapes() {
        let p = Path::new("export.json");
        let none = json!({"other": 1}).as_object().cloned().unwrap();
        assert!(capture_list(p, &none).unwrap().is_empty());

        let not_array = json!({"capture": "X"}).as_object().cloned().unwrap();
        assert!(capture_list(p, &not_array).is_err());

        let not_strings = json!({"capture": ["X", 3]}).as_object().cloned().unwrap();
        assert!(capture_list(p, &not_strings).is_err());
    }
}
