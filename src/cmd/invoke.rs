/*!
`invoke.rs`

The single command of `invokerfm`: resolve connection parameters, open one
RFC connection, then either print a function module's metadata (`--desc`)
or call it and print (optionally captured) results.

Parameter injection:
  --import PATH   JSON/YAML object of call parameters
  --export PATH   JSON/YAML object with a "capture" array:
                    "NAME"          whole top-level parameter
                    "TABLE[FIELD]"  one column of a table parameter

The session runs on a blocking worker thread while the main task listens for
Ctrl-C. An interrupt cancels the call in flight, waits briefly for the worker
to close the connection, and reports `Outcome::Interrupted`.

JSON Success Output (call):
{
  "status": "ok",
  "function": "RFC_READ_TABLE",
  "target": "10.0.0.5",
  "elapsed_ms": 42,
  "captured": true,
  "result": { ... }
}

JSON Error Output:
{
  "status":"error",
  "error":"message"
}
*/

use anyhow::{Context, Result, bail};
use clap::Args;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::capture::{self, CaptureSpec};
use crate::cmd::describe::render_description;
use crate::cmd::format::render_value;
use crate::config::{self, ConnectionFlags, ConnectionParams, Documents};
use crate::rfc::{self, Cancel, Connector, Session};
use crate::{log_debug, log_error, log_info, log_success, log_trace, log_warn};

const HELP_CONNECTION: &str = "Connection Parameters (required if --connection is not specified)";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/* -------------------------------------------------------------------------- */
/* Argument Struct                                                            */
/* -------------------------------------------------------------------------- */

#[derive(Args, Debug, Clone)]
pub struct InvokeArgs {
    /// Path to connection configuration file (INI sections)
    #[arg(long = "connection", value_name = "PATH")]
    pub connection: Option<PathBuf>,

    /// Destination name in the connection config file (matches a section's `dest` key)
    #[arg(long, value_name = "NAME", requires = "connection")]
    pub dest: Option<String>,

    /// SAP username
    #[arg(short = 'u', long, required_unless_present = "connection", help_heading = HELP_CONNECTION)]
    pub user: Option<String>,

    /// SAP password
    #[arg(short = 'p', long, required_unless_present = "connection", help_heading = HELP_CONNECTION)]
    pub password: Option<String>,

    /// SAP hostname or IP
    #[arg(short = 't', long, required_unless_present = "connection", help_heading = HELP_CONNECTION)]
    pub target: Option<String>,

    /// SAP client number
    #[arg(short = 'c', long, required_unless_present = "connection", help_heading = HELP_CONNECTION)]
    pub client: Option<String>,

    /// SAP system number
    #[arg(short = 's', long, default_value = config::DEFAULT_SYSNR, help_heading = HELP_CONNECTION)]
    pub sysnr: String,

    /// SAP gateway port (sent as gwserv only when given; usually 3300 + sysnr)
    #[arg(short = 'P', long, value_name = "PORT", help_heading = HELP_CONNECTION)]
    pub port: Option<u16>,

    /// SAP Router string
    #[arg(short = 'r', long, value_name = "ROUTE")]
    pub saprouter: Option<String>,

    /// Function module name to call
    #[arg(short = 'f', long, value_name = "NAME")]
    pub function: String,

    /// Path to JSON/YAML file containing call parameters
    #[arg(short = 'i', long = "import", value_name = "PATH")]
    pub import_path: Option<PathBuf>,

    /// Path to JSON/YAML file specifying parameters to capture
    #[arg(short = 'e', long = "export", value_name = "PATH")]
    pub export_path: Option<PathBuf>,

    /// Show function module metadata instead of calling it
    #[arg(short = 'd', long)]
    pub desc: bool,

    /// Output JSON (logs go to stderr)
    #[arg(long)]
    pub json: bool,
}

/// How a run ended. Maps onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
    Interrupted,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Failed => 1,
            Outcome::Interrupted => 130,
        }
    }
}

/// Everything the worker needs, resolved before any connection is opened.
#[derive(Debug, Clone)]
struct Request {
    params: ConnectionParams,
    function: String,
    import: Map<String, Value>,
    capture: Vec<CaptureSpec>,
    desc: bool,
    json: bool,
}

/* -------------------------------------------------------------------------- */
/* Public Entry Point                                                         */
/* -------------------------------------------------------------------------- */

pub fn execute_invoke(args: InvokeArgs) -> Outcome {
    execute_with(args, rfc::default_connector())
}

pub fn execute_with(args: InvokeArgs, connector: Box<dyn Connector>) -> Outcome {
    let json = args.json;
    let result = prepare(&args).and_then(|request| run_watched(connector, request));
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            output_error(json, &e);
            Outcome::Failed
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Preparation                                                                */
/* -------------------------------------------------------------------------- */

fn prepare(args: &InvokeArgs) -> Result<Request> {
    let function = args.function.trim().to_string();
    if function.is_empty() {
        bail!("function module name cannot be empty");
    }

    let paths: Vec<&Path> = [args.import_path.as_deref(), args.export_path.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    let docs = Documents::load(paths)?;
    log_debug!("loaded {} parameter file(s)", docs.len());

    let import = args
        .import_path
        .as_deref()
        .and_then(|p| docs.get(p))
        .cloned()
        .unwrap_or_default();

    let capture = match args.export_path.as_deref() {
        Some(p) => match docs.get(p) {
            Some(doc) => config::capture_list(p, doc)?,
            None => Vec::new(),
        },
        None => Vec::new(),
    };

    Ok(Request {
        params: connection_params(args)?,
        function,
        import,
        capture,
        desc: args.desc,
        json: args.json,
    })
}

fn connection_params(args: &InvokeArgs) -> Result<ConnectionParams> {
    if let Some(path) = &args.connection {
        let mut params = ConnectionParams::from_config_file(path, args.dest.as_deref())?;
        if params.saprouter.is_none() {
            params.saprouter = args.saprouter.clone();
        }
        return Ok(params);
    }

    let (Some(user), Some(password), Some(target), Some(client)) = (
        args.user.clone(),
        args.password.clone(),
        args.target.clone(),
        args.client.clone(),
    ) else {
        bail!(
            "When --connection is not specified, --user, --password, --target, and --client are required"
        );
    };
    Ok(ConnectionParams::from_flags(ConnectionFlags {
        user,
        password,
        target,
        client,
        sysnr: Some(args.sysnr.clone()),
        port: args.port,
        saprouter: args.saprouter.clone(),
    }))
}

/* -------------------------------------------------------------------------- */
/* Worker + Interrupt Handling                                                */
/* -------------------------------------------------------------------------- */

fn run_watched(connector: Box<dyn Connector>, request: Request) -> Result<Outcome> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    let json = request.json;
    let outcome: Result<Outcome> = rt.block_on(async move {
        let watch = Arc::new(Interrupt::default());
        let worker_watch = watch.clone();
        let mut worker = tokio::task::spawn_blocking(move || {
            run_session(connector.as_ref(), &request, &worker_watch)
        });

        let signal = tokio::select! {
            joined = &mut worker => return joined.context("session worker panicked")?,
            signal = tokio::signal::ctrl_c() => signal,
        };
        if let Err(e) = signal {
            log_debug!("Ctrl-C handler unavailable: {e}");
            return worker.await.context("session worker panicked")?;
        }

        if !json {
            println!();
        }
        log_warn!("Operation interrupted by user");
        watch.trigger();
        // the worker's Session drop closes the connection
        if tokio::time::timeout(SHUTDOWN_GRACE, worker).await.is_err() {
            log_debug!("worker did not finish within {:?}", SHUTDOWN_GRACE);
        }
        Ok::<_, anyhow::Error>(Outcome::Interrupted)
    });

    rt.shutdown_timeout(SHUTDOWN_GRACE);
    outcome
}

/// Shared between the signal listener and the session worker.
#[derive(Default)]
struct Interrupt {
    raised: AtomicBool,
    cancel: OnceLock<Arc<dyn Cancel>>,
}

impl Interrupt {
    /// Mark the run interrupted, then abort any call in flight.
    fn trigger(&self) {
        self.raised.store(true, Ordering::SeqCst);
        if let Some(cancel) = self.cancel.get() {
            cancel.cancel();
        }
    }

    fn raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Register the connection's canceller. Fires it at once if the
    /// interrupt arrived while connecting.
    fn arm(&self, cancel: Arc<dyn Cancel>) {
        if self.cancel.set(cancel).is_ok() && self.raised() {
            if let Some(cancel) = self.cancel.get() {
                cancel.cancel();
            }
        }
    }
}

fn run_session(connector: &dyn Connector, req: &Request, watch: &Interrupt) -> Result<Outcome> {
    log_info!(
        "Connecting to SAP system {} (sys: {}, client: {})...",
        req.params.ashost,
        req.params.sysnr,
        req.params.client
    );
    let mut session = Session::open(connector, &req.params).context("Connection error")?;
    if let Some(cancel) = session.canceller() {
        watch.arm(cancel);
    }
    if watch.raised() {
        return Ok(Outcome::Interrupted);
    }

    let sys_id = match session.attributes() {
        Ok(attrs) if !attrs.sys_id.is_empty() => attrs.sys_id,
        Ok(_) => "Unknown".to_string(),
        Err(e) => {
            log_debug!("connection attributes unavailable: {e}");
            "Unknown".to_string()
        }
    };
    log_success!("Connected to SAP system: {sys_id}");

    if watch.raised() {
        return Ok(Outcome::Interrupted);
    }
    if req.desc {
        describe_function(&mut session, req)
    } else {
        call_function(&mut session, req)
    }
}

/* -------------------------------------------------------------------------- */
/* Operations                                                                 */
/* -------------------------------------------------------------------------- */

fn describe_function(session: &mut Session, req: &Request) -> Result<Outcome> {
    log_info!("Getting function description for: {}", req.function);
    let desc = session
        .connection()
        .describe(&req.function)
        .context("RFC error retrieving function description")?;
    let Some(desc) = desc else {
        bail!("Could not retrieve description for function {}", req.function);
    };

    if req.json {
        let out = serde_json::json!({
            "status": "ok",
            "function": req.function,
            "target": req.params.ashost,
            "description": desc,
        });
        println!("{}", pretty(&out));
    } else {
        log_success!("Parameters of function: {}", req.function);
        println!("{}", render_description(&desc));
    }
    Ok(Outcome::Success)
}

/// What one call returned, after projection.
struct CallReport {
    elapsed_ms: u128,
    filtered: bool,
    returned_nothing: bool,
    result: Map<String, Value>,
}

impl CallReport {
    fn to_json(&self, req: &Request) -> Value {
        serde_json::json!({
            "status": "ok",
            "function": req.function,
            "target": req.params.ashost,
            "elapsed_ms": self.elapsed_ms,
            "captured": self.filtered,
            "result": self.result,
        })
    }
}

fn invoke_projected(session: &mut Session, req: &Request) -> Result<CallReport> {
    log_info!("Invoking function module '{}'...", req.function);
    log_trace!("import parameters: {}", Value::Object(req.import.clone()));
    let started = Instant::now();
    let raw = session
        .connection()
        .invoke(&req.function, &req.import)
        .map_err(|e| {
            let stage = if e.is_connection_failure() {
                "Connection error"
            } else {
                "Function execution error"
            };
            anyhow::Error::new(e).context(stage)
        })?;
    let elapsed_ms = started.elapsed().as_millis();
    log_success!("Function module '{}' called successfully", req.function);

    Ok(CallReport {
        elapsed_ms,
        filtered: !req.capture.is_empty(),
        returned_nothing: raw.is_empty(),
        result: capture::project(&raw, &req.capture),
    })
}

fn call_function(session: &mut Session, req: &Request) -> Result<Outcome> {
    let report = invoke_projected(session, req)?;

    if req.json {
        println!("{}", pretty(&report.to_json(req)));
    } else if report.returned_nothing {
        log_info!("Function returned no data");
    } else {
        if report.filtered {
            log_info!("Function returned the following requested data:");
        } else {
            log_info!("Function returned the following data:");
        }
        let body = render_results(&report.result);
        if !body.is_empty() {
            println!("{body}");
        }
    }
    Ok(Outcome::Success)
}

/* -------------------------------------------------------------------------- */
/* Output Helpers                                                             */
/* -------------------------------------------------------------------------- */

/// `  KEY: VALUE` per entry, containers as indented JSON.
fn render_results(results: &Map<String, Value>) -> String {
    results
        .iter()
        .map(|(k, v)| format!("  {k}: {}", render_value(v)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn pretty(v: &Value) -> String {
    serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
}

fn output_error(json: bool, err: &anyhow::Error) {
    let msg = format!("{err:#}");
    if json {
        let out = serde_json::json!({"status": "error", "error": msg});
        println!("{}", pretty(&out));
    } else {
        log_error!("{msg}");
    }
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                      */
/* -------------------------------------------------------------------------- */
