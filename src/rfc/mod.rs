//! Remote connection seam.
//!
//! Connector -> Box<dyn Connection> -> Session (closes on drop).
//! The RFC wire protocol itself lives in the SAP NetWeaver RFC SDK; the
//! `nwrfc` feature links it (see `nwrfc.rs`). Without it, `default_connector`
//! returns a connector that refuses to connect.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ConnectionParams;
use crate::{log_debug, log_info};

#[cfg(feature = "nwrfc")]
pub mod nwrfc;
pub mod types;

pub use types::{
    ConnectionAttributes, FieldDescription, FunctionDescription, ParameterDescription,
    TypeDescription,
};
#[cfg(any(test, feature = "nwrfc"))]
pub use types::{Direction, RfcType};

/// Diagnostic fields reported by the RFC library alongside a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: String,
    pub key: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.key.is_empty(), self.message.is_empty()) {
            (false, false) => write!(f, "{} ({}): {}", self.key, self.code, self.message),
            (true, false) => write!(f, "{}: {}", self.code, self.message),
            (false, true) => write!(f, "{} ({})", self.key, self.code),
            (true, true) => f.write_str(&self.code),
        }
    }
}

/// Only `Logon` and `Unsupported` are produced without the `nwrfc` backend.
#[derive(Debug, Error)]
#[cfg_attr(not(feature = "nwrfc"), allow(dead_code))]
pub enum RfcError {
    #[error("Logon failed: {0}")]
    Logon(Diagnostic),

    #[error("Communication failure: {0}")]
    Communication(Diagnostic),

    #[error("ABAP application error: {0}")]
    Application(Diagnostic),

    #[error("ABAP runtime error: {0}")]
    Runtime(Diagnostic),

    #[error("Call cancelled: {0}")]
    Cancelled(Diagnostic),

    #[error("RFC error: {0}")]
    Other(Diagnostic),

    #[error("Invalid value for parameter '{name}': {reason}")]
    Marshal { name: String, reason: String },

    #[error("{0}")]
    Unsupported(String),
}

impl RfcError {
    /// Authentication or network failure (as opposed to a remote-side fault).
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            RfcError::Logon(_) | RfcError::Communication(_) | RfcError::Unsupported(_)
        )
    }
}

/// Thread-safe hook that aborts a call in flight on another thread.
pub trait Cancel: Send + Sync {
    fn cancel(&self);
}

/// One open connection to a remote system. Synchronous, not reentrant.
pub trait Connection {
    fn attributes(&self) -> Result<ConnectionAttributes, RfcError>;

    /// `Ok(None)` when the function module does not exist.
    fn describe(&mut self, function: &str) -> Result<Option<FunctionDescription>, RfcError>;

    /// Call `function` with JSON import values; returns exporting, changing
    /// and table parameters keyed by name.
    fn invoke(
        &mut self,
        function: &str,
        params: &Map<String, Value>,
    ) -> Result<Map<String, Value>, RfcError>;

    fn canceller(&self) -> Option<Arc<dyn Cancel>> {
        None
    }

    /// Release the connection. Must tolerate repeated calls.
    fn close(&mut self);
}

pub trait Connector: Send + Sync {
    fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn Connection>, RfcError>;
}

/// Owns a connection for the duration of one run; closes it when dropped.
pub struct Session {
    conn: Box<dyn Connection>,
    host: String,
}

impl Session {
    pub fn open(connector: &dyn Connector, params: &ConnectionParams) -> Result<Self, RfcError> {
        let conn = connector.connect(params)?;
        Ok(Session {
            conn,
            host: params.ashost.clone(),
        })
    }

    pub fn connection(&mut self) -> &mut dyn Connection {
        self.conn.as_mut()
    }

    pub fn attributes(&self) -> Result<ConnectionAttributes, RfcError> {
        self.conn.attributes()
    }

    pub fn canceller(&self) -> Option<Arc<dyn Cancel>> {
        self.conn.canceller()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        log_debug!("closing connection to {}", self.host);
        self.conn.close();
        log_info!("SAP connection closed");
    }
}

/// Connector used when the binary is built without the RFC SDK.
#[derive(Debug, Default)]
pub struct Unavailable;

impl Connector for Unavailable {
    fn connect(&self, _params: &ConnectionParams) -> Result<Box<dyn Connection>, RfcError> {
        Err(RfcError::Unsupported(
            "this build has no SAP NW RFC SDK support; rebuild with `--features nwrfc`".into(),
        ))
    }
}

pub fn default_connector() -> Box<dyn Connector> {
    #[cfg(feature = "nwrfc")]
    {
        Box::new(nwrfc::NwRfc)
    }
    #[cfg(not(feature = "nwrfc"))]
    {
        Box::new(Unavailable)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory connection used by command-level tests.
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct Probe {
        pub closes: AtomicUsize,
        pub cancelled: AtomicBool,
        pub last_call: Mutex<Option<(String, Map<String, Value>)>>,
    }

    impl Cancel for Probe {
        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Default)]
    pub struct FakeSystem {
        pub probe: Arc<Probe>,
        pub result: Map<String, Value>,
        pub description: Option<FunctionDescription>,
        pub fail_logon: bool,
        pub fail_call: bool,
    }

    struct FakeConnection {
        system: FakeSystem,
        closed: bool,
    }

    fn diag(message: &str) -> Diagnostic {
        Diagnostic {
            code: "RFC_ABAP_EXCEPTION".into(),
            key: "FU_NOT_FOUND".into(),
            message: message.into(),
        }
    }

    impl Connector for FakeSystem {
        fn connect(&self, _params: &ConnectionParams) -> Result<Box<dyn Connection>, RfcError> {
            if self.fail_logon {
                return Err(RfcError::Logon(diag("Name or password is incorrect")));
            }
            Ok(Box::new(FakeConnection {
                system: self.clone(),
                closed: false,
            }))
        }
    }

    impl Connection for FakeConnection {
        fn attributes(&self) -> Result<ConnectionAttributes, RfcError> {
            Ok(ConnectionAttributes {
                sys_id: "NPL".into(),
                ..Default::default()
            })
        }

        fn describe(&mut self, _function: &str) -> Result<Option<FunctionDescription>, RfcError> {
            Ok(self.system.description.clone())
        }

        fn invoke(
            &mut self,
            function: &str,
            params: &Map<String, Value>,
        ) -> Result<Map<String, Value>, RfcError> {
            *self.system.probe.last_call.lock().unwrap() =
                Some((function.to_string(), params.clone()));
            if self.system.fail_call {
                return Err(RfcError::Application(diag("function not found")));
            }
            Ok(self.system.result.clone())
        }

        fn canceller(&self) -> Option<Arc<dyn Cancel>> {
            Some(self.system.probe.clone())
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.system.probe.closes.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeSystem;
    use super::*;
    use std::sync::atomic::Ordering;

    fn params() -> ConnectionParams {
        ConnectionParams::from_flags(crate::config::ConnectionFlags {
            user: "u".into(),
            password: "p".into(),
            target: "h".into(),
            client: "001".into(),
            ..Default::default()
        })
    }

    #[test]
    fn session_closes_once_on_drop() {
        let system = FakeSystem::default();
        {
            let mut session = Session::open(&system, &params()).unwrap();
            let _ = session.connection().invoke("RFC_PING", &Map::new()).unwrap();
        }
        assert_eq!(system.probe.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn session_closes_after_call_error() {
        let system = FakeSystem {
            fail_call: true,
            ..Default::default()
        };
        {
            let mut session = Session::open(&system, &params()).unwrap();
            let err = session.connection().invoke("Z_X", &Map::new()).unwrap_err();
            assert!(!err.is_connection_failure());
        }
        assert_eq!(system.probe.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unavailable_connector_refuses() {
        let err = Session::open(&Unavailable, &params()).err().unwrap();
        assert!(err.is_connection_failure());
        assert!(err.to_string().contains("nwrfc"));
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic {
            code: "RFC_LOGON_FAILURE".into(),
            key: "RFC_ERROR_LOGON_FAILURE".into(),
            message: "Name or password is incorrect".into(),
        };
        assert_eq!(
            d.to_string(),
            "RFC_ERROR_LOGON_FAILURE (RFC_LOGON_FAILURE): Name or password is incorrect"
        );
    }
}
