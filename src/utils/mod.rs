//! Utilities: status-line logging with a process-wide dynamic level.
//!
//! Key items:
//!   init_logging / derive_level
//!   logging::{error, warn, info, success, debug, trace}
//!   log_* macros

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Logging helpers.
pub mod logging {
    use super::*;
    use crate::cmd::format::{Role, StyleOptions, color};

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
    pub enum LogLevel {
        Error = 0,
        Warn = 1,
        Info = 2,
        Debug = 3,
        Trace = 4,
    }

    impl LogLevel {
        pub fn as_str(&self) -> &'static str {
            match self {
                LogLevel::Error => "ERROR",
                LogLevel::Warn => "WARN",
                LogLevel::Info => "INFO",
                LogLevel::Debug => "DEBUG",
                LogLevel::Trace => "TRACE",
            }
        }
    }

    /// Kind of status line. Several kinds share a level (success is info).
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub enum Status {
        Info,
        Success,
        Warning,
        Error,
        Debug,
        Trace,
    }

    impl Status {
        pub fn level(self) -> LogLevel {
            match self {
                Status::Info | Status::Success => LogLevel::Info,
                Status::Warning => LogLevel::Warn,
                Status::Error => LogLevel::Error,
                Status::Debug => LogLevel::Debug,
                Status::Trace => LogLevel::Trace,
            }
        }

        pub fn prefix(self) -> &'static str {
            match self {
                Status::Info => "[*]",
                Status::Success => "[+]",
                Status::Warning => "[!]",
                Status::Error => "[-]",
                Status::Debug | Status::Trace => "[~]",
            }
        }

        fn role(self) -> Role {
            match self {
                Status::Info => Role::Primary,
                Status::Success => Role::Success,
                Status::Warning => Role::Warning,
                Status::Error => Role::Error,
                Status::Debug | Status::Trace => Role::Dim,
            }
        }
    }

    static GLOBAL_LEVEL: OnceLock<AtomicU8> = OnceLock::new();
    static TO_STDERR: AtomicBool = AtomicBool::new(false);

    fn inner_cell() -> &'static AtomicU8 {
        GLOBAL_LEVEL.get_or_init(|| AtomicU8::new(LogLevel::Info as u8))
    }

    /// Set the level; `to_stderr` keeps stdout clean for machine output.
    pub fn init_logging(level: LogLevel, to_stderr: bool) {
        set_log_level(level);
        TO_STDERR.store(to_stderr, Ordering::Relaxed);
    }

    pub fn set_log_level(level: LogLevel) {
        inner_cell().store(level as u8, Ordering::Relaxed);
    }

    pub fn current_log_level() -> LogLevel {
        match inner_cell().load(Ordering::Relaxed) {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    pub fn derive_level(verbose: u8, quiet: bool) -> LogLevel {
        if quiet {
            return LogLevel::Error;
        }
        match verbose {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn should_emit(level: LogLevel) -> bool {
        level <= current_log_level()
    }

    /// Render a status line without emitting it.
    pub fn format_line(status: Status, msg: &str, style: &StyleOptions) -> String {
        color(status.role(), format!("{} {}", status.prefix(), msg), style)
    }

    pub fn log(status: Status, msg: impl AsRef<str>) {
        if !should_emit(status.level()) {
            return;
        }
        let line = format_line(status, msg.as_ref(), &StyleOptions::detect());
        if TO_STDERR.load(Ordering::Relaxed) {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    pub fn error(msg: impl AsRef<str>) {
        log(Status::Error, msg);
    }
    pub fn warn(msg: impl AsRef<str>) {
        log(Status::Warning, msg);
    }
    pub fn info(msg: impl AsRef<str>) {
        log(Status::Info, msg);
    }
    pub fn success(msg: impl AsRef<str>) {
        log(Status::Success, msg);
    }
    pub fn debug(msg: impl AsRef<str>) {
        log(Status::Debug, msg);
    }
    pub fn trace(msg: impl AsRef<str>) {
        log(Status::Trace, msg);
    }

    #[macro_export]
    macro_rules! log_error {
        ($($t:tt)*) => { $crate::utils::logging::error(format!($($t)*)) };
    }
    #[macro_export]
    macro_rules! log_warn {
        ($($t:tt)*) => { $crate::utils::logging::warn(format!($($t)*)) };
    }
    #[macro_export]
    macro_rules! log_info {
        ($($t:tt)*) => { $crate::utils::logging::info(format!($($t)*)) };
    }
    #[macro_export]
    macro_rules! log_success {
        ($($t:tt)*) => { $crate::utils::logging::success(format!($($t)*)) };
    }
    #[macro_export]
    macro_rules! log_debug {
        ($($t:tt)*) => { $crate::utils::logging::debug(format!($($t)*)) };
    }
    #[macro_export]
    macro_rules! log_trace {
        ($($t:tt)*) => { $crate::utils::logging::trace(format!($($t)*)) };
    }
}

pub use logging::{derive_level, init_logging};

#[cfg(test)]
mod tests {
    use super::logging::*;
    use crate::cmd::format::StyleOptions;

    #[test]
    fn derive_level_from_flags() {
        assert_eq!(derive_level(0, false), LogLevel::Info);
        assert_eq!(derive_level(1, false), LogLevel::Debug);
        assert_eq!(derive_level(5, false), LogLevel::Trace);
        assert_eq!(derive_level(2, true), LogLevel::Error, "quiet wins");
    }

    #[test]
    fn status_prefixes() {
        let style = StyleOptions::plain();
        assert_eq!(format_line(Status::Info, "hi", &style), "[*] hi");
        assert_eq!(format_line(Status::Success, "ok", &style), "[+] ok");
        assert_eq!(format_line(Status::Warning, "hm", &style), "[!] hm");
        assert_eq!(format_line(Status::Error, "no", &style), "[-] no");
    }

    #[test]
    fn success_shares_info_level() {
        assert_eq!(Status::Success.level(), LogLevel::Info);
        assert!(Status::Warning.level() < Status::Info.level());
    }
}
