use crate::config::{LogFormat, LogSpanEvents};

/// The default value for `log-format`.
pub const DEFAULT_LOG_FORMAT: LogFormat = LogFormat::Pretty;

/// The default value for `log-span-events`.
pub const DEFAULT_LOG_SPAN_EVENTS: LogSpanEvents = LogSpanEvents::Off;

/// The default value for `log-filter`.
pub const DEFAULT_LOG_FILTER: &str = "yarrp=debug";

/// The log filter used without `verbose`.
pub const QUIET_LOG_FILTER: &str = "warn";

/// The default value for `verbose`.
pub const DEFAULT_VERBOSE: bool = false;

/// The default value for `sequential`.
pub const DEFAULT_SEQUENTIAL: bool = false;

/// The default value for `coarse`.
pub const DEFAULT_COARSE: bool = false;

/// The default value for `testing`.
pub const DEFAULT_TESTING: bool = false;

/// The default value for `entire`.
pub const DEFAULT_ENTIRE: bool = false;

/// The output path which writes records to stdout.
pub const STDOUT_OUTPUT: &str = "-";
