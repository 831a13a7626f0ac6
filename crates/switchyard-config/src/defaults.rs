use crate::logging::LogFormat;

/// Default log filter expression used by hosts embedding the dispatcher.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Whether responses for cancelled requests are withheld by default.
pub const DEFAULT_SUPPRESS_CANCELLED_RESPONSES: bool = true;

/// Default log filter expression.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default cancelled-response policy.
#[must_use]
pub fn default_suppress_cancelled_responses() -> bool {
    DEFAULT_SUPPRESS_CANCELLED_RESPONSES
}
