//! Shared configuration for hosts embedding the switchyard dispatcher.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, then a
//! configuration file, then `SWITCHYARD_*` environment variables, then command
//! line flags. The dispatcher itself only reads the resolved [`Config`]; it
//! never loads configuration on its own.

mod defaults;
mod logging;

use std::ffi::OsString;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_SUPPRESS_CANCELLED_RESPONSES, default_log_filter,
    default_log_filter_string, default_log_format, default_suppress_cancelled_responses,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SWITCHYARD")]
pub struct Config {
    /// `tracing` filter expression applied by the telemetry subscriber.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Output format for log lines.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Withhold responses for requests that were cancelled by the client.
    #[serde(default = "defaults::default_suppress_cancelled_responses")]
    pub suppress_cancelled_responses: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            suppress_cancelled_responses: default_suppress_cancelled_responses(),
        }
    }
}

impl Config {
    /// Returns the configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns whether cancelled requests should go unanswered.
    #[must_use]
    pub const fn suppress_cancelled_responses(&self) -> bool {
        self.suppress_cancelled_responses
    }

    /// Loads configuration from the supplied command line, the environment and
    /// any configuration file they reference.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when any layer fails to parse.
    pub fn load_layered<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::load_from_iter(args).map_err(|error| ConfigError::Load {
            message: error.to_string(),
        })
    }
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more configuration layers failed to load.
    #[error("failed to load configuration: {message}")]
    Load {
        /// Rendered loader error.
        message: String,
    },
}
