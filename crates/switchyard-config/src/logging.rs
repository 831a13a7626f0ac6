//! Log output format selection.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the dispatcher's telemetry subscriber renders log lines.
///
/// Parsed case-insensitively from configuration files, `SWITCHYARD_LOG_FORMAT`
/// and `--log-format`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, fields flattened.
    #[default]
    Json,
    /// Compact text lines for interactive use.
    Compact,
}

impl LogFormat {
    /// Returns true for machine-readable output.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Parse failure for [`LogFormat`].
pub type LogFormatParseError = strum::ParseError;
