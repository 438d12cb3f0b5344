//! Output format of the host's diagnostic log.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How lifecycle events and forwarded child output are rendered on stderr.
///
/// Parsed case-insensitively from `SIDECAR_LOG_FORMAT` or `--log-format`.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event with fields flattened to the top level.
    #[default]
    Json,
    /// Single-line text, coloured when stderr is a terminal.
    Compact,
}

impl LogFormat {
    /// Whether events are emitted as machine-readable records.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Rejection of an unknown `log_format` value.
pub type LogFormatParseError = strum::ParseError;
