//! Shared types for mcdash
//!
//! This crate contains the log record model and its wire payload encoding,
//! used by the tail engine, the HTTP surface and the command line client.

mod buffer;

pub use buffer::{RecordBuffer, SeverityCounts};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Severity
// ============================================================================

/// Severity of a delivered record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    #[default]
    Info,
    Warn,
    Error,
    /// Status or error notice generated by the engine, not file content
    System,
    /// Payload that could not be decoded on the consuming side
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::System => "SYSTEM",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse a wire level name. Anything unrecognised maps to `Unknown`.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "INFO" => Self::Info,
            "WARN" => Self::Warn,
            "ERROR" => Self::Error,
            "SYSTEM" => Self::System,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Level Filter
// ============================================================================

/// Level requested by a subscriber, fixed when the subscription opens
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LevelFilter {
    #[default]
    Info,
    Warn,
    Error,
    All,
}

impl LevelFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::All => "ALL",
        }
    }

    /// The severity marker a line must carry to pass this filter
    ///
    /// `All` has no single marker; any of the three passes.
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            Self::Info => Some(INFO_MARKER),
            Self::Warn => Some(WARN_MARKER),
            Self::Error => Some(ERROR_MARKER),
            Self::All => None,
        }
    }
}

impl fmt::Display for LevelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected `level` value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized log level '{0}', expected one of INFO, WARN, ERROR, ALL")]
pub struct ParseLevelFilterError(pub String);

impl FromStr for LevelFilter {
    type Err = ParseLevelFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(Self::Info),
            "WARN" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            "ALL" => Ok(Self::All),
            _ => Err(ParseLevelFilterError(s.to_string())),
        }
    }
}

/// Severity markers as written by the server's logger
pub const INFO_MARKER: &str = "/INFO]";
pub const WARN_MARKER: &str = "/WARN]";
pub const ERROR_MARKER: &str = "/ERROR]";

// ============================================================================
// Log Records
// ============================================================================

/// A single delivered record (transient, never stored by the engine)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    pub severity: Severity,
    pub text: String,
}

/// JSON shape of a classified record on the wire
#[derive(Serialize, Deserialize)]
struct WireRecord {
    level: String,
    content: String,
}

impl LogRecord {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }

    /// Create an engine notice
    ///
    /// Line breaks are flattened so the notice always fits one `data:` line.
    pub fn system(text: impl Into<String>) -> Self {
        let text: String = text.into();
        let text = if text.contains(['\r', '\n']) {
            text.replace("\r\n", " ").replace(['\r', '\n'], " ")
        } else {
            text
        };
        Self {
            severity: Severity::System,
            text,
        }
    }

    pub fn is_system(&self) -> bool {
        self.severity == Severity::System
    }

    /// Encode the record as an event payload
    ///
    /// Classified records become `{"level":..,"content":..}`; notices are sent
    /// as bare text.
    pub fn payload(&self) -> String {
        match self.severity {
            Severity::System => self.text.clone(),
            severity => {
                let wire = WireRecord {
                    level: severity.as_str().to_string(),
                    content: self.text.clone(),
                };
                // A struct of two strings always serializes
                serde_json::to_string(&wire).unwrap_or_default()
            }
        }
    }

    /// Decode an event payload back into a record
    ///
    /// JSON that does not carry a known level is kept as `Unknown` rather
    /// than dropped. Non-JSON payloads are engine notices.
    pub fn from_payload(payload: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(value) => match serde_json::from_value::<WireRecord>(value) {
                Ok(wire) => {
                    let severity = match Severity::from_wire(&wire.level) {
                        Severity::System => Severity::Unknown,
                        severity => severity,
                    };
                    Self::new(severity, wire.content)
                }
                Err(_) => Self::new(Severity::Unknown, payload),
            },
            Err(_) => Self::new(Severity::System, payload),
        }
    }
}

/// One unit pushed to a subscriber's transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamUnit {
    Record(LogRecord),
    /// Keep-alive comment; carries no severity
    Heartbeat,
}

impl From<LogRecord> for StreamUnit {
    fn from(record: LogRecord) -> Self {
        Self::Record(record)
    }
}
