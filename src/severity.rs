//! Trace severity levels.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Severity of a trace message, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SeverityLevel {
    /// Diagnostic chatter.
    Verbose = 0,
    /// Normal operation.
    #[default]
    Info = 1,
    /// Something unexpected but recoverable.
    Warn = 2,
    /// An operation failed.
    Error = 3,
    /// The process is unlikely to continue correctly.
    Critical = 4,
}

impl SeverityLevel {
    /// Parse a level name, ignoring case and surrounding whitespace.
    ///
    /// Unknown names map to [`SeverityLevel::Info`]; parsing never fails.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "VERBOSE" => Self::Verbose,
            "INFO" => Self::Info,
            "WARN" => Self::Warn,
            "ERROR" => Self::Error,
            "CRITICAL" => Self::Critical,
            _ => Self::Info,
        }
    }

    /// Ordinal value, `0` (verbose) through `4` (critical).
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Upper-case level name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verbose => "VERBOSE",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl FromStr for SeverityLevel {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
