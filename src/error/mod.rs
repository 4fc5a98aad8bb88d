//! Centralized error handling for Roam
//! Defines common error types, severity levels, and error codes

use std::fmt;

mod manager;

pub use manager::ErrorManager;

/// Severity level of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational message (not really an error)
    Info,
    /// Warning - something might be wrong but operation can continue
    Warning,
    /// Standard error - operation failed but the browser can continue
    Error,
    /// Critical error - surfaced as an urgent notification
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Category of the error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// Socket, file system or other I/O errors
    Io,
    /// Command line or key name parsing errors
    Parse,
    /// Page protocol faults (malformed frame, id mismatch, timeout)
    Protocol,
    /// Configuration or settings errors
    Config,
    /// Command execution errors
    Execution,
    /// A command needs an extension that is not enabled
    Requirement,
    /// Internal logic or invariant violations
    Internal,
    /// Errors that don't fit other categories
    Other,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "IO"),
            Self::Parse => write!(f, "Parse"),
            Self::Protocol => write!(f, "Protocol"),
            Self::Config => write!(f, "Config"),
            Self::Execution => write!(f, "Execution"),
            Self::Requirement => write!(f, "Requirement"),
            Self::Internal => write!(f, "Internal"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// A structured error in Roam
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoamError {
    /// How serious the error is
    pub severity: ErrorSeverity,
    /// What kind of error occurred
    pub kind: ErrorType,
    /// Machine-readable error code (e.g., "PROTOCOL_ID_MISMATCH")
    pub code: String,
    /// Human-readable description
    pub message: String,
}

impl RoamError {
    /// Create a new standard error (Severity: Error)
    pub fn new(kind: ErrorType, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ErrorSeverity::Error,
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a new critical error (Severity: Critical)
    pub fn critical(kind: ErrorType, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ErrorSeverity::Critical,
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a new warning (Severity: Warning)
    pub fn warning(kind: ErrorType, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ErrorSeverity::Warning,
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a page protocol fault
    pub fn protocol(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorType::Protocol, code, message)
    }

    /// Shorthand for a command execution fault
    pub fn execution(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorType::Execution, code, message)
    }

    /// Check if the message contains a substring (useful for tests)
    pub fn contains_msg(&self, sub: &str) -> bool {
        self.message.contains(sub)
    }
}

impl fmt::Display for RoamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}({}): {}",
            self.severity, self.kind, self.code, self.message
        )
    }
}

impl std::error::Error for RoamError {}

impl From<String> for RoamError {
    fn from(msg: String) -> Self {
        Self::new(ErrorType::Other, "GENERIC_ERROR", msg)
    }
}

impl From<&str> for RoamError {
    fn from(msg: &str) -> Self {
        Self::new(ErrorType::Other, "GENERIC_ERROR", msg)
    }
}

impl From<std::io::Error> for RoamError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorType::Io, "IO_ERROR", err.to_string())
    }
}

impl From<mlua::Error> for RoamError {
    fn from(err: mlua::Error) -> Self {
        Self::new(ErrorType::Config, "LUA_ERROR", err.to_string())
    }
}

/// Result alias for Roam operations
pub type Result<T> = std::result::Result<T, RoamError>;
