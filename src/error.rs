/*!
 * Error types for rcxfer
 */

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, XferError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_INTEGRITY: i32 = 3;

#[derive(Debug, Error)]
pub enum XferError {
    /// Local file to send does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Decoded package frame does not match the checksum sent on the wire
    #[error("Checksum mismatch: package reports {expected:04X}, found {actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// Expected remote response never arrived
    #[error("Timed out after {waited:?} waiting for {step} ({received} bytes received)")]
    SessionTimeout {
        step: String,
        waited: Duration,
        received: usize,
    },

    /// Transport read/write failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Remote name could not be made 8.3-conformant
    #[error("Invalid remote name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Remote side reports that the requested file does not exist
    #[error("Remote file not found: {0}")]
    RemoteNotFound(String),

    /// Package frame could not be located or decoded
    #[error("Malformed package frame: {0}")]
    MalformedFrame(String),

    /// Transport failed earlier in the batch and can no longer be used
    #[error("Transport unusable: {0}")]
    TransportUnusable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl XferError {
    /// Stable taxonomy name used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            XferError::FileNotFound(_) => "FileNotFound",
            XferError::ChecksumMismatch { .. } => "ChecksumMismatch",
            XferError::SessionTimeout { .. } => "SessionTimeout",
            XferError::Io(_) => "IoError",
            XferError::InvalidName { .. } => "InvalidName",
            XferError::RemoteNotFound(_) => "RemoteNotFound",
            XferError::MalformedFrame(_) => "MalformedFrame",
            XferError::TransportUnusable(_) => "TransportUnusable",
            XferError::Config(_) => "Config",
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            XferError::Config(_) | XferError::TransportUnusable(_) => EXIT_FATAL,
            XferError::ChecksumMismatch { .. } | XferError::MalformedFrame(_) => EXIT_INTEGRITY,
            _ => EXIT_PARTIAL,
        }
    }

    /// Whether the failure leaves the transport unusable for the rest of the batch
    pub fn is_fatal(&self) -> bool {
        match self {
            XferError::TransportUnusable(_) => true,
            XferError::Io(err) => Self::is_io_terminal(err),
            _ => false,
        }
    }

    fn is_io_terminal(err: &io::Error) -> bool {
        use io::ErrorKind::*;
        matches!(
            err.kind(),
            BrokenPipe | ConnectionReset | ConnectionAborted | NotConnected | UnexpectedEof
        )
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            XferError::FileNotFound(_) | XferError::InvalidName { .. } => {
                ErrorCategory::Validation
            }
            XferError::ChecksumMismatch { .. } | XferError::MalformedFrame(_) => {
                ErrorCategory::Integrity
            }
            XferError::SessionTimeout { .. } | XferError::RemoteNotFound(_) => {
                ErrorCategory::Remote
            }
            XferError::Io(_) | XferError::TransportUnusable(_) => ErrorCategory::Transport,
            XferError::Config(_) => ErrorCategory::Configuration,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Local file or name problems
    Validation,
    /// Checksum or framing problems
    Integrity,
    /// Remote side did not respond as expected
    Remote,
    /// Channel read/write failures
    Transport,
    /// Configuration errors
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Integrity => write!(f, "integrity"),
            ErrorCategory::Remote => write!(f, "remote"),
            ErrorCategory::Transport => write!(f, "transport"),
            ErrorCategory::Configuration => write!(f, "configuration"),
        }
    }
}

impl From<toml::de::Error> for XferError {
    fn from(err: toml::de::Error) -> Self {
        XferError::Config(format!("TOML parse error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_display() {
        let err = XferError::ChecksumMismatch {
            expected: 0x1A2B,
            actual: 0x00FF,
        };
        assert_eq!(
            err.to_string(),
            "Checksum mismatch: package reports 1A2B, found 00FF"
        );
    }

    #[test]
    fn test_kinds_follow_taxonomy() {
        assert_eq!(XferError::FileNotFound(PathBuf::from("x")).kind(), "FileNotFound");
        assert_eq!(XferError::Io(io::Error::other("x")).kind(), "IoError");
        assert_eq!(
            XferError::SessionTimeout {
                step: "prompt".into(),
                waited: Duration::from_secs(1),
                received: 0
            }
            .kind(),
            "SessionTimeout"
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(XferError::TransportUnusable("closed".into()).is_fatal());
        assert!(XferError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "gone")).is_fatal());
        assert!(!XferError::Io(io::Error::new(io::ErrorKind::TimedOut, "slow")).is_fatal());
        assert!(!XferError::FileNotFound(PathBuf::from("x")).is_fatal());
        assert!(!XferError::ChecksumMismatch {
            expected: 1,
            actual: 2
        }
        .is_fatal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(XferError::Config("bad".into()).exit_code(), EXIT_FATAL);
        assert_eq!(
            XferError::ChecksumMismatch {
                expected: 1,
                actual: 2
            }
            .exit_code(),
            EXIT_INTEGRITY
        );
        assert_eq!(
            XferError::FileNotFound(PathBuf::from("x")).exit_code(),
            EXIT_PARTIAL
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            XferError::InvalidName {
                name: "x".into(),
                reason: "y".into()
            }
            .category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            XferError::RemoteNotFound("FOO.TXT".into()).category(),
            ErrorCategory::Remote
        );
        assert_eq!(ErrorCategory::Integrity.to_string(), "integrity");
    }
}
