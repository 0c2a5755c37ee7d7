//! Error taxonomy shared by every zplane crate.

use crate::model::RootKind;
use std::io;
use thiserror::Error;

/// Result type for zplane operations
pub type Result<T> = std::result::Result<T, ZplaneError>;

/// Errors raised by the filter model, the deriver, the synthesizer and the
/// file formats.
///
/// Every variant is recoverable: a failed operation leaves the model, the
/// history and the streaming state exactly as they were.
#[derive(Error, Debug)]
pub enum ZplaneError {
    /// A zero/pole index that does not exist in the model
    #[error("{kind} index {index} out of range (model has {len})")]
    IndexOutOfRange {
        kind: RootKind,
        index: usize,
        len: usize,
    },

    /// A scalar argument outside its accepted domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Classical synthesis constraints violated (order, cutoff, ripple)
    #[error("Filter design failed: {0}")]
    FilterDesign(String),

    /// Saved filter file does not follow the three-line layout
    #[error("Malformed filter file at line {line}: {reason}")]
    MalformedFilterFile { line: usize, reason: String },

    /// Bulk signal table could not be parsed
    #[error("Malformed signal table at line {line}: {reason}")]
    MalformedSignal { line: usize, reason: String },

    /// Writing an export artifact (or reading an input file) failed
    #[error("Export I/O failed: {0}")]
    ExportIo(#[from] io::Error),

    /// A streaming transition requested from a state that forbids it
    #[error("Cannot {action} a stream that is {state}")]
    StreamState {
        state: &'static str,
        action: &'static str,
    },
}

impl ZplaneError {
    /// Whether the caller can surface the message and keep going.
    ///
    /// Nothing in the core is fatal to the process.
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Check if this error came from the file system
    pub fn is_io(&self) -> bool {
        matches!(self, ZplaneError::ExportIo(_))
    }

    pub(crate) fn design(reason: impl Into<String>) -> Self {
        ZplaneError::FilterDesign(reason.into())
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ZplaneError::InvalidParameter(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let e = ZplaneError::IndexOutOfRange {
            kind: RootKind::Pole,
            index: 3,
            len: 2,
        };
        assert_eq!(e.to_string(), "pole index 3 out of range (model has 2)");

        let e = ZplaneError::MalformedFilterFile {
            line: 1,
            reason: "missing header".into(),
        };
        assert!(e.to_string().contains("line 1"));
    }

    #[test]
    fn io_errors_convert() {
        let io = io::Error::new(io::ErrorKind::PermissionDenied, "read-only");
        let e: ZplaneError = io.into();
        assert!(e.is_io());
        assert!(e.is_recoverable());
    }
}
