//! The crate's own error type: an opaque `Error` wrapping a private
//! variant enum, in the shape `object-rewrite`'s `error.rs` uses rather
//! than a `thiserror`-derived enum, since the set of producible errors
//! is small and fixed.

use std::{error, fmt, io};

use crate::types::source::SourcePos;

/// An error produced anywhere in the compilation pipeline.
#[derive(Debug)]
pub struct Error {
    inner: ErrorInner,
}

#[derive(Debug)]
enum ErrorInner {
    Io(io::Error),
    /// An I/O-class failure with no underlying [`io::Error`] (include
    /// nesting overflow, a malformed `#include` line): still reported to
    /// the driver as an I/O error per spec.md §7, not a semantic one.
    IoMsg(String),
    /// A diagnostic raised by the preprocessor, parser, or semantic
    /// analyser, anchored at a source position.
    Semantic { pos: SourcePos, message: String },
    /// A condition the compiler asserts can never arise from valid
    /// input (an internal-consistency failure, not a diagnostic).
    Internal(String),
}

/// The kind of error, for callers that want to branch on it without
/// matching the private representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Semantic,
    Internal,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            ErrorInner::Io(e) => e.fmt(f),
            ErrorInner::IoMsg(message) => f.write_str(message),
            ErrorInner::Semantic { pos, message } => write!(f, "{pos}: {message}"),
            ErrorInner::Internal(message) => write!(f, "internal error: {message}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.inner {
            ErrorInner::Io(e) => Some(e),
            ErrorInner::IoMsg(_) | ErrorInner::Semantic { .. } | ErrorInner::Internal(_) => None,
        }
    }
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match &self.inner {
            ErrorInner::Io(_) | ErrorInner::IoMsg(_) => ErrorKind::Io,
            ErrorInner::Semantic { .. } => ErrorKind::Semantic,
            ErrorInner::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The source position this error is anchored at, if any.
    #[must_use]
    pub fn pos(&self) -> Option<SourcePos> {
        match &self.inner {
            ErrorInner::Semantic { pos, .. } => Some(*pos),
            ErrorInner::Io(_) | ErrorInner::Internal(_) => None,
        }
    }

    /// The bare diagnostic text, without the leading `<pos>: ` that
    /// [`Display`](fmt::Display) prepends — what a caller re-rendering
    /// through [`crate::diagnostic::render`] wants, since that function
    /// prints its own position.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match &self.inner {
            ErrorInner::Semantic { message, .. } => Some(message),
            ErrorInner::Io(_) | ErrorInner::IoMsg(_) | ErrorInner::Internal(_) => None,
        }
    }

    pub(crate) fn semantic(pos: SourcePos, message: impl Into<String>) -> Self {
        Error { inner: ErrorInner::Semantic { pos, message: message.into() } }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Error { inner: ErrorInner::Internal(message.into()) }
    }

    pub(crate) fn io_msg(message: impl Into<String>) -> Self {
        Error { inner: ErrorInner::IoMsg(message.into()) }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error { inner: ErrorInner::Io(e) }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::source::FileId;

    #[test]
    fn semantic_error_formats_position_and_message() {
        let pos = SourcePos::new(FileId(0), 3, 5);
        let err = Error::semantic(pos, "invalid left operand to do binary operation");
        assert_eq!(err.to_string(), "0:3:5: invalid left operand to do binary operation");
        assert_eq!(err.kind(), ErrorKind::Semantic);
        assert_eq!(err.message(), Some("invalid left operand to do binary operation"));
        assert_eq!(err.pos(), Some(pos));
    }

    #[test]
    fn io_error_wraps_and_reports_its_kind() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing file");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
