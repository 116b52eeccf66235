//! Protocol level errors.
use std::fmt;

use super::backend::{BackendMessage, ErrorResponse};

/// A violation of the message protocol: framing, an unexpected message, or
/// a state the flow does not allow.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("expected {expect} message, found {found}")]
    Unexpected { expect: &'static str, found: &'static str },
    #[error("unexpected {found} message while {phase}")]
    UnexpectedPhase { found: &'static str, phase: &'static str },
    #[error("unknown message type {msgtype:#04x}")]
    Unknown { msgtype: u8 },
    #[error("unknown authentication request subtype {auth}")]
    UnknownAuth { auth: u32 },
    #[error("invalid transaction status {status:#04x} in ReadyForQuery")]
    InvalidTransactionStatus { status: u8 },
    #[error("result column {column:?} uses the text format, binary was requested")]
    NonBinaryFormat { column: String },
    #[error("portal suspended, partial execution is not supported")]
    PortalSuspended,
    #[error("data row carries {values} values, row description has {fields} fields")]
    ColumnCountMismatch { fields: usize, values: usize },
    #[error("{context} is not valid UTF-8")]
    NonUtf8 { context: &'static str },
    #[error("{context} is missing its nul terminator")]
    MissingNul { context: &'static str },
}

impl ProtocolError {
    pub(crate) fn unknown(msgtype: u8) -> ProtocolError {
        Self::Unknown { msgtype }
    }

    pub(crate) fn unexpected(expect: u8, found: u8) -> ProtocolError {
        Self::Unexpected {
            expect: BackendMessage::message_name(expect),
            found: BackendMessage::message_name(found),
        }
    }

    pub(crate) fn unexpected_phase(found: u8, phase: &'static str) -> ProtocolError {
        Self::UnexpectedPhase {
            found: BackendMessage::message_name(found),
            phase,
        }
    }

    pub(crate) fn unknown_auth(auth: u32) -> ProtocolError {
        Self::UnknownAuth { auth }
    }

    pub(crate) fn invalid_transaction_status(status: u8) -> ProtocolError {
        Self::InvalidTransactionStatus { status }
    }

    pub(crate) fn non_utf8(context: &'static str) -> ProtocolError {
        Self::NonUtf8 { context }
    }

    pub(crate) fn missing_nul(context: &'static str) -> ProtocolError {
        Self::MissingNul { context }
    }
}

/// An error reported by the server via `ErrorResponse`.
///
/// Field meanings are documented in
/// <https://www.postgresql.org/docs/current/protocol-error-fields.html>.
#[derive(Debug)]
pub struct DatabaseError {
    /// `S`: ERROR, FATAL, or PANIC, possibly localized.
    pub severity: String,
    /// `C`: the SQLSTATE code.
    pub code: String,
    /// `M`: the primary human-readable message.
    pub message: String,
    /// `D`: secondary message with more detail.
    pub detail: Option<String>,
    /// `H`: suggestion what to do about the problem.
    pub hint: Option<String>,
    /// `P`: cursor position into the original query, counted in characters.
    pub position: Option<String>,
    /// `p`: cursor position into an internally generated command.
    pub internal_position: Option<String>,
    /// `q`: the text of the internally generated command.
    pub internal_query: Option<String>,
    /// `W`: call stack context of the error.
    pub where_context: Option<String>,
    /// `F`: source file reporting the error.
    pub file: Option<String>,
    /// `L`: source line reporting the error.
    pub line: Option<String>,
    /// `R`: source routine reporting the error.
    pub routine: Option<String>,
}

impl From<ErrorResponse> for DatabaseError {
    fn from(err: ErrorResponse) -> Self {
        let owned = |tag: u8| err.field(tag).map(String::from);
        Self {
            severity: owned(b'S').unwrap_or_else(|| "ERROR".into()),
            code: owned(b'C').unwrap_or_else(|| "XX000".into()),
            message: owned(b'M').unwrap_or_default(),
            detail: owned(b'D'),
            hint: owned(b'H'),
            position: owned(b'P'),
            internal_position: owned(b'p'),
            internal_query: owned(b'q'),
            where_context: owned(b'W'),
            file: owned(b'F'),
            line: owned(b'L'),
            routine: owned(b'R'),
        }
    }
}

impl std::error::Error for DatabaseError { }

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.severity, self.code, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {detail}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {hint}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;

    use super::*;
    use crate::postgres::BackendProtocol;

    #[test]
    fn database_error_display() {
        let body = Bytes::from_static(
            b"SERROR\0C42P01\0Mrelation \"nope\" does not exist\0Hcreate it first\0\0",
        );
        let err: DatabaseError = ErrorResponse::decode(b'E', body).unwrap().into();

        assert_eq!(err.code, "42P01");
        assert_eq!(
            err.to_string(),
            "ERROR 42P01: relation \"nope\" does not exist\nHINT: create it first",
        );
    }

    #[test]
    fn database_error_defaults() {
        let err: DatabaseError = ErrorResponse { fields: Vec::new() }.into();
        assert_eq!(err.severity, "ERROR");
        assert_eq!(err.code, "XX000");
    }
}
