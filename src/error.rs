//! `postwire` error types.
use std::{backtrace::Backtrace, fmt, io, str::Utf8Error};

use crate::{
    connection::ParseError,
    decode::DecodeError,
    fetch::EmptyQueryError,
    phase::{PasswordRequired, UnsupportedAuth},
    postgres::{DatabaseError, ProtocolError},
    query::{RowNotFound, TooManyRows},
};

/// A specialized [`Result`] type for `postwire` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from the `postwire` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// The server error, when that is what this is.
    pub fn as_database_error(&self) -> Option<&DatabaseError> {
        match &self.kind {
            ErrorKind::Database(e) => Some(e),
            _ => None,
        }
    }
}

/// All possible error kind from the `postwire` library.
pub enum ErrorKind {
    /// Configuration could not be parsed.
    Config(ParseError),
    /// The byte stream violated the message protocol.
    Protocol(ProtocolError),
    /// The underlying stream failed.
    Io(io::Error),
    /// The server reported an error.
    Database(DatabaseError),
    /// A received value could not be decoded into the requested target.
    Decode(DecodeError),
    /// A string from the server was not UTF-8.
    Utf8(Utf8Error),
    /// `fetch_one` received no rows.
    RowNotFound(RowNotFound),
    /// `fetch_one` received more than one row.
    TooManyRows(TooManyRows),
    /// The query string was empty.
    EmptyQuery(EmptyQueryError),
    /// The server requested an authentication method this library does not
    /// speak.
    UnsupportedAuth(UnsupportedAuth),
    /// The server challenged for a password but none was configured.
    PasswordRequired(PasswordRequired),
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ParseError>e => ErrorKind::Config(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<io::Error>e => ErrorKind::Io(e));
from!(<DatabaseError>e => ErrorKind::Database(e));
from!(<DecodeError>e => ErrorKind::Decode(e));
from!(<Utf8Error>e => ErrorKind::Utf8(e));
from!(<RowNotFound>e => ErrorKind::RowNotFound(e));
from!(<TooManyRows>e => ErrorKind::TooManyRows(e));
from!(<EmptyQueryError>e => ErrorKind::EmptyQuery(e));
from!(<UnsupportedAuth>e => ErrorKind::UnsupportedAuth(e));
from!(<PasswordRequired>e => ErrorKind::PasswordRequired(e));

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => e.fmt(f),
            Self::Protocol(e) => e.fmt(f),
            Self::Io(e) => e.fmt(f),
            Self::Database(e) => e.fmt(f),
            Self::Decode(e) => e.fmt(f),
            Self::Utf8(e) => e.fmt(f),
            Self::RowNotFound(e) => e.fmt(f),
            Self::TooManyRows(e) => e.fmt(f),
            Self::EmptyQuery(e) => e.fmt(f),
            Self::UnsupportedAuth(e) => e.fmt(f),
            Self::PasswordRequired(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
