//! Postgres Backend Messages
use bytes::{Buf, Bytes};

use super::ProtocolError;
use crate::{common::ByteStr, ext::BytesExt};

/// A type that can be decoded from a postgres backend message.
pub trait BackendProtocol: Sized {
    fn decode(msgtype: u8, body: Bytes) -> Result<Self, ProtocolError>;
}

/// Postgres backend messages.
#[derive(Debug)]
pub enum BackendMessage {
    Authentication(Authentication),
    BackendKeyData(BackendKeyData),
    BindComplete(BindComplete),
    CloseComplete(CloseComplete),
    CommandComplete(CommandComplete),
    DataRow(DataRow),
    EmptyQueryResponse(EmptyQueryResponse),
    ErrorResponse(ErrorResponse),
    NoData(NoData),
    NoticeResponse(NoticeResponse),
    ParameterStatus(ParameterStatus),
    ParseComplete(ParseComplete),
    PortalSuspended(PortalSuspended),
    ReadyForQuery(ReadyForQuery),
    RowDescription(RowDescription),
}

macro_rules! match_backend {
    ($($name:ident,)*) => {
        impl BackendMessage {
            pub fn msgtype(&self) -> u8 {
                match self {
                    $(Self::$name(_) => $name::MSGTYPE,)*
                }
            }

            /// Get message name from message type.
            ///
            /// Returns `"Unknown"` for unknown message type.
            pub fn message_name(msgtype: u8) -> &'static str {
                match msgtype {
                    $($name::MSGTYPE => stringify!($name),)*
                    _ => "Unknown",
                }
            }
        }

        impl BackendProtocol for BackendMessage {
            fn decode(msgtype: u8, body: Bytes) -> Result<Self, ProtocolError> {
                let message = match msgtype {
                    $($name::MSGTYPE => Self::$name(<$name as BackendProtocol>::decode(msgtype, body)?),)*
                    _ => return Err(ProtocolError::unknown(msgtype)),
                };
                Ok(message)
            }
        }
    };
}

match_backend! {
    Authentication,
    BackendKeyData,
    BindComplete,
    CloseComplete,
    CommandComplete,
    DataRow,
    EmptyQueryResponse,
    ErrorResponse,
    NoData,
    NoticeResponse,
    ParameterStatus,
    ParseComplete,
    PortalSuspended,
    ReadyForQuery,
    RowDescription,
}

impl BackendMessage {
    /// A [`ProtocolError`] naming this message and the phase it interrupted.
    pub(crate) fn unexpected(&self, phase: &'static str) -> ProtocolError {
        ProtocolError::unexpected_phase(self.msgtype(), phase)
    }
}

macro_rules! assert_msgtype {
    ($typ:ident) => {
        if Self::MSGTYPE != $typ {
            return Err(ProtocolError::unexpected(Self::MSGTYPE, $typ));
        }
    };
}

/// Identifies the message as an authentication request.
#[derive(Debug)]
pub enum Authentication {
    /// Specifies that the authentication was successful.
    Ok,
    /// Specifies that Kerberos V5 authentication is required.
    KerberosV5,
    /// Specifies that a clear-text password is required.
    CleartextPassword,
    /// Specifies that an MD5-encrypted password is required.
    MD5Password {
        /// The salt to use when encrypting the password.
        salt: [u8; 4],
    },
    /// Specifies that GSSAPI authentication is required.
    GSS,
    /// GSSAPI or SSPI authentication data.
    GSSContinue { data: Bytes },
    /// Specifies that SSPI authentication is required.
    SSPI,
    /// Specifies that SASL authentication is required.
    ///
    /// The body lists SASL mechanism names in the server's order of
    /// preference, each nul terminated.
    SASL { mechanisms: Bytes },
    /// Specifies that this message contains a SASL challenge.
    SASLContinue { data: Bytes },
    /// Specifies that SASL authentication has completed.
    SASLFinal { data: Bytes },
}

impl Authentication {
    pub const MSGTYPE: u8 = b'R';

    /// Short name of the requested method, for diagnostics.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Ok => "trust",
            Self::KerberosV5 => "kerberos",
            Self::CleartextPassword => "password",
            Self::MD5Password { .. } => "md5",
            Self::GSS | Self::GSSContinue { .. } => "gss",
            Self::SSPI => "sspi",
            Self::SASL { .. } | Self::SASLContinue { .. } | Self::SASLFinal { .. } => "sasl",
        }
    }
}

impl BackendProtocol for Authentication {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        let auth = match body.get_u32() {
            0 => Authentication::Ok,
            2 => Authentication::KerberosV5,
            3 => Authentication::CleartextPassword,
            5 => Authentication::MD5Password { salt: body.get_u32().to_be_bytes() },
            7 => Authentication::GSS,
            8 => Authentication::GSSContinue { data: body },
            9 => Authentication::SSPI,
            10 => Authentication::SASL { mechanisms: body },
            11 => Authentication::SASLContinue { data: body },
            12 => Authentication::SASLFinal { data: body },
            auth => return Err(ProtocolError::unknown_auth(auth)),
        };
        Ok(auth)
    }
}

/// Identifies the message as cancellation key data.
///
/// The frontend must save these values if it wishes to be able to issue
/// CancelRequest messages later.
#[derive(Clone, Debug)]
pub struct BackendKeyData {
    /// The process ID of this backend.
    pub process_id: u32,
    /// The secret key of this backend.
    pub secret_key: u32,
}

impl BackendKeyData {
    pub const MSGTYPE: u8 = b'K';
}

impl BackendProtocol for BackendKeyData {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self {
            process_id: body.get_u32(),
            secret_key: body.get_u32(),
        })
    }
}

/// Identifies the message as a run-time parameter status report.
#[derive(Debug)]
pub struct ParameterStatus {
    /// The name of the run-time parameter being reported.
    pub name: String,
    /// The current value of the parameter.
    pub value: String,
}

impl ParameterStatus {
    pub const MSGTYPE: u8 = b'S';
}

impl BackendProtocol for ParameterStatus {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        let name = get_nul_string(&mut body, "ParameterStatus name")?;
        let value = get_nul_string(&mut body, "ParameterStatus value")?;
        Ok(Self { name: name.as_str().into(), value: value.as_str().into() })
    }
}

/// A warning message. The frontend should display the message.
///
/// The body shares the field layout of [`ErrorResponse`].
#[derive(Debug)]
pub struct NoticeResponse {
    pub fields: Vec<(u8, ByteStr)>,
}

impl NoticeResponse {
    pub const MSGTYPE: u8 = b'N';

    /// The notice text, or an empty string on a malformed notice.
    pub fn message(&self) -> &str {
        self.fields
            .iter()
            .find_map(|(tag, value)| (*tag == b'M').then_some(value.as_str()))
            .unwrap_or_default()
    }
}

impl BackendProtocol for NoticeResponse {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self { fields: get_fields(&mut body, "NoticeResponse")? })
    }
}

/// Identifies the message as an error.
///
/// The message body consists of one or more identified fields, followed by
/// a zero byte as a terminator. Fields can appear in any order. Since more
/// field types might be added in future, frontends should silently ignore
/// fields of unrecognized type.
#[derive(Debug)]
pub struct ErrorResponse {
    pub fields: Vec<(u8, ByteStr)>,
}

impl ErrorResponse {
    pub const MSGTYPE: u8 = b'E';

    /// Look a field up by its type byte.
    pub fn field(&self, tag: u8) -> Option<&str> {
        self.fields
            .iter()
            .find_map(|(t, value)| (*t == tag).then_some(value.as_str()))
    }
}

impl BackendProtocol for ErrorResponse {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self { fields: get_fields(&mut body, "ErrorResponse")? })
    }
}

fn get_fields(body: &mut Bytes, context: &'static str) -> Result<Vec<(u8, ByteStr)>, ProtocolError> {
    let mut fields = Vec::new();
    loop {
        if !body.has_remaining() {
            break;
        }
        let tag = body.get_u8();
        if tag == b'\0' {
            break;
        }
        fields.push((tag, get_nul_string(body, context)?));
    }
    Ok(fields)
}

fn get_nul_string(body: &mut Bytes, context: &'static str) -> Result<ByteStr, ProtocolError> {
    match body.get_nul_bytestr() {
        Some(Ok(ok)) => Ok(ok),
        Some(Err(_)) => Err(ProtocolError::non_utf8(context)),
        None => Err(ProtocolError::missing_nul(context)),
    }
}

/// Identifies the message as a row description.
///
/// The per-field layout is parsed lazily, see
/// [`FieldDescription`][crate::row::FieldDescription].
#[derive(Debug)]
pub struct RowDescription {
    /// Specifies the number of fields in a row (can be zero).
    pub field_len: u16,
    /// Undecoded field descriptions.
    pub body: Bytes,
}

impl RowDescription {
    pub const MSGTYPE: u8 = b'T';
}

impl BackendProtocol for RowDescription {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self { field_len: body.get_u16(), body })
    }
}

/// Identifies the message as a data row.
#[derive(Debug)]
pub struct DataRow {
    /// The number of column values that follow (possibly zero).
    pub column_len: u16,
    /// Undecoded column values, each `i32` length (-1 for NULL) plus bytes.
    pub body: Bytes,
}

impl DataRow {
    pub const MSGTYPE: u8 = b'D';
}

impl BackendProtocol for DataRow {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self { column_len: body.get_u16(), body })
    }
}

/// Identifies the message as a command-completed response.
///
/// For an INSERT command, the tag is `INSERT oid rows`; for DELETE, UPDATE,
/// MERGE, SELECT, MOVE, FETCH, and COPY it is the command word followed by
/// the row count.
#[derive(Debug)]
pub struct CommandComplete {
    /// The command tag. This is usually a single word that identifies which
    /// SQL command was completed.
    pub tag: ByteStr,
}

impl CommandComplete {
    pub const MSGTYPE: u8 = b'C';
}

impl BackendProtocol for CommandComplete {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self { tag: get_nul_string(&mut body, "CommandComplete tag")? })
    }
}

/// Current backend transaction status, as reported by [`ReadyForQuery`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Idle, not in a transaction block.
    Idle,
    /// In a transaction block.
    InTransaction,
    /// In a failed transaction block; queries will be rejected until the
    /// block is ended.
    Failed,
}

impl TransactionStatus {
    pub(crate) fn from_status(status: u8) -> Result<Self, ProtocolError> {
        match status {
            b'I' => Ok(Self::Idle),
            b'T' => Ok(Self::InTransaction),
            b'E' => Ok(Self::Failed),
            _ => Err(ProtocolError::invalid_transaction_status(status)),
        }
    }
}

/// ReadyForQuery is sent whenever the backend is ready for a new query
/// cycle.
#[derive(Debug)]
pub struct ReadyForQuery {
    pub status: TransactionStatus,
}

impl ReadyForQuery {
    pub const MSGTYPE: u8 = b'Z';
}

impl BackendProtocol for ReadyForQuery {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self { status: TransactionStatus::from_status(body.get_u8())? })
    }
}

macro_rules! unit_msg {
    ($(
        $(#[$doc:meta])* struct $name:ident, $ty:literal;
    )*) => {$(
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name;

        impl $name {
            pub const MSGTYPE: u8 = $ty;
        }

        impl BackendProtocol for $name {
            fn decode(msgtype: u8, _: Bytes) -> Result<Self, ProtocolError> {
                assert_msgtype!(msgtype);
                Ok(Self)
            }
        }
    )*};
}

unit_msg! {
    /// Identifies the message as a Parse-complete indicator.
    struct ParseComplete, b'1';

    /// Identifies the message as a Bind-complete indicator.
    struct BindComplete, b'2';

    /// Identifies the message as a Close-complete indicator.
    struct CloseComplete, b'3';

    /// Identifies the message as a response to an empty query string.
    ///
    /// This substitutes for CommandComplete.
    struct EmptyQueryResponse, b'I';

    /// Identifies the message as a no-data indicator.
    struct NoData, b'n';

    /// Identifies the message as a portal-suspended indicator.
    ///
    /// Note this only appears if an Execute message's row-count limit was
    /// reached.
    struct PortalSuspended, b's';
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ready_for_query_status() {
        let rfq = ReadyForQuery::decode(b'Z', Bytes::from_static(b"I")).unwrap();
        assert_eq!(rfq.status, TransactionStatus::Idle);

        let rfq = ReadyForQuery::decode(b'Z', Bytes::from_static(b"E")).unwrap();
        assert_eq!(rfq.status, TransactionStatus::Failed);

        ReadyForQuery::decode(b'Z', Bytes::from_static(b"x")).unwrap_err();
    }

    #[test]
    fn error_response_fields() {
        let body = Bytes::from_static(b"SERROR\0C42P01\0Mrelation does not exist\0\0");
        let err = ErrorResponse::decode(b'E', body).unwrap();

        assert_eq!(err.field(b'S'), Some("ERROR"));
        assert_eq!(err.field(b'C'), Some("42P01"));
        assert_eq!(err.field(b'M'), Some("relation does not exist"));
        assert_eq!(err.field(b'H'), None);
    }

    #[test]
    fn backend_message_dispatch() {
        let msg = BackendMessage::decode(b'1', Bytes::new()).unwrap();
        assert!(matches!(msg, BackendMessage::ParseComplete(_)));
        assert_eq!(msg.msgtype(), b'1');

        BackendMessage::decode(b'~', Bytes::new()).unwrap_err();
        assert_eq!(BackendMessage::message_name(b'Z'), "ReadyForQuery");
        assert_eq!(BackendMessage::message_name(b'~'), "Unknown");
    }

    #[test]
    fn parameter_status_pair() {
        let body = Bytes::from_static(b"TimeZone\0UTC\0");
        let status = ParameterStatus::decode(b'S', body).unwrap();
        assert_eq!(status.name, "TimeZone");
        assert_eq!(status.value, "UTC");
    }

    #[test]
    fn command_complete_tag() {
        let cmd = CommandComplete::decode(b'C', Bytes::from_static(b"INSERT 0 1\0")).unwrap();
        assert_eq!(cmd.tag, "INSERT 0 1");
    }

    #[test]
    fn authentication_subtypes() {
        let auth = Authentication::decode(b'R', Bytes::from_static(b"\x00\x00\x00\x00")).unwrap();
        assert!(matches!(auth, Authentication::Ok));

        let auth = Authentication::decode(b'R', Bytes::from_static(b"\x00\x00\x00\x03")).unwrap();
        assert!(matches!(auth, Authentication::CleartextPassword));

        let auth =
            Authentication::decode(b'R', Bytes::from_static(b"\x00\x00\x00\x05abcd")).unwrap();
        assert!(matches!(auth, Authentication::MD5Password { salt: [b'a', b'b', b'c', b'd'] }));
    }
}
