//! Postgres Frontend Messages
//!
//! All struct fields here mirror the actual message sent to postgres.
use bytes::{BufMut, BytesMut};

use crate::{
    common::ByteStr,
    encode::Encoded,
    ext::{BufMutExt, StrExt, UsizeExt},
};

use super::PgFormat;

// Frontend messages not produced by this library:
// CancelRequest
// CopyData('d') / CopyDone('c') / CopyFail('f')
// FunctionCall('F')
// GSSENCRequest / SSLRequest
// SASLInitialResponse('p') / SASLResponse('p')
// Query('Q')

/// Write a frontend message to `buf`, framing it as
/// `<msgtype:u8><len:i32><body>`.
pub fn write<F: FrontendProtocol>(msg: F, buf: &mut BytesMut) {
    // msgtype + length
    const PREFIX: usize = 1 + 4;

    let size = msg.size_hint();
    buf.reserve(PREFIX + size as usize);

    let offset = buf.len();
    buf.put_u8(F::MSGTYPE);
    buf.put_i32(4 + size);

    msg.encode(&mut *buf);

    assert_eq!(
        buf.len() - offset,
        PREFIX + size as usize,
        "[BUG] frontend message body not equal to size hint"
    );
}

/// A type which can be encoded into a postgres frontend message.
///
/// For historical reasons, the very first message sent by the client (the
/// startup message) has no initial message-type byte. Thus, [`Startup`] does
/// not implement [`FrontendProtocol`].
pub trait FrontendProtocol {
    /// Message type byte.
    const MSGTYPE: u8;

    /// Size of the message body, excluding the type byte and the length
    /// itself.
    fn size_hint(&self) -> i32;

    /// Write the message body.
    ///
    /// Writing less or more than `size_hint` results in panic.
    fn encode(self, buf: impl BufMut);
}

/// Postgres Startup message.
///
/// The protocol version number is followed by pairs of parameter name and
/// value strings, terminated by one extra zero byte.
#[derive(Debug)]
pub struct Startup<'a> {
    /// The database user name to connect as. Required; there is no default.
    pub user: &'a str,
    /// The database to connect to. Defaults to the user name.
    pub database: Option<&'a str>,
    /// Additional run-time parameters, forwarded verbatim.
    ///
    /// Parameter names beginning with `_pq_.` are reserved for protocol
    /// extensions, others are treated as run-time parameters to be set at
    /// backend start time.
    pub params: &'a [(ByteStr, ByteStr)],
}

impl Startup<'_> {
    /// The most significant 16 bits are the major version number (3), the
    /// least significant 16 bits are the minor version number (0).
    pub const PROTOCOL_VERSION: i32 = 0x0003_0000;

    pub fn write(self, buf: &mut BytesMut) {
        let offset = buf.len();

        // Length of message contents in bytes, including self.
        // Reserved here, backfilled below.
        buf.put_i32(0);

        buf.put_i32(Self::PROTOCOL_VERSION);

        buf.put_nul_string("user");
        buf.put_nul_string(self.user);

        if let Some(db) = self.database {
            buf.put_nul_string("database");
            buf.put_nul_string(db);
        }

        for (name, value) in self.params {
            buf.put_nul_string(name);
            buf.put_nul_string(value);
        }

        // A zero byte is required as a terminator after the last name/value pair.
        buf.put_u8(b'\0');

        let mut written = &mut buf[offset..];
        written.put_i32(written.len().to_i32());
    }
}

/// Identifies the message as a password response.
#[derive(Debug)]
pub struct PasswordMessage<'a> {
    /// The password (encrypted, if requested).
    pub password: &'a str,
}

impl FrontendProtocol for PasswordMessage<'_> {
    const MSGTYPE: u8 = b'p';

    fn size_hint(&self) -> i32 {
        self.password.nul_string_len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.password);
    }
}

/// Identifies the message as a Parse command.
pub struct Parse<'a> {
    /// Prepared statement name (an empty string selects the unnamed
    /// prepared statement).
    pub prepare_name: &'a str,
    /// The query string to be parsed.
    pub sql: &'a str,
    /// Declared parameter types; a zero oid leaves the type unspecified.
    ///
    /// This is not an indication of the number of parameters that might
    /// appear in the query string, only the number the frontend wants to
    /// prespecify types for.
    pub params: &'a [Encoded<'a>],
}

impl FrontendProtocol for Parse<'_> {
    const MSGTYPE: u8 = b'P';

    fn size_hint(&self) -> i32 {
        self.prepare_name.nul_string_len()
            + self.sql.nul_string_len()
            + 2
            + self.params.len().to_i32() * 4
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.prepare_name);
        buf.put_nul_string(self.sql);
        buf.put_i16(self.params.len().to_u16() as i16);
        for param in self.params {
            buf.put_u32(param.oid());
        }
    }
}

/// Identifies the message as a Bind command.
///
/// Parameter format codes follow the per-parameter rule: when every
/// parameter is binary a single code covers them all, otherwise one code is
/// emitted per parameter. Result columns always request a single binary
/// code.
pub struct Bind<'a> {
    /// The name of the destination portal (an empty string selects the
    /// unnamed portal).
    pub portal_name: &'a str,
    /// The name of the source prepared statement (an empty string selects
    /// the unnamed prepared statement).
    pub stmt_name: &'a str,
    /// Bound parameter values, each framed as `i32 len` plus `len` bytes;
    /// `-1` marks NULL with no bytes following.
    pub params: &'a [Encoded<'a>],
}

impl Bind<'_> {
    fn mixed_formats(&self) -> bool {
        self.params.iter().any(|p| p.format() == PgFormat::Text)
    }
}

impl FrontendProtocol for Bind<'_> {
    const MSGTYPE: u8 = b'B';

    fn size_hint(&self) -> i32 {
        let format_codes = match self.mixed_formats() {
            true => self.params.len().to_i32(),
            false => 1,
        };
        self.portal_name.nul_string_len()
            + self.stmt_name.nul_string_len()
            + 2
            + format_codes * 2
            + 2
            + self
                .params
                .iter()
                .fold(0i32, |acc, p| acc + 4 + p.as_slice().len().to_i32())
            + 2
            + 2
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.portal_name);
        buf.put_nul_string(self.stmt_name);

        if self.mixed_formats() {
            buf.put_u16(self.params.len().to_u16());
            for param in self.params {
                buf.put_u16(param.format().format_code());
            }
        } else {
            buf.put_u16(1);
            buf.put_u16(PgFormat::Binary.format_code());
        }

        buf.put_u16(self.params.len().to_u16());
        for param in self.params {
            buf.put_i32(param.size());
            buf.put_slice(param.as_slice());
        }

        // result-column format codes
        buf.put_u16(1);
        buf.put_u16(PgFormat::Binary.format_code());
    }
}

/// Identifies the message as a Describe command.
pub struct Describe<'a> {
    /// `'S'` to describe a prepared statement; or `'P'` to describe a portal.
    pub kind: u8,
    /// The name of the prepared statement or portal to describe (an empty
    /// string selects the unnamed prepared statement or portal).
    pub name: &'a str,
}

impl FrontendProtocol for Describe<'_> {
    const MSGTYPE: u8 = b'D';

    fn size_hint(&self) -> i32 {
        1 + self.name.nul_string_len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u8(self.kind);
        buf.put_nul_string(self.name);
    }
}

/// Identifies the message as an Execute command.
pub struct Execute<'a> {
    /// The name of the portal to execute (an empty string selects the
    /// unnamed portal).
    pub portal_name: &'a str,
    /// Maximum number of rows to return, if portal contains a query that
    /// returns rows (ignored otherwise). Zero denotes "no limit".
    pub max_row: i32,
}

impl FrontendProtocol for Execute<'_> {
    const MSGTYPE: u8 = b'E';

    fn size_hint(&self) -> i32 {
        self.portal_name.nul_string_len() + 4
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.portal_name);
        buf.put_i32(self.max_row);
    }
}

/// Identifies the message as a Close command.
pub struct Close<'a> {
    /// `'S'` to close a prepared statement; or `'P'` to close a portal.
    pub variant: u8,
    /// The name of the prepared statement or portal to close (an empty
    /// string selects the unnamed prepared statement or portal).
    pub name: &'a str,
}

impl FrontendProtocol for Close<'_> {
    const MSGTYPE: u8 = b'C';

    fn size_hint(&self) -> i32 {
        1 + self.name.nul_string_len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u8(self.variant);
        buf.put_nul_string(self.name);
    }
}

/// Identifies the message as a Flush command, forcing the backend to deliver
/// any pending output.
pub struct Flush;

impl FrontendProtocol for Flush {
    const MSGTYPE: u8 = b'H';

    fn size_hint(&self) -> i32 {
        0
    }

    fn encode(self, _: impl BufMut) { }
}

/// Identifies the message as a Sync command, closing the current extended
/// query cycle.
pub struct Sync;

impl FrontendProtocol for Sync {
    const MSGTYPE: u8 = b'S';

    fn size_hint(&self) -> i32 {
        0
    }

    fn encode(self, _: impl BufMut) { }
}

/// Identifies the message as a termination, after which the connection is
/// closed.
pub struct Terminate;

impl FrontendProtocol for Terminate {
    const MSGTYPE: u8 = b'X';

    fn size_hint(&self) -> i32 {
        0
    }

    fn encode(self, _: impl BufMut) { }
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;

    use super::*;
    use crate::encode::Encode;

    fn written<F: FrontendProtocol>(msg: F) -> Vec<u8> {
        let mut buf = BytesMut::new();
        write(msg, &mut buf);
        buf.to_vec()
    }

    #[test]
    fn startup_layout() {
        let mut buf = BytesMut::new();
        Startup { user: "bob", database: Some("app"), params: &[] }.write(&mut buf);

        let expect = [
            &(4 + 4 + 5 + 4 + 9 + 4 + 1_i32).to_be_bytes()[..],
            &0x0003_0000_i32.to_be_bytes(),
            b"user\0bob\0database\0app\0\0",
        ]
        .concat();
        assert_eq!(buf.to_vec(), expect);
    }

    #[test]
    fn startup_forwards_extra_params() {
        let mut buf = BytesMut::new();
        Startup {
            user: "bob",
            database: None,
            params: &[("application_name".into(), "postwire".into())],
        }
        .write(&mut buf);

        let body = &buf[8..];
        assert_eq!(body, b"user\0bob\0application_name\0postwire\0\0");
    }

    #[test]
    fn terminate_is_empty() {
        assert_eq!(written(Terminate), b"X\x00\x00\x00\x04");
    }

    #[test]
    fn execute_unnamed_portal() {
        assert_eq!(
            written(Execute { portal_name: "", max_row: 0 }),
            b"E\x00\x00\x00\x09\x00\x00\x00\x00\x00"
        );
    }

    #[test]
    fn parse_declares_param_oids() {
        let params = [1_i32.encode()];
        let bytes = written(Parse { prepare_name: "s1", sql: "SELECT $1", params: &params });

        let expect = [
            &b"P"[..],
            &(4 + 3 + 10 + 2 + 4_i32).to_be_bytes(),
            b"s1\0SELECT $1\0",
            &1_i16.to_be_bytes(),
            &23_u32.to_be_bytes(),
        ]
        .concat();
        assert_eq!(bytes, expect);
    }

    #[test]
    fn bind_all_binary_uses_one_format_code() {
        let params = [1_i32.encode()];
        let bytes = written(Bind { portal_name: "", stmt_name: "", params: &params });

        let expect = [
            &b"B"[..],
            &(4 + 1 + 1 + 2 + 2 + 2 + 4 + 4 + 2 + 2_i32).to_be_bytes(),
            b"\0\0",
            &1_u16.to_be_bytes(),
            &1_u16.to_be_bytes(),
            &1_u16.to_be_bytes(),
            &4_i32.to_be_bytes(),
            &1_i32.to_be_bytes(),
            &1_u16.to_be_bytes(),
            &1_u16.to_be_bytes(),
        ]
        .concat();
        assert_eq!(bytes, expect);
    }

    #[test]
    fn bind_with_text_param_emits_per_param_codes() {
        let params = ["foo".encode(), 1_i32.encode()];
        let bytes = written(Bind { portal_name: "", stmt_name: "", params: &params });

        let expect = [
            &b"B"[..],
            &(4 + 1 + 1 + 2 + 4 + 2 + 4 + 3 + 4 + 4 + 2 + 2_i32).to_be_bytes(),
            b"\0\0",
            // two format codes: text, binary
            &2_u16.to_be_bytes(),
            &0_u16.to_be_bytes(),
            &1_u16.to_be_bytes(),
            // two params
            &2_u16.to_be_bytes(),
            &3_i32.to_be_bytes(),
            &b"foo"[..],
            &4_i32.to_be_bytes(),
            &1_i32.to_be_bytes(),
            // single binary result format
            &1_u16.to_be_bytes(),
            &1_u16.to_be_bytes(),
        ]
        .concat();
        assert_eq!(bytes, expect);
    }

    #[test]
    fn bind_null_param() {
        let params = [None::<i32>.encode()];
        let bytes = written(Bind { portal_name: "", stmt_name: "", params: &params });

        let expect = [
            &b"B"[..],
            &(4 + 1 + 1 + 2 + 2 + 2 + 4 + 2 + 2_i32).to_be_bytes(),
            b"\0\0",
            &1_u16.to_be_bytes(),
            &1_u16.to_be_bytes(),
            &1_u16.to_be_bytes(),
            &(-1_i32).to_be_bytes(),
            &1_u16.to_be_bytes(),
            &1_u16.to_be_bytes(),
        ]
        .concat();
        assert_eq!(bytes, expect);
    }
}
