//! Buffer extension traits shared by the message codecs.
use bytes::{Buf, BufMut, Bytes};

use crate::common::ByteStr;

/// Length conversions between rust `usize` and the sizes the protocol wants.
pub(crate) trait UsizeExt {
    /// Convert to `i32`, panicking on overflow instead of wrapping.
    fn to_i32(self) -> i32;
    /// Convert to `u16`, panicking on overflow instead of wrapping.
    fn to_u16(self) -> u16;
}

impl UsizeExt for usize {
    fn to_i32(self) -> i32 {
        self.try_into().expect("message size too large for protocol")
    }

    fn to_u16(self) -> u16 {
        self.try_into().expect("message size too large for protocol")
    }
}

/// Nul string operation.
pub(crate) trait StrExt {
    /// String length plus nul (1).
    fn nul_string_len(&self) -> i32;
}

impl StrExt for str {
    fn nul_string_len(&self) -> i32 {
        self.len().to_i32() + 1
    }
}

/// Nul string operation in [`BufMut`].
pub(crate) trait BufMutExt {
    /// Write string and nul termination.
    fn put_nul_string(&mut self, string: &str);
}

impl<B: BufMut> BufMutExt for B {
    fn put_nul_string(&mut self, string: &str) {
        self.put(string.as_bytes());
        self.put_u8(b'\0');
    }
}

/// Nul string operation in [`Bytes`].
pub(crate) trait BytesExt {
    /// Read a nul terminated UTF-8 string, consuming the terminator.
    ///
    /// Returns `None` when no terminator is present in the remaining bytes,
    /// `Some(Err)` on invalid UTF-8.
    fn get_nul_bytestr(&mut self) -> Option<Result<ByteStr, std::str::Utf8Error>>;
}

impl BytesExt for Bytes {
    fn get_nul_bytestr(&mut self) -> Option<Result<ByteStr, std::str::Utf8Error>> {
        let end = self.iter().position(|e| matches!(e, b'\0'))?;
        let body = self.split_to(end);
        self.advance(1);
        Some(ByteStr::from_utf8(body))
    }
}

/// Helper trait to display bytes that are mostly, but not reliably, text.
pub(crate) trait FmtExt {
    fn lossy(&self) -> LossyFmt<'_>;
}

impl FmtExt for [u8] {
    fn lossy(&self) -> LossyFmt<'_> {
        LossyFmt(self)
    }
}

pub(crate) struct LossyFmt<'a>(pub &'a [u8]);

impl std::fmt::Display for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in self.0 {
            if b.is_ascii_graphic() || b.is_ascii_whitespace() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn nul_string_round_trip() {
        let mut buf = BytesMut::new();
        buf.put_nul_string("server_encoding");
        buf.put_nul_string("UTF8");

        let mut bytes = buf.freeze();
        let name = bytes.get_nul_bytestr().unwrap().unwrap();
        let value = bytes.get_nul_bytestr().unwrap().unwrap();

        assert_eq!(name, "server_encoding");
        assert_eq!(value, "UTF8");
        assert!(bytes.is_empty());
        assert!(bytes.get_nul_bytestr().is_none());
    }

    #[test]
    fn nul_string_len_counts_terminator() {
        assert_eq!("user".nul_string_len(), 5);
        assert_eq!("".nul_string_len(), 1);
    }
}
