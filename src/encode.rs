//! Parameter encoding.
//!
//! Most values are sent in the binary format; text and json travel as text
//! (format code 0), which the server parses itself. The chosen format rides
//! along in [`Encoded`] and ends up in the `Bind` format code list.
use bytes::Bytes;

use crate::{
    postgres::{Oid, PgFormat, PgType, oid},
    types::{self, PgInterval, PgTimeTz},
    value::ValueRef,
};

/// Value that can be encoded to be bound to an sql parameter.
pub trait Encode<'q> {
    fn encode(self) -> Encoded<'q>;
}

/// A postgres encoded parameter value.
#[derive(Debug)]
pub struct Encoded<'q> {
    value: ValueRef<'q>,
    oid: Oid,
    format: PgFormat,
    is_null: bool,
}

impl<'q> Encoded<'q> {
    /// A binary-format value.
    pub(crate) fn binary(value: impl Into<ValueRef<'q>>, oid: Oid) -> Self {
        Self { value: value.into(), oid, format: PgFormat::Binary, is_null: false }
    }

    /// A text-format value; the bytes must be UTF-8.
    pub(crate) fn text(value: impl Into<ValueRef<'q>>, oid: Oid) -> Self {
        Self { value: value.into(), oid, format: PgFormat::Text, is_null: false }
    }

    /// NULL with a declared type; oid zero leaves the type to the server.
    pub(crate) fn null(oid: Oid) -> Self {
        Self { value: ValueRef::Slice(&[]), oid, format: PgFormat::Binary, is_null: true }
    }

    /// Declared parameter oid, sent with `Parse`.
    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// Format this value travels in.
    pub fn format(&self) -> PgFormat {
        self.format
    }

    pub fn is_null(&self) -> bool {
        self.is_null
    }

    /// Value length for the `Bind` framing, `-1` when NULL.
    pub(crate) fn size(&self) -> i32 {
        match self.is_null {
            true => -1,
            false => self.value.len().try_into().expect("parameter too large for protocol"),
        }
    }

    /// Raw value bytes, empty when NULL.
    pub(crate) fn as_slice(&self) -> &[u8] {
        self.value.as_slice()
    }
}

macro_rules! encode_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl Encode<'static> for $ty {
            fn encode(self) -> Encoded<'static> {
                Encoded::binary(ValueRef::inline(&self.to_be_bytes()), <$ty>::OID)
            }
        }
    )*};
}

encode_scalar!(i16, i32, i64, f32, f64);

impl Encode<'static> for bool {
    fn encode(self) -> Encoded<'static> {
        Encoded::binary(ValueRef::inline(&[self as u8]), bool::OID)
    }
}

impl<'q> Encode<'q> for &'q str {
    fn encode(self) -> Encoded<'q> {
        Encoded::text(self, oid::TEXT)
    }
}

impl<'q> Encode<'q> for &'q String {
    fn encode(self) -> Encoded<'q> {
        Encoded::text(self.as_str(), oid::TEXT)
    }
}

impl Encode<'static> for String {
    fn encode(self) -> Encoded<'static> {
        Encoded::text(self, oid::TEXT)
    }
}

impl<'q> Encode<'q> for &'q [u8] {
    fn encode(self) -> Encoded<'q> {
        Encoded::binary(self, oid::BYTEA)
    }
}

impl Encode<'static> for Vec<u8> {
    fn encode(self) -> Encoded<'static> {
        Encoded::binary(self, oid::BYTEA)
    }
}

impl Encode<'static> for Bytes {
    fn encode(self) -> Encoded<'static> {
        Encoded::binary(self, oid::BYTEA)
    }
}

impl Encode<'static> for time::Date {
    /// `i32` days since 2000-01-01.
    fn encode(self) -> Encoded<'static> {
        Encoded::binary(ValueRef::inline(&types::days_from_date(self).to_be_bytes()), Self::OID)
    }
}

impl Encode<'static> for time::Time {
    /// `i64` microseconds since midnight.
    fn encode(self) -> Encoded<'static> {
        Encoded::binary(ValueRef::inline(&types::micros_from_time(self).to_be_bytes()), Self::OID)
    }
}

impl Encode<'static> for time::PrimitiveDateTime {
    /// `i64` microseconds since 2000-01-01 00:00:00.
    fn encode(self) -> Encoded<'static> {
        Encoded::binary(
            ValueRef::inline(&types::micros_from_timestamp(self).to_be_bytes()),
            Self::OID,
        )
    }
}

impl Encode<'static> for time::OffsetDateTime {
    /// `i64` microseconds since 2000-01-01 00:00:00 UTC.
    fn encode(self) -> Encoded<'static> {
        let utc = self.to_offset(time::UtcOffset::UTC);
        let primitive = time::PrimitiveDateTime::new(utc.date(), utc.time());
        Encoded::binary(
            ValueRef::inline(&types::micros_from_timestamp(primitive).to_be_bytes()),
            Self::OID,
        )
    }
}

impl Encode<'static> for uuid::Uuid {
    fn encode(self) -> Encoded<'static> {
        Encoded::binary(Bytes::copy_from_slice(self.as_bytes()), Self::OID)
    }
}

impl Encode<'static> for PgInterval {
    fn encode(self) -> Encoded<'static> {
        let mut buf = [0u8; 16];
        buf[..8].copy_from_slice(&self.microseconds.to_be_bytes());
        buf[8..12].copy_from_slice(&self.days.to_be_bytes());
        buf[12..].copy_from_slice(&self.months.to_be_bytes());
        Encoded::binary(Bytes::copy_from_slice(&buf), oid::INTERVAL)
    }
}

impl Encode<'static> for PgTimeTz {
    fn encode(self) -> Encoded<'static> {
        let mut buf = [0u8; 12];
        buf[..8].copy_from_slice(&types::micros_from_time(self.time).to_be_bytes());
        buf[8..].copy_from_slice(&self.offset_seconds.to_be_bytes());
        Encoded::binary(Bytes::copy_from_slice(&buf), oid::TIMETZ)
    }
}

impl<'q, T: Encode<'q>> Encode<'q> for Option<T> {
    fn encode(self) -> Encoded<'q> {
        match self {
            Some(value) => value.encode(),
            None => Encoded::null(0),
        }
    }
}

impl Encode<'static> for () {
    /// NULL of unspecified type.
    fn encode(self) -> Encoded<'static> {
        Encoded::null(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scalars_are_network_order() {
        let e = 0x0102_0304_i32.encode();
        assert_eq!(e.as_slice(), [1, 2, 3, 4]);
        assert_eq!(e.oid(), oid::INT4);
        assert_eq!(e.format(), PgFormat::Binary);
        assert_eq!(e.size(), 4);

        assert_eq!(true.encode().as_slice(), [1]);
        assert_eq!(1.5_f64.encode().as_slice(), 1.5_f64.to_be_bytes());
    }

    #[test]
    fn text_values_use_text_format() {
        let e = "héllo".encode();
        assert_eq!(e.format(), PgFormat::Text);
        assert_eq!(e.oid(), oid::TEXT);
        assert_eq!(e.as_slice(), "héllo".as_bytes());
    }

    #[test]
    fn null_has_negative_size() {
        let e = None::<i32>.encode();
        assert!(e.is_null());
        assert_eq!(e.size(), -1);
        assert_eq!(e.as_slice(), b"");
    }

    #[test]
    fn date_counts_days_from_epoch() {
        use time::macros::date;

        assert_eq!(date!(2000 - 01 - 01).encode().as_slice(), 0_i32.to_be_bytes());
        assert_eq!(date!(2000 - 02 - 01).encode().as_slice(), 31_i32.to_be_bytes());
        assert_eq!(date!(1999 - 12 - 31).encode().as_slice(), (-1_i32).to_be_bytes());
    }

    #[test]
    fn interval_keeps_all_components() {
        let e = PgInterval { microseconds: 5, days: 3, months: 14 }.encode();
        let expect = [
            &5_i64.to_be_bytes()[..],
            &3_i32.to_be_bytes(),
            &14_i32.to_be_bytes(),
        ]
        .concat();
        assert_eq!(e.as_slice(), expect);
    }
}
