//! Binary result decoding.
//!
//! Decoding is driven by the received `(oid, bytes)` pair, the connection's
//! [`TypeRegistry`], and the caller's target type. Targets implement
//! [`Decode`]; the dynamic [`Value`] target accepts anything the registry
//! can classify.
use bytes::{Buf, Bytes};
use std::{borrow::Cow, fmt, str::Utf8Error, string::FromUtf8Error};

use crate::{
    common::ByteStr,
    postgres::{Oid, oid, pg_type},
    registry::{TypeClass, TypeRegistry},
    types::{self, PgInterval, PgTimeTz},
    value::Value,
};

/// A single received value: type oid, payload (`None` for NULL), and the
/// registry for server-defined types.
pub struct PgValue<'a> {
    oid: Oid,
    data: Option<Bytes>,
    registry: &'a TypeRegistry,
}

impl<'a> PgValue<'a> {
    pub(crate) fn new(oid: Oid, data: Option<Bytes>, registry: &'a TypeRegistry) -> Self {
        Self { oid, data, registry }
    }

    /// The value's declared type oid.
    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// Whether the wire length was `-1`.
    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    /// The registry the owning connection loaded at startup.
    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    /// Take the payload, rejecting NULL.
    pub fn bytes(self) -> Result<Bytes, DecodeError> {
        self.data.ok_or(DecodeError::UnexpectedNull)
    }
}

/// A type that can be decoded from a received postgres value.
pub trait Decode: Sized {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError>;
}

fn fixed<const N: usize>(what: &'static str, bytes: &[u8]) -> Result<[u8; N], DecodeError> {
    bytes
        .try_into()
        .map_err(|_| DecodeError::Length { what, expected: N, found: bytes.len() })
}

macro_rules! decode_be {
    ($($ty:ty, $oid:expr, $name:literal;)*) => {$(
        impl Decode for $ty {
            fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
                if value.oid() != $oid {
                    return Err(DecodeError::OidMismatch { expected: $name, found: value.oid() });
                }
                let bytes = value.bytes()?;
                Ok(<$ty>::from_be_bytes(fixed($name, &bytes)?))
            }
        }
    )*};
}

decode_be! {
    i16, oid::INT2, "int2";
    i32, oid::INT4, "int4";
    i64, oid::INT8, "int8";
    f32, oid::FLOAT4, "float4";
    f64, oid::FLOAT8, "float8";
}

impl Decode for bool {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        if value.oid() != oid::BOOL {
            return Err(DecodeError::OidMismatch { expected: "bool", found: value.oid() });
        }
        let bytes = value.bytes()?;
        Ok(fixed::<1>("bool", &bytes)?[0] != 0)
    }
}

impl Decode for char {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        if value.oid() != oid::CHAR {
            return Err(DecodeError::OidMismatch { expected: "char", found: value.oid() });
        }
        let bytes = value.bytes()?;
        Ok(char::from(fixed::<1>("char", &bytes)?[0]))
    }
}

impl Decode for u32 {
    /// `oid` and the `reg*` aliases.
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        if !pg_type::is_oid(value.oid()) {
            return Err(DecodeError::OidMismatch { expected: "oid", found: value.oid() });
        }
        let bytes = value.bytes()?;
        Ok(u32::from_be_bytes(fixed("oid", &bytes)?))
    }
}

impl Decode for String {
    /// The text family (`name`, `text`, `unknown`, `bpchar`, `varchar`),
    /// `json`, and registered enum labels.
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        let o = value.oid();
        let textual = pg_type::is_text(o)
            || o == oid::JSON
            || matches!(value.registry().classify(o), TypeClass::Enum(_));
        if !textual {
            return Err(DecodeError::OidMismatch { expected: "text", found: o });
        }
        String::from_utf8(value.bytes()?.into()).map_err(Into::into)
    }
}

/// The bytea target; `Vec<u8>` cannot be one, it already means "array of
/// one-byte elements".
impl Decode for Bytes {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        if value.oid() != oid::BYTEA {
            return Err(DecodeError::OidMismatch { expected: "bytea", found: value.oid() });
        }
        value.bytes()
    }
}

impl Decode for time::Date {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        if value.oid() != oid::DATE {
            return Err(DecodeError::OidMismatch { expected: "date", found: value.oid() });
        }
        let bytes = value.bytes()?;
        types::date_from_days(i32::from_be_bytes(fixed("date", &bytes)?))
    }
}

impl Decode for time::Time {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        if value.oid() != oid::TIME {
            return Err(DecodeError::OidMismatch { expected: "time", found: value.oid() });
        }
        let bytes = value.bytes()?;
        types::time_from_micros(i64::from_be_bytes(fixed("time", &bytes)?))
    }
}

impl Decode for time::PrimitiveDateTime {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        if value.oid() != oid::TIMESTAMP {
            return Err(DecodeError::OidMismatch { expected: "timestamp", found: value.oid() });
        }
        let bytes = value.bytes()?;
        types::timestamp_from_micros(i64::from_be_bytes(fixed("timestamp", &bytes)?))
    }
}

impl Decode for time::OffsetDateTime {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        if value.oid() != oid::TIMESTAMPTZ {
            return Err(DecodeError::OidMismatch { expected: "timestamptz", found: value.oid() });
        }
        let bytes = value.bytes()?;
        let micros = i64::from_be_bytes(fixed("timestamptz", &bytes)?);
        Ok(types::timestamp_from_micros(micros)?.assume_utc())
    }
}

impl Decode for PgTimeTz {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        if value.oid() != oid::TIMETZ {
            return Err(DecodeError::OidMismatch { expected: "timetz", found: value.oid() });
        }
        let bytes = value.bytes()?;
        let raw = fixed::<12>("timetz", &bytes)?;
        Ok(PgTimeTz {
            time: types::time_from_micros(i64::from_be_bytes(raw[..8].try_into().unwrap()))?,
            offset_seconds: i32::from_be_bytes(raw[8..].try_into().unwrap()),
        })
    }
}

impl Decode for PgInterval {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        if value.oid() != oid::INTERVAL {
            return Err(DecodeError::OidMismatch { expected: "interval", found: value.oid() });
        }
        let bytes = value.bytes()?;
        let raw = fixed::<16>("interval", &bytes)?;
        Ok(PgInterval {
            microseconds: i64::from_be_bytes(raw[..8].try_into().unwrap()),
            days: i32::from_be_bytes(raw[8..12].try_into().unwrap()),
            months: i32::from_be_bytes(raw[12..].try_into().unwrap()),
        })
    }
}

impl Decode for uuid::Uuid {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        if value.oid() != oid::UUID {
            return Err(DecodeError::OidMismatch { expected: "uuid", found: value.oid() });
        }
        let bytes = value.bytes()?;
        Ok(uuid::Uuid::from_bytes(fixed("uuid", &bytes)?))
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        match value.is_null() {
            true => Ok(None),
            false => T::decode(value).map(Some),
        }
    }
}

/// One-dimensional typed array.
///
/// Multi-dimensional arrays decode through [`Value`], which nests an
/// [`Value::Array`] per dimension.
impl<T: Decode> Decode for Vec<T> {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        let o = value.oid();
        if o != oid::RECORD_ARRAY && value.registry().array_element(o).is_none() {
            return Err(DecodeError::OidMismatch { expected: "array", found: o });
        }
        let registry = value.registry();
        let mut buf = value.bytes()?;
        let header = ArrayHeader::read(&mut buf)?;

        let Some((&(len, _), rest)) = header.dims.split_first() else {
            return Ok(Vec::new());
        };
        if !rest.is_empty() {
            return Err(DecodeError::Dimensions { found: header.dims.len() });
        }

        let mut out = Vec::with_capacity(len as usize);
        for _ in 0..len {
            let data = read_element(&mut buf)?;
            out.push(T::decode(PgValue::new(header.element, data, registry))?);
        }
        Ok(out)
    }
}

macro_rules! decode_composite {
    ($($t:ident),*) => {
        /// Composite (row) value with a statically known arity.
        impl<$($t: Decode),*> Decode for ($($t,)*) {
            fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
                const ARITY: usize = [$(stringify!($t)),*].len();

                let o = value.oid();
                if o != oid::RECORD && value.registry().composite_members(o).is_none() {
                    return Err(DecodeError::OidMismatch { expected: "composite", found: o });
                }
                let registry = value.registry();
                let mut buf = value.bytes()?;

                if buf.remaining() < 4 {
                    return Err(DecodeError::truncated("composite"));
                }
                let count = buf.get_i32();
                if count != ARITY as i32 {
                    return Err(DecodeError::Arity { expected: ARITY, found: count.max(0) as usize });
                }

                Ok(($(
                    {
                        let (field_oid, data) = read_composite_field(&mut buf)?;
                        $t::decode(PgValue::new(field_oid, data, registry))?
                    },
                )*))
            }
        }
    };
}

decode_composite!(T0);
decode_composite!(T0, T1);
decode_composite!(T0, T1, T2);
decode_composite!(T0, T1, T2, T3);
decode_composite!(T0, T1, T2, T3, T4);
decode_composite!(T0, T1, T2, T3, T4, T5);
decode_composite!(T0, T1, T2, T3, T4, T5, T6);
decode_composite!(T0, T1, T2, T3, T4, T5, T6, T7);

impl Decode for Value {
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        match value.data {
            Some(data) => decode_any(value.oid, data, value.registry),
            None => Ok(Value::Null),
        }
    }
}

fn decode_any(o: Oid, mut data: Bytes, registry: &TypeRegistry) -> Result<Value, DecodeError> {
    let value = match o {
        oid::BOOL => Value::Bool(fixed::<1>("bool", &data)?[0] != 0),
        oid::CHAR => Value::Char(fixed::<1>("char", &data)?[0]),
        oid::INT2 => Value::Int2(i16::from_be_bytes(fixed("int2", &data)?)),
        oid::INT4 => Value::Int4(i32::from_be_bytes(fixed("int4", &data)?)),
        oid::INT8 => Value::Int8(i64::from_be_bytes(fixed("int8", &data)?)),
        oid::FLOAT4 => Value::Float4(f32::from_be_bytes(fixed("float4", &data)?)),
        oid::FLOAT8 => Value::Float8(f64::from_be_bytes(fixed("float8", &data)?)),
        oid::BYTEA => Value::Bytes(data),
        oid::JSON => Value::Json(ByteStr::from_utf8(data)?),
        oid::JSONB => {
            // jsonb carries a leading version byte
            if data.first() != Some(&1) {
                return Err(DecodeError::out_of_range("unknown jsonb version"));
            }
            data.advance(1);
            Value::Json(ByteStr::from_utf8(data)?)
        }
        oid::DATE => Value::Date(types::date_from_days(i32::from_be_bytes(fixed("date", &data)?))?),
        oid::TIME => Value::Time(types::time_from_micros(i64::from_be_bytes(fixed("time", &data)?))?),
        oid::TIMESTAMP => Value::Timestamp(types::timestamp_from_micros(i64::from_be_bytes(
            fixed("timestamp", &data)?,
        ))?),
        oid::TIMESTAMPTZ => Value::TimestampTz(
            types::timestamp_from_micros(i64::from_be_bytes(fixed("timestamptz", &data)?))?
                .assume_utc(),
        ),
        oid::TIMETZ => {
            let raw = fixed::<12>("timetz", &data)?;
            Value::TimeTz(PgTimeTz {
                time: types::time_from_micros(i64::from_be_bytes(raw[..8].try_into().unwrap()))?,
                offset_seconds: i32::from_be_bytes(raw[8..].try_into().unwrap()),
            })
        }
        oid::INTERVAL => {
            let raw = fixed::<16>("interval", &data)?;
            Value::Interval(PgInterval {
                microseconds: i64::from_be_bytes(raw[..8].try_into().unwrap()),
                days: i32::from_be_bytes(raw[8..12].try_into().unwrap()),
                months: i32::from_be_bytes(raw[12..].try_into().unwrap()),
            })
        }
        oid::UUID => Value::Uuid(uuid::Uuid::from_bytes(fixed("uuid", &data)?)),
        oid::RECORD => composite_value(&mut data, registry)?,
        oid::RECORD_ARRAY => array_value(&mut data, registry)?,
        o if pg_type::is_text(o) => Value::Text(ByteStr::from_utf8(data)?),
        o if pg_type::is_oid(o) => Value::Oid(u32::from_be_bytes(fixed("oid", &data)?)),
        other => match registry.classify(other) {
            TypeClass::Array(_) => array_value(&mut data, registry)?,
            TypeClass::Composite(_) => composite_value(&mut data, registry)?,
            TypeClass::Enum(_) => Value::Text(ByteStr::from_utf8(data)?),
            TypeClass::Unknown => return Err(DecodeError::UnsupportedOid(other)),
        },
    };
    Ok(value)
}

struct ArrayHeader {
    /// `(length, lower bound)` per dimension.
    dims: Vec<(i32, i32)>,
    #[allow(dead_code)]
    has_nulls: bool,
    element: Oid,
}

impl ArrayHeader {
    fn read(buf: &mut Bytes) -> Result<Self, DecodeError> {
        if buf.remaining() < 12 {
            return Err(DecodeError::truncated("array header"));
        }
        let ndims = buf.get_i32();
        let has_nulls = buf.get_i32() != 0;
        let element = buf.get_u32();

        if !(0..=6).contains(&ndims) {
            return Err(DecodeError::out_of_range("array dimension count"));
        }

        let mut dims = Vec::with_capacity(ndims as usize);
        for _ in 0..ndims {
            if buf.remaining() < 8 {
                return Err(DecodeError::truncated("array dimensions"));
            }
            let len = buf.get_i32();
            let lower = buf.get_i32();
            if len < 0 {
                return Err(DecodeError::out_of_range("array dimension length"));
            }
            dims.push((len, lower));
        }
        Ok(Self { dims, has_nulls, element })
    }
}

fn read_element(buf: &mut Bytes) -> Result<Option<Bytes>, DecodeError> {
    if buf.remaining() < 4 {
        return Err(DecodeError::truncated("array element"));
    }
    let len = buf.get_i32();
    if len < 0 {
        return Ok(None);
    }
    if buf.remaining() < len as usize {
        return Err(DecodeError::truncated("array element"));
    }
    Ok(Some(buf.split_to(len as usize)))
}

fn read_composite_field(buf: &mut Bytes) -> Result<(Oid, Option<Bytes>), DecodeError> {
    if buf.remaining() < 8 {
        return Err(DecodeError::truncated("composite field"));
    }
    let field_oid = buf.get_u32();
    let len = buf.get_i32();
    if len < 0 {
        return Ok((field_oid, None));
    }
    if buf.remaining() < len as usize {
        return Err(DecodeError::truncated("composite field"));
    }
    Ok((field_oid, Some(buf.split_to(len as usize))))
}

fn array_value(buf: &mut Bytes, registry: &TypeRegistry) -> Result<Value, DecodeError> {
    let header = ArrayHeader::read(buf)?;
    if header.dims.is_empty() {
        return Ok(Value::Array(Vec::new()));
    }
    array_level(&header.dims, header.element, buf, registry)
}

fn array_level(
    dims: &[(i32, i32)],
    element: Oid,
    buf: &mut Bytes,
    registry: &TypeRegistry,
) -> Result<Value, DecodeError> {
    let ((len, _), rest) = dims.split_first().map(|(d, r)| (*d, r)).expect("dims not empty");
    let mut out = Vec::with_capacity(len as usize);
    if rest.is_empty() {
        for _ in 0..len {
            out.push(match read_element(buf)? {
                Some(data) => decode_any(element, data, registry)?,
                None => Value::Null,
            });
        }
    } else {
        for _ in 0..len {
            out.push(array_level(rest, element, buf, registry)?);
        }
    }
    Ok(Value::Array(out))
}

fn composite_value(buf: &mut Bytes, registry: &TypeRegistry) -> Result<Value, DecodeError> {
    if buf.remaining() < 4 {
        return Err(DecodeError::truncated("composite"));
    }
    let count = buf.get_i32();
    if count < 0 {
        return Err(DecodeError::out_of_range("composite field count"));
    }
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (field_oid, data) = read_composite_field(buf)?;
        out.push(match data {
            Some(data) => decode_any(field_oid, data, registry)?,
            None => Value::Null,
        });
    }
    Ok(Value::Composite(out))
}

/// An error when decoding a received value.
pub enum DecodeError {
    /// The server returned a non UTF-8 string.
    Utf8(Utf8Error),
    /// The requested column does not exist.
    ColumnNotFound(Cow<'static, str>),
    /// The received oid cannot produce the requested type.
    OidMismatch { expected: &'static str, found: Oid },
    /// NULL received into a target that cannot hold it.
    UnexpectedNull,
    /// Composite field count does not match the target arity.
    Arity { expected: usize, found: usize },
    /// Array dimensionality does not match the target.
    Dimensions { found: usize },
    /// The payload ended before the value did.
    Truncated { what: &'static str },
    /// The payload has the wrong size for a fixed-width value.
    Length { what: &'static str, expected: usize, found: usize },
    /// The value cannot be represented in the target type.
    OutOfRange(Cow<'static, str>),
    /// The oid is neither in the static table nor in the registry.
    UnsupportedOid(Oid),
    /// A [`Value`] downcast found a different variant.
    Downcast { expected: &'static str, found: &'static str },
    /// Serde rejected a json payload.
    #[cfg(feature = "json")]
    Json(serde_json::Error),
}

impl DecodeError {
    pub(crate) fn truncated(what: &'static str) -> Self {
        Self::Truncated { what }
    }

    pub(crate) fn out_of_range(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::OutOfRange(reason.into())
    }
}

impl std::error::Error for DecodeError { }

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode value, ")?;
        match self {
            Self::Utf8(e) => write!(f, "{e}"),
            Self::ColumnNotFound(name) => write!(f, "column not found: {name}"),
            Self::OidMismatch { expected, found } => {
                write!(f, "oid {found} cannot produce {expected}")
            }
            Self::UnexpectedNull => write!(f, "unexpected NULL for a non-nullable target"),
            Self::Arity { expected, found } => {
                write!(f, "composite has {found} fields, target expects {expected}")
            }
            Self::Dimensions { found } => {
                write!(f, "array has {found} dimensions, target expects 1")
            }
            Self::Truncated { what } => write!(f, "{what} is truncated"),
            Self::Length { what, expected, found } => {
                write!(f, "{what} has {found} bytes, expected {expected}")
            }
            Self::OutOfRange(reason) => write!(f, "{reason}"),
            Self::UnsupportedOid(oid) => write!(f, "unsupported type oid {oid}"),
            Self::Downcast { expected, found } => {
                write!(f, "value is {found}, not {expected}")
            }
            #[cfg(feature = "json")]
            Self::Json(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for DecodeError {
            fn from($pat: $ty) -> Self {
                $body
            }
        }
    };
}

from!(<Utf8Error>e => Self::Utf8(e));
from!(<FromUtf8Error>e => Self::Utf8(e.utf8_error()));
#[cfg(feature = "json")]
from!(<serde_json::Error>e => Self::Json(e));

#[cfg(test)]
mod test {
    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::encode::Encode;

    fn registry() -> TypeRegistry {
        TypeRegistry::default()
            .with_array(17001, oid::INT4)
            .with_composite(17002, vec![oid::INT4, oid::TEXT])
            .with_enum(17003, &[(17004, "red"), (17005, "green")])
    }

    fn round_trip<T>(input: T) -> T
    where
        T: Encode<'static> + Decode,
    {
        let registry = TypeRegistry::default();
        let encoded = input.encode();
        let data = (!encoded.is_null()).then(|| Bytes::copy_from_slice(encoded.as_slice()));
        T::decode(PgValue::new(encoded.oid(), data, &registry)).unwrap()
    }

    fn array_bytes(dims: &[(i32, i32)], element: Oid, elements: &[Option<&[u8]>]) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_i32(dims.len() as i32);
        buf.put_i32(elements.iter().any(Option::is_none) as i32);
        buf.put_u32(element);
        for (len, lower) in dims {
            buf.put_i32(*len);
            buf.put_i32(*lower);
        }
        for e in elements {
            match e {
                Some(bytes) => {
                    buf.put_i32(bytes.len() as i32);
                    buf.put_slice(bytes);
                }
                None => buf.put_i32(-1),
            }
        }
        buf.freeze()
    }

    fn composite_bytes(fields: &[(Oid, Option<&[u8]>)]) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_i32(fields.len() as i32);
        for (o, data) in fields {
            buf.put_u32(*o);
            match data {
                Some(bytes) => {
                    buf.put_i32(bytes.len() as i32);
                    buf.put_slice(bytes);
                }
                None => buf.put_i32(-1),
            }
        }
        buf.freeze()
    }

    #[test]
    fn scalars_round_trip() {
        assert_eq!(round_trip(-7_i16), -7);
        assert_eq!(round_trip(420_i32), 420);
        assert_eq!(round_trip(i64::MIN), i64::MIN);
        assert_eq!(round_trip(1.5_f32), 1.5);
        assert_eq!(round_trip(-2.25_f64), -2.25);
        assert!(round_trip(true));
        assert_eq!(round_trip(String::from("héllo")), "héllo");
        assert_eq!(round_trip(Bytes::from_static(&[0, 159, 1])), [0, 159, 1].as_slice());
    }

    #[test]
    fn temporal_round_trip() {
        use time::macros::{date, datetime, time};

        assert_eq!(round_trip(date!(1993 - 05 - 14)), date!(1993 - 05 - 14));
        assert_eq!(round_trip(time!(23:59:59.999999)), time!(23:59:59.999999));
        assert_eq!(round_trip(datetime!(2024-02-29 12:00)), datetime!(2024-02-29 12:00));
        assert_eq!(
            round_trip(datetime!(2024-02-29 12:00 +3)),
            datetime!(2024-02-29 9:00 UTC),
        );

        let interval = PgInterval { microseconds: 12, days: -4, months: 7 };
        assert_eq!(round_trip(interval), interval);

        let timetz = PgTimeTz { time: time!(8:30), offset_seconds: -3600 };
        assert_eq!(round_trip(timetz), timetz);
    }

    #[test]
    fn uuid_round_trip() {
        let id = uuid::Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        assert_eq!(round_trip(id), id);
    }

    #[test]
    fn oid_mismatch_is_rejected() {
        let registry = TypeRegistry::default();
        let value = PgValue::new(oid::TEXT, Some(Bytes::from_static(b"foo")), &registry);
        let err = i32::decode(value).unwrap_err();
        assert!(matches!(err, DecodeError::OidMismatch { expected: "int4", .. }));
    }

    #[test]
    fn null_policy() {
        let registry = TypeRegistry::default();

        let value = PgValue::new(oid::INT4, None, &registry);
        assert!(matches!(i32::decode(value).unwrap_err(), DecodeError::UnexpectedNull));

        let value = PgValue::new(oid::INT4, None, &registry);
        assert_eq!(Option::<i32>::decode(value).unwrap(), None);

        let value = PgValue::new(oid::TEXT, None, &registry);
        assert!(String::decode(value).is_err());

        let value = PgValue::new(oid::INT4, None, &registry);
        assert_eq!(Value::decode(value).unwrap(), Value::Null);
    }

    #[test]
    fn typed_array_one_dimension() {
        let registry = registry();
        let bytes = array_bytes(
            &[(3, 1)],
            oid::INT4,
            &[
                Some(&1_i32.to_be_bytes()),
                Some(&2_i32.to_be_bytes()),
                Some(&3_i32.to_be_bytes()),
            ],
        );
        let value = PgValue::new(17001, Some(bytes), &registry);
        assert_eq!(Vec::<i32>::decode(value).unwrap(), [1, 2, 3]);
    }

    #[test]
    fn typed_array_rejects_nulls_unless_optional() {
        let registry = registry();
        let one = 1_i32.to_be_bytes();
        let elements = [Some(&one[..]), None];
        let bytes = array_bytes(&[(2, 1)], oid::INT4, &elements);

        let value = PgValue::new(17001, Some(bytes.clone()), &registry);
        assert!(matches!(Vec::<i32>::decode(value).unwrap_err(), DecodeError::UnexpectedNull));

        let value = PgValue::new(17001, Some(bytes), &registry);
        assert_eq!(Vec::<Option<i32>>::decode(value).unwrap(), [Some(1), None]);
    }

    #[test]
    fn empty_array_has_no_dimensions() {
        let registry = registry();
        let value = PgValue::new(17001, Some(array_bytes(&[], oid::INT4, &[])), &registry);
        assert_eq!(Vec::<i32>::decode(value).unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn typed_array_rejects_extra_dimensions() {
        let registry = registry();
        let bytes = array_bytes(
            &[(1, 1), (2, 1)],
            oid::INT4,
            &[Some(&1_i32.to_be_bytes()), Some(&2_i32.to_be_bytes())],
        );
        let value = PgValue::new(17001, Some(bytes), &registry);
        assert!(matches!(
            Vec::<i32>::decode(value).unwrap_err(),
            DecodeError::Dimensions { found: 2 },
        ));
    }

    #[test]
    fn dynamic_array_keeps_shape() {
        let registry = registry();
        // 2x2, row-major
        let bytes = array_bytes(
            &[(2, 1), (2, 1)],
            oid::INT4,
            &[
                Some(&1_i32.to_be_bytes()),
                Some(&2_i32.to_be_bytes()),
                Some(&3_i32.to_be_bytes()),
                Some(&4_i32.to_be_bytes()),
            ],
        );
        let value = PgValue::new(oid::RECORD_ARRAY, Some(bytes), &registry);
        let decoded = Value::decode(value).unwrap();

        assert_eq!(
            decoded,
            Value::Array(vec![
                Value::Array(vec![Value::Int4(1), Value::Int4(2)]),
                Value::Array(vec![Value::Int4(3), Value::Int4(4)]),
            ]),
        );
    }

    #[test]
    fn composite_decodes_into_tuple() {
        let registry = registry();
        let bytes = composite_bytes(&[
            (oid::INT4, Some(&7_i32.to_be_bytes())),
            (oid::TEXT, Some(b"str")),
        ]);

        let value = PgValue::new(17002, Some(bytes.clone()), &registry);
        let (num, text) = <(i32, String)>::decode(value).unwrap();
        assert_eq!(num, 7);
        assert_eq!(text, "str");

        // the anonymous record oid works as well
        let value = PgValue::new(oid::RECORD, Some(bytes), &registry);
        <(i32, String)>::decode(value).unwrap();
    }

    #[test]
    fn composite_arity_is_enforced() {
        let registry = registry();
        let bytes = composite_bytes(&[(oid::INT4, Some(&7_i32.to_be_bytes()))]);
        let value = PgValue::new(oid::RECORD, Some(bytes), &registry);
        assert!(matches!(
            <(i32, String)>::decode(value).unwrap_err(),
            DecodeError::Arity { expected: 2, found: 1 },
        ));
    }

    #[test]
    fn composite_with_null_field() {
        let registry = registry();
        let bytes = composite_bytes(&[(oid::INT4, None), (oid::TEXT, Some(b"x"))]);
        let value = PgValue::new(oid::RECORD, Some(bytes), &registry);
        let (num, text) = <(Option<i32>, String)>::decode(value).unwrap();
        assert_eq!(num, None);
        assert_eq!(text, "x");
    }

    #[test]
    fn array_of_composites() {
        let registry = registry();
        let first = composite_bytes(&[
            (oid::INT4, Some(&1_i32.to_be_bytes())),
            (oid::TEXT, Some(b"str")),
        ]);
        let second = composite_bytes(&[
            (oid::INT4, Some(&2_i32.to_be_bytes())),
            (oid::TEXT, Some(b"aab")),
        ]);
        let bytes = array_bytes(&[(2, 1)], 17002, &[Some(&first), Some(&second)]);

        let value = PgValue::new(oid::RECORD_ARRAY, Some(bytes), &registry);
        let rows = Vec::<(i32, String)>::decode(value).unwrap();
        assert_eq!(rows, [(1, String::from("str")), (2, String::from("aab"))]);
    }

    #[test]
    fn enum_label_decodes_as_string() {
        let registry = registry();
        let value = PgValue::new(17003, Some(Bytes::from_static(b"red")), &registry);
        assert_eq!(String::decode(value).unwrap(), "red");

        let value = PgValue::new(17003, Some(Bytes::from_static(b"green")), &registry);
        assert_eq!(Value::decode(value).unwrap(), Value::Text("green".into()));
    }

    #[test]
    fn unknown_oid_is_unsupported() {
        let registry = TypeRegistry::default();
        let value = PgValue::new(99999, Some(Bytes::from_static(b"??")), &registry);
        assert!(matches!(
            Value::decode(value).unwrap_err(),
            DecodeError::UnsupportedOid(99999),
        ));
    }
}
