//! Value containers for both directions of the codec.
use bytes::Bytes;

use crate::{
    common::ByteStr,
    decode::DecodeError,
    ext::FmtExt,
    types::{PgInterval, PgTimeTz},
};

const INLINE_LEN: usize = 15;

/// Encoded parameter payload: borrowed, inlined, or shared.
///
/// Scalar encodings (at most 8 bytes of network-order integer) go through
/// [`inline`][ValueRef::inline] and never allocate.
pub(crate) enum ValueRef<'a> {
    Slice(&'a [u8]),
    Inline {
        offset: usize,
        value: [u8; INLINE_LEN],
    },
    Bytes(Bytes),
}

impl ValueRef<'_> {
    pub fn inline(slice: &[u8]) -> ValueRef<'static> {
        let len = slice.len();
        assert!(len < INLINE_LEN, "inline slice is too large");
        let mut value = [0u8; INLINE_LEN];
        value[INLINE_LEN - len..].copy_from_slice(slice);
        ValueRef::Inline { offset: INLINE_LEN - len, value }
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            ValueRef::Slice(items) => items,
            ValueRef::Inline { offset, value } => &value[*offset..],
            ValueRef::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }
}

impl std::fmt::Debug for ValueRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self.as_slice().lossy())
    }
}

impl<'a> From<&'a [u8]> for ValueRef<'a> {
    fn from(value: &'a [u8]) -> Self {
        Self::Slice(value)
    }
}

impl<'a> From<&'a str> for ValueRef<'a> {
    fn from(value: &'a str) -> Self {
        Self::Slice(value.as_bytes())
    }
}

impl From<Vec<u8>> for ValueRef<'static> {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<String> for ValueRef<'static> {
    fn from(value: String) -> Self {
        Self::Bytes(value.into_bytes().into())
    }
}

impl From<Bytes> for ValueRef<'static> {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

/// A dynamically typed column value.
///
/// This is the target to use when the row shape is not known at compile
/// time: every supported base type has a variant, plus [`Null`][Value::Null],
/// nested [`Array`][Value::Array], and [`Composite`][Value::Composite].
/// Accessors downcast and error on mismatch.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Char(u8),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Oid(u32),
    Text(ByteStr),
    Bytes(Bytes),
    Json(ByteStr),
    Uuid(uuid::Uuid),
    Date(time::Date),
    Time(time::Time),
    TimeTz(PgTimeTz),
    Timestamp(time::PrimitiveDateTime),
    TimestampTz(time::OffsetDateTime),
    Interval(PgInterval),
    Array(Vec<Value>),
    Composite(Vec<Value>),
}

macro_rules! accessor {
    ($(
        $(#[$doc:meta])*
        fn $fn:ident($pat:pat => $out:expr) -> $ty:ty, $name:literal;
    )*) => {$(
        $(#[$doc])*
        pub fn $fn(&self) -> Result<$ty, DecodeError> {
            match self {
                $pat => Ok($out),
                other => Err(DecodeError::Downcast { expected: $name, found: other.kind() }),
            }
        }
    )*};
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Variant name, used in downcast errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Int2(_) => "int2",
            Value::Int4(_) => "int4",
            Value::Int8(_) => "int8",
            Value::Float4(_) => "float4",
            Value::Float8(_) => "float8",
            Value::Oid(_) => "oid",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytea",
            Value::Json(_) => "json",
            Value::Uuid(_) => "uuid",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::TimeTz(_) => "timetz",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Interval(_) => "interval",
            Value::Array(_) => "array",
            Value::Composite(_) => "composite",
        }
    }

    accessor! {
        /// Downcast to `bool`.
        fn as_bool(Value::Bool(v) => *v) -> bool, "bool";
        /// Downcast to `i16`.
        fn as_i16(Value::Int2(v) => *v) -> i16, "int2";
        /// Downcast to `i32`.
        fn as_i32(Value::Int4(v) => *v) -> i32, "int4";
        /// Downcast to `i64`.
        fn as_i64(Value::Int8(v) => *v) -> i64, "int8";
        /// Downcast to `f32`.
        fn as_f32(Value::Float4(v) => *v) -> f32, "float4";
        /// Downcast to `f64`.
        fn as_f64(Value::Float8(v) => *v) -> f64, "float8";
        /// Downcast to text.
        fn as_str(Value::Text(v) => v.as_str()) -> &str, "text";
        /// Downcast to raw bytes.
        fn as_bytes(Value::Bytes(v) => v) -> &Bytes, "bytea";
        /// Downcast to an array of values.
        fn as_array(Value::Array(v) => v) -> &[Value], "array";
        /// Downcast to the fields of a composite.
        fn as_composite(Value::Composite(v) => v) -> &[Value], "composite";
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn downcast_matches() {
        assert_eq!(Value::Int4(7).as_i32().unwrap(), 7);
        assert_eq!(Value::Text("x".into()).as_str().unwrap(), "x");
        assert!(Value::Null.is_null());
    }

    #[test]
    fn downcast_mismatch_errors() {
        let err = Value::Int4(7).as_str().unwrap_err();
        assert!(matches!(err, DecodeError::Downcast { expected: "text", found: "int4" }));
    }

    #[test]
    fn inline_value_holds_scalars() {
        let v = ValueRef::inline(&42_i64.to_be_bytes());
        assert_eq!(v.as_slice(), 42_i64.to_be_bytes());
        assert_eq!(v.len(), 8);
    }
}
