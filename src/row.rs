//! Received rows and the targets they decode into.
use bytes::{Buf, Bytes};
use std::sync::Arc;

use crate::{
    common::ByteStr,
    decode::{Decode, DecodeError, PgValue},
    ext::BytesExt,
    postgres::{
        Oid, ProtocolError,
        backend::{DataRow, RowDescription},
    },
    registry::TypeRegistry,
};

/// One entry of a `RowDescription`: everything the server said about a
/// result column.
#[derive(Debug)]
pub struct FieldDescription {
    name: ByteStr,
    table_oid: u32,
    attribute: i16,
    oid: Oid,
    type_len: i16,
    type_modifier: i32,
}

impl FieldDescription {
    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table oid when the column maps to one, zero otherwise.
    pub fn table_oid(&self) -> u32 {
        self.table_oid
    }

    /// Attribute number within the table, zero otherwise.
    pub fn attribute(&self) -> i16 {
        self.attribute
    }

    /// The column's type oid.
    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// Declared type size; negative values denote variable-width types.
    pub fn type_len(&self) -> i16 {
        self.type_len
    }

    /// Type modifier, type-specific.
    pub fn type_modifier(&self) -> i32 {
        self.type_modifier
    }

    /// Parse every field of a `RowDescription`.
    ///
    /// Every format code must be binary; `Bind` requested nothing else.
    pub(crate) fn parse_all(rd: RowDescription) -> Result<Arc<[FieldDescription]>, ProtocolError> {
        let mut body = rd.body;
        let mut fields = Vec::with_capacity(rd.field_len as usize);
        for _ in 0..rd.field_len {
            let name = match body.get_nul_bytestr() {
                Some(Ok(ok)) => ok,
                Some(Err(_)) => return Err(ProtocolError::non_utf8("RowDescription field name")),
                None => return Err(ProtocolError::missing_nul("RowDescription field name")),
            };
            let field = FieldDescription {
                name,
                table_oid: body.get_u32(),
                attribute: body.get_i16(),
                oid: body.get_u32(),
                type_len: body.get_i16(),
                type_modifier: body.get_i32(),
            };
            if body.get_u16() != 1 {
                return Err(ProtocolError::NonBinaryFormat { column: field.name.as_str().into() });
            }
            fields.push(field);
        }
        Ok(fields.into())
    }
}

/// One received row.
///
/// The field descriptions are shared across every row of the result set;
/// only the values differ per row.
pub struct Row {
    fields: Arc<[FieldDescription]>,
    values: Vec<Option<Bytes>>,
    registry: Arc<TypeRegistry>,
}

impl Row {
    pub(crate) fn new(
        fields: Arc<[FieldDescription]>,
        registry: Arc<TypeRegistry>,
        row: DataRow,
    ) -> Result<Self, ProtocolError> {
        if row.column_len as usize != fields.len() {
            return Err(ProtocolError::ColumnCountMismatch {
                fields: fields.len(),
                values: row.column_len as usize,
            });
        }

        let mut body = row.body;
        let mut values = Vec::with_capacity(fields.len());
        for _ in 0..row.column_len {
            let len = body.get_i32();
            values.push((len >= 0).then(|| body.split_to(len as usize)));
        }

        Ok(Self { fields, values, registry })
    }

    /// Returns the number of columns in the row.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the row contains no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The shared field descriptions.
    pub fn fields(&self) -> &[FieldDescription] {
        &self.fields
    }

    /// Get and decode a column by position, name, or `(name, nth)` for
    /// duplicated names.
    pub fn try_get<I: Index, D: Decode>(&self, index: I) -> Result<D, DecodeError> {
        let at = index.position(&self.fields)?;
        let field = &self.fields[at];
        D::decode(PgValue::new(field.oid, self.values[at].clone(), &self.registry))
    }

    /// Decode the whole row.
    pub fn decode<R: FromRow>(self) -> Result<R, DecodeError> {
        R::from_row(self)
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_map();
        for (field, value) in self.fields.iter().zip(&self.values) {
            use crate::ext::FmtExt;
            dbg.key(&field.name.as_str());
            match value {
                Some(value) => dbg.value(&value.lossy()),
                None => dbg.value(&"NULL"),
            };
        }
        dbg.finish()
    }
}

// ===== Traits =====

/// Type that can be constructed from a row.
pub trait FromRow: Sized {
    /// Construct self from row.
    fn from_row(row: Row) -> Result<Self, DecodeError>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> Result<Self, DecodeError> {
        Ok(row)
    }
}

impl FromRow for () {
    fn from_row(_: Row) -> Result<Self, DecodeError> {
        Ok(())
    }
}

macro_rules! from_row_tuple {
    ($($t:ident $i:literal),*) => {
        /// Fixed-arity row; the received field count must match.
        impl<$($t),*> FromRow for ($($t,)*)
        where
            $($t: Decode),*
        {
            fn from_row(row: Row) -> Result<Self, DecodeError> {
                const ARITY: usize = [$(stringify!($t)),*].len();
                if row.len() != ARITY {
                    return Err(DecodeError::Arity { expected: ARITY, found: row.len() });
                }
                Ok((
                    $(row.try_get::<usize, $t>($i)?,)*
                ))
            }
        }
    };
}

from_row_tuple!(T0 0);
from_row_tuple!(T0 0, T1 1);
from_row_tuple!(T0 0, T1 1, T2 2);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4, T5 5);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4, T5 5, T6 6);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4, T5 5, T6 6, T7 7);

/// Type that can be used for indexing a column.
///
/// A `usize` addresses by position, a `&str` by the first column with that
/// name, and `(&str, n)` by the nth column with that name when names
/// repeat.
pub trait Index: sealed::Sealed {
    fn position(&self, fields: &[FieldDescription]) -> Result<usize, DecodeError>;
}

impl Index for usize {
    fn position(&self, fields: &[FieldDescription]) -> Result<usize, DecodeError> {
        match *self < fields.len() {
            true => Ok(*self),
            false => {
                let mut fmt = itoa::Buffer::new();
                Err(DecodeError::ColumnNotFound(String::from(fmt.format(*self)).into()))
            }
        }
    }
}

impl Index for &str {
    fn position(&self, fields: &[FieldDescription]) -> Result<usize, DecodeError> {
        (*self, 0).position(fields)
    }
}

impl Index for (&str, usize) {
    fn position(&self, fields: &[FieldDescription]) -> Result<usize, DecodeError> {
        let (name, nth) = *self;
        fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.name == *name)
            .map(|(i, _)| i)
            .nth(nth)
            .ok_or_else(|| DecodeError::ColumnNotFound(String::from(name).into()))
    }
}

mod sealed {
    pub trait Sealed { }
    impl Sealed for usize { }
    impl Sealed for &str { }
    impl Sealed for (&str, usize) { }
}

#[cfg(test)]
mod test {
    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::postgres::{BackendProtocol, oid};

    fn description(fields: &[(&str, Oid)]) -> Arc<[FieldDescription]> {
        let mut buf = BytesMut::new();
        buf.put_u16(fields.len() as u16);
        for (name, o) in fields {
            buf.put_slice(name.as_bytes());
            buf.put_u8(0);
            buf.put_u32(0);
            buf.put_i16(0);
            buf.put_u32(*o);
            buf.put_i16(-1);
            buf.put_i32(-1);
            buf.put_u16(1);
        }
        let rd = RowDescription::decode(b'T', buf.freeze()).unwrap();
        FieldDescription::parse_all(rd).unwrap()
    }

    fn data_row(values: &[Option<&[u8]>]) -> DataRow {
        let mut buf = BytesMut::new();
        buf.put_u16(values.len() as u16);
        for v in values {
            match v {
                Some(bytes) => {
                    buf.put_i32(bytes.len() as i32);
                    buf.put_slice(bytes);
                }
                None => buf.put_i32(-1),
            }
        }
        DataRow::decode(b'D', buf.freeze()).unwrap()
    }

    fn registry() -> Arc<TypeRegistry> {
        Arc::new(TypeRegistry::default())
    }

    #[test]
    fn lookup_by_position_and_name() {
        let fields = description(&[("value", oid::INT4), ("name", oid::TEXT)]);
        let one = 1_i32.to_be_bytes();
        let row = Row::new(fields, registry(), data_row(&[Some(&one), Some(b"foo")])).unwrap();

        // position and name address the same cells
        assert_eq!(row.try_get::<usize, i32>(0).unwrap(), 1);
        assert_eq!(row.try_get::<usize, String>(1).unwrap(), "foo");
        assert_eq!(row.try_get::<_, i32>("value").unwrap(), 1);
        assert_eq!(row.try_get::<_, String>("name").unwrap(), "foo");
    }

    #[test]
    fn duplicate_names_resolve_by_nth() {
        let fields = description(&[("v", oid::INT4), ("v", oid::INT4)]);
        let first = 1_i32.to_be_bytes();
        let second = 2_i32.to_be_bytes();
        let row = Row::new(fields, registry(), data_row(&[Some(&first), Some(&second)])).unwrap();

        assert_eq!(row.try_get::<_, i32>("v").unwrap(), 1);
        assert_eq!(row.try_get::<_, i32>(("v", 0_usize)).unwrap(), 1);
        assert_eq!(row.try_get::<_, i32>(("v", 1_usize)).unwrap(), 2);
        assert!(row.try_get::<_, i32>(("v", 2_usize)).is_err());
        assert!(row.try_get::<_, i32>("missing").is_err());
    }

    #[test]
    fn tuple_arity_must_match() {
        let fields = description(&[("name", oid::TEXT), ("value", oid::INT4)]);
        let one = 1_i32.to_be_bytes();
        let row = Row::new(fields, registry(), data_row(&[Some(b"foo"), Some(&one)])).unwrap();

        let err = row.decode::<(String,)>().unwrap_err();
        assert!(matches!(err, DecodeError::Arity { expected: 1, found: 2 }));
    }

    #[test]
    fn tuple_decodes_in_order() {
        let fields = description(&[("name", oid::TEXT), ("value", oid::INT4)]);
        let one = 1_i32.to_be_bytes();
        let row = Row::new(fields, registry(), data_row(&[Some(b"foo"), Some(&one)])).unwrap();

        let (name, value) = row.decode::<(String, i32)>().unwrap();
        assert_eq!(name, "foo");
        assert_eq!(value, 1);
    }

    #[test]
    fn value_count_must_match_description() {
        let fields = description(&[("a", oid::INT4)]);
        let err = Row::new(fields, registry(), data_row(&[])).unwrap_err();
        assert!(matches!(err, ProtocolError::ColumnCountMismatch { fields: 1, values: 0 }));
    }

    #[test]
    fn text_format_field_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u16(1);
        buf.put_slice(b"name\0");
        buf.put_u32(0);
        buf.put_i16(0);
        buf.put_u32(oid::TEXT);
        buf.put_i16(-1);
        buf.put_i32(-1);
        buf.put_u16(0); // text format
        let rd = RowDescription::decode(b'T', buf.freeze()).unwrap();

        let err = FieldDescription::parse_all(rd).unwrap_err();
        assert!(matches!(err, ProtocolError::NonBinaryFormat { .. }));
    }
}
