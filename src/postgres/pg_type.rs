/// Postgres object identifier.
///
/// The oid type is implemented as an unsigned four-byte integer.
///
/// <https://www.postgresql.org/docs/current/datatype-oid.html>
pub type Oid = u32;

/// Well known type oids from `pg_type.dat`.
pub mod oid {
    use super::Oid;

    pub const BOOL: Oid = 16;
    pub const BYTEA: Oid = 17;
    pub const CHAR: Oid = 18;
    pub const NAME: Oid = 19;
    pub const INT8: Oid = 20;
    pub const INT2: Oid = 21;
    pub const INT4: Oid = 23;
    pub const REGPROC: Oid = 24;
    pub const TEXT: Oid = 25;
    pub const OID: Oid = 26;
    pub const JSON: Oid = 114;
    pub const FLOAT4: Oid = 700;
    pub const FLOAT8: Oid = 701;
    pub const UNKNOWN: Oid = 705;
    pub const BPCHAR: Oid = 1042;
    pub const VARCHAR: Oid = 1043;
    pub const DATE: Oid = 1082;
    pub const TIME: Oid = 1083;
    pub const TIMESTAMP: Oid = 1114;
    pub const TIMESTAMPTZ: Oid = 1184;
    pub const INTERVAL: Oid = 1186;
    pub const TIMETZ: Oid = 1266;
    pub const REGPROCEDURE: Oid = 2202;
    pub const REGOPER: Oid = 2203;
    pub const REGOPERATOR: Oid = 2204;
    pub const REGCLASS: Oid = 2205;
    pub const REGTYPE: Oid = 2206;
    pub const RECORD: Oid = 2249;
    pub const RECORD_ARRAY: Oid = 2287;
    pub const UUID: Oid = 2950;
    pub const REGCONFIG: Oid = 3734;
    pub const REGDICTIONARY: Oid = 3769;
    pub const JSONB: Oid = 3802;
}

/// Returns `true` for the text family: `name`, `text`, `unknown`, `bpchar`,
/// `varchar`.
pub(crate) fn is_text(o: Oid) -> bool {
    matches!(o, oid::NAME | oid::TEXT | oid::UNKNOWN | oid::BPCHAR | oid::VARCHAR)
}

/// Returns `true` for `oid` and the `reg*` aliases, all wire-identical
/// unsigned four-byte integers.
pub(crate) fn is_oid(o: Oid) -> bool {
    matches!(
        o,
        oid::REGPROC
            | oid::OID
            | oid::REGPROCEDURE
            | oid::REGOPER
            | oid::REGOPERATOR
            | oid::REGCLASS
            | oid::REGTYPE
            | oid::REGCONFIG
            | oid::REGDICTIONARY
    )
}

/// A type that have a corresponding postgres oid.
pub trait PgType {
    const OID: Oid;
}

macro_rules! pg_type {
    ($ty:ty, $oid:expr $(, $doc:literal)? ) => {
        impl PgType for $ty {
            $(#[doc = $doc])?
            const OID: Oid = $oid;
        }
    };
}

pg_type!(bool, oid::BOOL);
pg_type!(char, oid::CHAR, "single byte `\"char\"`");
pg_type!(i64, oid::INT8, "`int8` ~18 digit integer, 8-byte storage");
pg_type!(i16, oid::INT2, "`int2` -32 thousand to 32 thousand, 2-byte storage");
pg_type!(i32, oid::INT4, "`int4` -2 billion to 2 billion integer, 4-byte storage");
pg_type!(u32, oid::OID, "object identifier");
pg_type!(str, oid::TEXT, "`text` variable-length string, no limit specified");
pg_type!(String, oid::TEXT, "`text` variable-length string, no limit specified");
pg_type!(f32, oid::FLOAT4, "`float4` single-precision floating point number, 4-byte storage");
pg_type!(f64, oid::FLOAT8, "`float8` double-precision floating point number, 8-byte storage");
pg_type!([u8], oid::BYTEA, "variable-length string, binary values escaped");
pg_type!(Vec<u8>, oid::BYTEA, "variable-length string, binary values escaped");
pg_type!(time::Date, oid::DATE, "date");
pg_type!(time::Time, oid::TIME, "time of day");
pg_type!(time::PrimitiveDateTime, oid::TIMESTAMP, "date and time");
pg_type!(time::OffsetDateTime, oid::TIMESTAMPTZ, "date and time with time zone");
pg_type!(uuid::Uuid, oid::UUID, "UUID");
