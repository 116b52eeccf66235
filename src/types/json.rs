use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    decode::{Decode, DecodeError, PgValue},
    encode::{Encode, Encoded},
    postgres::oid,
};

/// Decode and encode a json value through serde.
///
/// Accepts both `json` and `jsonb` columns. Parameters are sent as `json`
/// text, which the server casts where a `jsonb` column expects it.
///
/// # Panics
///
/// When performing [`Encode`], if the [`Serialize`] implementation decides
/// to fail, encoding panics.
#[derive(Debug, PartialEq)]
pub struct Json<T>(pub T);

impl<T> Decode for Json<T>
where
    T: DeserializeOwned,
{
    fn decode(value: PgValue<'_>) -> Result<Self, DecodeError> {
        let o = value.oid();
        let mut bytes = match o {
            oid::JSON | oid::JSONB => value.bytes()?,
            _ => return Err(DecodeError::OidMismatch { expected: "json", found: o }),
        };
        if o == oid::JSONB {
            // jsonb carries a leading version byte
            if bytes.first() != Some(&1) {
                return Err(DecodeError::out_of_range("unknown jsonb version"));
            }
            bytes = bytes.slice(1..);
        }
        serde_json::from_slice(&bytes).map(Json).map_err(Into::into)
    }
}

impl<T: Serialize> Encode<'static> for Json<T> {
    fn encode(self) -> Encoded<'static> {
        let text = serde_json::to_string(&self.0).expect("json serialization failed");
        Encoded::text(text, oid::JSON)
    }
}

impl<T: Serialize> Serialize for Json<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Json<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self(T::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;

    use super::*;
    use crate::{postgres::PgFormat, registry::TypeRegistry};

    #[test]
    fn json_is_sent_as_text() {
        let encoded = Json(vec![1, 2, 3]).encode();
        assert_eq!(encoded.oid(), oid::JSON);
        assert_eq!(encoded.format(), PgFormat::Text);
        assert_eq!(encoded.as_slice(), b"[1,2,3]");
    }

    #[test]
    fn json_round_trip() {
        let registry = TypeRegistry::default();
        let encoded = Json(vec![1, 2, 3]).encode();
        let data = Bytes::copy_from_slice(encoded.as_slice());

        let Json(back): Json<Vec<i32>> =
            Decode::decode(PgValue::new(oid::JSON, Some(data), &registry)).unwrap();
        assert_eq!(back, [1, 2, 3]);
    }

    #[test]
    fn jsonb_strips_version_byte() {
        let registry = TypeRegistry::default();
        let data = Bytes::from_static(b"\x01{\"a\":7}");

        let Json(map): Json<serde_json::Value> =
            Decode::decode(PgValue::new(oid::JSONB, Some(data), &registry)).unwrap();
        assert_eq!(map["a"], 7);
    }
}
