//! Server-defined type registry.
//!
//! Array, composite, and enum types carry oids assigned at `CREATE TYPE`
//! time, so they cannot be part of the static oid table. The registry is a
//! snapshot of the relevant catalog contents taken right after startup and
//! consulted by the value codec whenever it meets an oid it does not know.
use std::collections::HashMap;

use crate::{Result, postgres::Oid, query::query_as, transport::PgTransport};

/// Client-side snapshot of server-defined array, composite, and enum types.
///
/// Read-only after load; [`Connection::reload_types`][1] builds a fresh one
/// and swaps it in.
///
/// [1]: crate::Connection::reload_types
#[derive(Debug, Default)]
pub struct TypeRegistry {
    /// array type oid -> element type oid
    arrays: HashMap<Oid, Oid>,
    /// composite type oid -> member type oids in attribute order
    composites: HashMap<Oid, Vec<Oid>>,
    /// enum type oid -> value oid -> label
    enums: HashMap<Oid, HashMap<Oid, String>>,
}

/// What the registry knows about an oid.
#[derive(Debug, PartialEq, Eq)]
pub enum TypeClass<'a> {
    /// An array type holding elements of the given oid.
    Array(Oid),
    /// A composite type with the given member oids.
    Composite(&'a [Oid]),
    /// An enum type; values travel as their label string.
    Enum(&'a HashMap<Oid, String>),
    /// Not a registered server-defined type.
    Unknown,
}

impl TypeRegistry {
    /// Classify an oid the static table does not cover.
    pub fn classify(&self, oid: Oid) -> TypeClass<'_> {
        if let Some(element) = self.arrays.get(&oid) {
            return TypeClass::Array(*element);
        }
        if let Some(members) = self.composites.get(&oid) {
            return TypeClass::Composite(members);
        }
        if let Some(labels) = self.enums.get(&oid) {
            return TypeClass::Enum(labels);
        }
        TypeClass::Unknown
    }

    /// Element oid of a registered array type.
    pub fn array_element(&self, oid: Oid) -> Option<Oid> {
        self.arrays.get(&oid).copied()
    }

    /// Member oids of a registered composite type, in attribute order.
    pub fn composite_members(&self, oid: Oid) -> Option<&[Oid]> {
        self.composites.get(&oid).map(Vec::as_slice)
    }

    /// Label map of a registered enum type.
    pub fn enum_labels(&self, oid: Oid) -> Option<&HashMap<Oid, String>> {
        self.enums.get(&oid)
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty() && self.composites.is_empty() && self.enums.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn with_array(mut self, array: Oid, element: Oid) -> Self {
        self.arrays.insert(array, element);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_composite(mut self, composite: Oid, members: Vec<Oid>) -> Self {
        self.composites.insert(composite, members);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_enum(mut self, oid: Oid, labels: &[(Oid, &str)]) -> Self {
        self.enums
            .insert(oid, labels.iter().map(|(o, l)| (*o, String::from(*l))).collect());
        self
    }
}

const ARRAY_TYPES: &str = "\
SELECT oid, typelem FROM pg_type WHERE typcategory = 'A' AND typelem <> 0";

const COMPOSITE_MEMBERS: &str = "\
SELECT t.oid, a.atttypid FROM pg_type t \
JOIN pg_attribute a ON a.attrelid = t.typrelid \
WHERE t.typtype = 'c' AND a.attnum > 0 AND NOT a.attisdropped \
ORDER BY t.oid, a.attnum";

const ENUM_LABELS: &str = "\
SELECT enumtypid, oid, enumlabel FROM pg_enum ORDER BY enumtypid, enumsortorder";

/// Run the three catalog queries and assemble a fresh registry.
pub(crate) async fn load<C: PgTransport>(io: &mut C) -> Result<TypeRegistry> {
    let mut registry = TypeRegistry::default();

    let arrays = query_as::<_, _, (Oid, Oid)>(ARRAY_TYPES, &mut *io)
        .fetch_all()
        .await?;
    registry.arrays = arrays.into_iter().collect();

    let members = query_as::<_, _, (Oid, Oid)>(COMPOSITE_MEMBERS, &mut *io)
        .fetch_all()
        .await?;
    for (composite, member) in members {
        registry.composites.entry(composite).or_default().push(member);
    }

    let labels = query_as::<_, _, (Oid, Oid, String)>(ENUM_LABELS, &mut *io)
        .fetch_all()
        .await?;
    for (enum_oid, value, label) in labels {
        registry.enums.entry(enum_oid).or_default().insert(value, label);
    }

    Ok(registry)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classify_consults_all_maps() {
        let registry = TypeRegistry::default()
            .with_array(17001, 23)
            .with_composite(17002, vec![25, 23])
            .with_enum(17003, &[(17004, "red"), (17005, "green")]);

        assert_eq!(registry.classify(17001), TypeClass::Array(23));
        assert_eq!(registry.classify(17002), TypeClass::Composite(&[25, 23]));
        assert!(matches!(registry.classify(17003), TypeClass::Enum(_)));
        assert_eq!(registry.classify(16), TypeClass::Unknown);

        assert_eq!(registry.array_element(17001), Some(23));
        assert_eq!(registry.composite_members(17002), Some(&[25, 23][..]));
        assert_eq!(registry.enum_labels(17003).unwrap().get(&17004).unwrap(), "red");
    }
}
