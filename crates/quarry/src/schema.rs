//! Statically-registered entity metadata and the record graph contract.
//!
//! Instead of runtime struct reflection, every entity type declares an
//! [`EntityMeta`] once (typically in a `LazyLock`): its collection name, its
//! fields in declared order, and its associations. The preloader walks object
//! graphs through the object-safe [`Record`] trait, so "field not found" is a
//! registration error surfaced as [`Error::Configuration`], never a blind
//! downcast.

use crate::error::{Error, Result};
use crate::value::Value;

/// How many associated records a parent field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Singular association; on multiple matches the last row wins.
    One,
    /// Collection association; all matches attach in storage order.
    Many,
}

/// Static declaration linking a parent field to a child collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// Collection the associated records live in.
    pub collection: &'static str,
    /// Field read from the parent to obtain the join key.
    pub reference_field: &'static str,
    /// Field on the associated collection matched against the join key.
    pub foreign_key_field: &'static str,
    pub cardinality: Cardinality,
}

/// Per-field metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: &'static str,
    /// Whether values of this field can be materialized back from a result
    /// row. Derived/computed fields are not, and are dropped from changesets.
    pub scannable: bool,
    /// Whether this field holds a temporal type, enabling `created_at` /
    /// `updated_at` injection.
    pub temporal: bool,
}

impl FieldMeta {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            scannable: true,
            temporal: false,
        }
    }

    /// A derived/computed field that never round-trips through storage.
    pub fn derived(name: &'static str) -> Self {
        Self {
            name,
            scannable: false,
            temporal: false,
        }
    }

    /// A temporal field (timestamp-typed).
    pub fn temporal(name: &'static str) -> Self {
        Self {
            name,
            scannable: true,
            temporal: true,
        }
    }
}

/// Entity type descriptor, registered once per type and read-only thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    pub collection: &'static str,
    pub fields: Vec<FieldMeta>,
    pub associations: Vec<(&'static str, Association)>,
}

impl EntityMeta {
    pub fn new(collection: &'static str) -> Self {
        Self {
            collection,
            fields: Vec::new(),
            associations: Vec::new(),
        }
    }

    /// Declare a plain scannable field. Declaration order fixes the column
    /// order of multi-row inserts.
    pub fn field(mut self, name: &'static str) -> Self {
        self.fields.push(FieldMeta::new(name));
        self
    }

    /// Declare a temporal (timestamp) field.
    pub fn temporal_field(mut self, name: &'static str) -> Self {
        self.fields.push(FieldMeta::temporal(name));
        self
    }

    /// Declare a derived field that is dropped from changesets.
    pub fn derived_field(mut self, name: &'static str) -> Self {
        self.fields.push(FieldMeta::derived(name));
        self
    }

    /// Declare a collection-valued association.
    pub fn has_many(
        self,
        name: &'static str,
        collection: &'static str,
        reference_field: &'static str,
        foreign_key_field: &'static str,
    ) -> Self {
        self.associate(
            name,
            Association {
                collection,
                reference_field,
                foreign_key_field,
                cardinality: Cardinality::Many,
            },
        )
    }

    /// Declare a singular association.
    pub fn has_one(
        self,
        name: &'static str,
        collection: &'static str,
        reference_field: &'static str,
        foreign_key_field: &'static str,
    ) -> Self {
        self.associate(
            name,
            Association {
                collection,
                reference_field,
                foreign_key_field,
                cardinality: Cardinality::One,
            },
        )
    }

    /// Declare an association with explicit metadata.
    pub fn associate(mut self, name: &'static str, association: Association) -> Self {
        self.associations.push((name, association));
        self
    }

    /// Look up a declared field.
    pub fn field_meta(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a declared association.
    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, a)| a)
    }

    /// Whether values of the named field can be materialized back from a
    /// result row. Unknown fields are treated as scannable.
    pub fn is_scannable(&self, name: &str) -> bool {
        self.field_meta(name).is_none_or(|f| f.scannable)
    }

    /// Whether the entity declares the named field as temporal.
    pub fn declares_temporal(&self, name: &str) -> bool {
        self.field_meta(name).is_some_and(|f| f.temporal)
    }
}

/// A materialized result row handed back by the executor.
///
/// Column order is preserved; lookup is by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column (builder form).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    /// Get a column value by name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    /// Get a column value, failing with a named configuration error when the
    /// column is absent.
    pub fn try_get(&self, column: &str) -> Result<&Value> {
        self.get(column)
            .ok_or_else(|| Error::configuration(format!("row has no column '{column}'")))
    }

    /// Iterate columns in result order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}

/// Require exactly-one-row semantics from a result set.
///
/// Zero rows is [`Error::NotFound`]; multiple rows return the first.
pub fn expect_one(rows: Vec<Row>) -> Result<Row> {
    rows.into_iter()
        .next()
        .ok_or_else(|| Error::not_found("expected one row, got none"))
}

/// Trait for converting a result row into a typed record.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self>;
}

/// A walkable view into a nested association field.
pub enum Nested<'a> {
    /// Singular child, already materialized.
    One(&'a mut dyn Record),
    /// Collection of children; walking fans out across all of them.
    Many(Vec<&'a mut dyn Record>),
}

/// The object graph contract the preloader operates on.
///
/// Implementations are mechanical: delegate to the entity's [`EntityMeta`],
/// read scalar fields as [`Value`]s, expose materialized association fields
/// for walking, and decode preloaded rows into the right field.
pub trait Record {
    /// The entity descriptor this record was registered with.
    fn meta(&self) -> &'static EntityMeta;

    /// Read a scalar field value. `None` means the field is not declared.
    fn field(&self, name: &str) -> Option<Value>;

    /// Borrow a nested association field for walking. `None` means the field
    /// is not an addressable struct-shaped target.
    fn nested_mut(&mut self, name: &str) -> Option<Nested<'_>>;

    /// Store preloaded rows into the named association field.
    ///
    /// The loader enforces the declared [`Cardinality`] before calling this:
    /// a [`Cardinality::One`] association receives at most one row (the last
    /// match wins), a [`Cardinality::Many`] association receives all matches
    /// in row order.
    fn attach(&mut self, name: &str, rows: &[Row]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_meta() -> EntityMeta {
        EntityMeta::new("users")
            .field("id")
            .field("name")
            .temporal_field("created_at")
            .derived_field("post_count")
            .has_many("posts", "posts", "id", "user_id")
    }

    #[test]
    fn field_lookup_and_scannability() {
        let meta = user_meta();
        assert!(meta.is_scannable("name"));
        assert!(!meta.is_scannable("post_count"));
        assert!(meta.is_scannable("unknown"));
        assert!(meta.declares_temporal("created_at"));
        assert!(!meta.declares_temporal("name"));
    }

    #[test]
    fn association_lookup() {
        let meta = user_meta();
        let assoc = meta.association("posts").unwrap();
        assert_eq!(assoc.collection, "posts");
        assert_eq!(assoc.reference_field, "id");
        assert_eq!(assoc.foreign_key_field, "user_id");
        assert_eq!(assoc.cardinality, Cardinality::Many);
        assert!(meta.association("comments").is_none());
    }

    #[test]
    fn row_missing_column_is_configuration_error() {
        let row = Row::new().with("id", 1);
        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        let err = row.try_get("nope").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn expect_one_semantics() {
        assert!(expect_one(vec![]).unwrap_err().is_not_found());
        let first = Row::new().with("id", 1);
        let rows = vec![first.clone(), Row::new().with("id", 2)];
        assert_eq!(expect_one(rows).unwrap(), first);
    }
}
