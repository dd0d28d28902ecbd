//! Ordered field mutations destined for INSERT / UPDATE.
//!
//! A [`Changeset`] is an ordered sequence, not a mapping: the order changes
//! are recorded in fixes the argument/placeholder order of the generated SQL.
//! A later change for a field overrides an earlier one only when the caller
//! explicitly asks for it via [`Changeset::replace`]; nothing is deduplicated
//! silently within a compile.

use crate::schema::{EntityMeta, Record};
use crate::value::Value;
use chrono::{SubsecRound, Utc};

/// The operation a single change applies to its field.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOp {
    /// col = value
    Set(Value),
    /// col = col + value (update only)
    Increment(Value),
    /// col = col - value (update only)
    Decrement(Value),
    /// Raw SQL assignment; the change's `field` holds the SQL text.
    ///
    /// # Safety
    /// Be careful with SQL injection when using fragments.
    Fragment(Vec<Value>),
}

/// A single field mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub field: String,
    pub op: ChangeOp,
}

/// An ordered list of field mutations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    changes: Vec<Change>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field value.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.changes.push(Change {
            field: field.into(),
            op: ChangeOp::Set(value.into()),
        });
        self
    }

    /// Increment a field by a delta.
    pub fn increment(mut self, field: impl Into<String>, delta: impl Into<Value>) -> Self {
        self.changes.push(Change {
            field: field.into(),
            op: ChangeOp::Increment(delta.into()),
        });
        self
    }

    /// Decrement a field by a delta.
    pub fn decrement(mut self, field: impl Into<String>, delta: impl Into<Value>) -> Self {
        self.changes.push(Change {
            field: field.into(),
            op: ChangeOp::Decrement(delta.into()),
        });
        self
    }

    /// Append a raw SQL assignment with bound values.
    ///
    /// # Safety
    /// Be careful with SQL injection when using fragments.
    pub fn fragment<V: Into<Value>>(
        mut self,
        sql: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.changes.push(Change {
            field: sql.into(),
            op: ChangeOp::Fragment(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    /// Explicitly override every earlier change for `field` with a new value.
    pub fn replace(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        self.changes.retain(|c| c.field != field);
        self.set(field, value)
    }

    /// The recorded changes, in order.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// The effective change for a field: the last one recorded.
    pub fn get(&self, field: &str) -> Option<&Change> {
        self.changes.iter().rev().find(|c| c.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Derive an insert changeset from a record.
    ///
    /// Walks the entity's declared fields in order, dropping non-scannable
    /// (derived) fields. When the entity declares temporal `created_at` or
    /// `updated_at` fields and the record supplies no explicit value for
    /// them, "now" truncated to whole seconds is injected.
    pub fn for_insert(record: &dyn Record) -> Self {
        let meta = record.meta();
        let mut cs = Self::derive(record, meta);
        let now = timestamp_now();
        cs.fill_temporal(meta, "created_at", now.clone());
        cs.fill_temporal(meta, "updated_at", now);
        cs
    }

    /// Derive an update changeset from a record.
    ///
    /// Same derivation as [`Changeset::for_insert`], except only
    /// `updated_at` is injected, and temporal fields the record reports as
    /// `Null` (no explicit value) are dropped entirely so an update never
    /// clobbers a stored timestamp such as `created_at`.
    pub fn for_update(record: &dyn Record) -> Self {
        let meta = record.meta();
        let mut cs = Self::derive(record, meta);
        cs.changes.retain(|c| {
            !(meta.declares_temporal(&c.field) && matches!(c.op, ChangeOp::Set(Value::Null)))
        });
        cs.fill_temporal(meta, "updated_at", timestamp_now());
        cs
    }

    fn derive(record: &dyn Record, meta: &EntityMeta) -> Self {
        let mut cs = Self::new();
        for field in &meta.fields {
            if !field.scannable {
                continue;
            }
            if let Some(value) = record.field(field.name) {
                cs = cs.set(field.name, value);
            }
        }
        cs
    }

    // A recorded Null counts as "no explicit value" for timestamp fields.
    fn fill_temporal(&mut self, meta: &EntityMeta, field: &str, now: Value) {
        if !meta.declares_temporal(field) {
            return;
        }
        let explicit = self
            .get(field)
            .is_some_and(|c| !matches!(c.op, ChangeOp::Set(Value::Null)));
        if !explicit {
            *self = std::mem::take(self).replace(field, now);
        }
    }
}

fn timestamp_now() -> Value {
    Value::DateTimeUtc(Utc::now().trunc_subsecs(0))
}

/// Compute the column list for a multi-row insert.
///
/// The result is the union of field names across all changesets plus any
/// explicitly-selected query-level fields, in the entity's declared field
/// order, with declared temporal `created_at`/`updated_at` always included.
/// Fields unknown to the entity are appended afterwards in first-seen order.
pub fn insert_all_fields(
    meta: &EntityMeta,
    changesets: &[Changeset],
    query_fields: &[String],
) -> Vec<String> {
    let wanted = |name: &str| {
        query_fields.iter().any(|f| f == name)
            || changesets.iter().any(|cs| cs.get(name).is_some())
    };

    let mut fields: Vec<String> = Vec::new();
    for field in &meta.fields {
        if !field.scannable {
            continue;
        }
        let always = field.temporal && (field.name == "created_at" || field.name == "updated_at");
        if always || wanted(field.name) {
            fields.push(field.name.to_string());
        }
    }

    for cs in changesets {
        for change in cs.changes() {
            if matches!(change.op, ChangeOp::Set(_))
                && meta.field_meta(&change.field).is_none()
                && !fields.contains(&change.field)
            {
                fields.push(change.field.clone());
            }
        }
    }
    for field in query_fields {
        if meta.field_meta(field).is_none() && !fields.contains(field) {
            fields.push(field.clone());
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::schema::{Nested, Row};
    use std::sync::LazyLock;

    static USER_META: LazyLock<EntityMeta> = LazyLock::new(|| {
        EntityMeta::new("users")
            .field("id")
            .field("name")
            .derived_field("post_count")
            .temporal_field("created_at")
            .temporal_field("updated_at")
    });

    struct User {
        id: i64,
        name: String,
        post_count: i64,
    }

    impl Record for User {
        fn meta(&self) -> &'static EntityMeta {
            &USER_META
        }

        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "id" => Some(self.id.into()),
                "name" => Some(self.name.clone().into()),
                "post_count" => Some(self.post_count.into()),
                "created_at" | "updated_at" => Some(Value::Null),
                _ => None,
            }
        }

        fn nested_mut(&mut self, _name: &str) -> Option<Nested<'_>> {
            None
        }

        fn attach(&mut self, _name: &str, _rows: &[Row]) -> Result<()> {
            Ok(())
        }
    }

    fn alice() -> User {
        User {
            id: 1,
            name: "Alice".into(),
            post_count: 9,
        }
    }

    #[test]
    fn changes_keep_recorded_order() {
        let cs = Changeset::new()
            .set("b", 2)
            .set("a", 1)
            .increment("counter", 1);
        let fields: Vec<&str> = cs.changes().iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, ["b", "a", "counter"]);
    }

    #[test]
    fn duplicate_fields_are_not_deduplicated() {
        let cs = Changeset::new().set("a", 1).set("a", 2);
        assert_eq!(cs.len(), 2);
        // The effective change is the last one.
        assert_eq!(
            cs.get("a").unwrap().op,
            ChangeOp::Set(Value::Int(2))
        );
    }

    #[test]
    fn replace_overrides_earlier_changes() {
        let cs = Changeset::new().set("a", 1).set("b", 2).replace("a", 3);
        assert_eq!(cs.len(), 2);
        assert_eq!(cs.get("a").unwrap().op, ChangeOp::Set(Value::Int(3)));
        // Replaced field moves to the end of the order.
        assert_eq!(cs.changes().last().unwrap().field, "a");
    }

    #[test]
    fn derived_fields_are_dropped() {
        let cs = Changeset::for_insert(&alice());
        assert!(cs.get("post_count").is_none());
        assert!(cs.get("id").is_some());
        assert!(cs.get("name").is_some());
    }

    #[test]
    fn insert_injects_truncated_timestamps() {
        let cs = Changeset::for_insert(&alice());
        for field in ["created_at", "updated_at"] {
            match &cs.get(field).unwrap().op {
                ChangeOp::Set(Value::DateTimeUtc(ts)) => {
                    assert_eq!(ts.timestamp_subsec_nanos(), 0, "{field} not truncated");
                }
                other => panic!("expected injected timestamp for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn update_injects_only_updated_at() {
        let cs = Changeset::for_update(&alice());
        assert!(matches!(
            cs.get("updated_at").unwrap().op,
            ChangeOp::Set(Value::DateTimeUtc(_))
        ));
        // The record reported created_at as Null, so the update must not
        // mention it at all.
        assert!(cs.get("created_at").is_none());
        let fields: Vec<&str> = cs.changes().iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, ["id", "name", "updated_at"]);
    }

    #[test]
    fn replace_overrides_injected_timestamp() {
        let ts = chrono::DateTime::parse_from_rfc3339("2020-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let cs = Changeset::for_insert(&alice()).replace("created_at", ts);
        assert_eq!(
            cs.get("created_at").unwrap().op,
            ChangeOp::Set(Value::DateTimeUtc(ts))
        );
    }

    #[test]
    fn insert_all_fields_union_in_declared_order() {
        let a = Changeset::new().set("name", "a");
        let b = Changeset::new().set("id", 2).set("nickname", "b");
        let fields = insert_all_fields(&USER_META, &[a, b], &[]);
        assert_eq!(
            fields,
            ["id", "name", "created_at", "updated_at", "nickname"]
        );
    }

    #[test]
    fn insert_all_fields_includes_query_fields() {
        let fields = insert_all_fields(&USER_META, &[], &["name".to_string()]);
        assert_eq!(fields, ["name", "created_at", "updated_at"]);
    }
}
