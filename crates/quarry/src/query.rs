//! The fluent, value-semantics query descriptor.
//!
//! Every mutator consumes `self` and returns a modified copy; a base query
//! can be cloned and branched into several specialized queries without any
//! of them observing the others' edits. A descriptor is created fresh per
//! logical query and discarded after compilation.

use crate::changeset::Changeset;
use crate::filter::Filter;
use crate::value::Value;

/// Join rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinMode {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinMode::Inner => "JOIN",
            JoinMode::Left => "LEFT JOIN",
            JoinMode::Right => "RIGHT JOIN",
            JoinMode::Full => "FULL JOIN",
        }
    }
}

/// A join clause.
///
/// When no explicit filter is supplied the convention equality
/// `<parent>.<singular(child)>_id = <child>.id` is rendered from
/// `from` / `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub mode: JoinMode,
    pub collection: String,
    pub from: String,
    pub to: String,
    pub filter: Filter,
}

/// Sort direction for an ORDER BY entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// A single ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// An immutable description of a query against one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub collection: String,
    pub fields: Vec<String>,
    pub distinct: bool,
    pub joins: Vec<Join>,
    pub filter: Filter,
    pub group_fields: Vec<String>,
    pub having: Filter,
    pub orders: Vec<Order>,
    pub offset: u64,
    pub limit: u64,
    pub lock: Option<String>,
    pub changes: Changeset,
}

impl Query {
    /// Start a query against a collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    /// Select specific fields instead of `*`.
    pub fn select<F: Into<String>>(mut self, fields: impl IntoIterator<Item = F>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Request DISTINCT results.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Join another collection using the convention equality
    /// `<parent>.<singular(child)>_id = <child>.id`.
    pub fn join(self, collection: impl Into<String>) -> Self {
        self.join_with(JoinMode::Inner, collection)
    }

    /// Left-join another collection using the convention equality.
    pub fn left_join(self, collection: impl Into<String>) -> Self {
        self.join_with(JoinMode::Left, collection)
    }

    /// Join with an explicit mode, synthesizing the convention equality.
    pub fn join_with(mut self, mode: JoinMode, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        let from = format!("{}.{}_id", self.collection, singularize(&collection));
        let to = format!("{collection}.id");
        self.joins.push(Join {
            mode,
            collection,
            from,
            to,
            filter: Filter::none(),
        });
        self
    }

    /// Join on an explicit column equality.
    pub fn join_on(
        mut self,
        mode: JoinMode,
        collection: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.joins.push(Join {
            mode,
            collection: collection.into(),
            from: from.into(),
            to: to.into(),
            filter: Filter::none(),
        });
        self
    }

    /// Join on an explicit filter condition.
    pub fn join_filter(
        mut self,
        mode: JoinMode,
        collection: impl Into<String>,
        filter: Filter,
    ) -> Self {
        self.joins.push(Join {
            mode,
            collection: collection.into(),
            from: String::new(),
            to: String::new(),
            filter,
        });
        self
    }

    /// AND a filter onto the WHERE condition.
    pub fn where_(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and(filter);
        self
    }

    /// AND several filters onto the WHERE condition. Zero filters is a no-op.
    pub fn where_all(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filter = self.filter.and_all(filters);
        self
    }

    /// OR a group of filters against everything accumulated so far:
    /// `existing OR (f1 AND f2 AND ...)`.
    pub fn or_where(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filter = self.filter.or(Filter::all(filters));
        self
    }

    /// Set the GROUP BY fields.
    pub fn group<F: Into<String>>(mut self, fields: impl IntoIterator<Item = F>) -> Self {
        self.group_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// AND a filter onto the HAVING condition.
    pub fn having(mut self, filter: Filter) -> Self {
        self.having = self.having.and(filter);
        self
    }

    /// OR a group of filters against the accumulated HAVING condition.
    pub fn or_having(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.having = self.having.or(Filter::all(filters));
        self
    }

    /// Append an ORDER BY entry.
    pub fn order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    /// Append an ascending ORDER BY entry.
    pub fn order_asc(self, field: impl Into<String>) -> Self {
        self.order(Order::asc(field))
    }

    /// Append a descending ORDER BY entry.
    pub fn order_desc(self, field: impl Into<String>) -> Self {
        self.order(Order::desc(field))
    }

    /// Skip the first `offset` rows. Only rendered when a limit is set.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Return at most `limit` rows. Zero means no limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Append a raw lock clause (e.g. `FOR UPDATE`).
    pub fn lock(mut self, clause: impl Into<String>) -> Self {
        self.lock = Some(clause.into());
        self
    }

    /// Filter by primary key: AND `id = <id>`.
    pub fn find(self, id: impl Into<Value>) -> Self {
        self.where_(Filter::eq("id", id))
    }

    /// Attach pending changes to carry alongside the descriptor.
    pub fn changes(mut self, changes: Changeset) -> Self {
        self.changes = changes;
        self
    }
}

// Convention joins shave one trailing 's' off the child collection name.
fn singularize(collection: &str) -> &str {
    collection.strip_suffix('s').unwrap_or(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;

    #[test]
    fn mutators_return_modified_copies() {
        let base = Query::new("users").where_(Filter::eq("active", true));
        let adults = base.clone().where_(Filter::gte("age", 18));
        let named = base.clone().where_(Filter::like("name", "A%"));

        // The base is untouched by either branch.
        assert_eq!(base, Query::new("users").where_(Filter::eq("active", true)));
        assert_ne!(adults, named);
    }

    #[test]
    fn where_with_nothing_is_a_noop() {
        let q = Query::new("users").where_all([]);
        assert!(q.filter.is_none());
    }

    #[test]
    fn or_where_groups_new_clauses() {
        let q = Query::new("users")
            .where_(Filter::eq("a", 1))
            .or_where([Filter::eq("b", 2), Filter::eq("c", 3)]);
        match q.filter {
            Filter::Or(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[1], Filter::And(_)));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn join_synthesizes_convention_equality() {
        let q = Query::new("users").join("posts");
        assert_eq!(q.joins.len(), 1);
        let join = &q.joins[0];
        assert_eq!(join.mode, JoinMode::Inner);
        assert_eq!(join.from, "users.post_id");
        assert_eq!(join.to, "posts.id");
    }

    #[test]
    fn find_filters_on_id() {
        let q = Query::new("users").find(7);
        assert_eq!(q.filter, Filter::eq("id", 7));
    }
}
