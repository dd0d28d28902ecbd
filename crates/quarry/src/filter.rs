//! Boolean filter expression trees for WHERE and HAVING clauses.
//!
//! A [`Filter`] is an immutable value: combinators consume their operands and
//! return a new tree, so a caller holding a clone of an earlier tree never
//! observes mutation. The empty `And` group is the identity element and
//! compiles to no clause at all.

use crate::value::Value;

/// Comparison operator for [`Filter::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparison {
    pub fn as_sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
        }
    }
}

/// A node in the boolean filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// AND group: all children must hold. Empty group is the identity.
    And(Vec<Filter>),
    /// OR group: at least one child must hold.
    Or(Vec<Filter>),
    /// Negation of the inner filter.
    Not(Box<Filter>),
    /// Comparison against a bound value: field op placeholder.
    Compare {
        field: String,
        op: Comparison,
        value: Value,
    },
    /// field IS NULL
    IsNull(String),
    /// field IS NOT NULL
    IsNotNull(String),
    /// field IN (...) / field NOT IN (...), one placeholder per value.
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// field LIKE pattern / field NOT LIKE pattern.
    Like {
        field: String,
        pattern: Value,
        negated: bool,
    },
    /// Raw SQL fragment with bound values, passed through verbatim.
    ///
    /// # Safety
    /// Be careful with SQL injection when using fragments.
    Fragment { sql: String, values: Vec<Value> },
}

impl Default for Filter {
    fn default() -> Self {
        Filter::none()
    }
}

impl Filter {
    /// The identity filter. Compiles to no clause.
    pub fn none() -> Self {
        Filter::And(Vec::new())
    }

    /// AND all given filters together. Zero items yield the identity.
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::none().and_all(filters)
    }

    /// OR all given filters together. Zero items yield the identity.
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<Filter> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Filter::none(),
            1 => filters.pop().unwrap_or_default(),
            _ => Filter::Or(filters),
        }
    }

    /// Negate a filter.
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// field = value
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Eq, value)
    }

    /// field <> value
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Ne, value)
    }

    /// field < value
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Lt, value)
    }

    /// field <= value
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Lte, value)
    }

    /// field > value
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Gt, value)
    }

    /// field >= value
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Gte, value)
    }

    /// field op value
    pub fn compare(field: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        Filter::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// field IS NULL
    pub fn is_null(field: impl Into<String>) -> Self {
        Filter::IsNull(field.into())
    }

    /// field IS NOT NULL
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Filter::IsNotNull(field.into())
    }

    /// field IN (values...)
    pub fn in_list<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// field NOT IN (values...)
    pub fn not_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    /// field LIKE pattern
    pub fn like(field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Filter::Like {
            field: field.into(),
            pattern: pattern.into(),
            negated: false,
        }
    }

    /// field NOT LIKE pattern
    pub fn not_like(field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Filter::Like {
            field: field.into(),
            pattern: pattern.into(),
            negated: true,
        }
    }

    /// Raw SQL fragment with bound values.
    ///
    /// # Safety
    /// Be careful with SQL injection when using fragments.
    pub fn fragment<V: Into<Value>>(
        sql: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::Fragment {
            sql: sql.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this filter is the identity (contains no conditions).
    pub fn is_none(&self) -> bool {
        match self {
            Filter::And(children) | Filter::Or(children) => {
                children.is_empty() || children.iter().all(Filter::is_none)
            }
            Filter::Not(inner) => inner.is_none(),
            _ => false,
        }
    }

    /// Combine with AND, returning a new tree.
    ///
    /// The identity short-circuits on either side; an existing AND group
    /// absorbs the new operand instead of nesting.
    pub fn and(self, other: Filter) -> Filter {
        if other.is_none() {
            return self;
        }
        if self.is_none() {
            return other;
        }
        match self {
            Filter::And(mut children) => {
                children.push(other);
                Filter::And(children)
            }
            current => Filter::And(vec![current, other]),
        }
    }

    /// AND every filter in `others` onto this tree in order.
    pub fn and_all(self, others: impl IntoIterator<Item = Filter>) -> Filter {
        others.into_iter().fold(self, Filter::and)
    }

    /// Combine with OR, returning a new tree.
    ///
    /// The existing accumulated filter becomes one OR operand and `other`
    /// the next, so `a.and(b).or(c)` reads `(a AND b) OR c`.
    pub fn or(self, other: Filter) -> Filter {
        if other.is_none() {
            return self;
        }
        if self.is_none() {
            return other;
        }
        match self {
            Filter::Or(mut children) => {
                children.push(other);
                Filter::Or(children)
            }
            current => Filter::Or(vec![current, other]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity_for_and() {
        let f = Filter::none().and(Filter::eq("id", 1));
        assert_eq!(f, Filter::eq("id", 1));

        let f = Filter::eq("id", 1).and(Filter::none());
        assert_eq!(f, Filter::eq("id", 1));
    }

    #[test]
    fn none_is_identity_for_or() {
        let f = Filter::none().or(Filter::eq("id", 1));
        assert_eq!(f, Filter::eq("id", 1));
    }

    #[test]
    fn all_of_nothing_is_none() {
        assert!(Filter::all([]).is_none());
        assert!(Filter::any([]).is_none());
    }

    #[test]
    fn and_absorbs_into_existing_group() {
        let f = Filter::eq("a", 1)
            .and(Filter::eq("b", 2))
            .and(Filter::eq("c", 3));
        match f {
            Filter::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected And group, got {other:?}"),
        }
    }

    #[test]
    fn or_wraps_accumulated_tree() {
        let f = Filter::eq("a", 1)
            .and(Filter::eq("b", 2))
            .or(Filter::eq("c", 3));
        match f {
            Filter::Or(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0], Filter::And(_)));
            }
            other => panic!("expected Or group, got {other:?}"),
        }
    }

    #[test]
    fn combinators_do_not_mutate_the_original() {
        let base = Filter::eq("a", 1);
        let branched = base.clone().and(Filter::eq("b", 2));
        assert_eq!(base, Filter::eq("a", 1));
        assert_ne!(base, branched);
    }

    #[test]
    fn nested_empty_groups_are_none() {
        let f = Filter::And(vec![Filter::Or(vec![]), Filter::And(vec![])]);
        assert!(f.is_none());
    }
}
