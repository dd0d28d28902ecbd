//! The dialect-aware SQL compiler.
//!
//! A [`Builder`] renders query descriptors and changesets into SQL text plus
//! an ordered argument list. Compilation is total over well-formed inputs:
//! it never fails, it only produces `(String, Vec<Value>)` pairs for an
//! external executor to run.

use crate::changeset::{ChangeOp, Changeset};
use crate::dialect::Dialect;
use crate::filter::Filter;
use crate::query::{Direction, Query};
use crate::value::Value;

/// Per-compile placeholder state.
///
/// Each compile call gets a fresh counter, so ordinal dialects restart at
/// `$1` for every statement and a builder can be shared across compiles.
struct Placeholders<'a> {
    dialect: &'a Dialect,
    count: usize,
}

impl<'a> Placeholders<'a> {
    fn new(dialect: &'a Dialect) -> Self {
        Self { dialect, count: 0 }
    }

    fn next(&mut self) -> String {
        if self.dialect.ordinal {
            self.count += 1;
            format!("{}{}", self.dialect.placeholder, self.count)
        } else {
            self.dialect.placeholder.clone()
        }
    }
}

/// Compiles query descriptors into dialect-specific statements.
#[derive(Debug, Clone)]
pub struct Builder {
    dialect: Dialect,
    returning: Option<String>,
}

impl Builder {
    /// Create a compiler for a dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            returning: None,
        }
    }

    /// Request a `RETURNING <field>` clause on inserts.
    pub fn returning(mut self, field: impl Into<String>) -> Self {
        self.returning = Some(field.into());
        self
    }

    /// The dialect this compiler renders for.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Compile a SELECT statement.
    pub fn select(&self, query: &Query) -> (String, Vec<Value>) {
        let mut ph = Placeholders::new(&self.dialect);
        let mut sql = self.fields_clause(query.distinct, &query.fields);
        let mut args = Vec::new();

        sql.push_str(" FROM ");
        sql.push_str(&self.dialect.escape(&query.collection));

        for join in &query.joins {
            sql.push(' ');
            sql.push_str(join.mode.as_sql());
            sql.push(' ');
            sql.push_str(&self.dialect.escape(&join.collection));
            sql.push_str(" ON ");
            if join.filter.is_none() {
                sql.push_str(&self.dialect.escape(&join.from));
                sql.push('=');
                sql.push_str(&self.dialect.escape(&join.to));
            } else {
                sql.push_str(&self.filter_sql(&join.filter, &mut ph, &mut args));
            }
        }

        if !query.filter.is_none() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.filter_sql(&query.filter, &mut ph, &mut args));
        }

        if !query.group_fields.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.escaped_list(&query.group_fields));

            if !query.having.is_none() {
                sql.push_str(" HAVING ");
                sql.push_str(&self.filter_sql(&query.having, &mut ph, &mut args));
            }
        }

        if !query.orders.is_empty() {
            sql.push_str(" ORDER BY ");
            let rendered: Vec<String> = query
                .orders
                .iter()
                .map(|o| {
                    let dir = match o.direction {
                        Direction::Asc => "ASC",
                        Direction::Desc => "DESC",
                    };
                    format!("{} {dir}", self.dialect.escape(&o.field))
                })
                .collect();
            sql.push_str(&rendered.join(", "));
        }

        if query.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", query.limit));
            if query.offset > 0 {
                sql.push_str(&format!(" OFFSET {}", query.offset));
            }
        }

        if let Some(lock) = &query.lock {
            sql.push(' ');
            sql.push_str(lock);
        }

        sql.push(';');
        tracing::debug!(sql = %sql, args = args.len(), "compiled select");
        (sql, args)
    }

    /// Compile an UPDATE from a descriptor carrying its own changeset.
    pub fn update_query(&self, query: &Query) -> Option<(String, Vec<Value>)> {
        self.update(&query.collection, &query.changes, &query.filter)
    }

    /// Compile a DELETE from a descriptor.
    pub fn delete_query(&self, query: &Query) -> (String, Vec<Value>) {
        self.delete(&query.collection, &query.filter)
    }

    /// Compile a single-row INSERT statement.
    ///
    /// `Increment`/`Decrement` and `Fragment` changes carry update-only
    /// semantics and are skipped. An empty changeset renders
    /// `DEFAULT VALUES` when the dialect supports it.
    pub fn insert(&self, collection: &str, changes: &Changeset) -> (String, Vec<Value>) {
        let mut ph = Placeholders::new(&self.dialect);
        let mut sql = String::from("INSERT INTO ");
        let mut args = Vec::new();
        sql.push_str(&self.dialect.escape(collection));

        let mut columns = Vec::new();
        for change in changes.changes() {
            if let ChangeOp::Set(value) = &change.op {
                columns.push(self.dialect.escape(&change.field));
                args.push(value.clone());
            }
        }

        if columns.is_empty() && self.dialect.insert_default_values {
            sql.push_str(" DEFAULT VALUES");
        } else {
            let placeholders: Vec<String> = (0..args.len()).map(|_| ph.next()).collect();
            sql.push_str(" (");
            sql.push_str(&columns.join(","));
            sql.push_str(") VALUES (");
            sql.push_str(&placeholders.join(","));
            sql.push(')');
        }

        self.push_returning(&mut sql);
        sql.push(';');
        tracing::debug!(sql = %sql, args = args.len(), "compiled insert");
        (sql, args)
    }

    /// Compile a multi-row INSERT statement over a fixed field list.
    ///
    /// Every row emits one placeholder per `Set` change it carries for a
    /// field, and the `DEFAULT` token for fields absent from its changeset;
    /// the field order is fixed at batch start.
    pub fn insert_all(
        &self,
        collection: &str,
        fields: &[String],
        all_changes: &[Changeset],
    ) -> (String, Vec<Value>) {
        let mut ph = Placeholders::new(&self.dialect);
        let mut sql = String::from("INSERT INTO ");
        let mut args = Vec::with_capacity(fields.len() * all_changes.len());
        sql.push_str(&self.dialect.escape(collection));

        sql.push_str(" (");
        sql.push_str(&self.escaped_list(fields));
        sql.push_str(") VALUES ");

        let mut rows = Vec::with_capacity(all_changes.len());
        for changes in all_changes {
            let mut cells = Vec::with_capacity(fields.len());
            for field in fields {
                match changes.get(field).map(|c| &c.op) {
                    Some(ChangeOp::Set(value)) => {
                        cells.push(ph.next());
                        args.push(value.clone());
                    }
                    _ => cells.push("DEFAULT".to_string()),
                }
            }
            rows.push(format!("({})", cells.join(",")));
        }
        sql.push_str(&rows.join(","));

        self.push_returning(&mut sql);
        sql.push(';');
        tracing::debug!(sql = %sql, rows = all_changes.len(), "compiled multi-row insert");
        (sql, args)
    }

    /// Compile an UPDATE statement.
    ///
    /// An update whose changeset is empty is a documented no-op: `None` is
    /// returned and nothing must be sent to the executor.
    pub fn update(
        &self,
        collection: &str,
        changes: &Changeset,
        filter: &Filter,
    ) -> Option<(String, Vec<Value>)> {
        if changes.is_empty() {
            return None;
        }

        let mut ph = Placeholders::new(&self.dialect);
        let mut sql = String::from("UPDATE ");
        let mut args = Vec::new();
        sql.push_str(&self.dialect.escape(collection));
        sql.push_str(" SET ");

        let mut assignments = Vec::with_capacity(changes.len());
        for change in changes.changes() {
            match &change.op {
                ChangeOp::Set(value) => {
                    let col = self.dialect.escape(&change.field);
                    assignments.push(format!("{col}={}", ph.next()));
                    args.push(value.clone());
                }
                ChangeOp::Increment(delta) => {
                    let col = self.dialect.escape(&change.field);
                    assignments.push(format!("{col}={col}+{}", ph.next()));
                    args.push(delta.clone());
                }
                ChangeOp::Decrement(delta) => {
                    let col = self.dialect.escape(&change.field);
                    assignments.push(format!("{col}={col}-{}", ph.next()));
                    args.push(delta.clone());
                }
                ChangeOp::Fragment(values) => {
                    assignments.push(change.field.clone());
                    args.extend(values.iter().cloned());
                }
            }
        }
        sql.push_str(&assignments.join(","));

        if !filter.is_none() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.filter_sql(filter, &mut ph, &mut args));
        }

        sql.push(';');
        tracing::debug!(sql = %sql, args = args.len(), "compiled update");
        Some((sql, args))
    }

    /// Compile a DELETE statement.
    pub fn delete(&self, collection: &str, filter: &Filter) -> (String, Vec<Value>) {
        let mut ph = Placeholders::new(&self.dialect);
        let mut sql = String::from("DELETE FROM ");
        let mut args = Vec::new();
        sql.push_str(&self.dialect.escape(collection));

        if !filter.is_none() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.filter_sql(filter, &mut ph, &mut args));
        }

        sql.push(';');
        tracing::debug!(sql = %sql, args = args.len(), "compiled delete");
        (sql, args)
    }

    fn push_returning(&self, sql: &mut String) {
        if let Some(field) = &self.returning {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.dialect.escape(field));
        }
    }

    fn fields_clause(&self, distinct: bool, fields: &[String]) -> String {
        let head = if distinct {
            "SELECT DISTINCT "
        } else {
            "SELECT "
        };
        if fields.is_empty() {
            return format!("{head}*");
        }
        format!("{head}{}", self.escaped_list(fields))
    }

    fn escaped_list(&self, fields: &[String]) -> String {
        fields
            .iter()
            .map(|f| self.dialect.escape(f))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn filter_sql(&self, filter: &Filter, ph: &mut Placeholders, args: &mut Vec<Value>) -> String {
        match filter {
            Filter::And(children) => self.group_sql("AND", children, ph, args),
            Filter::Or(children) => self.group_sql("OR", children, ph, args),
            Filter::Not(inner) => {
                if inner.is_none() {
                    String::new()
                } else {
                    // The inner rendering already parenthesizes multi-child
                    // groups, so NOT adds no parentheses of its own.
                    format!("NOT {}", self.filter_sql(inner, ph, args))
                }
            }
            Filter::Compare { field, op, value } => {
                let sql = format!("{}{}{}", self.dialect.escape(field), op.as_sql(), ph.next());
                args.push(value.clone());
                sql
            }
            Filter::IsNull(field) => format!("{} IS NULL", self.dialect.escape(field)),
            Filter::IsNotNull(field) => format!("{} IS NOT NULL", self.dialect.escape(field)),
            Filter::In {
                field,
                values,
                negated,
            } => {
                // An empty list can never match; NOT IN of nothing always does.
                if values.is_empty() {
                    return if *negated { "1=1" } else { "1=0" }.to_string();
                }
                let placeholders: Vec<String> = values.iter().map(|_| ph.next()).collect();
                args.extend(values.iter().cloned());
                let op = if *negated { "NOT IN" } else { "IN" };
                format!(
                    "{} {op} ({})",
                    self.dialect.escape(field),
                    placeholders.join(",")
                )
            }
            Filter::Like {
                field,
                pattern,
                negated,
            } => {
                let op = if *negated { "NOT LIKE" } else { "LIKE" };
                let sql = format!("{} {op} {}", self.dialect.escape(field), ph.next());
                args.push(pattern.clone());
                sql
            }
            Filter::Fragment { sql, values } => {
                args.extend(values.iter().cloned());
                sql.clone()
            }
        }
    }

    // Parentheses only when more than one child actually renders; a
    // single-child group stays flat so output is stable for tests.
    fn group_sql(
        &self,
        op: &str,
        children: &[Filter],
        ph: &mut Placeholders,
        args: &mut Vec<Value>,
    ) -> String {
        let parts: Vec<String> = children
            .iter()
            .filter(|c| !c.is_none())
            .map(|c| self.filter_sql(c, ph, args))
            .collect();
        match parts.len() {
            0 => String::new(),
            1 => parts.into_iter().next().unwrap_or_default(),
            _ => format!("({})", parts.join(&format!(" {op} "))),
        }
    }
}
