//! Association preloading.
//!
//! A [`Preloader`] resolves one association path across a whole set of
//! records with a single follow-up query: it walks already-loaded nested
//! records down to the path's parent level, collects the distinct reference
//! keys found there, issues one `SELECT ... WHERE fk IN (...)` through an
//! [`Executor`], and distributes the fetched rows back onto each parent.

use std::collections::{HashMap, HashSet};

use crate::builder::Builder;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::query::Query;
use crate::schema::{Cardinality, Nested, Record, Row, expect_one};
use crate::value::Value;

/// Executes compiled statements against a backing store.
///
/// The compiler never talks to a database itself; anything that can run a
/// statement and hand back rows can drive it.
pub trait Executor {
    /// Run a statement and return every resulting row.
    fn fetch(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Run a statement expected to yield at least one row.
    fn fetch_one(&self, sql: &str, args: &[Value]) -> impl Future<Output = Result<Row>> + Send
    where
        Self: Sync,
    {
        async move { expect_one(self.fetch(sql, args).await?) }
    }
}

/// Batches association loads, one query per path.
#[derive(Debug, Clone)]
pub struct Preloader {
    dialect: Dialect,
}

impl Preloader {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Load the association at `path` for every record in `records`.
    ///
    /// `path` is a dot-separated chain of association names; every segment
    /// but the last must already be loaded on the records being walked. The
    /// final segment is resolved against the parent's registered metadata
    /// and fetched in a single query.
    pub async fn preload<E, R>(&self, executor: &E, records: &mut [R], path: &str) -> Result<()>
    where
        E: Executor + Sync,
        R: Record,
    {
        let mut roots: Vec<&mut dyn Record> = records
            .iter_mut()
            .map(|r| r as &mut dyn Record)
            .collect();
        self.preload_dyn(executor, &mut roots, path).await
    }

    /// Object-safe variant of [`preload`](Self::preload) for heterogeneous
    /// record collections.
    pub async fn preload_dyn<'a, E>(
        &self,
        executor: &E,
        records: &'a mut [&'a mut dyn Record],
        path: &str,
    ) -> Result<()>
    where
        E: Executor + Sync,
    {
        if path.is_empty() {
            return Err(Error::configuration("preload path is empty"));
        }
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::configuration(format!(
                "preload path {path:?} has an empty segment"
            )));
        }

        let leaves = walk(records, &segments[..segments.len() - 1])?;
        let name = segments[segments.len() - 1];
        self.load_terminal(executor, leaves, path, name).await
    }

    async fn load_terminal<E>(
        &self,
        executor: &E,
        mut leaves: Vec<&mut dyn Record>,
        path: &str,
        name: &str,
    ) -> Result<()>
    where
        E: Executor + Sync,
    {
        let Some(first) = leaves.first() else {
            return Err(Error::configuration(format!(
                "preload path {path:?} matched no records"
            )));
        };
        let meta = first.meta();
        let association = meta.association(name).ok_or_else(|| {
            Error::configuration(format!(
                "collection {:?} declares no association {name:?}",
                meta.collection
            ))
        })?;

        // Distinct keys in first-seen order, so the generated IN list is
        // stable for a given input ordering.
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for leaf in &leaves {
            match leaf.field(association.reference_field) {
                Some(key) if key.is_joinable() => {
                    if seen.insert(key.clone()) {
                        keys.push(key);
                    }
                }
                _ => {}
            }
        }

        let grouped = if keys.is_empty() {
            HashMap::new()
        } else {
            let query = Query::new(association.collection).where_(Filter::In {
                field: association.foreign_key_field.to_string(),
                values: keys,
                negated: false,
            });
            let (sql, args) = Builder::new(self.dialect.clone()).select(&query);
            let rows = executor.fetch(&sql, &args).await?;
            tracing::debug!(
                path = name,
                collection = association.collection,
                rows = rows.len(),
                "preloaded association"
            );
            group_rows(rows, association.foreign_key_field)?
        };

        for leaf in &mut leaves {
            let rows: &[Row] = leaf
                .field(association.reference_field)
                .filter(Value::is_joinable)
                .and_then(|key| grouped.get(&key))
                .map_or(&[], Vec::as_slice);
            // Declared cardinality is enforced here, not left to attach:
            // One receives at most the last matching row.
            match association.cardinality {
                Cardinality::One => {
                    let last = rows.last().map_or(&[] as &[Row], std::slice::from_ref);
                    leaf.attach(name, last)?;
                }
                Cardinality::Many => leaf.attach(name, rows)?,
            }
        }
        Ok(())
    }
}

// Walks intermediate path segments, fanning out through nested records.
fn walk<'a>(
    records: &'a mut [&'a mut dyn Record],
    segments: &[&str],
) -> Result<Vec<&'a mut dyn Record>> {
    let mut leaves: Vec<&mut dyn Record> = records.iter_mut().map(|r| &mut **r).collect();
    for segment in segments {
        let mut next = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            let collection = leaf.meta().collection;
            match leaf.nested_mut(segment) {
                Some(Nested::One(record)) => next.push(record),
                Some(Nested::Many(records)) => next.extend(records),
                None => {
                    return Err(Error::configuration(format!(
                        "collection {collection:?} has no nested records under {segment:?}"
                    )));
                }
            }
        }
        leaves = next;
    }
    Ok(leaves)
}

// Rows keyed by their foreign-key column; a row missing the column is a
// configuration error surfaced to the caller.
fn group_rows(rows: Vec<Row>, foreign_key: &str) -> Result<HashMap<Value, Vec<Row>>> {
    let mut grouped: HashMap<Value, Vec<Row>> = HashMap::new();
    for row in rows {
        let key = row.try_get(foreign_key)?.clone();
        grouped.entry(key).or_default().push(row);
    }
    Ok(grouped)
}
