//! # quarry
//!
//! A dialect-aware database access core for Rust.
//!
//! ## Features
//!
//! - **Composable filters**: immutable boolean trees for WHERE/HAVING (`Filter`)
//! - **Ordered changesets**: deterministic write plans with `Set`/`Increment`/`Decrement`/raw fragments
//! - **Immutable queries**: value-style builders that branch without aliasing (`Query`)
//! - **Dialect compiler**: one descriptor, many SQL flavors; SQL text plus ordered args (`Builder`)
//! - **Registered schemas**: static entity metadata instead of runtime reflection (`EntityMeta`)
//! - **Batched preloading**: one follow-up query per association path (`Preloader`)
//!
//! ## Compiling a query
//!
//! ```ignore
//! use quarry::{Builder, Dialect, Filter, Query};
//!
//! let query = Query::new("users")
//!     .where_(Filter::eq("active", true))
//!     .order_desc("created_at")
//!     .limit(10);
//!
//! let (sql, args) = Builder::new(Dialect::postgres()).select(&query);
//! // SELECT * FROM "users" WHERE "active"=$1 ORDER BY "created_at" DESC LIMIT 10;
//! ```
//!
//! ## Writing records
//!
//! ```ignore
//! use quarry::{Builder, Changeset, Dialect, Filter};
//!
//! let changes = Changeset::new()
//!     .set("name", "alice")
//!     .increment("visits", 1);
//!
//! let (sql, args) = Builder::new(Dialect::postgres())
//!     .returning("id")
//!     .insert("users", &changes);
//! ```

pub mod builder;
pub mod changeset;
pub mod dialect;
pub mod error;
pub mod filter;
pub mod preload;
pub mod query;
pub mod schema;
pub mod value;

pub use builder::Builder;
pub use changeset::{Change, ChangeOp, Changeset, insert_all_fields};
pub use dialect::Dialect;
pub use error::{Error, Result};
pub use filter::{Comparison, Filter};
pub use preload::{Executor, Preloader};
pub use query::{Direction, Join, JoinMode, Order, Query};
pub use schema::{
    Association, Cardinality, EntityMeta, FieldMeta, FromRow, Nested, Record, Row, expect_one,
};
pub use value::Value;
