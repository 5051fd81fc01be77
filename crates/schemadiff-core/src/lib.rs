//! # schemadiff-core
//!
//! Schema diffing and migration statement compilation for MySQL.
//!
//! This crate provides:
//! - A keyed, in-memory catalog of tables, columns, keys, indexes, checks
//!   and views
//! - A structural differ producing per-field alter records
//! - Rename resolution through an injected async [`RenameResolver`], with
//!   cascading propagation to dependent entities
//! - Commutativity rules that suppress equivalent changes
//! - A compiler that orders statements so dependencies are freed before
//!   they are needed, and a MySQL renderer
//!
//! ## Diffing two catalogs
//!
//! ```rust
//! use schemadiff_core::{ddl_diff, Catalog, Column, DiffOptions, MappedResolver, Table};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> schemadiff_core::Result<()> {
//! let mut old = Catalog::new();
//! old.push(Table::new("users"));
//! old.push(Column::new("users", "id", "int").not_null());
//!
//! let mut new = Catalog::new();
//! new.push(Table::new("people"));
//! new.push(Column::new("people", "id", "int").not_null());
//!
//! let resolver = MappedResolver::new(["users->people"])?;
//! let out = ddl_diff(old, new, &resolver, &DiffOptions::default()).await?;
//! assert_eq!(out.sql_statements, vec!["RENAME TABLE `users` TO `people`;"]);
//! # Ok(())
//! # }
//! ```

pub mod commutative;
pub mod compiler;
pub mod convertor;
pub mod ddl;
pub mod diff;
pub mod engine;
pub mod error;
pub mod grammar;
pub mod interim;
pub mod propagate;
pub mod resolver;
pub mod snapshot;
pub mod statements;

pub use convertor::{statements_to_sql, ConversionResult, Convertor, BREAKPOINT};
pub use ddl::{
    Catalog, CheckConstraint, Column, ColumnDefault, Entity, EntityType, ForeignKey, Index,
    IndexColumn, PrimaryKey, ReferentialAction, Table, View, ViewColumn,
};
pub use diff::{Alters, CatalogDiff};
pub use engine::{ddl_diff, DiffOptions, DiffOutput, Mode};
pub use error::{DiffError, Result, SchemaError, ValidationError};
pub use interim::{InterimColumn, InterimSchema};
pub use resolver::{
    CreateDropResolver, MappedResolver, RenameResolver, Renamed, Resolution, ResolverInput,
};
pub use snapshot::Snapshot;
pub use statements::{Statement, StatementKind};
