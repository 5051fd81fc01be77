//! Pipeline orchestration.
//!
//! `ddl_diff` owns both catalogs for the length of one run: it diffs
//! them, asks the resolver about renames (tables, then columns per
//! table, then views), propagates accepted renames, re-diffs, filters
//! alters through the commutativity rules, compiles and renders.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use crate::commutative::Mode;

use crate::commutative::{CommutativityRules, MySqlRules};
use crate::compiler::{compile, CompileInput};
use crate::convertor::{statements_to_sql, Convertor, GroupedStatement};
use crate::ddl::{Catalog, EntityKind, EntityType};
use crate::diff::{diff, group_by_table, CatalogDiff};
use crate::error::{BoxError, DiffError, Result};
use crate::propagate;
use crate::resolver::{rename_entries, verify, RenameResolver, Resolution, ResolverInput};
use crate::statements::{Statement, StatementKind};

/// Options for one diff run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffOptions {
    pub mode: Mode,
    /// Separate statements in [`DiffOutput::migration`] with
    /// `--> statement-breakpoint`.
    pub breakpoints: bool,
}

impl DiffOptions {
    #[must_use]
    pub const fn new(mode: Mode) -> Self {
        Self {
            mode,
            breakpoints: false,
        }
    }

    #[must_use]
    pub const fn with_breakpoints(mut self, breakpoints: bool) -> Self {
        self.breakpoints = breakpoints;
        self
    }
}

/// Result of a diff run.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffOutput {
    /// The abstract statement log, in execution order.
    pub statements: Vec<Statement>,
    pub sql_statements: Vec<String>,
    pub grouped: Vec<GroupedStatement>,
    /// Accepted renames as `old->new` / `table.old->table.new`.
    pub renames: Vec<String>,
    /// Statement kinds that could not be rendered.
    pub unhandled: Vec<StatementKind>,
    /// `sql_statements` joined into migration file text.
    pub migration: String,
}

impl DiffOutput {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Runs the resolver for one batch, or skips it when no pair is
/// possible, and checks its answer.
async fn resolve<T, F, Fut>(
    kind: EntityType,
    input: ResolverInput<T>,
    call: F,
) -> Result<Resolution<T>>
where
    T: EntityKind,
    F: FnOnce(ResolverInput<T>) -> Fut,
    Fut: std::future::Future<Output = std::result::Result<Resolution<T>, BoxError>>,
{
    if input.created.is_empty() || input.deleted.is_empty() {
        return Ok(Resolution::unchanged(input));
    }
    let answer = call(input.clone())
        .await
        .map_err(|source| DiffError::Resolver { kind, source })?;
    verify(&input, &answer)?;
    Ok(answer)
}

/// Computes the migration from `from` to `to`.
///
/// # Errors
///
/// Resolver errors abort the run with [`DiffError::Resolver`] and answers
/// that do not partition their input with [`DiffError::ResolverContract`].
/// Nothing is emitted in either case.
pub async fn ddl_diff<R>(
    mut from: Catalog,
    mut to: Catalog,
    resolver: &R,
    options: &DiffOptions,
) -> Result<DiffOutput>
where
    R: RenameResolver + ?Sized,
{
    // ---- Tables ------------------------------------------------
    let tables = diff(&from.tables, &to.tables);
    debug!(
        created = tables.created.len(),
        dropped = tables.dropped.len(),
        "Table candidates"
    );
    let tables = resolve(
        EntityType::Tables,
        ResolverInput {
            created: tables.created,
            deleted: tables.dropped,
        },
        |input| resolver.tables(input),
    )
    .await?;
    propagate::rename_tables(&mut from, &mut to, &tables.renamed_or_moved)?;

    // ---- Columns -----------------------------------------------
    let columns = diff(&from.columns, &to.columns);
    let groups = group_by_table(
        &columns.created,
        &columns.dropped,
        &tables.created,
        &tables.deleted,
    );
    debug!(tables = groups.len(), "Column candidate groups");
    let mut renamed_columns = Vec::new();
    for group in groups {
        let table = group.table;
        let resolution = resolve(
            EntityType::Columns,
            ResolverInput {
                created: group.created,
                deleted: group.dropped,
            },
            |input| resolver.columns(&table, input),
        )
        .await?;
        renamed_columns.extend(resolution.renamed_or_moved);
    }
    propagate::rename_columns(&mut from, &mut to, &renamed_columns)?;

    // ---- Views -------------------------------------------------
    let views = diff(&from.views, &to.views);
    let views = resolve(
        EntityType::Views,
        ResolverInput {
            created: views.created,
            deleted: views.dropped,
        },
        |input| resolver.views(input),
    )
    .await?;
    propagate::rename_views(&mut from, &views.renamed_or_moved)?;

    let renames = rename_entries(
        &tables.renamed_or_moved,
        &renamed_columns,
        &views.renamed_or_moved,
    );
    if !renames.is_empty() {
        info!(count = renames.len(), "Accepted renames");
    }

    // ---- Compile -----------------------------------------------
    let catalog_diff = CatalogDiff::between(&from, &to);
    let raw = catalog_diff.alters();
    let alters = MySqlRules.filter(raw.clone(), &from, &to, options.mode);
    debug!(
        raw = raw.len(),
        kept = alters.len(),
        mode = ?options.mode,
        "Filtered alters"
    );

    let statements = compile(&CompileInput {
        from: &from,
        to: &to,
        diff: &catalog_diff,
        alters: &alters,
        renamed_tables: &tables.renamed_or_moved,
        renamed_columns: &renamed_columns,
        renamed_views: &views.renamed_or_moved,
    });
    let converted = Convertor::mysql().convert(&statements);
    let migration = statements_to_sql(&converted.sql_statements, options.breakpoints);
    info!(
        statements = statements.len(),
        sql = converted.sql_statements.len(),
        "Diff complete"
    );

    Ok(DiffOutput {
        statements,
        sql_statements: converted.sql_statements,
        grouped: converted.grouped,
        renames,
        unhandled: converted.unhandled,
        migration,
    })
}
