//! Statement compiler: turns resolved, filtered diffs into an ordered,
//! deduplicated list of abstract statements.
//!
//! The order is fixed. Destructive operations that free names and
//! dependencies run before constructive ones that need them:
//!
//! create tables, drop FKs, drop tables, rename tables, rename columns,
//! drop views, rename views, alter views, drop checks, drop indexes,
//! drop PKs, alter columns, recreate columns, add columns, create PKs,
//! create indexes, create FKs, create checks, drop columns, create views.

use std::collections::BTreeSet;

use tracing::debug;

use crate::ddl::{Catalog, Column, ForeignKey, GeneratedType, PrimaryKey, Table, View};
use crate::diff::{Alters, CatalogDiff, ColumnAlter};
use crate::resolver::Renamed;
use crate::statements::{ConstraintKind, Statement, TableFull};

/// Everything the compiler reads. `from` is the catalog after rename
/// propagation; `diff` is the re-diff of `from` against `to`; `alters`
/// are the alter records left after commutativity filtering.
#[derive(Debug, Clone, Copy)]
pub struct CompileInput<'a> {
    pub from: &'a Catalog,
    pub to: &'a Catalog,
    pub diff: &'a CatalogDiff,
    pub alters: &'a Alters,
    pub renamed_tables: &'a [Renamed<Table>],
    pub renamed_columns: &'a [Renamed<Column>],
    pub renamed_views: &'a [Renamed<View>],
}

/// Statement groups in emission order.
#[derive(Debug, Default)]
struct Plan {
    create_tables: Vec<Statement>,
    drop_fks: Vec<Statement>,
    drop_tables: Vec<Statement>,
    rename_tables: Vec<Statement>,
    rename_columns: Vec<Statement>,
    drop_views: Vec<Statement>,
    rename_views: Vec<Statement>,
    alter_views: Vec<Statement>,
    drop_checks: Vec<Statement>,
    drop_indexes: Vec<Statement>,
    drop_pks: Vec<Statement>,
    alter_columns: Vec<Statement>,
    recreate_columns: Vec<Statement>,
    add_columns: Vec<Statement>,
    create_pks: Vec<Statement>,
    create_indexes: Vec<Statement>,
    create_fks: Vec<Statement>,
    create_checks: Vec<Statement>,
    drop_columns: Vec<Statement>,
    create_views: Vec<Statement>,
}

impl Plan {
    fn into_statements(self) -> Vec<Statement> {
        [
            self.create_tables,
            self.drop_fks,
            self.drop_tables,
            self.rename_tables,
            self.rename_columns,
            self.drop_views,
            self.rename_views,
            self.alter_views,
            self.drop_checks,
            self.drop_indexes,
            self.drop_pks,
            self.alter_columns,
            self.recreate_columns,
            self.add_columns,
            self.create_pks,
            self.create_indexes,
            self.create_fks,
            self.create_checks,
            self.drop_columns,
            self.create_views,
        ]
        .concat()
    }
}

/// Keeps the first of identical statements.
#[must_use]
pub fn dedup(statements: Vec<Statement>) -> Vec<Statement> {
    let mut out: Vec<Statement> = Vec::with_capacity(statements.len());
    for statement in statements {
        if !out.contains(&statement) {
            out.push(statement);
        }
    }
    out
}

fn single_column(pk: Option<&PrimaryKey>) -> Option<&str> {
    match pk.map(|pk| pk.columns.as_slice()) {
        Some([column]) => Some(column.as_str()),
        _ => None,
    }
}

/// A single-column PK on an auto-increment column is declared inline on
/// the column and never gets its own create/drop-PK statement.
fn is_inline_pk(pk: &PrimaryKey, catalog: &Catalog) -> bool {
    single_column(Some(pk)).is_some_and(|name| {
        catalog
            .columns
            .get(&(pk.table.clone(), name.to_string()))
            .is_some_and(|c| c.auto_increment)
    })
}

/// `(is_pk, was_pk)` for a column: whether the column clause carries the
/// inline key in the target, and whether the key already existed.
fn pk_flags(column: &Column, from: &Catalog, to: &Catalog) -> (bool, bool) {
    let sole = |c: &Catalog| single_column(c.pk_of(&column.table)) == Some(column.name.as_str());
    let is_pk = sole(to) && column.auto_increment;
    let was_pk = sole(from) && sole(to);
    (is_pk, was_pk)
}

fn needs_recreate(alter: &ColumnAlter) -> bool {
    alter.generated.as_ref().is_some_and(|d| {
        let kind = |g: &Option<crate::ddl::Generated>| g.as_ref().map(|g| g.kind);
        let virtual_side = kind(&d.from) == Some(GeneratedType::Virtual)
            || kind(&d.to) == Some(GeneratedType::Virtual);
        let flipped = matches!((kind(&d.from), kind(&d.to)), (Some(a), Some(b)) if a != b);
        virtual_side || flipped
    })
}

/// FK drops run before table renames, so they address the table by the
/// name it has in the database at that point.
fn drop_fk(fk: &ForeignKey, renamed_tables: &[Renamed<Table>]) -> Statement {
    let table = renamed_tables
        .iter()
        .find(|r| r.to.name == fk.table)
        .map_or(&fk.table, |r| &r.from.name);
    Statement::DropConstraint {
        table: table.clone(),
        constraint: fk.name.clone(),
        kind: ConstraintKind::ForeignKey,
    }
}

/// Compiles one diff run into ordered, deduplicated statements.
#[must_use]
pub fn compile(input: &CompileInput<'_>) -> Vec<Statement> {
    let compiler = Compiler::new(*input);
    let mut plan = Plan::default();
    compiler.tables(&mut plan);
    compiler.columns(&mut plan);
    compiler.primary_keys(&mut plan);
    compiler.indexes(&mut plan);
    compiler.foreign_keys(&mut plan);
    compiler.checks(&mut plan);
    compiler.views(&mut plan);

    let statements = plan.into_statements();
    let total = statements.len();
    let statements = dedup(statements);
    debug!(total, unique = statements.len(), "Compiled statements");
    statements
}

struct Compiler<'a> {
    input: CompileInput<'a>,
    created_tables: BTreeSet<&'a str>,
    dropped_tables: BTreeSet<&'a str>,
}

impl<'a> Compiler<'a> {
    fn new(input: CompileInput<'a>) -> Self {
        Self {
            input,
            created_tables: input.diff.tables.created.iter().map(|t| t.name.as_str()).collect(),
            dropped_tables: input.diff.tables.dropped.iter().map(|t| t.name.as_str()).collect(),
        }
    }

    fn is_created(&self, table: &str) -> bool {
        self.created_tables.contains(table)
    }

    fn is_dropped(&self, table: &str) -> bool {
        self.dropped_tables.contains(table)
    }

    /// With several new tables, FKs are added once all of them exist.
    fn defer_fks(&self) -> bool {
        self.created_tables.len() > 1
    }

    // ---- Tables ------------------------------------------------
    fn tables(&self, plan: &mut Plan) {
        let CompileInput {
            to,
            diff,
            renamed_tables,
            ..
        } = self.input;
        for table in &diff.tables.created {
            let name = table.name.as_str();
            let fks = if self.defer_fks() {
                Vec::new()
            } else {
                to.fks.iter().filter(|fk| fk.table == name).cloned().collect()
            };
            plan.create_tables.push(Statement::CreateTable {
                table: TableFull {
                    name: name.to_string(),
                    columns: to.table_columns(name).into_iter().cloned().collect(),
                    pk: to.pk_of(name).cloned(),
                    fks,
                    uniques: to
                        .indexes
                        .iter()
                        .filter(|i| i.table == name && i.is_unique)
                        .cloned()
                        .collect(),
                    checks: to.checks.iter().filter(|c| c.table == name).cloned().collect(),
                },
            });
        }
        for table in &diff.tables.dropped {
            plan.drop_tables.push(Statement::DropTable {
                table: table.name.clone(),
            });
        }
        for r in renamed_tables {
            plan.rename_tables.push(Statement::RenameTable {
                from: r.from.name.clone(),
                to: r.to.name.clone(),
            });
        }
    }

    // ---- Columns -----------------------------------------------
    fn columns(&self, plan: &mut Plan) {
        let CompileInput {
            from,
            to,
            diff,
            alters,
            renamed_columns,
            ..
        } = self.input;
        for r in renamed_columns {
            plan.rename_columns.push(Statement::RenameColumn {
                table: r.to.table.clone(),
                from: r.from.name.clone(),
                to: r.to.name.clone(),
            });
        }
        for column in diff.columns.created.iter().filter(|c| !self.is_created(&c.table)) {
            let (is_pk, _) = pk_flags(column, from, to);
            plan.add_columns.push(Statement::AddColumn {
                column: column.clone(),
                is_pk,
            });
        }
        for column in diff.columns.dropped.iter().filter(|c| !self.is_dropped(&c.table)) {
            plan.drop_columns.push(Statement::DropColumn {
                column: column.clone(),
            });
        }
        for alter in &alters.columns {
            let (is_pk, was_pk) = pk_flags(&alter.right, from, to);
            if needs_recreate(alter) {
                plan.recreate_columns.push(Statement::RecreateColumn {
                    column: alter.right.clone(),
                    is_pk,
                });
            } else {
                plan.alter_columns.push(Statement::AlterColumn {
                    diff: alter.clone(),
                    column: alter.right.clone(),
                    is_pk,
                    was_pk,
                });
            }
        }
    }

    // ---- Primary keys ------------------------------------------
    fn primary_keys(&self, plan: &mut Plan) {
        let CompileInput {
            from, diff, alters, ..
        } = self.input;
        let mut pk_drops: Vec<&PrimaryKey> = diff
            .pks
            .dropped
            .iter()
            .filter(|pk| !self.is_dropped(&pk.table))
            .collect();
        let mut pk_creates: Vec<&PrimaryKey> = diff
            .pks
            .created
            .iter()
            .filter(|pk| !self.is_created(&pk.table))
            .collect();
        for alter in &alters.pks {
            pk_drops.push(&alter.left);
            pk_creates.push(&alter.right);
            if let Some(cols) = &alter.columns {
                self.rebuild_referencing_fks(&alter.left.table, &cols.from, plan);
            }
        }
        for pk in pk_drops {
            if !is_inline_pk(pk, from) {
                plan.drop_pks.push(Statement::DropPk { pk: pk.clone() });
            }
        }
        for pk in pk_creates {
            if is_inline_pk(pk, self.input.to) {
                self.inline_pk_column(pk, plan);
            } else {
                plan.create_pks.push(Statement::CreatePk { pk: pk.clone() });
            }
        }
    }

    /// FKs targeting exactly the old key columns are invalidated by a
    /// key change: drop them first and add them back afterwards.
    fn rebuild_referencing_fks(&self, table: &str, old_columns: &[String], plan: &mut Plan) {
        let CompileInput {
            from,
            to,
            renamed_tables,
            ..
        } = self.input;
        let mut old_key = old_columns.to_vec();
        old_key.sort();
        let referencing = from.fks.iter().filter(|fk| {
            let mut target = fk.columns_to.clone();
            target.sort();
            fk.table_to == table && target == old_key && !self.is_dropped(&fk.table)
        });
        for fk in referencing {
            plan.drop_fks.push(drop_fk(fk, renamed_tables));
            if let Some(current) = to.fks.get(&(fk.table.clone(), fk.name.clone())) {
                plan.create_fks.push(Statement::CreateFk {
                    fk: current.clone(),
                });
            }
        }
    }

    /// The key rides on the column clause: make sure one is emitted.
    fn inline_pk_column(&self, pk: &PrimaryKey, plan: &mut Plan) {
        let CompileInput {
            from,
            to,
            diff,
            alters,
            ..
        } = self.input;
        let Some(name) = single_column(Some(pk)) else {
            return;
        };
        let key = (pk.table.clone(), name.to_string());
        let covered = diff.columns.created.iter().any(|c| c.table == key.0 && c.name == key.1)
            || alters
                .columns
                .iter()
                .any(|a| a.right.table == key.0 && a.right.name == key.1);
        if covered {
            return;
        }
        if let (Some(left), Some(right)) = (from.columns.get(&key), to.columns.get(&key)) {
            let (is_pk, was_pk) = pk_flags(right, from, to);
            plan.alter_columns.push(Statement::AlterColumn {
                diff: ColumnAlter::unchanged(left.clone(), right.clone()),
                column: right.clone(),
                is_pk,
                was_pk,
            });
        }
    }

    // ---- Indexes -----------------------------------------------
    fn indexes(&self, plan: &mut Plan) {
        let CompileInput { diff, alters, .. } = self.input;
        for index in diff.indexes.dropped.iter().filter(|i| !self.is_dropped(&i.table)) {
            plan.drop_indexes.push(Statement::DropIndex {
                index: index.clone(),
            });
        }
        for index in &diff.indexes.created {
            // Unique indexes of created tables are part of CREATE TABLE.
            if self.is_created(&index.table) && index.is_unique {
                continue;
            }
            plan.create_indexes.push(Statement::CreateIndex {
                index: index.clone(),
            });
        }
        for alter in &alters.indexes {
            plan.drop_indexes.push(Statement::DropIndex {
                index: alter.left.clone(),
            });
            plan.create_indexes.push(Statement::CreateIndex {
                index: alter.right.clone(),
            });
        }
    }

    // ---- Foreign keys ------------------------------------------
    fn foreign_keys(&self, plan: &mut Plan) {
        let CompileInput {
            diff,
            alters,
            renamed_tables,
            ..
        } = self.input;
        for fk in &diff.fks.dropped {
            // Dropping the table removes its keys, unless they point at
            // another dropped table that may be dropped first.
            let other_dropped = fk.table_to != fk.table && self.is_dropped(&fk.table_to);
            if !self.is_dropped(&fk.table) || other_dropped {
                plan.drop_fks.push(drop_fk(fk, renamed_tables));
            }
        }
        for fk in &diff.fks.created {
            if !self.is_created(&fk.table) || self.defer_fks() {
                plan.create_fks.push(Statement::CreateFk { fk: fk.clone() });
            }
        }
        for alter in &alters.fks {
            plan.drop_fks.push(drop_fk(&alter.left, renamed_tables));
            plan.create_fks.push(Statement::CreateFk {
                fk: alter.right.clone(),
            });
        }
    }

    // ---- Checks ------------------------------------------------
    fn checks(&self, plan: &mut Plan) {
        let CompileInput { diff, alters, .. } = self.input;
        for check in diff.checks.dropped.iter().filter(|c| !self.is_dropped(&c.table)) {
            plan.drop_checks.push(Statement::DropConstraint {
                table: check.table.clone(),
                constraint: check.name.clone(),
                kind: ConstraintKind::Check,
            });
        }
        for check in diff.checks.created.iter().filter(|c| !self.is_created(&c.table)) {
            plan.create_checks.push(Statement::CreateCheck {
                check: check.clone(),
            });
        }
        for alter in &alters.checks {
            plan.drop_checks.push(Statement::DropConstraint {
                table: alter.left.table.clone(),
                constraint: alter.left.name.clone(),
                kind: ConstraintKind::Check,
            });
            plan.create_checks.push(Statement::CreateCheck {
                check: alter.right.clone(),
            });
        }
    }

    // ---- Views -------------------------------------------------
    fn views(&self, plan: &mut Plan) {
        let CompileInput {
            diff,
            alters,
            renamed_views,
            ..
        } = self.input;
        for view in &diff.views.dropped {
            plan.drop_views.push(Statement::DropView {
                name: view.name.clone(),
            });
        }
        for r in renamed_views {
            plan.rename_views.push(Statement::RenameView {
                from: r.from.name.clone(),
                to: r.to.name.clone(),
            });
        }
        for alter in &alters.views {
            if alter.definition.is_some() {
                plan.create_views.push(Statement::CreateView {
                    view: alter.right.clone(),
                    replace: true,
                });
            } else {
                plan.alter_views.push(Statement::AlterView {
                    view: alter.right.clone(),
                });
            }
        }
        for view in &diff.views.created {
            plan.create_views.push(Statement::CreateView {
                view: view.clone(),
                replace: false,
            });
        }
    }
}
