//! Abstract DDL statements: dialect-independent operations, each
//! carrying exactly what its renderer needs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ddl::{CheckConstraint, Column, ForeignKey, Index, PrimaryKey, View};
use crate::diff::ColumnAlter;

/// A table with everything embedded in its `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableFull {
    pub name: String,
    pub columns: Vec<Column>,
    pub pk: Option<PrimaryKey>,
    /// Inline FKs; empty when FKs are deferred to `create_fk`.
    pub fks: Vec<ForeignKey>,
    /// Unique indexes, rendered as `CONSTRAINT .. UNIQUE`.
    pub uniques: Vec<Index>,
    pub checks: Vec<CheckConstraint>,
}

/// Which kind of named constraint `drop_constraint` removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    ForeignKey,
    Check,
}

/// One abstract DDL operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    CreateTable {
        table: TableFull,
    },
    DropTable {
        table: String,
    },
    RenameTable {
        from: String,
        to: String,
    },
    AddColumn {
        column: Column,
        /// Renders ` PRIMARY KEY` inline.
        #[serde(rename = "isPK")]
        is_pk: bool,
    },
    DropColumn {
        column: Column,
    },
    RenameColumn {
        table: String,
        from: String,
        to: String,
    },
    AlterColumn {
        diff: ColumnAlter,
        /// The target column definition.
        column: Column,
        #[serde(rename = "isPK")]
        is_pk: bool,
        #[serde(rename = "wasPK")]
        was_pk: bool,
    },
    RecreateColumn {
        column: Column,
        #[serde(rename = "isPK")]
        is_pk: bool,
    },
    CreateIndex {
        index: Index,
    },
    DropIndex {
        index: Index,
    },
    CreateFk {
        fk: ForeignKey,
    },
    DropConstraint {
        table: String,
        constraint: String,
        kind: ConstraintKind,
    },
    CreatePk {
        pk: PrimaryKey,
    },
    DropPk {
        pk: PrimaryKey,
    },
    CreateCheck {
        check: CheckConstraint,
    },
    CreateView {
        view: View,
        replace: bool,
    },
    AlterView {
        view: View,
    },
    DropView {
        name: String,
    },
    RenameView {
        from: String,
        to: String,
    },
}

/// Tag of a [`Statement`], the key of the renderer dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatementKind {
    CreateTable,
    DropTable,
    RenameTable,
    AddColumn,
    DropColumn,
    RenameColumn,
    AlterColumn,
    RecreateColumn,
    CreateIndex,
    DropIndex,
    CreateFk,
    DropConstraint,
    CreatePk,
    DropPk,
    CreateCheck,
    CreateView,
    AlterView,
    DropView,
    RenameView,
}

impl StatementKind {
    pub const ALL: [Self; 19] = [
        Self::CreateTable,
        Self::DropTable,
        Self::RenameTable,
        Self::AddColumn,
        Self::DropColumn,
        Self::RenameColumn,
        Self::AlterColumn,
        Self::RecreateColumn,
        Self::CreateIndex,
        Self::DropIndex,
        Self::CreateFk,
        Self::DropConstraint,
        Self::CreatePk,
        Self::DropPk,
        Self::CreateCheck,
        Self::CreateView,
        Self::AlterView,
        Self::DropView,
        Self::RenameView,
    ];

    /// The serialized `type` tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateTable => "create_table",
            Self::DropTable => "drop_table",
            Self::RenameTable => "rename_table",
            Self::AddColumn => "add_column",
            Self::DropColumn => "drop_column",
            Self::RenameColumn => "rename_column",
            Self::AlterColumn => "alter_column",
            Self::RecreateColumn => "recreate_column",
            Self::CreateIndex => "create_index",
            Self::DropIndex => "drop_index",
            Self::CreateFk => "create_fk",
            Self::DropConstraint => "drop_constraint",
            Self::CreatePk => "create_pk",
            Self::DropPk => "drop_pk",
            Self::CreateCheck => "create_check",
            Self::CreateView => "create_view",
            Self::AlterView => "alter_view",
            Self::DropView => "drop_view",
            Self::RenameView => "rename_view",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Statement {
    #[must_use]
    pub const fn kind(&self) -> StatementKind {
        match self {
            Self::CreateTable { .. } => StatementKind::CreateTable,
            Self::DropTable { .. } => StatementKind::DropTable,
            Self::RenameTable { .. } => StatementKind::RenameTable,
            Self::AddColumn { .. } => StatementKind::AddColumn,
            Self::DropColumn { .. } => StatementKind::DropColumn,
            Self::RenameColumn { .. } => StatementKind::RenameColumn,
            Self::AlterColumn { .. } => StatementKind::AlterColumn,
            Self::RecreateColumn { .. } => StatementKind::RecreateColumn,
            Self::CreateIndex { .. } => StatementKind::CreateIndex,
            Self::DropIndex { .. } => StatementKind::DropIndex,
            Self::CreateFk { .. } => StatementKind::CreateFk,
            Self::DropConstraint { .. } => StatementKind::DropConstraint,
            Self::CreatePk { .. } => StatementKind::CreatePk,
            Self::DropPk { .. } => StatementKind::DropPk,
            Self::CreateCheck { .. } => StatementKind::CreateCheck,
            Self::CreateView { .. } => StatementKind::CreateView,
            Self::AlterView { .. } => StatementKind::AlterView,
            Self::DropView { .. } => StatementKind::DropView,
            Self::RenameView { .. } => StatementKind::RenameView,
        }
    }

    /// The table the statement operates on, if any.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::CreateTable { table } => Some(&table.name),
            Self::DropTable { table } | Self::DropConstraint { table, .. } => Some(table),
            Self::RenameTable { to, .. } => Some(to),
            Self::RenameColumn { table, .. } => Some(table),
            Self::AddColumn { column, .. }
            | Self::DropColumn { column }
            | Self::AlterColumn { column, .. }
            | Self::RecreateColumn { column, .. } => Some(&column.table),
            Self::CreateIndex { index } | Self::DropIndex { index } => Some(&index.table),
            Self::CreateFk { fk } => Some(&fk.table),
            Self::CreatePk { pk } | Self::DropPk { pk } => Some(&pk.table),
            Self::CreateCheck { check } => Some(&check.table),
            Self::CreateView { .. }
            | Self::AlterView { .. }
            | Self::DropView { .. }
            | Self::RenameView { .. } => None,
        }
    }
}
