//! MySQL renderer for abstract statements.
//!
//! Rendering goes through a fixed dispatch table keyed by
//! [`StatementKind`]. A statement whose kind has no renderer is logged
//! and skipped; callers see it in [`ConversionResult::unhandled`].

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::error;

use crate::ddl::{
    CheckConstraint, Column, ColumnDefault, DefaultKind, ForeignKey, Index, IndexAlgorithm,
    IndexColumn, IndexLock, IndexUsing, PrimaryKey, View,
};
use crate::statements::{ConstraintKind, Statement, StatementKind, TableFull};

/// Marker placed between statements when breakpoints are enabled.
pub const BREAKPOINT: &str = "--> statement-breakpoint";

/// Renders one statement; `None` when the statement is not of the
/// kind the function was registered for.
pub type RenderFn = fn(&Statement) -> Option<Vec<String>>;

/// A statement with the SQL rendered from it.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedStatement {
    pub statement: Statement,
    pub sql_statements: Vec<String>,
}

/// Output of [`Convertor::convert`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionResult {
    /// All SQL, flattened in statement order.
    pub sql_statements: Vec<String>,
    pub grouped: Vec<GroupedStatement>,
    /// Kinds that had no renderer, in encounter order.
    pub unhandled: Vec<StatementKind>,
}

/// Dispatch table from statement kind to renderer.
#[derive(Debug, Clone)]
pub struct Convertor {
    renderers: HashMap<StatementKind, RenderFn>,
}

impl Convertor {
    /// A convertor with no renderers registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    /// The shared MySQL convertor.
    #[must_use]
    pub fn mysql() -> &'static Self {
        static MYSQL: OnceLock<Convertor> = OnceLock::new();
        MYSQL.get_or_init(|| {
            Self::empty()
                .register(StatementKind::CreateTable, render_create_table)
                .register(StatementKind::DropTable, render_drop_table)
                .register(StatementKind::RenameTable, render_rename_table)
                .register(StatementKind::AddColumn, render_add_column)
                .register(StatementKind::DropColumn, render_drop_column)
                .register(StatementKind::RenameColumn, render_rename_column)
                .register(StatementKind::AlterColumn, render_alter_column)
                .register(StatementKind::RecreateColumn, render_recreate_column)
                .register(StatementKind::CreateIndex, render_create_index)
                .register(StatementKind::DropIndex, render_drop_index)
                .register(StatementKind::CreateFk, render_create_fk)
                .register(StatementKind::DropConstraint, render_drop_constraint)
                .register(StatementKind::CreatePk, render_create_pk)
                .register(StatementKind::DropPk, render_drop_pk)
                .register(StatementKind::CreateCheck, render_create_check)
                .register(StatementKind::CreateView, render_create_view)
                .register(StatementKind::AlterView, render_alter_view)
                .register(StatementKind::DropView, render_drop_view)
                .register(StatementKind::RenameView, render_rename_view)
        })
    }

    #[must_use]
    pub fn register(mut self, kind: StatementKind, render: RenderFn) -> Self {
        self.renderers.insert(kind, render);
        self
    }

    #[must_use]
    pub fn handles(&self, kind: StatementKind) -> bool {
        self.renderers.contains_key(&kind)
    }

    /// Renders every statement, in order.
    #[must_use]
    pub fn convert(&self, statements: &[Statement]) -> ConversionResult {
        let mut result = ConversionResult::default();
        for statement in statements {
            let kind = statement.kind();
            let rendered = self.renderers.get(&kind).and_then(|render| render(statement));
            let Some(sql) = rendered else {
                error!("cant: {kind}");
                result.unhandled.push(kind);
                continue;
            };
            result.sql_statements.extend(sql.iter().cloned());
            result.grouped.push(GroupedStatement {
                statement: statement.clone(),
                sql_statements: sql,
            });
        }
        result
    }
}

/// Joins rendered SQL into migration file text.
#[must_use]
pub fn statements_to_sql(statements: &[String], breakpoints: bool) -> String {
    if breakpoints {
        statements.join(&format!("\n{BREAKPOINT}\n"))
    } else {
        statements.join("\n")
    }
}

// ================================================================
// SQL fragments
// ================================================================

fn ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn ident_list(names: &[String]) -> String {
    names.iter().map(|n| ident(n)).collect::<Vec<_>>().join(",")
}

fn index_part(column: &IndexColumn) -> String {
    if column.is_expression {
        format!("({})", column.value)
    } else {
        ident(&column.value)
    }
}

fn default_literal(default: &ColumnDefault) -> String {
    match default.kind {
        DefaultKind::String => crate::grammar::quote(&default.value),
        DefaultKind::Text => format!("({})", crate::grammar::quote(&default.value)),
        DefaultKind::Json => {
            let compact = serde_json::from_str::<serde_json::Value>(&default.value)
                .map_or_else(|_| default.value.clone(), |v| v.to_string());
            format!("({})", crate::grammar::quote(&compact))
        }
        DefaultKind::Number | DefaultKind::Boolean | DefaultKind::Bigint | DefaultKind::Unknown => {
            default.value.clone()
        }
    }
}

/// Column definition as used by `CREATE TABLE`, `ADD` and `MODIFY`.
fn column_clause(column: &Column, primary_key: bool) -> String {
    let mut sql = format!("{} {}", ident(&column.name), column.sql_type);
    if let Some(char_set) = &column.char_set {
        sql.push_str(&format!(" CHARACTER SET {char_set}"));
    }
    if let Some(collation) = &column.collation {
        sql.push_str(&format!(" COLLATE {collation}"));
    }
    // MySQL only accepts the generated clause directly after the type.
    if let Some(generated) = &column.generated {
        sql.push_str(&format!(
            " GENERATED ALWAYS AS ({}) {}",
            generated.expression,
            generated.kind.as_sql()
        ));
    }
    if column.auto_increment {
        sql.push_str(" AUTO_INCREMENT");
    }
    if primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    if column.not_null {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(&format!(" DEFAULT {}", default_literal(default)));
    }
    if column.on_update_now {
        sql.push_str(" ON UPDATE CURRENT_TIMESTAMP");
    }
    sql
}

fn fk_clause(fk: &ForeignKey) -> String {
    format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {} ON UPDATE {}",
        ident(&fk.name),
        ident_list(&fk.columns),
        ident(&fk.table_to),
        ident_list(&fk.columns_to),
        fk.on_delete.as_sql(),
        fk.on_update.as_sql()
    )
}

fn check_clause(check: &CheckConstraint) -> String {
    format!("CONSTRAINT {} CHECK({})", ident(&check.name), check.value)
}

fn unique_clause(index: &Index) -> String {
    let parts: Vec<String> = index.columns.iter().map(index_part).collect();
    format!("CONSTRAINT {} UNIQUE({})", ident(&index.name), parts.join(","))
}

/// A PK goes on the column clause when it covers one column and its
/// name is the generated default.
fn inline_pk_column(pk: Option<&PrimaryKey>) -> Option<&str> {
    match pk {
        Some(pk) if !pk.name_explicit && pk.columns.len() == 1 => Some(pk.columns[0].as_str()),
        _ => None,
    }
}

fn view_header(view: &View) -> String {
    format!(
        "ALGORITHM = {} SQL SECURITY {} VIEW {} AS ({})",
        view.algorithm.as_sql(),
        view.sql_security.as_sql(),
        ident(&view.name),
        view.definition
    )
}

fn view_tail(view: &View) -> String {
    view.with_check_option
        .map_or_else(String::new, |option| format!(" WITH {} CHECK OPTION", option.as_sql()))
}

fn index_using(using: IndexUsing) -> &'static str {
    match using {
        IndexUsing::Btree => "btree",
        IndexUsing::Hash => "hash",
    }
}

fn index_algorithm(algorithm: IndexAlgorithm) -> &'static str {
    match algorithm {
        IndexAlgorithm::Default => "default",
        IndexAlgorithm::Inplace => "inplace",
        IndexAlgorithm::Copy => "copy",
    }
}

fn index_lock(lock: IndexLock) -> &'static str {
    match lock {
        IndexLock::Default => "default",
        IndexLock::None => "none",
        IndexLock::Shared => "shared",
        IndexLock::Exclusive => "exclusive",
    }
}

// ================================================================
// Renderers
// ================================================================

fn create_table_sql(table: &TableFull) -> String {
    let inline_pk = inline_pk_column(table.pk.as_ref());
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|c| column_clause(c, inline_pk == Some(c.name.as_str())))
        .collect();
    if let Some(pk) = &table.pk {
        if inline_pk.is_none() {
            lines.push(format!(
                "CONSTRAINT {} PRIMARY KEY({})",
                ident(&pk.name),
                ident_list(&pk.columns)
            ));
        }
    }
    lines.extend(table.uniques.iter().map(unique_clause));
    lines.extend(table.fks.iter().map(fk_clause));
    lines.extend(table.checks.iter().map(check_clause));
    format!(
        "CREATE TABLE {} (\n\t{}\n);",
        ident(&table.name),
        lines.join(",\n\t")
    )
}

fn render_create_table(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::CreateTable { table } => Some(vec![create_table_sql(table)]),
        _ => None,
    }
}

fn render_drop_table(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::DropTable { table } => Some(vec![format!("DROP TABLE {};", ident(table))]),
        _ => None,
    }
}

fn render_rename_table(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::RenameTable { from, to } => Some(vec![format!(
            "RENAME TABLE {} TO {};",
            ident(from),
            ident(to)
        )]),
        _ => None,
    }
}

fn add_column_sql(column: &Column, is_pk: bool) -> String {
    format!(
        "ALTER TABLE {} ADD {};",
        ident(&column.table),
        column_clause(column, is_pk)
    )
}

fn drop_column_sql(column: &Column) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {};",
        ident(&column.table),
        ident(&column.name)
    )
}

fn render_add_column(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::AddColumn { column, is_pk } => Some(vec![add_column_sql(column, *is_pk)]),
        _ => None,
    }
}

fn render_drop_column(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::DropColumn { column } => Some(vec![drop_column_sql(column)]),
        _ => None,
    }
}

fn render_rename_column(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::RenameColumn { table, from, to } => Some(vec![format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {};",
            ident(table),
            ident(from),
            ident(to)
        )]),
        _ => None,
    }
}

fn render_alter_column(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::AlterColumn {
            column,
            is_pk,
            was_pk,
            ..
        } => Some(vec![format!(
            "ALTER TABLE {} MODIFY COLUMN {};",
            ident(&column.table),
            // Re-declaring an existing key is an error.
            column_clause(column, *is_pk && !*was_pk)
        )]),
        _ => None,
    }
}

fn render_recreate_column(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::RecreateColumn { column, is_pk } => Some(vec![
            drop_column_sql(column),
            add_column_sql(column, *is_pk),
        ]),
        _ => None,
    }
}

fn render_create_index(statement: &Statement) -> Option<Vec<String>> {
    let Statement::CreateIndex { index } = statement else {
        return None;
    };
    let parts: Vec<String> = index.columns.iter().map(index_part).collect();
    let mut sql = format!(
        "CREATE {}INDEX {}",
        if index.is_unique { "UNIQUE " } else { "" },
        ident(&index.name)
    );
    if let Some(using) = index.using {
        sql.push_str(&format!(" USING {}", index_using(using)));
    }
    sql.push_str(&format!(" ON {} ({})", ident(&index.table), parts.join(",")));
    if let Some(algorithm) = index.algorithm {
        sql.push_str(&format!(" ALGORITHM = {}", index_algorithm(algorithm)));
    }
    if let Some(lock) = index.lock {
        sql.push_str(&format!(" LOCK = {}", index_lock(lock)));
    }
    sql.push(';');
    Some(vec![sql])
}

fn render_drop_index(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::DropIndex { index } => Some(vec![format!(
            "DROP INDEX {} ON {};",
            ident(&index.name),
            ident(&index.table)
        )]),
        _ => None,
    }
}

fn render_create_fk(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::CreateFk { fk } => Some(vec![format!(
            "ALTER TABLE {} ADD {};",
            ident(&fk.table),
            fk_clause(fk)
        )]),
        _ => None,
    }
}

fn render_drop_constraint(statement: &Statement) -> Option<Vec<String>> {
    let Statement::DropConstraint {
        table,
        constraint,
        kind,
    } = statement
    else {
        return None;
    };
    let keyword = match kind {
        ConstraintKind::ForeignKey => "FOREIGN KEY",
        ConstraintKind::Check => "CONSTRAINT",
    };
    Some(vec![format!(
        "ALTER TABLE {} DROP {keyword} {};",
        ident(table),
        ident(constraint)
    )])
}

fn render_create_pk(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::CreatePk { pk } => Some(vec![format!(
            "ALTER TABLE {} ADD PRIMARY KEY({});",
            ident(&pk.table),
            ident_list(&pk.columns)
        )]),
        _ => None,
    }
}

fn render_drop_pk(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::DropPk { pk } => Some(vec![format!(
            "ALTER TABLE {} DROP PRIMARY KEY;",
            ident(&pk.table)
        )]),
        _ => None,
    }
}

fn render_create_check(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::CreateCheck { check } => Some(vec![format!(
            "ALTER TABLE {} ADD {};",
            ident(&check.table),
            check_clause(check)
        )]),
        _ => None,
    }
}

fn render_create_view(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::CreateView { view, replace } => Some(vec![format!(
            "CREATE {}{}{};",
            if *replace { "OR REPLACE " } else { "" },
            view_header(view),
            view_tail(view)
        )]),
        _ => None,
    }
}

fn render_alter_view(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::AlterView { view } => Some(vec![format!(
            "ALTER {}{};",
            view_header(view),
            view_tail(view)
        )]),
        _ => None,
    }
}

fn render_drop_view(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::DropView { name } => Some(vec![format!("DROP VIEW {};", ident(name))]),
        _ => None,
    }
}

fn render_rename_view(statement: &Statement) -> Option<Vec<String>> {
    match statement {
        Statement::RenameView { from, to } => Some(vec![format!(
            "RENAME TABLE {} TO {};",
            ident(from),
            ident(to)
        )]),
        _ => None,
    }
}
