#![allow(dead_code)]

use schemadiff_core::ddl::IndexColumn;
use schemadiff_core::{
    ddl_diff, Catalog, CheckConstraint, Column, CreateDropResolver, DiffOptions, DiffOutput,
    ForeignKey, Index, MappedResolver, Mode, PrimaryKey, RenameResolver, Statement,
    StatementKind, Table, View,
};

/// A blog schema exercising every kind a statement can create.
pub fn blog() -> Catalog {
    let mut c = Catalog::new();
    c.push(Table::new("users"));
    c.push(Column::new("users", "id", "int").not_null().auto_increment());
    c.push(Column::new("users", "email", "varchar(255)").not_null());
    c.push(Column::new("users", "manager_id", "int"));
    c.push(PrimaryKey::new("users", vec!["id".into()]));
    c.push(Index::new("users", vec![IndexColumn::column("email")], true));
    c.push(ForeignKey::new(
        "users",
        vec!["manager_id".into()],
        "users",
        vec!["id".into()],
    ));

    c.push(Table::new("posts"));
    c.push(Column::new("posts", "id", "int").not_null());
    c.push(Column::new("posts", "author_id", "int").not_null());
    c.push(Column::new("posts", "slug", "varchar(64)").not_null());
    c.push(PrimaryKey::new("posts", vec!["id".into(), "slug".into()]));
    c.push(ForeignKey::new(
        "posts",
        vec!["author_id".into()],
        "users",
        vec!["id".into()],
    ));
    c.push(Index::new("posts", vec![IndexColumn::column("author_id")], false));
    c.push(CheckConstraint::new("posts", "slug_not_empty", "char_length(`slug`) > 0"));

    c.push(View::new("recent_posts", "select `id` from `posts`"));
    c
}

pub async fn run(from: Catalog, to: Catalog, resolver: &dyn RenameResolver) -> DiffOutput {
    ddl_diff(from, to, resolver, &DiffOptions::default())
        .await
        .unwrap_or_else(|e| panic!("diff failed: {e}"))
}

pub async fn run_mode(from: Catalog, to: Catalog, mode: Mode) -> DiffOutput {
    ddl_diff(from, to, &CreateDropResolver, &DiffOptions::new(mode))
        .await
        .unwrap_or_else(|e| panic!("diff failed: {e}"))
}

pub async fn run_renames(from: Catalog, to: Catalog, renames: &[&str]) -> DiffOutput {
    let resolver = MappedResolver::new(renames.iter().copied())
        .unwrap_or_else(|e| panic!("bad renames: {e}"));
    run(from, to, &resolver).await
}

pub fn kinds(out: &DiffOutput) -> Vec<StatementKind> {
    out.statements.iter().map(Statement::kind).collect()
}

pub fn position(out: &DiffOutput, kind: StatementKind) -> usize {
    kinds(out)
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_else(|| panic!("no {kind} in {:?}", kinds(out)))
}

/// Applies the constructive statements of a diff to `catalog`.
pub fn replay(catalog: &mut Catalog, statements: &[Statement]) {
    for statement in statements {
        match statement.clone() {
            Statement::CreateTable { table } => {
                catalog.push(Table::new(table.name));
                for column in table.columns {
                    catalog.push(column);
                }
                if let Some(pk) = table.pk {
                    catalog.push(pk);
                }
                for fk in table.fks {
                    catalog.push(fk);
                }
                for index in table.uniques {
                    catalog.push(index);
                }
                for check in table.checks {
                    catalog.push(check);
                }
            }
            Statement::AddColumn { column, .. } => {
                catalog.push(column);
            }
            Statement::CreateIndex { index } => {
                catalog.push(index);
            }
            Statement::CreateFk { fk } => {
                catalog.push(fk);
            }
            Statement::CreatePk { pk } => {
                catalog.push(pk);
            }
            Statement::CreateCheck { check } => {
                catalog.push(check);
            }
            Statement::CreateView { view, .. } => {
                catalog.push(view);
            }
            other => panic!("not a constructive statement: {other:?}"),
        }
    }
}
