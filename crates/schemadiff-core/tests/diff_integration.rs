//! End-to-end tests of the diff pipeline: catalogs in, ordered
//! statements and MySQL out.

mod common;

use async_trait::async_trait;
use common::{blog, kinds, position, replay, run, run_mode, run_renames};
use schemadiff_core::ddl::{ColumnDefault, IndexColumn, PushStatus};
use schemadiff_core::error::BoxError;
use schemadiff_core::{
    ddl_diff, Catalog, Column, CreateDropResolver, DiffError, DiffOptions, Entity, ForeignKey,
    Index, InterimSchema, Mode, PrimaryKey, ReferentialAction, RenameResolver, Renamed,
    Resolution, ResolverInput, SchemaError, Statement, StatementKind, Table, View,
};

// =============================================================================
// Idempotence and round-trip
// =============================================================================

#[tokio::test]
async fn diffing_a_catalog_against_itself_is_empty() {
    for mode in [Mode::Default, Mode::Push] {
        let out = run_mode(blog(), blog(), mode).await;
        assert!(out.is_empty(), "{mode:?}: {:?}", out.statements);
        assert!(out.sql_statements.is_empty());
        assert!(out.migration.is_empty());
    }
}

#[tokio::test]
async fn replaying_create_statements_rebuilds_the_catalog() {
    let out = run(Catalog::new(), blog(), &CreateDropResolver).await;
    assert!(out.unhandled.is_empty());

    let mut rebuilt = Catalog::new();
    replay(&mut rebuilt, &out.statements);
    assert_eq!(rebuilt, blog());
}

#[tokio::test]
async fn replay_of_a_single_table_keeps_inline_fks() {
    let mut to = Catalog::new();
    to.push(Table::new("nodes"));
    to.push(Column::new("nodes", "id", "int").not_null());
    to.push(Column::new("nodes", "parent_id", "int"));
    to.push(ForeignKey::new(
        "nodes",
        vec!["parent_id".into()],
        "nodes",
        vec!["id".into()],
    ));

    let out = run(Catalog::new(), to.clone(), &CreateDropResolver).await;
    assert_eq!(kinds(&out), vec![StatementKind::CreateTable]);
    let mut rebuilt = Catalog::new();
    replay(&mut rebuilt, &out.statements);
    assert_eq!(rebuilt, to);
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn created_tables_come_before_deferred_fks() {
    let out = run(Catalog::new(), blog(), &CreateDropResolver).await;
    let last_table = kinds(&out)
        .iter()
        .rposition(|k| *k == StatementKind::CreateTable)
        .unwrap();
    assert!(position(&out, StatementKind::CreateFk) > last_table);
    assert!(position(&out, StatementKind::CreateView) > position(&out, StatementKind::CreateFk));
}

#[tokio::test]
async fn fks_between_dropped_tables_are_dropped_first() {
    let out = run(blog(), Catalog::new(), &CreateDropResolver).await;
    let drop_fk = position(&out, StatementKind::DropConstraint);
    let drop_table = position(&out, StatementKind::DropTable);
    assert!(drop_fk < drop_table);
    assert!(out
        .sql_statements
        .contains(&"ALTER TABLE `posts` DROP FOREIGN KEY `posts_author_id_users_id_fk`;".to_string()));
    // Self-references and indexes go with their table.
    assert_eq!(
        kinds(&out)
            .iter()
            .filter(|k| **k == StatementKind::DropConstraint)
            .count(),
        1
    );
    assert!(!kinds(&out).contains(&StatementKind::DropIndex));
}

#[tokio::test]
async fn additive_change_orders_columns_before_keys() {
    let from = blog();
    let mut to = blog();
    to.push(Column::new("posts", "editor_id", "int"));
    to.push(ForeignKey::new(
        "posts",
        vec!["editor_id".into()],
        "users",
        vec!["id".into()],
    ));
    to.push(Index::new("posts", vec![IndexColumn::column("editor_id")], false));

    let out = run(from, to, &CreateDropResolver).await;
    assert_eq!(
        kinds(&out),
        vec![
            StatementKind::AddColumn,
            StatementKind::CreateIndex,
            StatementKind::CreateFk,
        ]
    );
    assert_eq!(
        out.sql_statements,
        vec![
            "ALTER TABLE `posts` ADD `editor_id` int;",
            "CREATE INDEX `posts_editor_id_index` ON `posts` (`editor_id`);",
            "ALTER TABLE `posts` ADD CONSTRAINT `posts_editor_id_users_id_fk` FOREIGN KEY (`editor_id`) REFERENCES `users`(`id`) ON DELETE NO ACTION ON UPDATE NO ACTION;",
        ]
    );
}

// =============================================================================
// Renames
// =============================================================================

#[tokio::test]
async fn renaming_users_to_people_is_one_statement() {
    let mut from = Catalog::new();
    from.push(Table::new("users"));
    from.push(Column::new("users", "id", "int").not_null());
    let mut to = Catalog::new();
    to.push(Table::new("people"));
    to.push(Column::new("people", "id", "int").not_null());

    let out = run_renames(from, to, &["users->people"]).await;
    assert_eq!(
        out.statements,
        vec![Statement::RenameTable {
            from: "users".into(),
            to: "people".into(),
        }]
    );
}

/// `blog()` with `users` renamed to `people`, constraint names included.
fn blog_with_people() -> Catalog {
    let mut c = Catalog::new();
    for entity in blog().entities() {
        let json = serde_json::to_string(&entity)
            .unwrap()
            .replace("\"users\"", "\"people\"")
            .replace("users_", "people_");
        c.push(serde_json::from_str::<schemadiff_core::Entity>(&json).unwrap());
    }
    c
}

#[tokio::test]
async fn table_rename_carries_self_referencing_fk() {
    let out = run_renames(blog(), blog_with_people(), &["users->people"]).await;
    assert_eq!(kinds(&out), vec![StatementKind::RenameTable]);
    assert_eq!(out.sql_statements, vec!["RENAME TABLE `users` TO `people`;"]);
    assert_eq!(out.renames, vec!["users->people"]);
}

#[tokio::test]
async fn fk_dropped_from_renamed_table_uses_the_old_name() {
    let mut to = Catalog::new();
    for entity in blog_with_people().entities() {
        if let Entity::ForeignKey(fk) = &entity {
            if fk.table == "people" && fk.table_to == "people" {
                continue;
            }
        }
        to.push(entity);
    }

    let out = run_renames(blog(), to, &["users->people"]).await;
    assert_eq!(
        out.sql_statements,
        vec![
            "ALTER TABLE `users` DROP FOREIGN KEY `users_manager_id_users_id_fk`;",
            "RENAME TABLE `users` TO `people`;",
        ]
    );
}

#[tokio::test]
async fn fk_altered_on_renamed_table_is_dropped_before_the_rename() {
    let mut to = Catalog::new();
    for entity in blog().entities() {
        let json = serde_json::to_string(&entity)
            .unwrap()
            .replace("\"posts\"", "\"articles\"")
            .replace("\"posts_", "\"articles_");
        let mut entity: Entity = serde_json::from_str(&json).unwrap();
        if let Entity::ForeignKey(fk) = &mut entity {
            if fk.table == "articles" {
                fk.on_delete = ReferentialAction::Cascade;
            }
        }
        to.push(entity);
    }

    let out = run_renames(blog(), to, &["posts->articles"]).await;
    assert_eq!(
        kinds(&out),
        vec![
            StatementKind::DropConstraint,
            StatementKind::RenameTable,
            StatementKind::CreateFk,
        ]
    );
    assert_eq!(
        out.sql_statements[0],
        "ALTER TABLE `posts` DROP FOREIGN KEY `posts_author_id_users_id_fk`;"
    );
    assert_eq!(out.sql_statements[1], "RENAME TABLE `posts` TO `articles`;");
    assert!(out.sql_statements[2].starts_with("ALTER TABLE `articles` ADD CONSTRAINT"));
    assert!(out.sql_statements[2].contains("ON DELETE CASCADE"));
}

#[tokio::test]
async fn column_rename_carries_fk_and_index() {
    let from = blog();
    let mut to = Catalog::new();
    for entity in blog().entities() {
        let json = serde_json::to_string(&entity)
            .unwrap()
            .replace("author_id", "writer_id");
        to.push(serde_json::from_str::<schemadiff_core::Entity>(&json).unwrap());
    }

    let out = run_renames(from, to, &["posts.author_id->posts.writer_id"]).await;
    assert_eq!(
        out.sql_statements,
        vec!["ALTER TABLE `posts` RENAME COLUMN `author_id` TO `writer_id`;"]
    );
}

#[tokio::test]
async fn swapped_column_names_stay_alters() {
    let mut from = Catalog::new();
    from.push(Table::new("t"));
    from.push(Column::new("t", "a", "int"));
    from.push(Column::new("t", "b", "varchar(10)"));
    let mut to = Catalog::new();
    to.push(Table::new("t"));
    to.push(Column::new("t", "b", "int"));
    to.push(Column::new("t", "a", "varchar(10)"));

    // Without renames this is two type changes.
    let plain = run(from.clone(), to.clone(), &CreateDropResolver).await;
    assert_eq!(
        kinds(&plain),
        vec![StatementKind::AlterColumn, StatementKind::AlterColumn]
    );

    // Same-key swaps never reach the resolver; they stay alters.
    let swapped = run_renames(from, to, &["t.a->t.b", "t.b->t.a"]).await;
    assert_eq!(kinds(&swapped), kinds(&plain));
}

#[tokio::test]
async fn view_rename_and_redefinition() {
    let mut from = Catalog::new();
    from.push(View::new("a", "select 1"));
    let mut to = Catalog::new();
    to.push(View::new("b", "select 2"));

    let out = run_renames(from, to, &["a->b"]).await;
    assert_eq!(
        out.sql_statements,
        vec![
            "RENAME TABLE `a` TO `b`;",
            "CREATE OR REPLACE ALGORITHM = undefined SQL SECURITY definer VIEW `b` AS (select 2);",
        ]
    );
}

struct Inventive;

#[async_trait]
impl RenameResolver for Inventive {
    async fn tables(
        &self,
        input: ResolverInput<Table>,
    ) -> Result<Resolution<Table>, BoxError> {
        let mut answer = Resolution::unchanged(input);
        answer.renamed_or_moved.push(Renamed {
            from: Table::new("ghost"),
            to: Table::new("phantom"),
        });
        Ok(answer)
    }

    async fn columns(
        &self,
        _table: &str,
        input: ResolverInput<Column>,
    ) -> Result<Resolution<Column>, BoxError> {
        Ok(Resolution::unchanged(input))
    }

    async fn views(&self, input: ResolverInput<View>) -> Result<Resolution<View>, BoxError> {
        Ok(Resolution::unchanged(input))
    }
}

#[tokio::test]
async fn resolver_answers_are_checked() {
    let err = ddl_diff(blog(), blog_with_people(), &Inventive, &DiffOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DiffError::ResolverContract { .. }), "{err}");
}

// =============================================================================
// Commutativity
// =============================================================================

fn single_column(column: Column) -> Catalog {
    let mut c = Catalog::new();
    c.push(Table::new(column.table.clone()));
    c.push(column);
    c
}

#[tokio::test]
async fn synonyms_never_alter() {
    let pairs = [
        ("boolean", "tinyint(1)"),
        ("integer", "int"),
        ("decimal", "decimal(10,0)"),
        ("double precision", "double"),
        ("timestamp(0)", "timestamp"),
    ];
    for (left, right) in pairs {
        let out = run_mode(
            single_column(Column::new("t", "c", left)),
            single_column(Column::new("t", "c", right)),
            Mode::Default,
        )
        .await;
        assert!(out.is_empty(), "{left} vs {right}: {:?}", out.statements);
    }
}

#[tokio::test]
async fn display_width_only_matters_outside_push() {
    let from = single_column(Column::new("t", "c", "int(11)"));
    let to = single_column(Column::new("t", "c", "int"));
    assert!(run_mode(from.clone(), to.clone(), Mode::Push).await.is_empty());
    assert_eq!(
        run_mode(from, to, Mode::Default).await.sql_statements,
        vec!["ALTER TABLE `t` MODIFY COLUMN `c` int;"]
    );
}

#[tokio::test]
async fn equivalent_defaults_in_push_mode() {
    let cases = [
        (
            Column::new("t", "c", "timestamp").default_value(ColumnDefault::expression("now()")),
            Column::new("t", "c", "timestamp")
                .default_value(ColumnDefault::expression("(CURRENT_TIMESTAMP)")),
        ),
        (
            Column::new("t", "c", "decimal(4,2)").default_value(ColumnDefault::number("1.50")),
            Column::new("t", "c", "decimal(4,2)").default_value(ColumnDefault::number("1.5")),
        ),
        (
            Column::new("t", "c", "varchar(8)").default_value(ColumnDefault::expression("'x'")),
            Column::new("t", "c", "varchar(8)").default_value(ColumnDefault::string("x")),
        ),
    ];
    for (left, right) in cases {
        let out = run_mode(single_column(left), single_column(right), Mode::Push).await;
        assert!(out.is_empty(), "{:?}", out.statements);
    }
}

#[tokio::test]
async fn pk_membership_hides_not_null_changes() {
    let mut from = single_column(Column::new("t", "id", "int"));
    from.push(PrimaryKey::new("t", vec!["id".into()]));
    let mut to = single_column(Column::new("t", "id", "int").not_null());
    to.push(PrimaryKey::new("t", vec!["id".into()]));
    assert!(run_mode(from, to, Mode::Default).await.is_empty());
}

// =============================================================================
// Scenarios and loaders
// =============================================================================

#[tokio::test]
async fn single_column_key_collapses_into_create_table() {
    let mut to = Catalog::new();
    to.push(Table::new("t"));
    to.push(Column::new("t", "a", "int"));
    to.push(PrimaryKey::new("t", vec!["a".into()]));

    let out = run(Catalog::new(), to, &CreateDropResolver).await;
    assert_eq!(kinds(&out), vec![StatementKind::CreateTable]);
    assert_eq!(
        out.sql_statements,
        vec!["CREATE TABLE `t` (\n\t`a` int PRIMARY KEY\n);"]
    );
}

#[tokio::test]
async fn create_table_with_auto_increment_key() {
    let mut to = Catalog::new();
    to.push(Table::new("users"));
    to.push(Column::new("users", "id", "int").not_null().auto_increment());
    to.push(PrimaryKey::new("users", vec!["id".into()]));

    let out = run(Catalog::new(), to, &CreateDropResolver).await;
    assert_eq!(
        out.sql_statements,
        vec!["CREATE TABLE `users` (\n\t`id` int AUTO_INCREMENT PRIMARY KEY NOT NULL\n);"]
    );
}

#[test]
fn duplicate_rows_conflict_without_overwriting() {
    let mut c = Catalog::new();
    assert_eq!(c.push(Table::new("t")).status, PushStatus::Ok);
    c.push(Column::new("t", "a", "int"));
    let outcome = c.push(Column::new("t", "a", "bigint"));
    assert!(outcome.is_conflict());
    assert_eq!(
        c.columns.get(&("t".into(), "a".into())).unwrap().sql_type,
        "int"
    );
}

#[test]
fn interim_conflicts_name_the_entities() {
    let schema = InterimSchema::from_json(
        r#"{
            "tables": [{"name": "users"}],
            "columns": [
                {"table": "users", "name": "id", "type": "int", "notNull": true, "isPK": true},
                {"table": "users", "name": "id", "type": "bigint", "notNull": true}
            ]
        }"#,
    )
    .unwrap();
    match Catalog::from_interim(schema).unwrap_err() {
        DiffError::Schema(errors) => {
            assert_eq!(
                errors,
                vec![SchemaError::ColumnNameConflict {
                    table: "users".into(),
                    name: "id".into(),
                }]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}
