//! Interim schema: the flat, loader-facing description of a schema.
//!
//! Column rows may carry `isPK` / `isUnique` shorthands instead of
//! separate key and index rows. Building a [`Catalog`] expands them and
//! reports every name collision at once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ddl::{
    Catalog, CheckConstraint, Column, ForeignKey, Index, IndexColumn, PrimaryKey, Table, View,
    ViewColumn,
};
use crate::error::{DiffError, Result, SchemaError};

/// A column row with key shorthands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimColumn {
    #[serde(flatten)]
    pub column: Column,
    /// Member of the table's primary key.
    #[serde(default, rename = "isPK")]
    pub is_pk: bool,
    /// Has a single-column unique index.
    #[serde(default)]
    pub is_unique: bool,
    /// Explicit name of that unique index.
    #[serde(default)]
    pub unique_name: Option<String>,
}

impl From<Column> for InterimColumn {
    fn from(column: Column) -> Self {
        Self {
            column,
            is_pk: false,
            is_unique: false,
            unique_name: None,
        }
    }
}

/// Flat lists of every entity kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimSchema {
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub columns: Vec<InterimColumn>,
    #[serde(default)]
    pub pks: Vec<PrimaryKey>,
    #[serde(default)]
    pub fks: Vec<ForeignKey>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub checks: Vec<CheckConstraint>,
    #[serde(default)]
    pub views: Vec<View>,
    #[serde(default)]
    pub view_columns: Vec<ViewColumn>,
}

impl InterimSchema {
    /// # Errors
    ///
    /// [`DiffError::Serialization`] when `raw` is not an interim schema document.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

fn internal(kind: &str, table: &str, name: &str) -> DiffError {
    DiffError::Internal(format!("duplicate {kind} '{name}' on table '{table}'"))
}

impl Catalog {
    /// Builds a catalog from an interim schema.
    ///
    /// Table, column and index name collisions are collected and returned
    /// together as [`DiffError::Schema`]. Key, FK, check and view
    /// collisions cannot come from a well-formed loader and are
    /// [`DiffError::Internal`].
    ///
    /// # Errors
    ///
    /// Either of the above when a collision is found.
    pub fn from_interim(schema: InterimSchema) -> Result<Self> {
        let mut catalog = Self::new();
        let mut errors = Vec::new();

        for table in schema.tables {
            let name = table.name.clone();
            if catalog.push(table).is_conflict() {
                errors.push(SchemaError::TableNameConflict { name });
            }
        }

        let mut pk_columns: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut uniques = Vec::new();
        for interim in schema.columns {
            let column = interim.column;
            if interim.is_pk {
                pk_columns
                    .entry(column.table.clone())
                    .or_default()
                    .push(column.name.clone());
            }
            if interim.is_unique {
                let mut index = Index::new(
                    column.table.clone(),
                    vec![IndexColumn::column(column.name.clone())],
                    true,
                );
                if let Some(name) = interim.unique_name {
                    index = index.named(name);
                }
                uniques.push(index);
            }
            let (table, name) = (column.table.clone(), column.name.clone());
            if catalog.push(column).is_conflict() {
                errors.push(SchemaError::ColumnNameConflict { table, name });
            }
        }

        for index in uniques.into_iter().chain(schema.indexes) {
            let (table, name) = (index.table.clone(), index.name.clone());
            if catalog.push(index).is_conflict() {
                errors.push(SchemaError::IndexNameConflict { table, name });
            }
        }

        if !errors.is_empty() {
            return Err(DiffError::Schema(errors));
        }

        let shorthand_pks = pk_columns
            .into_iter()
            .map(|(table, columns)| PrimaryKey::new(table, columns));
        for pk in schema.pks.into_iter().chain(shorthand_pks) {
            let table = pk.table.clone();
            if catalog.push(pk).is_conflict() {
                return Err(DiffError::Internal(format!(
                    "table '{table}' has more than one primary key"
                )));
            }
        }
        for fk in schema.fks {
            let (table, name) = (fk.table.clone(), fk.name.clone());
            if catalog.push(fk).is_conflict() {
                return Err(internal("foreign key", &table, &name));
            }
        }
        for check in schema.checks {
            let (table, name) = (check.table.clone(), check.name.clone());
            if catalog.push(check).is_conflict() {
                return Err(internal("check", &table, &name));
            }
        }
        for view in schema.views {
            let name = view.name.clone();
            if catalog.push(view).is_conflict() {
                return Err(DiffError::Internal(format!("duplicate view '{name}'")));
            }
        }
        for column in schema.view_columns {
            let (view, name) = (column.view.clone(), column.name.clone());
            if catalog.push(column).is_conflict() {
                return Err(internal("view column", &view, &name));
            }
        }

        debug!(entities = catalog.len(), "Built catalog from interim schema");
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(table: &str, name: &str) -> InterimColumn {
        Column::new(table, name, "int").into()
    }

    #[test]
    fn shorthands_expand_to_key_and_index() {
        let mut id = column("users", "id");
        id.is_pk = true;
        let mut email = column("users", "email");
        email.is_unique = true;
        let mut handle = column("users", "handle");
        handle.is_unique = true;
        handle.unique_name = Some("uq_handle".into());

        let schema = InterimSchema {
            tables: vec![Table::new("users")],
            columns: vec![id, email, handle],
            ..InterimSchema::default()
        };
        let catalog = Catalog::from_interim(schema).unwrap();

        let pk = catalog.pk_of("users").unwrap();
        assert_eq!(pk.name, "users_id_pk");
        assert_eq!(pk.columns, vec!["id"]);
        assert!(catalog
            .indexes
            .get(&("users".into(), "users_email_unique".into()))
            .is_some_and(|i| i.is_unique && !i.name_explicit));
        assert!(catalog
            .indexes
            .get(&("users".into(), "uq_handle".into()))
            .is_some_and(|i| i.name_explicit));
    }

    #[test]
    fn name_conflicts_are_collected() {
        let schema = InterimSchema {
            tables: vec![Table::new("users"), Table::new("users")],
            columns: vec![column("users", "id"), column("users", "id")],
            indexes: vec![
                Index::new("users", vec![IndexColumn::column("id")], false),
                Index::new("users", vec![IndexColumn::column("id")], false),
            ],
            ..InterimSchema::default()
        };
        let err = Catalog::from_interim(schema).unwrap_err();
        match err {
            DiffError::Schema(errors) => assert_eq!(
                errors,
                vec![
                    SchemaError::TableNameConflict {
                        name: "users".into()
                    },
                    SchemaError::ColumnNameConflict {
                        table: "users".into(),
                        name: "id".into()
                    },
                    SchemaError::IndexNameConflict {
                        table: "users".into(),
                        name: "users_id_index".into()
                    },
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn second_primary_key_is_internal() {
        let mut id = column("t", "id");
        id.is_pk = true;
        let schema = InterimSchema {
            tables: vec![Table::new("t")],
            columns: vec![id],
            pks: vec![PrimaryKey::new("t", vec!["id".into()])],
            ..InterimSchema::default()
        };
        assert!(matches!(
            Catalog::from_interim(schema),
            Err(DiffError::Internal(_))
        ));
    }

    #[test]
    fn parses_camel_case_json() {
        let schema = InterimSchema::from_json(
            r#"{
                "tables": [{"name": "t"}],
                "columns": [
                    {"table": "t", "name": "id", "type": "int", "notNull": true, "isPK": true}
                ]
            }"#,
        )
        .unwrap();
        assert!(schema.columns[0].is_pk);
        assert!(schema.columns[0].column.not_null);
        assert!(schema.views.is_empty());
    }
}
