//! The in-memory schema: one [`Collection`] per entity kind.

use std::collections::HashMap;
use std::hash::BuildHasher;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entities::{
    CheckConstraint, Column, Entity, ForeignKey, Index, PrimaryKey, Table, View, ViewColumn,
};
use super::store::{
    Assign, CheckSet, Collection, ColumnSet, EntityKind, FkSet, IndexSet, PkSet, Push,
};
use super::validate;
use crate::error::{DiffError, Result, ValidationError};

/// Outcome tag of [`Catalog::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PushStatus {
    Ok,
    Conflict,
}

/// Result of [`Catalog::push`]. On conflict `data` is the row already
/// stored under the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct PushOutcome {
    pub status: PushStatus,
    pub data: Entity,
}

impl PushOutcome {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.status == PushStatus::Conflict
    }
}

/// Rows touched by [`Catalog::retarget_tables`] that carry a
/// constraint name, after relabelling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retargeted {
    pub fks: Vec<ForeignKey>,
    pub indexes: Vec<Index>,
}

/// A complete schema at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub tables: Collection<Table>,
    pub columns: Collection<Column>,
    pub pks: Collection<PrimaryKey>,
    pub fks: Collection<ForeignKey>,
    pub indexes: Collection<Index>,
    pub checks: Collection<CheckConstraint>,
    pub views: Collection<View>,
    pub view_columns: Collection<ViewColumn>,
}

fn outcome<T: EntityKind + Into<Entity>>(push: Push<'_, T>) -> PushOutcome {
    match push {
        Push::Inserted(row) => PushOutcome {
            status: PushStatus::Ok,
            data: row.clone().into(),
        },
        Push::Conflict(row) => PushOutcome {
            status: PushStatus::Conflict,
            data: row.clone().into(),
        },
    }
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts one entity; never overwrites.
    pub fn push(&mut self, entity: impl Into<Entity>) -> PushOutcome {
        match entity.into() {
            Entity::Table(t) => outcome(self.tables.push(t)),
            Entity::Column(c) => outcome(self.columns.push(c)),
            Entity::PrimaryKey(pk) => outcome(self.pks.push(pk)),
            Entity::ForeignKey(fk) => outcome(self.fks.push(fk)),
            Entity::Index(i) => outcome(self.indexes.push(i)),
            Entity::Check(c) => outcome(self.checks.push(c)),
            Entity::View(v) => outcome(self.views.push(v)),
            Entity::ViewColumn(c) => outcome(self.view_columns.push(c)),
        }
    }

    /// Flattens the catalog in fixed kind order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.tables.iter().cloned().map(Entity::from));
        out.extend(self.columns.iter().cloned().map(Entity::from));
        out.extend(self.pks.iter().cloned().map(Entity::from));
        out.extend(self.fks.iter().cloned().map(Entity::from));
        out.extend(self.indexes.iter().cloned().map(Entity::from));
        out.extend(self.checks.iter().cloned().map(Entity::from));
        out.extend(self.views.iter().cloned().map(Entity::from));
        out.extend(self.view_columns.iter().cloned().map(Entity::from));
        out
    }

    /// Total number of rows across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
            + self.columns.len()
            + self.pks.len()
            + self.fks.len()
            + self.indexes.len()
            + self.checks.len()
            + self.views.len()
            + self.view_columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a catalog from already typed rows. A duplicate key is a
    /// validation error naming the row position.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Validation`] listing every invalid or
    /// duplicate row.
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Result<Self> {
        let mut catalog = Self::new();
        let mut errors = Vec::new();
        for (idx, entity) in entities.into_iter().enumerate() {
            let path = format!("ddl[{idx}]");
            errors.extend(entity.validate(&path));
            let description = entity.describe();
            if catalog.push(entity).is_conflict() {
                errors.push(ValidationError::new(path, format!("unique {description}")));
            }
        }
        if errors.is_empty() {
            Ok(catalog)
        } else {
            Err(DiffError::Validation(errors))
        }
    }

    /// Whether every raw row has a valid shape.
    #[must_use]
    pub fn validate(raw: &[Value]) -> bool {
        Self::validate_detailed(raw).is_empty()
    }

    /// Shape errors of every raw row, with field paths.
    #[must_use]
    pub fn validate_detailed(raw: &[Value]) -> Vec<ValidationError> {
        validate::validate_rows(raw, "ddl")
    }

    /// Validates raw rows, then deserializes them into a catalog. No
    /// partial catalog is returned on failure.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Validation`] when a row has the wrong shape
    /// or a duplicate key.
    pub fn from_json(raw: &[Value]) -> Result<Self> {
        let errors = Self::validate_detailed(raw);
        if !errors.is_empty() {
            return Err(DiffError::Validation(errors));
        }
        let entities = raw
            .iter()
            .map(|row| serde_json::from_value::<Entity>(row.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::from_entities(entities)
    }

    /// Serializes the flattened rows.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Serialization`] if a row fails to serialize.
    pub fn to_json(&self) -> Result<Vec<Value>> {
        self.entities()
            .iter()
            .map(|e| serde_json::to_value(e).map_err(DiffError::from))
            .collect()
    }

    /// Rewrites the owning-table back-reference of every table-scoped
    /// kind, plus FK `tableTo`. All pairs apply simultaneously.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Internal`] if relabelling makes two rows
    /// share a key; the catalog is left unchanged for that kind.
    pub fn retarget_tables<S>(&mut self, renames: &HashMap<String, String, S>) -> Result<Retargeted>
    where
        S: BuildHasher + Clone + 'static,
    {
        if renames.is_empty() {
            return Ok(Retargeted::default());
        }
        let owned = |renames: &HashMap<String, String, S>| {
            let renames = renames.clone();
            Assign::map(move |t: &String| renames.get(t).cloned().unwrap_or_else(|| t.clone()))
        };
        let touches = |t: &String| renames.contains_key(t);

        self.columns
            .update_if(&ColumnSet::new().table(owned(renames)), |c| touches(&c.table))?;
        self.pks
            .update_if(&PkSet::new().table(owned(renames)), |pk| touches(&pk.table))?;
        let indexes = self
            .indexes
            .update_if(&IndexSet::new().table(owned(renames)), |i| touches(&i.table))?;
        self.checks
            .update_if(&CheckSet::new().table(owned(renames)), |c| touches(&c.table))?;
        // Self-references get both sides rewritten in the same pass.
        let fks = self.fks.update_if(
            &FkSet::new()
                .table(owned(renames))
                .table_to(owned(renames)),
            |fk| touches(&fk.table) || touches(&fk.table_to),
        )?;
        Ok(Retargeted { fks, indexes })
    }

    /// Single-pair form of [`retarget_tables`](Self::retarget_tables).
    ///
    /// # Errors
    ///
    /// See [`retarget_tables`](Self::retarget_tables).
    pub fn retarget_table(&mut self, from: &str, to: &str) -> Result<Retargeted> {
        let renames = HashMap::from([(from.to_string(), to.to_string())]);
        self.retarget_tables(&renames)
    }

    /// Columns of `table` in insertion order.
    #[must_use]
    pub fn table_columns(&self, table: &str) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.table == table).collect()
    }

    /// Primary key of `table`, if any.
    #[must_use]
    pub fn pk_of(&self, table: &str) -> Option<&PrimaryKey> {
        self.pks.get(&table.to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ddl::entities::IndexColumn;

    fn sample() -> Catalog {
        let mut c = Catalog::new();
        c.push(Table::new("users"));
        c.push(Column::new("users", "id", "int").not_null());
        c.push(Column::new("users", "manager_id", "int"));
        c.push(PrimaryKey::new("users", vec!["id".into()]));
        c.push(ForeignKey::new(
            "users",
            vec!["manager_id".into()],
            "users",
            vec!["id".into()],
        ));
        c.push(Index::new("users", vec![IndexColumn::column("manager_id")], false));
        c
    }

    #[test]
    fn duplicate_table_push_conflicts() {
        let mut c = Catalog::new();
        assert_eq!(c.push(Table::new("users")).status, PushStatus::Ok);
        let second = c.push(Table::new("users"));
        assert_eq!(second.status, PushStatus::Conflict);
        assert_eq!(second.data, Entity::Table(Table::new("users")));
        assert_eq!(c.tables.len(), 1);
    }

    #[test]
    fn second_pk_on_table_conflicts() {
        let mut c = sample();
        let outcome = c.push(PrimaryKey::new("users", vec!["manager_id".into()]));
        assert!(outcome.is_conflict());
    }

    #[test]
    fn entities_round_trip_through_json() {
        let c = sample();
        let raw = c.to_json().unwrap();
        assert!(Catalog::validate(&raw));
        let back = Catalog::from_json(&raw).unwrap();
        assert_eq!(back, c);
        assert_eq!(raw[0]["entityType"], "tables");
    }

    #[test]
    fn from_json_reports_paths_and_returns_nothing() {
        let raw = vec![
            json!({"entityType": "tables", "name": "t"}),
            json!({"entityType": "indexes", "table": "t", "name": "i",
                   "columns": [{"value": "a", "isExpression": "no"}], "isUnique": false}),
        ];
        match Catalog::from_json(&raw) {
            Err(DiffError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].path, "ddl[1].columns[0].isExpression");
                assert_eq!(errors[0].expected, "boolean");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn from_entities_rejects_duplicates() {
        let err = Catalog::from_entities(vec![
            Entity::Table(Table::new("t")),
            Entity::Table(Table::new("t")),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("ddl[1]"));
    }

    #[test]
    fn retarget_rewrites_self_reference_atomically() {
        let mut c = sample();
        let touched = c.retarget_table("users", "people").unwrap();
        assert_eq!(touched.fks.len(), 1);
        assert_eq!(touched.indexes.len(), 1);
        let fk = c.fks.iter().next().unwrap();
        assert_eq!(fk.table, "people");
        assert_eq!(fk.table_to, "people");
        assert_eq!(c.table_columns("people").len(), 2);
        assert!(c.pk_of("people").is_some());
        assert!(c.pk_of("users").is_none());
    }
}
