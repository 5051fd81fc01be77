//! Persisted snapshots.
//!
//! A snapshot is the catalog of one migration point, stored as JSON:
//!
//! ```json
//! { "version": "6", "dialect": "mysql", "id": "...", "prevIds": ["..."],
//!   "ddl": [ { "entityType": "tables", "name": "users" }, ... ],
//!   "renames": ["users->people"] }
//! ```
//!
//! Loading checks the literal tags, then shape-validates every raw `ddl`
//! row before anything is deserialized.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::ddl::{validate, Catalog, Entity};
use crate::error::{DiffError, Result, ValidationError};

pub const SNAPSHOT_VERSION: &str = "6";
pub const SNAPSHOT_DIALECT: &str = "mysql";

/// Id of the origin snapshot every history starts from.
pub const ORIGIN_ID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: String,
    pub dialect: String,
    pub id: String,
    pub prev_ids: Vec<String>,
    pub ddl: Vec<Entity>,
    /// Renames accepted when this snapshot was produced.
    #[serde(default)]
    pub renames: Vec<String>,
}

fn check_tag(value: &Value, field: &'static str, expected: &str) -> Result<()> {
    let found = value.get(field).and_then(Value::as_str);
    if found == Some(expected) {
        return Ok(());
    }
    Err(DiffError::SnapshotTag {
        field,
        expected: expected.to_string(),
        found: found.map_or_else(|| "<missing>".to_string(), str::to_string),
    })
}

impl Snapshot {
    /// The origin snapshot: no entities, no history.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            dialect: SNAPSHOT_DIALECT.to_string(),
            id: ORIGIN_ID.to_string(),
            prev_ids: Vec::new(),
            ddl: Vec::new(),
            renames: Vec::new(),
        }
    }

    /// A new snapshot of `catalog` that follows `prev`.
    #[must_use]
    pub fn from_catalog(catalog: &Catalog, prev: &Snapshot) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            dialect: SNAPSHOT_DIALECT.to_string(),
            id: Uuid::new_v4().to_string(),
            prev_ids: vec![prev.id.clone()],
            ddl: catalog.entities(),
            renames: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_renames(mut self, renames: Vec<String>) -> Self {
        self.renames = renames;
        self
    }

    /// Parses and validates snapshot JSON.
    ///
    /// # Errors
    ///
    /// [`DiffError::Serialization`] for malformed JSON,
    /// [`DiffError::SnapshotTag`] for a wrong version or dialect, and
    /// [`DiffError::Validation`] for malformed `ddl` rows.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        check_tag(&value, "version", SNAPSHOT_VERSION)?;
        check_tag(&value, "dialect", SNAPSHOT_DIALECT)?;

        let Some(rows) = value.get("ddl").and_then(Value::as_array) else {
            return Err(DiffError::Validation(vec![ValidationError::new(
                "ddl", "array",
            )]));
        };
        let errors = validate::validate_rows(rows, "ddl");
        if !errors.is_empty() {
            return Err(DiffError::Validation(errors));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// # Errors
    ///
    /// [`DiffError::Serialization`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The catalog described by `ddl`.
    ///
    /// # Errors
    ///
    /// [`DiffError::Validation`] on duplicate keys.
    pub fn into_catalog(self) -> Result<Catalog> {
        Catalog::from_entities(self.ddl)
    }

    /// # Errors
    ///
    /// [`DiffError::Io`] if the file cannot be read, otherwise as
    /// [`Snapshot::from_json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let snapshot = Self::from_json(&fs::read_to_string(path)?)?;
        debug!(path = %path.display(), id = %snapshot.id, "Loaded snapshot");
        Ok(snapshot)
    }

    /// # Errors
    ///
    /// [`DiffError::Io`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        debug!(path = %path.display(), id = %self.id, "Saved snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{Column, Table};

    fn catalog() -> Catalog {
        let mut c = Catalog::new();
        c.push(Table::new("users"));
        c.push(Column::new("users", "id", "int").not_null());
        c
    }

    #[test]
    fn chains_to_previous_id() {
        let first = Snapshot::from_catalog(&catalog(), &Snapshot::empty());
        assert_eq!(first.prev_ids, vec![ORIGIN_ID]);
        let second = Snapshot::from_catalog(&catalog(), &first);
        assert_eq!(second.prev_ids, vec![first.id.clone()]);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn json_round_trip_preserves_catalog() {
        let snapshot = Snapshot::from_catalog(&catalog(), &Snapshot::empty())
            .with_renames(vec!["a->b".into()]);
        let parsed = Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(parsed.renames, vec!["a->b"]);
        assert_eq!(parsed.into_catalog().unwrap(), catalog());
    }

    #[test]
    fn rejects_wrong_tags() {
        let err = Snapshot::from_json(r#"{"version":"5","dialect":"mysql","id":"x","prevIds":[],"ddl":[]}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            DiffError::SnapshotTag {
                field: "version",
                ..
            }
        ));
        let err = Snapshot::from_json(r#"{"version":"6","id":"x","prevIds":[],"ddl":[]}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported snapshot dialect: expected 'mysql', found '<missing>'"
        );
    }

    #[test]
    fn rejects_malformed_rows_with_paths() {
        let raw = r#"{"version":"6","dialect":"mysql","id":"x","prevIds":[],
            "ddl":[{"entityType":"tables","name":"t"},{"entityType":"columns","table":"t","name":"a"}]}"#;
        match Snapshot::from_json(raw).unwrap_err() {
            DiffError::Validation(errors) => {
                assert!(errors.iter().all(|e| e.path.starts_with("ddl[1].")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
