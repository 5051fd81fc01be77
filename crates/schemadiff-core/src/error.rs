//! Error types for catalog loading and diffing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ddl::EntityType;

/// A malformed field in a raw entity row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Field path, e.g. `ddl[3].columns[0].isExpression`.
    pub path: String,
    /// What was expected at that path.
    pub expected: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(path: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: expected {}", self.path, self.expected)
    }
}

/// A name collision found while building a catalog from an interim schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchemaError {
    TableNameConflict {
        name: String,
    },
    ColumnNameConflict {
        table: String,
        name: String,
    },
    IndexNameConflict {
        table: String,
        name: String,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableNameConflict { name } => {
                write!(f, "Table '{name}' is declared more than once")
            }
            Self::ColumnNameConflict { table, name } => {
                write!(f, "Column '{name}' is declared more than once in table '{table}'")
            }
            Self::IndexNameConflict { table, name } => {
                write!(f, "Index '{name}' is declared more than once on table '{table}'")
            }
        }
    }
}

fn list<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Boxed error returned by rename resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while loading catalogs or computing a diff.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// One or more raw entity rows failed shape validation.
    #[error("Invalid catalog data:\n{}", list(.0))]
    Validation(Vec<ValidationError>),

    /// The interim schema declares conflicting names.
    #[error("Schema errors:\n{}", list(.0))]
    Schema(Vec<SchemaError>),

    /// A persisted snapshot carries an unexpected literal tag.
    #[error("Unsupported snapshot {field}: expected '{expected}', found '{found}'")]
    SnapshotTag {
        /// Either `version` or `dialect`.
        field: &'static str,
        /// The supported value.
        expected: String,
        /// The value in the file.
        found: String,
    },

    /// An invariant that upstream data construction should guarantee.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The rename resolver failed; the run is aborted.
    #[error("Rename resolver failed for {kind}: {source}")]
    Resolver {
        /// Entity kind being resolved.
        kind: EntityType,
        /// The resolver's own error.
        #[source]
        source: BoxError,
    },

    /// The rename resolver returned an answer that breaks its contract.
    #[error("Rename resolver returned an inconsistent answer for {kind}: {message}")]
    ResolverContract {
        /// Entity kind being resolved.
        kind: EntityType,
        /// What was wrong.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (reading/writing snapshot files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for diff operations.
pub type Result<T> = std::result::Result<T, DiffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_errors_name_the_entity() {
        let err = DiffError::Schema(vec![
            SchemaError::TableNameConflict {
                name: "users".into(),
            },
            SchemaError::ColumnNameConflict {
                table: "posts".into(),
                name: "title".into(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("Table 'users'"));
        assert!(msg.contains("Column 'title'"));
        assert!(msg.contains("table 'posts'"));
    }

    #[test]
    fn schema_error_serializes_snake_case_tag() {
        let json = serde_json::to_value(SchemaError::TableNameConflict { name: "t".into() }).unwrap();
        assert_eq!(json["type"], "table_name_conflict");
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError::new("ddl[3].columns[0].isExpression", "boolean");
        assert_eq!(err.to_string(), "ddl[3].columns[0].isExpression: expected boolean");
    }
}
