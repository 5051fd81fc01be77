//! Rename resolution.
//!
//! After the first diff pass every kind that can be renamed (tables,
//! columns, views) has a set of created and a set of deleted entities.
//! A [`RenameResolver`] decides which create/delete pairs are really the
//! same entity under a new name. The engine calls it sequentially:
//! tables, then columns grouped per table in table-name order, then
//! views.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::ddl::{Column, EntityKind, Table, View};
use crate::error::{BoxError, DiffError, Result, ValidationError};

/// Unmatched candidates of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverInput<T> {
    pub created: Vec<T>,
    pub deleted: Vec<T>,
}

impl<T> ResolverInput<T> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

/// A deleted entity that reappears under a new identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Renamed<T> {
    pub from: T,
    pub to: T,
}

/// The resolver's answer. Every input entity appears exactly once: in
/// `created`, in `deleted`, or as one side of a pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<T> {
    pub created: Vec<T>,
    pub deleted: Vec<T>,
    pub renamed_or_moved: Vec<Renamed<T>>,
}

impl<T> Resolution<T> {
    /// No renames: everything stays a create or a delete.
    #[must_use]
    pub fn unchanged(input: ResolverInput<T>) -> Self {
        Self {
            created: input.created,
            deleted: input.deleted,
            renamed_or_moved: Vec::new(),
        }
    }
}

/// Decides which create/delete pairs are renames.
///
/// Errors abort the diff run unchanged; no partial output is produced.
#[async_trait]
pub trait RenameResolver: Send + Sync {
    async fn tables(
        &self,
        input: ResolverInput<Table>,
    ) -> std::result::Result<Resolution<Table>, BoxError>;

    /// Candidates are always scoped to one table.
    async fn columns(
        &self,
        table: &str,
        input: ResolverInput<Column>,
    ) -> std::result::Result<Resolution<Column>, BoxError>;

    async fn views(
        &self,
        input: ResolverInput<View>,
    ) -> std::result::Result<Resolution<View>, BoxError>;
}

// ================================================================
// Implementations
// ================================================================

/// Never renames. For CI and non-interactive runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateDropResolver;

#[async_trait]
impl RenameResolver for CreateDropResolver {
    async fn tables(
        &self,
        input: ResolverInput<Table>,
    ) -> std::result::Result<Resolution<Table>, BoxError> {
        Ok(Resolution::unchanged(input))
    }

    async fn columns(
        &self,
        _table: &str,
        input: ResolverInput<Column>,
    ) -> std::result::Result<Resolution<Column>, BoxError> {
        Ok(Resolution::unchanged(input))
    }

    async fn views(
        &self,
        input: ResolverInput<View>,
    ) -> std::result::Result<Resolution<View>, BoxError> {
        Ok(Resolution::unchanged(input))
    }
}

/// Renames from a fixed `old->new` table. Column entries are written
/// `table.old->table.new`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedResolver {
    renames: Vec<(String, String)>,
}

impl MappedResolver {
    /// Parses `old->new` entries.
    ///
    /// # Errors
    ///
    /// [`DiffError::Validation`] listing every malformed entry.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut renames = Vec::new();
        let mut errors = Vec::new();
        for (idx, entry) in entries.into_iter().enumerate() {
            match entry.as_ref().split_once("->") {
                Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
                    renames.push((from.trim().to_string(), to.trim().to_string()));
                }
                _ => errors.push(ValidationError::new(format!("renames[{idx}]"), "'old->new'")),
            }
        }
        if errors.is_empty() {
            Ok(Self { renames })
        } else {
            Err(DiffError::Validation(errors))
        }
    }

    /// Adds one pair.
    #[must_use]
    pub fn with(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.push((from.into(), to.into()));
        self
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.renames
            .iter()
            .map(|(from, to)| format!("{from}->{to}"))
            .collect()
    }

    fn resolve<T>(&self, input: ResolverInput<T>, ident: impl Fn(&T) -> String) -> Resolution<T> {
        let ResolverInput {
            mut created,
            mut deleted,
        } = input;
        let mut renamed_or_moved = Vec::new();
        for (from, to) in &self.renames {
            let Some(d) = deleted.iter().position(|e| ident(e) == *from) else {
                continue;
            };
            let Some(c) = created.iter().position(|e| ident(e) == *to) else {
                continue;
            };
            renamed_or_moved.push(Renamed {
                from: deleted.remove(d),
                to: created.remove(c),
            });
        }
        Resolution {
            created,
            deleted,
            renamed_or_moved,
        }
    }
}

#[async_trait]
impl RenameResolver for MappedResolver {
    async fn tables(
        &self,
        input: ResolverInput<Table>,
    ) -> std::result::Result<Resolution<Table>, BoxError> {
        Ok(self.resolve(input, |t| t.name.clone()))
    }

    async fn columns(
        &self,
        _table: &str,
        input: ResolverInput<Column>,
    ) -> std::result::Result<Resolution<Column>, BoxError> {
        Ok(self.resolve(input, |c| format!("{}.{}", c.table, c.name)))
    }

    async fn views(
        &self,
        input: ResolverInput<View>,
    ) -> std::result::Result<Resolution<View>, BoxError> {
        Ok(self.resolve(input, |v| v.name.clone()))
    }
}

// ================================================================
// Contract
// ================================================================

/// Checks that `output` partitions `input`: each input entity appears
/// exactly once, on the side it came from, and nothing else appears.
///
/// # Errors
///
/// [`DiffError::ResolverContract`] describing the first violation.
pub fn verify<T: EntityKind>(input: &ResolverInput<T>, output: &Resolution<T>) -> Result<()> {
    let violation = |message: String| DiffError::ResolverContract {
        kind: T::TYPE,
        message,
    };

    let mut expected_created = counts(&input.created);
    let mut expected_deleted = counts(&input.deleted);

    let answered_created = output
        .created
        .iter()
        .chain(output.renamed_or_moved.iter().map(|r| &r.to));
    for entity in answered_created {
        if !take(&mut expected_created, entity) {
            return Err(violation(format!("{:?} is not a pending create", entity.key())));
        }
    }
    let answered_deleted = output
        .deleted
        .iter()
        .chain(output.renamed_or_moved.iter().map(|r| &r.from));
    for entity in answered_deleted {
        if !take(&mut expected_deleted, entity) {
            return Err(violation(format!("{:?} is not a pending delete", entity.key())));
        }
    }

    let missing: Vec<String> = expected_created
        .into_iter()
        .chain(expected_deleted)
        .filter(|(_, n)| *n > 0)
        .map(|(key, _)| format!("{key:?}"))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(violation(format!("unanswered: {}", missing.join(", "))))
    }
}

fn counts<T: EntityKind>(items: &[T]) -> HashMap<T::Key, usize> {
    let mut map = HashMap::new();
    for item in items {
        *map.entry(item.key()).or_insert(0) += 1;
    }
    map
}

fn take<T: EntityKind>(pending: &mut HashMap<T::Key, usize>, entity: &T) -> bool {
    match pending.get_mut(&entity.key()) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    }
}

/// Serialized rename entries, for the next snapshot's `renames`.
#[must_use]
pub fn rename_entries(
    tables: &[Renamed<Table>],
    columns: &[Renamed<Column>],
    views: &[Renamed<View>],
) -> Vec<String> {
    let mut out: Vec<String> = tables
        .iter()
        .map(|r| format!("{}->{}", r.from.name, r.to.name))
        .collect();
    out.extend(columns.iter().map(|r| {
        format!(
            "{}.{}->{}.{}",
            r.from.table, r.from.name, r.to.table, r.to.name
        )
    }));
    out.extend(views.iter().map(|r| format!("{}->{}", r.from.name, r.to.name)));
    out
}
