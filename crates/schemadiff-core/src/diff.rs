//! Structural differ.
//!
//! Rows of each kind are matched by natural key. Left-only rows are
//! drops, right-only rows are creates, and matched-but-unequal pairs
//! produce an alter record: the two rows plus one optional
//! [`Delta`] per non-key field.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::ddl::{
    Catalog, CheckConstraint, CheckOption, Collection, Column, ColumnDefault, EntityKind,
    ForeignKey, Generated, Index, IndexAlgorithm, IndexColumn, IndexLock, IndexUsing, PrimaryKey,
    ReferentialAction, SqlSecurity, Table, View, ViewAlgorithm, ViewColumn,
};

/// A changed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta<V> {
    pub from: V,
    pub to: V,
}

impl<V> Delta<V> {
    #[must_use]
    pub const fn new(from: V, to: V) -> Self {
        Self { from, to }
    }
}

fn delta<V: PartialEq + Clone>(left: &V, right: &V) -> Option<Delta<V>> {
    (left != right).then(|| Delta::new(left.clone(), right.clone()))
}

/// A kind whose matched rows can be compared field by field.
pub trait Diffable: EntityKind {
    type Alter: Clone + Debug + PartialEq;

    /// `None` when the rows are equal on every non-key field.
    fn alter(left: &Self, right: &Self) -> Option<Self::Alter>;
}

macro_rules! alter_record {
    (
        $entity:ident => $alter:ident {
            $($(#[$meta:meta])* $field:ident: $fty:ty),* $(,)?
        }
    ) => {
        #[doc = concat!("Per-field changes of a matched [`", stringify!($entity), "`] pair.")]
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $alter {
            #[serde(rename = "$left")]
            pub left: $entity,
            #[serde(rename = "$right")]
            pub right: $entity,
            $(
                $(#[$meta])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<Delta<$fty>>,
            )*
        }

        impl $alter {
            /// A record for the pair with no field delta.
            #[must_use]
            pub const fn unchanged(left: $entity, right: $entity) -> Self {
                Self {
                    left,
                    right,
                    $($field: None,)*
                }
            }

            /// Whether no field delta remains.
            #[must_use]
            pub const fn is_empty(&self) -> bool {
                true $(&& self.$field.is_none())*
            }
        }

        impl Diffable for $entity {
            type Alter = $alter;

            fn alter(left: &Self, right: &Self) -> Option<$alter> {
                if left == right {
                    return None;
                }
                let alter = $alter {
                    left: left.clone(),
                    right: right.clone(),
                    $($field: delta(&left.$field, &right.$field),)*
                };
                (!alter.is_empty()).then_some(alter)
            }
        }
    };
}

// Tables are identified by their only field, so they never alter.
alter_record!(Table => TableAlter {});

alter_record!(Column => ColumnAlter {
    #[serde(rename = "type")]
    sql_type: String,
    not_null: bool,
    default: Option<ColumnDefault>,
    auto_increment: bool,
    on_update_now: bool,
    char_set: Option<String>,
    collation: Option<String>,
    generated: Option<Generated>,
});

alter_record!(PrimaryKey => PkAlter {
    name: String,
    name_explicit: bool,
    columns: Vec<String>,
});

alter_record!(ForeignKey => FkAlter {
    name_explicit: bool,
    columns: Vec<String>,
    table_to: String,
    columns_to: Vec<String>,
    on_update: ReferentialAction,
    on_delete: ReferentialAction,
});

alter_record!(Index => IndexAlter {
    name_explicit: bool,
    columns: Vec<IndexColumn>,
    is_unique: bool,
    using: Option<IndexUsing>,
    algorithm: Option<IndexAlgorithm>,
    lock: Option<IndexLock>,
});

alter_record!(CheckConstraint => CheckAlter {
    name_explicit: bool,
    value: String,
});

alter_record!(View => ViewAlter {
    definition: String,
    algorithm: ViewAlgorithm,
    sql_security: SqlSecurity,
    with_check_option: Option<CheckOption>,
});

alter_record!(ViewColumn => ViewColumnAlter {
    #[serde(rename = "type")]
    sql_type: String,
    not_null: bool,
});

// ================================================================
// Per-kind diff
// ================================================================

/// Tag of a [`DiffEntity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    Create,
    Drop,
    Alter,
}

/// One diff result of a kind.
#[derive(Debug, PartialEq)]
pub enum DiffEntity<'a, T: Diffable> {
    Create(&'a T),
    Drop(&'a T),
    Alter(&'a T::Alter),
}

impl<T: Diffable> DiffEntity<'_, T> {
    #[must_use]
    pub const fn diff_type(&self) -> DiffType {
        match self {
            Self::Create(_) => DiffType::Create,
            Self::Drop(_) => DiffType::Drop,
            Self::Alter(_) => DiffType::Alter,
        }
    }
}

/// Created, dropped and altered rows of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct KindDiff<T: Diffable> {
    /// Right-only rows, in right-side order.
    pub created: Vec<T>,
    /// Left-only rows, in left-side order.
    pub dropped: Vec<T>,
    /// Matched-but-unequal pairs, in right-side order.
    pub altered: Vec<T::Alter>,
}

impl<T: Diffable> Default for KindDiff<T> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            dropped: Vec::new(),
            altered: Vec::new(),
        }
    }
}

impl<T: Diffable> KindDiff<T> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.dropped.is_empty() && self.altered.is_empty()
    }

    /// Flattened results: creates, then drops, then alters.
    #[must_use]
    pub fn entries(&self) -> Vec<DiffEntity<'_, T>> {
        self.created
            .iter()
            .map(DiffEntity::Create)
            .chain(self.dropped.iter().map(DiffEntity::Drop))
            .chain(self.altered.iter().map(DiffEntity::Alter))
            .collect()
    }
}

/// Diffs one kind between two collections.
#[must_use]
pub fn diff<T: Diffable>(from: &Collection<T>, to: &Collection<T>) -> KindDiff<T> {
    let mut result = KindDiff::default();
    for right in to {
        let Some(left) = from.get(&right.key()) else {
            result.created.push(right.clone());
            continue;
        };
        if let Some(alter) = T::alter(left, right) {
            result.altered.push(alter);
        }
    }
    result.dropped = from
        .iter()
        .filter(|left| !to.contains_key(&left.key()))
        .cloned()
        .collect();
    result
}

/// Diffs of every kind between two catalogs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogDiff {
    pub tables: KindDiff<Table>,
    pub columns: KindDiff<Column>,
    pub pks: KindDiff<PrimaryKey>,
    pub fks: KindDiff<ForeignKey>,
    pub indexes: KindDiff<Index>,
    pub checks: KindDiff<CheckConstraint>,
    pub views: KindDiff<View>,
    pub view_columns: KindDiff<ViewColumn>,
}

impl CatalogDiff {
    #[must_use]
    pub fn between(from: &Catalog, to: &Catalog) -> Self {
        Self {
            tables: diff(&from.tables, &to.tables),
            columns: diff(&from.columns, &to.columns),
            pks: diff(&from.pks, &to.pks),
            fks: diff(&from.fks, &to.fks),
            indexes: diff(&from.indexes, &to.indexes),
            checks: diff(&from.checks, &to.checks),
            views: diff(&from.views, &to.views),
            view_columns: diff(&from.view_columns, &to.view_columns),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.columns.is_empty()
            && self.pks.is_empty()
            && self.fks.is_empty()
            && self.indexes.is_empty()
            && self.checks.is_empty()
            && self.views.is_empty()
            && self.view_columns.is_empty()
    }

    /// Alter records of every kind.
    #[must_use]
    pub fn alters(&self) -> Alters {
        Alters {
            columns: self.columns.altered.clone(),
            pks: self.pks.altered.clone(),
            fks: self.fks.altered.clone(),
            indexes: self.indexes.altered.clone(),
            checks: self.checks.altered.clone(),
            views: self.views.altered.clone(),
            view_columns: self.view_columns.altered.clone(),
        }
    }
}

/// Alter records aggregated across kinds, for filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alters {
    pub columns: Vec<ColumnAlter>,
    pub pks: Vec<PkAlter>,
    pub fks: Vec<FkAlter>,
    pub indexes: Vec<IndexAlter>,
    pub checks: Vec<CheckAlter>,
    pub views: Vec<ViewAlter>,
    pub view_columns: Vec<ViewColumnAlter>,
}

impl Alters {
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
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
}

/// Aggregates alter records of every kind between two catalogs.
#[must_use]
pub fn alters(from: &Catalog, to: &Catalog) -> Alters {
    CatalogDiff::between(from, to).alters()
}

// ================================================================
// Column grouping
// ================================================================

/// Column create/drop candidates of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnGroup {
    pub table: String,
    pub created: Vec<Column>,
    pub dropped: Vec<Column>,
}

/// Groups column candidates by owning table, in table-name order.
/// Columns of created or dropped tables come and go with their table
/// and are excluded first.
#[must_use]
pub fn group_by_table(
    created: &[Column],
    dropped: &[Column],
    created_tables: &[Table],
    dropped_tables: &[Table],
) -> Vec<ColumnGroup> {
    let new_tables: BTreeSet<&str> = created_tables.iter().map(|t| t.name.as_str()).collect();
    let gone_tables: BTreeSet<&str> = dropped_tables.iter().map(|t| t.name.as_str()).collect();

    let mut groups: BTreeMap<&str, ColumnGroup> = BTreeMap::new();
    let group = |table: &str| ColumnGroup {
        table: table.to_string(),
        created: Vec::new(),
        dropped: Vec::new(),
    };
    for column in created.iter().filter(|c| !new_tables.contains(c.table.as_str())) {
        groups
            .entry(column.table.as_str())
            .or_insert_with(|| group(&column.table))
            .created
            .push(column.clone());
    }
    for column in dropped.iter().filter(|c| !gone_tables.contains(c.table.as_str())) {
        groups
            .entry(column.table.as_str())
            .or_insert_with(|| group(&column.table))
            .dropped
            .push(column.clone());
    }
    groups.into_values().collect()
}
