//! Arena storage for one entity kind, indexed by natural key.
//!
//! Queries and updates take generated struct-of-optionals filters
//! (`*Where`) and assignments (`*Set`). A `None` field is a wildcard
//! on the filter side and "leave unchanged" on the assignment side.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use super::entities::{
    CheckConstraint, CheckOption, Column, ColumnDefault, EntityType, ForeignKey, Generated, Index,
    IndexAlgorithm, IndexColumn, IndexLock, IndexUsing, PrimaryKey, ReferentialAction, SqlSecurity,
    Table, View, ViewAlgorithm, ViewColumn,
};
use crate::error::{DiffError, Result};

// ================================================================
// Predicates and assignments
// ================================================================

/// A predicate on one field.
pub enum Match<V> {
    Eq(V),
    Ne(V),
    /// Set membership.
    In(Vec<V>),
    /// Structured predicate, e.g. array containment.
    Pred(Box<dyn Fn(&V) -> bool>),
}

impl<V: PartialEq> Match<V> {
    #[must_use]
    pub fn test(&self, value: &V) -> bool {
        match self {
            Self::Eq(expected) => value == expected,
            Self::Ne(expected) => value != expected,
            Self::In(options) => options.contains(value),
            Self::Pred(pred) => pred(value),
        }
    }

    #[must_use]
    pub fn pred(f: impl Fn(&V) -> bool + 'static) -> Self {
        Self::Pred(Box::new(f))
    }
}

impl Match<String> {
    /// Matches any of the given names.
    #[must_use]
    pub fn any_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::In(names.into_iter().map(Into::into).collect())
    }
}

impl Match<Vec<String>> {
    /// Array field contains `item`.
    #[must_use]
    pub fn contains(item: impl Into<String>) -> Self {
        let item = item.into();
        Self::pred(move |values: &Vec<String>| values.contains(&item))
    }

    /// Array field holds the same elements as `items`, in any order.
    #[must_use]
    pub fn same_set(items: &[String]) -> Self {
        let mut expected = items.to_vec();
        expected.sort();
        Self::pred(move |values: &Vec<String>| {
            let mut actual = values.clone();
            actual.sort();
            actual == expected
        })
    }
}

impl Match<Vec<IndexColumn>> {
    /// Index columns contain a plain (non-expression) column `name`.
    #[must_use]
    pub fn contains_column(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::pred(move |columns: &Vec<IndexColumn>| {
            columns.iter().any(|c| !c.is_expression && c.value == name)
        })
    }
}

impl<V> From<V> for Match<V> {
    fn from(value: V) -> Self {
        Self::Eq(value)
    }
}

impl From<&str> for Match<String> {
    fn from(value: &str) -> Self {
        Self::Eq(value.to_string())
    }
}

/// A field assignment: a constant or a function of the old value.
pub enum Assign<V> {
    To(V),
    Map(Box<dyn Fn(&V) -> V>),
}

impl<V: Clone> Assign<V> {
    #[must_use]
    pub fn map(f: impl Fn(&V) -> V + 'static) -> Self {
        Self::Map(Box::new(f))
    }

    #[must_use]
    pub fn apply(&self, old: &V) -> V {
        match self {
            Self::To(value) => value.clone(),
            Self::Map(f) => f(old),
        }
    }
}

impl<T: 'static> Assign<Vec<T>> {
    /// Rewrites an array field element by element.
    #[must_use]
    pub fn each(f: impl Fn(&T) -> T + 'static) -> Self {
        Self::Map(Box::new(move |values: &Vec<T>| values.iter().map(&f).collect()))
    }
}

impl<V> From<V> for Assign<V> {
    fn from(value: V) -> Self {
        Self::To(value)
    }
}

impl From<&str> for Assign<String> {
    fn from(value: &str) -> Self {
        Self::To(value.to_string())
    }
}

// ================================================================
// Entity kinds
// ================================================================

/// A row type storable in a [`Collection`].
pub trait EntityKind: Clone + Debug + PartialEq {
    /// Natural key.
    type Key: Clone + Debug + Eq + Hash + Ord;
    /// Field filter.
    type Where: Default;
    /// Field assignment.
    type Set: Default;

    const TYPE: EntityType;

    fn key(&self) -> Self::Key;

    fn matches(&self, filter: &Self::Where) -> bool;

    fn apply(&mut self, set: &Self::Set);
}

macro_rules! entity_kind {
    (
        $entity:ident => $where_:ident, $set:ident, $kind:expr;
        key($this:ident) -> $key:ty { $key_expr:expr };
        $($field:ident: $fty:ty),+ $(,)?
    ) => {
        #[doc = concat!("Filter over [`", stringify!($entity), "`] rows.")]
        #[derive(Default)]
        pub struct $where_ {
            $(pub $field: Option<Match<$fty>>,)+
        }

        impl $where_ {
            /// Matches every row.
            #[must_use]
            pub fn new() -> Self {
                <Self as Default>::default()
            }

            $(
                #[must_use]
                pub fn $field(mut self, m: impl Into<Match<$fty>>) -> Self {
                    self.$field = Some(m.into());
                    self
                }
            )+
        }

        #[doc = concat!("Assignment over [`", stringify!($entity), "`] rows.")]
        #[derive(Default)]
        pub struct $set {
            $(pub $field: Option<Assign<$fty>>,)+
        }

        impl $set {
            /// Assigns nothing.
            #[must_use]
            pub fn new() -> Self {
                <Self as Default>::default()
            }

            $(
                #[must_use]
                pub fn $field(mut self, a: impl Into<Assign<$fty>>) -> Self {
                    self.$field = Some(a.into());
                    self
                }
            )+
        }

        impl EntityKind for $entity {
            type Key = $key;
            type Where = $where_;
            type Set = $set;

            const TYPE: EntityType = $kind;

            fn key(&self) -> $key {
                let $this = self;
                $key_expr
            }

            fn matches(&self, filter: &$where_) -> bool {
                $(
                    if let Some(m) = &filter.$field {
                        if !m.test(&self.$field) {
                            return false;
                        }
                    }
                )+
                true
            }

            fn apply(&mut self, set: &$set) {
                $(
                    if let Some(a) = &set.$field {
                        self.$field = a.apply(&self.$field);
                    }
                )+
            }
        }
    };
}

entity_kind! {
    Table => TableWhere, TableSet, EntityType::Tables;
    key(t) -> String { t.name.clone() };
    name: String,
}

entity_kind! {
    Column => ColumnWhere, ColumnSet, EntityType::Columns;
    key(c) -> (String, String) { (c.table.clone(), c.name.clone()) };
    table: String,
    name: String,
    sql_type: String,
    not_null: bool,
    default: Option<ColumnDefault>,
    auto_increment: bool,
    on_update_now: bool,
    char_set: Option<String>,
    collation: Option<String>,
    generated: Option<Generated>,
}

entity_kind! {
    PrimaryKey => PkWhere, PkSet, EntityType::Pks;
    key(pk) -> String { pk.table.clone() };
    table: String,
    name: String,
    name_explicit: bool,
    columns: Vec<String>,
}

entity_kind! {
    ForeignKey => FkWhere, FkSet, EntityType::Fks;
    key(fk) -> (String, String) { (fk.table.clone(), fk.name.clone()) };
    table: String,
    name: String,
    name_explicit: bool,
    columns: Vec<String>,
    table_to: String,
    columns_to: Vec<String>,
    on_update: ReferentialAction,
    on_delete: ReferentialAction,
}

entity_kind! {
    Index => IndexWhere, IndexSet, EntityType::Indexes;
    key(i) -> (String, String) { (i.table.clone(), i.name.clone()) };
    table: String,
    name: String,
    name_explicit: bool,
    columns: Vec<IndexColumn>,
    is_unique: bool,
    using: Option<IndexUsing>,
    algorithm: Option<IndexAlgorithm>,
    lock: Option<IndexLock>,
}

entity_kind! {
    CheckConstraint => CheckWhere, CheckSet, EntityType::Checks;
    key(c) -> (String, String) { (c.table.clone(), c.name.clone()) };
    table: String,
    name: String,
    name_explicit: bool,
    value: String,
}

entity_kind! {
    View => ViewWhere, ViewSet, EntityType::Views;
    key(v) -> String { v.name.clone() };
    name: String,
    definition: String,
    algorithm: ViewAlgorithm,
    sql_security: SqlSecurity,
    with_check_option: Option<CheckOption>,
}

entity_kind! {
    ViewColumn => ViewColumnWhere, ViewColumnSet, EntityType::ViewColumns;
    key(c) -> (String, String) { (c.view.clone(), c.name.clone()) };
    view: String,
    name: String,
    sql_type: String,
    not_null: bool,
}

// ================================================================
// Collection
// ================================================================

/// Result of [`Collection::push`].
#[derive(Debug, PartialEq)]
pub enum Push<'a, T> {
    /// The row was stored.
    Inserted(&'a T),
    /// A row with the same key already exists and was left untouched.
    Conflict(&'a T),
}

impl<T> Push<'_, T> {
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Rows of one kind in insertion order, with an O(1) key index.
#[derive(Debug, Clone)]
pub struct Collection<T: EntityKind> {
    rows: Vec<T>,
    keys: HashMap<T::Key, usize>,
}

impl<T: EntityKind> Default for Collection<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            keys: HashMap::new(),
        }
    }
}

impl<T: EntityKind> PartialEq for Collection<T> {
    /// Key-wise equality; insertion order is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.rows.len() == other.rows.len()
            && self.rows.iter().all(|row| other.get(&row.key()) == Some(row))
    }
}

impl<T: EntityKind> Collection<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row unless its key is taken.
    pub fn push(&mut self, row: T) -> Push<'_, T> {
        let key = row.key();
        if let Some(&idx) = self.keys.get(&key) {
            return Push::Conflict(&self.rows[idx]);
        }
        let idx = self.rows.len();
        self.rows.push(row);
        self.keys.insert(key, idx);
        Push::Inserted(&self.rows[idx])
    }

    #[must_use]
    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.keys.get(key).map(|&idx| &self.rows[idx])
    }

    #[must_use]
    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.keys.contains_key(key)
    }

    #[must_use]
    pub fn list(&self, filter: &T::Where) -> Vec<&T> {
        self.rows.iter().filter(|row| row.matches(filter)).collect()
    }

    #[must_use]
    pub fn one(&self, filter: &T::Where) -> Option<&T> {
        self.rows.iter().find(|row| row.matches(filter))
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Applies `set` to every row matching `filter` and returns the
    /// updated rows.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Internal`] if the update would give two rows
    /// the same key. Nothing is changed in that case.
    pub fn update(&mut self, set: &T::Set, filter: &T::Where) -> Result<Vec<T>> {
        let targets: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.matches(filter))
            .map(|(idx, _)| idx)
            .collect();
        self.commit(set, &targets)
    }

    /// Like [`update`](Self::update) with a closure filter, for
    /// predicates spanning several fields.
    ///
    /// # Errors
    ///
    /// Same as [`update`](Self::update).
    pub fn update_if(&mut self, set: &T::Set, pred: impl Fn(&T) -> bool) -> Result<Vec<T>> {
        let targets: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| pred(row))
            .map(|(idx, _)| idx)
            .collect();
        self.commit(set, &targets)
    }

    /// Removes every row matching `filter` and returns them.
    pub fn delete(&mut self, filter: &T::Where) -> Vec<T> {
        let (removed, kept): (Vec<T>, Vec<T>) =
            self.rows.drain(..).partition(|row| row.matches(filter));
        self.rows = kept;
        self.reindex();
        removed
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }

    /// All-or-nothing: the new rows are only stored when their keys stay
    /// unique.
    fn commit(&mut self, set: &T::Set, targets: &[usize]) -> Result<Vec<T>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        let mut next = self.rows.clone();
        for &idx in targets {
            next[idx].apply(set);
        }
        let mut keys = HashMap::with_capacity(next.len());
        for (idx, row) in next.iter().enumerate() {
            if keys.insert(row.key(), idx).is_some() {
                return Err(DiffError::Internal(format!(
                    "update would duplicate {} key {:?}",
                    T::TYPE,
                    row.key()
                )));
            }
        }
        let updated = targets.iter().map(|&idx| next[idx].clone()).collect();
        self.rows = next;
        self.keys = keys;
        Ok(updated)
    }

    fn reindex(&mut self) {
        self.keys = self
            .rows
            .iter()
            .enumerate()
            .map(|(idx, row)| (row.key(), idx))
            .collect();
    }
}

impl<'a, T: EntityKind> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fk(table: &str, cols: &[&str], to: &str) -> ForeignKey {
        ForeignKey::new(
            table,
            cols.iter().map(ToString::to_string).collect(),
            to,
            vec!["id".into(); cols.len()],
        )
    }

    #[test]
    fn push_conflict_keeps_first_row() {
        let mut tables = Collection::new();
        assert!(!tables.push(Table::new("users")).is_conflict());
        assert!(tables.push(Table::new("users")).is_conflict());
        assert_eq!(tables.len(), 1);
    }

    #[test]
    fn list_with_structured_predicates() {
        let mut fks = Collection::new();
        fks.push(fk("posts", &["author_id"], "users"));
        fks.push(fk("posts", &["editor_id"], "users"));
        fks.push(fk("comments", &["post_id"], "posts"));

        let filter = FkWhere::new().columns(Match::contains("author_id"));
        assert_eq!(fks.list(&filter).len(), 1);

        let filter = FkWhere::new().table_to("users").table(Match::Ne("users".into()));
        assert_eq!(fks.list(&filter).len(), 2);

        let filter = FkWhere::new().table(Match::any_of(["comments", "tags"]));
        assert_eq!(fks.one(&filter).map(|f| f.table_to.as_str()), Some("posts"));
    }

    #[test]
    fn update_returns_rows_and_reindexes() {
        let mut columns = Collection::new();
        columns.push(Column::new("users", "id", "int"));
        columns.push(Column::new("users", "email", "varchar(255)"));
        columns.push(Column::new("posts", "id", "int"));

        let updated = columns
            .update(
                &ColumnSet::new().table("people"),
                &ColumnWhere::new().table("users"),
            )
            .unwrap();
        assert_eq!(updated.len(), 2);
        assert!(columns.get(&("people".into(), "email".into())).is_some());
        assert!(columns.get(&("users".into(), "id".into())).is_none());
    }

    #[test]
    fn default_field_builders_coexist_with_new() {
        let mut columns = Collection::new();
        columns.push(Column::new("t", "a", "int").default_value(ColumnDefault::number("1")));
        columns.push(Column::new("t", "b", "int"));

        let filter = ColumnWhere::new()
            .table("t")
            .default(Some(ColumnDefault::number("1")));
        assert_eq!(columns.one(&filter).map(|c| c.name.as_str()), Some("a"));

        let updated = columns
            .update(&ColumnSet::new().default(None::<ColumnDefault>), &filter)
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(columns.list(&ColumnWhere::new().default(None::<ColumnDefault>)).len(), 2);
    }

    #[test]
    fn update_rejects_key_collisions() {
        let mut columns = Collection::new();
        columns.push(Column::new("t", "a", "int"));
        columns.push(Column::new("t", "b", "int"));

        let err = columns.update(&ColumnSet::new().name("b"), &ColumnWhere::new().name("a"));
        assert!(matches!(err, Err(DiffError::Internal(_))));
        assert!(columns.get(&("t".into(), "a".into())).is_some());
    }

    #[test]
    fn swap_in_one_pass_is_allowed() {
        let mut columns = Collection::new();
        columns.push(Column::new("t", "a", "int"));
        columns.push(Column::new("t", "b", "text"));

        let set = ColumnSet::new().name(Assign::map(|n: &String| {
            if n == "a" { "b".to_string() } else { "a".to_string() }
        }));
        columns.update(&set, &ColumnWhere::new().table("t")).unwrap();
        let a = columns.get(&("t".into(), "a".into())).unwrap();
        assert_eq!(a.sql_type, "text");
    }

    #[test]
    fn each_rewrites_array_elements() {
        let mut pks = Collection::new();
        pks.push(PrimaryKey::new("t", vec!["a".into(), "b".into()]));
        let set = PkSet::new().columns(Assign::each(|c: &String| {
            if c == "a" { "x".to_string() } else { c.clone() }
        }));
        pks.update(&set, &PkWhere::new().columns(Match::contains("a")))
            .unwrap();
        assert_eq!(pks.get(&"t".to_string()).unwrap().columns, vec!["x", "b"]);
    }

    #[test]
    fn delete_and_equality_ignore_order() {
        let mut a = Collection::new();
        a.push(Table::new("x"));
        a.push(Table::new("y"));
        let mut b = Collection::new();
        b.push(Table::new("y"));
        b.push(Table::new("x"));
        assert_eq!(a, b);

        let removed = a.delete(&TableWhere::new().name("x"));
        assert_eq!(removed.len(), 1);
        assert!(a.get(&"y".to_string()).is_some());
        assert_ne!(a, b);
    }
}
