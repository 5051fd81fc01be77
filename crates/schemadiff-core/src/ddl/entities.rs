//! Entity shapes stored in a [`Catalog`](super::Catalog).
//!
//! Every kind is a plain struct with a natural key. The serialized form
//! (camelCase fields, `entityType` tag on [`Entity`]) is the row format of
//! persisted snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Entity kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    Tables,
    Columns,
    Pks,
    Fks,
    Indexes,
    Checks,
    Views,
    ViewColumns,
}

impl EntityType {
    /// All kinds in catalog order.
    pub const ALL: [Self; 8] = [
        Self::Tables,
        Self::Columns,
        Self::Pks,
        Self::Fks,
        Self::Indexes,
        Self::Checks,
        Self::Views,
        Self::ViewColumns,
    ];

    /// Returns the serialized tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tables => "tables",
            Self::Columns => "columns",
            Self::Pks => "pks",
            Self::Fks => "fks",
            Self::Indexes => "indexes",
            Self::Checks => "checks",
            Self::Views => "views",
            Self::ViewColumns => "viewColumns",
        }
    }

    /// Parses a serialized tag.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
}

impl Table {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// How a default value must be re-serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultKind {
    String,
    Number,
    Boolean,
    Bigint,
    Json,
    Text,
    Unknown,
}

impl DefaultKind {
    pub const ALL: [Self; 7] = [
        Self::String,
        Self::Number,
        Self::Boolean,
        Self::Bigint,
        Self::Json,
        Self::Text,
        Self::Unknown,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Bigint => "bigint",
            Self::Json => "json",
            Self::Text => "text",
            Self::Unknown => "unknown",
        }
    }
}

/// Column default: a literal or expression plus its value kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefault {
    pub value: String,
    #[serde(rename = "type")]
    pub kind: DefaultKind,
}

impl ColumnDefault {
    #[must_use]
    pub fn new(value: impl Into<String>, kind: DefaultKind) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }

    /// A SQL expression emitted verbatim, e.g. `CURRENT_TIMESTAMP`.
    #[must_use]
    pub fn expression(value: impl Into<String>) -> Self {
        Self::new(value, DefaultKind::Unknown)
    }

    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::new(value, DefaultKind::String)
    }

    #[must_use]
    pub fn number(value: impl Into<String>) -> Self {
        Self::new(value, DefaultKind::Number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedType {
    Stored,
    Virtual,
}

impl GeneratedType {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Stored => "STORED",
            Self::Virtual => "VIRTUAL",
        }
    }
}

/// Generated column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generated {
    #[serde(rename = "type")]
    pub kind: GeneratedType,
    #[serde(rename = "as")]
    pub expression: String,
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub table: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    pub not_null: bool,
    #[serde(default)]
    pub default: Option<ColumnDefault>,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub on_update_now: bool,
    #[serde(default)]
    pub char_set: Option<String>,
    #[serde(default)]
    pub collation: Option<String>,
    #[serde(default)]
    pub generated: Option<Generated>,
}

impl Column {
    /// Creates a nullable column with no default.
    #[must_use]
    pub fn new(table: impl Into<String>, name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            default: None,
            auto_increment: false,
            on_update_now: false,
            char_set: None,
            collation: None,
            generated: None,
        }
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub const fn on_update_now(mut self) -> Self {
        self.on_update_now = true;
        self
    }

    #[must_use]
    pub fn generated(mut self, kind: GeneratedType, expression: impl Into<String>) -> Self {
        self.generated = Some(Generated {
            kind,
            expression: expression.into(),
        });
        self
    }
}

/// A primary key. MySQL allows at most one per table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKey {
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub name_explicit: bool,
    pub columns: Vec<String>,
}

impl PrimaryKey {
    /// Creates an implicitly named primary key.
    #[must_use]
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        let table = table.into();
        let name = crate::grammar::default_pk_name(&table, &columns);
        Self {
            table,
            name,
            name_explicit: false,
            columns,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.name_explicit = true;
        self
    }
}

/// Referential action for `ON UPDATE` / `ON DELETE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[default]
    #[serde(rename = "NO ACTION")]
    NoAction,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
}

impl ReferentialAction {
    pub const ALL: [Self; 5] = [
        Self::NoAction,
        Self::Restrict,
        Self::Cascade,
        Self::SetNull,
        Self::SetDefault,
    ];

    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub name_explicit: bool,
    pub columns: Vec<String>,
    pub table_to: String,
    pub columns_to: Vec<String>,
    #[serde(default)]
    pub on_update: ReferentialAction,
    #[serde(default)]
    pub on_delete: ReferentialAction,
}

impl ForeignKey {
    /// Creates an implicitly named foreign key with `NO ACTION` actions.
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        columns: Vec<String>,
        table_to: impl Into<String>,
        columns_to: Vec<String>,
    ) -> Self {
        let mut fk = Self {
            table: table.into(),
            name: String::new(),
            name_explicit: false,
            columns,
            table_to: table_to.into(),
            columns_to,
            on_update: ReferentialAction::NoAction,
            on_delete: ReferentialAction::NoAction,
        };
        fk.name = crate::grammar::default_fk_name(&fk);
        fk
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.name_explicit = true;
        self
    }

    #[must_use]
    pub const fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    #[must_use]
    pub const fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }

    /// Whether the key references its own table.
    #[must_use]
    pub fn is_self_reference(&self) -> bool {
        self.table == self.table_to
    }
}

/// One index column: a raw identifier or an opaque SQL expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexColumn {
    pub value: String,
    pub is_expression: bool,
}

impl IndexColumn {
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            value: name.into(),
            is_expression: false,
        }
    }

    #[must_use]
    pub fn expression(sql: impl Into<String>) -> Self {
        Self {
            value: sql.into(),
            is_expression: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexUsing {
    Btree,
    Hash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexAlgorithm {
    Default,
    Inplace,
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexLock {
    Default,
    None,
    Shared,
    Exclusive,
}

/// An index (unique or not).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub name_explicit: bool,
    pub columns: Vec<IndexColumn>,
    pub is_unique: bool,
    #[serde(default)]
    pub using: Option<IndexUsing>,
    #[serde(default)]
    pub algorithm: Option<IndexAlgorithm>,
    #[serde(default)]
    pub lock: Option<IndexLock>,
}

impl Index {
    /// Creates an implicitly named index over plain columns.
    #[must_use]
    pub fn new(table: impl Into<String>, columns: Vec<IndexColumn>, is_unique: bool) -> Self {
        let mut index = Self {
            table: table.into(),
            name: String::new(),
            name_explicit: false,
            columns,
            is_unique,
            using: None,
            algorithm: None,
            lock: None,
        };
        index.name = crate::grammar::default_index_name(&index).unwrap_or_default();
        index
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.name_explicit = true;
        self
    }

    #[must_use]
    pub const fn using(mut self, using: IndexUsing) -> Self {
        self.using = Some(using);
        self
    }
}

/// A check constraint. `value` is an opaque SQL expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConstraint {
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub name_explicit: bool,
    pub value: String,
}

impl CheckConstraint {
    #[must_use]
    pub fn new(table: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            name_explicit: true,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewAlgorithm {
    #[default]
    Undefined,
    Merge,
    Temptable,
}

impl ViewAlgorithm {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Merge => "merge",
            Self::Temptable => "temptable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlSecurity {
    #[default]
    Definer,
    Invoker,
}

impl SqlSecurity {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Definer => "definer",
            Self::Invoker => "invoker",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOption {
    Local,
    Cascaded,
}

impl CheckOption {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cascaded => "cascaded",
        }
    }
}

/// A view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub name: String,
    pub definition: String,
    #[serde(default)]
    pub algorithm: ViewAlgorithm,
    #[serde(default)]
    pub sql_security: SqlSecurity,
    #[serde(default)]
    pub with_check_option: Option<CheckOption>,
}

impl View {
    #[must_use]
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
            algorithm: ViewAlgorithm::Undefined,
            sql_security: SqlSecurity::Definer,
            with_check_option: None,
        }
    }
}

/// A column of a view, as reported by the schema source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewColumn {
    pub view: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    pub not_null: bool,
}

/// One catalog row of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entityType")]
pub enum Entity {
    #[serde(rename = "tables")]
    Table(Table),
    #[serde(rename = "columns")]
    Column(Column),
    #[serde(rename = "pks")]
    PrimaryKey(PrimaryKey),
    #[serde(rename = "fks")]
    ForeignKey(ForeignKey),
    #[serde(rename = "indexes")]
    Index(Index),
    #[serde(rename = "checks")]
    Check(CheckConstraint),
    #[serde(rename = "views")]
    View(View),
    #[serde(rename = "viewColumns")]
    ViewColumn(ViewColumn),
}

impl Entity {
    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        match self {
            Self::Table(_) => EntityType::Tables,
            Self::Column(_) => EntityType::Columns,
            Self::PrimaryKey(_) => EntityType::Pks,
            Self::ForeignKey(_) => EntityType::Fks,
            Self::Index(_) => EntityType::Indexes,
            Self::Check(_) => EntityType::Checks,
            Self::View(_) => EntityType::Views,
            Self::ViewColumn(_) => EntityType::ViewColumns,
        }
    }

    /// Human readable identification used in error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Table(t) => format!("table '{}'", t.name),
            Self::Column(c) => format!("column '{}.{}'", c.table, c.name),
            Self::PrimaryKey(pk) => format!("primary key '{}' on '{}'", pk.name, pk.table),
            Self::ForeignKey(fk) => format!("foreign key '{}' on '{}'", fk.name, fk.table),
            Self::Index(i) => format!("index '{}' on '{}'", i.name, i.table),
            Self::Check(c) => format!("check '{}' on '{}'", c.name, c.table),
            Self::View(v) => format!("view '{}'", v.name),
            Self::ViewColumn(c) => format!("view column '{}.{}'", c.view, c.name),
        }
    }

    /// Semantic checks that the type system cannot express: non-empty
    /// identifiers, non-empty key column lists, matching FK arity.
    #[must_use]
    pub fn validate(&self, path: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut ident = |field: &str, value: &str| {
            if value.trim().is_empty() {
                errors.push(ValidationError::new(format!("{path}.{field}"), "non-empty identifier"));
            }
        };
        match self {
            Self::Table(t) => ident("name", &t.name),
            Self::Column(c) => {
                ident("table", &c.table);
                ident("name", &c.name);
                ident("type", &c.sql_type);
            }
            Self::PrimaryKey(pk) => {
                ident("table", &pk.table);
                ident("name", &pk.name);
            }
            Self::ForeignKey(fk) => {
                ident("table", &fk.table);
                ident("name", &fk.name);
                ident("tableTo", &fk.table_to);
            }
            Self::Index(i) => {
                ident("table", &i.table);
                ident("name", &i.name);
            }
            Self::Check(c) => {
                ident("table", &c.table);
                ident("name", &c.name);
                ident("value", &c.value);
            }
            Self::View(v) => ident("name", &v.name),
            Self::ViewColumn(c) => {
                ident("view", &c.view);
                ident("name", &c.name);
            }
        }
        let mut non_empty = |field: &str, len: usize| {
            if len == 0 {
                errors.push(ValidationError::new(format!("{path}.{field}"), "at least one column"));
            }
        };
        match self {
            Self::PrimaryKey(pk) => non_empty("columns", pk.columns.len()),
            Self::Index(i) => non_empty("columns", i.columns.len()),
            Self::ForeignKey(fk) => {
                non_empty("columns", fk.columns.len());
                non_empty("columnsTo", fk.columns_to.len());
            }
            _ => {}
        }
        if let Self::ForeignKey(fk) = self {
            if fk.columns.len() != fk.columns_to.len() {
                errors.push(ValidationError::new(
                    format!("{path}.columnsTo"),
                    format!("{} referenced column(s)", fk.columns.len()),
                ));
            }
        }
        errors
    }
}

impl From<Table> for Entity {
    fn from(value: Table) -> Self {
        Self::Table(value)
    }
}

impl From<Column> for Entity {
    fn from(value: Column) -> Self {
        Self::Column(value)
    }
}

impl From<PrimaryKey> for Entity {
    fn from(value: PrimaryKey) -> Self {
        Self::PrimaryKey(value)
    }
}

impl From<ForeignKey> for Entity {
    fn from(value: ForeignKey) -> Self {
        Self::ForeignKey(value)
    }
}

impl From<Index> for Entity {
    fn from(value: Index) -> Self {
        Self::Index(value)
    }
}

impl From<CheckConstraint> for Entity {
    fn from(value: CheckConstraint) -> Self {
        Self::Check(value)
    }
}

impl From<View> for Entity {
    fn from(value: View) -> Self {
        Self::View(value)
    }
}

impl From<ViewColumn> for Entity {
    fn from(value: ViewColumn) -> Self {
        Self::ViewColumn(value)
    }
}
