//! Catalog store: entity shapes, keyed collections, and the catalog.

pub mod catalog;
pub mod entities;
pub mod store;
pub mod validate;

pub use catalog::{Catalog, PushOutcome, PushStatus, Retargeted};
pub use entities::{
    CheckConstraint, CheckOption, Column, ColumnDefault, DefaultKind, Entity, EntityType,
    ForeignKey, Generated, GeneratedType, Index, IndexAlgorithm, IndexColumn, IndexLock,
    IndexUsing, PrimaryKey, ReferentialAction, SqlSecurity, Table, View, ViewAlgorithm,
    ViewColumn,
};
pub use store::{Assign, Collection, EntityKind, Match, Push};
