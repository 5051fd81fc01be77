//! Cascading rename propagation.
//!
//! Accepted renames relabel the `from` catalog so that, after
//! propagation, matching entities share keys across both catalogs and a
//! re-diff reports ordinary alters instead of create+drop pairs. All
//! renames of one kind are applied in a single simultaneous pass, so a
//! swap (`a->b`, `b->a`) is safe.
//!
//! Afterwards the `to` catalog's default-named FKs and indexes take back
//! the from-side name when the only difference is the renamed
//! identifier embedded in the default name.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::ddl::store::{
    ColumnSet, FkSet, FkWhere, IndexSet, IndexWhere, PkSet, TableSet, ViewColumnSet, ViewSet,
};
use crate::ddl::{Assign, Catalog, Column, ForeignKey, Index, IndexColumn, Table, View};
use crate::error::Result;
use crate::grammar;
use crate::resolver::Renamed;

fn rename_value(map: HashMap<String, String>) -> Assign<String> {
    Assign::map(move |v: &String| map.get(v).cloned().unwrap_or_else(|| v.clone()))
}

fn rename_each(map: HashMap<String, String>) -> Assign<Vec<String>> {
    Assign::each(move |v: &String| map.get(v).cloned().unwrap_or_else(|| v.clone()))
}

fn rename_index_columns(map: HashMap<String, String>) -> Assign<Vec<IndexColumn>> {
    Assign::each(move |c: &IndexColumn| match map.get(&c.value) {
        Some(renamed) if !c.is_expression => IndexColumn::column(renamed.clone()),
        _ => c.clone(),
    })
}

/// Applies table renames to `from` and restores default-generated
/// constraint names in `to`.
///
/// # Errors
///
/// [`DiffError::Internal`](crate::error::DiffError::Internal) when a renamed row collides with an existing key.
pub fn rename_tables(from: &mut Catalog, to: &mut Catalog, renames: &[Renamed<Table>]) -> Result<()> {
    if renames.is_empty() {
        return Ok(());
    }
    let map: HashMap<String, String> = renames
        .iter()
        .map(|r| (r.from.name.clone(), r.to.name.clone()))
        .collect();

    from.tables.update_if(&TableSet::new().name(rename_value(map.clone())), |t| {
        map.contains_key(&t.name)
    })?;
    let touched = from.retarget_tables(&map)?;
    debug!(
        tables = map.len(),
        fks = touched.fks.len(),
        indexes = touched.indexes.len(),
        "Propagated table renames"
    );

    preserve_fk_names(to, &touched.fks)?;
    preserve_index_names(to, &touched.indexes)
}

/// Applies column renames to `from`: the columns themselves, plain index
/// columns, PK columns, FK columns of the owning table, and `columnsTo`
/// of FKs referencing it. Expression index columns are never touched.
///
/// # Errors
///
/// [`DiffError::Internal`](crate::error::DiffError::Internal) when a renamed row collides with an existing key.
pub fn rename_columns(
    from: &mut Catalog,
    to: &mut Catalog,
    renames: &[Renamed<Column>],
) -> Result<()> {
    let mut by_table: BTreeMap<&str, HashMap<String, String>> = BTreeMap::new();
    for r in renames {
        by_table
            .entry(r.from.table.as_str())
            .or_default()
            .insert(r.from.name.clone(), r.to.name.clone());
    }

    for (table, map) in by_table {
        from.columns.update_if(&ColumnSet::new().name(rename_value(map.clone())), |c| {
            c.table == table && map.contains_key(&c.name)
        })?;

        let indexes = from.indexes.update(
            &IndexSet::new().columns(rename_index_columns(map.clone())),
            &IndexWhere::new().table(table),
        )?;
        from.pks.update_if(&PkSet::new().columns(rename_each(map.clone())), |pk| {
            pk.table == table && pk.columns.iter().any(|c| map.contains_key(c))
        })?;

        let mut fks = from.fks.update_if(&FkSet::new().columns(rename_each(map.clone())), |fk| {
            fk.table == table && fk.columns.iter().any(|c| map.contains_key(c))
        })?;
        let referencing = from.fks.update_if(
            &FkSet::new().columns_to(rename_each(map.clone())),
            |fk| fk.table_to == table && fk.columns_to.iter().any(|c| map.contains_key(c)),
        )?;
        // A self-reference shows up in both passes; keep its final state.
        for fk in referencing {
            if let Some(existing) = fks.iter_mut().find(|f| f.table == fk.table && f.name == fk.name) {
                *existing = fk;
                continue;
            }
            fks.push(fk);
        }
        debug!(table, columns = map.len(), fks = fks.len(), "Propagated column renames");

        preserve_fk_names(to, &fks)?;
        preserve_index_names(to, &indexes)?;
    }
    Ok(())
}

/// Applies view renames to `from`: view names and view-column owners.
///
/// # Errors
///
/// [`DiffError::Internal`](crate::error::DiffError::Internal) when a renamed row collides with an existing key.
pub fn rename_views(from: &mut Catalog, renames: &[Renamed<View>]) -> Result<()> {
    if renames.is_empty() {
        return Ok(());
    }
    let map: HashMap<String, String> = renames
        .iter()
        .map(|r| (r.from.name.clone(), r.to.name.clone()))
        .collect();
    from.views.update_if(&ViewSet::new().name(rename_value(map.clone())), |v| {
        map.contains_key(&v.name)
    })?;
    from.view_columns
        .update_if(&ViewColumnSet::new().view(rename_value(map.clone())), |c| {
            map.contains_key(&c.view)
        })?;
    Ok(())
}

// ================================================================
// Name preservation
// ================================================================

fn preserve_fk_names(to: &mut Catalog, relabelled: &[ForeignKey]) -> Result<()> {
    for fk in relabelled.iter().filter(|fk| !fk.name_explicit) {
        let default = grammar::default_fk_name(fk);
        if default == fk.name || to.fks.contains_key(&(fk.table.clone(), fk.name.clone())) {
            continue;
        }
        let implicit = to
            .fks
            .get(&(fk.table.clone(), default.clone()))
            .is_some_and(|target| !target.name_explicit);
        if implicit {
            to.fks.update(
                &FkSet::new().name(fk.name.clone()),
                &FkWhere::new().table(fk.table.clone()).name(default),
            )?;
        }
    }
    Ok(())
}

fn preserve_index_names(to: &mut Catalog, relabelled: &[Index]) -> Result<()> {
    for index in relabelled.iter().filter(|i| !i.name_explicit) {
        let Some(default) = grammar::default_index_name(index) else {
            continue;
        };
        if default == index.name
            || to
                .indexes
                .contains_key(&(index.table.clone(), index.name.clone()))
        {
            continue;
        }
        let implicit = to
            .indexes
            .get(&(index.table.clone(), default.clone()))
            .is_some_and(|target| !target.name_explicit);
        if implicit {
            to.indexes.update(
                &IndexSet::new().name(index.name.clone()),
                &IndexWhere::new().table(index.table.clone()).name(default),
            )?;
        }
    }
    Ok(())
}
