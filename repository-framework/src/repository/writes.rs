use crate::error::RepositoryError;
use sea_orm::sea_query::{Alias, InsertStatement, OnConflict, Query, SimpleExpr, Value};

/// Flat row representation a data mapper produces for one table: the write
/// side's counterpart of a query row. The repository turns these into
/// INSERTs (`add`) or primary-key upserts (`persist`).
#[derive(Debug, Clone)]
pub struct RowImage {
    pub table: &'static str,
    pub primary_key: &'static [&'static str],
    pub columns: Vec<(&'static str, Value)>,
}

impl RowImage {
    pub fn new(table: &'static str, primary_key: &'static [&'static str]) -> Self {
        Self {
            table,
            primary_key,
            columns: Vec::new(),
        }
    }

    pub fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.columns.push((column, value.into()));
        self
    }
}

pub(crate) fn insert_statement(row: &RowImage) -> Result<InsertStatement, RepositoryError> {
    let mut stmt = Query::insert();
    stmt.into_table(Alias::new(row.table))
        .columns(row.columns.iter().map(|(column, _)| Alias::new(*column)));
    stmt.values(
        row.columns
            .iter()
            .map(|(_, value)| SimpleExpr::Value(value.clone())),
    )
    .map_err(|err| RepositoryError::InvalidQuery(err.to_string()))?;
    Ok(stmt)
}

/// INSERT .. ON CONFLICT (pk) DO UPDATE over the non-key columns; rows
/// that are all key (association rows) conflict to a no-op instead.
pub(crate) fn upsert_statement(row: &RowImage) -> Result<InsertStatement, RepositoryError> {
    let mut stmt = insert_statement(row)?;
    let mut on_conflict = OnConflict::columns(row.primary_key.iter().map(|c| Alias::new(*c)));
    let non_key: Vec<Alias> = row
        .columns
        .iter()
        .filter(|(column, _)| !row.primary_key.contains(column))
        .map(|(column, _)| Alias::new(*column))
        .collect();
    if non_key.is_empty() {
        on_conflict.do_nothing();
    } else {
        on_conflict.update_columns(non_key);
    }
    stmt.on_conflict(on_conflict);
    Ok(stmt)
}
