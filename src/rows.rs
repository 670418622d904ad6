use std::sync::Arc;

use crate::codec::{dealias_column_name, decode_value, scan_type};
use crate::engine::{ColumnDescriptor, RowSource};
use crate::error::LedgerSqlError;
use crate::results::ResultSet;
use crate::types::{RowValues, ScanType};

/// Outcome of advancing a [`Rows`] cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    /// The destination slice now holds the next row.
    Row,
    /// No more rows; the cursor stays exhausted.
    Exhausted,
}

/// Query result cursor over an engine [`RowSource`].
///
/// Positioned before the first row on creation and only moves forward.
pub struct Rows {
    source: Box<dyn RowSource>,
    descriptors: Vec<ColumnDescriptor>,
    columns: Arc<Vec<String>>,
    exhausted: bool,
    closed: bool,
}

impl std::fmt::Debug for Rows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("columns", &self.columns)
            .field("exhausted", &self.exhausted)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Rows {
    /// Wrap an engine cursor, reading its column metadata once.
    ///
    /// # Errors
    /// Returns `LedgerSqlError::Engine` if the cursor cannot report its columns.
    pub fn new(source: Box<dyn RowSource>) -> Result<Self, LedgerSqlError> {
        let descriptors = source.columns().map_err(LedgerSqlError::Engine)?;
        let columns = descriptors
            .iter()
            .map(|col| dealias_column_name(&col.name).to_owned())
            .collect();
        Ok(Self {
            source,
            descriptors,
            columns: Arc::new(columns),
            exhausted: false,
            closed: false,
        })
    }

    /// Column names in declared order, with engine aliasing removed.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Engine type name of the index-th column, verbatim; empty when out of range.
    #[must_use]
    pub fn database_type_name(&self, index: usize) -> &str {
        self.descriptors
            .get(index)
            .map_or("", |col| col.type_name.as_str())
    }

    #[must_use]
    pub fn scan_type(&self, index: usize) -> Option<ScanType> {
        self.descriptors
            .get(index)
            .map(|col| scan_type(&col.type_name))
    }

    /// Nullability cannot be derived from a query result; always unknown.
    #[must_use]
    pub fn nullable(&self, _index: usize) -> Option<bool> {
        None
    }

    /// The engine has no decimal columns; precision and scale are always unknown.
    #[must_use]
    pub fn precision_scale(&self, _index: usize) -> Option<(i64, i64)> {
        None
    }

    /// Advance to the next row, decoding it into `dest` in column order.
    ///
    /// Values are looked up by each column's selector, not by their position in
    /// the engine row.
    ///
    /// # Errors
    /// Returns `ParameterError` when `dest` is shorter than the column list,
    /// `ExecutionError` when a row lacks a declared column, or the engine's error.
    pub async fn next(&mut self, dest: &mut [RowValues]) -> Result<RowStatus, LedgerSqlError> {
        if self.exhausted || self.closed {
            return Ok(RowStatus::Exhausted);
        }
        if dest.len() < self.descriptors.len() {
            return Err(LedgerSqlError::ParameterError(format!(
                "destination holds {} values but the result has {} columns",
                dest.len(),
                self.descriptors.len()
            )));
        }
        let Some(mut row) = self.source.read().await.map_err(LedgerSqlError::Engine)? else {
            self.exhausted = true;
            return Ok(RowStatus::Exhausted);
        };
        for (slot, col) in dest.iter_mut().zip(&self.descriptors) {
            let value = row.values.remove(&col.selector).ok_or_else(|| {
                LedgerSqlError::ExecutionError(format!(
                    "row has no value for column selector {}",
                    col.selector
                ))
            })?;
            *slot = decode_value(value)?;
        }
        Ok(RowStatus::Row)
    }

    /// Owned variant of [`Rows::next`]; `None` once exhausted.
    ///
    /// # Errors
    /// Same as [`Rows::next`].
    pub async fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, LedgerSqlError> {
        let mut values = vec![RowValues::Null; self.descriptors.len()];
        match self.next(&mut values).await? {
            RowStatus::Row => Ok(Some(values)),
            RowStatus::Exhausted => Ok(None),
        }
    }

    /// Drain the remaining rows into a [`ResultSet`] and close the cursor.
    ///
    /// # Errors
    /// Same as [`Rows::next`], or the engine's error on close.
    pub async fn collect(mut self) -> Result<ResultSet, LedgerSqlError> {
        let mut result_set = ResultSet::with_capacity(16);
        result_set.set_column_names(Arc::clone(&self.columns));
        while let Some(values) = self.next_row().await? {
            result_set.add_row_values(values);
        }
        self.close().await?;
        Ok(result_set)
    }

    /// Release the cursor. Safe to call more than once.
    ///
    /// # Errors
    /// Returns the engine's error from the first close.
    pub async fn close(&mut self) -> Result<(), LedgerSqlError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.source.close().await.map_err(LedgerSqlError::Engine)
    }
}
