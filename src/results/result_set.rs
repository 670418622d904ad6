use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, index_columns};
use crate::types::RowValues;

/// Rows drained from a query cursor.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows, in the order the cursor produced them
    pub results: Vec<CustomDbRow>,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            column_names: None,
            column_index: None,
        }
    }

    /// Set the column names shared by every row added afterwards.
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(index_columns(&column_names)));
        self.column_names = Some(column_names);
    }

    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Append a row; ignored until column names are set.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(names), Some(index)) = (&self.column_names, &self.column_index) {
            self.results.push(CustomDbRow::with_index(
                Arc::clone(names),
                Arc::clone(index),
                row_values,
            ));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_the_column_index() {
        let mut rs = ResultSet::with_capacity(2);
        rs.add_row_values(vec![RowValues::Int(0)]);
        assert!(rs.is_empty());

        rs.set_column_names(Arc::new(vec!["id".into(), "name".into(), "id".into()]));
        rs.add_row_values(vec![
            RowValues::Int(1),
            RowValues::Text("a".into()),
            RowValues::Int(9),
        ]);
        assert_eq!(rs.len(), 1);
        let row = &rs.results[0];
        assert_eq!(row.get_column_index("id"), Some(0));
        assert_eq!(row.get("name"), Some(&RowValues::Text("a".into())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_by_index(2), Some(&RowValues::Int(9)));
    }

    #[test]
    fn standalone_rows_build_their_own_index() {
        let row = CustomDbRow::new(Arc::new(vec!["x".into()]), vec![RowValues::Bool(true)]);
        assert_eq!(row.get("x"), Some(&RowValues::Bool(true)));
    }
}
