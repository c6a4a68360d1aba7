//! Nested-loop joins over materialized tables
//!
//! A [`JoinedTable`] is the accumulated result of a join chain. Next to its
//! rows it records where every column came from, so later join keys and
//! output fields are found by `(table, column)` and never by a bare name
//! that two source tables might share.

use tracing::debug;

use super::query::TableId;
use crate::catalog::TableSchema;
use crate::error::{Error, Result};
use crate::storage::{codec, MaterializedTable, RowSource};

/// Accumulated join result
#[derive(Debug)]
pub struct JoinedTable {
    table: MaterializedTable,
    /// Source `(table, column)` of each column of `table`
    origins: Vec<(TableId, usize)>,
}

impl JoinedTable {
    /// Start a chain from one table
    pub fn seed(id: TableId, table: MaterializedTable) -> Self {
        let origins = (0..table.schema().field_count()).map(|col| (id, col)).collect();
        Self { table, origins }
    }

    pub fn table(&self) -> &MaterializedTable {
        &self.table
    }

    pub fn into_table(self) -> MaterializedTable {
        self.table
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    /// True if `id` has been joined in
    pub fn contains(&self, id: TableId) -> bool {
        self.origins.iter().any(|&(table, _)| table == id)
    }

    /// Column of this result holding `(table, col)`
    pub fn column_of(&self, table: TableId, col: usize) -> Result<usize> {
        self.origins
            .iter()
            .position(|&origin| origin == (table, col))
            .ok_or_else(|| {
                Error::Corrupted(format!(
                    "column {} of table {} is not part of the join",
                    col, table
                ))
            })
    }

    /// Inner join with `right` on `self[left_col] == right[right_col]`
    pub fn inner_join(
        self,
        left_col: usize,
        right_id: TableId,
        right: MaterializedTable,
        right_col: usize,
    ) -> Result<Self> {
        self.nested_loop(right_id, right, Some((left_col, right_col)))
    }

    /// Every row of `self` paired with every row of `right`
    pub fn cross_join(self, right_id: TableId, right: MaterializedTable) -> Result<Self> {
        self.nested_loop(right_id, right, None)
    }

    /// Keep rows where two already joined columns are equal
    pub fn filter_equal(mut self, a: usize, b: usize) -> Result<Self> {
        let mut keep = Vec::with_capacity(self.table.row_count());
        for row in 0..self.table.row_count() {
            keep.push(self.table.decode_cell(row, a)? == self.table.decode_cell(row, b)?);
        }
        let table = crate::storage::materialize(&mut self.table, &keep)?;
        Ok(Self {
            table,
            origins: self.origins,
        })
    }

    fn nested_loop(
        mut self,
        right_id: TableId,
        mut right: MaterializedTable,
        keys: Option<(usize, usize)>,
    ) -> Result<Self> {
        let mut pairs = Vec::new();
        for i in 0..self.table.row_count() {
            let left_key = match keys {
                Some((left_col, _)) => Some(self.table.decode_cell(i, left_col)?),
                None => None,
            };
            for j in 0..right.row_count() {
                let matched = match (&left_key, keys) {
                    (Some(left_key), Some((_, right_col))) => {
                        *left_key == right.decode_cell(j, right_col)?
                    }
                    _ => true,
                };
                if matched {
                    pairs.push((i, j));
                }
            }
        }

        let mut fields = self.table.schema().fields.clone();
        fields.extend(right.schema().fields.iter().cloned());
        let name = format!("{}_{}", self.table.schema().name, right.schema().name);
        debug_assert_eq!(
            codec::row_size(&fields),
            self.table.schema().row_size() + right.schema().row_size()
        );

        let mut joined = MaterializedTable::new(TableSchema::new(name, fields), pairs.len());
        for &(i, j) in &pairs {
            joined.push_concat(self.table.row(i)?, right.row(j)?)?;
        }

        debug!(
            left = self.table.row_count(),
            right = right.row_count(),
            rows = joined.row_count(),
            "nested loop join"
        );

        let mut origins = self.origins;
        origins.extend((0..right.schema().field_count()).map(|col| (right_id, col)));
        Ok(Self {
            table: joined,
            origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDescriptor;

    fn table(name: &str, rows: &[(i64, &str)]) -> MaterializedTable {
        let schema = TableSchema::new(
            name,
            vec![FieldDescriptor::integer("key"), FieldDescriptor::char("val", 4)],
        );
        let mut t = MaterializedTable::new(schema, rows.len());
        for (key, val) in rows {
            let row =
                codec::encode_row(&[key.to_string(), val.to_string()], &t.schema().fields).unwrap();
            t.push_row(&row).unwrap();
        }
        t
    }

    fn dump(joined: &mut JoinedTable) -> Vec<Vec<String>> {
        let cols = joined.table.schema().field_count();
        (0..joined.row_count())
            .map(|r| {
                (0..cols)
                    .map(|c| joined.table.decode_cell(r, c).unwrap())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_inner_join() {
        let a = table("a", &[(1, "x"), (2, "y")]);
        let b = table("b", &[(1, "p"), (2, "q"), (2, "r")]);

        let mut joined = JoinedTable::seed(0, a).inner_join(0, 1, b, 0).unwrap();
        assert_eq!(
            dump(&mut joined),
            vec![
                vec!["1", "x", "1", "p"],
                vec!["2", "y", "2", "q"],
                vec!["2", "y", "2", "r"],
            ]
        );
        assert_eq!(joined.table().capacity(), 3);
        assert!(joined.contains(1));
        assert_eq!(joined.column_of(1, 1).unwrap(), 3);
        assert!(joined.column_of(2, 0).is_err());
    }

    #[test]
    fn test_join_without_matches() {
        let a = table("a", &[(1, "x")]);
        let b = table("b", &[(2, "q")]);
        let joined = JoinedTable::seed(0, a).inner_join(0, 1, b, 0).unwrap();
        assert_eq!(joined.row_count(), 0);
    }

    #[test]
    fn test_cross_join_and_filter() {
        let a = table("a", &[(1, "x"), (2, "y")]);
        let b = table("b", &[(2, "q"), (1, "p")]);

        let joined = JoinedTable::seed(0, a).cross_join(1, b).unwrap();
        assert_eq!(joined.row_count(), 4);

        let mut filtered = joined.filter_equal(0, 2).unwrap();
        assert_eq!(
            dump(&mut filtered),
            vec![vec!["1", "x", "1", "p"], vec!["2", "y", "2", "q"]]
        );
    }
}
