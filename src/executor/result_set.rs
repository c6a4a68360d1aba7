//! Per-table row inclusion masks

use indexmap::IndexMap;

use crate::error::Result;

/// Which rows of one table survive filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    include: Vec<bool>,
}

impl ResultSet {
    /// Every row included
    pub fn new(rows: usize) -> Self {
        Self {
            include: vec![true; rows],
        }
    }

    /// AND `keep(row)` into every still-included row
    pub fn narrow<F>(&mut self, mut keep: F) -> Result<()>
    where
        F: FnMut(usize) -> Result<bool>,
    {
        for (row, included) in self.include.iter_mut().enumerate() {
            if *included {
                *included = keep(row)?;
            }
        }
        Ok(())
    }

    /// Exclude every row
    pub fn clear(&mut self) {
        self.include.iter_mut().for_each(|keep| *keep = false);
    }

    pub fn mask(&self) -> &[bool] {
        &self.include
    }

    /// Number of included rows
    pub fn included(&self) -> usize {
        self.include.iter().filter(|&&keep| keep).count()
    }
}

/// Result sets of every table in a query, keyed by table name
pub type ResultSets = IndexMap<String, ResultSet>;
