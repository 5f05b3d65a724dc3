//! Index-addressed sparse table.
//!
//! Entries are stored per column (target index) with a row index kept in
//! sync, so both column and row scans avoid touching empty cells.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct SparseTable<T> {
    columns: Vec<BTreeMap<usize, T>>,
    rows: Vec<BTreeSet<usize>>,
}

impl<T> SparseTable<T> {
    pub fn new(num_columns: usize, num_rows: usize) -> Self {
        Self {
            columns: (0..num_columns).map(|_| BTreeMap::new()).collect(),
            rows: (0..num_rows).map(|_| BTreeSet::new()).collect(),
        }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, column: usize, row: usize) -> Option<&T> {
        self.columns.get(column)?.get(&row)
    }

    pub fn get_mut(&mut self, column: usize, row: usize) -> Option<&mut T> {
        self.columns.get_mut(column)?.get_mut(&row)
    }

    pub fn insert(&mut self, column: usize, row: usize, value: T) {
        self.columns[column].insert(row, value);
        self.rows[row].insert(column);
    }

    pub fn remove(&mut self, column: usize, row: usize) -> Option<T> {
        let removed = self.columns.get_mut(column)?.remove(&row);
        if removed.is_some() {
            self.rows[row].remove(&column);
        }
        removed
    }

    /// Row indices with an entry in `column`, ascending.
    pub fn rows_in_column(&self, column: usize) -> impl Iterator<Item = usize> + '_ {
        self.columns[column].keys().copied()
    }

    /// Column indices with an entry in `row`, ascending.
    pub fn columns_in_row(&self, row: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows[row].iter().copied()
    }

    pub fn is_column_empty(&self, column: usize) -> bool {
        self.columns[column].is_empty()
    }

    pub fn is_row_empty(&self, row: usize) -> bool {
        self.rows[row].is_empty()
    }

    /// Every `(column, row, value)`, column-major.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        self.columns
            .iter()
            .enumerate()
            .flat_map(|(c, col)| col.iter().map(move |(r, v)| (c, *r, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> + '_ {
        self.columns
            .iter_mut()
            .enumerate()
            .flat_map(|(c, col)| col.iter_mut().map(move |(r, v)| (c, *r, v)))
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(usize, usize, &T) -> bool,
    {
        for (c, col) in self.columns.iter_mut().enumerate() {
            let rows = &mut self.rows;
            col.retain(|r, v| {
                let kept = keep(c, *r, v);
                if !kept {
                    rows[*r].remove(&c);
                }
                kept
            });
        }
    }

    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.len()).sum()
    }
}
