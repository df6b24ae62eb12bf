//! FILENAME: core/engine/src/grid.rs
//! PURPOSE: Manages the collection of cells (The Spreadsheet Grid).
//! CONTEXT: This file defines the `Grid` struct which acts as the container
//! for all cell data. It uses a sparse storage strategy (hash map) so only
//! cells that were written and are not empty take up space.

use rustc_hash::FxHashMap;

use crate::cell::Cell;
use crate::coord::CellCoordinate;

/// Sparse cell storage plus the used extents of the sheet.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    cells: FxHashMap<CellCoordinate, Cell>,

    /// Highest row index currently in use (0 when the grid is empty).
    max_row: u64,

    /// Highest column index currently in use (0 when the grid is empty).
    max_col: u64,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `cell` at `coord` and returns whatever was there before.
    /// Storing `Cell::Empty` removes the entry instead (see `clear_cell`).
    pub fn set_cell(&mut self, coord: CellCoordinate, cell: Cell) -> Option<Cell> {
        if cell.is_empty() {
            return self.clear_cell(coord);
        }
        self.max_row = self.max_row.max(coord.row());
        self.max_col = self.max_col.max(coord.col());
        self.cells.insert(coord, cell)
    }

    pub fn get_cell(&self, coord: CellCoordinate) -> Option<&Cell> {
        self.cells.get(&coord)
    }

    pub(crate) fn get_cell_mut(&mut self, coord: CellCoordinate) -> Option<&mut Cell> {
        self.cells.get_mut(&coord)
    }

    /// Removes a cell from the grid.
    /// If the cell was at a boundary (max_row or max_col), recalculates bounds.
    pub fn clear_cell(&mut self, coord: CellCoordinate) -> Option<Cell> {
        let previous = self.cells.remove(&coord);
        if previous.is_some() && (coord.row() == self.max_row || coord.col() == self.max_col) {
            self.recalculate_bounds();
        }
        previous
    }

    /// Recalculates max_row and max_col by scanning all cells.
    /// This is O(n) where n is the number of non-empty cells.
    pub fn recalculate_bounds(&mut self) {
        self.max_row = self.cells.keys().map(|c| c.row()).max().unwrap_or(0);
        self.max_col = self.cells.keys().map(|c| c.col()).max().unwrap_or(0);
    }

    pub fn max_row(&self) -> u64 {
        self.max_row
    }

    pub fn max_col(&self) -> u64 {
        self.max_col
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellCoordinate, &Cell)> {
        self.cells.iter().map(|(&coord, cell)| (coord, cell))
    }

    /// Coordinates of every formula cell, in reading order.
    pub fn formula_coords(&self) -> Vec<CellCoordinate> {
        let mut coords: Vec<CellCoordinate> = self
            .cells
            .iter()
            .filter(|(_, cell)| cell.is_formula())
            .map(|(&coord, _)| coord)
            .collect();
        coords.sort();
        coords
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.max_row = 0;
        self.max_col = 0;
    }
}
