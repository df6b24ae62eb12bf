//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Main library entry point for the recalculation engine.
//! CONTEXT: Re-exports public types and modules for use by hosts and tests.
//!
//! The category log macros stay inside the crate:
//!
//! ```compile_fail
//! sheet_engine::log_debug!("SHEET", "not part of the public API");
//! ```

#[macro_use]
mod logging;

pub mod cell;
pub mod config;
pub mod coord;
pub mod dependency_graph;
pub mod error;
pub mod eval_context;
pub mod grid;
pub mod sheet;

// Re-export commonly used types at the crate root
pub use cell::{Cell, FormulaCell};
pub use config::{CalculationMode, EngineConfig, DEFAULT_MAX_NESTING_DEPTH};
pub use coord::{col_to_index, index_to_col, CellCoordinate};
pub use dependency_graph::{DependencyGraph, DependentList};
pub use error::{EngineError, EngineResult};
pub use eval_context::{EvaluationContext, EvaluationStack};
pub use grid::Grid;
pub use sheet::{Extents, RecalcReport, SheetModel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_creates_cells() {
        let cell = Cell::new_number(42.0);
        assert_eq!(cell, Cell::Number(42.0));
    }

    #[test]
    fn it_manages_grid() {
        let mut grid = Grid::new();
        grid.set_cell(CellCoordinate::new(1, 1), Cell::new_text("Hello"));

        let retrieved = grid.get_cell(CellCoordinate::new(1, 1));
        assert_eq!(retrieved, Some(&Cell::Text("Hello".to_string())));
    }

    #[test]
    fn integration_test_dependency_workflow() {
        let mut sheet = SheetModel::new();

        // A1 = 10, B1 = 20, C1 = A1 + B1
        let a1: CellCoordinate = "A:1".parse().unwrap();
        let b1: CellCoordinate = "B:1".parse().unwrap();
        let c1: CellCoordinate = "C:1".parse().unwrap();

        sheet.set_cell(a1, Cell::new_number(10.0));
        sheet.set_cell(b1, Cell::new_number(20.0));
        sheet.set_cell(c1, Cell::new_formula("=A:1+B:1"));
        assert_eq!(sheet.value(c1), 30.0);

        // Get recalculation order after A1 changes
        let order = sheet.dependency_graph().cells_to_recalculate(a1);
        assert_eq!(order, vec![c1]);

        let report = sheet.set_cell(a1, Cell::new_number(15.0));
        assert_eq!(report.evaluated, vec![c1]);
        assert_eq!(sheet.value(c1), 35.0);
    }
}
