//! FILENAME: core/engine/src/eval_context.rs
//! PURPOSE: Resolves formula variables to cell values and guards against cycles.
//! CONTEXT: The formula evaluator asks a `VariableSource` for every variable
//! it meets. `EvaluationContext` answers from the grid. When a variable names a
//! formula cell, that formula is evaluated on the spot with this same context,
//! so evaluation nests on the call stack. The `EvaluationStack` records which
//! cells are mid-evaluation; meeting one of them again is a circular reference.
//!
//! A cell moves through three states within one recalculation batch:
//! not visited, on the stack, evaluated. Once evaluated without touching a
//! cycle, its value is remembered for the rest of the batch and later reads
//! take it from there instead of nesting again.

use rustc_hash::FxHashMap;
use sheet_formula::{EvalError, Formula, VariableSource};

use crate::cell::Cell;
use crate::coord::CellCoordinate;
use crate::grid::Grid;

/// Cells currently being evaluated, innermost last.
#[derive(Debug, Clone, Default)]
pub struct EvaluationStack {
    frames: Vec<CellCoordinate>,
    circular: bool,
    circular_hits: usize,
    circular_cells: Vec<CellCoordinate>,

    /// Values of cells already evaluated in this batch, as other formulas see them.
    evaluated: FxHashMap<CellCoordinate, f64>,
}

impl EvaluationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, coord: CellCoordinate) {
        self.frames.push(coord);
    }

    pub fn pop(&mut self) -> Option<CellCoordinate> {
        self.frames.pop()
    }

    pub fn is_on_stack(&self, coord: CellCoordinate) -> bool {
        self.frames.contains(&coord)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True if a cycle was hit since the flag was last reset.
    pub fn has_circular_reference(&self) -> bool {
        self.circular
    }

    pub fn reset_circular_flag(&mut self) {
        self.circular = false;
    }

    /// Sets the circular flag and remembers where the cycle closed.
    pub fn mark_circular(&mut self, coord: CellCoordinate) {
        self.circular = true;
        self.circular_hits += 1;
        if !self.circular_cells.contains(&coord) {
            self.circular_cells.push(coord);
        }
    }

    /// Cells at which a cycle closed since the last `clear`.
    pub fn circular_cells(&self) -> &[CellCoordinate] {
        &self.circular_cells
    }

    /// Number of times a cycle closed since the last `clear`. Unlike the
    /// flag, this is never reset mid-batch.
    pub fn circular_hits(&self) -> usize {
        self.circular_hits
    }

    pub fn record_evaluated(&mut self, coord: CellCoordinate, value: f64) {
        self.evaluated.insert(coord, value);
    }

    /// The value `coord` settled on earlier in this batch, if any.
    pub fn evaluated_value(&self, coord: CellCoordinate) -> Option<f64> {
        self.evaluated.get(&coord).copied()
    }

    pub fn evaluated_count(&self) -> usize {
        self.evaluated.len()
    }

    /// Resets everything. Called at the start of each recalculation batch.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.circular = false;
        self.circular_hits = 0;
        self.circular_cells.clear();
        self.evaluated.clear();
    }
}

/// The variable source handed to the formula evaluator during recalculation.
pub struct EvaluationContext<'a> {
    grid: &'a Grid,
    stack: &'a mut EvaluationStack,
    max_depth: usize,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(grid: &'a Grid, stack: &'a mut EvaluationStack, max_depth: usize) -> Self {
        EvaluationContext {
            grid,
            stack,
            max_depth,
        }
    }

    /// Evaluates the formula stored at `coord` as a top-level cell.
    pub fn evaluate_cell(&mut self, coord: CellCoordinate, formula: &Formula) -> Result<f64, EvalError> {
        let hits_before = self.stack.circular_hits();
        let result = self.with_frame(coord, |ctx| formula.evaluate(ctx));

        // Values that saw a cycle are not reused; readers nest again and get flagged.
        if self.stack.circular_hits() == hits_before {
            let seen = result.as_ref().map_or(0.0, |value| *value);
            self.stack.record_evaluated(coord, seen);
        }
        result
    }

    /// Runs `f` with `coord` pushed on the stack. The frame is popped on every
    /// path out of `f`, so pushes and pops always pair up.
    fn with_frame<R>(&mut self, coord: CellCoordinate, f: impl FnOnce(&mut Self) -> R) -> R {
        self.stack.push(coord);
        let out = f(self);
        self.stack.pop();
        out
    }

    fn nested_formula_value(&mut self, coord: CellCoordinate, cell: &'a Cell) -> f64 {
        let Some(formula_cell) = cell.as_formula() else {
            return cell.numeric_value();
        };

        if self.stack.depth() >= self.max_depth {
            log_warn!(
                "EVAL",
                "nesting deeper than {} at {}; treating as circular",
                self.max_depth,
                coord
            );
            self.stack.mark_circular(coord);
            return 0.0;
        }

        let formula = match formula_cell.compiled() {
            Ok(formula) => formula,
            Err(_) => return 0.0,
        };

        match self.evaluate_cell(coord, formula) {
            Ok(value) => value,
            Err(err) => {
                log_debug!("EVAL", "{} failed while nested: {}", coord, err);
                0.0
            }
        }
    }
}

impl VariableSource for EvaluationContext<'_> {
    fn variable_defined(&self, name: &str) -> bool {
        CellCoordinate::parse_address(name).is_some()
    }

    fn variable_evaluate(&mut self, name: &str) -> Option<f64> {
        let coord = CellCoordinate::parse_address(name)?;

        if self.stack.is_on_stack(coord) {
            log_debug!("EVAL", "circular reference through {}", coord);
            self.stack.mark_circular(coord);
            return Some(0.0);
        }
        if let Some(value) = self.stack.evaluated_value(coord) {
            return Some(value);
        }

        let grid = self.grid;
        match grid.get_cell(coord) {
            None => Some(0.0),
            Some(cell) => Some(self.nested_formula_value(coord, cell)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(address: &str) -> CellCoordinate {
        CellCoordinate::parse_address(address).unwrap()
    }

    fn grid_with(cells: &[(&str, Cell)]) -> Grid {
        let mut grid = Grid::new();
        for (address, cell) in cells {
            grid.set_cell(at(address), cell.clone());
        }
        grid
    }

    fn evaluate(grid: &Grid, stack: &mut EvaluationStack, address: &str) -> Result<f64, EvalError> {
        let cell = grid.get_cell(at(address)).unwrap();
        let formula = cell.as_formula().unwrap().compiled().unwrap();
        EvaluationContext::new(grid, stack, 16).evaluate_cell(at(address), formula)
    }

    #[test]
    fn stack_push_pop_is_lifo() {
        let mut stack = EvaluationStack::new();
        stack.push(at("A:1"));
        stack.push(at("B:1"));
        assert!(stack.is_on_stack(at("A:1")));
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop(), Some(at("B:1")));
        assert_eq!(stack.pop(), Some(at("A:1")));
        assert!(stack.is_empty());
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn stack_clear_resets_flag_and_cells() {
        let mut stack = EvaluationStack::new();
        stack.push(at("A:1"));
        stack.mark_circular(at("A:1"));
        stack.mark_circular(at("A:1"));
        assert!(stack.has_circular_reference());
        assert_eq!(stack.circular_cells(), &[at("A:1")]);

        stack.reset_circular_flag();
        assert!(!stack.has_circular_reference());
        assert_eq!(stack.circular_cells().len(), 1);

        stack.clear();
        assert!(stack.is_empty());
        assert!(stack.circular_cells().is_empty());
    }

    #[test]
    fn variables_resolve_from_grid() {
        let grid = grid_with(&[
            ("A:1", Cell::new_number(2.0)),
            ("A:2", Cell::new_text("label")),
            ("A:3", Cell::new_formula("=A:1 + A:2 + A:9")),
        ]);
        let mut stack = EvaluationStack::new();

        assert_eq!(evaluate(&grid, &mut stack, "A:3"), Ok(2.0));
        assert!(stack.is_empty());
        assert!(!stack.has_circular_reference());
    }

    #[test]
    fn nested_formulas_are_reevaluated_not_read_from_cache() {
        // B:1's cache is stale (0); the context must evaluate it fresh.
        let grid = grid_with(&[
            ("A:1", Cell::new_number(5.0)),
            ("B:1", Cell::new_formula("=A:1 * 2")),
            ("C:1", Cell::new_formula("=B:1 + 1")),
        ]);
        let mut stack = EvaluationStack::new();

        assert_eq!(evaluate(&grid, &mut stack, "C:1"), Ok(11.0));
        assert!(stack.is_empty());
    }

    #[test]
    fn non_address_names_are_undefined() {
        let grid = grid_with(&[("A:1", Cell::new_formula("=RATE * 2"))]);
        let mut stack = EvaluationStack::new();

        let err = evaluate(&grid, &mut stack, "A:1").unwrap_err();
        assert_eq!(err, EvalError::UndefinedVariable("RATE".to_string()));
        assert!(stack.is_empty());
    }

    #[test]
    fn self_reference_sets_flag() {
        let grid = grid_with(&[("A:1", Cell::new_formula("=A:1 + 1"))]);
        let mut stack = EvaluationStack::new();

        let _ = evaluate(&grid, &mut stack, "A:1");
        assert!(stack.has_circular_reference());
        assert_eq!(stack.circular_cells(), &[at("A:1")]);
        assert!(stack.is_empty());
    }

    #[test]
    fn mutual_reference_sets_flag() {
        let grid = grid_with(&[
            ("A:1", Cell::new_formula("=B:1 + 1")),
            ("B:1", Cell::new_formula("=A:1 + 1")),
        ]);
        let mut stack = EvaluationStack::new();

        let _ = evaluate(&grid, &mut stack, "A:1");
        assert!(stack.has_circular_reference());
        assert!(stack.is_empty());
    }

    #[test]
    fn nested_failure_reads_as_zero() {
        let grid = grid_with(&[
            ("A:1", Cell::new_formula("=1/0")),
            ("A:2", Cell::new_formula("=A:1 + 3")),
            ("A:3", Cell::new_formula("=A:")),
            ("A:4", Cell::new_formula("=A:3 + 4")),
        ]);
        let mut stack = EvaluationStack::new();

        assert_eq!(evaluate(&grid, &mut stack, "A:2"), Ok(3.0));
        assert_eq!(evaluate(&grid, &mut stack, "A:4"), Ok(4.0));
        assert!(!stack.has_circular_reference());
    }

    #[test]
    fn evaluated_cells_are_reused_within_a_batch() {
        // Each row reads the row above twice; without reuse this is 2^30 nested evaluations.
        let mut grid = Grid::new();
        grid.set_cell(at("A:1"), Cell::new_number(1.0));
        for row in 2..=31u64 {
            let text = format!("=A:{0} + A:{0}", row - 1);
            grid.set_cell(CellCoordinate::new(row, 1), Cell::new_formula(text));
        }
        let top = CellCoordinate::new(31, 1);
        let formula = grid.get_cell(top).unwrap().as_formula().unwrap().compiled().unwrap().clone();
        let mut stack = EvaluationStack::new();

        let value = EvaluationContext::new(&grid, &mut stack, 64).evaluate_cell(top, &formula);
        assert_eq!(value, Ok(2f64.powi(30)));
        assert_eq!(stack.evaluated_count(), 30);
        assert_eq!(stack.evaluated_value(at("A:2")), Some(2.0));
    }

    #[test]
    fn values_that_saw_a_cycle_are_not_reused() {
        let grid = grid_with(&[
            ("A:1", Cell::new_formula("=B:1 + 1")),
            ("B:1", Cell::new_formula("=A:1 + 1")),
            ("C:1", Cell::new_formula("=B:1 + 5")),
        ]);
        let mut stack = EvaluationStack::new();

        let _ = evaluate(&grid, &mut stack, "A:1");
        assert_eq!(stack.evaluated_value(at("A:1")), None);
        assert_eq!(stack.evaluated_value(at("B:1")), None);

        stack.reset_circular_flag();
        let _ = evaluate(&grid, &mut stack, "C:1");
        assert!(stack.has_circular_reference());
    }

    #[test]
    fn clear_forgets_evaluated_cells() {
        let grid = grid_with(&[("A:1", Cell::new_formula("=2 * 3"))]);
        let mut stack = EvaluationStack::new();

        assert_eq!(evaluate(&grid, &mut stack, "A:1"), Ok(6.0));
        assert_eq!(stack.evaluated_value(at("A:1")), Some(6.0));

        stack.clear();
        assert_eq!(stack.evaluated_count(), 0);
        assert_eq!(stack.circular_hits(), 0);
    }

    #[test]
    fn depth_limit_behaves_like_a_cycle() {
        let mut grid = Grid::new();
        grid.set_cell(at("A:1"), Cell::new_number(1.0));
        for row in 2..=10u64 {
            let text = format!("=A:{} + 1", row - 1);
            grid.set_cell(CellCoordinate::new(row, 1), Cell::new_formula(text));
        }
        let top = CellCoordinate::new(10, 1);
        let formula = grid.get_cell(top).unwrap().as_formula().unwrap().compiled().unwrap().clone();

        let mut stack = EvaluationStack::new();
        let deep = EvaluationContext::new(&grid, &mut stack, 64).evaluate_cell(top, &formula);
        assert_eq!(deep, Ok(10.0));
        assert!(!stack.has_circular_reference());

        let mut stack = EvaluationStack::new();
        let _ = EvaluationContext::new(&grid, &mut stack, 4).evaluate_cell(top, &formula);
        assert!(stack.has_circular_reference());
        assert!(stack.is_empty());
    }
}
