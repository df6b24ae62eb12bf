//! FILENAME: core/engine/src/sheet.rs
//! PURPOSE: The sheet model: cell storage, dependency edges and recalculation.
//! CONTEXT: Every edit goes through `set_cell`. It rewires the dependency
//! graph for the edited cell, installs the new content and (in automatic mode,
//! outside a batch) re-evaluates exactly the cells that transitively depend on
//! it, in dependency order. Bulk loads run inside a batch and finish with one
//! fixed-point pass over every formula.
//!
//! Recalculation never fails. A formula that cannot be evaluated keeps its last
//! good value; a formula caught in a circular reference is forced to 0.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell::Cell;
use crate::config::{CalculationMode, EngineConfig};
use crate::coord::CellCoordinate;
use crate::dependency_graph::DependencyGraph;
use crate::error::EngineResult;
use crate::eval_context::{EvaluationContext, EvaluationStack};
use crate::grid::Grid;

/// What a recalculation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecalcReport {
    /// Formula cells evaluated, in evaluation order.
    pub evaluated: Vec<CellCoordinate>,
    /// Cells forced to 0 because of a circular reference (or because a full
    /// recalculation could not settle them).
    pub circular: Vec<CellCoordinate>,
    /// Passes made over the formula cells (1 for an incremental recalculation).
    pub passes: usize,
}

impl RecalcReport {
    pub fn is_empty(&self) -> bool {
        self.evaluated.is_empty() && self.circular.is_empty()
    }
}

/// Highest used row and column; both 0 for an empty sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extents {
    pub max_row: u64,
    pub max_col: u64,
}

/// Result of evaluating one formula cell.
#[derive(Debug, Clone, Copy, PartialEq)]
enum CellOutcome {
    NotAFormula,
    Value,
    Circular,
    KeptPrevious,
}

#[derive(Debug, Default)]
pub struct SheetModel {
    grid: Grid,
    graph: DependencyGraph,
    stack: EvaluationStack,
    last_changed_cell: Option<CellCoordinate>,
    loading_in_progress: bool,
    config: EngineConfig,
}

impl SheetModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        log_debug!("SHEET", "new sheet with {:?}", config);
        SheetModel {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn calculation_mode(&self) -> CalculationMode {
        self.config.calculation_mode
    }

    /// Switching back to automatic does not recalculate by itself; call
    /// `calculate_now` to bring values up to date.
    pub fn set_calculation_mode(&mut self, mode: CalculationMode) {
        log_info!("SHEET", "calculation mode -> {}", mode.name());
        self.config.calculation_mode = mode;
    }

    // ---------------------------------------------------------------------
    // Editing
    // ---------------------------------------------------------------------

    /// Replaces the content of `coord` and, in automatic mode outside a
    /// batch, recalculates everything that depends on it.
    pub fn set_cell(&mut self, coord: CellCoordinate, cell: Cell) -> RecalcReport {
        self.install_cell(coord, cell);
        self.last_changed_cell = Some(coord);

        if self.loading_in_progress || self.config.calculation_mode == CalculationMode::Manual {
            return RecalcReport::default();
        }
        self.recalculate()
    }

    /// Interprets `input` the way a user typed it (see `Cell::from_input`).
    pub fn set_cell_from_input(&mut self, coord: CellCoordinate, input: &str) -> RecalcReport {
        self.set_cell(coord, Cell::from_input(input))
    }

    /// `set_cell_from_input` for an address such as "B:3".
    pub fn set_input(&mut self, address: &str, input: &str) -> EngineResult<RecalcReport> {
        let coord: CellCoordinate = address.parse()?;
        Ok(self.set_cell_from_input(coord, input))
    }

    pub fn clear_cell(&mut self, coord: CellCoordinate) -> RecalcReport {
        self.set_cell(coord, Cell::Empty)
    }

    /// Rewires edges for `coord` and stores `cell`. Does not evaluate anything.
    fn install_cell(&mut self, coord: CellCoordinate, cell: Cell) {
        self.graph.clear_dependencies_for(coord);

        if let Some(formula) = cell.as_formula() {
            if let Some(err) = formula.parse_error() {
                log_debug!("SHEET", "{} holds an unparsable formula: {}", coord, err);
            }
            for name in formula.referenced_names() {
                if let Some(referenced) = CellCoordinate::parse_address(name) {
                    self.graph.add_dependency(coord, referenced);
                }
            }
        }

        self.grid.set_cell(coord, cell);
    }

    // ---------------------------------------------------------------------
    // Batches
    // ---------------------------------------------------------------------

    /// Defers recalculation until `end_batch`.
    pub fn begin_batch(&mut self) {
        log_debug!("SHEET", "batch started");
        self.loading_in_progress = true;
    }

    /// Ends the batch and, in automatic mode, runs a full recalculation.
    pub fn end_batch(&mut self) -> RecalcReport {
        log_debug!("SHEET", "batch ended");
        self.loading_in_progress = false;
        if self.config.calculation_mode == CalculationMode::Manual {
            return RecalcReport::default();
        }
        self.recalculate_all()
    }

    pub fn is_loading(&self) -> bool {
        self.loading_in_progress
    }

    /// Writes all `cells` in one batch, then recalculates everything once.
    pub fn load_cells<I>(&mut self, cells: I) -> RecalcReport
    where
        I: IntoIterator<Item = (CellCoordinate, Cell)>,
    {
        self.begin_batch();
        for (coord, cell) in cells {
            self.set_cell(coord, cell);
        }
        self.end_batch()
    }

    /// Same as `load_cells`; named for the clipboard path.
    pub fn paste<I>(&mut self, cells: I) -> RecalcReport
    where
        I: IntoIterator<Item = (CellCoordinate, Cell)>,
    {
        self.load_cells(cells)
    }

    /// Writes all `cells`, then recalculates only what they affect.
    pub fn set_cells_and_recalculate<I>(&mut self, cells: I) -> RecalcReport
    where
        I: IntoIterator<Item = (CellCoordinate, Cell)>,
    {
        let mut changed = Vec::new();
        for (coord, cell) in cells {
            self.install_cell(coord, cell);
            if !changed.contains(&coord) {
                changed.push(coord);
            }
        }
        if let Some(&last) = changed.last() {
            self.last_changed_cell = Some(last);
        }

        if self.loading_in_progress || self.config.calculation_mode == CalculationMode::Manual {
            return RecalcReport::default();
        }

        log_enter!("RECALC", "set_cells_and_recalculate", "{} cells", changed.len());
        self.stack.clear();

        let ordered = self.graph.cells_to_recalculate_multiple(&changed);
        let reached: FxHashSet<CellCoordinate> = ordered.iter().copied().collect();

        let mut report = RecalcReport {
            passes: 1,
            ..RecalcReport::default()
        };
        // Edited formulas nobody else reaches read only unchanged cells.
        for coord in changed.into_iter().filter(|c| !reached.contains(c)) {
            self.recalculate_into(coord, &mut report);
        }
        for coord in ordered {
            self.recalculate_into(coord, &mut report);
        }

        log_exit!("RECALC", "set_cells_and_recalculate", "{} evaluated", report.evaluated.len());
        report
    }

    // ---------------------------------------------------------------------
    // Recalculation
    // ---------------------------------------------------------------------

    /// Re-evaluates the last changed cell (if it is a formula) and everything
    /// that transitively depends on it, in dependency order.
    pub fn recalculate(&mut self) -> RecalcReport {
        self.stack.clear();

        let Some(changed) = self.last_changed_cell else {
            return RecalcReport::default();
        };
        log_enter!("RECALC", "recalculate", "from {}", changed);

        let ordered = self.graph.cells_to_recalculate(changed);
        let mut report = RecalcReport {
            passes: 1,
            ..RecalcReport::default()
        };

        self.recalculate_into(changed, &mut report);
        for coord in ordered {
            self.recalculate_into(coord, &mut report);
        }

        log_exit!(
            "RECALC",
            "recalculate",
            "{} evaluated, {} circular",
            report.evaluated.len(),
            report.circular.len()
        );
        report
    }

    /// Evaluates one cell and writes its cached value. Non-formula cells are
    /// left alone. Returns true if the cell was a formula.
    pub fn recalculate_cell(&mut self, coord: CellCoordinate) -> bool {
        self.stack.clear();
        self.evaluate_and_store(coord) != CellOutcome::NotAFormula
    }

    fn recalculate_into(&mut self, coord: CellCoordinate, report: &mut RecalcReport) {
        match self.evaluate_and_store(coord) {
            CellOutcome::NotAFormula => {}
            CellOutcome::Circular => {
                report.evaluated.push(coord);
                report.circular.push(coord);
            }
            CellOutcome::Value | CellOutcome::KeptPrevious => report.evaluated.push(coord),
        }
    }

    fn evaluate_and_store(&mut self, coord: CellCoordinate) -> CellOutcome {
        let Some(formula_cell) = self.grid.get_cell(coord).and_then(Cell::as_formula) else {
            return CellOutcome::NotAFormula;
        };

        self.stack.reset_circular_flag();
        let result = match formula_cell.compiled() {
            Ok(formula) => {
                let mut ctx = EvaluationContext::new(&self.grid, &mut self.stack, self.config.max_nesting_depth);
                Some(ctx.evaluate_cell(coord, formula))
            }
            Err(_) => None,
        };
        let circular = self.stack.has_circular_reference();

        let (outcome, value) = match result {
            _ if circular => (CellOutcome::Circular, Some(0.0)),
            Some(Ok(value)) => (CellOutcome::Value, Some(value)),
            Some(Err(err)) => {
                log_debug!("RECALC", "{} kept its previous value: {}", coord, err);
                (CellOutcome::KeptPrevious, None)
            }
            None => (CellOutcome::KeptPrevious, None),
        };

        if let Some(value) = value {
            if let Some(cell) = self.grid.get_cell_mut(coord).and_then(Cell::as_formula_mut) {
                cell.set_cached_value(value);
            }
        }
        if outcome == CellOutcome::Circular {
            log_debug!("RECALC", "{} is part of a circular reference; set to 0", coord);
        }
        outcome
    }

    /// Recomputes every formula cell. A formula is evaluated once all formula
    /// cells it reads have been evaluated; passes repeat until nothing is
    /// left, nothing moves, or the pass limit is hit. Whatever remains sits on
    /// or behind a cycle and is forced to 0.
    pub fn recalculate_all(&mut self) -> RecalcReport {
        self.stack.clear();

        let mut pending = self.grid.formula_coords();
        let pass_limit = pending.len() + 1 + self.config.pass_limit_slack;
        log_enter!("RECALC", "recalculate_all", "{} formulas, limit {} passes", pending.len(), pass_limit);

        // Formula cells each pending formula reads; the grid does not change
        // while this runs.
        let waits_on: FxHashMap<CellCoordinate, Vec<CellCoordinate>> = pending
            .iter()
            .map(|&coord| {
                let mut reads = self.precedents_of(coord);
                reads.retain(|p| self.grid.get_cell(*p).is_some_and(Cell::is_formula));
                (coord, reads)
            })
            .collect();

        let mut done: FxHashSet<CellCoordinate> = FxHashSet::default();
        let mut report = RecalcReport::default();

        while !pending.is_empty() && report.passes < pass_limit {
            report.passes += 1;
            let before = pending.len();

            let mut waiting = Vec::new();
            for coord in pending {
                let ready = waits_on
                    .get(&coord)
                    .map_or(true, |reads| reads.iter().all(|p| done.contains(p)));
                if ready {
                    self.recalculate_into(coord, &mut report);
                    done.insert(coord);
                } else {
                    waiting.push(coord);
                }
            }
            pending = waiting;

            if pending.len() == before {
                break;
            }
        }

        for coord in pending {
            if let Some(cell) = self.grid.get_cell_mut(coord).and_then(Cell::as_formula_mut) {
                cell.set_cached_value(0.0);
            }
            report.circular.push(coord);
        }

        if !report.circular.is_empty() {
            log_info!("RECALC", "{} cells left circular after full recalculation", report.circular.len());
        }
        log_exit!(
            "RECALC",
            "recalculate_all",
            "{} evaluated in {} passes",
            report.evaluated.len(),
            report.passes
        );
        report
    }

    /// Full recalculation on demand, for manual mode.
    pub fn calculate_now(&mut self) -> RecalcReport {
        self.recalculate_all()
    }

    // ---------------------------------------------------------------------
    // Reading
    // ---------------------------------------------------------------------

    pub fn cell(&self, coord: CellCoordinate) -> Option<&Cell> {
        self.grid.get_cell(coord)
    }

    /// The number a formula reading `coord` would see from the cache.
    pub fn value(&self, coord: CellCoordinate) -> f64 {
        self.grid.get_cell(coord).map_or(0.0, Cell::numeric_value)
    }

    /// `value` for an address such as "B:3".
    pub fn value_at(&self, address: &str) -> EngineResult<f64> {
        let coord: CellCoordinate = address.parse()?;
        Ok(self.value(coord))
    }

    pub fn extents(&self) -> Extents {
        Extents {
            max_row: self.grid.max_row(),
            max_col: self.grid.max_col(),
        }
    }

    /// Coordinates of all formula cells in reading order.
    pub fn formula_cells(&self) -> Vec<CellCoordinate> {
        self.grid.formula_coords()
    }

    pub fn last_changed_cell(&self) -> Option<CellCoordinate> {
        self.last_changed_cell
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn evaluation_stack(&self) -> &EvaluationStack {
        &self.stack
    }

    /// Cells the formula at `coord` reads, recomputed from its variable list.
    /// Empty for non-formula cells.
    pub fn precedents_of(&self, coord: CellCoordinate) -> Vec<CellCoordinate> {
        let Some(formula) = self.grid.get_cell(coord).and_then(Cell::as_formula) else {
            return Vec::new();
        };
        let mut precedents: Vec<CellCoordinate> = Vec::new();
        for referenced in formula.referenced_names().iter().filter_map(|n| CellCoordinate::parse_address(n)) {
            if !precedents.contains(&referenced) {
                precedents.push(referenced);
            }
        }
        precedents
    }

    /// Makes this sheet a copy of `other`: formulas are recompiled from their
    /// text, the graph is rebuilt and every value is recalculated.
    pub fn copy_from(&mut self, other: &SheetModel) -> RecalcReport {
        log_debug!("SHEET", "copying sheet with {} cells", other.grid.len());
        self.grid.clear();
        self.graph.clear();
        self.stack.clear();
        self.config = other.config.clone();
        self.loading_in_progress = false;

        for (coord, cell) in other.grid.iter() {
            let copy = match cell {
                Cell::Formula(formula) => Cell::new_formula(formula.text()),
                plain => plain.clone(),
            };
            self.install_cell(coord, copy);
        }
        self.last_changed_cell = other.last_changed_cell;

        self.recalculate_all()
    }
}

impl Clone for SheetModel {
    fn clone(&self) -> Self {
        let mut copy = SheetModel::with_config(self.config.clone());
        copy.copy_from(self);
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(address: &str) -> CellCoordinate {
        CellCoordinate::parse_address(address).unwrap()
    }

    fn sheet_with(inputs: &[(&str, &str)]) -> SheetModel {
        let mut sheet = SheetModel::new();
        for (address, input) in inputs {
            sheet.set_input(address, input).unwrap();
        }
        sheet
    }

    #[test]
    fn set_number_then_formula() {
        let sheet = sheet_with(&[("A:1", "4"), ("B:1", "=A:1 * 3")]);
        assert_eq!(sheet.value(at("B:1")), 12.0);
        assert_eq!(sheet.dependency_graph().dependents_of(at("A:1")), &[at("B:1")]);
    }

    #[test]
    fn editing_a_value_updates_dependents() {
        let mut sheet = sheet_with(&[("A:1", "1"), ("B:1", "=A:1 + 1"), ("C:1", "=B:1 * 10")]);
        let report = sheet.set_input("A:1", "5").unwrap();

        assert_eq!(report.evaluated, vec![at("B:1"), at("C:1")]);
        assert!(report.circular.is_empty());
        assert_eq!(sheet.value(at("C:1")), 60.0);
    }

    #[test]
    fn changed_formula_is_evaluated_first() {
        let mut sheet = sheet_with(&[("A:1", "2"), ("B:1", "=A:1"), ("C:1", "=B:1 + 1")]);
        let report = sheet.set_input("B:1", "=A:1 * 100").unwrap();

        assert_eq!(report.evaluated, vec![at("B:1"), at("C:1")]);
        assert_eq!(sheet.value(at("C:1")), 201.0);
    }

    #[test]
    fn plain_value_with_no_dependents_evaluates_nothing() {
        let mut sheet = SheetModel::new();
        let report = sheet.set_input("A:1", "3").unwrap();
        assert!(report.is_empty());
        assert_eq!(sheet.value(at("A:1")), 3.0);
    }

    #[test]
    fn text_and_empty_read_as_zero() {
        let sheet = sheet_with(&[("A:1", "hello"), ("B:1", "=A:1 + C:1 + 2")]);
        assert_eq!(sheet.value(at("B:1")), 2.0);
        assert_eq!(sheet.value(at("A:1")), 0.0);
    }

    #[test]
    fn unparsable_formula_is_installed_without_edges() {
        let mut sheet = sheet_with(&[("A:1", "1")]);
        sheet.set_input("B:1", "=A:1 +").unwrap();

        let cell = sheet.cell(at("B:1")).unwrap().as_formula().unwrap();
        assert!(cell.parse_error().is_some());
        assert_eq!(cell.text(), "=A:1 +");
        assert_eq!(sheet.value(at("B:1")), 0.0);
        assert_eq!(sheet.dependency_graph().edge_count(), 0);
    }

    #[test]
    fn runtime_failure_keeps_previous_value() {
        let mut sheet = sheet_with(&[("A:1", "4"), ("B:1", "=1 / A:1")]);
        assert_eq!(sheet.value(at("B:1")), 0.25);

        let report = sheet.set_input("A:1", "0").unwrap();
        assert_eq!(report.evaluated, vec![at("B:1")]);
        assert_eq!(sheet.value(at("B:1")), 0.25);
    }

    #[test]
    fn undefined_name_keeps_previous_value() {
        let sheet = sheet_with(&[("A:1", "=RATE * 2")]);
        assert_eq!(sheet.value(at("A:1")), 0.0);
    }

    #[test]
    fn self_reference_is_zero() {
        let mut sheet = SheetModel::new();
        let report = sheet.set_input("A:1", "=A:1 + 1").unwrap();
        assert_eq!(sheet.value(at("A:1")), 0.0);
        assert_eq!(report.circular, vec![at("A:1")]);
        assert!(sheet.evaluation_stack().is_empty());
    }

    #[test]
    fn editing_formula_rewires_edges() {
        let mut sheet = sheet_with(&[("A:1", "1"), ("B:1", "2"), ("C:1", "=A:1 + B:1")]);
        sheet.set_input("C:1", "=A:1 * 2").unwrap();

        let graph = sheet.dependency_graph();
        assert_eq!(graph.dependents_of(at("A:1")), &[at("C:1")]);
        assert!(graph.dependents_of(at("B:1")).is_empty());
        assert_eq!(sheet.value(at("C:1")), 2.0);
    }

    #[test]
    fn clearing_a_formula_drops_edges_and_extents() {
        let mut sheet = sheet_with(&[("A:1", "1"), ("C:5", "=A:1")]);
        assert_eq!(sheet.extents(), Extents { max_row: 5, max_col: 3 });

        sheet.clear_cell(at("C:5"));
        assert!(sheet.cell(at("C:5")).is_none());
        assert!(sheet.dependency_graph().is_empty());
        assert_eq!(sheet.extents(), Extents { max_row: 1, max_col: 1 });
    }

    #[test]
    fn precedents_dedupe_absolute_forms() {
        let sheet = sheet_with(&[("C:1", "=A:1 + $A:$1 + B:2 + RATE")]);
        assert_eq!(sheet.precedents_of(at("C:1")), vec![at("A:1"), at("B:2")]);
        assert!(sheet.precedents_of(at("Z:9")).is_empty());
    }

    #[test]
    fn bad_address_is_an_error() {
        let mut sheet = SheetModel::new();
        assert!(sheet.set_input("A1", "1").is_err());
        assert!(sheet.value_at("nowhere").is_err());
    }

    #[test]
    fn recalculate_cell_skips_non_formulas() {
        let mut sheet = sheet_with(&[("A:1", "1"), ("B:1", "=A:1")]);
        assert!(!sheet.recalculate_cell(at("A:1")));
        assert!(sheet.recalculate_cell(at("B:1")));
        assert!(!sheet.recalculate_cell(at("Q:7")));
    }

    #[test]
    fn sheet_model_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<SheetModel>();
    }
}
