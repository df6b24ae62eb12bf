//! FILENAME: core/engine/src/dependency_graph.rs
//! PURPOSE: Tracks which formula cells depend on which cells, and computes the
//! order in which dependents must be recalculated after a change.
//! CONTEXT: Only the reverse direction is stored. If C1 = A1 + B1, then
//! `dependents[A1]` and `dependents[B1]` both contain C1. Forward references
//! (precedents) are recomputed from the formula's variable list when needed.
//!
//! TERMINOLOGY:
//! - Precedents: Cells that a formula cell references (its inputs).
//! - Dependents: Cells that reference a given cell (reverse lookup).
//!
//! Cycles are legal here. Ordering never fails: cells caught in a cycle are
//! appended after everything that could be ordered, and the evaluator's
//! runtime guard deals with them.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::coord::CellCoordinate;

/// Most cells are referenced by a handful of formulas at most.
pub type DependentList = SmallVec<[CellCoordinate; 4]>;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// For each referenced cell, the formula cells that reference it.
    /// A dependent appears at most once per list; lists are never left empty.
    dependents: FxHashMap<CellCoordinate, DependentList>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `formula` reads `referenced`. Adding the same edge twice
    /// has no further effect.
    pub fn add_dependency(&mut self, formula: CellCoordinate, referenced: CellCoordinate) {
        let list = self.dependents.entry(referenced).or_default();
        if !list.contains(&formula) {
            list.push(formula);
        }
    }

    /// Removes the edge if present; a missing edge is a no-op.
    pub fn remove_dependency(&mut self, formula: CellCoordinate, referenced: CellCoordinate) {
        if let Some(list) = self.dependents.get_mut(&referenced) {
            list.retain(|dep| *dep != formula);
            if list.is_empty() {
                self.dependents.remove(&referenced);
            }
        }
    }

    /// Removes `formula` from every dependent list.
    /// Without a forward map this scans all edges: O(total edges).
    pub fn clear_dependencies_for(&mut self, formula: CellCoordinate) {
        self.dependents.retain(|_, list| {
            list.retain(|dep| *dep != formula);
            !list.is_empty()
        });
    }

    pub fn dependent_count(&self, cell: CellCoordinate) -> usize {
        self.dependents.get(&cell).map_or(0, |list| list.len())
    }

    /// Direct dependents of `cell`, in insertion order.
    pub fn dependents_of(&self, cell: CellCoordinate) -> &[CellCoordinate] {
        self.dependents.get(&cell).map_or(&[], |list| list.as_slice())
    }

    /// Total number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.dependents.values().map(|list| list.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }

    pub fn clear(&mut self) {
        self.dependents.clear();
    }

    /// Gets all cells that need recalculation when `changed` changes, in an
    /// order where every cell comes after the cells it reads (within the
    /// returned set). `changed` itself is never part of the result.
    pub fn cells_to_recalculate(&self, changed: CellCoordinate) -> Vec<CellCoordinate> {
        let mut visited = FxHashSet::default();
        visited.insert(changed);

        let affected = self.collect_affected(self.dependents_of(changed).iter().copied(), visited);
        log_debug!("GRAPH", "{} affected by change at {}", affected.len(), changed);
        self.order(affected)
    }

    /// Same as `cells_to_recalculate`, for several cells changed together.
    /// A changed cell is part of the result only if another changed cell
    /// reaches it.
    pub fn cells_to_recalculate_multiple(&self, changed_cells: &[CellCoordinate]) -> Vec<CellCoordinate> {
        let seeds = changed_cells
            .iter()
            .flat_map(|cell| self.dependents_of(*cell).iter().copied());

        let affected = self.collect_affected(seeds, FxHashSet::default());
        log_debug!(
            "GRAPH",
            "{} affected by {} changed cells",
            affected.len(),
            changed_cells.len()
        );
        self.order(affected)
    }

    /// Breadth-first walk along dependent edges. Returns cells in discovery
    /// order; anything already in `visited` is never returned.
    fn collect_affected(
        &self,
        seeds: impl Iterator<Item = CellCoordinate>,
        mut visited: FxHashSet<CellCoordinate>,
    ) -> Vec<CellCoordinate> {
        let mut affected = Vec::new();
        let mut queue: VecDeque<CellCoordinate> = seeds.collect();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            affected.push(current);

            for &dep in self.dependents_of(current) {
                if !visited.contains(&dep) {
                    queue.push_back(dep);
                }
            }
        }

        affected
    }

    /// Kahn's algorithm restricted to `cells`: only edges whose source is also
    /// in `cells` count toward in-degree. Cells left over (a cycle) follow in
    /// discovery order.
    fn order(&self, cells: Vec<CellCoordinate>) -> Vec<CellCoordinate> {
        if cells.len() < 2 {
            return cells;
        }

        let mut in_degree: FxHashMap<CellCoordinate, usize> = FxHashMap::default();
        if in_degree.try_reserve(cells.len()).is_err() {
            log_warn!(
                "GRAPH",
                "could not reserve ordering table for {} cells; returning them unsorted",
                cells.len()
            );
            return cells;
        }
        for &cell in &cells {
            in_degree.insert(cell, 0);
        }

        for &cell in &cells {
            for dep in self.dependents_of(cell) {
                if let Some(deg) = in_degree.get_mut(dep) {
                    *deg += 1;
                }
            }
        }

        let mut queue: VecDeque<CellCoordinate> = cells
            .iter()
            .copied()
            .filter(|cell| in_degree.get(cell) == Some(&0))
            .collect();

        let mut result = Vec::with_capacity(cells.len());
        let mut emitted = FxHashSet::default();

        while let Some(cell) = queue.pop_front() {
            result.push(cell);
            emitted.insert(cell);

            for dep in self.dependents_of(cell) {
                if let Some(deg) = in_degree.get_mut(dep) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(*dep);
                    }
                }
            }
        }

        if result.len() != cells.len() {
            let leftover = cells.len() - result.len();
            log_debug!("GRAPH", "{} cells in a cycle appended unordered", leftover);
            result.extend(cells.into_iter().filter(|cell| !emitted.contains(cell)));
        }

        result
    }
}
