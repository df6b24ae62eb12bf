//! FILENAME: core/parser/src/variables.rs
//! PURPOSE: The callback seam between the evaluator and whoever owns the data.
//! CONTEXT: The evaluator never looks values up itself. Every variable it meets
//! is first checked with `variable_defined` and then resolved with
//! `variable_evaluate`. Implementations may re-enter the evaluator from inside
//! `variable_evaluate` (a formula whose variable is itself a formula), which is
//! why the source is handed over as `&mut`.

use std::collections::HashMap;

pub trait VariableSource {
    /// Returns true if `name` is something this source can resolve.
    fn variable_defined(&self, name: &str) -> bool;

    /// Resolves `name` to a number. `None` means undefined.
    fn variable_evaluate(&mut self, name: &str) -> Option<f64>;
}

/// Plain name/value table. Names are matched case-insensitively.
impl VariableSource for HashMap<String, f64> {
    fn variable_defined(&self, name: &str) -> bool {
        self.contains_key(&name.to_uppercase())
    }

    fn variable_evaluate(&mut self, name: &str) -> Option<f64> {
        self.get(&name.to_uppercase()).copied()
    }
}
