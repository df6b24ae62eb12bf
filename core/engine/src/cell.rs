//! FILENAME: core/engine/src/cell.rs
//! PURPOSE: Defines the data held by a single spreadsheet cell.
//! CONTEXT: A cell is a tagged value. A formula cell owns its compiled
//! formula outright, so replacing or dropping the cell releases it. The
//! cached value of a formula cell is written only by the recalculation engine.

use sheet_formula::{Formula, ParseError};

#[derive(Debug, Clone, PartialEq)]
pub struct FormulaCell {
    text: String,
    compiled: Result<Formula, ParseError>,
    cached_value: f64,
}

impl FormulaCell {
    /// Compiles `text`. A formula that does not parse is still a formula cell:
    /// it keeps its text, references nothing, and its value stays at 0.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let compiled = Formula::parse(&text);
        FormulaCell {
            text,
            compiled,
            cached_value: 0.0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn compiled(&self) -> Result<&Formula, &ParseError> {
        self.compiled.as_ref()
    }

    pub fn parse_error(&self) -> Option<&ParseError> {
        self.compiled.as_ref().err()
    }

    /// Variable names the formula references; empty if it failed to parse.
    pub fn referenced_names(&self) -> &[String] {
        match &self.compiled {
            Ok(formula) => formula.variable_list(),
            Err(_) => &[],
        }
    }

    pub fn cached_value(&self) -> f64 {
        self.cached_value
    }

    pub(crate) fn set_cached_value(&mut self, value: f64) {
        self.cached_value = value;
    }
}

/// The atomic unit of the spreadsheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Formula(FormulaCell),
}

impl Cell {
    pub fn new_text(text: impl Into<String>) -> Self {
        Cell::Text(text.into())
    }

    pub fn new_number(num: f64) -> Self {
        Cell::Number(num)
    }

    pub fn new_formula(text: impl Into<String>) -> Self {
        Cell::Formula(FormulaCell::new(text))
    }

    /// Interprets what a user typed: "=..." is a formula, a finite number is a
    /// number, blank is empty, anything else is text.
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        if trimmed.starts_with('=') {
            return Cell::new_formula(trimmed);
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(input.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, Cell::Formula(_))
    }

    pub fn as_formula(&self) -> Option<&FormulaCell> {
        match self {
            Cell::Formula(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn as_formula_mut(&mut self) -> Option<&mut FormulaCell> {
        match self {
            Cell::Formula(f) => Some(f),
            _ => None,
        }
    }

    /// The number other formulas see when they read this cell through the
    /// cache: text and empty read as 0.
    pub fn numeric_value(&self) -> f64 {
        match self {
            Cell::Empty | Cell::Text(_) => 0.0,
            Cell::Number(n) => *n,
            Cell::Formula(f) => f.cached_value(),
        }
    }
}
