//! FILENAME: core/parser/src/formula.rs
//! PURPOSE: A compiled formula: the source text, its AST and the variables it reads.
//! CONTEXT: This is the handle the sheet engine stores inside a formula cell.
//! Parsing happens once when the formula is installed; evaluation happens
//! as often as the engine asks, each time against a fresh variable source.

use crate::ast::Expression;
use crate::error::EvalError;
use crate::evaluator::Evaluator;
use crate::parser::{self, ParseResult};
use crate::variables::VariableSource;

#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    text: String,
    expression: Expression,
    variables: Vec<String>,
}

impl Formula {
    /// Parses `text` (with or without the leading '=').
    pub fn parse(text: &str) -> ParseResult<Formula> {
        let expression = parser::parse(text)?;
        let variables = expression.variables();
        Ok(Formula {
            text: text.to_string(),
            expression,
            variables,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Names of all variables the formula references, each once, in order of
    /// first appearance.
    pub fn variable_list(&self) -> &[String] {
        &self.variables
    }

    pub fn evaluate(&self, vars: &mut dyn VariableSource) -> Result<f64, EvalError> {
        Evaluator::new(vars).evaluate(&self.expression)
    }
}

/// Parses and evaluates in one step. Parse failures come back as
/// `EvalError::Parse`.
pub fn evaluate_text(text: &str, vars: &mut dyn VariableSource) -> Result<f64, EvalError> {
    let formula = Formula::parse(text)?;
    formula.evaluate(vars)
}
