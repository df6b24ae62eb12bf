//! FILENAME: core/parser/src/evaluator.rs
//! PURPOSE: Evaluates AST expressions to a number.
//! CONTEXT: After a formula is parsed into an AST, this module traverses
//! the tree and computes the final result. Variables are resolved through a
//! `VariableSource`, which may itself call back into evaluation for nested
//! formulas.
//!
//! SUPPORTED FEATURES:
//! - Number literals and variables
//! - Binary operations: +, -, *, /, ^ and comparisons (yielding 1 or 0)
//! - Unary operations: -, +
//! - Functions: SUM, MIN, MAX, AVERAGE, ABS, ROUND, INT, SQRT, MOD, POWER,
//!              IF, AND, OR, NOT

use crate::ast::{BinaryOperator, Expression, UnaryOperator};
use crate::error::EvalError;
use crate::variables::VariableSource;

pub type EvalResult = Result<f64, EvalError>;

/// Tree-walking evaluator bound to one variable source for its lifetime.
pub struct Evaluator<'v> {
    vars: &'v mut dyn VariableSource,
}

impl<'v> Evaluator<'v> {
    pub fn new(vars: &'v mut dyn VariableSource) -> Self {
        Evaluator { vars }
    }

    /// Evaluates an AST expression and returns the result.
    pub fn evaluate(&mut self, expr: &Expression) -> EvalResult {
        let value = match expr {
            Expression::Number(n) => *n,
            Expression::Variable(name) => self.eval_variable(name)?,
            Expression::BinaryOp { left, op, right } => self.eval_binary_op(left, *op, right)?,
            Expression::UnaryOp { op, operand } => self.eval_unary_op(*op, operand)?,
            Expression::FunctionCall { name, args } => self.eval_function(name, args)?,
        };
        finite(value)
    }

    fn eval_variable(&mut self, name: &str) -> EvalResult {
        if !self.vars.variable_defined(name) {
            return Err(EvalError::UndefinedVariable(name.to_string()));
        }
        self.vars
            .variable_evaluate(name)
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
    }

    fn eval_binary_op(
        &mut self,
        left: &Expression,
        op: BinaryOperator,
        right: &Expression,
    ) -> EvalResult {
        let l = self.evaluate(left)?;
        let r = self.evaluate(right)?;

        let value = match op {
            BinaryOperator::Add => l + r,
            BinaryOperator::Subtract => l - r,
            BinaryOperator::Multiply => l * r,
            BinaryOperator::Divide => {
                if r == 0.0 {
                    return Err(EvalError::DivideByZero);
                }
                l / r
            }
            BinaryOperator::Power => l.powf(r),
            BinaryOperator::Equal => truth(l == r),
            BinaryOperator::NotEqual => truth(l != r),
            BinaryOperator::LessThan => truth(l < r),
            BinaryOperator::GreaterThan => truth(l > r),
            BinaryOperator::LessEqual => truth(l <= r),
            BinaryOperator::GreaterEqual => truth(l >= r),
        };
        Ok(value)
    }

    fn eval_unary_op(&mut self, op: UnaryOperator, operand: &Expression) -> EvalResult {
        let value = self.evaluate(operand)?;
        Ok(match op {
            UnaryOperator::Negate => -value,
            UnaryOperator::Plus => value,
        })
    }

    fn eval_function(&mut self, name: &str, args: &[Expression]) -> EvalResult {
        match name {
            // Aggregate functions
            "SUM" => Ok(self.collect_numbers(args)?.iter().sum()),
            "MIN" => self.fn_min(args),
            "MAX" => self.fn_max(args),
            "AVERAGE" | "AVG" => self.fn_average(args),

            // Math functions
            "ABS" => Ok(self.unary_arg(name, args)?.abs()),
            "INT" => Ok(self.unary_arg(name, args)?.floor()),
            "SQRT" => self.fn_sqrt(args),
            "ROUND" => self.fn_round(args),
            "MOD" => self.fn_mod(args),
            "POWER" | "POW" => {
                let (base, exponent) = self.binary_args(name, args)?;
                Ok(base.powf(exponent))
            }

            // Logical functions
            "IF" => self.fn_if(args),
            "AND" => {
                let values = self.logical_args(name, args)?;
                Ok(truth(values.iter().all(|&v| v != 0.0)))
            }
            "OR" => {
                let values = self.logical_args(name, args)?;
                Ok(truth(values.iter().any(|&v| v != 0.0)))
            }
            "NOT" => Ok(truth(self.unary_arg(name, args)? == 0.0)),

            _ => Err(EvalError::UnknownFunction(name.to_string())),
        }
    }

    fn collect_numbers(&mut self, args: &[Expression]) -> Result<Vec<f64>, EvalError> {
        args.iter().map(|arg| self.evaluate(arg)).collect()
    }

    fn unary_arg(&mut self, function: &str, args: &[Expression]) -> EvalResult {
        match args {
            [arg] => self.evaluate(arg),
            _ => Err(arity(function, "exactly 1", args.len())),
        }
    }

    fn binary_args(&mut self, function: &str, args: &[Expression]) -> Result<(f64, f64), EvalError> {
        match args {
            [a, b] => Ok((self.evaluate(a)?, self.evaluate(b)?)),
            _ => Err(arity(function, "exactly 2", args.len())),
        }
    }

    fn logical_args(&mut self, function: &str, args: &[Expression]) -> Result<Vec<f64>, EvalError> {
        if args.is_empty() {
            return Err(arity(function, "at least 1", 0));
        }
        self.collect_numbers(args)
    }

    // ==================== Aggregate Functions ====================

    fn fn_min(&mut self, args: &[Expression]) -> EvalResult {
        let numbers = self.collect_numbers(args)?;
        if numbers.is_empty() {
            return Ok(0.0);
        }
        Ok(numbers.iter().cloned().fold(f64::INFINITY, f64::min))
    }

    fn fn_max(&mut self, args: &[Expression]) -> EvalResult {
        let numbers = self.collect_numbers(args)?;
        if numbers.is_empty() {
            return Ok(0.0);
        }
        Ok(numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
    }

    fn fn_average(&mut self, args: &[Expression]) -> EvalResult {
        let numbers = self.collect_numbers(args)?;
        if numbers.is_empty() {
            return Err(EvalError::DivideByZero);
        }
        Ok(numbers.iter().sum::<f64>() / numbers.len() as f64)
    }

    // ==================== Math Functions ====================

    fn fn_sqrt(&mut self, args: &[Expression]) -> EvalResult {
        let value = self.unary_arg("SQRT", args)?;
        if value < 0.0 {
            return Err(EvalError::invalid_argument("SQRT", "negative input"));
        }
        Ok(value.sqrt())
    }

    /// ROUND(x) or ROUND(x, digits); halves round away from zero.
    fn fn_round(&mut self, args: &[Expression]) -> EvalResult {
        let (value, digits) = match args {
            [x] => (self.evaluate(x)?, 0.0),
            [x, d] => (self.evaluate(x)?, self.evaluate(d)?.trunc()),
            _ => return Err(arity("ROUND", "1 or 2", args.len())),
        };
        let factor = 10f64.powf(digits);
        Ok((value * factor).round() / factor)
    }

    /// MOD takes the sign of the divisor, as spreadsheets do.
    fn fn_mod(&mut self, args: &[Expression]) -> EvalResult {
        let (dividend, divisor) = self.binary_args("MOD", args)?;
        if divisor == 0.0 {
            return Err(EvalError::DivideByZero);
        }
        Ok(dividend - divisor * (dividend / divisor).floor())
    }

    // ==================== Logical Functions ====================

    /// Only the taken branch is evaluated.
    fn fn_if(&mut self, args: &[Expression]) -> EvalResult {
        if args.len() < 2 || args.len() > 3 {
            return Err(arity("IF", "2 or 3", args.len()));
        }

        if self.evaluate(&args[0])? != 0.0 {
            self.evaluate(&args[1])
        } else if let Some(otherwise) = args.get(2) {
            self.evaluate(otherwise)
        } else {
            Ok(0.0)
        }
    }
}

/// Evaluates `expr` against `vars` in one call.
pub fn evaluate(expr: &Expression, vars: &mut dyn VariableSource) -> EvalResult {
    Evaluator::new(vars).evaluate(expr)
}

fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn finite(value: f64) -> EvalResult {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::NotFinite)
    }
}

fn arity(function: &str, expected: &str, found: usize) -> EvalError {
    EvalError::invalid_argument(
        function,
        format!("expected {} argument(s), found {}", expected, found),
    )
}
