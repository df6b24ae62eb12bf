//! FILENAME: core/parser/src/lib.rs
//! PURPOSE: Library root for the sheet formula language.
//! CONTEXT: This crate turns formula text into something the recalculation
//! engine can evaluate over and over: a parsed `Formula` that knows which
//! variables it reads and evaluates against any `VariableSource`.
//!
//! PIPELINE: Formula String --> Lexer --> Tokens --> Parser --> AST --> Evaluator
//!
//! SUPPORTED FEATURES:
//! - Arithmetic: +, -, *, /, ^ (power)
//! - Comparison: =, <>, <, >, <=, >= (1 for true, 0 for false)
//! - Cell variables: A:1, $A:$1, AA:100
//! - Named variables: RATE, TAX_2024
//! - Function calls: SUM(A:1, A:2), IF(A:1 > 0, 1, -1)
//! - Parentheses for grouping
//! - Unary negation: -5

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod formula;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod variables;


pub use ast::{BinaryOperator, Expression, UnaryOperator};
pub use error::{EvalError, EvalStatus};
pub use evaluator::{evaluate, EvalResult, Evaluator};
pub use formula::{evaluate_text, Formula};
pub use lexer::Lexer;
pub use parser::{parse, ParseError, ParseResult, Parser, MAX_NESTING_DEPTH};
pub use token::Token;
pub use variables::VariableSource;
