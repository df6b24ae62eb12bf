//! FILENAME: core/parser/src/parser.rs
//! PURPOSE: Recursive descent parser that converts a stream of Tokens into an AST.
//! CONTEXT: This is the second stage of the parsing pipeline. It takes tokens
//! from the Lexer and builds an Expression tree that can be evaluated.
//!
//! GRAMMAR:
//!   expression     --> comparison
//!   comparison     --> additive ( ("=" | "<>" | "<" | ">" | "<=" | ">=") additive )*
//!   additive       --> multiplicative ( ("+" | "-") multiplicative )*
//!   multiplicative --> unary ( ("*" | "/") unary )*
//!   unary          --> ("-" | "+") unary | power
//!   power          --> primary ( "^" unary )?
//!   primary        --> NUMBER | variable | function_call | "(" expression ")"
//!   variable       --> cell_variable | IDENTIFIER
//!   cell_variable  --> "$"? LETTERS ":" "$"? NUMBER
//!   function_call  --> IDENTIFIER "(" arguments? ")"
//!   arguments      --> expression ("," expression)*

use crate::ast::{BinaryOperator, Expression, UnaryOperator};
use crate::lexer::Lexer;
use crate::token::Token;

/// Parser errors with descriptive messages.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Deepest nesting of parentheses, function calls, signs and powers a formula
/// may have. Deeper input is a parse error rather than a stack overflow.
pub const MAX_NESTING_DEPTH: usize = 256;

/// The Parser struct holds the lexer and current token state.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser from an input string.
    /// Automatically advances to the first token.
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
            depth: 0,
        }
    }

    /// Parses the entire input and returns the AST.
    /// Handles the optional leading '=' that marks a formula.
    pub fn parse(&mut self) -> ParseResult<Expression> {
        if self.current_token == Token::Equals {
            self.advance();
        }

        if self.current_token == Token::EOF {
            return Err(ParseError::new("Empty expression"));
        }

        let expr = self.parse_expression()?;

        if self.current_token != Token::EOF {
            return Err(ParseError::new(format!(
                "Unexpected token after expression: {:?}",
                self.current_token
            )));
        }

        Ok(expr)
    }

    fn advance(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    /// Checks if the current token matches the expected token.
    /// If it matches, advances and returns Ok. Otherwise returns an error.
    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.current_token == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::new(format!(
                "Expected {:?}, found {:?}",
                expected, self.current_token
            )))
        }
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_comparison()
    }

    /// Parses comparison expressions (=, <>, <, >, <=, >=).
    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match &self.current_token {
                Token::Equals => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.advance();
            let right = self.parse_additive()?;

            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Parses additive expressions (+ and -).
    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current_token {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.advance();
            let right = self.parse_multiplicative()?;

            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Parses multiplicative expressions (* and /).
    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current_token {
                Token::Asterisk => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.advance();
            let right = self.parse_unary()?;

            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Every recursive path through the grammar passes through here, so this
    /// is where nesting depth is counted.
    fn parse_unary(&mut self) -> ParseResult<Expression> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::new(format!(
                "Formula is nested more than {} levels deep",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        let result = self.parse_signed();
        self.depth -= 1;
        result
    }

    fn parse_signed(&mut self) -> ParseResult<Expression> {
        let op = match self.current_token {
            Token::Minus => UnaryOperator::Negate,
            Token::Plus => UnaryOperator::Plus,
            _ => return self.parse_power(),
        };

        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expression::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    /// Parses power/exponentiation expressions (^). Right-associative.
    fn parse_power(&mut self) -> ParseResult<Expression> {
        let left = self.parse_primary()?;

        if self.current_token == Token::Caret {
            self.advance();
            let right = self.parse_unary()?;

            return Ok(Expression::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::Power,
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.current_token.clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Expression::Number(n))
            }

            // $A:1 or $A:$1
            Token::Dollar => {
                self.advance();
                let column = match self.current_token.clone() {
                    Token::Identifier(name) => {
                        self.advance();
                        name
                    }
                    token => {
                        return Err(ParseError::new(format!(
                            "Expected column letters after '$', found {:?}",
                            token
                        )))
                    }
                };
                if self.current_token != Token::Colon {
                    return Err(ParseError::new(format!(
                        "Expected ':' after absolute column {}",
                        column
                    )));
                }
                self.parse_cell_variable(column, true)
            }

            // Identifier: a function call, a cell variable or a bare name
            Token::Identifier(name) => {
                self.advance();

                match self.current_token {
                    Token::LParen => self.parse_function_call(name),
                    Token::Colon => self.parse_cell_variable(name, false),
                    _ => Ok(Expression::Variable(name)),
                }
            }

            Token::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }

            Token::EOF => Err(ParseError::new("Unexpected end of expression")),

            Token::Illegal(ch) => Err(ParseError::new(format!("Illegal character: {}", ch))),

            token => Err(ParseError::new(format!("Unexpected token: {:?}", token))),
        }
    }

    /// Parses the `:ROW` tail of a cell variable whose column has already
    /// been consumed. The current token is the ':'.
    fn parse_cell_variable(&mut self, column: String, col_absolute: bool) -> ParseResult<Expression> {
        if column.is_empty() || !column.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ParseError::new(format!(
                "Invalid column in cell variable: {}",
                column
            )));
        }

        // Consume the ':'
        self.advance();

        let row_absolute = if self.current_token == Token::Dollar {
            self.advance();
            true
        } else {
            false
        };

        let row = match self.current_token {
            Token::Number(n) => {
                self.advance();
                n
            }
            _ => {
                return Err(ParseError::new(format!(
                    "Expected row number after '{}:', found {:?}",
                    column, self.current_token
                )))
            }
        };

        if row < 1.0 || row.fract() != 0.0 {
            return Err(ParseError::new(format!(
                "Row number must be a whole number >= 1: {}",
                row
            )));
        }

        let name = format!(
            "{}{}:{}{}",
            if col_absolute { "$" } else { "" },
            column,
            if row_absolute { "$" } else { "" },
            row as u64
        );
        Ok(Expression::Variable(name))
    }

    /// Parses a function call like SUM(A:1, A:2, 10).
    fn parse_function_call(&mut self, name: String) -> ParseResult<Expression> {
        // Consume the '('
        self.advance();

        let mut args = Vec::new();

        if self.current_token == Token::RParen {
            self.advance();
            return Ok(Expression::FunctionCall { name, args });
        }

        args.push(self.parse_expression()?);

        while self.current_token == Token::Comma {
            self.advance();
            args.push(self.parse_expression()?);
        }

        self.expect(Token::RParen)?;

        Ok(Expression::FunctionCall { name, args })
    }
}

/// Convenience function to parse a formula string directly.
pub fn parse(input: &str) -> ParseResult<Expression> {
    let mut parser = Parser::new(input);
    parser.parse()
}
