//! Daisy Parser
//!
//! Parses the token stream from `daisy-lexer` into a `Program` AST.
//! Control-flow statements written as attributes (`:if`, `:elif`, `:else`,
//! `:for`, `:include`) are desugared into `If`, `For` and `Include` nodes;
//! `@` directives are kept on their element for the render stage.
//!
//! # Example
//!
//! ```
//! use daisy_parser::{Node, Parser};
//!
//! let program = Parser::parse("<p :if=\"ok\">hi</p>").unwrap();
//! assert!(matches!(program.body[0], Node::If(_)));
//! ```

pub mod ast;
pub mod expr_lexer;
pub mod expr_parser;
pub mod parser;

pub use ast::{AttrValue, Element, Expression, Node, Program};
pub use expr_parser::{DefaultCompiler, ExpressionCompiler};
pub use parser::{Parser, ParserOptions};

use daisy_lexer::{LexerError, Token};

/// Error reported by an [`ExpressionCompiler`]. `position` is a byte offset
/// into the expression text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (at position {position})")]
pub struct ExpressionSyntaxError {
    pub message: String,
    pub position: usize,
}

impl ExpressionSyntaxError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Any failure while compiling a template.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lexer(#[from] LexerError),

    /// A token of the wrong kind at a position that requires a specific kind.
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        token: Token,
        line: usize,
        column: usize,
    },

    /// An expression failed to compile. The position is that of the token
    /// holding the expression.
    #[error("Expression error at line {line}, column {column}: {error}")]
    Expression {
        #[source]
        error: ExpressionSyntaxError,
        offset: usize,
        line: usize,
        column: usize,
    },
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, token: &Token) -> Self {
        ParseError::Syntax {
            message: message.into(),
            token: token.clone(),
            line: token.line(),
            column: token.column(),
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            ParseError::Lexer(err) => err.offset(),
            ParseError::Syntax { token, .. } => token.offset(),
            ParseError::Expression { offset, .. } => *offset,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            ParseError::Lexer(err) => err.line(),
            ParseError::Syntax { line, .. } | ParseError::Expression { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            ParseError::Lexer(err) => err.column(),
            ParseError::Syntax { column, .. } | ParseError::Expression { column, .. } => *column,
        }
    }
}
