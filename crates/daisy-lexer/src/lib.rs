//! Daisy Lexer
//!
//! Tokenizes Daisy templates (HTML-like markup with `{expr}` interpolation)
//! into a flat stream of tokens. The scanner is an explicit state machine
//! with a frame stack, so unterminated markup at the end of input can be
//! rolled back into literal text.
//!
//! # Example
//!
//! ```
//! use daisy_lexer::{Scanner, TokenKind};
//!
//! let tokens = Scanner::tokenize("<b>{name}</b>").unwrap();
//! assert_eq!(tokens[0].kind, TokenKind::TagNameOpen);
//! assert_eq!(tokens.last().unwrap().kind, TokenKind::EndOfInput);
//! ```

pub mod scanner;
pub mod token;

pub use scanner::{Scanner, ScannerOptions, State};
pub use token::{Span, Token, TokenKind, RAW_TEXT_ELEMENTS, VOID_ELEMENTS};

/// Lexer error with position information.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexerError {
    /// Input ended inside markup that end-of-input recovery cannot resolve.
    #[error("Unparsable input at line {line}, column {column}: {message}")]
    UnparsableInput {
        message: String,
        offset: usize,
        line: usize,
        column: usize,
    },
}

impl LexerError {
    pub fn offset(&self) -> usize {
        match self {
            LexerError::UnparsableInput { offset, .. } => *offset,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            LexerError::UnparsableInput { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            LexerError::UnparsableInput { column, .. } => *column,
        }
    }
}
