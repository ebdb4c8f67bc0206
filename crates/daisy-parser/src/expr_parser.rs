//! Expression compiler interface and its default implementation.
//!
//! The template parser hands attribute values, statement values and `{expr}`
//! contents to an [`ExpressionCompiler`]. Evaluation is not done here; the
//! compiled [`Expression`] is an opaque handle for the render stage.

use crate::ast::{ExprPart, Expression};
use crate::expr_lexer::{ExprLexer, ExprToken, ExprTokenKind};
use crate::ExpressionSyntaxError;
use daisy_lexer::Span;

/// The expression sub-parser used by [`Parser`](crate::Parser).
pub trait ExpressionCompiler {
    /// Whether `raw` contains `{...}` expression syntax.
    fn contains_expression_syntax(&self, raw: &str) -> bool;

    /// Compile raw text into an expression handle.
    fn parse_expression(&self, raw: &str) -> Result<Expression, ExpressionSyntaxError>;
}

/// Tokenizing compiler with bracket validation.
///
/// - `count + 1` compiles to one code part.
/// - `{count + 1}` compiles to the same single code part (braces stripped).
/// - `btn {kind}` compiles to a template of a literal and a code part.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCompiler;

impl ExpressionCompiler for DefaultCompiler {
    fn contains_expression_syntax(&self, raw: &str) -> bool {
        raw.find('{')
            .is_some_and(|open| raw[open + 1..].contains('}'))
    }

    fn parse_expression(&self, raw: &str) -> Result<Expression, ExpressionSyntaxError> {
        let groups = brace_groups(raw)?;

        let parts = match groups.as_slice() {
            [] => vec![compile_code(raw, 0)?],
            [(open, close)] if raw[..*open].trim().is_empty() && raw[close + 1..].trim().is_empty() => {
                vec![compile_code(&raw[open + 1..*close], open + 1)?]
            }
            _ => {
                let mut parts = Vec::new();
                let mut cursor = 0;
                for &(open, close) in &groups {
                    if open > cursor {
                        parts.push(ExprPart::Literal {
                            value: raw[cursor..open].to_string(),
                        });
                    }
                    parts.push(compile_code(&raw[open + 1..close], open + 1)?);
                    cursor = close + 1;
                }
                if cursor < raw.len() {
                    parts.push(ExprPart::Literal {
                        value: raw[cursor..].to_string(),
                    });
                }
                parts
            }
        };

        Ok(Expression {
            source: raw.to_string(),
            parts,
            span: Span::default(),
        })
    }
}

/// Byte positions of the outermost balanced `{`/`}` pairs in `raw`.
///
/// Braces inside string literals within a group are ignored. A `}` outside
/// any group is literal text.
fn brace_groups(raw: &str) -> Result<Vec<(usize, usize)>, ExpressionSyntaxError> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut open = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in raw.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '{' => {
                if depth == 0 {
                    open = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    groups.push((open, i));
                }
            }
            '\'' | '"' | '`' if depth > 0 => quote = Some(c),
            _ => {}
        }
    }

    if depth > 0 {
        return Err(ExpressionSyntaxError::new("Unterminated interpolation", open));
    }
    Ok(groups)
}

/// Tokenize one piece of code and check that its brackets balance.
/// `base` is the position of `code` within the raw expression text.
fn compile_code(code: &str, base: usize) -> Result<ExprPart, ExpressionSyntaxError> {
    let shift = |err: ExpressionSyntaxError| ExpressionSyntaxError::new(err.message, base + err.position);

    let tokens = ExprLexer::tokenize(code).map_err(shift)?;
    if tokens.first().is_some_and(|t| t.kind == ExprTokenKind::Eof) {
        return Err(ExpressionSyntaxError::new("Empty expression", base));
    }
    check_brackets(&tokens).map_err(shift)?;

    Ok(ExprPart::Code {
        source: code.trim().to_string(),
        tokens,
    })
}

fn check_brackets(tokens: &[ExprToken]) -> Result<(), ExpressionSyntaxError> {
    let mut open: Vec<&ExprToken> = Vec::new();

    for token in tokens {
        let closes = match token.kind {
            ExprTokenKind::LParen | ExprTokenKind::LBracket | ExprTokenKind::LBrace => {
                open.push(token);
                continue;
            }
            ExprTokenKind::RParen => ExprTokenKind::LParen,
            ExprTokenKind::RBracket => ExprTokenKind::LBracket,
            ExprTokenKind::RBrace => ExprTokenKind::LBrace,
            _ => continue,
        };
        match open.pop() {
            Some(opener) if opener.kind == closes => {}
            Some(opener) => {
                return Err(ExpressionSyntaxError::new(
                    format!("'{}' does not close '{}'", token.text, opener.text),
                    token.span.start,
                ));
            }
            None => {
                return Err(ExpressionSyntaxError::new(
                    format!("Unmatched '{}'", token.text),
                    token.span.start,
                ));
            }
        }
    }

    match open.last() {
        Some(opener) => Err(ExpressionSyntaxError::new(
            format!("Unclosed '{}'", opener.text),
            opener.span.start,
        )),
        None => Ok(()),
    }
}
