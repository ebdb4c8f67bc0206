//! Lexer for the expression language embedded in Daisy templates.
//!
//! Operates on a single piece of code, such as the content of `{count + 1}`
//! or the value of `:if="visible"`. The resulting tokens are stored on the
//! compiled [`Expression`](crate::ast::Expression) for the render stage.
//!
//! # Examples
//!
//! ```
//! use daisy_parser::expr_lexer::{ExprLexer, ExprTokenKind};
//!
//! let tokens = ExprLexer::tokenize("count + 1").unwrap();
//! assert_eq!(tokens[0].kind, ExprTokenKind::Identifier);
//! assert_eq!(tokens[1].kind, ExprTokenKind::Operator);
//! assert_eq!(tokens[2].kind, ExprTokenKind::Number);
//! ```

use crate::ast::ExprSpan;
use crate::ExpressionSyntaxError;
use serde::Serialize;

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExprTokenKind {
    Number,
    String,
    Boolean,
    Null,
    Undefined,
    Identifier,
    /// Arithmetic, comparison, logical and assignment operators.
    Operator,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    OptionalChain,
    Comma,
    Colon,
    Question,
    Arrow,
    Eof,
}

/// A token of expression code. `text` is the exact source slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExprToken {
    pub kind: ExprTokenKind,
    pub text: String,
    pub span: ExprSpan,
}

/// Multi- and single-character punctuation, longest first.
const PUNCTUATION: &[(&str, ExprTokenKind)] = &[
    ("===", ExprTokenKind::Operator),
    ("!==", ExprTokenKind::Operator),
    ("==", ExprTokenKind::Operator),
    ("!=", ExprTokenKind::Operator),
    ("<=", ExprTokenKind::Operator),
    (">=", ExprTokenKind::Operator),
    ("&&", ExprTokenKind::Operator),
    ("||", ExprTokenKind::Operator),
    ("??", ExprTokenKind::Operator),
    ("++", ExprTokenKind::Operator),
    ("--", ExprTokenKind::Operator),
    ("+=", ExprTokenKind::Operator),
    ("-=", ExprTokenKind::Operator),
    ("*=", ExprTokenKind::Operator),
    ("/=", ExprTokenKind::Operator),
    ("=>", ExprTokenKind::Arrow),
    ("?.", ExprTokenKind::OptionalChain),
    ("+", ExprTokenKind::Operator),
    ("-", ExprTokenKind::Operator),
    ("*", ExprTokenKind::Operator),
    ("/", ExprTokenKind::Operator),
    ("%", ExprTokenKind::Operator),
    ("!", ExprTokenKind::Operator),
    ("<", ExprTokenKind::Operator),
    (">", ExprTokenKind::Operator),
    ("=", ExprTokenKind::Operator),
    ("(", ExprTokenKind::LParen),
    (")", ExprTokenKind::RParen),
    ("[", ExprTokenKind::LBracket),
    ("]", ExprTokenKind::RBracket),
    ("{", ExprTokenKind::LBrace),
    ("}", ExprTokenKind::RBrace),
    (".", ExprTokenKind::Dot),
    (",", ExprTokenKind::Comma),
    (":", ExprTokenKind::Colon),
    ("?", ExprTokenKind::Question),
];

/// Expression lexer over a single code string. Spans are byte offsets.
pub struct ExprLexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> ExprLexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    /// Tokenize the entire source, ending with an `Eof` token.
    pub fn tokenize(source: &str) -> Result<Vec<ExprToken>, ExpressionSyntaxError> {
        let mut lexer = ExprLexer::new(source);
        let mut tokens = Vec::new();

        loop {
            let token = lexer.next_token()?;
            let is_eof = token.kind == ExprTokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Read the next token from the source.
    pub fn next_token(&mut self) -> Result<ExprToken, ExpressionSyntaxError> {
        self.skip_whitespace();

        let start = self.pos;
        let Some(ch) = self.current() else {
            return Ok(self.token(ExprTokenKind::Eof, start));
        };

        match ch {
            '0'..='9' => self.read_number(start),
            '\'' | '"' | '`' => self.read_string(start, ch),
            c if c.is_alphabetic() || c == '_' || c == '$' => Ok(self.read_identifier(start)),
            _ => {
                let rest = &self.source[start..];
                match PUNCTUATION.iter().find(|(text, _)| rest.starts_with(text)) {
                    Some(&(text, kind)) => {
                        self.pos += text.len();
                        Ok(self.token(kind, start))
                    }
                    None => Err(ExpressionSyntaxError::new(
                        format!("Unexpected character: '{ch}'"),
                        start,
                    )),
                }
            }
        }
    }

    fn read_number(&mut self, start: usize) -> Result<ExprToken, ExpressionSyntaxError> {
        self.eat_while(|c| c.is_ascii_digit() || c == '.');

        let text = &self.source[start..self.pos];
        if text.parse::<f64>().is_err() {
            return Err(ExpressionSyntaxError::new(
                format!("Invalid number: '{text}'"),
                start,
            ));
        }

        Ok(self.token(ExprTokenKind::Number, start))
    }

    fn read_string(&mut self, start: usize, quote: char) -> Result<ExprToken, ExpressionSyntaxError> {
        self.bump();

        loop {
            match self.bump() {
                None => {
                    return Err(ExpressionSyntaxError::new("Unterminated string", start));
                }
                Some('\\') => {
                    if self.bump().is_none() {
                        return Err(ExpressionSyntaxError::new(
                            "Unterminated escape sequence",
                            start,
                        ));
                    }
                }
                Some(c) if c == quote => break,
                Some(_) => {}
            }
        }

        Ok(self.token(ExprTokenKind::String, start))
    }

    fn read_identifier(&mut self, start: usize) -> ExprToken {
        self.eat_while(|c| c.is_alphanumeric() || c == '_' || c == '$');

        let kind = match &self.source[start..self.pos] {
            "true" | "false" => ExprTokenKind::Boolean,
            "null" => ExprTokenKind::Null,
            "undefined" => ExprTokenKind::Undefined,
            "typeof" => ExprTokenKind::Operator,
            _ => ExprTokenKind::Identifier,
        };
        self.token(kind, start)
    }

    fn token(&self, kind: ExprTokenKind, start: usize) -> ExprToken {
        ExprToken {
            kind,
            text: self.source[start..self.pos].to_string(),
            span: ExprSpan::new(start, self.pos),
        }
    }

    fn current(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.current()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.current().is_some_and(&predicate) {
            self.bump();
        }
    }

    fn skip_whitespace(&mut self) {
        self.eat_while(char::is_whitespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<ExprTokenKind> {
        ExprLexer::tokenize(source)
            .unwrap()
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    fn texts(source: &str) -> Vec<String> {
        ExprLexer::tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(kinds(""), vec![ExprTokenKind::Eof]);
        assert_eq!(kinds("   "), vec![ExprTokenKind::Eof]);
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds("3.14 'a' \"b\" true null undefined"),
            vec![
                ExprTokenKind::Number,
                ExprTokenKind::String,
                ExprTokenKind::String,
                ExprTokenKind::Boolean,
                ExprTokenKind::Null,
                ExprTokenKind::Undefined,
                ExprTokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(
            texts("a === b !== c ?? d"),
            vec!["a", "===", "b", "!==", "c", "??", "d", ""]
        );
    }

    #[test]
    fn test_member_call_and_arrow() {
        assert_eq!(
            kinds("user?.list.map((x) => x[0])"),
            vec![
                ExprTokenKind::Identifier,
                ExprTokenKind::OptionalChain,
                ExprTokenKind::Identifier,
                ExprTokenKind::Dot,
                ExprTokenKind::Identifier,
                ExprTokenKind::LParen,
                ExprTokenKind::LParen,
                ExprTokenKind::Identifier,
                ExprTokenKind::RParen,
                ExprTokenKind::Arrow,
                ExprTokenKind::Identifier,
                ExprTokenKind::LBracket,
                ExprTokenKind::Number,
                ExprTokenKind::RBracket,
                ExprTokenKind::RParen,
                ExprTokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_with_escaped_quote() {
        let tokens = ExprLexer::tokenize(r#"'it\'s' + x"#).unwrap();
        assert_eq!(tokens[0].text, r#"'it\'s'"#);
        assert_eq!(tokens[1].text, "+");
    }

    #[test]
    fn test_unicode_identifier_spans() {
        let tokens = ExprLexer::tokenize("größe + 1").unwrap();
        assert_eq!(tokens[0].text, "größe");
        assert_eq!(tokens[1].span, ExprSpan::new(8, 9));
    }

    #[test]
    fn test_unterminated_string() {
        let err = ExprLexer::tokenize("'abc").unwrap_err();
        assert_eq!(err.message, "Unterminated string");
        assert_eq!(err.position, 0);
    }

    #[test]
    fn test_unexpected_character() {
        let err = ExprLexer::tokenize("a # b").unwrap_err();
        assert!(err.message.contains('#'));
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_invalid_number() {
        assert!(ExprLexer::tokenize("1.2.3").is_err());
    }
}
