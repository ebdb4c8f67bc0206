//! Abstract Syntax Tree for Daisy templates.
//!
//! The tree is built once per parse and never mutated afterwards; the render
//! stage walks the same `Program` every time state changes.

use crate::expr_lexer::{ExprToken, ExprTokenKind};
use daisy_lexer::Span;
use serde::Serialize;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Document-level AST
// ---------------------------------------------------------------------------

/// The root of a parsed template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub body: Vec<Node>,
}

/// A node of the template tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Node {
    Element(Element),
    Text(Text),
    Comment(Comment),
    /// A `{expr}` interpolation in content position.
    Expression(Expression),
    If(If),
    For(For),
    Include(Include),
}

impl Node {
    /// Source position of the node, when it came from a single token.
    pub fn span(&self) -> Option<Span> {
        match self {
            Node::Element(el) => Some(el.span),
            Node::Text(text) => Some(text.span),
            Node::Comment(comment) => Some(comment.span),
            Node::Expression(expr) => Some(expr.span),
            Node::If(_) | Node::For(_) | Node::Include(_) => None,
        }
    }
}

/// An element with its plain attributes, `@` directives and children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Directive values keyed by name without the `@` mark.
    pub directives: BTreeMap<String, AttrValue>,
    pub children: Vec<Node>,
    pub self_closing: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub raw: String,
    pub span: Span,
}

/// A plain attribute. Valueless attributes carry an empty string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
    pub span: Span,
}

/// A literal string or a compiled expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Expression(Expression),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(text) => Some(text),
            AttrValue::Expression(_) => None,
        }
    }

    pub fn as_expression(&self) -> Option<&Expression> {
        match self {
            AttrValue::Expression(expr) => Some(expr),
            AttrValue::Text(_) => None,
        }
    }
}

/// Conditional rendering from `:if` / `:elif` / `:else`.
///
/// `alternate` is another `If` for an `:elif` branch, the bare node for an
/// `:else` branch, or absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct If {
    pub test: Expression,
    pub consequent: Box<Node>,
    pub alternate: Option<Box<Node>>,
}

impl If {
    pub fn new(test: Expression, consequent: Node) -> Self {
        Self {
            test,
            consequent: Box::new(consequent),
            alternate: None,
        }
    }
}

/// List rendering from `:for`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct For {
    pub source: Expression,
    pub bindings: ForBindings,
    pub body: Box<Node>,
}

/// Loop variable names, `item` and `index` unless overridden.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForBindings {
    pub item: Expression,
    pub index: Expression,
}

/// A template reference from `:include`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Include {
    pub target: AttrValue,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// A position in expression text, relative to the expression string.
/// Named `ExprSpan` to distinguish from `daisy_lexer::Span` which tracks
/// template positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExprSpan {
    pub start: usize,
    pub end: usize,
}

impl ExprSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A compiled expression handle, evaluated later by the render stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    /// The raw text the expression was compiled from.
    pub source: String,
    pub parts: Vec<ExprPart>,
    /// Template position of the token the expression came from.
    pub span: Span,
}

/// A segment of an expression. A plain expression is a single `Code` part;
/// interpolated text such as `btn {kind}` mixes literals and code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExprPart {
    Literal { value: String },
    Code {
        source: String,
        #[serde(skip)]
        tokens: Vec<ExprToken>,
    },
}

impl Expression {
    /// A bare identifier, such as the default `item` loop binding.
    pub fn identifier(name: &str) -> Self {
        let tokens = vec![
            ExprToken {
                kind: ExprTokenKind::Identifier,
                text: name.to_string(),
                span: ExprSpan::new(0, name.len()),
            },
            ExprToken {
                kind: ExprTokenKind::Eof,
                text: String::new(),
                span: ExprSpan::new(name.len(), name.len()),
            },
        ];
        Self {
            source: name.to_string(),
            parts: vec![ExprPart::Code {
                source: name.to_string(),
                tokens,
            }],
            span: Span::default(),
        }
    }

    /// The code of a single-part expression.
    pub fn code(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [ExprPart::Code { source, .. }] => Some(source),
            _ => None,
        }
    }

    /// True for interpolated text mixing literals and code.
    pub fn is_template(&self) -> bool {
        self.code().is_none()
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}
