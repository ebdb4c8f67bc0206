use serde::Serialize;

/// A position in source text, tracking line and column for error reporting.
///
/// `start` and `end` are byte offsets; `line` and `column` are 1-based and
/// describe `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

/// Token classification for Daisy template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    /// `<name`: content is the tag name.
    TagNameOpen,
    /// Raw body of a raw-text element such as `<script>`.
    TagBody,
    AttrName,
    Equals,
    /// Attribute value. Quoted values keep their quotes; an empty value
    /// means an `Expression` token follows.
    AttrValue,
    /// The `>` ending an opening tag.
    TagCloseAngle,
    /// `</name>`: content is the tag name.
    TagEnd,
    /// `{...}`: content is the text between the braces.
    Expression,
    Text,
    /// `<!--...-->`: content is the raw interior.
    Comment,
    EndOfInput,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::TagNameOpen => "tag name",
            TokenKind::TagBody => "tag body",
            TokenKind::AttrName => "attribute name",
            TokenKind::Equals => "'='",
            TokenKind::AttrValue => "attribute value",
            TokenKind::TagCloseAngle => "'>'",
            TokenKind::TagEnd => "closing tag",
            TokenKind::Expression => "expression",
            TokenKind::Text => "text",
            TokenKind::Comment => "comment",
            TokenKind::EndOfInput => "end of input",
        };
        f.write_str(name)
    }
}

/// A token produced by the Daisy scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub content: String,
    pub span: Span,
    /// Set on `TagNameOpen` tokens whose tag ends with `/>`.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub self_closing: bool,
}

impl Token {
    pub fn new(kind: TokenKind, content: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            content: content.into(),
            span,
            self_closing: false,
        }
    }

    pub fn offset(&self) -> usize {
        self.span.start
    }

    pub fn line(&self) -> usize {
        self.span.line
    }

    pub fn column(&self) -> usize {
        self.span.column
    }
}

/// HTML5 void elements (no children, no closing tag).
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose body is scanned as a single `TagBody` token.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];
