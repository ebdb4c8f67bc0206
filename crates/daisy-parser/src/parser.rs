//! Template parser for Daisy.
//!
//! Parses the token stream from `daisy-lexer` into a `Program` AST using
//! recursive descent. Attributes are split into plain attributes, `:`
//! statements and `@` directives; statements are then desugared into
//! `Include`, `If` and `For` wrapper nodes.

use crate::ast::{
    AttrValue, Attribute, Comment, Element, Expression, For, ForBindings, If, Include, Node,
    Program, Text,
};
use crate::expr_parser::{DefaultCompiler, ExpressionCompiler};
use crate::ParseError;
use daisy_lexer::{Scanner, ScannerOptions, Span, Token, TokenKind, VOID_ELEMENTS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

const STATEMENT_MARK: char = ':';
const DIRECTIVE_MARK: char = '@';

static DEFAULT_COMPILER: DefaultCompiler = DefaultCompiler;

/// Parser configuration. Scanner options are flattened so a single table
/// configures the whole front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Elements that never have children or a closing tag.
    pub void_elements: Vec<String>,
    #[serde(flatten)]
    pub scanner: ScannerOptions,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            void_elements: VOID_ELEMENTS.iter().map(|s| s.to_string()).collect(),
            scanner: ScannerOptions::default(),
        }
    }
}

impl ParserOptions {
    pub fn is_void(&self, tag: &str) -> bool {
        self.void_elements
            .iter()
            .any(|void| void.eq_ignore_ascii_case(tag))
    }
}

/// An attribute value before classification.
enum RawValue {
    /// No `=`, or `=` directly followed by `>`.
    Missing,
    /// Literal value, quotes removed.
    Text(String, Token),
    /// `name={expr}`
    Expression(Expression),
}

struct RawAttribute {
    name: String,
    value: RawValue,
    token: Token,
}

/// Control-flow statements found on one element.
#[derive(Default)]
struct Statements {
    if_test: Option<Expression>,
    elif_test: Option<Expression>,
    is_else: bool,
    for_source: Option<Expression>,
    for_item: Option<Expression>,
    for_index: Option<Expression>,
    include: Option<AttrValue>,
}

struct Classified {
    attributes: Vec<Attribute>,
    directives: BTreeMap<String, AttrValue>,
    statements: Statements,
}

/// Daisy template parser.
///
/// Converts a flat token stream into a `Program` using recursive descent.
/// Lookahead is a single token; reads past the end stay on the
/// `EndOfInput` sentinel.
pub struct Parser<'c> {
    tokens: Vec<Token>,
    pos: usize,
    options: ParserOptions,
    compiler: &'c dyn ExpressionCompiler,
}

impl Parser<'static> {
    /// Create a parser with default options and the default expression compiler.
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser::with_compiler(tokens, ParserOptions::default(), &DEFAULT_COMPILER)
    }

    /// Tokenize and parse source with default options.
    pub fn parse(source: &str) -> Result<Program, ParseError> {
        Parser::parse_with(source, &ParserOptions::default())
    }

    /// Tokenize and parse source with explicit options.
    pub fn parse_with(source: &str, options: &ParserOptions) -> Result<Program, ParseError> {
        let tokens = Scanner::tokenize_with(source, &options.scanner)?;
        Parser::with_compiler(tokens, options.clone(), &DEFAULT_COMPILER).parse_program()
    }
}

impl<'c> Parser<'c> {
    /// Create a parser using a custom expression compiler.
    pub fn with_compiler(
        mut tokens: Vec<Token>,
        options: ParserOptions,
        compiler: &'c dyn ExpressionCompiler,
    ) -> Self {
        if tokens.last().map_or(true, |t| t.kind != TokenKind::EndOfInput) {
            let end = tokens.last().map_or(Span::default(), |t| t.span);
            tokens.push(Token::new(
                TokenKind::EndOfInput,
                "",
                Span::new(end.end, end.end, end.line, end.column),
            ));
        }
        Self {
            tokens,
            pos: 0,
            options,
            compiler,
        }
    }

    /// Parse the whole token stream.
    ///
    /// `Program := Node* EndOfInput`; a closing tag with no open element is
    /// a syntax error.
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let body = self.parse_nodes()?;

        let token = self.peek();
        if token.kind == TokenKind::TagEnd {
            return Err(ParseError::syntax(
                format!("Unexpected closing tag </{}>", token.content),
                token,
            ));
        }

        debug!(nodes = body.len(), "parsed program");
        Ok(Program { body })
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Parse siblings until a closing tag or the end of input.
    fn parse_nodes(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();

        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::TagEnd | TokenKind::EndOfInput => break,
                TokenKind::TagNameOpen => self.parse_element(&mut nodes)?,
                TokenKind::Text | TokenKind::TagBody => {
                    let token = self.advance();
                    nodes.push(Node::Text(Text {
                        value: token.content,
                        span: token.span,
                    }));
                }
                TokenKind::Comment => {
                    let token = self.advance();
                    nodes.push(Node::Comment(Comment {
                        raw: token.content,
                        span: token.span,
                    }));
                }
                TokenKind::Expression => {
                    let token = self.advance();
                    nodes.push(Node::Expression(self.compile_braced(&token)?));
                }
                TokenKind::AttrName
                | TokenKind::Equals
                | TokenKind::AttrValue
                | TokenKind::TagCloseAngle => {
                    return Err(ParseError::syntax(
                        format!("Unexpected {} outside of a tag", token.kind),
                        token,
                    ));
                }
            }
        }

        Ok(nodes)
    }

    /// Parse an element and append it, desugared, to `siblings`.
    fn parse_element(&mut self, siblings: &mut Vec<Node>) -> Result<(), ParseError> {
        let open = self.advance();
        trace!(tag = %open.content, line = open.line(), "element");

        let attributes = self.parse_attributes()?;
        let Classified {
            attributes,
            directives,
            statements,
        } = self.classify(attributes)?;

        self.expect(
            TokenKind::TagCloseAngle,
            &format!("Expected '>' to close <{}>", open.content),
        )?;

        let self_closing = open.self_closing || self.options.is_void(&open.content);
        let children = if self_closing {
            self.skip_redundant_end_tag(&open);
            Vec::new()
        } else {
            let children = self.parse_nodes()?;
            self.expect_end_tag(&open)?;
            children
        };

        let element = Element {
            name: open.content,
            attributes,
            directives,
            children,
            self_closing,
            span: open.span,
        };
        self.desugar(siblings, element, statements);
        Ok(())
    }

    /// Accept `<input></input>`: a void or self-closing element may still be
    /// followed by its own closing tag.
    fn skip_redundant_end_tag(&mut self, open: &Token) {
        let token = self.peek();
        if token.kind == TokenKind::TagEnd && token.content.eq_ignore_ascii_case(&open.content) {
            trace!(tag = %open.content, "skipping closing tag of void element");
            self.advance();
        }
    }

    fn expect_end_tag(&mut self, open: &Token) -> Result<(), ParseError> {
        let token = self.peek();
        match token.kind {
            TokenKind::TagEnd if token.content.eq_ignore_ascii_case(&open.content) => {
                self.advance();
                Ok(())
            }
            TokenKind::TagEnd => Err(ParseError::syntax(
                format!(
                    "Mismatched closing tag: expected </{}>, found </{}>",
                    open.content, token.content
                ),
                token,
            )),
            _ => Err(ParseError::syntax(
                format!(
                    "Unclosed element <{}> opened at line {}, column {}",
                    open.content,
                    open.line(),
                    open.column()
                ),
                token,
            )),
        }
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    fn parse_attributes(&mut self) -> Result<Vec<RawAttribute>, ParseError> {
        let mut attributes = Vec::new();

        while self.peek().kind == TokenKind::AttrName {
            let token = self.advance();
            if token.content.is_empty() {
                return Err(ParseError::syntax("Empty attribute name", &token));
            }

            let value = if self.peek().kind == TokenKind::Equals {
                self.advance();
                self.parse_attribute_value()?
            } else {
                RawValue::Missing
            };

            attributes.push(RawAttribute {
                name: token.content.clone(),
                value,
                token,
            });
        }

        Ok(attributes)
    }

    fn parse_attribute_value(&mut self) -> Result<RawValue, ParseError> {
        if self.peek().kind != TokenKind::AttrValue {
            return Ok(RawValue::Missing);
        }

        let token = self.advance();
        if token.content.is_empty() {
            // A zero-length value stands for the expression token after it.
            let expr = self.expect(
                TokenKind::Expression,
                "Expected an expression after empty attribute value",
            )?;
            return Ok(RawValue::Expression(self.compile_braced(&expr)?));
        }

        let text = unquote(&token.content, self.options.scanner.quote_escapes);
        Ok(RawValue::Text(text, token))
    }

    /// Split attributes into plain attributes, directives and statements.
    fn classify(&self, raw: Vec<RawAttribute>) -> Result<Classified, ParseError> {
        let mut attributes = Vec::new();
        let mut directives = BTreeMap::new();
        let mut statements = Statements::default();

        for attr in raw {
            if let Some(statement) = attr.name.strip_prefix(STATEMENT_MARK) {
                match statement {
                    "if" => statements.if_test = Some(self.statement_expression(&attr)?),
                    "elif" => statements.elif_test = Some(self.statement_expression(&attr)?),
                    "else" => statements.is_else = true,
                    "for" => statements.for_source = Some(self.statement_expression(&attr)?),
                    "for-item" => statements.for_item = Some(self.statement_expression(&attr)?),
                    "for-index" => statements.for_index = Some(self.statement_expression(&attr)?),
                    "include" => statements.include = Some(self.include_target(&attr)?),
                    other => {
                        warn!(
                            statement = other,
                            line = attr.token.line(),
                            column = attr.token.column(),
                            "ignoring unknown statement"
                        );
                    }
                }
                continue;
            }

            let span = attr.token.span;
            let value = self.attribute_value(attr.value)?;
            if let Some(directive) = attr.name.strip_prefix(DIRECTIVE_MARK) {
                directives.insert(directive.to_string(), value);
            } else {
                attributes.push(Attribute {
                    name: attr.name,
                    value,
                    span,
                });
            }
        }

        Ok(Classified {
            attributes,
            directives,
            statements,
        })
    }

    /// Plain attribute and directive values compile only when they contain
    /// expression syntax.
    fn attribute_value(&self, value: RawValue) -> Result<AttrValue, ParseError> {
        match value {
            RawValue::Missing => Ok(AttrValue::Text(String::new())),
            RawValue::Expression(expr) => Ok(AttrValue::Expression(expr)),
            RawValue::Text(text, token) => {
                if self.compiler.contains_expression_syntax(&text) {
                    Ok(AttrValue::Expression(self.compile(&text, &token)?))
                } else {
                    Ok(AttrValue::Text(text))
                }
            }
        }
    }

    /// `:if`, `:elif`, `:for`, `:for-item` and `:for-index` values are
    /// always expressions.
    fn statement_expression(&self, attr: &RawAttribute) -> Result<Expression, ParseError> {
        match &attr.value {
            RawValue::Expression(expr) => Ok(expr.clone()),
            RawValue::Text(text, token) => self.compile(text, token),
            RawValue::Missing => Err(ParseError::syntax(
                format!("Statement {} requires a value", attr.name),
                &attr.token,
            )),
        }
    }

    fn include_target(&self, attr: &RawAttribute) -> Result<AttrValue, ParseError> {
        match &attr.value {
            RawValue::Missing => Err(ParseError::syntax(
                format!("Statement {} requires a value", attr.name),
                &attr.token,
            )),
            RawValue::Text(text, _) if text.trim().is_empty() => Err(ParseError::syntax(
                format!("Statement {} requires a value", attr.name),
                &attr.token,
            )),
            RawValue::Expression(expr) => Ok(AttrValue::Expression(expr.clone())),
            RawValue::Text(text, token) => {
                if self.compiler.contains_expression_syntax(text) {
                    Ok(AttrValue::Expression(self.compile(text, token)?))
                } else {
                    Ok(AttrValue::Text(text.clone()))
                }
            }
        }
    }

    // =========================================================================
    // Desugaring
    // =========================================================================

    /// Turn the element's statements into wrapper nodes and append the
    /// result to `siblings`.
    ///
    /// `:include` replaces the element and drops every other statement.
    /// `:else` / `:elif` attach to the open end of the most recent `If`
    /// sibling and drop every sibling appended after that `If`. `:if` wraps
    /// the element; `:for` wraps the outcome.
    fn desugar(&self, siblings: &mut Vec<Node>, element: Element, statements: Statements) {
        let Statements {
            if_test,
            elif_test,
            is_else,
            for_source,
            for_item,
            for_index,
            include,
        } = statements;

        if let Some(target) = include {
            debug!(tag = %element.name, "replacing element with include");
            siblings.push(Node::Include(Include { target }));
            return;
        }

        let wants_branch = is_else || elif_test.is_some();
        if wants_branch {
            if let Some(index) = open_chain(siblings) {
                let body = wrap_for(Node::Element(element), for_source, for_item, for_index);
                let branch = match elif_test {
                    Some(test) if !is_else => Node::If(If::new(test, body)),
                    _ => body,
                };
                if let Node::If(head) = &mut siblings[index] {
                    if let Some(open) = open_branch(head) {
                        open.alternate = Some(Box::new(branch));
                    }
                }
                let dropped = siblings.len() - index - 1;
                siblings.truncate(index + 1);
                debug!(index, dropped, else_branch = is_else, "attached branch to if chain");
                return;
            }
            warn!(
                tag = %element.name,
                line = element.span.line,
                column = element.span.column,
                "branch statement without an open :if chain, keeping element"
            );
        }

        let mut node = Node::Element(element);
        if let Some(test) = if_test {
            node = Node::If(If::new(test, node));
        }
        siblings.push(wrap_for(node, for_source, for_item, for_index));
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn compile(&self, raw: &str, token: &Token) -> Result<Expression, ParseError> {
        self.compiler
            .parse_expression(raw)
            .map(|expr| expr.with_span(token.span))
            .map_err(|error| ParseError::Expression {
                error,
                offset: token.offset(),
                line: token.line(),
                column: token.column(),
            })
    }

    /// Compile an `Expression` token, restoring the braces the scanner
    /// stripped so nested braces stay part of the code.
    fn compile_braced(&self, token: &Token) -> Result<Expression, ParseError> {
        self.compile(&format!("{{{}}}", token.content), token)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(ParseError::syntax(
                format!("{message}, found {}", self.peek().kind),
                self.peek(),
            ))
        }
    }
}

/// Index of the most recent `If` sibling, if its chain can still take a branch.
fn open_chain(siblings: &[Node]) -> Option<usize> {
    let index = siblings.iter().rposition(|node| matches!(node, Node::If(_)))?;
    match &siblings[index] {
        Node::If(head) if chain_is_open(head) => Some(index),
        _ => None,
    }
}

fn chain_is_open(head: &If) -> bool {
    match head.alternate.as_deref() {
        None => true,
        Some(Node::If(next)) => chain_is_open(next),
        Some(_) => false,
    }
}

/// The last `If` of a chain, when the chain has not been closed by `:else`.
fn open_branch(head: &mut If) -> Option<&mut If> {
    if head.alternate.is_none() {
        return Some(head);
    }
    match head.alternate.as_deref_mut() {
        Some(Node::If(next)) => open_branch(next),
        _ => None,
    }
}

fn wrap_for(
    node: Node,
    source: Option<Expression>,
    item: Option<Expression>,
    index: Option<Expression>,
) -> Node {
    match source {
        Some(source) => Node::For(For {
            source,
            bindings: ForBindings {
                item: item.unwrap_or_else(|| Expression::identifier("item")),
                index: index.unwrap_or_else(|| Expression::identifier("index")),
            },
            body: Box::new(node),
        }),
        None => node,
    }
}

/// Strip surrounding quotes from an attribute value, resolving `\"`-style
/// escapes when quote escapes are enabled.
fn unquote(raw: &str, quote_escapes: bool) -> String {
    let quote = match raw.chars().next() {
        Some(q @ ('"' | '\'')) if raw.len() >= 2 && raw.ends_with(q) => q,
        _ => return raw.to_string(),
    };
    let inner = &raw[1..raw.len() - 1];
    if !quote_escapes {
        return inner.to_string();
    }

    let mut value = String::with_capacity(inner.len());
    let mut rest = inner.chars().peekable();
    while let Some(c) = rest.next() {
        match (c, rest.peek()) {
            ('\\', Some(&next)) if next == quote || next == '\\' => {
                value.push(next);
                rest.next();
            }
            _ => value.push(c),
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprPart;
    use crate::ExpressionSyntaxError;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Program {
        Parser::parse(source).unwrap()
    }

    fn first_element(program: &Program) -> &Element {
        match &program.body[0] {
            Node::Element(el) => el,
            other => panic!("Expected Element, got {other:?}"),
        }
    }

    fn as_element(node: &Node) -> &Element {
        match node {
            Node::Element(el) => el,
            other => panic!("Expected Element, got {other:?}"),
        }
    }

    fn as_if(node: &Node) -> &If {
        match node {
            Node::If(node) => node,
            other => panic!("Expected If, got {other:?}"),
        }
    }

    fn as_for(node: &Node) -> &For {
        match node {
            Node::For(node) => node,
            other => panic!("Expected For, got {other:?}"),
        }
    }

    fn text_of(node: &Node) -> &str {
        match node {
            Node::Text(text) => &text.value,
            other => panic!("Expected Text, got {other:?}"),
        }
    }

    // =========================================================================
    // Empty / simple
    // =========================================================================

    #[test]
    fn test_empty_program() {
        assert!(parse("").body.is_empty());
    }

    #[test]
    fn test_single_element() {
        let program = parse("<div>hello</div>");
        assert_eq!(program.body.len(), 1);
        let el = first_element(&program);
        assert_eq!(el.name, "div");
        assert!(el.attributes.is_empty());
        assert!(el.directives.is_empty());
        assert_eq!(el.children.len(), 1);
        assert_eq!(text_of(&el.children[0]), "hello");
    }

    #[test]
    fn test_siblings_and_nesting() {
        let program = parse("<ul><li>a</li><li>b</li></ul><p></p>");
        assert_eq!(program.body.len(), 2);
        let ul = first_element(&program);
        assert_eq!(ul.children.len(), 2);
        assert_eq!(as_element(&ul.children[1]).name, "li");
        assert_eq!(text_of(&as_element(&ul.children[1]).children[0]), "b");
    }

    #[test]
    fn test_text_comment_and_expression() {
        let program = parse("Hi {name}<!-- c -->");
        assert_eq!(program.body.len(), 3);
        assert_eq!(text_of(&program.body[0]), "Hi ");
        match &program.body[1] {
            Node::Expression(expr) => assert_eq!(expr.code(), Some("name")),
            other => panic!("Expected Expression, got {other:?}"),
        }
        match &program.body[2] {
            Node::Comment(comment) => assert_eq!(comment.raw, " c "),
            other => panic!("Expected Comment, got {other:?}"),
        }
    }

    #[test]
    fn test_nested_braces_in_content_expression() {
        let program = parse("{ fmt({ a: 1 }) }");
        match &program.body[0] {
            Node::Expression(expr) => assert_eq!(expr.code(), Some("fmt({ a: 1 })")),
            other => panic!("Expected Expression, got {other:?}"),
        }
    }

    #[test]
    fn test_braces_in_expression_strings() {
        let program = parse(r#"<a title={ '}' + x }>{ "{" }</a>"#);
        let el = first_element(&program);
        let title = el.attributes[0].value.as_expression().unwrap();
        assert_eq!(title.code(), Some("'}' + x"));
        match &el.children[0] {
            Node::Expression(expr) => assert_eq!(expr.code(), Some(r#""{""#)),
            other => panic!("Expected Expression, got {other:?}"),
        }
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        let program = parse("<p>a<br>b<x/>c</p>");
        let p = first_element(&program);
        assert_eq!(p.children.len(), 5);
        assert!(as_element(&p.children[1]).self_closing);
        assert!(as_element(&p.children[3]).self_closing);
        assert!(as_element(&p.children[3]).children.is_empty());
    }

    #[test]
    fn test_void_element_with_closing_tag() {
        let program = parse(r#"<input type="text"></input>"#);
        assert_eq!(program.body.len(), 1);
        assert!(first_element(&program).self_closing);

        let program = parse("<p><img src=x></IMG>after</p>");
        let p = first_element(&program);
        assert_eq!(p.children.len(), 2);
        assert_eq!(as_element(&p.children[0]).name, "img");
        assert_eq!(text_of(&p.children[1]), "after");
    }

    #[test]
    fn test_self_closing_element_with_closing_tag() {
        let program = parse("<x/></x><y></y>");
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn test_void_element_keeps_unrelated_closing_tag() {
        let program = parse("<p><br></p>");
        assert_eq!(first_element(&program).children.len(), 1);
        assert!(Parser::parse("<br></p>").is_err());
    }

    #[test]
    fn test_empty_unquoted_value_before_self_close() {
        let program = parse("<input disabled= /><x b=/>");
        assert_eq!(program.body.len(), 2);
        let input = first_element(&program);
        assert_eq!(input.attributes[0].name, "disabled");
        assert_eq!(input.attributes[0].value.as_text(), Some(""));
        let x = as_element(&program.body[1]);
        assert!(x.self_closing);
        assert_eq!(x.attributes[0].value.as_text(), Some(""));
    }

    #[test]
    fn test_custom_void_elements() {
        let options = ParserOptions {
            void_elements: vec!["icon".into()],
            ..ParserOptions::default()
        };
        let program = Parser::parse_with("<icon><br></br>", &options).unwrap();
        assert_eq!(program.body.len(), 2);
        assert!(as_element(&program.body[0]).self_closing);
        assert!(!as_element(&program.body[1]).self_closing);
    }

    #[test]
    fn test_script_body_is_text_child() {
        let program = parse("<script>a < b && {c}</script>");
        let script = first_element(&program);
        assert_eq!(text_of(&script.children[0]), "a < b && {c}");
    }

    #[test]
    fn test_closing_tag_is_case_insensitive() {
        assert_eq!(parse("<DIV></div>").body.len(), 1);
    }

    // =========================================================================
    // Attributes and directives
    // =========================================================================

    #[test]
    fn test_plain_attributes() {
        let program = parse(r#"<input type="text" value=1 disabled>"#);
        let el = first_element(&program);
        let pairs: Vec<_> = el
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a.value.as_text().unwrap()))
            .collect();
        assert_eq!(pairs, vec![("type", "text"), ("value", "1"), ("disabled", "")]);
    }

    #[test]
    fn test_escaped_quote_is_unescaped() {
        let program = parse(r#"<a title="say \"hi\"">x</a>"#);
        let el = first_element(&program);
        assert_eq!(el.attributes[0].value.as_text(), Some(r#"say "hi""#));
    }

    #[test]
    fn test_attribute_with_interpolation() {
        let program = parse(r#"<a class="btn {kind}">x</a>"#);
        let el = first_element(&program);
        let expr = el.attributes[0].value.as_expression().unwrap();
        assert!(expr.is_template());
        assert_eq!(expr.source, "btn {kind}");
        assert_eq!(expr.span.line, 1);
    }

    #[test]
    fn test_attribute_expression_token() {
        let program = parse("<a title={ a + b }>x</a>");
        let el = first_element(&program);
        let expr = el.attributes[0].value.as_expression().unwrap();
        assert_eq!(expr.code(), Some("a + b"));
    }

    #[test]
    fn test_directives_are_separated() {
        let program = parse(r#"<button @click="{save()}" @focus class="b">x</button>"#);
        let el = first_element(&program);
        assert_eq!(el.attributes.len(), 1);
        assert_eq!(el.directives.len(), 2);
        let click = el.directives["click"].as_expression().unwrap();
        assert_eq!(click.code(), Some("save()"));
        assert_eq!(el.directives["focus"].as_text(), Some(""));
    }

    #[test]
    fn test_statements_are_not_attributes() {
        let program = parse(r#"<p :if="ok" id="x">x</p>"#);
        let wrapped = as_if(&program.body[0]);
        let el = as_element(&wrapped.consequent);
        assert_eq!(el.attributes.len(), 1);
        assert_eq!(el.attributes[0].name, "id");
    }

    #[test]
    fn test_unknown_statement_is_dropped() {
        let program = parse(r#"<p :bogus="1">x</p>"#);
        let el = first_element(&program);
        assert!(el.attributes.is_empty());
    }

    // =========================================================================
    // If / elif / else
    // =========================================================================

    #[test]
    fn test_if_wraps_element() {
        let program = parse(r#"<p :if="visible">x</p>"#);
        let node = as_if(&program.body[0]);
        assert_eq!(node.test.code(), Some("visible"));
        assert_eq!(as_element(&node.consequent).name, "p");
        assert!(node.alternate.is_none());
    }

    #[test]
    fn test_if_elif_else_chain() {
        let program = parse(r#"<a :if="x">A</a><b :elif="y">B</b><c :else>C</c>"#);
        assert_eq!(program.body.len(), 1);

        let head = as_if(&program.body[0]);
        assert_eq!(head.test.code(), Some("x"));
        assert_eq!(as_element(&head.consequent).name, "a");

        let elif = as_if(head.alternate.as_deref().unwrap());
        assert_eq!(elif.test.code(), Some("y"));
        assert_eq!(as_element(&elif.consequent).name, "b");

        let otherwise = as_element(elif.alternate.as_deref().unwrap());
        assert_eq!(otherwise.name, "c");
    }

    #[test]
    fn test_else_drops_siblings_after_if() {
        let program = parse(r#"<i>0</i><a :if="x">A</a> gap <em>e</em><c :else>C</c><z></z>"#);
        assert_eq!(program.body.len(), 3);
        assert_eq!(as_element(&program.body[0]).name, "i");
        let head = as_if(&program.body[1]);
        assert_eq!(as_element(head.alternate.as_deref().unwrap()).name, "c");
        assert_eq!(as_element(&program.body[2]).name, "z");
    }

    #[test]
    fn test_branch_attaches_to_most_recent_if() {
        let program = parse(r#"<a :if="x">A</a><b :if="y">B</b><c :else>C</c>"#);
        assert_eq!(program.body.len(), 2);
        assert!(as_if(&program.body[0]).alternate.is_none());
        let second = as_if(&program.body[1]);
        assert_eq!(as_element(second.alternate.as_deref().unwrap()).name, "c");
    }

    #[test]
    fn test_chains_are_per_sibling_level() {
        let program = parse(r#"<a :if="x">A</a><div><c :else>C</c></div>"#);
        assert_eq!(program.body.len(), 2);
        let div = as_element(&program.body[1]);
        assert_eq!(as_element(&div.children[0]).name, "c");
    }

    #[test]
    fn test_orphan_else_keeps_element() {
        let program = parse("<c :else>C</c>");
        assert_eq!(first_element(&program).name, "c");
    }

    #[test]
    fn test_else_after_closed_chain_keeps_element() {
        let program = parse(r#"<a :if="x">A</a><b :else>B</b><c :else>C</c>"#);
        assert_eq!(program.body.len(), 2);
        assert_eq!(as_element(&program.body[1]).name, "c");
    }

    #[test]
    fn test_if_requires_value() {
        let err = Parser::parse("<a :if>A</a>").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
        assert!(err.to_string().contains(":if requires a value"));
    }

    // =========================================================================
    // For
    // =========================================================================

    #[test]
    fn test_for_default_bindings() {
        let program = parse(r#"<li :for="items">{item}</li>"#);
        let node = as_for(&program.body[0]);
        assert_eq!(node.source.code(), Some("items"));
        assert_eq!(node.bindings.item.code(), Some("item"));
        assert_eq!(node.bindings.index.code(), Some("index"));
        assert_eq!(as_element(&node.body).name, "li");
    }

    #[test]
    fn test_for_custom_bindings() {
        let program = parse(r#"<li :for="rows" :for-item="row" :for-index="i">x</li>"#);
        let node = as_for(&program.body[0]);
        assert_eq!(node.bindings.item.code(), Some("row"));
        assert_eq!(node.bindings.index.code(), Some("i"));
    }

    #[test]
    fn test_for_wraps_if() {
        let program = parse(r#"<li :if="row.visible" :for="rows">x</li>"#);
        let node = as_for(&program.body[0]);
        let inner = as_if(&node.body);
        assert_eq!(inner.test.code(), Some("row.visible"));
    }

    #[test]
    fn test_for_on_else_branch_stays_inside_branch() {
        let program = parse(r#"<p :if="empty">none</p><li :else :for="rows">x</li>"#);
        assert_eq!(program.body.len(), 1);
        let head = as_if(&program.body[0]);
        let looped = as_for(head.alternate.as_deref().unwrap());
        assert_eq!(looped.source.code(), Some("rows"));
    }

    // =========================================================================
    // Include
    // =========================================================================

    #[test]
    fn test_include_with_plain_target() {
        let program = parse(r#"<div :include="header" :if="x" @a="b">ignored</div>"#);
        assert_eq!(program.body.len(), 1);
        match &program.body[0] {
            Node::Include(include) => assert_eq!(include.target.as_text(), Some("header")),
            other => panic!("Expected Include, got {other:?}"),
        }
    }

    #[test]
    fn test_include_with_expression_target() {
        let program = parse(r#"<div :include="{ page }"></div>"#);
        match &program.body[0] {
            Node::Include(include) => {
                let target = include.target.as_expression().unwrap();
                assert_eq!(target.code(), Some("page"));
            }
            other => panic!("Expected Include, got {other:?}"),
        }
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn test_unclosed_element() {
        let err = Parser::parse("<div><p>x</p>").unwrap_err();
        match &err {
            ParseError::Syntax { token, .. } => assert_eq!(token.kind, TokenKind::EndOfInput),
            other => panic!("Expected Syntax, got {other:?}"),
        }
        assert!(err.to_string().contains("Unclosed element <div>"));
    }

    #[test]
    fn test_mismatched_closing_tag() {
        let err = Parser::parse("<div>\n  <p>x</span>\n</div>").unwrap_err();
        assert_eq!(err.line(), 2);
        assert_eq!(err.column(), 7);
        assert!(err.to_string().contains("expected </p>, found </span>"));
    }

    #[test]
    fn test_stray_closing_tag() {
        let err = Parser::parse("a</b>c").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
        assert_eq!(err.offset(), 1);
    }

    #[test]
    fn test_lexer_error_is_propagated() {
        let err = Parser::parse(r#"<a href="x"#).unwrap_err();
        assert!(matches!(err, ParseError::Lexer(_)));
        assert_eq!(err.column(), 9);
    }

    #[test]
    fn test_expression_error_is_anchored_to_token() {
        let err = Parser::parse("<p>\n{ a # b }</p>").unwrap_err();
        match &err {
            ParseError::Expression { error, line, column, .. } => {
                assert_eq!(*line, 2);
                assert_eq!(*column, 1);
                assert!(error.message.contains('#'));
            }
            other => panic!("Expected Expression, got {other:?}"),
        }
    }

    #[test]
    fn test_unexpected_token_kind() {
        let tokens = vec![Token::new(TokenKind::AttrName, "x", Span::new(0, 1, 1, 1))];
        let err = Parser::new(tokens).parse_program().unwrap_err();
        assert!(err.to_string().contains("Unexpected attribute name"));
    }

    #[test]
    fn test_missing_close_angle() {
        let tokens = vec![
            Token::new(TokenKind::TagNameOpen, "a", Span::new(0, 2, 1, 1)),
            Token::new(TokenKind::Text, "x", Span::new(2, 3, 1, 3)),
        ];
        let err = Parser::new(tokens).parse_program().unwrap_err();
        assert!(err.to_string().contains("Expected '>' to close <a>, found text"));
    }

    // =========================================================================
    // Custom compiler
    // =========================================================================

    struct UpperCompiler;

    impl ExpressionCompiler for UpperCompiler {
        fn contains_expression_syntax(&self, raw: &str) -> bool {
            raw.starts_with('$')
        }

        fn parse_expression(&self, raw: &str) -> Result<Expression, ExpressionSyntaxError> {
            if raw.contains('!') {
                return Err(ExpressionSyntaxError::new("no bangs", 0));
            }
            Ok(Expression {
                source: raw.to_uppercase(),
                parts: vec![ExprPart::Literal {
                    value: raw.to_uppercase(),
                }],
                span: Span::default(),
            })
        }
    }

    #[test]
    fn test_custom_compiler_is_used() {
        let tokens = Scanner::tokenize(r#"<a href="$x" title="y">z</a>"#).unwrap();
        let compiler = UpperCompiler;
        let program = Parser::with_compiler(tokens, ParserOptions::default(), &compiler)
            .parse_program()
            .unwrap();
        let el = first_element(&program);
        assert_eq!(el.attributes[0].value.as_expression().unwrap().source, "$X");
        assert_eq!(el.attributes[1].value.as_text(), Some("y"));
    }

    #[test]
    fn test_custom_compiler_error() {
        let tokens = Scanner::tokenize(r#"<a :if="ok!">z</a>"#).unwrap();
        let compiler = UpperCompiler;
        let err = Parser::with_compiler(tokens, ParserOptions::default(), &compiler)
            .parse_program()
            .unwrap_err();
        assert!(matches!(err, ParseError::Expression { .. }));
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"a\"", true), "a");
        assert_eq!(unquote("'a'", true), "a");
        assert_eq!(unquote("plain", true), "plain");
        assert_eq!(unquote(r#""a\\b""#, true), r"a\b");
        assert_eq!(unquote(r#""a\"b""#, false), r#"a\"b"#);
        assert_eq!(unquote("\"", true), "\"");
    }
}
