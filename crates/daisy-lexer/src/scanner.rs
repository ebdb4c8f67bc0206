use crate::token::{Span, Token, TokenKind, RAW_TEXT_ELEMENTS};
use crate::LexerError;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Scanner state. The current state is the top of the frame stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Bootstrap state, always the bottom frame.
    Init,
    OpenTagStart,
    TagName,
    InTag,
    Attr,
    Equals,
    Value,
    CloseTag,
    EndTag,
    Expr,
    Text,
    OpenComment,
}

/// A source position: byte offset plus 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mark {
    offset: usize,
    line: usize,
    column: usize,
}

/// One entry of the state stack, remembering where the state began.
#[derive(Debug, Clone, Copy)]
struct Frame {
    state: State,
    start: Mark,
}

/// Scanner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerOptions {
    /// A quote preceded by an odd run of backslashes does not end a quoted
    /// attribute value. When `false`, every matching quote ends the value.
    pub quote_escapes: bool,
    /// Elements whose body is kept verbatim as a single `TagBody` token.
    pub raw_text_elements: Vec<String>,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            quote_escapes: true,
            raw_text_elements: RAW_TEXT_ELEMENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Daisy template scanner.
///
/// Converts template source into a flat token stream with an explicit state
/// machine. The current state is the top of a frame stack; every frame
/// remembers the position it started at so that unterminated markup can be
/// rolled back into literal text once input runs out.
///
/// A scanner owns all of its scratch state (stack, accumulation buffer,
/// tokens) and is consumed by a single call to [`Scanner::tokenize`].
pub struct Scanner<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    line: usize,
    column: usize,
    stack: Vec<Frame>,
    buffer: String,
    buffer_start: Option<Mark>,
    /// Opening quote of the value being scanned, `None` for unquoted values.
    quote: Option<char>,
    /// Brace depth of the expression being scanned.
    depth: usize,
    /// Opening quote of a string literal inside the expression being scanned.
    expr_quote: Option<char>,
    /// Index of the `TagNameOpen` token of the tag being scanned.
    open_tag: Option<usize>,
    tokens: Vec<Token>,
    options: ScannerOptions,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given source.
    pub fn new(source: &'a str) -> Self {
        Self::with_options(source, ScannerOptions::default())
    }

    /// Create a scanner with explicit options.
    pub fn with_options(source: &'a str, options: ScannerOptions) -> Self {
        let mut scanner = Self {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
            line: 1,
            column: 1,
            stack: Vec::new(),
            buffer: String::new(),
            buffer_start: None,
            quote: None,
            depth: 0,
            expr_quote: None,
            open_tag: None,
            tokens: Vec::new(),
            options,
        };
        scanner.push_state(State::Init);
        scanner
    }

    /// Tokenize the entire source into a vector of tokens ending in `EndOfInput`.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexerError> {
        Scanner::new(source).scan_tokens()
    }

    /// Tokenize with explicit options.
    pub fn tokenize_with(source: &str, options: &ScannerOptions) -> Result<Vec<Token>, LexerError> {
        Scanner::with_options(source, options.clone()).scan_tokens()
    }

    /// Run the state machine over all input, then recover, merge and terminate.
    pub fn scan_tokens(mut self) -> Result<Vec<Token>, LexerError> {
        while let Some(c) = self.current() {
            self.step(c);
        }

        self.recover()?;

        let mut tokens = merge_text_tokens(std::mem::take(&mut self.tokens));
        let end = self.mark();
        tokens.push(Token::new(
            TokenKind::EndOfInput,
            "",
            Span::new(end.offset, end.offset, end.line, end.column),
        ));

        debug!(tokens = tokens.len(), bytes = self.source.len(), "tokenized template");
        Ok(tokens)
    }

    /// Process the character under the cursor in the current state.
    ///
    /// Arms that do not advance always change state, so the loop terminates.
    fn step(&mut self, c: char) {
        match self.state() {
            State::Init => self.scan_init(c),
            State::OpenTagStart => {
                if c.is_whitespace() {
                    self.advance();
                } else {
                    self.reset_buffer();
                    self.push_state(State::TagName);
                }
            }
            State::TagName => self.scan_tag_name(c),
            State::InTag => self.scan_in_tag(c),
            State::Attr => self.scan_attr(c),
            State::Equals => self.scan_equals(c),
            State::Value => self.scan_value(c),
            State::CloseTag => self.close_tag(),
            State::EndTag => self.scan_end_tag(c),
            State::Expr => self.scan_expr(c),
            State::Text => self.scan_text(c),
            State::OpenComment => self.scan_comment(c),
        }
    }

    // --- States ---

    fn scan_init(&mut self, c: char) {
        self.reset_buffer();
        match c {
            '<' => match self.peek_at(1) {
                Some('/') if self.peek_at(2).is_some_and(|n| !n.is_whitespace()) => {
                    self.push_state(State::EndTag);
                    self.advance_n(2);
                }
                Some('!') if self.peek_at(2) == Some('-') && self.peek_at(3) == Some('-') => {
                    self.push_state(State::OpenComment);
                    self.advance_n(4);
                }
                Some(n) if n.is_ascii_alphabetic() => {
                    self.push_state(State::OpenTagStart);
                    self.advance();
                }
                // `a < b`, `</ x`, `<3`: not markup
                _ => {
                    self.push_state(State::Text);
                    self.accept();
                }
            },
            '{' => self.open_expr(),
            _ => self.push_state(State::Text),
        }
    }

    fn scan_tag_name(&mut self, c: char) {
        match c {
            '/' if self.peek_at(1) == Some('>') => {
                let index = self.emit_open_tag();
                self.tokens[index].self_closing = true;
                self.advance();
                self.push_state(State::InTag);
            }
            '>' => {
                self.emit_open_tag();
                self.push_state(State::InTag);
            }
            c if c.is_whitespace() => {
                self.emit_open_tag();
                self.push_state(State::InTag);
            }
            _ => self.accept(),
        }
    }

    fn scan_in_tag(&mut self, c: char) {
        match c {
            '>' => self.push_state(State::CloseTag),
            '/' if self.peek_at(1) == Some('>') => {
                if let Some(index) = self.open_tag {
                    self.tokens[index].self_closing = true;
                }
                self.advance();
            }
            c if c.is_whitespace() => self.advance(),
            _ => {
                self.reset_buffer();
                self.push_state(State::Attr);
            }
        }
    }

    fn scan_attr(&mut self, c: char) {
        match c {
            '=' => {
                self.emit(TokenKind::AttrName);
                self.accept();
                self.emit(TokenKind::Equals);
                self.push_state(State::Equals);
            }
            '/' if self.peek_at(1) == Some('>') => {
                self.emit(TokenKind::AttrName);
                self.unwind_to(State::InTag);
            }
            c if c == '>' || c.is_whitespace() => {
                self.emit(TokenKind::AttrName);
                self.unwind_to(State::InTag);
            }
            _ => self.accept(),
        }
    }

    fn scan_equals(&mut self, c: char) {
        match c {
            '"' | '\'' => {
                self.reset_buffer();
                self.quote = Some(c);
                self.push_state(State::Value);
                self.accept();
            }
            '>' => self.unwind_to(State::InTag),
            // `b=/>`: no value, `InTag` handles the self-close.
            '/' if self.peek_at(1) == Some('>') => self.unwind_to(State::InTag),
            '{' => {
                // Zero-length value: the expression token that follows carries it.
                let at = self.mark();
                self.emit_from(TokenKind::AttrValue, at);
                self.open_expr();
            }
            c if c.is_whitespace() => self.advance(),
            _ => {
                self.reset_buffer();
                self.quote = None;
                self.push_state(State::Value);
            }
        }
    }

    fn scan_value(&mut self, c: char) {
        match self.quote {
            Some(quote) => {
                let closes = c == quote && !self.is_escaped();
                self.accept();
                if closes {
                    self.emit(TokenKind::AttrValue);
                    self.quote = None;
                    self.unwind_to(State::InTag);
                }
            }
            None => {
                let ends = c.is_whitespace()
                    || c == '>'
                    || (c == '/' && self.peek_at(1) == Some('>'));
                if ends {
                    self.emit(TokenKind::AttrValue);
                    self.unwind_to(State::InTag);
                } else {
                    self.accept();
                }
            }
        }
    }

    /// Consume the `>` of an opening tag and drop every tag frame at once.
    fn close_tag(&mut self) {
        self.reset_buffer();
        self.accept();
        self.emit(TokenKind::TagCloseAngle);

        if let Some(index) = self
            .stack
            .iter()
            .rposition(|frame| frame.state == State::OpenTagStart)
        {
            self.stack.truncate(index.max(1));
        }
        trace!(depth = self.stack.len(), "closed opening tag");

        let raw_name = self.open_tag.take().and_then(|index| {
            let token = &self.tokens[index];
            let is_raw = !token.self_closing
                && self
                    .options
                    .raw_text_elements
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(&token.content));
            is_raw.then(|| token.content.clone())
        });
        if let Some(name) = raw_name {
            self.scan_raw_body(&name);
        }
    }

    /// Keep everything up to `</name` as one `TagBody` token.
    fn scan_raw_body(&mut self, name: &str) {
        let start = self.offset();
        let end = find_raw_end(&self.source[start..], name).map_or(self.source.len(), |i| start + i);
        while self.offset() < end {
            self.accept();
        }
        if !self.buffer.is_empty() {
            self.emit(TokenKind::TagBody);
        }
    }

    fn scan_end_tag(&mut self, c: char) {
        match c {
            '>' => {
                let start = self.top_start();
                self.advance();
                self.emit_from(TokenKind::TagEnd, start);
                self.pop_state();
            }
            c if c.is_whitespace() => self.advance(),
            _ => self.accept(),
        }
    }

    fn open_expr(&mut self) {
        self.push_state(State::Expr);
        self.depth = 1;
        self.expr_quote = None;
        self.advance();
    }

    /// Braces inside string literals do not count towards the depth.
    fn scan_expr(&mut self, c: char) {
        if let Some(quote) = self.expr_quote {
            let closes = c == quote && !self.ends_with_escape();
            self.accept();
            if closes {
                self.expr_quote = None;
            }
            return;
        }
        match c {
            '\'' | '"' | '`' => {
                self.expr_quote = Some(c);
                self.accept();
            }
            '{' => {
                self.depth += 1;
                self.accept();
            }
            '}' if self.depth <= 1 => {
                let start = self.top_start();
                self.advance();
                self.emit_from(TokenKind::Expression, start);
                self.depth = 0;
                self.pop_state();
                // An attribute expression resumes the tag.
                if self.state() == State::Equals {
                    self.unwind_to(State::InTag);
                }
            }
            '}' => {
                self.depth -= 1;
                self.accept();
            }
            _ => self.accept(),
        }
    }

    fn scan_text(&mut self, c: char) {
        if c == '<' || c == '{' {
            self.emit(TokenKind::Text);
            self.pop_state();
        } else {
            self.accept();
        }
    }

    fn scan_comment(&mut self, c: char) {
        if c == '-' && self.peek_at(1) == Some('-') && self.peek_at(2) == Some('>') {
            let start = self.top_start();
            self.advance_n(3);
            self.emit_from(TokenKind::Comment, start);
            self.pop_state();
        } else {
            self.accept();
        }
    }

    // --- End-of-input recovery ---

    /// Resolve the frames left open when input runs out.
    ///
    /// Comments and text are flushed. Tag and expression frames are dropped
    /// and the outermost of their start positions becomes the rollback point:
    /// the source from there on is re-emitted as literal text. Any other frame
    /// makes the input unparsable.
    fn recover(&mut self) -> Result<(), LexerError> {
        let mut rollback: Option<Mark> = None;

        while self.stack.len() > 1 {
            let Some(frame) = self.stack.last().copied() else {
                break;
            };
            match frame.state {
                State::OpenComment => {
                    self.emit_from(TokenKind::Comment, frame.start);
                }
                State::Text => {
                    self.emit(TokenKind::Text);
                }
                State::OpenTagStart | State::TagName | State::InTag | State::Expr => {
                    debug!(state = ?frame.state, offset = frame.start.offset, "discarding unterminated frame");
                    rollback = Some(frame.start);
                }
                state => {
                    return Err(LexerError::UnparsableInput {
                        message: format!("input ends inside {}", describe(state)),
                        offset: frame.start.offset,
                        line: frame.start.line,
                        column: frame.start.column,
                    });
                }
            }
            self.stack.pop();
        }

        self.reset_buffer();
        if let Some(at) = rollback {
            // Partial tag tokens are superseded by the literal text.
            self.tokens.retain(|token| token.span.start < at.offset);
            let span = Span::new(at.offset, self.source.len(), at.line, at.column);
            self.tokens
                .push(Token::new(TokenKind::Text, &self.source[at.offset..], span));
        }
        Ok(())
    }

    // --- Helpers ---

    fn state(&self) -> State {
        self.stack.last().map_or(State::Init, |frame| frame.state)
    }

    fn push_state(&mut self, state: State) {
        trace!(?state, offset = self.offset(), "push");
        let start = self.mark();
        self.stack.push(Frame { state, start });
    }

    fn pop_state(&mut self) {
        if self.stack.len() > 1 {
            let frame = self.stack.pop();
            trace!(state = ?frame.map(|f| f.state), offset = self.offset(), "pop");
        }
    }

    /// Pop frames until `state` is on top (the base frame is never popped).
    fn unwind_to(&mut self, state: State) {
        while self.stack.len() > 1 && self.state() != state {
            self.stack.pop();
        }
    }

    fn top_start(&self) -> Mark {
        self.stack.last().map_or_else(|| self.mark(), |frame| frame.start)
    }

    fn emit_open_tag(&mut self) -> usize {
        let start = self
            .stack
            .iter()
            .rev()
            .find(|frame| frame.state == State::OpenTagStart)
            .map_or_else(|| self.top_start(), |frame| frame.start);
        let index = self.emit_from(TokenKind::TagNameOpen, start);
        self.open_tag = Some(index);
        index
    }

    /// Emit the buffer as a token starting where the buffer started.
    fn emit(&mut self, kind: TokenKind) -> usize {
        let start = self.buffer_start.unwrap_or_else(|| self.mark());
        self.emit_from(kind, start)
    }

    /// Emit the buffer as a token spanning from `start` to the cursor.
    fn emit_from(&mut self, kind: TokenKind, start: Mark) -> usize {
        let content = std::mem::take(&mut self.buffer);
        self.buffer_start = None;
        let span = Span::new(start.offset, self.offset(), start.line, start.column);
        self.tokens.push(Token::new(kind, content, span));
        self.tokens.len() - 1
    }

    /// Move the current character into the buffer.
    fn accept(&mut self) {
        if let Some(c) = self.current() {
            if self.buffer.is_empty() {
                self.buffer_start = Some(self.mark());
            }
            self.buffer.push(c);
            self.advance();
        }
    }

    fn reset_buffer(&mut self) {
        self.buffer.clear();
        self.buffer_start = None;
    }

    fn is_escaped(&self) -> bool {
        self.options.quote_escapes && self.ends_with_escape()
    }

    /// The buffer ends in an odd run of backslashes.
    fn ends_with_escape(&self) -> bool {
        self.buffer.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
    }

    fn current(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map_or(self.source.len(), |&(offset, _)| offset)
    }

    fn mark(&self) -> Mark {
        Mark {
            offset: self.offset(),
            line: self.line,
            column: self.column,
        }
    }

    fn advance(&mut self) {
        if let Some(&(_, c)) = self.chars.get(self.pos) {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }
}

fn describe(state: State) -> &'static str {
    match state {
        State::Attr => "an attribute name",
        State::Equals => "an attribute assignment",
        State::Value => "an attribute value",
        State::CloseTag => "a tag close",
        State::EndTag => "a closing tag",
        State::Init
        | State::OpenTagStart
        | State::TagName
        | State::InTag
        | State::Expr
        | State::Text
        | State::OpenComment => "markup",
    }
}

/// Byte index of the `</name` that ends a raw-text body.
fn find_raw_end(rest: &str, name: &str) -> Option<usize> {
    rest.match_indices("</").map(|(i, _)| i).find(|&i| {
        let after = &rest[i + 2..];
        after
            .get(..name.len())
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name))
            && after[name.len()..]
                .chars()
                .next()
                .map_or(true, |c| c == '>' || c.is_whitespace())
    })
}

/// Concatenate runs of adjacent `Text` tokens, keeping the first position.
fn merge_text_tokens(tokens: Vec<Token>) -> Vec<Token> {
    let mut merged: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match merged.last_mut() {
            Some(prev) if prev.kind == TokenKind::Text && token.kind == TokenKind::Text => {
                prev.content.push_str(&token.content);
                prev.span.end = token.span.end;
            }
            _ => merged.push(token),
        }
    }
    merged
}
