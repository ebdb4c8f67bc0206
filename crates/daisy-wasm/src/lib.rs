//! WASM bindings for the Daisy template compiler.
//!
//! Exposes `compile()`, `compileWith()` and `tokenize()` to JavaScript via
//! wasm-bindgen. The AST and tokens are handed over as plain JS objects;
//! failures are thrown as `Error` objects carrying `line`, `column` and
//! `offset` properties.

use daisy_lexer::{LexerError, Scanner};
use daisy_parser::{ParseError, Parser, ParserOptions, Program};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Compile template source to its AST with default options.
///
/// Returns `{ body: Node[] }`. Throws if tokenizing or parsing fails.
#[wasm_bindgen]
pub fn compile(source: &str) -> Result<JsValue, JsValue> {
    let program = compile_program(source, &ParserOptions::default()).map_err(|e| to_js_error(&e))?;
    to_js(&program)
}

/// Compile with options such as `{ void_elements: ["br"], quote_escapes: false }`.
/// Missing fields keep their defaults.
#[wasm_bindgen(js_name = compileWith)]
pub fn compile_with(source: &str, options: JsValue) -> Result<JsValue, JsValue> {
    let options: ParserOptions = if options.is_undefined() || options.is_null() {
        ParserOptions::default()
    } else {
        serde_wasm_bindgen::from_value(options)
            .map_err(|e| JsValue::from(js_sys::Error::new(&format!("Invalid options: {e}"))))?
    };
    let program = compile_program(source, &options).map_err(|e| to_js_error(&e))?;
    to_js(&program)
}

/// Tokenize template source. Returns the token array, ending in `EndOfInput`.
#[wasm_bindgen]
pub fn tokenize(source: &str) -> Result<JsValue, JsValue> {
    let tokens = Scanner::tokenize(source).map_err(|e| to_js_error(&ParseError::from(e)))?;
    to_js(&tokens)
}

/// Get the compiler version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn compile_program(source: &str, options: &ParserOptions) -> Result<Program, ParseError> {
    Parser::parse_with(source, options)
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    // Maps become plain objects so `directives.click` works on the JS side.
    let serializer = serde_wasm_bindgen::Serializer::new().serialize_maps_as_objects(true);
    value
        .serialize(&serializer)
        .map_err(|e| JsValue::from(js_sys::Error::new(&e.to_string())))
}

/// Position details attached to a thrown error.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Diagnostic {
    kind: &'static str,
    message: String,
    line: usize,
    column: usize,
    offset: usize,
}

impl Diagnostic {
    fn from_error(err: &ParseError) -> Self {
        let kind = match err {
            ParseError::Lexer(LexerError::UnparsableInput { .. }) => "UnparsableInput",
            ParseError::Syntax { .. } => "SyntaxError",
            ParseError::Expression { .. } => "ExpressionSyntaxError",
        };
        Self {
            kind,
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
            offset: err.offset(),
        }
    }

    /// Numeric properties set on the thrown JS error.
    fn properties(&self) -> [(&'static str, u32); 3] {
        [
            ("line", self.line as u32),
            ("column", self.column as u32),
            ("offset", self.offset as u32),
        ]
    }
}

fn to_js_error(err: &ParseError) -> JsValue {
    match build_js_error(&Diagnostic::from_error(err)) {
        Ok(js_err) | Err(js_err) => js_err,
    }
}

fn build_js_error(diagnostic: &Diagnostic) -> Result<JsValue, JsValue> {
    let js_err = js_sys::Error::new(&diagnostic.message);
    js_err.set_name(diagnostic.kind);

    for (key, value) in diagnostic.properties() {
        js_sys::Reflect::set(&js_err, &key.into(), &JsValue::from(value)).map_err(|_| {
            JsValue::from(js_sys::Error::new(&format!(
                "Failed to set {key} property on: {}",
                diagnostic.message
            )))
        })?;
    }
    Ok(js_err.into())
}
