//! Compiler options loaded from `daisy.toml`.
//!
//! ```toml
//! quote_escapes = true
//! void_elements = ["br", "hr", "img", "input"]
//! raw_text_elements = ["script", "style"]
//! ```

use daisy_parser::ParserOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Looked up in the current directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "daisy.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load options from an explicit path, or from `daisy.toml` when present.
/// Without either, the defaults apply.
pub fn load(explicit: Option<&Path>) -> Result<ParserOptions, ConfigError> {
    match explicit {
        Some(path) => load_from(path),
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if path.is_file() {
                load_from(path)
            } else {
                Ok(ParserOptions::default())
            }
        }
    }
}

pub fn load_from(path: &Path) -> Result<ParserOptions, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let options = parse(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), ?options, "loaded config");
    Ok(options)
}

pub fn parse(contents: &str) -> Result<ParserOptions, toml::de::Error> {
    toml::from_str(contents)
}

/// Command-line overrides applied on top of the loaded options.
#[derive(Debug, Default)]
pub struct Overrides {
    pub no_quote_escapes: bool,
    pub void_elements: Vec<String>,
}

impl Overrides {
    pub fn apply(self, mut options: ParserOptions) -> ParserOptions {
        if self.no_quote_escapes {
            options.scanner.quote_escapes = false;
        }
        if !self.void_elements.is_empty() {
            options.void_elements = self.void_elements;
        }
        options
    }
}
