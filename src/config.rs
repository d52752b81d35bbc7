use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_DELIMITER: &str = "-";
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Settings shared by the decoder and the describer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Joins a struct-dict path to its child key (`parent-child`).
    pub delimiter: String,
    /// Deepest schema nesting either direction will walk.
    pub max_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CodecConfig {
    pub fn with_delimiter(delimiter: impl Into<String>) -> Self {
        Self { delimiter: delimiter.into(), ..Self::default() }
    }

    /// The delimiter must be non-empty and bracket-free, or it would collide
    /// with the `[index]` part of the key grammar.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }
        if self.delimiter.contains(|c: char| c == '[' || c == ']') {
            return Err(ConfigError::BracketDelimiter(self.delimiter.clone()));
        }
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        Ok(())
    }

    /// `parent + delimiter + key`
    pub fn child_path(&self, parent: &str, key: &str) -> String {
        format!("{parent}{}{key}", self.delimiter)
    }

    /// Last delimiter-separated segment of `path`.
    pub fn display_name<'p>(&self, path: &'p str) -> &'p str {
        path.rsplit(self.delimiter.as_str()).next().unwrap_or(path)
    }
}

/// `parent + "[" + index + "]"`
pub fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}
