//! Error types for mdbase.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for base materialization.
#[derive(Error, Debug)]
pub enum BaseError {
    #[error("Failed to read base file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid YAML in base file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Shape(String),

    #[error("Failed to parse expression `{source_text}`: {message}")]
    ExprParse {
        source_text: String,
        message: String,
    },

    #[error("{0}")]
    Eval(String),

    #[error("Circular formula reference detected for \"{0}\"")]
    FormulaCycle(String),

    #[error("Cannot format value: {0}")]
    Format(String),

    #[error("Vault not found at: {}", .0.display())]
    VaultNotFound(PathBuf),

    #[error(
        "Could not locate a vault root: no ancestor of {} contains a .obsidian directory. \
         Pass --vault to point at the vault explicitly.",
        .0.display()
    )]
    VaultUndiscoverable(PathBuf),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),

    /// Filter evaluation failed; `context` names the filter subject.
    #[error("Failed to process {context}")]
    FilterContext {
        context: String,
        #[source]
        source: Box<BaseError>,
    },

    /// Formula evaluation failed; wraps the failing formula name.
    #[error("Failed to evaluate formula \"{name}\"")]
    FormulaContext {
        name: String,
        #[source]
        source: Box<BaseError>,
    },

    /// Column evaluation failed for one file.
    #[error("Failed to evaluate property \"{key}\" for file \"{file}\"")]
    ColumnContext {
        key: String,
        file: String,
        #[source]
        source: Box<BaseError>,
    },
}

impl BaseError {
    /// Shorthand for a runtime type error.
    pub fn type_error(message: impl Into<String>) -> Self {
        BaseError::Eval(format!("TypeError: {}", message.into()))
    }

    /// Shorthand for an unresolved-identifier error.
    pub fn reference_error(name: &str) -> Self {
        BaseError::Eval(format!("ReferenceError: {} is not defined", name))
    }

    /// Render the full cause chain, outermost first, separated by
    /// blank lines. This is what the CLI prints on failure.
    pub fn render_chain(&self) -> String {
        let mut parts = vec![self.to_string()];
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            parts.push(err.to_string());
            cause = err.source();
        }
        parts.join("\n\n")
    }
}

/// Result type alias for base materialization.
pub type Result<T> = std::result::Result<T, BaseError>;
