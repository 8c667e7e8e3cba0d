use std::path::PathBuf;
use thiserror::Error;

/// The five failure families a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The tokenizer could not classify the input.
    Lexical,
    /// The input could not be mapped onto key paths (nesting, separators, includes).
    Structural,
    /// A `${...}` reference could not be resolved.
    Resolution,
    /// A string could not be coerced into the requested type.
    Conversion,
    /// A structured target could not be populated.
    Binding,
}

#[derive(Debug, Error)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum ConfigError {
    #[error("Lexical error at line {line}: {reason}")]
    Lexical { line: usize, reason: String },

    #[error("Structural error at line {line}: {reason}")]
    Structural { line: usize, reason: String },

    #[error("Failed to include '{href}': {reason}")]
    Include { href: String, reason: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unresolved reference '${{{reference}}}'")]
    UnresolvedReference { reference: String },

    #[error("Reference cycle detected at '{key}'")]
    ReferenceCycle { key: String },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Cannot convert '{value}' to {target}: {reason}")]
    Conversion {
        value: String,
        target: String,
        reason: String,
    },

    #[error("Cannot bind {target}: {reason}")]
    Binding { target: String, reason: String },

    #[error("Unsupported resource type '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid service catalog: {0}")]
    InvalidCatalog(String),

    #[error("Cannot marshal value: {0}")]
    Marshal(String),

    #[error("No configuration source: call .resource(), .source_str() or .app_name() first")]
    NoSource,
}

impl ConfigError {
    pub(crate) fn lexical(line: usize, reason: impl Into<String>) -> Self {
        ConfigError::Lexical {
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn structural(line: usize, reason: impl Into<String>) -> Self {
        ConfigError::Structural {
            line,
            reason: reason.into(),
        }
    }

    /// Classify this error into one of the five failure families.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Lexical { .. } => ErrorKind::Lexical,
            ConfigError::Structural { .. }
            | ConfigError::Include { .. }
            | ConfigError::Io { .. }
            | ConfigError::UnsupportedFormat(_)
            | ConfigError::NoSource => ErrorKind::Structural,
            ConfigError::UnresolvedReference { .. }
            | ConfigError::ReferenceCycle { .. }
            | ConfigError::KeyNotFound(_) => ErrorKind::Resolution,
            ConfigError::Conversion { .. } | ConfigError::Marshal(_) => ErrorKind::Conversion,
            ConfigError::Binding { .. } | ConfigError::InvalidCatalog(_) => ErrorKind::Binding,
        }
    }

    /// Line number of the offending input, when the error came from a parser.
    pub fn line(&self) -> Option<usize> {
        match self {
            ConfigError::Lexical { line, .. } | ConfigError::Structural { line, .. } => Some(*line),
            _ => None,
        }
    }
}
