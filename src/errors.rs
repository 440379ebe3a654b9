// src/errors.rs

//! Crate-wide error types and aliases.

use thiserror::Error;

use crate::source::Encoding;

#[derive(Error, Debug)]
pub enum FilerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid build config: {0}")]
    BuildConfig(#[from] BuildConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Cache serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// No builder claims the extension of a file that some build needs.
    #[error("unhandled extension '{extension}' for source file {id}")]
    UnhandledExtension { id: String, extension: String },

    /// A builder was handed contents it cannot compile.
    #[error("builder '{builder}' cannot handle {encoding:?} contents of {id}")]
    UnhandledEncoding {
        id: String,
        encoding: Encoding,
        builder: String,
    },

    #[error("extension '{0}' is already claimed by another builder")]
    DuplicateBuilder(String),

    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("build task failed to complete: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Reasons a set of build configs is rejected.
///
/// Every variant names the offending config so the message is actionable
/// without further context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildConfigError {
    #[error("build config name '{name}' is invalid: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("build config name '{0}' is reserved")]
    ReservedName(String),

    #[error("build config '{0}' is only allowed in dev mode")]
    SystemConfigInProd(String),

    #[error("duplicate build config name '{0}'")]
    DuplicateName(String),

    #[error(
        "build config '{name}' has invalid platform '{platform}' (expected \"node\" or \"browser\")"
    )]
    InvalidPlatform { name: String, platform: String },

    #[error("build config '{name}' has an input path that does not exist: {path}")]
    MissingInput { name: String, path: String },

    #[error("build config '{name}' has an invalid input pattern '{pattern}': {reason}")]
    InvalidPattern {
        name: String,
        pattern: String,
        reason: String,
    },
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FilerError>;
