//! Error types for loading and resolving model packages.
//!
//! Covers I/O and serialization failures, unsupported input files, inheritance
//! failures and strict-mode validation.

use std::path::PathBuf;

use matter_model_core::{Diagnostic, InheritError};
use thiserror::Error;

/// Errors that can occur while loading or resolving a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// The file extension is neither JSON nor YAML.
    #[error("unsupported model file: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// A derived cluster could not be merged with its base.
    #[error("inheritance failed: {0}")]
    Inherit(#[from] InheritError),

    /// Strict mode found problems in the resolved package.
    #[error("{} validation problem(s), first: {}", .0.len(), first_diagnostic(.0))]
    Validation(Vec<Diagnostic>),

    /// All configured loader sources failed.
    #[error("no model sources available")]
    NoSourcesAvailable,
}

fn first_diagnostic(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// Convenience alias for results with [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;
