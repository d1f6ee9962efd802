//! Error types for the suite runtime.

use std::path::PathBuf;
use verdict_kernel::KernelError;

/// Declaration errors surfaced by [`crate::Scope`] and [`crate::Suite::run`].
///
/// Check failures never show up here; they become failed tests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SuiteError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("test field name must not be empty")]
    EmptyFieldName,

    #[error("group name must not be empty")]
    EmptyGroupName,

    /// Raised by the suite callback itself.
    #[error("declaration failed: {0}")]
    Declaration(String),
}

impl SuiteError {
    pub fn declaration(message: impl Into<String>) -> Self {
        Self::Declaration(message.into())
    }
}

/// Errors reading or writing a suite dump.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("unsupported dump schema: expected {expected}, found {found}")]
    Schema {
        expected: &'static str,
        found: String,
    },

    #[error("dump root must be a suite isolate")]
    RootNotSuite,

    #[error("suite isolate nested below the root")]
    NestedSuite,

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid dump json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors loading a [`crate::SuiteConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid suite config: {0}")]
    ParseToml(#[from] toml::de::Error),
}
