//! Error types for salsa2lp-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration or the overrides file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with file path and serde_yaml line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A line of the overrides file is not a `<package> <group>` pair.
    #[error("malformed overrides entry at {path}:{line}: {content:?}")]
    Overrides {
        path: PathBuf,
        line: usize,
        content: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration value for `{field}`: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

/// Errors raised by a [`crate::tool::ToolRunner`].
///
/// A nonzero exit status is not an error here; callers inspect
/// [`crate::tool::ToolOutput`] and decide.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program could not be started (usually: not installed).
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on or reading from the child failed.
    #[error("I/O error while running `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The shared cancel flag was raised; the child has been killed.
    #[error("`{program}` was cancelled")]
    Cancelled { program: String },
}
