//! Error types for the ConeFold CLI.

use thiserror::Error;

/// CLI result type alias.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error type.
#[derive(Error, Debug)]
pub enum CliError {
    /// Failure reported by the solver library, including TOML parse errors.
    #[error("{0}")]
    Fold(#[from] conefold::FoldError),

    /// IO error while reading the config or writing the dump.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure to read a configuration file.
    #[error("Cannot read config '{path}': {source}")]
    ConfigFile {
        /// Path given on the command line.
        path: String,
        /// Underlying read error.
        source: std::io::Error,
    },

    /// Invalid command-line argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Progress bar template error.
    #[error("Progress style error: {0}")]
    Progress(String),
}

impl From<indicatif::style::TemplateError> for CliError {
    fn from(e: indicatif::style::TemplateError) -> Self {
        CliError::Progress(e.to_string())
    }
}
