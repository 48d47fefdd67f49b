//! Error types for the command-line front end.

use pageaudit::AuditError;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;
