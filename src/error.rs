use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MgsError {
    #[error("unparsable result type: {tool_type} (files: {schema})")]
    UnparsableResultType { tool_type: String, schema: String },

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("format mismatch: {0}")]
    FormatMismatch(String),

    #[error("key not found: {0}")]
    KeyLookup(String),

    #[error("invalid number {value:?}: {reason}")]
    InvalidNumber { value: String, reason: String },

    #[error("failed to decode JSON: {0}")]
    Json(String),

    #[error("result file name must look like <sample>.<result_type>.<role>: {0}")]
    InvalidResultFileName(String),

    #[error(
        "no authentication token available (pass --auth-token or run `metagenscope login --save`)"
    )]
    MissingAuthentication,

    #[error("MetaGenScope request failed: {0}")]
    Http(String),

    #[error("MetaGenScope returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response from MetaGenScope: {0}")]
    UnexpectedResponse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to parse metadata: {0}")]
    MetadataParse(String),

    #[error("failed to start upload workers: {0}")]
    WorkerPool(String),

    #[error("sample has not been created in this session: {0}")]
    UnknownSample(String),
}

impl From<csv::Error> for MgsError {
    fn from(err: csv::Error) -> Self {
        MgsError::Filesystem(err.to_string())
    }
}
