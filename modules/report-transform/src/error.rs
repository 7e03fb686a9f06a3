use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid projection at byte {offset}: {message}")]
pub struct ProjectionError {
    pub offset: usize,
    pub message: String,
}

impl ProjectionError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        ProjectionError { offset, message: message.into() }
    }
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} contains no JSON values")]
    Empty { path: PathBuf },
    #[error("unexpected structure: {0}")]
    Shape(String),
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}
