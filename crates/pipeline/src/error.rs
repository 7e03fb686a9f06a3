use remote_exec::ExecError;
use report_transform::{ProjectionError, TransformError};
use std::path::PathBuf;
use thiserror::Error;

/// Any of these aborts the current target; nothing is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("creating output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("starting fleet {fleet}: {source}")]
    Fleet {
        fleet: String,
        #[source]
        source: ExecError,
    },
    #[error("config path {0} has no file name")]
    ConfigName(PathBuf),
    #[error("copying {path} to the fleet: {source}")]
    ConfigCopy {
        path: PathBuf,
        #[source]
        source: ExecError,
    },
    #[error("stage {stage}: invalid projection: {source}")]
    Projection {
        stage: String,
        #[source]
        source: ProjectionError,
    },
    #[error("stage {stage} reads the report of {input}, which does not run before it")]
    UnknownStage { stage: String, input: String },
    #[error("stage {stage}: input report {path} does not exist")]
    MissingInput { stage: String, path: PathBuf },
    #[error("removing stale raw output {path}: {source}")]
    StaleOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stage {stage}: {source}")]
    Exec {
        stage: String,
        #[source]
        source: ExecError,
    },
    #[error("stage {stage}: {source}")]
    Transform {
        stage: String,
        #[source]
        source: TransformError,
    },
}
