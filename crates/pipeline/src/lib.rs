//! Stage table, stage runner and per-target controller of the recon pipeline.

mod controller;
mod error;
mod runner;
mod stage;
#[cfg(test)]
mod stub;

pub use controller::{Invocation, Pipeline, PipelineOptions};
pub use error::PipelineError;
pub use runner::{run_stage, StageOutcome};
pub use stage::{default_stages, StageInput, StageSpec, DEFAULT_TEMPLATES_DIR};
