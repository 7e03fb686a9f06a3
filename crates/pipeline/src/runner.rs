use crate::error::PipelineError;
use crate::stage::StageSpec;
use fleetrecon_core::FleetName;
use remote_exec::{scan_args, RemoteExecutor};
use report_transform::{transform_file, Projection};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

/// Result of one completed stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: String,
    pub raw: PathBuf,
    pub report: PathBuf,
    pub rows: usize,
    pub started_at: String,
    pub duration_ms: u64,
}

/// Dispatcher arguments for `stage`; a distributed config flag goes before the stage's own args.
pub(crate) fn stage_scan_args(
    stage: &StageSpec,
    input: &str,
    out_dir: &Path,
    fleet: &FleetName,
    config_flag: Option<&str>,
) -> Vec<String> {
    let mut extra: Vec<String> = Vec::with_capacity(stage.args.len() + 1);
    if let Some(flag) = config_flag {
        extra.push(flag.to_string());
    }
    extra.extend(stage.args.iter().cloned());
    scan_args(input, &stage.module, &out_dir.join(&stage.raw_file), fleet, &extra)
}

/// Run one stage: dispatch the scan to the fleet, then normalize its raw output.
///
/// The report is only written after the scan has exited successfully, so the raw output always
/// exists before the report does.
pub fn run_stage<E: RemoteExecutor + ?Sized>(
    executor: &E,
    fleet: &FleetName,
    stage: &StageSpec,
    projection: &Projection,
    input: &str,
    out_dir: &Path,
    config_flag: Option<&str>,
) -> Result<StageOutcome, PipelineError> {
    let raw = out_dir.join(&stage.raw_file);
    let report = out_dir.join(&stage.report_file);
    let started_at = now_rfc3339();
    let start = Instant::now();

    // a leftover raw file from an earlier target must not stand in for this scan's output
    match fs::remove_file(&raw) {
        Err(e) if e.kind() != ErrorKind::NotFound => {
            return Err(PipelineError::StaleOutput { path: raw, source: e });
        }
        _ => {}
    }

    info!(stage = %stage.name, module = %stage.module, input, "starting {}", stage.label);
    executor
        .exec(&stage_scan_args(stage, input, out_dir, fleet, config_flag))
        .map_err(|source| PipelineError::Exec { stage: stage.name.clone(), source })?;

    let rows = transform_file(&raw, &report, projection)
        .map_err(|source| PipelineError::Transform { stage: stage.name.clone(), source })?;
    let duration_ms = start.elapsed().as_millis() as u64;
    info!(stage = %stage.name, rows, report = %report.display(), duration_ms, "stage finished");

    Ok(StageOutcome { stage: stage.name.clone(), raw, report, rows, started_at, duration_ms })
}
