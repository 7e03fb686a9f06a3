//! Dispatch of commands and files to a remote scanning fleet through the axiom CLI.

use fleetrecon_core::FleetName;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with status {status}")]
    Status { program: String, status: ExitStatus },
}

/// A `<fleet>:<path>` destination understood by the fleet copy tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    pub fleet: FleetName,
    pub path: String,
}

impl RemotePath {
    /// Path relative to the home directory of every fleet instance.
    pub fn home(fleet: &FleetName, file_name: &str) -> Self {
        RemotePath { fleet: fleet.clone(), path: format!("~/{}", file_name) }
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.fleet, self.path)
    }
}

/// Runs operations against the remote fleet. Every call blocks until the remote side is done.
pub trait RemoteExecutor {
    /// Run the dispatcher with `args`; succeeds only on a zero exit status.
    fn exec(&self, args: &[String]) -> Result<(), ExecError>;
    /// Copy a local file to `dest` on the fleet.
    fn copy(&self, src: &Path, dest: &RemotePath) -> Result<(), ExecError>;
}

impl<E: RemoteExecutor + ?Sized> RemoteExecutor for &E {
    fn exec(&self, args: &[String]) -> Result<(), ExecError> {
        (**self).exec(args)
    }
    fn copy(&self, src: &Path, dest: &RemotePath) -> Result<(), ExecError> {
        (**self).copy(src, dest)
    }
}

impl<E: RemoteExecutor + ?Sized> RemoteExecutor for Box<E> {
    fn exec(&self, args: &[String]) -> Result<(), ExecError> {
        (**self).exec(args)
    }
    fn copy(&self, src: &Path, dest: &RemotePath) -> Result<(), ExecError> {
        (**self).copy(src, dest)
    }
}

/// Executor backed by the `axiom` and `axiom-scp` binaries.
#[derive(Debug, Clone)]
pub struct Axiom {
    pub bin: PathBuf,
    pub scp_bin: PathBuf,
}

impl Default for Axiom {
    fn default() -> Self {
        Axiom { bin: PathBuf::from("axiom"), scp_bin: PathBuf::from("axiom-scp") }
    }
}

impl Axiom {
    pub fn new(bin: impl Into<PathBuf>, scp_bin: impl Into<PathBuf>) -> Self {
        Axiom { bin: bin.into(), scp_bin: scp_bin.into() }
    }

    /// The command [`RemoteExecutor::exec`] runs for `args`.
    pub fn exec_command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args);
        cmd
    }

    /// The command [`RemoteExecutor::copy`] runs.
    pub fn copy_command(&self, src: &Path, dest: &RemotePath) -> Command {
        let mut cmd = Command::new(&self.scp_bin);
        cmd.arg(src).arg(dest.to_string());
        cmd
    }
}

impl RemoteExecutor for Axiom {
    fn exec(&self, args: &[String]) -> Result<(), ExecError> {
        run_streaming(self.exec_command(args))
    }

    fn copy(&self, src: &Path, dest: &RemotePath) -> Result<(), ExecError> {
        run_streaming(self.copy_command(src, dest))
    }
}

/// Run with stdout/stderr inherited so the tool's output reaches the console as it is produced.
fn run_streaming(mut cmd: Command) -> Result<(), ExecError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!(command = %command_line(&cmd), "running");
    cmd.stdin(Stdio::null()).stdout(Stdio::inherit()).stderr(Stdio::inherit());
    let status = cmd
        .status()
        .map_err(|source| ExecError::Spawn { program: program.clone(), source })?;
    if !status.success() {
        return Err(ExecError::Status { program, status });
    }
    Ok(())
}

/// Space-joined program and arguments, for logs and dry runs.
pub fn command_line(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Arguments that provision (or reuse) the named fleet.
pub fn fleet_args(fleet: &FleetName, instances: Option<u32>) -> Vec<String> {
    let mut args = vec!["fleet".to_string(), fleet.0.clone()];
    if let Some(n) = instances {
        args.push("-i".to_string());
        args.push(n.to_string());
    }
    args
}

/// Arguments for one distributed scan:
/// `scan <input> -m <module> -oA <output> -f <fleet> [extra...]`.
pub fn scan_args(input: &str, module: &str, output: &Path, fleet: &FleetName, extra: &[String]) -> Vec<String> {
    let mut args = vec![
        "scan".to_string(),
        input.to_string(),
        "-m".to_string(),
        module.to_string(),
        "-oA".to_string(),
        output.to_string_lossy().into_owned(),
        "-f".to_string(),
        fleet.0.clone(),
    ];
    args.extend(extra.iter().cloned());
    args
}
