//! Recording executor standing in for the fleet in tests.

use remote_exec::{ExecError, RemoteExecutor, RemotePath};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Exec(Vec<String>),
    Copy(PathBuf, String),
}

/// What a scan saw on disk when it was dispatched.
#[derive(Debug, Clone)]
pub(crate) struct ScanSeen {
    pub module: String,
    pub input: String,
    pub input_contents: Option<String>,
}

/// Writes canned JSON to the `-oA` path of every scan; `[]` unless told otherwise.
#[derive(Debug, Default)]
pub(crate) struct StubFleet {
    outputs: HashMap<String, String>,
    silent: HashSet<String>,
    fail_at: Option<usize>,
    calls: RefCell<Vec<Call>>,
    seen: RefCell<Vec<ScanSeen>>,
}

impl StubFleet {
    pub fn new() -> Self {
        StubFleet::default()
    }

    pub fn with_output(mut self, module: &str, json: &str) -> Self {
        self.outputs.insert(module.to_string(), json.to_string());
        self
    }

    pub fn without_output(mut self, module: &str) -> Self {
        self.silent.insert(module.to_string());
        self
    }

    /// Fail the n-th call (0-based, exec and copy counted together).
    pub fn failing_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn scan_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Exec(args) if args.first().map(String::as_str) == Some("scan") => Some(args),
                _ => None,
            })
            .collect()
    }

    pub fn scanned_modules(&self) -> Vec<String> {
        self.seen.borrow().iter().map(|s| s.module.clone()).collect()
    }

    pub fn seen(&self) -> Vec<ScanSeen> {
        self.seen.borrow().clone()
    }

    fn record(&self, call: Call) -> Result<(), ExecError> {
        let index = {
            let mut calls = self.calls.borrow_mut();
            calls.push(call);
            calls.len() - 1
        };
        if self.fail_at == Some(index) {
            return Err(ExecError::Spawn {
                program: "axiom".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "stub failure"),
            });
        }
        Ok(())
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).map(String::as_str)
}

impl RemoteExecutor for StubFleet {
    fn exec(&self, args: &[String]) -> Result<(), ExecError> {
        self.record(Call::Exec(args.to_vec()))?;
        if args.first().map(String::as_str) != Some("scan") {
            return Ok(());
        }
        let module = flag_value(args, "-m").unwrap_or_default().to_string();
        let input = args.get(1).cloned().unwrap_or_default();
        let input_contents = fs::read_to_string(&input).ok();
        self.seen.borrow_mut().push(ScanSeen { module: module.clone(), input, input_contents });
        if self.silent.contains(&module) {
            return Ok(());
        }
        if let Some(out) = flag_value(args, "-oA") {
            let json = self.outputs.get(&module).map(String::as_str).unwrap_or("[]");
            fs::write(Path::new(out), json).map_err(|source| ExecError::Spawn { program: "axiom".to_string(), source })?;
        }
        Ok(())
    }

    fn copy(&self, src: &Path, dest: &RemotePath) -> Result<(), ExecError> {
        self.record(Call::Copy(src.to_path_buf(), dest.to_string()))
    }
}
