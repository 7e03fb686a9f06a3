use crate::error::PipelineError;
use crate::runner::{run_stage, stage_scan_args, StageOutcome};
use crate::stage::{default_stages, StageInput, StageSpec};
use fleetrecon_core::{FleetName, Target};
use remote_exec::{fleet_args, RemoteExecutor, RemotePath};
use report_transform::Projection;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub out_dir: PathBuf,
    pub fleet: FleetName,
    /// Instance count passed when provisioning the fleet; the dispatcher's default if `None`.
    pub instances: Option<u32>,
    /// Local config file per tool module, distributed to the fleet before the first scan.
    pub configs: BTreeMap<String, PathBuf>,
    /// Write each target into its own subdirectory of `out_dir`.
    pub split_by_target: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            out_dir: PathBuf::from("output"),
            fleet: FleetName::default(),
            instances: None,
            configs: BTreeMap::new(),
            split_by_target: false,
        }
    }
}

/// One remote operation of a target run, as listed by [`Pipeline::plan`]. The executor
/// decides which program carries it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Exec(Vec<String>),
    Copy { src: PathBuf, dest: RemotePath },
}

/// A config file bound for the fleet and the flag its stage receives afterwards.
struct ConfigCopy<'a> {
    module: &'a str,
    src: &'a Path,
    dest: RemotePath,
    flag: String,
}

/// Runs the ordered stage list for one target at a time against a single fleet.
pub struct Pipeline<E> {
    executor: E,
    options: PipelineOptions,
    stages: Vec<StageSpec>,
}

impl<E: RemoteExecutor> Pipeline<E> {
    pub fn new(executor: E, options: PipelineOptions, stages: Vec<StageSpec>) -> Self {
        Pipeline { executor, options, stages }
    }

    /// Pipeline with the standard enumeration, nuclei, nmap and gowitness stages.
    pub fn with_default_stages(executor: E, options: PipelineOptions, templates_dir: &str) -> Self {
        Self::new(executor, options, default_stages(templates_dir))
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Directory the reports of `target` are written to.
    pub fn output_dir(&self, target: &Target) -> PathBuf {
        if self.options.split_by_target {
            self.options.out_dir.join(dir_name(&target.0))
        } else {
            self.options.out_dir.clone()
        }
    }

    /// Run every stage for `target`, in order. The first error aborts the target: no later
    /// stage is dispatched and no later report is written.
    pub fn run_target(&self, target: &Target) -> Result<Vec<StageOutcome>, PipelineError> {
        self.run_target_with(target, |_| {})
    }

    /// Like [`run_target`](Self::run_target), calling `on_stage` as soon as each stage's report
    /// is written. Stages finished before an abort have already been reported when the error
    /// is returned.
    pub fn run_target_with<F>(&self, target: &Target, mut on_stage: F) -> Result<Vec<StageOutcome>, PipelineError>
    where
        F: FnMut(&StageOutcome),
    {
        let projections = self.validate()?;

        let out_dir = self.output_dir(target);
        fs::create_dir_all(&out_dir).map_err(|source| PipelineError::OutputDir { path: out_dir.clone(), source })?;

        let fleet = &self.options.fleet;
        info!(%fleet, %target, "starting fleet");
        self.executor
            .exec(&fleet_args(fleet, self.options.instances))
            .map_err(|source| PipelineError::Fleet { fleet: fleet.0.clone(), source })?;

        let flags = self.distribute_configs()?;

        let mut reports: HashMap<&str, PathBuf> = HashMap::new();
        let mut outcomes = Vec::with_capacity(self.stages.len());
        for (stage, projection) in self.stages.iter().zip(&projections) {
            let input = match &stage.input {
                StageInput::Target => target.0.clone(),
                StageInput::Report(name) => {
                    let path = reports.get(name.as_str()).ok_or_else(|| PipelineError::UnknownStage {
                        stage: stage.name.clone(),
                        input: name.clone(),
                    })?;
                    if !path.is_file() {
                        return Err(PipelineError::MissingInput { stage: stage.name.clone(), path: path.clone() });
                    }
                    path.to_string_lossy().into_owned()
                }
            };
            let flag = flags.get(stage.module.as_str()).map(String::as_str);
            let outcome = run_stage(&self.executor, fleet, stage, projection, &input, &out_dir, flag)?;
            reports.insert(stage.name.as_str(), outcome.report.clone());
            on_stage(&outcome);
            outcomes.push(outcome);
        }
        info!(%target, stages = outcomes.len(), "target complete");
        Ok(outcomes)
    }

    /// Parse every projection and check report references point backwards, before anything
    /// is dispatched.
    fn validate(&self) -> Result<Vec<Projection>, PipelineError> {
        let mut projections = Vec::with_capacity(self.stages.len());
        for (i, stage) in self.stages.iter().enumerate() {
            let projection = stage
                .projection
                .parse::<Projection>()
                .map_err(|source| PipelineError::Projection { stage: stage.name.clone(), source })?;
            if let StageInput::Report(name) = &stage.input {
                if !self.stages[..i].iter().any(|s| &s.name == name) {
                    return Err(PipelineError::UnknownStage { stage: stage.name.clone(), input: name.clone() });
                }
            }
            projections.push(projection);
        }
        Ok(projections)
    }

    /// Config files to distribute: one per module that has both a supplied file and a
    /// config-aware stage. The flag names the copied file by its base name only.
    fn config_copies(&self) -> Result<Vec<ConfigCopy<'_>>, PipelineError> {
        let mut copies: Vec<ConfigCopy<'_>> = Vec::new();
        for stage in &self.stages {
            let (Some(prefix), Some(path)) = (&stage.config_flag, self.options.configs.get(&stage.module)) else {
                continue;
            };
            if copies.iter().any(|c| c.module == stage.module) {
                continue;
            }
            let name = file_name(path)?;
            copies.push(ConfigCopy {
                module: &stage.module,
                src: path,
                dest: RemotePath::home(&self.options.fleet, &name),
                flag: format!("{}{}", prefix, name),
            });
        }
        for module in self.options.configs.keys() {
            if !copies.iter().any(|c| c.module == module) {
                warn!(%module, "config supplied for a module without a config-aware stage; ignored");
            }
        }
        Ok(copies)
    }

    /// Copy the configs to the fleet and return the flag per module.
    fn distribute_configs(&self) -> Result<HashMap<&str, String>, PipelineError> {
        let mut flags = HashMap::new();
        for copy in self.config_copies()? {
            info!(module = copy.module, src = %copy.src.display(), dest = %copy.dest, "distributing config");
            self.executor
                .copy(copy.src, &copy.dest)
                .map_err(|source| PipelineError::ConfigCopy { path: copy.src.to_path_buf(), source })?;
            flags.insert(copy.module, copy.flag);
        }
        Ok(flags)
    }

    /// Remote invocations `run_target` would make for `target`, in order. Nothing is executed
    /// and nothing is written.
    pub fn plan(&self, target: &Target) -> Result<Vec<Invocation>, PipelineError> {
        self.validate()?;
        let out_dir = self.output_dir(target);
        let fleet = &self.options.fleet;
        let mut plan = vec![Invocation::Exec(fleet_args(fleet, self.options.instances))];

        let mut flags: HashMap<&str, String> = HashMap::new();
        for copy in self.config_copies()? {
            plan.push(Invocation::Copy { src: copy.src.to_path_buf(), dest: copy.dest });
            flags.insert(copy.module, copy.flag);
        }

        let mut reports: HashMap<&str, PathBuf> = HashMap::new();
        for stage in &self.stages {
            let input = match &stage.input {
                StageInput::Target => target.0.clone(),
                StageInput::Report(name) => reports
                    .get(name.as_str())
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            let flag = flags.get(stage.module.as_str()).map(String::as_str);
            plan.push(Invocation::Exec(stage_scan_args(stage, &input, &out_dir, fleet, flag)));
            reports.insert(stage.name.as_str(), out_dir.join(&stage.report_file));
        }
        Ok(plan)
    }
}

fn file_name(path: &Path) -> Result<String, PipelineError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| PipelineError::ConfigName(path.to_path_buf()))
}

/// Target rendered as a single safe path component.
fn dir_name(target: &str) -> String {
    let name: String = target
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if name.is_empty() || name.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        name
    }
}
