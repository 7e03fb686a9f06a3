use anyhow::{anyhow, Context, Result};
use clap::Parser;
use fleetrecon_core::{FleetName, Target};
use pipeline::{Invocation, Pipeline, PipelineOptions, StageOutcome, DEFAULT_TEMPLATES_DIR};
use remote_exec::{command_line, Axiom, RemoteExecutor};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod domains;

#[derive(Debug, Parser)]
#[command(name = "fleetrecon", version, about = "Subdomain, vulnerability, port and screenshot recon dispatched to an axiom fleet")]
struct Cli {
    /// Path to a txt file containing the list of domains and hosts
    #[arg(long, value_name = "FILE")]
    domains: Option<PathBuf>,
    /// Path to a custom Subfinder config file
    #[arg(long, value_name = "FILE")]
    config_subfinder: Option<PathBuf>,
    /// Path to a custom Nuclei config file
    #[arg(long, value_name = "FILE")]
    config_nuclei: Option<PathBuf>,
    /// Output directory [default: output]
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,
    /// Name of the axiom fleet [default: recon-fleet]
    #[arg(long)]
    fleet: Option<String>,
    /// Number of fleet instances to request when starting the fleet
    #[arg(long)]
    instances: Option<u32>,
    /// Nuclei templates directory on the fleet
    #[arg(long, value_name = "DIR")]
    templates: Option<String>,
    /// Write each target's reports into its own subdirectory of the output directory
    #[arg(long, default_value_t = false)]
    split_by_target: bool,
    /// Print the axiom commands that would run, without running anything
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// axiom executable
    #[arg(long, value_name = "PATH")]
    axiom_bin: Option<PathBuf>,
    /// axiom-scp executable
    #[arg(long, value_name = "PATH")]
    axiom_scp_bin: Option<PathBuf>,
    /// Append one JSON line per completed stage to this file
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,
    /// Optional settings file (YAML). If omitted, loads ./fleetrecon.yaml if present.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Effective settings after merging the command line over the settings file over defaults.
#[derive(Debug)]
struct Settings {
    domains: PathBuf,
    options: PipelineOptions,
    templates: String,
    axiom: Axiom,
}

impl Settings {
    fn resolve(cli: &Cli, cfg: config::Config) -> Result<Self> {
        let domains = cli
            .domains
            .clone()
            .or(cfg.domains)
            .ok_or_else(|| anyhow!("please provide a domains file with the --domains flag"))?;

        let mut configs = BTreeMap::new();
        if let Some(p) = cli.config_subfinder.clone().or(cfg.config_subfinder) {
            configs.insert("subfinder".to_string(), p);
        }
        if let Some(p) = cli.config_nuclei.clone().or(cfg.config_nuclei) {
            configs.insert("nuclei".to_string(), p);
        }

        let defaults = PipelineOptions::default();
        let options = PipelineOptions {
            out_dir: cli.output.clone().or(cfg.output).unwrap_or(defaults.out_dir),
            fleet: cli.fleet.clone().or(cfg.fleet).map(FleetName).unwrap_or(defaults.fleet),
            instances: cli.instances.or(cfg.instances),
            configs,
            split_by_target: cli.split_by_target || cfg.split_by_target.unwrap_or(false),
        };

        let base = Axiom::default();
        let axiom = Axiom::new(
            cli.axiom_bin.clone().or(cfg.axiom_bin).unwrap_or(base.bin),
            cli.axiom_scp_bin.clone().or(cfg.axiom_scp_bin).unwrap_or(base.scp_bin),
        );
        let templates = cli.templates.clone().or(cfg.templates).unwrap_or_else(|| DEFAULT_TEMPLATES_DIR.to_string());

        Ok(Settings { domains, options, templates, axiom })
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn summary_line(target: &Target, outcome: &StageOutcome) -> Result<String> {
    let obj = serde_json::json!({
        "target": target,
        "stage": outcome.stage,
        "raw": outcome.raw,
        "report": outcome.report,
        "rows": outcome.rows,
        "started_at": outcome.started_at,
        "duration_ms": outcome.duration_ms,
    });
    Ok(serde_json::to_string(&obj)?)
}

fn load_targets(path: &Path) -> Result<Vec<Target>> {
    let targets = domains::read_domains(path)?;
    if targets.is_empty() {
        return Err(anyhow!("no targets in {}", path.display()));
    }
    Ok(targets)
}

/// Print the exact commands a run would execute, one per line.
fn write_plan(pipeline: &Pipeline<Axiom>, targets: &[Target], out: &mut impl Write) -> Result<()> {
    let axiom = pipeline.executor();
    for target in targets {
        for invocation in pipeline.plan(target)? {
            let cmd = match &invocation {
                Invocation::Exec(args) => axiom.exec_command(args),
                Invocation::Copy { src, dest } => axiom.copy_command(src, dest),
            };
            writeln!(out, "{}", command_line(&cmd))?;
        }
    }
    Ok(())
}

/// Run the targets in order. Summary lines of finished stages are written even when their
/// target fails, before the error is returned.
fn run_targets<E: RemoteExecutor>(
    pipeline: &Pipeline<E>,
    targets: &[Target],
    mut summary: Option<&mut dyn Write>,
) -> Result<()> {
    for target in targets {
        info!(%target, "starting recon");
        let mut finished = Vec::new();
        let result = pipeline.run_target_with(target, |outcome| finished.push(outcome.clone()));
        if let Some(w) = summary.as_mut() {
            for outcome in &finished {
                writeln!(w, "{}", summary_line(target, outcome)?)?;
            }
            w.flush()?;
        }
        result.with_context(|| format!("recon of {} failed", target))?;
    }
    info!(targets = targets.len(), "all targets complete");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    info!("fleetrecon {} (core {})", env!("CARGO_PKG_VERSION"), fleetrecon_core::version());

    let cfg = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    let settings = Settings::resolve(&cli, cfg)?;
    let targets = load_targets(&settings.domains)?;

    let pipeline = Pipeline::with_default_stages(settings.axiom, settings.options, &settings.templates);

    if cli.dry_run {
        let stdout = std::io::stdout();
        return write_plan(&pipeline, &targets, &mut stdout.lock());
    }

    let mut summary = match &cli.summary {
        Some(path) => Some(BufWriter::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening summary file {}", path.display()))?,
        )),
        None => None,
    };
    run_targets(&pipeline, &targets, summary.as_mut().map(|w| w as &mut dyn Write))
}
