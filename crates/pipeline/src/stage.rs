/// Nuclei templates location used when none is configured.
pub const DEFAULT_TEMPLATES_DIR: &str = "/path/to/nuclei-templates/";

/// Where a stage takes its scan input from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageInput {
    /// The domain the pipeline runs against.
    Target,
    /// The normalized report of an earlier stage, by stage name.
    Report(String),
}

/// Immutable description of one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub name: String,
    /// Human readable label used in progress logs.
    pub label: String,
    /// Tool module understood by the fleet dispatcher.
    pub module: String,
    /// Raw tool output, relative to the output directory.
    pub raw_file: String,
    /// Normalized CSV report, relative to the output directory.
    pub report_file: String,
    pub projection: String,
    pub args: Vec<String>,
    /// Flag prefix for a distributed config file, e.g. `--config-file=`.
    pub config_flag: Option<String>,
    pub input: StageInput,
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// The four recon stages in execution order: enumeration, vulnerability scan, port scan,
/// screenshots. Every stage after the first reads the enumeration report.
pub fn default_stages(templates_dir: &str) -> Vec<StageSpec> {
    let subdomains = StageInput::Report("subdomains".to_string());
    vec![
        StageSpec {
            name: "subdomains".into(),
            label: "subdomain enumeration".into(),
            module: "subfinder".into(),
            raw_file: "subfinder_raw.json".into(),
            report_file: "subdomains.csv".into(),
            projection: ".[] | [.name]".into(),
            args: Vec::new(),
            config_flag: Some("--config-file=".into()),
            input: StageInput::Target,
        },
        StageSpec {
            name: "nuclei".into(),
            label: "vulnerability scan".into(),
            module: "nuclei".into(),
            raw_file: "nuclei_raw.json".into(),
            report_file: "nuclei_output.csv".into(),
            projection: ".[] | [.host, .templateID, .info.name, .info.severity]".into(),
            args: vec!["-p".to_string(), templates_dir.to_string()],
            config_flag: Some("--config=".into()),
            input: subdomains.clone(),
        },
        StageSpec {
            name: "nmap".into(),
            label: "port scan".into(),
            module: "nmap".into(),
            raw_file: "nmap_raw.json".into(),
            report_file: "nmap_output.csv".into(),
            projection: ".[] | [.host, .ports[].port, .ports[].service.name, .ports[].service.version, .ports[].service.extrainfo, .ports[].scriptResults[].output]".into(),
            args: strings(&["-p-", "-T2", "-sV", "--script=http-title"]),
            config_flag: None,
            input: subdomains.clone(),
        },
        StageSpec {
            name: "gowitness".into(),
            label: "web screenshots".into(),
            module: "gowitness".into(),
            raw_file: "gowitness_raw.json".into(),
            report_file: "gowitness_output.csv".into(),
            projection: ".[] | [.url, .responseCode, .title, .headers.Server, .headers.XPoweredBy]".into(),
            args: strings(&["screenshot", "--disable-geolocation"]),
            config_flag: None,
            input: subdomains,
        },
    ]
}
