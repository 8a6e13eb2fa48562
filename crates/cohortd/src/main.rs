use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Parser;
use cohort_config::{DetectorKind, GroupEventPolicy, RunConfig, load_run_config, validate_config};
use cohortd::pipeline::run_pipeline;
use cohortd::report::{print_report, write_csv, write_csv_by_resource, write_json};
use tracing_subscriber::EnvFilter;

const CLI_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Debug, Parser)]
#[command(author, version, about = "COHORT membership-change mining engine")]
struct Cli {
    #[arg(long, help = "Resources CSV (id;label)")]
    resources: PathBuf,

    #[arg(long, help = "Objects CSV (id;label)")]
    objects: PathBuf,

    #[arg(long, help = "Collaboration sessions CSV")]
    collab_sessions: PathBuf,

    #[arg(
        long,
        help = "Work sessions CSV; omit to infer first appearances from collaboration events"
    )]
    work_sessions: Option<PathBuf>,

    #[arg(long, help = "Run configuration TOML; a missing file falls back to defaults")]
    config: Option<PathBuf>,

    #[arg(
        long,
        help = "Minutes without collaboration after which a relationship fully decays"
    )]
    period_of_decay: Option<f64>,

    #[arg(
        long,
        value_parser = parse_timestamp_arg,
        help = "Begin of the analyzed period (dd/mm/yyyy HH:MM:SS); inferred from the logs when omitted"
    )]
    begin: Option<NaiveDateTime>,

    #[arg(
        long,
        value_parser = parse_timestamp_arg,
        help = "End of the analyzed period (dd/mm/yyyy HH:MM:SS); inferred from the logs when omitted"
    )]
    end: Option<NaiveDateTime>,

    #[arg(
        long,
        value_parser = parse_detector,
        help = "Community detector: louvain or greedy_modularity"
    )]
    detector: Option<DetectorKind>,

    #[arg(
        long,
        value_parser = parse_policy,
        help = "Classification of partial group merges/splits: strict or lenient"
    )]
    group_event_policy: Option<GroupEventPolicy>,

    #[arg(long, help = "Write the change report CSV here")]
    output: Option<PathBuf>,

    #[arg(long, help = "Write a per-resource change report CSV here")]
    output_by_resource: Option<PathBuf>,

    #[arg(long, help = "Write the full change report as JSON here")]
    json: Option<PathBuf>,

    #[arg(long, help = "Print the detected changes to stdout")]
    print: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match cli.config.as_deref() {
        Some(path) => load_run_config(path)
            .with_context(|| format!("failed to load run config from {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(period) = cli.period_of_decay {
        config.tie.period_of_total_decay_minutes = period;
    }
    if let Some(begin) = cli.begin {
        config.begin = Some(begin);
    }
    if let Some(end) = cli.end {
        config.end = Some(end);
    }
    if let Some(detector) = cli.detector {
        config.detector = detector;
    }
    if let Some(policy) = cli.group_event_policy {
        config.group_event_policy = policy;
    }

    for warning in validate_config(&config) {
        eprintln!("COHORT config warning [{}]: {}", warning.code, warning.message);
    }

    let data = cohort_ingest::load_all(
        &cli.resources,
        &cli.objects,
        &cli.collab_sessions,
        cli.work_sessions.as_deref(),
    )?;

    let output = run_pipeline(&data, &config)?;

    if let Some(path) = cli.output.as_deref() {
        write_csv(&output.report, path)?;
    }
    if let Some(path) = cli.output_by_resource.as_deref() {
        write_csv_by_resource(&output.report, path)?;
    }
    if let Some(path) = cli.json.as_deref() {
        write_json(&output.report, path)?;
    }

    let no_file_output =
        cli.output.is_none() && cli.output_by_resource.is_none() && cli.json.is_none();
    if cli.print || no_file_output {
        let mut stdout = std::io::stdout();
        print_report(&output.report, &mut stdout)?;
    }

    Ok(())
}

fn parse_timestamp_arg(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value.trim(), CLI_TIMESTAMP_FORMAT).map_err(|_| {
        format!("invalid timestamp '{value}', expected the format dd/mm/yyyy HH:MM:SS")
    })
}

fn parse_detector(value: &str) -> Result<DetectorKind, String> {
    value.parse()
}

fn parse_policy(value: &str) -> Result<GroupEventPolicy, String> {
    value.parse()
}
