use anyhow::{Context, Result, bail};
use chrono::Duration;
use cohort_changes::{ChangeReport, detect_all};
use cohort_community::{
    CommunityDetector, GreedyModularityDetector, LouvainDetector, TeamAssigner,
};
use cohort_config::{DetectorKind, RunConfig};
use cohort_core::Timestamp;
use cohort_graph::{SnapshotScheduler, TemporalGraph};
use cohort_ingest::IngestedData;
use tracing::info;

#[derive(Debug)]
pub struct PipelineOutput {
    pub temporal: TemporalGraph,
    pub report: ChangeReport,
}

/// Ingested events → snapshot sequence → team assignments → matched teams
/// → membership-change report.
pub fn run_pipeline(data: &IngestedData, config: &RunConfig) -> Result<PipelineOutput> {
    let (begin, end) = resolve_window(data, config)?;
    info!(%begin, %end, "building the temporal collaboration graph");

    let mut scheduler = SnapshotScheduler::from_config(
        config,
        &data.resources,
        data.collaboration_events.clone(),
        &data.work_events,
    )
    .context("invalid tie-strength configuration")?;
    let mut temporal = scheduler
        .run(begin, end)
        .context("snapshot simulation failed")?;
    info!(snapshots = temporal.len(), "materialized snapshots");

    let detector: Box<dyn CommunityDetector> = match config.detector {
        DetectorKind::Louvain => Box::new(LouvainDetector::new()),
        DetectorKind::GreedyModularity => Box::new(GreedyModularityDetector::new()),
    };
    TeamAssigner::new(detector)
        .assign(&mut temporal)
        .context("community detection failed")?;

    let report = detect_all(
        &temporal,
        config.group_event_policy,
        Duration::days(config.reassignment_window_days),
    )
    .context("membership-change mining failed")?;
    info!(changes = report.total(), "mined membership changes");

    Ok(PipelineOutput { temporal, report })
}

/// The analyzed window: the configured bounds, or bounds inferred from the
/// activity logs (one minute before the first event, one full decay period
/// past the last, so final tie expiries still materialize).
fn resolve_window(data: &IngestedData, config: &RunConfig) -> Result<(Timestamp, Timestamp)> {
    if let (Some(begin), Some(end)) = (config.begin, config.end) {
        if begin >= end {
            bail!("the begin timestamp {begin} must lie before the end timestamp {end}");
        }
        return Ok((begin, end));
    }

    let event_times = data
        .collaboration_events
        .iter()
        .map(|event| event.timestamp)
        .chain(data.work_events.iter().map(|event| event.timestamp));
    let (earliest, latest) = match bounds(event_times) {
        Some(bounds) => bounds,
        None => bail!("no activity events to analyze; provide explicit begin and end timestamps"),
    };

    let begin = config.begin.unwrap_or(earliest - Duration::minutes(1));
    let end = config.end.unwrap_or_else(|| {
        latest
            + Duration::milliseconds((config.tie.period_of_total_decay_minutes * 60_000.0) as i64)
            + Duration::minutes(1)
    });
    if begin >= end {
        bail!("the begin timestamp {begin} must lie before the end timestamp {end}");
    }
    Ok((begin, end))
}

fn bounds(times: impl Iterator<Item = Timestamp>) -> Option<(Timestamp, Timestamp)> {
    times.fold(None, |acc, time| match acc {
        None => Some((time, time)),
        Some((earliest, latest)) => Some((earliest.min(time), latest.max(time))),
    })
}
