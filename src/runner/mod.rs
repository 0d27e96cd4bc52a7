use crate::cluster::{
    optimize, Inventory, Mapping, OptimizeError, OptimizeOptions, OptimizeOutcome, SearchStats,
};
use crate::db::{RunOutcome, RunStatus};
use crate::events::{Event, RunProgress};
use crate::{AppState, DaemonStatus};
use anyhow::Result;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Load the inventory, search it, and record the outcome of run `run_id`.
///
/// Blocking: call from `spawn_blocking`. Search outcomes, including invalid
/// inventories, are recorded on the run; only database failures are returned.
pub(crate) fn run_optimization(
    state: &AppState,
    run_id: i64,
    max_mappings: u64,
    cancel: CancellationToken,
) -> Result<RunStatus> {
    let servers = state.db.get_all_servers()?;
    let virtual_servers = state.db.get_all_virtual_servers()?;

    let inventory = match Inventory::new(servers, virtual_servers) {
        Ok(inventory) => inventory,
        Err(e) => {
            let error = OptimizeError::from(e);
            warn!("Run {} rejected: {}", run_id, error);
            return record_failure(state, run_id, &error);
        }
    };

    info!(
        "Run {}: placing {} virtual servers on {} servers (max_mappings={})",
        run_id,
        inventory.virtual_server_count(),
        inventory.server_count(),
        max_mappings
    );

    let _ = state.event_hub.publish(Event::OptimizeStarted {
        run_id,
        servers: inventory.server_count(),
        virtual_servers: inventory.virtual_server_count(),
        max_mappings,
        started_at: Utc::now(),
    });

    *state.status.blocking_write() = DaemonStatus::optimizing(
        run_id,
        format!(
            "Placing {} virtual servers on {} servers",
            inventory.virtual_server_count(),
            inventory.server_count()
        ),
    );

    let options =
        OptimizeOptions { max_mappings, progress_interval: state.config.progress_interval() };
    let sink = RunProgress { hub: &state.event_hub, run_id };
    let log_mappings = state.config.log_mappings;

    let result = optimize(&inventory, options, &sink, cancel, |ordinal, mapping| {
        let _ = state.event_hub.publish(Event::MappingFound { run_id, ordinal });
        if log_mappings || ordinal == 1 {
            log_mapping(&inventory, run_id, ordinal, mapping);
        }
    });

    match result {
        Ok(outcome) => record_success(state, run_id, &inventory, &outcome),
        Err(error) => {
            warn!("Run {}: {}", run_id, error);
            if let Some(stats) = error.stats() {
                for (kind, count) in stats.rejections.iter() {
                    info!("Run {}: {} candidates rejected for {}", run_id, count, kind);
                }
            }
            record_failure(state, run_id, &error)
        }
    }
}

fn log_mapping(inventory: &Inventory, run_id: i64, ordinal: u64, mapping: &Mapping) {
    info!("Run {}: mapping #{} found", run_id, ordinal);
    for placement in mapping.resolve(inventory) {
        info!(
            "  {} -> primary {}, secondary {}",
            placement.virtual_server, placement.primary_server, placement.secondary_server
        );
    }
    for usage in &mapping.usage {
        info!(
            "  {}: cpu {}/{}, ram {}+{}/{} MB",
            usage.hostname,
            usage.processor_weight,
            usage.processor_capacity,
            usage.primary_ram,
            usage.max_secondary_ram,
            usage.ram
        );
    }
}

fn record_success(
    state: &AppState,
    run_id: i64,
    inventory: &Inventory,
    outcome: &OptimizeOutcome,
) -> Result<RunStatus> {
    let summary = &outcome.summary;
    state.db.insert_run_placements(run_id, &outcome.first.resolve(inventory))?;

    info!(
        "Run {} completed: {} mapping(s), {} candidates, {} rejected in {:.1}s ({:?})",
        run_id,
        summary.stats.mappings_found,
        summary.stats.candidates_tried,
        summary.stats.candidates_rejected,
        summary.elapsed.as_secs_f64(),
        summary.stop,
    );

    let duration_seconds = summary.elapsed.as_secs_f64();
    finish(state, run_id, RunStatus::Completed, &summary.stats, None, duration_seconds)
}

fn record_failure(state: &AppState, run_id: i64, error: &OptimizeError) -> Result<RunStatus> {
    let status = match error {
        OptimizeError::InvalidInput(_) => RunStatus::Failed,
        OptimizeError::NoFeasibleMapping { .. } => RunStatus::Infeasible,
        OptimizeError::Cancelled { .. } => RunStatus::Cancelled,
    };
    let empty = SearchStats::default();
    let stats = error.stats().unwrap_or(&empty);
    let duration_seconds = error.elapsed().as_secs_f64();
    finish(state, run_id, status, stats, Some(error.to_string()), duration_seconds)
}

fn finish(
    state: &AppState,
    run_id: i64,
    status: RunStatus,
    stats: &SearchStats,
    error_message: Option<String>,
    duration_seconds: f64,
) -> Result<RunStatus> {
    state.db.finish_run(
        run_id,
        &RunOutcome {
            status,
            mappings_found: stats.mappings_found,
            candidates_tried: stats.candidates_tried,
            candidates_rejected: stats.candidates_rejected,
            rejections: serde_json::to_value(&stats.rejections)?,
            error_message,
        },
    )?;

    let _ = state.event_hub.publish(Event::OptimizeComplete {
        run_id,
        status: status.to_string(),
        mappings_found: stats.mappings_found,
        candidates_tried: stats.candidates_tried,
        candidates_rejected: stats.candidates_rejected,
        rejections: stats.rejections.clone(),
        duration_seconds,
    });

    Ok(status)
}

/// Mark a run failed after an unexpected error or panic. Best effort.
pub(crate) fn fail_run(state: &AppState, run_id: i64, message: &str) {
    let stats = SearchStats::default();
    let _ = finish(state, run_id, RunStatus::Failed, &stats, Some(message.to_string()), 0.0);
    let _ = state.event_hub.publish(Event::DaemonError { message: message.to_string() });
}
