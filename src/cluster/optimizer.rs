use super::allocation::{AllocationState, Placement};
use super::constraints::{
    check_disks, disk_usage, has_primary_ram_capacity, has_processor_capacity,
    has_secondary_core_capacity, has_secondary_ram_capacity, matches_hardware_requirements, Role,
};
use super::error::{OptimizeError, Rejection};
use super::inventory::Inventory;
use super::report::{PathStep, ProgressReporter, ProgressSink, SearchStats};
use crate::db::{DiskType, RunPlacement};
use serde::Serialize;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Committed totals of one disk type on one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct DiskTypeUsage {
    pub disk_type: DiskType,
    pub extents: u64,
    pub extents_capacity: u64,
    pub weight: u64,
    pub weight_capacity: u64,
}

/// Committed totals of one server in a complete mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ServerUsage {
    pub hostname: String,
    pub processor_weight: u64,
    pub processor_capacity: u64,
    pub primary_ram: u64,
    pub max_secondary_ram: u64,
    pub ram: u64,
    pub disks: Vec<DiskTypeUsage>,
}

/// A complete mapping: every virtual server has a primary and a distinct secondary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Mapping {
    /// Indexed by virtual server.
    pub placements: Vec<Placement>,
    /// Indexed by server.
    pub usage: Vec<ServerUsage>,
}

impl Mapping {
    /// The mapping with hostnames instead of indices.
    pub(crate) fn resolve(&self, inventory: &Inventory) -> Vec<RunPlacement> {
        self.placements
            .iter()
            .map(|p| RunPlacement {
                virtual_server: inventory.virtual_server(p.virtual_server).hostname.clone(),
                primary_server: inventory.server(p.primary).hostname.clone(),
                secondary_server: inventory.server(p.secondary).hostname.clone(),
            })
            .collect()
    }
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum StopReason {
    /// Every candidate was explored.
    Exhausted,
    /// The mapping callback asked to stop.
    Requested,
    /// The cancellation token fired.
    Cancelled,
}

#[derive(Debug, Clone)]
pub(crate) struct SearchSummary {
    pub stats: SearchStats,
    pub stop: StopReason,
    pub elapsed: Duration,
}

/// Exhaustive backtracking search over (primary, secondary) pairs.
///
/// Virtual servers are placed in index order. For each one, primaries and then
/// secondaries are tried in server index order, so the first mapping found is
/// a pure function of the inventory order.
pub(crate) struct Optimizer<'a> {
    inventory: &'a Inventory,
    reporter: ProgressReporter<'a>,
    cancel: Option<CancellationToken>,
    stats: SearchStats,
    stop: StopReason,
}

impl<'a> Optimizer<'a> {
    pub(crate) fn new(inventory: &'a Inventory) -> Self {
        Self {
            inventory,
            reporter: ProgressReporter::new(&(), Duration::MAX),
            cancel: None,
            stats: SearchStats::default(),
            stop: StopReason::Exhausted,
        }
    }

    pub(crate) fn with_progress(mut self, sink: &'a dyn ProgressSink, interval: Duration) -> Self {
        self.reporter = ProgressReporter::new(sink, interval);
        self
    }

    pub(crate) fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Run the search, calling `on_mapping` for every complete mapping until it
    /// returns `Break`, the token is cancelled, or the space is exhausted.
    pub(crate) fn search<F>(mut self, mut on_mapping: F) -> SearchSummary
    where
        F: FnMut(&Mapping) -> ControlFlow<()>,
    {
        let mut state = AllocationState::new(self.inventory.server_count());
        // Break only carries the reason already stored in `self.stop`.
        let _ = self.place(&mut state, 0, &mut on_mapping);

        SearchSummary { stats: self.stats, stop: self.stop, elapsed: self.reporter.elapsed() }
    }

    fn place<F>(
        &mut self,
        state: &mut AllocationState,
        depth: usize,
        on_mapping: &mut F,
    ) -> ControlFlow<()>
    where
        F: FnMut(&Mapping) -> ControlFlow<()>,
    {
        let inventory = self.inventory;

        if depth == inventory.virtual_server_count() {
            self.stats.mappings_found += 1;
            let mapping = snapshot(inventory, state);
            if on_mapping(&mapping).is_break() {
                self.stop = StopReason::Requested;
                return ControlFlow::Break(());
            }
            return ControlFlow::Continue(());
        }

        let vs = inventory.virtual_server(depth);

        for p in 0..inventory.server_count() {
            self.visit(state, depth)?;
            let primary = inventory.server(p);

            let fits = matches_hardware_requirements(vs, primary, Role::Primary)
                .and_then(|()| has_processor_capacity(state.server(p), primary, vs))
                .and_then(|()| has_primary_ram_capacity(state.server(p), primary, vs));
            if let Err(rejection) = fits {
                self.reject(depth, p, rejection);
                continue;
            }

            let mut with_primary = state.commit_primary(p, vs);
            let disks_fit = check_disks(
                inventory,
                with_primary.placements(),
                p,
                Some((depth, Role::Primary)),
                Role::Primary,
            );
            if let Err(rejection) = disks_fit {
                self.reject(depth, p, rejection);
                continue;
            }

            for s in 0..inventory.server_count() {
                if s == p {
                    continue;
                }
                self.visit(&with_primary, depth)?;
                let secondary = inventory.server(s);

                let fits = matches_hardware_requirements(vs, secondary, Role::Secondary)
                    .and_then(|()| has_secondary_core_capacity(secondary, vs))
                    .and_then(|()| {
                        has_secondary_ram_capacity(with_primary.server(s), secondary, vs, p)
                    });
                if let Err(rejection) = fits {
                    self.reject(depth, s, rejection);
                    continue;
                }

                let mut placed = with_primary.commit_secondary(depth, vs, p, s);
                if let Err(rejection) =
                    check_disks(inventory, placed.placements(), s, None, Role::Secondary)
                {
                    self.reject(depth, s, rejection);
                    continue;
                }

                self.place(&mut placed, depth + 1, on_mapping)?;
            }
        }

        ControlFlow::Continue(())
    }

    /// Count a candidate, honor cancellation, and give the reporter a chance to run.
    fn visit(&mut self, state: &AllocationState, depth: usize) -> ControlFlow<()> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            self.stop = StopReason::Cancelled;
            return ControlFlow::Break(());
        }

        self.stats.candidates_tried += 1;
        let inventory = self.inventory;
        self.reporter.tick(&self.stats, depth, inventory.virtual_server_count(), || {
            path_steps(inventory, state.placements())
        });
        ControlFlow::Continue(())
    }

    fn reject(&mut self, depth: usize, server: usize, rejection: Rejection) {
        trace!(
            "{} on {}: {}",
            self.inventory.virtual_server(depth).hostname,
            self.inventory.server(server).hostname,
            rejection
        );
        self.stats.record_rejection(rejection);
    }
}

fn path_steps(inventory: &Inventory, placements: &[Placement]) -> Vec<PathStep> {
    placements
        .iter()
        .map(|p| PathStep {
            virtual_server: inventory.virtual_server(p.virtual_server).hostname.clone(),
            primary: inventory.server(p.primary).hostname.clone(),
            secondary: inventory.server(p.secondary).hostname.clone(),
        })
        .collect()
}

fn snapshot(inventory: &Inventory, state: &AllocationState) -> Mapping {
    let placements = state.placements();
    let usage = inventory
        .servers()
        .iter()
        .enumerate()
        .map(|(i, server)| {
            let alloc = state.server(i);
            ServerUsage {
                hostname: server.hostname.clone(),
                processor_weight: alloc.processor_weight,
                processor_capacity: u64::from(server.processor_cores) * 1000,
                primary_ram: alloc.primary_ram,
                max_secondary_ram: alloc.max_secondary_ram,
                ram: server.ram,
                disks: DiskType::ALL
                    .iter()
                    .filter_map(|&disk_type| {
                        let capacity = inventory.disk_capacity(i, disk_type);
                        let used = disk_usage(inventory, placements, i, disk_type, None);
                        (capacity.disks > 0 || used.extents > 0).then_some(DiskTypeUsage {
                            disk_type,
                            extents: used.extents,
                            extents_capacity: capacity.extents,
                            weight: used.weight,
                            weight_capacity: capacity.weight_limit(),
                        })
                    })
                    .collect(),
            }
        })
        .collect();

    Mapping { placements: placements.to_vec(), usage }
}

/// Limits for one optimizer run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OptimizeOptions {
    /// Stop after this many mappings. 0 enumerates them all.
    pub max_mappings: u64,
    pub progress_interval: Duration,
}

/// A run that found at least one mapping.
#[derive(Debug, Clone)]
pub(crate) struct OptimizeOutcome {
    /// The first mapping in search order.
    pub first: Mapping,
    pub summary: SearchSummary,
}

/// Search `inventory` until `max_mappings` mappings are found, the token is
/// cancelled, or the space is exhausted. `on_mapping` sees every mapping with
/// its 1-based ordinal.
pub(crate) fn optimize(
    inventory: &Inventory,
    options: OptimizeOptions,
    sink: &dyn ProgressSink,
    cancel: CancellationToken,
    mut on_mapping: impl FnMut(u64, &Mapping),
) -> Result<OptimizeOutcome, OptimizeError> {
    let mut first: Option<Mapping> = None;
    let mut found = 0u64;

    let summary = Optimizer::new(inventory)
        .with_progress(sink, options.progress_interval)
        .with_cancellation(cancel)
        .search(|mapping| {
            found += 1;
            on_mapping(found, mapping);
            if first.is_none() {
                first = Some(mapping.clone());
            }
            if options.max_mappings != 0 && found >= options.max_mappings {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

    match first {
        Some(first) => Ok(OptimizeOutcome { first, summary }),
        None if summary.stop == StopReason::Cancelled => {
            Err(OptimizeError::Cancelled { stats: summary.stats, elapsed: summary.elapsed })
        }
        None => Err(OptimizeError::NoFeasibleMapping {
            stats: summary.stats,
            elapsed: summary.elapsed,
        }),
    }
}
