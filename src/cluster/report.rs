use super::error::Rejection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Only look at the clock once per this many candidates.
const CLOCK_CHECK_MASK: u64 = 0xff;

/// Rejection reason without its detail, used as a tally key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    PrimaryHardwareMismatch,
    PrimaryProcessorCapacityExceeded,
    PrimaryRamCapacityExceeded,
    PrimaryDiskExtentsExceeded,
    PrimaryDiskWeightExceeded,
    SecondaryHardwareMismatch,
    SecondaryCoreCapacityExceeded,
    SecondaryRamCapacityExceeded,
    SecondaryDiskExtentsExceeded,
    SecondaryDiskWeightExceeded,
}

impl RejectionKind {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::PrimaryHardwareMismatch => "primary_hardware_mismatch",
            Self::PrimaryProcessorCapacityExceeded => "primary_processor_capacity_exceeded",
            Self::PrimaryRamCapacityExceeded => "primary_ram_capacity_exceeded",
            Self::PrimaryDiskExtentsExceeded => "primary_disk_extents_exceeded",
            Self::PrimaryDiskWeightExceeded => "primary_disk_weight_exceeded",
            Self::SecondaryHardwareMismatch => "secondary_hardware_mismatch",
            Self::SecondaryCoreCapacityExceeded => "secondary_core_capacity_exceeded",
            Self::SecondaryRamCapacityExceeded => "secondary_ram_capacity_exceeded",
            Self::SecondaryDiskExtentsExceeded => "secondary_disk_extents_exceeded",
            Self::SecondaryDiskWeightExceeded => "secondary_disk_weight_exceeded",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected candidates counted by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RejectionTally(BTreeMap<RejectionKind, u64>);

impl RejectionTally {
    pub(crate) fn record(&mut self, kind: RejectionKind) {
        *self.0.entry(kind).or_insert(0) += 1;
    }

    #[cfg(test)]
    pub(crate) fn count(&self, kind: RejectionKind) -> u64 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    /// The most frequent reason. Ties go to the reason checked earliest.
    pub(crate) fn dominant(&self) -> Option<(RejectionKind, u64)> {
        self.0
            .iter()
            .fold(None, |best: Option<(RejectionKind, u64)>, (&kind, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((kind, count)),
            })
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (RejectionKind, u64)> + '_ {
        self.0.iter().map(|(&kind, &count)| (kind, count))
    }
}

/// Counters collected during one search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub mappings_found: u64,
    /// Primary and secondary candidates considered.
    pub candidates_tried: u64,
    pub candidates_rejected: u64,
    pub rejections: RejectionTally,
}

impl SearchStats {
    pub(crate) fn record_rejection(&mut self, rejection: Rejection) {
        self.candidates_rejected += 1;
        self.rejections.record(rejection.kind());
    }
}

/// One placed virtual server on the current search path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathStep {
    pub virtual_server: String,
    pub primary: String,
    pub secondary: String,
}

/// Point-in-time view of a running search.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub depth: usize,
    pub virtual_servers: usize,
    pub path: Vec<PathStep>,
    pub mappings_found: u64,
    pub candidates_tried: u64,
    pub candidates_rejected: u64,
    pub elapsed_seconds: f64,
    pub candidates_per_second: f64,
}

/// Receiver for progress snapshots.
pub(crate) trait ProgressSink {
    fn progress(&self, snapshot: &ProgressSnapshot);
}

impl ProgressSink for () {
    fn progress(&self, _snapshot: &ProgressSnapshot) {}
}

/// Throttles progress snapshots to at most one per interval.
pub(crate) struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    interval: Duration,
    started: Instant,
    last_emit: Instant,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, interval: Duration) -> Self {
        let now = Instant::now();
        Self { sink, interval, started: now, last_emit: now }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Emit a snapshot if the interval has passed. `path` is only built when
    /// a snapshot is actually emitted.
    pub(crate) fn tick(
        &mut self,
        stats: &SearchStats,
        depth: usize,
        virtual_servers: usize,
        path: impl FnOnce() -> Vec<PathStep>,
    ) {
        if stats.candidates_tried & CLOCK_CHECK_MASK != 0 {
            return;
        }
        if self.last_emit.elapsed() < self.interval {
            return;
        }
        self.last_emit = Instant::now();

        let elapsed_seconds = self.started.elapsed().as_secs_f64();
        let candidates_per_second = if elapsed_seconds > 0.0 {
            stats.candidates_tried as f64 / elapsed_seconds
        } else {
            0.0
        };

        let snapshot = ProgressSnapshot {
            depth,
            virtual_servers,
            path: path(),
            mappings_found: stats.mappings_found,
            candidates_tried: stats.candidates_tried,
            candidates_rejected: stats.candidates_rejected,
            elapsed_seconds,
            candidates_per_second,
        };

        debug!(
            "Search at depth {}/{}: {} mappings, {} candidates ({:.0}/s), {} rejected",
            depth,
            virtual_servers,
            snapshot.mappings_found,
            snapshot.candidates_tried,
            candidates_per_second,
            snapshot.candidates_rejected,
        );

        self.sink.progress(&snapshot);
    }
}
