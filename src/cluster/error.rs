use super::report::{RejectionKind, SearchStats};
use crate::db::DiskType;
use std::fmt;
use std::time::Duration;

/// Malformed inventory, caught before the search starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum InventoryError {
    #[error("invalid hostname: {0:?}")]
    InvalidHostname(String),
    #[error("duplicate server hostname: {0}")]
    DuplicateServer(String),
    #[error("duplicate virtual server hostname: {0}")]
    DuplicateVirtualServer(String),
    #[error("{host} has more than one disk named {device}")]
    DuplicateDevice { host: String, device: String },
    #[error("virtual server {0} requests zero processor cores")]
    ZeroCores(String),
    #[error("virtual server {host} has processor weight {weight}, expected 1..=1000")]
    InvalidProcessorWeight { host: String, weight: u32 },
    #[error("virtual server {host} pins both primary and secondary to {server}")]
    ConflictingPins { host: String, server: String },
    #[error("{host} has {field} {value}, above the limit of {}", super::inventory::MAX_QUANTITY)]
    QuantityOutOfRange { host: String, field: &'static str, value: u64 },
    #[error("total {disk_type} extents on {host} exceed {}", super::inventory::MAX_QUANTITY)]
    DiskCapacityOverflow { host: String, disk_type: DiskType },
}

/// Which hardware requirement a candidate failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HardwareField {
    Pin,
    ProcessorType,
    Architecture,
    Speed,
}

impl fmt::Display for HardwareField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pin => "manual pin",
            Self::ProcessorType => "processor type",
            Self::Architecture => "processor architecture",
            Self::Speed => "processor speed",
        })
    }
}

/// Why a single candidate host was skipped. Rejections are an expected part of
/// the search and only feed the diagnostic tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum Rejection {
    #[error("primary {0} mismatch")]
    PrimaryHardwareMismatch(HardwareField),
    #[error("primary processor capacity exceeded")]
    PrimaryProcessorCapacityExceeded,
    #[error("primary RAM capacity exceeded")]
    PrimaryRamCapacityExceeded,
    #[error("primary {disk_type} extents exceeded")]
    PrimaryDiskExtentsExceeded { disk_type: DiskType },
    #[error("primary {disk_type} weight exceeded")]
    PrimaryDiskWeightExceeded { disk_type: DiskType },
    #[error("secondary {0} mismatch")]
    SecondaryHardwareMismatch(HardwareField),
    #[error("secondary core count too low")]
    SecondaryCoreCapacityExceeded,
    #[error("secondary RAM capacity exceeded")]
    SecondaryRamCapacityExceeded,
    #[error("secondary {disk_type} extents exceeded")]
    SecondaryDiskExtentsExceeded { disk_type: DiskType },
    #[error("secondary {disk_type} weight exceeded")]
    SecondaryDiskWeightExceeded { disk_type: DiskType },
}

impl Rejection {
    pub(crate) const fn kind(self) -> RejectionKind {
        match self {
            Self::PrimaryHardwareMismatch(_) => RejectionKind::PrimaryHardwareMismatch,
            Self::PrimaryProcessorCapacityExceeded => {
                RejectionKind::PrimaryProcessorCapacityExceeded
            }
            Self::PrimaryRamCapacityExceeded => RejectionKind::PrimaryRamCapacityExceeded,
            Self::PrimaryDiskExtentsExceeded { .. } => RejectionKind::PrimaryDiskExtentsExceeded,
            Self::PrimaryDiskWeightExceeded { .. } => RejectionKind::PrimaryDiskWeightExceeded,
            Self::SecondaryHardwareMismatch(_) => RejectionKind::SecondaryHardwareMismatch,
            Self::SecondaryCoreCapacityExceeded => RejectionKind::SecondaryCoreCapacityExceeded,
            Self::SecondaryRamCapacityExceeded => RejectionKind::SecondaryRamCapacityExceeded,
            Self::SecondaryDiskExtentsExceeded { .. } => {
                RejectionKind::SecondaryDiskExtentsExceeded
            }
            Self::SecondaryDiskWeightExceeded { .. } => RejectionKind::SecondaryDiskWeightExceeded,
        }
    }
}

/// Outcome of a run that produced no mapping.
#[derive(Debug, thiserror::Error)]
pub(crate) enum OptimizeError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InventoryError),
    #[error("no feasible mapping ({})", describe_binding(stats))]
    NoFeasibleMapping { stats: SearchStats, elapsed: Duration },
    #[error("search cancelled before any mapping was found")]
    Cancelled { stats: SearchStats, elapsed: Duration },
}

impl OptimizeError {
    pub(crate) const fn stats(&self) -> Option<&SearchStats> {
        match self {
            Self::InvalidInput(_) => None,
            Self::NoFeasibleMapping { stats, .. } | Self::Cancelled { stats, .. } => Some(stats),
        }
    }

    /// How long the search ran before giving up.
    pub(crate) const fn elapsed(&self) -> Duration {
        match self {
            Self::InvalidInput(_) => Duration::ZERO,
            Self::NoFeasibleMapping { elapsed, .. } | Self::Cancelled { elapsed, .. } => *elapsed,
        }
    }
}

fn describe_binding(stats: &SearchStats) -> String {
    match stats.rejections.dominant() {
        Some((kind, count)) => format!(
            "{} candidates rejected, most often {} ({})",
            stats.candidates_rejected, kind, count
        ),
        None => "no candidate hosts".to_string(),
    }
}
