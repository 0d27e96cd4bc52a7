//! Failover-aware placement of virtual servers onto physical servers.
//!
//! [`Inventory`] freezes the hosts and virtual servers of one run,
//! [`optimize`] searches it for mappings that respect every capacity rule, and
//! the report types describe how the search went.

mod allocation;
mod constraints;
mod error;
mod inventory;
mod optimizer;
mod report;

pub(crate) use error::OptimizeError;
pub(crate) use inventory::{validate_server, validate_virtual_server, Inventory};
pub(crate) use optimizer::{optimize, Mapping, OptimizeOptions, OptimizeOutcome};
pub(crate) use report::{PathStep, ProgressSink, ProgressSnapshot, RejectionTally, SearchStats};

#[cfg(test)]
pub(crate) use allocation::{AllocationState, Placement, ServerAllocation};
#[cfg(test)]
pub(crate) use constraints::{
    check_disks, disk_usage, has_disk_capacity, has_primary_ram_capacity, has_processor_capacity,
    has_secondary_core_capacity, has_secondary_ram_capacity, matches_hardware_requirements,
    DiskUsage, Role,
};
#[cfg(test)]
pub(crate) use error::{HardwareField, InventoryError, Rejection};
#[cfg(test)]
pub(crate) use inventory::{DiskCapacity, MAX_QUANTITY};
#[cfg(test)]
pub(crate) use optimizer::{Optimizer, StopReason};
#[cfg(test)]
pub(crate) use report::RejectionKind;
