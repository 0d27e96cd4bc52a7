//! Capacity and hardware checks for one candidate assignment.
//!
//! Every check is pure over the inventory and the current allocation state and
//! reports the specific rule that failed.

use super::allocation::{Placement, ServerAllocation};
use super::error::{HardwareField, Rejection};
use super::inventory::{DiskCapacity, Inventory};
use crate::db::{DiskType, Server, VirtualServer};

/// Which copy of a virtual server is being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Primary,
    Secondary,
}

/// Extents and weight committed to one disk type on one server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DiskUsage {
    pub extents: u64,
    pub weight: u64,
}

impl DiskUsage {
    fn add(&mut self, vs: &VirtualServer, role: Role, disk_type: DiskType) {
        for disk in &vs.disks {
            let (copy_type, weight) = match role {
                Role::Primary => (disk.primary_disk_type, disk.primary_weight),
                Role::Secondary => (disk.secondary_disk_type, disk.secondary_weight),
            };
            if copy_type == disk_type {
                self.extents = self.extents.saturating_add(disk.extents);
                self.weight = self.weight.saturating_add(u64::from(weight));
            }
        }
    }
}

/// Pin, processor and architecture requirements.
///
/// Secondaries only need to honor the pin and the architecture: a failover
/// host may be older or slower than the virtual server would like.
pub(crate) fn matches_hardware_requirements(
    vs: &VirtualServer,
    server: &Server,
    role: Role,
) -> Result<(), Rejection> {
    let mismatch = |field| match role {
        Role::Primary => Rejection::PrimaryHardwareMismatch(field),
        Role::Secondary => Rejection::SecondaryHardwareMismatch(field),
    };

    let pin = match role {
        Role::Primary => vs.primary_server.as_deref(),
        Role::Secondary => vs.secondary_server.as_deref(),
    };
    if pin.is_some_and(|pin| pin != server.hostname) {
        return Err(mismatch(HardwareField::Pin));
    }

    if role == Role::Primary
        && vs.minimum_processor_type.is_some_and(|min| server.processor_type < min)
    {
        return Err(mismatch(HardwareField::ProcessorType));
    }

    if vs.processor_architecture.is_some_and(|arch| server.processor_architecture != arch) {
        return Err(mismatch(HardwareField::Architecture));
    }

    if role == Role::Primary
        && vs.minimum_processor_speed.is_some_and(|min| server.processor_speed < min)
    {
        return Err(mismatch(HardwareField::Speed));
    }

    Ok(())
}

pub(crate) fn has_processor_capacity(
    alloc: &ServerAllocation,
    server: &Server,
    vs: &VirtualServer,
) -> Result<(), Rejection> {
    let capacity = u64::from(server.processor_cores) * 1000;
    if alloc.processor_weight + vs.processor_demand() > capacity {
        return Err(Rejection::PrimaryProcessorCapacityExceeded);
    }
    Ok(())
}

/// The primary must fit next to the worst single-failure secondary load.
pub(crate) fn has_primary_ram_capacity(
    alloc: &ServerAllocation,
    server: &Server,
    vs: &VirtualServer,
) -> Result<(), Rejection> {
    let needed = alloc
        .primary_ram
        .checked_add(vs.primary_ram)
        .and_then(|ram| ram.checked_add(alloc.max_secondary_ram));
    if needed.is_some_and(|ram| ram <= server.ram) {
        Ok(())
    } else {
        Err(Rejection::PrimaryRamCapacityExceeded)
    }
}

pub(crate) fn has_secondary_core_capacity(
    server: &Server,
    vs: &VirtualServer,
) -> Result<(), Rejection> {
    if server.processor_cores < vs.processor_cores {
        return Err(Rejection::SecondaryCoreCapacityExceeded);
    }
    Ok(())
}

/// Only the failover load for `failed_primary` competes with this reservation.
pub(crate) fn has_secondary_ram_capacity(
    alloc: &ServerAllocation,
    server: &Server,
    vs: &VirtualServer,
    failed_primary: usize,
) -> Result<(), Rejection> {
    let needed = alloc
        .primary_ram
        .checked_add(alloc.secondary_rams[failed_primary])
        .and_then(|ram| ram.checked_add(vs.secondary_ram));
    if needed.is_some_and(|ram| ram <= server.ram) {
        Ok(())
    } else {
        Err(Rejection::SecondaryRamCapacityExceeded)
    }
}

pub(crate) fn has_disk_capacity(
    capacity: DiskCapacity,
    disk_type: DiskType,
    usage: DiskUsage,
    role: Role,
) -> Result<(), Rejection> {
    if usage.extents > capacity.extents {
        return Err(match role {
            Role::Primary => Rejection::PrimaryDiskExtentsExceeded { disk_type },
            Role::Secondary => Rejection::SecondaryDiskExtentsExceeded { disk_type },
        });
    }
    if usage.weight > capacity.weight_limit() {
        return Err(match role {
            Role::Primary => Rejection::PrimaryDiskWeightExceeded { disk_type },
            Role::Secondary => Rejection::SecondaryDiskWeightExceeded { disk_type },
        });
    }
    Ok(())
}

/// Sum of everything mapped onto `server` for one disk type, counting primary
/// copies by their primary type and secondary copies by their secondary type.
/// `tentative` adds one more copy not yet in `placements`.
pub(crate) fn disk_usage(
    inventory: &Inventory,
    placements: &[Placement],
    server: usize,
    disk_type: DiskType,
    tentative: Option<(usize, Role)>,
) -> DiskUsage {
    let mut usage = DiskUsage::default();
    for placement in placements {
        let vs = inventory.virtual_server(placement.virtual_server);
        if placement.primary == server {
            usage.add(vs, Role::Primary, disk_type);
        }
        if placement.secondary == server {
            usage.add(vs, Role::Secondary, disk_type);
        }
    }
    if let Some((vs_index, role)) = tentative {
        usage.add(inventory.virtual_server(vs_index), role, disk_type);
    }
    usage
}

/// Check every disk type on `server`, recomputing usage from scratch.
/// Returns the first violated type, reported for `role`.
pub(crate) fn check_disks(
    inventory: &Inventory,
    placements: &[Placement],
    server: usize,
    tentative: Option<(usize, Role)>,
    role: Role,
) -> Result<(), Rejection> {
    for disk_type in DiskType::ALL {
        let usage = disk_usage(inventory, placements, server, disk_type, tentative);
        has_disk_capacity(inventory.disk_capacity(server, disk_type), disk_type, usage, role)?;
    }
    Ok(())
}
