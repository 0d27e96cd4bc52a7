use super::error::InventoryError;
use crate::db::{DiskType, Server, VirtualServer};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::warn;

/// Hostnames are lowercase DNS labels separated by dots.
static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*$")
        .unwrap()
});

/// Largest processor weight a virtual server may ask for per core.
pub(crate) const MAX_PROCESSOR_WEIGHT: u32 = 1000;

/// Upper bound for RAM sizes and extent counts, the largest value the store
/// can hold. Per-type disk totals obey the same bound, so a saturated usage
/// sum can never fit.
pub(crate) const MAX_QUANTITY: u64 = i64::MAX as u64;

fn check_quantity(host: &str, field: &'static str, value: u64) -> Result<(), InventoryError> {
    if value > MAX_QUANTITY {
        return Err(InventoryError::QuantityOutOfRange { host: host.to_string(), field, value });
    }
    Ok(())
}

/// Check that a hostname is well formed.
pub(crate) fn validate_hostname(hostname: &str) -> Result<(), InventoryError> {
    if hostname.len() > 253 || !HOSTNAME_RE.is_match(hostname) {
        return Err(InventoryError::InvalidHostname(hostname.to_string()));
    }
    Ok(())
}

/// Raw capacity of one disk type on one server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DiskCapacity {
    pub extents: u64,
    pub disks: u64,
}

impl DiskCapacity {
    /// Weight limit in thousandths: each physical disk absorbs 1000.
    pub(crate) const fn weight_limit(self) -> u64 {
        self.disks * 1000
    }
}

/// Frozen view of servers and virtual servers for one optimizer run.
///
/// Indices into both collections are stable for the lifetime of the value and
/// are what the search uses as identity.
#[derive(Debug, Clone)]
pub(crate) struct Inventory {
    servers: Vec<Server>,
    virtual_servers: Vec<VirtualServer>,
    /// Per server, capacity indexed by [`DiskType::index`].
    disk_capacity: Vec<[DiskCapacity; DiskType::COUNT]>,
}

impl Inventory {
    /// Validate and freeze an inventory.
    pub(crate) fn new(
        servers: Vec<Server>,
        virtual_servers: Vec<VirtualServer>,
    ) -> Result<Self, InventoryError> {
        let mut hostnames = HashSet::with_capacity(servers.len());
        for server in &servers {
            validate_server(server)?;
            if !hostnames.insert(server.hostname.as_str()) {
                return Err(InventoryError::DuplicateServer(server.hostname.clone()));
            }
        }

        let mut seen_vs = HashSet::with_capacity(virtual_servers.len());
        for vs in &virtual_servers {
            validate_virtual_server(vs)?;
            if !seen_vs.insert(vs.hostname.as_str()) {
                return Err(InventoryError::DuplicateVirtualServer(vs.hostname.clone()));
            }
            for pin in [&vs.primary_server, &vs.secondary_server].into_iter().flatten() {
                if !hostnames.contains(pin.as_str()) {
                    warn!(
                        "Virtual server {} is pinned to unknown server {}; it cannot be placed",
                        vs.hostname, pin
                    );
                }
            }
        }

        let disk_capacity = servers.iter().map(sum_disk_capacity).collect::<Result<_, _>>()?;

        Ok(Self { servers, virtual_servers, disk_capacity })
    }

    pub(crate) fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub(crate) fn server(&self, index: usize) -> &Server {
        &self.servers[index]
    }

    pub(crate) fn virtual_server(&self, index: usize) -> &VirtualServer {
        &self.virtual_servers[index]
    }

    pub(crate) fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub(crate) fn virtual_server_count(&self) -> usize {
        self.virtual_servers.len()
    }

    pub(crate) fn disk_capacity(&self, server: usize, disk_type: DiskType) -> DiskCapacity {
        self.disk_capacity[server][disk_type.index()]
    }
}

fn sum_disk_capacity(
    server: &Server,
) -> Result<[DiskCapacity; DiskType::COUNT], InventoryError> {
    let mut capacity = [DiskCapacity::default(); DiskType::COUNT];
    for disk in &server.disks {
        let slot = &mut capacity[disk.disk_type.index()];
        slot.extents = slot
            .extents
            .checked_add(disk.extents)
            .filter(|&total| total <= MAX_QUANTITY)
            .ok_or_else(|| InventoryError::DiskCapacityOverflow {
                host: server.hostname.clone(),
                disk_type: disk.disk_type,
            })?;
        slot.disks += 1;
    }
    Ok(capacity)
}

/// Checks a single record; duplicate hostnames are caught by [`Inventory::new`].
pub(crate) fn validate_server(server: &Server) -> Result<(), InventoryError> {
    validate_hostname(&server.hostname)?;
    check_quantity(&server.hostname, "ram", server.ram)?;
    let mut devices = HashSet::with_capacity(server.disks.len());
    for disk in &server.disks {
        check_quantity(&server.hostname, "extents", disk.extents)?;
        if !devices.insert(disk.device.as_str()) {
            return Err(InventoryError::DuplicateDevice {
                host: server.hostname.clone(),
                device: disk.device.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn validate_virtual_server(vs: &VirtualServer) -> Result<(), InventoryError> {
    validate_hostname(&vs.hostname)?;

    if vs.processor_cores == 0 {
        return Err(InventoryError::ZeroCores(vs.hostname.clone()));
    }
    if vs.processor_weight == 0 || vs.processor_weight > MAX_PROCESSOR_WEIGHT {
        return Err(InventoryError::InvalidProcessorWeight {
            host: vs.hostname.clone(),
            weight: vs.processor_weight,
        });
    }
    check_quantity(&vs.hostname, "primary_ram", vs.primary_ram)?;
    check_quantity(&vs.hostname, "secondary_ram", vs.secondary_ram)?;
    if let (Some(primary), Some(secondary)) = (&vs.primary_server, &vs.secondary_server) {
        if primary == secondary {
            return Err(InventoryError::ConflictingPins {
                host: vs.hostname.clone(),
                server: primary.clone(),
            });
        }
    }

    let mut devices = HashSet::with_capacity(vs.disks.len());
    for disk in &vs.disks {
        check_quantity(&vs.hostname, "extents", disk.extents)?;
        if !devices.insert(disk.device.as_str()) {
            return Err(InventoryError::DuplicateDevice {
                host: vs.hostname.clone(),
                device: disk.device.clone(),
            });
        }
    }
    Ok(())
}
