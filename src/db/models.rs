use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of one disk extent in bytes. All disk capacity accounting is done in extents.
pub(crate) const EXTENT_SIZE_BYTES: u64 = 32 * 1024 * 1024;

/// Processor architecture. Constraints on it are exact matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorArchitecture {
    I686,
    X86_64,
    Aarch64,
}

impl ProcessorArchitecture {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::I686 => "i686",
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
        }
    }
}

impl fmt::Display for ProcessorArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProcessorArchitecture {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "i686" => Ok(Self::I686),
            "x86_64" => Ok(Self::X86_64),
            "aarch64" => Ok(Self::Aarch64),
            _ => Err(format!("invalid processor architecture: {s}")),
        }
    }
}

/// Processor generation, declared oldest first. The derived ordering backs
/// "at least this type" requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorType {
    Pentium4,
    Core2,
    Xeon,
    XeonE5,
    Epyc,
}

impl ProcessorType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pentium4 => "pentium_4",
            Self::Core2 => "core_2",
            Self::Xeon => "xeon",
            Self::XeonE5 => "xeon_e5",
            Self::Epyc => "epyc",
        }
    }
}

impl fmt::Display for ProcessorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProcessorType {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pentium_4" => Ok(Self::Pentium4),
            "core_2" => Ok(Self::Core2),
            "xeon" => Ok(Self::Xeon),
            "xeon_e5" => Ok(Self::XeonE5),
            "epyc" => Ok(Self::Epyc),
            _ => Err(format!("invalid processor type: {s}")),
        }
    }
}

/// Storage class of a physical disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskType {
    Sata,
    Sas,
    Ssd,
}

impl DiskType {
    pub const COUNT: usize = 3;

    /// Every disk type, in a fixed order.
    pub const ALL: [Self; Self::COUNT] = [Self::Sata, Self::Sas, Self::Ssd];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sata => "sata",
            Self::Sas => "sas",
            Self::Ssd => "ssd",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Sata => 0,
            Self::Sas => 1,
            Self::Ssd => 2,
        }
    }
}

impl fmt::Display for DiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DiskType {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "sata" => Ok(Self::Sata),
            "sas" => Ok(Self::Sas),
            "ssd" => Ok(Self::Ssd),
            _ => Err(format!("invalid disk type: {s}")),
        }
    }
}

/// A physical disk attached to a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub device: String,
    pub disk_type: DiskType,
    /// Capacity in extents of [`EXTENT_SIZE_BYTES`].
    pub extents: u64,
}

impl Disk {
    pub const fn capacity_bytes(&self) -> u64 {
        self.extents.saturating_mul(EXTENT_SIZE_BYTES)
    }
}

/// A physical host that can run virtual servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub hostname: String,
    pub processor_type: ProcessorType,
    pub processor_architecture: ProcessorArchitecture,
    /// MHz.
    pub processor_speed: u32,
    pub processor_cores: u32,
    /// Megabytes.
    pub ram: u64,
    #[serde(default)]
    pub disks: Vec<Disk>,
}

/// A virtual disk of a virtual server. The primary and secondary copies use the
/// same number of extents but may live on different disk types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualDisk {
    pub device: String,
    pub extents: u64,
    pub primary_disk_type: DiskType,
    pub secondary_disk_type: DiskType,
    /// Thousandths of one physical disk.
    pub primary_weight: u32,
    /// Thousandths of one physical disk.
    pub secondary_weight: u32,
}

/// A virtual server that needs a primary and a failover host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualServer {
    pub hostname: String,
    /// Manually pinned primary host.
    #[serde(default)]
    pub primary_server: Option<String>,
    /// Manually pinned secondary host.
    #[serde(default)]
    pub secondary_server: Option<String>,
    #[serde(default)]
    pub minimum_processor_type: Option<ProcessorType>,
    #[serde(default)]
    pub processor_architecture: Option<ProcessorArchitecture>,
    /// MHz.
    #[serde(default)]
    pub minimum_processor_speed: Option<u32>,
    pub processor_cores: u32,
    /// Share of each core in thousandths (1000 = a full dedicated core).
    pub processor_weight: u32,
    /// Megabytes.
    pub primary_ram: u64,
    /// Megabytes.
    pub secondary_ram: u64,
    #[serde(default)]
    pub disks: Vec<VirtualDisk>,
}

impl VirtualServer {
    /// Processor weight this virtual server puts on its primary host.
    pub const fn processor_demand(&self) -> u64 {
        self.processor_cores as u64 * self.processor_weight as u64
    }
}

/// Status of an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Infeasible,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Infeasible => "infeasible",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RunStatus {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "infeasible" => Ok(Self::Infeasible),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid run status: {s}")),
        }
    }
}

/// One optimizer run as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub id: i64,
    pub created_at: Option<String>,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    /// 0 means enumerate every mapping.
    pub max_mappings: u64,
    pub mappings_found: u64,
    pub candidates_tried: u64,
    pub candidates_rejected: u64,
    /// Rejection counts by reason, as JSON.
    pub rejections: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

/// Resolved placement of one virtual server in the stored mapping of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlacement {
    pub virtual_server: String,
    pub primary_server: String,
    pub secondary_server: String,
}

/// Totals written when a run finishes.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub mappings_found: u64,
    pub candidates_tried: u64,
    pub candidates_rejected: u64,
    pub rejections: serde_json::Value,
    pub error_message: Option<String>,
}
