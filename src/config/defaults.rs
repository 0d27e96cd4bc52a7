/// Default path of the daemon's config file.
pub(super) const DEFAULT_CONFIG_PATH: &str = "/etc/cluster-mapper/cluster-mapper.cfg";

/// Default path for the SQLite inventory database.
pub(super) const DEFAULT_DB_PATH: &str = "/var/lib/cluster-mapper/inventory.db";

/// Default port the daemon listens on (localhost only).
pub(super) const DEFAULT_PORT: u16 = 7093;

/// Default number of mappings to find before stopping (1 = first feasible mapping).
pub(super) const DEFAULT_MAX_MAPPINGS: u64 = 1;

/// Default minimum interval between progress snapshots.
pub(super) const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1000;

/// Default search time limit in seconds (0 = unlimited).
pub(super) const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 600;
