use crate::cluster::{PathStep, ProgressSink, ProgressSnapshot, RejectionTally};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Events that flow from optimizer runs to SSE subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    /// A run has loaded its inventory and started searching.
    OptimizeStarted {
        run_id: i64,
        servers: usize,
        virtual_servers: usize,
        max_mappings: u64,
        started_at: DateTime<Utc>,
    },

    /// Periodic snapshot of a running search.
    OptimizeProgress {
        run_id: i64,
        depth: usize,
        virtual_servers: usize,
        path: Vec<PathStep>,
        mappings_found: u64,
        candidates_tried: u64,
        candidates_rejected: u64,
        candidates_per_second: f64,
    },

    /// A complete mapping was found.
    MappingFound { run_id: i64, ordinal: u64 },

    /// The run has finished, whatever the outcome.
    OptimizeComplete {
        run_id: i64,
        status: String, // "completed" | "infeasible" | "cancelled" | "failed"
        mappings_found: u64,
        candidates_tried: u64,
        candidates_rejected: u64,
        rejections: RejectionTally,
        duration_seconds: f64,
    },

    /// A generic error event.
    DaemonError { message: String },
}

impl Event {
    /// Returns the SSE event type name for this event variant.
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::OptimizeStarted { .. } => "optimize_started",
            Self::OptimizeProgress { .. } => "optimize_progress",
            Self::MappingFound { .. } => "mapping_found",
            Self::OptimizeComplete { .. } => "optimize_complete",
            Self::DaemonError { .. } => "daemon_error",
        }
    }

    /// The run this event belongs to, if any.
    pub const fn run_id(&self) -> Option<i64> {
        match self {
            Self::OptimizeStarted { run_id, .. }
            | Self::OptimizeProgress { run_id, .. }
            | Self::MappingFound { run_id, .. }
            | Self::OptimizeComplete { run_id, .. } => Some(*run_id),
            Self::DaemonError { .. } => None,
        }
    }
}

/// The central event broadcast hub.
///
/// Optimizer runs send events here via `publish()`.
/// SSE endpoint handlers subscribe via `subscribe()` and forward events to clients.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<Event>,
}

impl EventHub {
    /// Create a new EventHub with the given channel capacity.
    ///
    /// Subscribers that fall more than `capacity` events behind get a `Lagged`
    /// error and miss the intermediate events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Errors only when nobody is subscribed, which callers ignore.
    pub fn publish(&self, event: Event) -> Result<usize, broadcast::error::SendError<Event>> {
        self.sender.send(event)
    }

    /// Subscribe to the event stream. Returns a broadcast Receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

/// Forwards search progress of one run to the hub.
pub(crate) struct RunProgress<'a> {
    pub hub: &'a EventHub,
    pub run_id: i64,
}

impl ProgressSink for RunProgress<'_> {
    fn progress(&self, snapshot: &ProgressSnapshot) {
        let _ = self.hub.publish(Event::OptimizeProgress {
            run_id: self.run_id,
            depth: snapshot.depth,
            virtual_servers: snapshot.virtual_servers,
            path: snapshot.path.clone(),
            mappings_found: snapshot.mappings_found,
            candidates_tried: snapshot.candidates_tried,
            candidates_rejected: snapshot.candidates_rejected,
            candidates_per_second: snapshot.candidates_per_second,
        });
    }
}
