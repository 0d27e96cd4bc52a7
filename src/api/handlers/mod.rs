mod optimize;
mod runs;
mod servers;
mod settings;
mod sse;
mod status;
mod virtual_servers;

pub(super) use optimize::start_optimize;
pub(super) use runs::{cancel_run, get_run};
pub(super) use servers::{delete_server, get_servers, upsert_server};
pub(super) use settings::{get_settings, update_settings};
pub(super) use sse::sse_events;
pub(super) use status::get_status;
pub(super) use virtual_servers::{delete_virtual_server, get_virtual_servers, upsert_virtual_server};
