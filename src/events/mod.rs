mod hub;

pub use hub::{Event, EventHub};
pub(crate) use hub::RunProgress;
