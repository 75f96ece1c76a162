mod dispatcher;
mod types;

pub use dispatcher::{Dispatcher, Listener};
pub use types::{EventKind, TrackerEvent};
