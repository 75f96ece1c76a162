//! Watch-progress tracking engine for embedded video activities.
//!
//! The crate keeps one watermark per (activity, user) pair: the highest
//! playback percentage ever observed. A [`tracker::ProgressTracker`]
//! owns the watermark and debounces writes to a
//! [`store::ProgressStore`]; a [`player::PlayerController`] feeds it
//! samples from a [`player::PlayerHandle`] while translating player
//! lifecycle events into flush points. [`session::WatchSession`] wires
//! the three together for one page/viewing session.

pub mod config;
pub mod constants;
pub mod events;
pub mod models;
pub mod player;
pub mod session;
pub mod store;
pub mod tracker;

pub use config::Config;
pub use events::{EventKind, TrackerEvent};
pub use models::{ActivityId, PlayerId, ProgressRecord, TrackerSnapshot, UserId};
pub use player::{
    ControllerConfig, PlayerController, PlayerEvent, PlayerHandle, SessionState, SimulatedPlayer,
};
pub use session::WatchSession;
pub use store::{MemoryProgressStore, ProgressStore, RestProgressStore, StoreError};
pub use tracker::ProgressTracker;
