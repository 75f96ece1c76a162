use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::trace;

use super::traits::{PlayerEvent, PlayerHandle};

/// Scriptable stand-in for a real player widget, used by the simulator
/// binary and the test suite. Position and duration are plain fields the
/// caller moves by hand; lifecycle events are emitted explicitly.
#[derive(Debug)]
pub struct SimulatedPlayer {
    state: Mutex<Playhead>,
    events: broadcast::Sender<PlayerEvent>,
}

#[derive(Debug, Clone, Copy)]
struct Playhead {
    position: Duration,
    duration: Option<Duration>,
}

impl SimulatedPlayer {
    pub fn new(duration: Option<Duration>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            state: Mutex::new(Playhead {
                position: Duration::ZERO,
                duration,
            }),
            events,
        }
    }

    /// Emit a lifecycle event to all subscribers. Dropped silently when
    /// nobody is listening yet.
    pub fn emit(&self, event: PlayerEvent) {
        trace!(?event, "simulated player event");
        let _ = self.events.send(event);
    }

    pub fn set_position(&self, position: Duration) {
        self.state.lock().unwrap().position = position;
    }

    /// Move the playhead forward, clamped to the media duration.
    pub fn advance_position(&self, by: Duration) {
        let mut state = self.state.lock().unwrap();
        let mut position = state.position + by;
        if let Some(duration) = state.duration {
            position = position.min(duration);
        }
        state.position = position;
    }

    pub fn set_duration(&self, duration: Option<Duration>) {
        self.state.lock().unwrap().duration = duration;
    }
}

#[async_trait]
impl PlayerHandle for SimulatedPlayer {
    async fn position(&self) -> Option<Duration> {
        Some(self.state.lock().unwrap().position)
    }

    async fn duration(&self) -> Option<Duration> {
        self.state.lock().unwrap().duration
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.position = match state.duration {
            Some(duration) => position.min(duration),
            None => position,
        };
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}
