use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::broadcast;

/// Lifecycle notifications surfaced by a player implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Media metadata, notably the duration, became available.
    MediaLoaded,
    Played,
    Paused,
    Ended,
}

/// Abstraction over the embedded video player widget.
///
/// Position and duration return `None` while the player does not know
/// them yet; callers are expected to skip such readings.
#[async_trait]
pub trait PlayerHandle: Send + Sync + std::fmt::Debug {
    async fn position(&self) -> Option<Duration>;

    async fn duration(&self) -> Option<Duration>;

    async fn seek(&self, position: Duration) -> Result<()>;

    /// Subscribe to lifecycle events. Each call returns an independent
    /// receiver; events sent before subscription are not replayed.
    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;
}
