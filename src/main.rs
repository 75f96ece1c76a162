use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use watchmark::{
    ActivityId, Config, MemoryProgressStore, PlayerEvent, PlayerId, ProgressRecord, ProgressStore,
    SimulatedPlayer, TrackerEvent, UserId, WatchSession,
};

/// Drives a scripted viewing session against the tracking engine: resume
/// from a stored record, watch most of the video, pause once, then run to
/// the end. Useful for eyeballing the event flow with RUST_LOG=trace.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watchmark=debug".into()),
        )
        .init();

    info!("Starting watchmark playback simulation");

    let config = Config::default();
    let activity = ActivityId::new("demo-activity");
    let user = UserId::new("demo-user");

    let store = Arc::new(MemoryProgressStore::new());
    // Pretend an earlier session got a fifth of the way through.
    store.seed(ProgressRecord {
        activity_id: activity.clone(),
        user_id: user.clone(),
        maximum_progress: 20.0,
        duration_watched: None,
        created_at: None,
        modified_at: None,
    });

    let player = Arc::new(SimulatedPlayer::new(Some(Duration::from_secs(120))));

    let session = WatchSession::begin(
        &config,
        player.clone(),
        store.clone(),
        activity.clone(),
        user.clone(),
        PlayerId::new("demo-player"),
    )
    .await;

    session.tracker().on_received(|event| {
        if let TrackerEvent::Received { outcome, .. } = event {
            match outcome {
                Ok(record) => info!(stored = record.maximum_progress, "write confirmed"),
                Err(error) => info!(error = %error, "write failed"),
            }
        }
    });

    player.emit(PlayerEvent::MediaLoaded);
    player.emit(PlayerEvent::Played);

    // Watch two thirds of the video in simulated one-second steps.
    for _ in 0..80 {
        player.advance_position(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    debug!("viewer takes a break");
    player.emit(PlayerEvent::Paused);
    tokio::time::sleep(Duration::from_millis(200)).await;

    player.emit(PlayerEvent::Played);
    player.set_position(Duration::from_secs(119));
    tokio::time::sleep(Duration::from_millis(200)).await;

    player.emit(PlayerEvent::Ended);
    tokio::time::sleep(Duration::from_millis(200)).await;

    session.end();

    let snapshot = session.tracker().snapshot();
    let record = store.fetch(&activity, &user).await?;
    info!(
        local = ?snapshot.maximum_progress,
        stored = record.maximum_progress,
        "session finished"
    );

    Ok(())
}
