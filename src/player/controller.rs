use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::traits::{PlayerEvent, PlayerHandle};
use crate::constants;
use crate::models::{ActivityId, PlayerId, UserId};
use crate::tracker::ProgressTracker;

/// Everything the controller needs to bind one player to one tracker.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub player_id: PlayerId,
    pub activity_id: ActivityId,
    pub user_id: UserId,
    /// Previously stored watermark; seeds the tracker and picks the
    /// resume position.
    pub maximum_progress: Option<f64>,
    pub sample_interval: Duration,
    pub restart_threshold_percent: f64,
}

impl ControllerConfig {
    pub fn new(
        player_id: PlayerId,
        activity_id: ActivityId,
        user_id: UserId,
        maximum_progress: Option<f64>,
    ) -> Self {
        Self {
            player_id,
            activity_id,
            user_id,
            maximum_progress,
            sample_interval: Duration::from_secs_f64(
                1.0 / f64::from(constants::DEFAULT_SAMPLE_RATE_HZ),
            ),
            restart_threshold_percent: constants::RESTART_THRESHOLD_PERCENT,
        }
    }
}

/// Where the viewing session currently stands. `Ended` is terminal; a new
/// session needs a fresh controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Loaded,
    Playing,
    Paused,
    Ended,
}

/// Binds player lifecycle events to the tracker's sampling cadence.
///
/// Construction seeds the tracker but starts nothing; `attach` spawns the
/// event loop, and sampling only runs between the matching player events.
#[derive(Debug, Clone)]
pub struct PlayerController {
    inner: Arc<ControllerInner>,
}

#[derive(Debug)]
struct ControllerInner {
    player: Arc<dyn PlayerHandle>,
    tracker: ProgressTracker,
    player_id: PlayerId,
    starting_progress: Option<f64>,
    sample_interval: Duration,
    restart_threshold: f64,
    shutdown: CancellationToken,
    state: Mutex<ControllerState>,
}

#[derive(Debug, Default)]
struct ControllerState {
    session: SessionState,
    /// At most one sampling timer; restart replaces it.
    sampler: Option<JoinHandle<()>>,
    event_loop: Option<JoinHandle<()>>,
}

impl Drop for ControllerState {
    fn drop(&mut self) {
        if let Some(handle) = self.sampler.take() {
            handle.abort();
        }
        if let Some(handle) = self.event_loop.take() {
            handle.abort();
        }
    }
}

impl PlayerController {
    pub fn new(
        config: ControllerConfig,
        player: Arc<dyn PlayerHandle>,
        tracker: ProgressTracker,
    ) -> Self {
        tracker.initialise(
            config.activity_id.clone(),
            config.user_id.clone(),
            config.maximum_progress,
        );

        debug!(player_id = %config.player_id, "player controller created");

        Self {
            inner: Arc::new(ControllerInner {
                player,
                tracker,
                player_id: config.player_id,
                starting_progress: config.maximum_progress,
                sample_interval: config.sample_interval,
                restart_threshold: config.restart_threshold_percent,
                shutdown: CancellationToken::new(),
                state: Mutex::new(ControllerState::default()),
            }),
        }
    }

    /// Spawn the event loop that translates player events into tracker
    /// calls. Idempotent; a second call is ignored.
    pub fn attach(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if state.event_loop.is_some() {
            warn!(player_id = %self.inner.player_id, "controller already attached");
            return;
        }

        // Subscribe before spawning so no event emitted after attach()
        // returns can be missed.
        let mut events = self.inner.player.subscribe();
        let token = self.inner.shutdown.clone();
        let weak = Arc::downgrade(&self.inner);
        let player_id = self.inner.player_id.clone();

        state.event_loop = Some(tokio::spawn(async move {
            debug!(%player_id, "listening for player events");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => {
                            let Some(inner) = weak.upgrade() else { break };
                            PlayerController::handle_event(&inner, event).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(%player_id, skipped, "player event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!(%player_id, "player event loop ended");
        }));
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.state.lock().unwrap().session
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.inner.tracker
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.inner.player_id
    }

    /// Stop sampling and detach from the player. Does not flush the
    /// tracker; callers wanting a final write use `save_now` first.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        Self::stop_sampling(&self.inner);
        let mut state = self.inner.state.lock().unwrap();
        if let Some(handle) = state.event_loop.take() {
            handle.abort();
        }
    }

    async fn handle_event(inner: &Arc<ControllerInner>, event: PlayerEvent) {
        debug!(player_id = %inner.player_id, ?event, "player event");
        match event {
            PlayerEvent::MediaLoaded => Self::on_media_loaded(inner).await,
            PlayerEvent::Played => Self::on_played(inner),
            PlayerEvent::Paused => Self::on_paused(inner),
            PlayerEvent::Ended => Self::on_ended(inner),
        }
    }

    async fn on_media_loaded(inner: &Arc<ControllerInner>) {
        {
            let state = inner.state.lock().unwrap();
            if state.session != SessionState::Idle {
                debug!("metadata reloaded mid-session, ignoring");
                return;
            }
        }

        let start = match inner.player.duration().await {
            Some(duration) if !duration.is_zero() => {
                let percent = inner.starting_progress.unwrap_or(0.0);
                if percent > inner.restart_threshold {
                    // A finished viewing restarts from the top instead of
                    // resuming seconds before the end.
                    Duration::ZERO
                } else {
                    duration.mul_f64((percent / 100.0).clamp(0.0, 1.0))
                }
            }
            _ => Duration::ZERO,
        };

        debug!(player_id = %inner.player_id, ?start, "seeking to resume position");
        if let Err(e) = inner.player.seek(start).await {
            warn!(player_id = %inner.player_id, error = %e, "resume seek failed");
        }

        inner.state.lock().unwrap().session = SessionState::Loaded;
        Self::start_sampling(inner);
    }

    fn on_played(inner: &Arc<ControllerInner>) {
        {
            let mut state = inner.state.lock().unwrap();
            if state.session == SessionState::Ended {
                debug!("play after end of session, ignoring");
                return;
            }
            state.session = SessionState::Playing;
        }
        Self::start_sampling(inner);
    }

    fn on_paused(inner: &Arc<ControllerInner>) {
        {
            let mut state = inner.state.lock().unwrap();
            if state.session == SessionState::Ended {
                return;
            }
            state.session = SessionState::Paused;
        }
        Self::stop_sampling(inner);
        // A pause is a natural checkpoint; losing unsent progress here
        // would be the most noticeable.
        inner.tracker.save_now();
    }

    fn on_ended(inner: &Arc<ControllerInner>) {
        Self::stop_sampling(inner);
        // The last sample can land just under 100 through duration
        // rounding; end of media is completion regardless.
        inner.tracker.force_update(constants::COMPLETE_PERCENT);
        inner.tracker.save_now();
        inner.state.lock().unwrap().session = SessionState::Ended;
    }

    fn start_sampling(inner: &Arc<ControllerInner>) {
        let mut state = inner.state.lock().unwrap();
        if let Some(handle) = state.sampler.take() {
            handle.abort();
        }

        let player = inner.player.clone();
        let tracker = inner.tracker.clone();
        let interval = inner.sample_interval;

        state.sampler = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;

                let position = player.position().await;
                let duration = player.duration().await;
                let (Some(position), Some(duration)) = (position, duration) else {
                    trace!("skipping sample, player not ready");
                    continue;
                };

                let percentage = position.as_secs_f64() / duration.as_secs_f64() * 100.0;
                if percentage.is_finite() {
                    trace!(percentage, "sampled playback position");
                    tracker.update(percentage);
                } else {
                    trace!("skipping sample, duration unknown");
                }
            }
        }));
    }

    fn stop_sampling(inner: &Arc<ControllerInner>) {
        let mut state = inner.state.lock().unwrap();
        if let Some(handle) = state.sampler.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::SimulatedPlayer;
    use crate::store::{MemoryProgressStore, ProgressStore};

    async fn settle() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    struct Harness {
        player: Arc<SimulatedPlayer>,
        store: Arc<MemoryProgressStore>,
        controller: PlayerController,
    }

    fn harness(duration: Option<Duration>, maximum_progress: Option<f64>) -> Harness {
        let player = Arc::new(SimulatedPlayer::new(duration));
        let store = Arc::new(MemoryProgressStore::new());
        let tracker = ProgressTracker::with_debounce_interval(store.clone(), Duration::ZERO);

        let config = ControllerConfig::new(
            PlayerId::new("p1"),
            ActivityId::new("a1"),
            UserId::new("u1"),
            maximum_progress,
        );
        let controller = PlayerController::new(config, player.clone(), tracker);
        controller.attach();

        Harness {
            player,
            store,
            controller,
        }
    }

    async fn stored_maximum(store: &MemoryProgressStore) -> f64 {
        store
            .fetch(&ActivityId::new("a1"), &UserId::new("u1"))
            .await
            .unwrap()
            .maximum_progress
    }

    #[tokio::test(start_paused = true)]
    async fn media_loaded_seeks_to_resume_position() {
        let h = harness(Some(secs(200)), Some(50.0));

        h.player.emit(PlayerEvent::MediaLoaded);
        settle().await;

        assert_eq!(h.player.position().await, Some(secs(100)));
        assert_eq!(h.controller.session_state(), SessionState::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_viewing_restarts_from_zero() {
        let h = harness(Some(secs(200)), Some(99.0));
        h.player.set_position(secs(42));

        h.player.emit(PlayerEvent::MediaLoaded);
        settle().await;

        assert_eq!(h.player.position().await, Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn media_loaded_is_only_honoured_once() {
        let h = harness(Some(secs(200)), Some(50.0));

        h.player.emit(PlayerEvent::MediaLoaded);
        settle().await;
        h.player.set_position(secs(150));
        h.player.emit(PlayerEvent::MediaLoaded);
        settle().await;

        // The second load must not seek again.
        assert_eq!(h.player.position().await, Some(secs(150)));
    }

    #[tokio::test(start_paused = true)]
    async fn sampling_feeds_the_tracker_while_playing() {
        let h = harness(Some(secs(200)), Some(0.0));

        h.player.emit(PlayerEvent::Played);
        settle().await;
        assert_eq!(h.controller.session_state(), SessionState::Playing);

        h.player.set_position(secs(120));
        tokio::time::advance(h.controller.inner.sample_interval).await;
        settle().await;

        assert_eq!(
            h.controller.tracker().snapshot().maximum_progress,
            Some(60.0)
        );
        assert_eq!(stored_maximum(&h.store).await, 60.0);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_sampling_and_flushes() {
        let h = harness(Some(secs(200)), Some(0.0));

        h.player.emit(PlayerEvent::Played);
        settle().await;
        h.player.set_position(secs(50));
        tokio::time::advance(h.controller.inner.sample_interval).await;
        settle().await;

        h.player.emit(PlayerEvent::Paused);
        settle().await;
        assert_eq!(h.controller.session_state(), SessionState::Paused);

        // Position moves while paused; no further samples may arrive.
        h.player.set_position(secs(190));
        tokio::time::advance(h.controller.inner.sample_interval).await;
        settle().await;

        assert_eq!(
            h.controller.tracker().snapshot().maximum_progress,
            Some(25.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ended_forces_completion_regardless_of_last_sample() {
        let h = harness(Some(secs(200)), Some(0.0));

        h.player.emit(PlayerEvent::Played);
        settle().await;
        h.player.set_position(Duration::from_millis(194_800));
        tokio::time::advance(h.controller.inner.sample_interval).await;
        settle().await;

        let before = h.controller.tracker().snapshot().maximum_progress.unwrap();
        assert!(before < 100.0);

        h.player.emit(PlayerEvent::Ended);
        settle().await;

        assert_eq!(h.controller.session_state(), SessionState::Ended);
        assert_eq!(
            h.controller.tracker().snapshot().maximum_progress,
            Some(100.0)
        );
        assert_eq!(stored_maximum(&h.store).await, 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn ended_is_terminal_for_the_session() {
        let h = harness(Some(secs(200)), Some(0.0));

        h.player.emit(PlayerEvent::Ended);
        settle().await;
        h.player.emit(PlayerEvent::Played);
        settle().await;

        assert_eq!(h.controller.session_state(), SessionState::Ended);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_duration_produces_no_samples() {
        let h = harness(None, None);

        h.player.emit(PlayerEvent::Played);
        settle().await;
        tokio::time::advance(h.controller.inner.sample_interval).await;
        settle().await;

        let snapshot = h.controller.tracker().snapshot();
        assert_eq!(snapshot.maximum_progress, None);
        assert_eq!(stored_maximum(&h.store).await, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_produces_no_samples() {
        let h = harness(Some(Duration::ZERO), None);

        h.player.emit(PlayerEvent::Played);
        settle().await;
        tokio::time::advance(h.controller.inner.sample_interval).await;
        settle().await;

        assert_eq!(h.controller.tracker().snapshot().maximum_progress, None);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_detaches_from_player_events() {
        let h = harness(Some(secs(200)), Some(0.0));

        h.controller.shutdown();
        settle().await;

        h.player.emit(PlayerEvent::Played);
        settle().await;

        assert_eq!(h.controller.session_state(), SessionState::Idle);
    }
}
