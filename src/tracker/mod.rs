use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::constants;
use crate::events::{Dispatcher, EventKind, Listener, TrackerEvent};
use crate::models::{ActivityId, ProgressRecord, TrackerSnapshot, UserId};
use crate::store::ProgressStore;

/// Owner of the watch watermark for one (activity, user) pair.
///
/// The tracker receives instantaneous progress samples, keeps the highest
/// one seen, and hands it to the store at most once per debounce window.
/// Completion is the exception and is never held back. Cloning yields
/// another handle to the same tracker.
///
/// All mutating methods are synchronous: the watermark decision and the
/// decision to save happen before the call returns, while the store
/// round-trip itself is fired as a background task and reported through
/// the `Received` notification. Methods must be called from within a
/// tokio runtime.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug)]
struct TrackerInner {
    store: Arc<dyn ProgressStore>,
    debounce_interval: Duration,
    dispatcher: Dispatcher,
    state: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    activity_id: Option<ActivityId>,
    user_id: Option<UserId>,
    current_progress: Option<f64>,
    maximum_progress: Option<f64>,
    save_pending: bool,
    /// At most one trailing timer, replaced (never leaked) on rearm.
    debounce_timer: Option<JoinHandle<()>>,
    in_flight_requests: u32,
}

impl Drop for TrackerState {
    fn drop(&mut self) {
        if let Some(timer) = self.debounce_timer.take() {
            timer.abort();
        }
    }
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self::with_debounce_interval(store, constants::DEFAULT_DEBOUNCE_INTERVAL)
    }

    /// A zero interval disables debouncing: every raised watermark is
    /// written out immediately.
    pub fn with_debounce_interval(store: Arc<dyn ProgressStore>, debounce_interval: Duration) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                store,
                debounce_interval,
                dispatcher: Dispatcher::new(),
                state: Mutex::new(TrackerState::default()),
            }),
        }
    }

    /// Bind the tracker to its (activity, user) pair and seed the
    /// watermark with a previously stored value. Must be called exactly
    /// once before `update`; repeated calls are ignored.
    pub fn initialise(
        &self,
        activity_id: ActivityId,
        user_id: UserId,
        known_maximum: Option<f64>,
    ) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if state.activity_id.is_some() {
                warn!("tracker already initialised, ignoring");
                return;
            }
            debug!(%activity_id, %user_id, ?known_maximum, "tracker initialised");
            state.activity_id = Some(activity_id);
            state.user_id = Some(user_id);
            state.maximum_progress = known_maximum.filter(|p| p.is_finite());
        }
        self.emit_updated();
    }

    /// Record an instantaneous sample. Non-finite samples (duration still
    /// unknown upstream) are discarded outright. A sample strictly above
    /// the watermark raises it and triggers a save; a sample equal to the
    /// watermark does not.
    pub fn update(&self, sample: f64) {
        if !sample.is_finite() {
            trace!(sample, "discarding non-finite progress sample");
            return;
        }

        let raised = {
            let mut state = self.inner.state.lock().unwrap();
            state.current_progress = Some(sample);
            let above = state.maximum_progress.map_or(true, |max| sample > max);
            if above {
                state.maximum_progress = Some(sample);
                state.save_pending = true;
            }
            above
        };

        if raised {
            self.save();
        }
        self.emit_updated();
    }

    /// Overwrite both the current sample and the watermark, then save
    /// immediately. The caller has external authority here: the value is
    /// applied even when it is lower than the watermark, and clamping to
    /// [0, 100] is the caller's responsibility.
    pub fn force_update(&self, progress: f64) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.current_progress = Some(progress);
            state.maximum_progress = Some(progress);
            state.save_pending = true;
        }
        self.save();
        self.emit_updated();
    }

    /// Persist the watermark if a save is pending. While a debounce timer
    /// is armed the save is deferred to it, unless the watermark has
    /// reached completion, in which case the write goes out immediately.
    pub fn save(&self) {
        self.save_inner(true);
    }

    /// Cancel any armed debounce timer and flush a pending save right
    /// away. Used at natural checkpoints (pause, end of session) where
    /// losing a recent update would be most noticeable.
    pub fn save_now(&self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if let Some(timer) = state.debounce_timer.take() {
                timer.abort();
            }
        }
        self.save_inner(false);
    }

    fn save_inner(&self, arm_trailing: bool) {
        let write = {
            let mut state = self.inner.state.lock().unwrap();
            if !state.save_pending {
                return;
            }

            let complete =
                state.maximum_progress.unwrap_or(0.0) >= constants::COMPLETE_PERCENT;
            if state.debounce_timer.is_some() && !complete {
                // The trailing timer will flush whatever accumulates.
                return;
            }

            let (Some(activity_id), Some(user_id)) =
                (state.activity_id.clone(), state.user_id.clone())
            else {
                warn!("save requested before initialise, keeping it pending");
                return;
            };

            state.save_pending = false;
            state.in_flight_requests += 1;

            if arm_trailing && !self.inner.debounce_interval.is_zero() {
                if let Some(timer) = state.debounce_timer.take() {
                    timer.abort();
                }
                state.debounce_timer = Some(self.spawn_debounce_timer());
            }

            (activity_id, user_id, state.maximum_progress.unwrap_or(0.0))
        };

        self.spawn_write(write);
        self.emit_updated();
    }

    /// Fetch the stored record and run it through the reception path, as
    /// if it were a write confirmation.
    pub fn refresh(&self) {
        let (activity_id, user_id) = {
            let mut state = self.inner.state.lock().unwrap();
            let (Some(activity_id), Some(user_id)) =
                (state.activity_id.clone(), state.user_id.clone())
            else {
                warn!("refresh requested before initialise");
                return;
            };
            state.in_flight_requests += 1;
            (activity_id, user_id)
        };

        let request_id = Uuid::new_v4();
        debug!(%request_id, %activity_id, %user_id, "refreshing stored record");

        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let Some(inner) = weak.upgrade() else { return };
            let result = inner.store.fetch(&activity_id, &user_id).await;
            let tracker = ProgressTracker { inner };
            tracker.receive(request_id, result.map_err(|e| e.to_string()));
        });
    }

    pub fn on_updated(&self, listener: impl Fn(&TrackerEvent) + Send + Sync + 'static) {
        self.inner
            .dispatcher
            .add_listener(EventKind::Updated, Arc::new(listener));
    }

    pub fn on_received(&self, listener: impl Fn(&TrackerEvent) + Send + Sync + 'static) {
        self.inner
            .dispatcher
            .add_listener(EventKind::Received, Arc::new(listener));
    }

    pub fn add_listener(&self, kind: EventKind, listener: Listener) {
        self.inner.dispatcher.add_listener(kind, listener);
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = self.inner.state.lock().unwrap();
        TrackerSnapshot {
            activity_id: state.activity_id.clone(),
            user_id: state.user_id.clone(),
            current_progress: state.current_progress,
            maximum_progress: state.maximum_progress,
            save_pending: state.save_pending,
            debounce_armed: state.debounce_timer.is_some(),
            in_flight_requests: state.in_flight_requests,
        }
    }

    fn spawn_debounce_timer(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.debounce_interval;
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let Some(inner) = weak.upgrade() else { return };
            let tracker = ProgressTracker { inner };
            tracker.inner.state.lock().unwrap().debounce_timer = None;
            trace!("debounce window elapsed");
            tracker.save();
        })
    }

    fn spawn_write(&self, (activity_id, user_id, maximum_progress): (ActivityId, UserId, f64)) {
        let request_id = Uuid::new_v4();
        debug!(%request_id, %activity_id, %user_id, maximum_progress, "persisting watermark");

        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let Some(inner) = weak.upgrade() else { return };
            let result = inner
                .store
                .upsert(&activity_id, &user_id, maximum_progress, None)
                .await;
            let tracker = ProgressTracker { inner };
            tracker.receive(request_id, result.map_err(|e| e.to_string()));
        });
    }

    /// Reception path for every completed store round-trip. The server's
    /// record can raise the local watermark when it is ahead (another tab
    /// finished first), but never lowers it, and never marks a save
    /// pending.
    fn receive(&self, request_id: Uuid, outcome: Result<ProgressRecord, String>) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.in_flight_requests = state.in_flight_requests.saturating_sub(1);
        }
        self.emit_updated();

        match &outcome {
            Ok(record) => {
                let adopted = {
                    let mut state = self.inner.state.lock().unwrap();
                    let ahead = state
                        .maximum_progress
                        .map_or(true, |max| record.maximum_progress > max);
                    if ahead {
                        state.maximum_progress = Some(record.maximum_progress);
                    }
                    ahead
                };
                if adopted {
                    debug!(
                        %request_id,
                        server = record.maximum_progress,
                        "server watermark ahead, adopting"
                    );
                }
            }
            Err(error) => {
                warn!(%request_id, error = %error, "progress round-trip failed");
            }
        }

        self.inner.dispatcher.dispatch(&TrackerEvent::Received {
            request_id,
            outcome,
        });
        self.emit_updated();
    }

    fn emit_updated(&self) {
        self.inner.dispatcher.dispatch(&TrackerEvent::Updated {
            snapshot: self.snapshot(),
        });
    }
}
