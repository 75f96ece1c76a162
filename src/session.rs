use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{ActivityId, PlayerId, UserId};
use crate::player::{ControllerConfig, PlayerController, PlayerHandle};
use crate::store::ProgressStore;
use crate::tracker::ProgressTracker;

/// One viewing session: a tracker seeded from the store and a controller
/// attached to the player, constructed and owned explicitly by the
/// hosting code rather than living as a hidden singleton.
#[derive(Debug)]
pub struct WatchSession {
    tracker: ProgressTracker,
    controller: PlayerController,
}

impl WatchSession {
    /// Fetch the stored record, seed a tracker with it and attach a
    /// controller to the player.
    ///
    /// A failed read is not fatal: the session starts unseeded and the
    /// next successful save self-corrects. Playback always wins over
    /// bookkeeping.
    pub async fn begin(
        config: &Config,
        player: Arc<dyn PlayerHandle>,
        store: Arc<dyn ProgressStore>,
        activity_id: ActivityId,
        user_id: UserId,
        player_id: PlayerId,
    ) -> Self {
        let known_maximum = match store.fetch(&activity_id, &user_id).await {
            Ok(record) => {
                info!(%activity_id, %user_id, maximum = record.maximum_progress, "seeding from stored record");
                Some(record.maximum_progress)
            }
            Err(e) => {
                warn!(%activity_id, %user_id, error = %e, "could not fetch stored progress, starting unseeded");
                None
            }
        };

        let tracker =
            ProgressTracker::with_debounce_interval(store, config.tracking.debounce_interval());

        let controller_config = ControllerConfig {
            player_id,
            activity_id,
            user_id,
            maximum_progress: known_maximum,
            sample_interval: config.tracking.sample_interval(),
            restart_threshold_percent: config.tracking.restart_threshold_percent,
        };

        let controller = PlayerController::new(controller_config, player, tracker.clone());
        controller.attach();

        Self {
            tracker,
            controller,
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn controller(&self) -> &PlayerController {
        &self.controller
    }

    /// Flush any pending watermark and detach from the player.
    pub fn end(&self) {
        self.tracker.save_now();
        self.controller.shutdown();
    }
}
