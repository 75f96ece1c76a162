// Fixed policy values for the tracking core.
// Runtime-tunable knobs live in config.rs; these are the defaults the
// tracker and controller fall back to.

use std::time::Duration;

// === Persistence ===

/// Debounce window between persisted watermark writes.
pub const DEFAULT_DEBOUNCE_INTERVAL: Duration = Duration::from_millis(1000);

// === Sampling ===

/// Sampling cadence while the player is active, ~24 samples per second.
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 24;

// === Progress thresholds ===

/// Watermark value that counts as a finished viewing. Once reached, saves
/// bypass the debounce window entirely.
pub const COMPLETE_PERCENT: f64 = 100.0;

/// Stored progress above this restarts playback from the beginning instead
/// of resuming just short of the end.
pub const RESTART_THRESHOLD_PERCENT: f64 = 98.0;
