mod controller;
mod simulated;
mod traits;

pub use controller::{ControllerConfig, PlayerController, SessionState};
pub use simulated::SimulatedPlayer;
pub use traits::{PlayerEvent, PlayerHandle};
