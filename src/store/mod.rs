mod memory;
mod rest;
mod traits;

pub use memory::MemoryProgressStore;
pub use rest::RestProgressStore;
pub use traits::{ProgressStore, StoreError};
