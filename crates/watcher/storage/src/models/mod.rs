//! Records persisted through the settings store.

mod progress;
pub use progress::{ChainProgress, MAX_RETAINED_BLOCKS};
