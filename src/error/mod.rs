/// Centralized error handling for webforge
pub mod forge;
pub mod stage;

pub use forge::{ForgeError, Result};
pub use stage::{StageError, StageResult};
