pub mod constants;
pub mod manifest;
pub mod tokens;

pub use manifest::{Environment, Manifest, StageKind, StageSpec, TaskSpec};
pub use tokens::TokenTable;
