pub mod runs;
pub mod status;

pub use super::AppState;
