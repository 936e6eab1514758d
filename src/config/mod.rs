//! Configuration for `briefwatch`
//!
//! Plain numeric magnitudes only — deadlines, thresholds, cool-downs.
//! Structure lives in [`crate::progress`]; nothing here changes behavior
//! beyond how long the machinery waits.

pub mod duration;
pub mod loader;
pub mod schema;

pub use duration::parse_duration;
pub use loader::load_config;
pub use schema::{Config, PhaseDeadlines, RunnerConfig, WatchdogConfig};
