pub mod config;
pub mod snapshot;
pub mod thresholds;
pub mod watch;

pub use config::{ConfigAction, ConfigArgs};
pub use snapshot::SnapshotArgs;
pub use thresholds::{ThresholdsAction, ThresholdsArgs};
pub use watch::WatchArgs;
