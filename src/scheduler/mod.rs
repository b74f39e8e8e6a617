//! Scheduling -- target-time parsing, the single-shot timer, and the watch
//! engine that drives registration decision cycles.

pub mod engine;
pub mod target;
pub mod timer;

pub use engine::{wait_for_config_edit, watch_course, EngineOptions, Settled, WatchOutcome};
pub use target::{ScheduleError, TargetSchedule};
pub use timer::TargetTimer;
