//! Collaborator contracts the session machine consumes, plus in-memory
//! implementations of each.

pub mod memory;
pub mod traits;

pub use memory::{CountingVibrator, ManualTimers, MemoryScheduler, MemoryStore};
pub use traits::{
    AppTimer, KeyValueStore, TimerHandle, Vibrator, WakeupId, WakeupScheduler, WakeupStatus,
};
