//! # teaready Core Library
//!
//! This library tracks one tea-steeping session from selection to the
//! "enjoy your tea" moment. It is host-agnostic: a watch face, a desktop
//! tray or the bundled CLI drive it through the same callbacks.
//!
//! ## Architecture
//!
//! - **Session machine**: callback-driven state machine that owns the single
//!   session, schedules deferred wakeups and persists itself so a wakeup can
//!   be serviced after the process was closed
//! - **Cooling model**: how long a cup should rest after steeping
//! - **Alert sequencer**: capped vibration pulses on app timers
//! - **Progress**: the live percentage for the cup display
//! - **Storage**: SQLite key-value store and wakeup queue, TOML configuration
//!
//! ## Key Components
//!
//! - [`SessionMachine`]: Core session state machine
//! - [`AlertSequencer`]: Vibration alert state machine
//! - [`Config`]: Application configuration management
//! - [`WakeupScheduler`] / [`KeyValueStore`]: Platform contracts

pub mod alert;
pub mod catalog;
pub mod cooling;
pub mod error;
pub mod events;
pub mod platform;
pub mod progress;
pub mod session;
pub mod storage;

pub use alert::{AlertConfig, AlertMode, AlertPhase, AlertSequencer};
pub use catalog::{Catalog, TeaCatalog, TeaProfile, TempUnit};
pub use cooling::{cooling_delay, CoolingModel, Readiness};
pub use error::{ConfigError, CoreError, SchedulingError, StorageError, ValidationError};
pub use events::{Event, SessionFault};
pub use platform::{
    AppTimer, KeyValueStore, TimerHandle, Vibrator, WakeupId, WakeupScheduler, WakeupStatus,
};
pub use progress::percentage;
pub use session::{Phase, Session, SessionMachine, SessionSettings, SessionState, WakeReason};
pub use storage::{Config, Database, WakeupQueue};
