mod machine;
mod reason;
pub mod record;

pub use machine::{SessionMachine, SessionSettings, SessionState};
pub use reason::{WakeReason, READY_SENTINEL};
pub use record::{Phase, Session};
