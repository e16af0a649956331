pub mod config;
pub mod session;
pub mod teas;
pub mod watch;
