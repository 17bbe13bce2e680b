//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - Pretty or JSON stdout
//! - Optional daily-rotated JSON file
//! - Scenario log channel feeding the report aggregator

pub mod channel;
pub mod logger;
pub mod scenario;

pub use channel::{ChannelError, LogChannel};
pub use logger::{channel_layer, LoggerImpl};
pub use scenario::ScenarioLogger;
