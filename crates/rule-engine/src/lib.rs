//! Rule engine for home integrations
//!
//! Translates inbound integration events (motion, doorbell, voice assistant)
//! into automation actions for a lighting/zone executor.

pub mod error;
pub mod model;
pub mod engine;
pub mod dispatcher;

pub use dispatcher::{
    ActionSink, ChannelSink, DispatchEvent, DispatchStats, Dispatcher, JsonLinesSink,
};
pub use engine::RuleEngine;
pub use error::IntegrationError;
pub use model::*;
