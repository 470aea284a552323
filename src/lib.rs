pub mod channel;
pub mod config;
pub mod control;
pub mod messages;
pub mod runtime;
pub mod sequence;
