//! Floor-plan sensor layout simulator.
//!
//! - `engine`: proximity, connectivity, interference and motion detection
//! - `common`: layout documents and runtime configuration shared with the viewer

pub mod common;
pub mod engine;
