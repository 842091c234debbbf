//! Shared loading code used by the viewer binary and tests.
//!
//! - `layout`: layout document and event log files
//! - `config`: TOML runtime configuration

pub mod config;
pub mod layout;

pub use config::SimulatorConfig;
pub use layout::{LayoutDocument, LayoutLoadError};
