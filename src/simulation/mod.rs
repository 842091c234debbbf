//! Engine runtime for the viewer.
//!
//! The engine library is synchronous; this module wraps it in an embassy task
//! that owns the [`FrameCoordinator`](sensor_layout_simulator::engine::FrameCoordinator),
//! ticks it at the configured frame interval and exchanges messages with the
//! UI over the bounded channels defined in `main`.
//!
//! ## Module Organization
//!
//! - `engine_task`: The task loop, command handling and frame publishing

pub mod engine_task;

pub use engine_task::engine_task;
