//! Subprocess side of the channel
//!
//! Spawns the interpreter with the embedded bootstrap program and hands its
//! standard streams to [`Channel`](crate::Channel).

pub mod bootstrap;
pub mod process;

pub use bootstrap::BOOTSTRAP_SOURCE;
pub use process::{ProcessConfig, SpawnedProcess, StderrCallback};
