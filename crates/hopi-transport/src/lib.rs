//! Subprocess channel for the hopi interpreter bridge
//!
//! Starts a long-lived interpreter process running a small bootstrap program
//! and exchanges framed, id-correlated lines with it over its standard
//! streams.
//!
//! # Architecture
//!
//! - **Channel**: [`Channel`] queues commands, correlates responses by id and
//!   tears everything down on [`Channel::kill`]
//! - **Subprocess**: [`subprocess`] holds the process configuration and the
//!   bootstrap program
//! - **Error handling**: [`ChannelError`] separates transport failures from
//!   remote execution failures
//! - **Testing**: [`testing::ScriptedInterpreter`] stands in for a real process

#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! # Usage
//!
//! ```no_run
//! use hopi_protocol::CommandKind;
//! use hopi_transport::{Channel, ProcessConfig};
//!
//! # async fn example() -> hopi_transport::Result<()> {
//! let channel = Channel::start(ProcessConfig::new("python3")).await?;
//! let id = channel.send(CommandKind::Eval, "2 ** 10")?;
//! assert_eq!(channel.receive_payload(id).await?, "1024");
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod error;
mod pending;
pub mod subprocess;
pub mod testing;

// Re-export commonly used types
pub use channel::Channel;
pub use error::{ChannelError, Result};
pub use subprocess::{BOOTSTRAP_SOURCE, ProcessConfig, StderrCallback};
