//! Drive a persistent Python interpreter from Rust
//!
//! hopi starts one interpreter process per [`Session`] and talks to it over a
//! line protocol on its standard streams. Remote values are represented by
//! lazy [`Handle`]s that can be combined into larger expressions before
//! anything is evaluated.
//!
//! # Key Features
//!
//! - **Lazy expressions**: attribute access, indexing, calls and operators on
//!   handles build new remote variables without waiting on the interpreter
//! - **Ordered, correlated I/O**: any number of requests in flight, matched to
//!   their responses by id
//! - **Extensible codec**: register a remote encoder and a host decoder per
//!   type with [`Session::register`]
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`hopi-protocol`): line formats and sentinel keys
//! 2. **Transport Layer** (`hopi-transport`): the interpreter process and
//!    the id-correlated channel
//! 3. **Session Layer** (this crate): codec and expression builder
//!
//! # Usage Example
//!
//! ```no_run
//! use hopi::{Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> hopi::Result<()> {
//!     let session = Session::start(SessionConfig::from_env()).await?;
//!
//!     let math = session.import("math").await?;
//!     let root = math.attr("sqrt")?.call(hopi::args![2])?;
//!     let scaled = (&root * 10)?;
//!
//!     println!("{:?}", scaled.force().await?);
//!     session.kill().await;
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod codec;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use builder::{CallArg, Handle, HandleState, Kwargs, Session};
pub use codec::{Arg, BuiltinDecoders, Codec, DecoderEntry, DecoderPack, Opaque, Value};
pub use config::SessionConfig;
pub use error::{DecodeError, HopiError, Result};

pub use hopi_protocol as protocol;
pub use hopi_transport as transport;

/// Build a handle from a template
///
/// Positional arguments fill `{}` / `{n}` placeholders, `name = value` pairs
/// fill `{name}` placeholders. Arguments are anything convertible into
/// [`Arg`].
///
/// ```no_run
/// # async fn example(session: &hopi::Session, one: &hopi::Handle) -> hopi::Result<()> {
/// let two = hopi::expr!(session, "{} + 1", one)?;
/// let four = hopi::expr!(session, "{a} * {a}", a = &two)?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! expr {
    ($session:expr, $template:expr, $($name:ident = $value:expr),+ $(,)?) => {
        $session.format_named(
            $template,
            ::std::vec![$((stringify!($name), $crate::Arg::from($value))),+],
        )
    };
    ($session:expr, $template:expr $(, $value:expr)* $(,)?) => {
        $session.format($template, ::std::vec![$($crate::Arg::from($value)),*])
    };
}
