//! Value codec between the host and the interpreter
//!
//! Outbound, host values render as source literals ([`Arg`]). Inbound, the
//! interpreter replies with JSON where values of registered or non-JSON types
//! are wrapped as `{"%%hopi_t%%": <type tag>, "%%hopi_v%%": <encoded>}`; the
//! [`Decoder`] walks the payload and hands each wrapped value to the decoder
//! registered for its tag.
//!
//! # Extending
//!
//! ```no_run
//! use hopi::codec::{DecoderEntry, Value};
//! use hopi::{DecodeError, Session};
//!
//! # async fn example(session: &Session) -> hopi::Result<()> {
//! session
//!     .register(DecoderEntry::new(
//!         "fractions.Fraction",
//!         "lambda v: [v.numerator, v.denominator]",
//!         |raw, _| {
//!             let (n, d) = raw
//!                 .as_array()
//!                 .filter(|parts| parts.len() == 2)
//!                 .and_then(|parts| Some((parts[0].as_f64()?, parts[1].as_f64()?)))
//!                 .ok_or_else(|| DecodeError::rejected("fractions.Fraction", "expected a pair"))?;
//!             Ok(Value::Float(n / d))
//!         },
//!     ))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod builtin;
pub mod decoder;
pub mod literal;
pub mod value;

pub use builtin::BuiltinDecoders;
pub use decoder::{DecodeFn, Decoder, DecoderEntry, DecoderPack};
pub use literal::Arg;
pub use value::{Opaque, Value};

use crate::error::{DecodeError, Result};
use hopi_protocol::CommandKind;
use hopi_transport::Channel;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Name of the registration hook inside the interpreter namespace
const REGISTER_HOOK: &str = "__hopi_register__";

/// Decoder registry bound to one interpreter
///
/// Registration replaces the snapshot wholesale, so decoding never holds the
/// lock while it runs.
pub struct Codec {
    channel: Channel,
    entries: RwLock<Arc<HashMap<String, DecoderEntry>>>,
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("decoder", &self.decoder())
            .finish_non_exhaustive()
    }
}

impl Codec {
    pub(crate) fn new(channel: Channel) -> Self {
        Self {
            channel,
            entries: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Register `entry` locally and install its encoder in the interpreter
    ///
    /// The last registration for a tag wins. The local decoder stays
    /// registered even if the interpreter rejects the encoder.
    ///
    /// # Errors
    ///
    /// [`crate::HopiError::RemoteExecution`] if the encoder source does not
    /// evaluate, or a transport error.
    pub async fn register(&self, entry: DecoderEntry) -> Result<()> {
        let tag = entry.type_tag.clone();
        let encoder = entry.remote_encode_source.clone();
        self.register_local(entry);

        if let Some(source) = encoder {
            let command = format!("{REGISTER_HOOK}({}, {source})", literal::quote(&tag));
            self.channel
                .send_and_receive(CommandKind::Exec, &command)
                .await?;
            tracing::debug!(%tag, "registered remote encoder");
        }
        Ok(())
    }

    /// Register `entry` on the host side only
    pub fn register_local(&self, entry: DecoderEntry) {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut entries = HashMap::clone(&guard);
        tracing::debug!(tag = %entry.type_tag, replaced = entries.contains_key(&entry.type_tag), "registered decoder");
        entries.insert(entry.type_tag.clone(), entry);
        *guard = Arc::new(entries);
    }

    /// Register every entry of `pack`, in order
    ///
    /// # Errors
    ///
    /// Stops at the first entry that fails to register.
    pub async fn install<P>(&self, pack: &P) -> Result<()>
    where
        P: DecoderPack + ?Sized,
    {
        let entries = pack.entries();
        tracing::debug!(pack = pack.name(), count = entries.len(), "installing decoder pack");
        for entry in entries {
            self.register(entry).await?;
        }
        Ok(())
    }

    /// Snapshot of the current registry
    pub fn decoder(&self) -> Decoder {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Decoder::new(Arc::clone(&entries))
    }

    /// Decode an EVAL payload
    ///
    /// # Errors
    ///
    /// See [`Decoder::decode_str`].
    pub fn decode(&self, payload: &str) -> std::result::Result<Value, DecodeError> {
        self.decoder().decode_str(payload)
    }

    /// Whether a decoder is registered for `tag`
    pub fn is_registered(&self, tag: &str) -> bool {
        self.decoder().is_registered(tag)
    }
}
