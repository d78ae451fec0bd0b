//! Decoder entries and the recursive decoder

use crate::codec::value::Value;
use crate::error::DecodeError;
use hopi_protocol::{TYPE_KEY, VALUE_KEY};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Signature of a decode function
///
/// Receives the raw encoder output and the decoder itself, so container types
/// can decode their interior recursively.
pub type DecodeFn = Arc<dyn Fn(&JsonValue, &Decoder) -> Result<Value, DecodeError> + Send + Sync>;

/// A registered type conversion
///
/// Pairs a remote encoder (source text of a one-argument callable, evaluated
/// in the interpreter) with a host decode function for the same type tag.
#[derive(Clone)]
pub struct DecoderEntry {
    /// Remote type tag, `module.qualname`
    pub type_tag: String,

    /// Remote encoder source; `None` when the interpreter tags the type itself
    pub remote_encode_source: Option<String>,

    /// Host decode function
    pub decode: DecodeFn,
}

impl fmt::Debug for DecoderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderEntry")
            .field("type_tag", &self.type_tag)
            .field("remote_encode_source", &self.remote_encode_source)
            .finish_non_exhaustive()
    }
}

impl DecoderEntry {
    /// Entry with a remote encoder
    ///
    /// ```
    /// use hopi::codec::{DecoderEntry, Value};
    ///
    /// let entry = DecoderEntry::new("fractions.Fraction", "lambda v: [v.numerator, v.denominator]", |raw, decoder| {
    ///     decoder.decode(raw)
    /// });
    /// assert_eq!(entry.type_tag, "fractions.Fraction");
    /// ```
    pub fn new<F>(type_tag: impl Into<String>, remote_encode_source: impl Into<String>, decode: F) -> Self
    where
        F: Fn(&JsonValue, &Decoder) -> Result<Value, DecodeError> + Send + Sync + 'static,
    {
        Self {
            type_tag: type_tag.into(),
            remote_encode_source: Some(remote_encode_source.into()),
            decode: Arc::new(decode),
        }
    }

    /// Entry decoding a tag the interpreter produces without a registered encoder
    pub fn local<F>(type_tag: impl Into<String>, decode: F) -> Self
    where
        F: Fn(&JsonValue, &Decoder) -> Result<Value, DecodeError> + Send + Sync + 'static,
    {
        Self {
            type_tag: type_tag.into(),
            remote_encode_source: None,
            decode: Arc::new(decode),
        }
    }

    /// Rejection error for this entry
    pub fn reject(&self, message: impl Into<String>) -> DecodeError {
        DecodeError::rejected(self.type_tag.clone(), message)
    }
}

/// A bundle of decoders installed together
pub trait DecoderPack {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Entries to register, in order
    fn entries(&self) -> Vec<DecoderEntry>;
}

/// Immutable snapshot of the registered decoders
///
/// Decoding runs entirely against the snapshot; registrations made meanwhile
/// apply to later snapshots.
#[derive(Clone, Default)]
pub struct Decoder {
    entries: Arc<HashMap<String, DecoderEntry>>,
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.entries.keys().collect();
        tags.sort();
        f.debug_struct("Decoder").field("types", &tags).finish()
    }
}

impl Decoder {
    pub(crate) fn new(entries: Arc<HashMap<String, DecoderEntry>>) -> Self {
        Self { entries }
    }

    /// Parse a JSON payload and decode it
    ///
    /// # Errors
    ///
    /// [`DecodeError::Malformed`] for invalid JSON, otherwise whatever
    /// [`Decoder::decode`] returns.
    pub fn decode_str(&self, payload: &str) -> Result<Value, DecodeError> {
        let raw: JsonValue =
            serde_json::from_str(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        self.decode(&raw)
    }

    /// Decode a parsed JSON value, dispatching tagged objects to their decoder
    ///
    /// # Errors
    ///
    /// [`DecodeError::UnregisteredType`] for a tag with no decoder, or the
    /// decoder's own error.
    pub fn decode(&self, raw: &JsonValue) -> Result<Value, DecodeError> {
        match raw {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| DecodeError::Malformed(format!("unrepresentable number {n}"))),
            },
            JsonValue::String(s) => Ok(Value::String(s.clone())),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| self.decode(item))
                .collect::<Result<_, _>>()
                .map(Value::List),
            JsonValue::Object(map) => match tagged(map) {
                Some((tag, inner)) => self.dispatch(tag, inner),
                None => map
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.decode(v)?)))
                    .collect::<Result<_, _>>()
                    .map(Value::Map),
            },
        }
    }

    fn dispatch(&self, tag: &str, inner: &JsonValue) -> Result<Value, DecodeError> {
        let entry = self
            .entries
            .get(tag)
            .ok_or_else(|| DecodeError::UnregisteredType(tag.to_string()))?;
        (entry.decode)(inner, self)
    }

    /// Whether a decoder is registered for `tag`
    pub fn is_registered(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }
}

/// Split a sentinel object into its tag and inner value
fn tagged(map: &serde_json::Map<String, JsonValue>) -> Option<(&str, &JsonValue)> {
    if map.len() != 2 {
        return None;
    }
    let tag = map.get(TYPE_KEY)?.as_str()?;
    let inner = map.get(VALUE_KEY)?;
    Some((tag, inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decoder_with(entries: Vec<DecoderEntry>) -> Decoder {
        Decoder::new(Arc::new(
            entries
                .into_iter()
                .map(|e| (e.type_tag.clone(), e))
                .collect(),
        ))
    }

    /// Decodes `[a, b]` into a map so its position in the output is visible
    fn pair_decoder() -> DecoderEntry {
        DecoderEntry::new("test.Pair", "lambda v: [v.a, v.b]", |raw, decoder| {
            let items = raw
                .as_array()
                .filter(|items| items.len() == 2)
                .ok_or_else(|| DecodeError::rejected("test.Pair", "expected two elements"))?;
            let mut map = std::collections::BTreeMap::new();
            map.insert("a".to_string(), decoder.decode(&items[0])?);
            map.insert("b".to_string(), decoder.decode(&items[1])?);
            Ok(Value::Map(map))
        })
    }

    #[test]
    fn test_plain_json() {
        let decoder = Decoder::default();
        let value = decoder
            .decode_str(r#"{"a": [1, 2.5, "x", null, true], "b": 18446744073709551615}"#)
            .unwrap();

        assert_eq!(
            value.get("a"),
            Some(&Value::List(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::from("x"),
                Value::Null,
                Value::Bool(true),
            ]))
        );
        assert_eq!(value.get("b"), Some(&Value::Float(18446744073709551615.0)));
    }

    #[test]
    fn test_nested_tagged_values_decode_in_place() {
        let decoder = decoder_with(vec![pair_decoder()]);
        let raw = json!({
            "outer": [
                0,
                {"%%hopi_t%%": "test.Pair", "%%hopi_v%%": [
                    1,
                    {"%%hopi_t%%": "test.Pair", "%%hopi_v%%": ["deep", null]}
                ]}
            ]
        });

        let value = decoder.decode(&raw).unwrap();
        let pair = value.get("outer").and_then(|o| o.get_index(1)).unwrap();
        assert_eq!(pair.get("a"), Some(&Value::Int(1)));
        assert_eq!(
            pair.get("b").and_then(|inner| inner.get("a")),
            Some(&Value::from("deep"))
        );
        assert_eq!(value.get("outer").and_then(|o| o.get_index(0)), Some(&Value::Int(0)));
    }

    #[test]
    fn test_unregistered_tag_names_type() {
        let decoder = Decoder::default();
        let err = decoder
            .decode_str(r#"[{"%%hopi_t%%": "builtins.object", "%%hopi_v%%": null}]"#)
            .unwrap_err();
        assert_eq!(err, DecodeError::UnregisteredType("builtins.object".to_string()));
    }

    #[test]
    fn test_decoder_rejection_propagates() {
        let decoder = decoder_with(vec![pair_decoder()]);
        let err = decoder
            .decode(&json!({"%%hopi_t%%": "test.Pair", "%%hopi_v%%": [1]}))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Rejected { ref tag, .. } if tag == "test.Pair"));
    }

    #[test]
    fn test_objects_with_extra_keys_are_plain_maps() {
        let decoder = Decoder::default();
        let value = decoder
            .decode(&json!({"%%hopi_t%%": "x", "%%hopi_v%%": 1, "other": 2}))
            .unwrap();
        assert_eq!(value.as_map().map(|m| m.len()), Some(3));
    }

    #[test]
    fn test_malformed_payload() {
        let err = Decoder::default().decode_str("{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }
}
