//! Decoders for builtin interpreter types without a JSON form

use crate::codec::decoder::{Decoder, DecoderEntry, DecoderPack};
use crate::codec::value::Value;
use crate::error::DecodeError;
use serde_json::Value as JsonValue;

const FLOAT: &str = "builtins.float";
const COMPLEX: &str = "builtins.complex";

/// Sets, bytes, complex numbers, ranges and non-finite floats
///
/// | type | decoded as |
/// |------|------------|
/// | `float` (nan, inf) | [`Value::Float`] |
/// | `set`, `frozenset`, `range` | [`Value::List`] |
/// | `bytes`, `bytearray` | [`Value::List`] of [`Value::Int`] |
/// | `complex` | [`Value::List`] `[real, imag]` |
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinDecoders;

impl DecoderPack for BuiltinDecoders {
    fn name(&self) -> &str {
        "builtins"
    }

    fn entries(&self) -> Vec<DecoderEntry> {
        vec![
            DecoderEntry::local(FLOAT, decode_float),
            DecoderEntry::new("builtins.set", "lambda v: list(v)", decode_list),
            DecoderEntry::new("builtins.frozenset", "lambda v: list(v)", decode_list),
            DecoderEntry::new("builtins.bytes", "lambda v: list(v)", decode_list),
            DecoderEntry::new("builtins.bytearray", "lambda v: list(v)", decode_list),
            DecoderEntry::new("builtins.range", "lambda v: list(v)", decode_list),
            DecoderEntry::new(COMPLEX, "lambda v: [v.real, v.imag]", decode_complex),
        ]
    }
}

fn decode_float(raw: &JsonValue, _: &Decoder) -> Result<Value, DecodeError> {
    match raw.as_str() {
        Some("nan") => Ok(Value::Float(f64::NAN)),
        Some("inf") => Ok(Value::Float(f64::INFINITY)),
        Some("-inf") => Ok(Value::Float(f64::NEG_INFINITY)),
        _ => Err(DecodeError::rejected(
            FLOAT,
            format!("expected nan, inf or -inf, got {raw}"),
        )),
    }
}

fn decode_list(raw: &JsonValue, decoder: &Decoder) -> Result<Value, DecodeError> {
    match raw {
        JsonValue::Array(_) => decoder.decode(raw),
        other => Err(DecodeError::Conversion(format!("expected a list, got {other}"))),
    }
}

fn decode_complex(raw: &JsonValue, decoder: &Decoder) -> Result<Value, DecodeError> {
    let parts = raw
        .as_array()
        .filter(|parts| parts.len() == 2)
        .ok_or_else(|| DecodeError::rejected(COMPLEX, "expected [real, imag]"))?;
    let decoded = parts
        .iter()
        .map(|part| match decoder.decode(part)? {
            Value::Int(i) => Ok(Value::Float(i as f64)),
            Value::Float(f) => Ok(Value::Float(f)),
            other => Err(DecodeError::rejected(
                COMPLEX,
                format!("expected a number, got {}", other.kind()),
            )),
        })
        .collect::<Result<_, _>>()?;
    Ok(Value::List(decoded))
}
