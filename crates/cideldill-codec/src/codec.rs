use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use crate::cid::Cid;
use crate::error::CodecError;
use crate::placeholder::Placeholder;

/// A value paired with its canonical bytes and CID.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub cid: Cid,
    pub degraded: bool,
}

/// Canonically encode an already-constructed JSON value.
///
/// `serde_json::Value`'s map type sorts keys (this crate does not enable
/// `preserve_order`), so structurally equal values always produce
/// byte-identical output regardless of original field insertion order.
pub fn encode(value: &Value) -> Encoded {
    // Serializing an already-built `Value` tree cannot fail.
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    let cid = Cid::of(&bytes);
    Encoded { bytes, cid, degraded: false }
}

/// Attempt to serialize `value`; on failure, degrade to a placeholder and
/// never return an error. Emits a `tracing::warn!` event on degradation.
pub fn encode_degraded<T: Serialize + std::fmt::Debug>(value: &T) -> Encoded {
    match serde_json::to_value(value) {
        Ok(json) => encode(&json),
        Err(err) => {
            let placeholder = Placeholder::new(
                std::any::type_name::<T>(),
                format!("{value:?}"),
                error_chain(&err),
                unix_timestamp(),
            );
            tracing::warn!(
                type_name = %placeholder.type_name,
                error = %err,
                "serialization degraded to placeholder"
            );
            let encoded = encode(&placeholder.to_value());
            Encoded { degraded: true, ..encoded }
        }
    }
}

/// Strict variant of [`encode_degraded`]: propagates the serialization
/// error instead of degrading to a placeholder.
pub fn encode_strict<T: Serialize>(value: &T) -> Result<Encoded, CodecError> {
    let json = serde_json::to_value(value).map_err(|source| CodecError::Serialize { source })?;
    Ok(encode(&json))
}

/// Decode canonical bytes back into a JSON value.
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    serde_json::from_slice(bytes).map_err(|source| CodecError::Deserialize { source })
}

fn error_chain(err: &serde_json::Error) -> Vec<String> {
    vec![err.to_string()]
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
