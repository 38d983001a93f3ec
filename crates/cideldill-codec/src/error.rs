use thiserror::Error;

/// Error surface for the codec crate.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("value could not be serialized to canonical JSON: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("bytes are not valid canonical JSON: {source}")]
    Deserialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("cid `{expected}` does not match the hash of the supplied bytes (`{actual}`)")]
    CidMismatch { expected: String, actual: String },
    #[error("`{value}` is not a well-formed 64-hex-character cid")]
    InvalidCid { value: String },
}
