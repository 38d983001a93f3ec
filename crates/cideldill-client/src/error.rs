use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server url `{url}` is not localhost; refusing to send debug traffic off-host")]
    NonLocalhost { url: String },
    #[error("transport error contacting the breakpoint server: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },
    #[error("server rejected the request: {status} {body}")]
    ServerRejected { status: u16, body: String },
    #[error("server referenced an action or field this client does not understand: {detail}")]
    ProtocolMalformed { detail: String },
    #[error("replacement function `{name}` is not registered locally")]
    ReplacementNotRegistered { name: String },
    #[error("call was resumed with `raise`: {exception_type}: {exception_message}")]
    Raised {
        exception_type: String,
        exception_message: String,
    },
    #[error("value codec error: {0}")]
    Codec(#[from] cideldill_codec::CodecError),
}
