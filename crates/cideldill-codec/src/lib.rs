#![forbid(unsafe_code)]
//! Deterministic value encoding and content-addressing.
//!
//! Every value exchanged over the call-interception protocol passes through
//! this crate: positional/keyword arguments, results, exceptions, and
//! modified-args payloads. Encoding never panics — failures degrade to a
//! [`Placeholder`] rather than propagating, unless the caller opts into
//! [`encode_strict`].

mod cid;
mod codec;
mod error;
mod placeholder;

pub use cid::{cid, verify, Cid};
pub use codec::{decode, encode, encode_degraded, encode_strict, Encoded};
pub use error::CodecError;
pub use placeholder::{Placeholder, PLACEHOLDER_MARKER};
