use std::sync::OnceLock;

use base64::Engine;
use cideldill_protocol::{unix_timestamp, CallSite, ProcessIdentity, SerializedItem, StackFrame};
use serde_json::Value;

use crate::cache::ValueCache;
use crate::error::ClientError;

const MAX_STACK_FRAMES: usize = 32;

static PROCESS_START: OnceLock<f64> = OnceLock::new();

/// Shared by the sync and async proxies: `(pid, process_start_time)`,
/// computed once per process on first use.
pub(crate) fn process_identity() -> ProcessIdentity {
    let start = *PROCESS_START.get_or_init(unix_timestamp);
    ProcessIdentity { pid: std::process::id(), process_start_time: start }
}

/// Best-effort call site: the systems-language analogue of the source
/// implementation's `inspect.stack()` walk. `std::backtrace` has no stable
/// structured-frame API, so frames are recovered from its `Display` text.
pub(crate) fn capture_call_site() -> CallSite {
    let backtrace = std::backtrace::Backtrace::force_capture();
    let mut frames = Vec::new();
    let mut pending_function: Option<String> = None;
    for line in backtrace.to_string().lines() {
        let line = line.trim();
        let Some((_, rest)) = line.split_once(": ") else { continue };
        if let Some(location) = rest.strip_prefix("at ") {
            let Some(function) = pending_function.take() else { continue };
            let (filename, lineno) = location
                .rsplit_once(':')
                .map(|(file, line)| (file.to_string(), line.parse().unwrap_or(0)))
                .unwrap_or_else(|| (location.to_string(), 0));
            frames.push(StackFrame { filename, lineno, function, code_context: None });
            if frames.len() >= MAX_STACK_FRAMES {
                break;
            }
        } else {
            pending_function = Some(rest.to_string());
        }
    }
    CallSite { timestamp: unix_timestamp(), stack_trace: frames }
}

/// Resolve a [`SerializedItem`] to its value: inline `data` wins (and is
/// cached for reuse), otherwise fall back to the local value cache.
pub(crate) fn resolve_value(item: &SerializedItem, cache: &ValueCache) -> Result<Value, ClientError> {
    if let Some(data) = &item.data {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|source| ClientError::ProtocolMalformed { detail: source.to_string() })?;
        let value = cideldill_codec::decode(&bytes)?;
        cache.mark_sent(item.cid.clone(), value.clone());
        Ok(value)
    } else if let Some(value) = cache.value_of(&item.cid) {
        Ok(value)
    } else {
        Err(ClientError::ProtocolMalformed { detail: format!("no data available locally for cid {}", item.cid) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_call_site_never_panics_and_has_a_timestamp() {
        let site = capture_call_site();
        assert!(site.timestamp > 0.0);
    }

    #[test]
    fn resolve_value_prefers_inline_data_over_cache() {
        let cache = ValueCache::new(16);
        let value = serde_json::json!({"x": 1});
        let encoded = cideldill_codec::encode(&value);
        let item = SerializedItem::inline(
            encoded.cid.clone(),
            base64::engine::general_purpose::STANDARD.encode(&encoded.bytes),
        );
        assert_eq!(resolve_value(&item, &cache).unwrap(), value);
    }

    #[test]
    fn resolve_value_falls_back_to_cache_for_references() {
        let cache = ValueCache::new(16);
        let value = serde_json::json!(42);
        let cid = cideldill_codec::cid(b"whatever-bytes-represent-42");
        cache.mark_sent(cid.clone(), value.clone());
        let item = SerializedItem::reference(cid);
        assert_eq!(resolve_value(&item, &cache).unwrap(), value);
    }

    #[test]
    fn resolve_value_errors_when_neither_data_nor_cache_present() {
        let cache = ValueCache::new(16);
        let cid = cideldill_codec::cid(b"never-sent");
        let item = SerializedItem::reference(cid);
        assert!(resolve_value(&item, &cache).is_err());
    }
}
