use std::num::NonZeroUsize;

use cideldill_codec::Cid;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;

/// Tracks which CIDs the server is already known to hold, plus a parallel
/// value cache so retransmission after `cid_not_found` does not require
/// recomputing a value's serialization (spec §4.D "Cache").
pub struct ValueCache {
    sent: Mutex<LruCache<Cid, ()>>,
    values: Mutex<LruCache<Cid, Value>>,
}

impl ValueCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to at least 1");
        ValueCache {
            sent: Mutex::new(LruCache::new(capacity)),
            values: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Record that `cid` has been sent with its bytes, caching `value` for
    /// possible retransmission.
    pub fn mark_sent(&self, cid: Cid, value: Value) {
        self.sent.lock().put(cid.clone(), ());
        self.values.lock().put(cid, value);
    }

    pub fn was_sent(&self, cid: &Cid) -> bool {
        self.sent.lock().contains(cid)
    }

    pub fn value_of(&self, cid: &Cid) -> Option<Value> {
        self.values.lock().get(cid).cloned()
    }

    /// Forget that `cid` was sent, forcing the next reference to re-attach
    /// `data` (used after a `cid_not_found` response).
    pub fn forget_sent(&self, cid: &Cid) {
        self.sent.lock().pop(cid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cideldill_codec::cid as compute_cid;
    use serde_json::json;

    #[test]
    fn marks_and_reports_sent() {
        let cache = ValueCache::new(16);
        let cid = compute_cid(b"value");
        assert!(!cache.was_sent(&cid));
        cache.mark_sent(cid.clone(), json!("value"));
        assert!(cache.was_sent(&cid));
        assert_eq!(cache.value_of(&cid), Some(json!("value")));
    }

    #[test]
    fn forget_sent_allows_retransmission() {
        let cache = ValueCache::new(16);
        let cid = compute_cid(b"value");
        cache.mark_sent(cid.clone(), json!("value"));
        cache.forget_sent(&cid);
        assert!(!cache.was_sent(&cid));
        assert_eq!(cache.value_of(&cid), Some(json!("value")));
    }
}
