//! Component 19: the assembly cache (§4.19). Caches an assembled
//! context by a key that canonicalizes the session id, the assemble
//! options, and the session's own `updatedAt`/message count — so any
//! mutation to the session implicitly misses the cache without an
//! explicit invalidation call. Entries also expire on a flat TTL.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

use sa_domain::{AssembleOptions, AssembledContext};

struct CacheEntry {
    value: Arc<AssembledContext>,
    inserted_at: Instant,
}

pub struct AssemblyCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl AssemblyCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl }
    }

    pub fn get(&self, key: &str) -> Option<Arc<AssembledContext>> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
            entries.remove(key);
        }
        None
    }

    pub fn put(&self, key: String, value: Arc<AssembledContext>) {
        self.entries.lock().insert(key, CacheEntry { value, inserted_at: Instant::now() });
    }

    /// Drop every entry keyed under `session_id`, regardless of the
    /// options/version suffix canonicalized into the rest of the key.
    pub fn invalidate(&self, session_id: &str) {
        let prefix = key_prefix(session_id);
        self.entries.lock().retain(|k, _| !k.starts_with(&prefix));
    }
}

fn key_prefix(session_id: &str) -> String {
    // A NUL separator can't appear in a session id supplied through any
    // normal API, so this prefix can't collide across sessions the way a
    // plain string prefix match on e.g. "ab" vs "abc-extra" could.
    format!("{session_id}\u{0}")
}

/// Build the cache key: session id, sorted assemble options, and the
/// session's current `updatedAt`/message count, so the key changes the
/// instant the session is mutated.
pub fn canonicalize_key(session_id: &str, options: &AssembleOptions, updated_at: &str, message_count: usize) -> String {
    let mut fields: BTreeMap<&str, Value> = BTreeMap::new();
    fields.insert("maxTokens", options.max_tokens.map(Value::from).unwrap_or(Value::Null));
    fields.insert("sessionMode", options.session_mode.clone().map(Value::String).unwrap_or(Value::Null));
    fields.insert("updatedAt", Value::String(updated_at.to_string()));
    fields.insert("messageCount", Value::from(message_count as u64));

    let canonical = serde_json::to_string(&fields).unwrap_or_default();
    format!("{}{canonical}", key_prefix(session_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Arc<AssembledContext> {
        Arc::new(AssembledContext {
            system_prompt: "hi".into(),
            messages: vec![],
            tools: vec![],
            parameters: Default::default(),
            estimated_tokens: 5,
        })
    }

    #[test]
    fn a_fresh_entry_is_returned_before_its_ttl_elapses() {
        let cache = AssemblyCache::new(Duration::from_secs(60));
        cache.put("k1".into(), sample());
        assert!(cache.get("k1").is_some());
    }

    #[test]
    fn an_expired_entry_is_not_returned() {
        let cache = AssemblyCache::new(Duration::from_millis(0));
        cache.put("k1".into(), sample());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k1").is_none());
    }

    #[test]
    fn invalidate_drops_every_key_for_that_session_only() {
        let cache = AssemblyCache::new(Duration::from_secs(60));
        let key_a = canonicalize_key("session-a", &AssembleOptions::default(), "t0", 1);
        let key_b = canonicalize_key("session-b", &AssembleOptions::default(), "t0", 1);
        cache.put(key_a.clone(), sample());
        cache.put(key_b.clone(), sample());

        cache.invalidate("session-a");

        assert!(cache.get(&key_a).is_none());
        assert!(cache.get(&key_b).is_some());
    }

    #[test]
    fn canonicalized_keys_change_when_updated_at_or_message_count_changes() {
        let options = AssembleOptions::default();
        let k1 = canonicalize_key("s1", &options, "t0", 3);
        let k2 = canonicalize_key("s1", &options, "t1", 3);
        let k3 = canonicalize_key("s1", &options, "t0", 4);
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn same_inputs_canonicalize_to_the_same_key() {
        let options = AssembleOptions { max_tokens: Some(100), session_mode: Some("normal".into()) };
        assert_eq!(canonicalize_key("s1", &options, "t0", 3), canonicalize_key("s1", &options, "t0", 3));
    }
}
