//! `Tracker` (§3/§4.4): the identity a single call carries through its
//! whole lifetime, used for logging correlation and for picking the actor
//! that will run its write-aggregation batch.

use std::hash::{Hash, Hasher};

/// Identifies one logical call across retries. `trace_id` is what gets
/// logged and returned to callers on error; `trace_hash` is a stable digest
/// of it used to route the call to a single actor (§4.8: `trace_hash %
/// actor_count`), so retries of the same call always land on the same
/// actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracker {
    pub trace_id: String,
    pub trace_hash: u64,
}

impl Tracker {
    pub fn new(trace_id: impl Into<String>) -> Self {
        let trace_id = trace_id.into();
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        trace_id.hash(&mut hasher);
        Tracker {
            trace_hash: hasher.finish(),
            trace_id,
        }
    }

    /// A fresh tracker for a new call, identified by a random UUID.
    pub fn random() -> Self {
        Tracker::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn actor_index(&self, actor_count: usize) -> usize {
        debug_assert!(actor_count > 0);
        (self.trace_hash % actor_count as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_trace_id_routes_to_same_actor() {
        let a = Tracker::new("call-1");
        let b = Tracker::new("call-1");
        assert_eq!(a.actor_index(32), b.actor_index(32));
    }

    #[test]
    fn distinct_trace_ids_usually_diverge() {
        let a = Tracker::new("call-1");
        let b = Tracker::new("call-2");
        assert_ne!(a.trace_hash, b.trace_hash);
    }
}
