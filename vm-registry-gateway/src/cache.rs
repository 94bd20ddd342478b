//! In-memory record of which upstream registry serves a package version.
//!
//! Entries map `(package, version)` to the priority of the highest-precedence
//! registry known to serve that version. A missing entry means "unknown", not
//! "absent": the cache never records negative results.

use dashmap::DashMap;
use std::sync::Arc;

/// Priority rank of an upstream registry (0 = highest precedence).
pub type Priority = usize;

/// Thread-safe version location cache shared by all request tasks.
#[derive(Debug, Clone, Default)]
pub struct VersionLocationCache {
    entries: Arc<DashMap<(String, String), Priority>>,
}

impl VersionLocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_entry(&self, package: &str, version: &str) -> bool {
        self.entries
            .contains_key(&(package.to_string(), version.to_string()))
    }

    pub fn get(&self, package: &str, version: &str) -> Option<Priority> {
        self.entries
            .get(&(package.to_string(), version.to_string()))
            .map(|entry| *entry)
    }

    /// Record that `priority` serves `package@version`.
    ///
    /// The stored priority only ever decreases. The shard lock held by the
    /// entry API makes the compare-and-set atomic per key.
    pub fn put(&self, package: &str, version: &str, priority: Priority) {
        self.entries
            .entry((package.to_string(), version.to_string()))
            .and_modify(|stored| {
                if *stored > priority {
                    *stored = priority;
                }
            })
            .or_insert(priority);
    }

    /// Forget every version of `package` attributed to exactly `priority`.
    pub fn invalidate_registry(&self, package: &str, priority: Priority) {
        self.entries
            .retain(|(cached_package, _), stored| !(cached_package == package && *stored == priority));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
