//! Pending mod downloads.
//!
//! The play workflow pushes every missing mod here before sending the user to
//! the mod manager, which works through the queue in insertion order.

use crate::services::bridge::DownloadQueue;
use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Name used when a server does not say what a required mod is called.
pub const UNKNOWN_MOD_NAME: &str = "Unknown Mod";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMod {
    pub workshop_id: u64,
    pub name: String,
}

/// In-memory, insertion-ordered download queue. Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct ModDownloadQueue {
    pending: Arc<RwLock<IndexMap<u64, QueuedMod>>>,
}

impl ModDownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a mod. A mod already queued keeps its position; its name is
    /// only replaced when the queued one was the placeholder.
    pub fn push(&self, workshop_id: u64, name: &str) -> bool {
        let mut pending = self.pending.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = pending.get_mut(&workshop_id) {
            if existing.name == UNKNOWN_MOD_NAME && name != UNKNOWN_MOD_NAME {
                existing.name = name.to_string();
            }
            return false;
        }

        pending.insert(
            workshop_id,
            QueuedMod {
                workshop_id,
                name: name.to_string(),
            },
        );
        tracing::debug!("Queued mod {} ({}) for download", workshop_id, name);
        true
    }

    /// Snapshot of the queue, oldest first
    pub fn pending(&self) -> Vec<QueuedMod> {
        let pending = self.pending.read().unwrap_or_else(PoisonError::into_inner);
        pending.values().cloned().collect()
    }

    pub fn contains(&self, workshop_id: u64) -> bool {
        let pending = self.pending.read().unwrap_or_else(PoisonError::into_inner);
        pending.contains_key(&workshop_id)
    }

    /// Take the oldest queued mod
    pub fn pop_next(&self) -> Option<QueuedMod> {
        let mut pending = self.pending.write().unwrap_or_else(PoisonError::into_inner);
        pending.shift_remove_index(0).map(|(_, queued)| queued)
    }

    pub fn remove(&self, workshop_id: u64) -> Option<QueuedMod> {
        let mut pending = self.pending.write().unwrap_or_else(PoisonError::into_inner);
        pending.shift_remove(&workshop_id)
    }

    pub fn len(&self) -> usize {
        let pending = self.pending.read().unwrap_or_else(PoisonError::into_inner);
        pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut pending = self.pending.write().unwrap_or_else(PoisonError::into_inner);
        pending.clear();
    }
}

impl DownloadQueue for ModDownloadQueue {
    async fn push_mod(&self, workshop_id: u64, name: &str) -> Result<()> {
        self.push(workshop_id, name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_insertion_order() {
        let queue = ModDownloadQueue::new();

        queue.push(30, "Gamma");
        queue.push(10, "Alpha");
        queue.push(20, "Beta");

        let ids: Vec<u64> = queue.pending().iter().map(|m| m.workshop_id).collect();
        assert_eq!(ids, vec![30, 10, 20]);
    }

    #[test]
    fn test_push_is_idempotent() {
        let queue = ModDownloadQueue::new();

        assert!(queue.push(10, "Alpha"));
        assert!(!queue.push(10, "Alpha again"));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pending()[0].name, "Alpha");
    }

    #[test]
    fn test_push_replaces_placeholder_name() {
        let queue = ModDownloadQueue::new();

        queue.push(10, UNKNOWN_MOD_NAME);
        queue.push(10, "CF");

        assert_eq!(queue.pending()[0].name, "CF");
    }

    #[test]
    fn test_pop_and_remove() {
        let queue = ModDownloadQueue::new();
        queue.push(1, "One");
        queue.push(2, "Two");
        queue.push(3, "Three");

        assert_eq!(queue.pop_next().unwrap().workshop_id, 1);
        assert_eq!(queue.remove(3).unwrap().name, "Three");
        assert!(queue.remove(3).is_none());
        assert!(queue.contains(2));

        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.pop_next().is_none());
    }

    #[tokio::test]
    async fn test_push_mod_through_trait() {
        let queue = ModDownloadQueue::new();
        queue.push_mod(42, "Trader").await.unwrap();
        assert!(queue.contains(42));
    }
}
