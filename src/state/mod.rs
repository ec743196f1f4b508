// Favorite server store
//
// The FavoriteStore owns the user's favorite servers. Every mutation runs in a
// single write section over the list, then the full list is written to the
// blob store and a change event is broadcast.

use crate::metrics::Metrics;
use crate::models::ServerRecord;
use crate::storage::BlobStore;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Blob key the favorite list is persisted under.
pub const FAVORITES_KEY: &str = "favorites-storage";

/// Change events emitted when the favorite list is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StoreChange {
    ServerAdded { addr: String },

    ServerUpdated { addr: String },

    ServerRemoved { addr: String },

    /// The whole list was replaced (bulk load or restore)
    ListReplaced { count: usize },

    /// Records were refreshed from the master list
    ListReconciled { refreshed: usize },
}

/// Result of [`FavoriteStore::add_server`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// A record with the same address is already stored; nothing changed
    Duplicate,
}

/// Authoritative, persisted list of favorite servers.
///
/// The store is a cheap handle: clones share the same list, persistence and
/// event channel. Reads always see the in-memory list, which stays
/// authoritative even when a write to the blob store fails.
///
/// # Persistence
///
/// Each effective mutation is followed by a wholesale save of the ordered
/// list under [`FAVORITES_KEY`] (or the configured key). Saves are issued in
/// mutation order. A store built with [`FavoriteStore::in_memory`] skips
/// persistence entirely.
///
/// The save runs synchronously on the calling thread. With a
/// [`crate::storage::FileBlobStore`] every mutation does blocking disk I/O,
/// and concurrent mutations wait for each other's writes. Async hosts that
/// mutate at a high rate should call into the store from
/// `tokio::task::spawn_blocking`; explicit saves from async code should use
/// [`FavoriteStore::persist_async`], which does the write there.
///
/// Locks are always taken in the same order: the list, then the save slot.
///
/// # Related Types
///
/// - [`crate::services::PingEnricher`]: folds probe results in via `update_server`
/// - [`crate::services::MasterListReconciler`]: calls `update_server_list`
/// - [`crate::services::PlayValidationWorkflow`]: reads records by address
pub struct FavoriteStore {
    servers: Arc<RwLock<Vec<ServerRecord>>>,

    persistence: Option<Arc<dyn BlobStore>>,

    key: String,

    /// Held while a snapshot is written so saves land in mutation order
    persist_lock: Arc<Mutex<()>>,

    change_tx: broadcast::Sender<StoreChange>,

    metrics: Arc<Metrics>,
}

impl FavoriteStore {
    /// Create a store persisting to `persistence` under [`FAVORITES_KEY`].
    pub fn new(persistence: Arc<dyn BlobStore>) -> Self {
        Self::build(Some(persistence), FAVORITES_KEY.to_string())
    }

    /// Create a store persisting under a custom blob key.
    pub fn with_key(persistence: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self::build(Some(persistence), key.into())
    }

    /// Create a store without persistence.
    pub fn in_memory() -> Self {
        Self::build(None, FAVORITES_KEY.to_string())
    }

    fn build(persistence: Option<Arc<dyn BlobStore>>, key: String) -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            servers: Arc::new(RwLock::new(Vec::new())),
            persistence,
            key,
            persist_lock: Arc::new(Mutex::new(())),
            change_tx,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Report mutations and persistence failures into shared metrics.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Restore the list from the blob store.
    ///
    /// A missing blob leaves the store empty. A blob that fails to parse is an
    /// error and leaves the in-memory list untouched.
    pub fn load(&self) -> Result<usize> {
        let Some(persistence) = &self.persistence else {
            return Ok(self.len());
        };

        let Some(blob) = persistence.load(&self.key)? else {
            tracing::info!("No saved favorites under '{}'", self.key);
            return Ok(0);
        };

        let list: Vec<ServerRecord> = serde_json::from_str(&blob)
            .with_context(|| format!("Failed to parse saved favorites '{}'", self.key))?;
        let list = dedup_by_addr(list);
        let count = list.len();

        {
            let mut servers = self.servers.write().unwrap_or_else(PoisonError::into_inner);
            *servers = list;
        }

        let _ = self.change_tx.send(StoreChange::ListReplaced { count });
        tracing::info!("Loaded {} favorite servers from '{}'", count, self.key);
        Ok(count)
    }

    /// Write the current list to the blob store.
    pub fn persist(&self) -> Result<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };

        // Same lock order as `mutate`: list first, then the save slot.
        let servers = self.servers.read().unwrap_or_else(PoisonError::into_inner);
        let _order = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let blob = serde_json::to_string(&*servers).context("Failed to serialize favorites");
        drop(servers);

        persistence.save(&self.key, &blob?)
    }

    /// [`FavoriteStore::persist`] on the blocking thread pool.
    ///
    /// For async hosts writing through a [`crate::storage::FileBlobStore`].
    pub async fn persist_async(&self) -> Result<()> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.persist())
            .await
            .context("Favorites persist task failed")?
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.change_tx.subscribe()
    }

    /// Snapshot of the list in order.
    pub fn servers(&self) -> Vec<ServerRecord> {
        self.read(|servers| servers.to_vec())
    }

    /// Execute a function with read access to the list
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[ServerRecord]) -> R,
    {
        let servers = self.servers.read().unwrap_or_else(PoisonError::into_inner);
        f(servers.as_slice())
    }

    /// Current record for `addr`.
    pub fn get(&self, addr: &str) -> Option<ServerRecord> {
        self.read(|servers| servers.iter().find(|s| s.addr == addr).cloned())
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.read(|servers| servers.iter().any(|s| s.addr == addr))
    }

    pub fn len(&self) -> usize {
        self.read(|servers| servers.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole list. Later duplicates of an address are dropped.
    pub fn set_server_list(&self, list: Vec<ServerRecord>) -> usize {
        let list = dedup_by_addr(list);
        self.mutate(|servers| {
            *servers = list;
            let count = servers.len();
            (count, Some(StoreChange::ListReplaced { count }))
        })
    }

    /// Append a record unless its address is already stored.
    pub fn add_server(&self, server: ServerRecord) -> AddOutcome {
        self.mutate(|servers| {
            if servers.iter().any(|s| s.same_server(&server)) {
                tracing::debug!("Server {} is already a favorite", server.addr);
                return (AddOutcome::Duplicate, None);
            }

            let addr = server.addr.clone();
            servers.push(server);
            (AddOutcome::Added, Some(StoreChange::ServerAdded { addr }))
        })
    }

    /// Replace the stored record with the same address, keeping its position.
    ///
    /// Returns false and changes nothing when the address is not stored, which
    /// happens when a probe completes after the user removed the server.
    pub fn update_server(&self, server: ServerRecord) -> bool {
        self.mutate(|servers| match servers.iter().position(|s| s.same_server(&server)) {
            Some(index) => {
                let addr = server.addr.clone();
                servers[index] = server;
                (true, Some(StoreChange::ServerUpdated { addr }))
            }
            None => {
                tracing::debug!("Ignoring update for {}: not a favorite", server.addr);
                (false, None)
            }
        })
    }

    pub fn remove_server(&self, server: &ServerRecord) -> bool {
        self.remove_server_by_addr(&server.addr)
    }

    pub fn remove_server_by_addr(&self, addr: &str) -> bool {
        self.mutate(|servers| {
            let before = servers.len();
            servers.retain(|s| s.addr != addr);

            if servers.len() == before {
                (false, None)
            } else {
                let addr = addr.to_string();
                (true, Some(StoreChange::ServerRemoved { addr }))
            }
        })
    }

    /// Refresh stored records from the master list.
    ///
    /// Each stored record whose address appears in `master` is replaced by
    /// the master's version. Records the master does not report are kept as
    /// they are, and master-only servers are never added. Returns the number
    /// of refreshed records.
    pub fn update_server_list(&self, master: &[ServerRecord]) -> usize {
        self.mutate(|servers| {
            let mut refreshed = 0;
            for server in servers.iter_mut() {
                if let Some(fresh) = master.iter().find(|m| m.same_server(server)) {
                    *server = fresh.clone();
                    refreshed += 1;
                }
            }

            let change = (refreshed > 0).then_some(StoreChange::ListReconciled { refreshed });
            (refreshed, change)
        })
    }

    /// Apply `f` in one write section, then persist and broadcast if it
    /// reported a change.
    fn mutate<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Vec<ServerRecord>) -> (R, Option<StoreChange>),
    {
        let mut servers = self.servers.write().unwrap_or_else(PoisonError::into_inner);
        let (result, change) = f(&mut *servers);

        let Some(change) = change else {
            return result;
        };

        self.metrics.record_store_mutation();

        if let Some(persistence) = &self.persistence {
            // Take the save slot before releasing the list so saves follow
            // mutation order, then write without blocking readers.
            let _order = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let blob = serde_json::to_string(&*servers);
            drop(servers);

            let saved = blob
                .context("Failed to serialize favorites")
                .and_then(|blob| persistence.save(&self.key, &blob));
            if let Err(e) = saved {
                self.metrics.record_persist_failure();
                tracing::error!("Failed to persist favorites '{}': {:#}", self.key, e);
            }
        } else {
            drop(servers);
        }

        // Ignore send errors - it's OK if no one is listening
        let _ = self.change_tx.send(change);

        result
    }
}

impl Clone for FavoriteStore {
    fn clone(&self) -> Self {
        Self {
            servers: Arc::clone(&self.servers),
            persistence: self.persistence.clone(),
            key: self.key.clone(),
            persist_lock: Arc::clone(&self.persist_lock),
            change_tx: self.change_tx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl Default for FavoriteStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn dedup_by_addr(list: Vec<ServerRecord>) -> Vec<ServerRecord> {
    let mut seen = HashSet::new();
    let before = list.len();
    let list: Vec<ServerRecord> = list
        .into_iter()
        .filter(|s| seen.insert(s.addr.clone()))
        .collect();

    if list.len() != before {
        tracing::warn!("Dropped {} duplicate server addresses", before - list.len());
    }
    list
}
