//! Master list reconciliation.
//!
//! Refreshing never adds or removes favorites: stored records that the master
//! list still reports are replaced by the master's version, everything else
//! stays as the user left it.

use crate::metrics::Metrics;
use crate::models::ServerRecord;
use crate::services::bridge::MasterListSource;
use crate::state::FavoriteStore;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

/// Outcome of merging one master list into the favorites
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Favorites replaced by their master list version
    pub refreshed: usize,

    pub favorites_total: usize,

    /// Favorites the master list did not report (offline or delisted), kept as-is
    pub missing_from_master: Vec<String>,
}

pub struct MasterListReconciler {
    store: FavoriteStore,
    metrics: Arc<Metrics>,
}

impl MasterListReconciler {
    pub fn new(store: FavoriteStore) -> Self {
        Self {
            store,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Merge an already fetched master list into the favorites.
    pub fn reconcile(&self, master: &[ServerRecord]) -> ReconcileReport {
        let refreshed = self.store.update_server_list(master);

        let master_addrs: HashSet<&str> = master.iter().map(|m| m.addr.as_str()).collect();
        let (favorites_total, missing_from_master) = self.store.read(|servers| {
            let missing = servers
                .iter()
                .filter(|s| !master_addrs.contains(s.addr.as_str()))
                .map(|s| s.addr.clone())
                .collect();
            (servers.len(), missing)
        });

        let report = ReconcileReport {
            refreshed,
            favorites_total,
            missing_from_master,
        };

        tracing::info!(
            "Reconciled favorites with master list ({} servers): {} refreshed, {} not listed",
            master.len(),
            report.refreshed,
            report.missing_from_master.len()
        );

        report
    }

    /// Fetch the master list once and merge it.
    ///
    /// A failed fetch leaves the favorites untouched.
    pub async fn refresh_once<S: MasterListSource>(&self, source: &S) -> Result<ReconcileReport> {
        let master = match source.fetch_master_list().await {
            Ok(master) => master,
            Err(e) => {
                self.metrics.record_master_refresh_failure();
                return Err(e).context("Failed to fetch master server list");
            }
        };

        self.metrics.record_master_refresh();
        Ok(self.reconcile(&master))
    }

    /// Refresh every `period` until `cancel_rx` turns true or its sender is dropped.
    ///
    /// The first refresh runs immediately. Fetch failures are logged and the
    /// loop keeps going.
    pub async fn run<S: MasterListSource>(
        &self,
        source: &S,
        period: Duration,
        mut cancel_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Master list refresh every {:?}", period);

        loop {
            if *cancel_rx.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh_once(source).await {
                        tracing::warn!("{:#}", e);
                    }
                }
                changed = cancel_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Master list refresh stopped");
    }
}
