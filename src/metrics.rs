// Launcher metrics
//
// Counters for the outcomes that are only developer-visible (offline probes,
// persistence errors, queuing failures) so they can be reported as counts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free counters shared by the store, enricher, reconciler and play workflow.
#[derive(Debug)]
pub struct Metrics {
    /// Probes that produced a latency value
    pub pings_measured: AtomicU64,

    /// Probes folded in as offline (unreachable, probe error or unparsable)
    pub pings_offline: AtomicU64,

    /// Probe results that were neither numeric nor "Offline"
    pub ping_parse_failures: AtomicU64,

    /// Effective mutations applied to the favorite list
    pub store_mutations: AtomicU64,

    /// Favorite list writes that failed
    pub persist_failures: AtomicU64,

    pub master_refreshes: AtomicU64,

    pub master_refresh_failures: AtomicU64,

    pub launches: AtomicU64,

    pub launch_failures: AtomicU64,

    /// Missing mods successfully handed to the mod service and download queue
    pub mods_queued: AtomicU64,

    /// Individual install/queue requests that failed
    pub queue_failures: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            pings_measured: AtomicU64::new(0),
            pings_offline: AtomicU64::new(0),
            ping_parse_failures: AtomicU64::new(0),
            store_mutations: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            master_refreshes: AtomicU64::new(0),
            master_refresh_failures: AtomicU64::new(0),
            launches: AtomicU64::new(0),
            launch_failures: AtomicU64::new(0),
            mods_queued: AtomicU64::new(0),
            queue_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_ping_measured(&self) {
        self.pings_measured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ping_offline(&self) {
        self.pings_offline.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ping_parse_failure(&self) {
        self.ping_parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_mutation(&self) {
        self.store_mutations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_master_refresh(&self) {
        self.master_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_master_refresh_failure(&self) {
        self.master_refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_launch(&self) {
        self.launches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_launch_failure(&self) {
        self.launch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mod_queued(&self) {
        self.mods_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_failure(&self) {
        self.queue_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Share of completed probes that came back offline, 0.0 when nothing was probed
    pub fn offline_ratio(&self) -> f64 {
        let offline = self.pings_offline.load(Ordering::Relaxed);
        let total = offline + self.pings_measured.load(Ordering::Relaxed);
        if total > 0 {
            offline as f64 / total as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Launcher Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Pings: {} measured, {} offline, {} unparsable",
            self.pings_measured.load(Ordering::Relaxed),
            self.pings_offline.load(Ordering::Relaxed),
            self.ping_parse_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Favorites: {} mutations, {} persist failures",
            self.store_mutations.load(Ordering::Relaxed),
            self.persist_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Master list: {} refreshes, {} failures",
            self.master_refreshes.load(Ordering::Relaxed),
            self.master_refresh_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Launches: {} ({} failed), mods queued: {} ({} failed requests)",
            self.launches.load(Ordering::Relaxed),
            self.launch_failures.load(Ordering::Relaxed),
            self.mods_queued.load(Ordering::Relaxed),
            self.queue_failures.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
