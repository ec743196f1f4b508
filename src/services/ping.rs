//! Ping enrichment for favorite servers.
//!
//! [`PingEnricher`] runs the native probe for records that have no measured
//! ping yet and folds the result back into the [`FavoriteStore`]. Each address
//! has at most one probe in flight; records that already carry a ping are
//! never probed again.

use crate::metrics::Metrics;
use crate::models::{PING_OFFLINE, PING_UNMEASURED};
use crate::services::bridge::{OFFLINE_MARKER, PingProbe};
use crate::state::FavoriteStore;
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Interpretation of a probe's textual result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeReading {
    Latency(u32),
    Offline,
    /// Neither a number nor the offline marker
    Unparsable,
}

/// What a call to [`PingEnricher::enrich`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// The probe ran and the store now holds `ping`
    Enriched { ping: u32 },

    /// The record already had a ping; no probe was started
    AlreadyMeasured,

    /// Another probe for this address is still running
    AlreadyInFlight,

    /// The address is not in the store
    UnknownServer,

    /// The record was removed while the probe ran; the result was dropped
    RecordGone { ping: u32 },
}

/// Tally of an [`PingEnricher::enrich_all`] pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub measured: usize,
    pub offline: usize,
    pub skipped: usize,
    pub dropped: usize,
    pub failed_tasks: usize,
}

impl EnrichSummary {
    fn record(&mut self, outcome: EnrichOutcome) {
        match outcome {
            EnrichOutcome::Enriched { ping: PING_OFFLINE } => self.offline += 1,
            EnrichOutcome::Enriched { .. } => self.measured += 1,
            EnrichOutcome::RecordGone { .. } => self.dropped += 1,
            EnrichOutcome::AlreadyMeasured
            | EnrichOutcome::AlreadyInFlight
            | EnrichOutcome::UnknownServer => self.skipped += 1,
        }
    }
}

/// Removes its address from the in-flight set when dropped.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    addr: String,
}

impl InFlightGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<String>>>, addr: &str) -> Option<Self> {
        let inserted = in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(addr.to_string());

        inserted.then(|| Self {
            in_flight: Arc::clone(in_flight),
            addr: addr.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.addr);
    }
}

/// Drives one probe per unmeasured favorite and stores the result.
///
/// Clones share the probe, the in-flight set and the concurrency limit.
pub struct PingEnricher<P> {
    store: FavoriteStore,

    probe: Arc<P>,

    /// Addresses with a probe currently running
    in_flight: Arc<Mutex<HashSet<String>>>,

    /// Caps the number of probes running at once
    limiter: Arc<Semaphore>,

    /// Matches "42" or "42ms" probe output
    latency_pattern: Regex,

    metrics: Arc<Metrics>,
}

impl<P: PingProbe> PingEnricher<P> {
    pub fn new(store: FavoriteStore, probe: Arc<P>, max_concurrent: usize) -> Self {
        Self {
            store,
            probe,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
            latency_pattern: Regex::new(r"^([0-9]+)\s*(?:ms)?$").expect("Invalid latency regex"),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Whether a probe for `addr` is currently running
    pub fn is_in_flight(&self, addr: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(addr)
    }

    /// Interpret the text a probe returned.
    pub fn parse_reading(&self, text: &str) -> ProbeReading {
        let text = text.trim();

        if text.eq_ignore_ascii_case(OFFLINE_MARKER) {
            return ProbeReading::Offline;
        }

        self.latency_pattern
            .captures(text)
            // Only ASCII digits match, so a failed parse is an overflow.
            .map(|caps| ProbeReading::Latency(caps[1].parse::<u32>().unwrap_or(u32::MAX)))
            .unwrap_or(ProbeReading::Unparsable)
    }

    /// Value stored for a reading. Unparsable output fails closed to offline.
    fn ping_for(&self, addr: &str, reading: ProbeReading) -> u32 {
        match reading {
            ProbeReading::Offline => PING_OFFLINE,
            ProbeReading::Unparsable => {
                self.metrics.record_ping_parse_failure();
                tracing::warn!("Unparsable ping result for {}, marking offline", addr);
                PING_OFFLINE
            }
            // 0 means "unmeasured" and the offline value means "no answer", so
            // real measurements stay strictly between them.
            ProbeReading::Latency(ms) => ms.clamp(PING_UNMEASURED + 1, PING_OFFLINE - 1),
        }
    }

    /// Measure `addr` once and fold the result into the store.
    ///
    /// The current record is read again after the probe completes so fields
    /// refreshed in the meantime are kept; only `ping` changes.
    pub async fn enrich(&self, addr: &str) -> EnrichOutcome {
        let Some(server) = self.store.get(addr) else {
            return EnrichOutcome::UnknownServer;
        };

        if server.is_ping_measured() {
            tracing::debug!("Ping for {} already known ({}ms)", addr, server.ping);
            return EnrichOutcome::AlreadyMeasured;
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, addr) else {
            tracing::debug!("Ping for {} already in flight", addr);
            return EnrichOutcome::AlreadyInFlight;
        };

        // A probe that finished between the first read and the guard may
        // already have stored a value.
        if self.store.get(addr).is_some_and(|s| s.is_ping_measured()) {
            return EnrichOutcome::AlreadyMeasured;
        }

        // The semaphore is never closed, so acquire only fails if that changes.
        let _permit = self.limiter.acquire().await.ok();

        let ping = match self.probe.measure_ping(addr).await {
            Ok(text) => {
                let reading = self.parse_reading(&text);
                self.ping_for(addr, reading)
            }
            Err(e) => {
                tracing::warn!("Ping probe for {} failed: {:#}", addr, e);
                PING_OFFLINE
            }
        };

        if ping == PING_OFFLINE {
            self.metrics.record_ping_offline();
        } else {
            self.metrics.record_ping_measured();
        }

        let Some(mut current) = self.store.get(addr) else {
            tracing::debug!("{} was removed before its ping completed", addr);
            return EnrichOutcome::RecordGone { ping };
        };

        current.ping = ping;
        if self.store.update_server(current) {
            tracing::debug!("Stored ping {} for {}", ping, addr);
            EnrichOutcome::Enriched { ping }
        } else {
            EnrichOutcome::RecordGone { ping }
        }
    }
}

impl<P: PingProbe + 'static> PingEnricher<P> {
    /// Probe every unmeasured favorite concurrently.
    pub async fn enrich_all(&self) -> EnrichSummary {
        let pending: Vec<String> = self.store.read(|servers| {
            servers
                .iter()
                .filter(|s| !s.is_ping_measured())
                .map(|s| s.addr.clone())
                .collect()
        });

        tracing::info!("Pinging {} favorite servers", pending.len());

        let mut tasks = JoinSet::new();
        for addr in pending {
            let enricher = self.clone();
            tasks.spawn(async move { enricher.enrich(&addr).await });
        }

        let mut summary = EnrichSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    tracing::warn!("Ping task failed: {}", e);
                    summary.failed_tasks += 1;
                }
            }
        }

        tracing::info!(
            "Ping pass finished: {} measured, {} offline, {} skipped, {} dropped",
            summary.measured,
            summary.offline,
            summary.skipped,
            summary.dropped
        );

        summary
    }
}

impl<P> Clone for PingEnricher<P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            probe: Arc::clone(&self.probe),
            in_flight: Arc::clone(&self.in_flight),
            limiter: Arc::clone(&self.limiter),
            latency_pattern: self.latency_pattern.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServerRecord;
    use anyhow::{Result, anyhow};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Probe answering from a fixed table, optionally waiting for a release signal.
    #[derive(Default)]
    struct ScriptedProbe {
        responses: HashMap<String, Result<String, String>>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedProbe {
        fn with(mut self, addr: &str, response: Result<&str, &str>) -> Self {
            self.responses.insert(
                addr.to_string(),
                response.map(str::to_string).map_err(str::to_string),
            );
            self
        }
    }

    impl PingProbe for ScriptedProbe {
        async fn measure_ping(&self, addr: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.responses.get(addr) {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(e)) => Err(anyhow!("{}", e)),
                None => Ok(OFFLINE_MARKER.to_string()),
            }
        }
    }

    fn store_with(addrs: &[(&str, u32)]) -> FavoriteStore {
        let store = FavoriteStore::in_memory();
        store.set_server_list(
            addrs
                .iter()
                .map(|(addr, ping)| ServerRecord::new(*addr, "Test", 2302).with_ping(*ping))
                .collect(),
        );
        store
    }

    #[test]
    fn test_parse_reading() {
        let enricher = PingEnricher::new(FavoriteStore::in_memory(), Arc::new(ScriptedProbe::default()), 4);

        assert_eq!(enricher.parse_reading("42"), ProbeReading::Latency(42));
        assert_eq!(enricher.parse_reading(" 87ms\n"), ProbeReading::Latency(87));
        assert_eq!(enricher.parse_reading("Offline"), ProbeReading::Offline);
        assert_eq!(enricher.parse_reading("timeout"), ProbeReading::Unparsable);
        assert_eq!(enricher.parse_reading("-5"), ProbeReading::Unparsable);
        assert_eq!(enricher.parse_reading("99999999999"), ProbeReading::Latency(u32::MAX));
        assert_eq!(enricher.parse_reading("٤٢"), ProbeReading::Unparsable);
        assert_eq!(enricher.parse_reading(""), ProbeReading::Unparsable);
    }

    #[tokio::test]
    async fn test_enrich_stores_measured_ping() {
        let store = store_with(&[("A:1", 0)]);
        let probe = Arc::new(ScriptedProbe::default().with("A:1", Ok("48")));
        let enricher = PingEnricher::new(store.clone(), probe, 4);

        assert_eq!(enricher.enrich("A:1").await, EnrichOutcome::Enriched { ping: 48 });
        assert_eq!(store.get("A:1").unwrap().ping, 48);
    }

    #[tokio::test]
    async fn test_offline_result_stores_sentinel() {
        let store = store_with(&[("A:1", 0)]);
        let probe = Arc::new(ScriptedProbe::default().with("A:1", Ok("Offline")));
        let enricher = PingEnricher::new(store.clone(), probe, 4);

        enricher.enrich("A:1").await;

        assert_eq!(store.get("A:1").unwrap().ping, PING_OFFLINE);
    }

    #[tokio::test]
    async fn test_garbage_and_errors_fail_closed() {
        let store = store_with(&[("A:1", 0), ("B:1", 0)]);
        let probe = Arc::new(
            ScriptedProbe::default()
                .with("A:1", Ok("n/a"))
                .with("B:1", Err("socket closed")),
        );
        let metrics = Arc::new(Metrics::new());
        let enricher = PingEnricher::new(store.clone(), probe, 4).with_metrics(metrics.clone());

        enricher.enrich("A:1").await;
        enricher.enrich("B:1").await;

        assert_eq!(store.get("A:1").unwrap().ping, PING_OFFLINE);
        assert_eq!(store.get("B:1").unwrap().ping, PING_OFFLINE);
        assert_eq!(metrics.ping_parse_failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.pings_offline.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_zero_latency_is_not_unmeasured() {
        let store = store_with(&[("A:1", 0)]);
        let probe = Arc::new(ScriptedProbe::default().with("A:1", Ok("0")));
        let enricher = PingEnricher::new(store.clone(), probe, 4);

        assert_eq!(enricher.enrich("A:1").await, EnrichOutcome::Enriched { ping: 1 });
    }

    #[tokio::test]
    async fn test_slow_answer_is_not_offline() {
        let store = store_with(&[("A:1", 0), ("B:1", 0), ("C:1", 0)]);
        let probe = Arc::new(
            ScriptedProbe::default()
                .with("A:1", Ok("99999"))
                .with("B:1", Ok("100000"))
                .with("C:1", Ok("99999999999ms")),
        );
        let enricher = PingEnricher::new(store.clone(), probe, 4);

        for addr in ["A:1", "B:1", "C:1"] {
            assert_eq!(
                enricher.enrich(addr).await,
                EnrichOutcome::Enriched { ping: PING_OFFLINE - 1 }
            );
            assert!(!store.get(addr).unwrap().is_offline());
        }
    }

    #[tokio::test]
    async fn test_measured_record_is_not_probed() {
        let store = store_with(&[("A:1", 35)]);
        let probe = Arc::new(ScriptedProbe::default().with("A:1", Ok("10")));
        let enricher = PingEnricher::new(store.clone(), probe.clone(), 4);

        assert_eq!(enricher.enrich("A:1").await, EnrichOutcome::AlreadyMeasured);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.get("A:1").unwrap().ping, 35);
    }

    #[tokio::test]
    async fn test_second_call_after_success_is_noop() {
        let store = store_with(&[("A:1", 0)]);
        let probe = Arc::new(ScriptedProbe::default().with("A:1", Ok("20")));
        let enricher = PingEnricher::new(store, probe.clone(), 4);

        enricher.enrich("A:1").await;
        enricher.enrich("A:1").await;

        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_server() {
        let enricher = PingEnricher::new(FavoriteStore::in_memory(), Arc::new(ScriptedProbe::default()), 4);
        assert_eq!(enricher.enrich("nope:1").await, EnrichOutcome::UnknownServer);
    }

    #[tokio::test]
    async fn test_single_probe_in_flight_per_address() {
        let gate = Arc::new(Notify::new());
        let probe = Arc::new(ScriptedProbe {
            gate: Some(gate.clone()),
            ..ScriptedProbe::default().with("A:1", Ok("64"))
        });
        let store = store_with(&[("A:1", 0)]);
        let enricher = PingEnricher::new(store.clone(), probe.clone(), 4);

        let first = {
            let enricher = enricher.clone();
            tokio::spawn(async move { enricher.enrich("A:1").await })
        };
        while !enricher.is_in_flight("A:1") {
            tokio::task::yield_now().await;
        }

        assert_eq!(enricher.enrich("A:1").await, EnrichOutcome::AlreadyInFlight);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), EnrichOutcome::Enriched { ping: 64 });
        assert!(!enricher.is_in_flight("A:1"));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_removed_during_probe_is_dropped() {
        let gate = Arc::new(Notify::new());
        let probe = Arc::new(ScriptedProbe {
            gate: Some(gate.clone()),
            ..ScriptedProbe::default().with("A:1", Ok("64"))
        });
        let store = store_with(&[("A:1", 0), ("B:1", 12)]);
        let enricher = PingEnricher::new(store.clone(), probe, 4);

        let pending = {
            let enricher = enricher.clone();
            tokio::spawn(async move { enricher.enrich("A:1").await })
        };
        while !enricher.is_in_flight("A:1") {
            tokio::task::yield_now().await;
        }

        store.remove_server_by_addr("A:1");
        gate.notify_one();

        assert_eq!(pending.await.unwrap(), EnrichOutcome::RecordGone { ping: 64 });
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_enrich_all_only_probes_unmeasured() {
        let store = store_with(&[("A:1", 0), ("B:1", 25), ("C:1", 0), ("D:1", 0)]);
        let probe = Arc::new(
            ScriptedProbe::default()
                .with("A:1", Ok("15"))
                .with("C:1", Ok("Offline"))
                .with("D:1", Ok("300")),
        );
        let enricher = PingEnricher::new(store.clone(), probe.clone(), 2);

        let summary = enricher.enrich_all().await;

        assert_eq!(summary.measured, 2);
        assert_eq!(summary.offline, 1);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);

        let pings: Vec<u32> = store.servers().iter().map(|s| s.ping).collect();
        assert_eq!(pings, vec![15, 25, PING_OFFLINE, 300]);
    }
}
