//! Recording fakes for the native bridge and the shell.
#![allow(dead_code)]

use anyhow::{Result, anyhow};
use ftll::ServerRecord;
use ftll::services::{
    DownloadQueue, GameLauncher, MasterListSource, ModService, OFFLINE_MARKER, PingProbe, Shell,
    View,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Probe answering from a table; unknown addresses are offline.
#[derive(Default)]
pub struct TableProbe {
    pub latencies: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl TableProbe {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            latencies: entries
                .iter()
                .map(|(addr, text)| (addr.to_string(), text.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl PingProbe for TableProbe {
    async fn measure_ping(&self, addr: &str) -> Result<String> {
        self.calls.lock().unwrap().push(addr.to_string());
        Ok(self
            .latencies
            .get(addr)
            .cloned()
            .unwrap_or_else(|| OFFLINE_MARKER.to_string()))
    }
}

/// Mod service with a fixed missing set and optional failing installs.
#[derive(Default)]
pub struct RecordingMods {
    pub missing: Vec<u64>,
    pub fail_check: bool,
    /// Never answer the missing mod check
    pub stall_check: bool,
    pub fail_install: HashSet<u64>,
    pub checks: Mutex<Vec<Vec<u64>>>,
    pub installs: Mutex<Vec<u64>>,
}

impl ModService for RecordingMods {
    async fn get_missing_mods(&self, required: &[u64]) -> Result<Vec<u64>> {
        self.checks.lock().unwrap().push(required.to_vec());
        if self.stall_check {
            std::future::pending::<()>().await;
        }
        if self.fail_check {
            return Err(anyhow!("Steam client is not running"));
        }
        Ok(self.missing.clone())
    }

    async fn queue_mod_install(&self, workshop_id: u64) -> Result<()> {
        self.installs.lock().unwrap().push(workshop_id);
        if self.fail_install.contains(&workshop_id) {
            return Err(anyhow!("subscribe failed for {}", workshop_id));
        }
        Ok(())
    }
}

/// Download queue recording every push.
#[derive(Default)]
pub struct RecordingQueue {
    pub fail: HashSet<u64>,
    /// Never finish a push
    pub stall: bool,
    pub pushed: Mutex<Vec<(u64, String)>>,
}

impl DownloadQueue for RecordingQueue {
    async fn push_mod(&self, workshop_id: u64, name: &str) -> Result<()> {
        self.pushed
            .lock()
            .unwrap()
            .push((workshop_id, name.to_string()));
        if self.stall {
            std::future::pending::<()>().await;
        }
        if self.fail.contains(&workshop_id) {
            return Err(anyhow!("queue is full"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingLauncher {
    pub fail: bool,
    pub launched: Mutex<Vec<ServerRecord>>,
}

impl GameLauncher for RecordingLauncher {
    async fn launch_with_mods(&self, server: &ServerRecord) -> Result<()> {
        self.launched.lock().unwrap().push(server.clone());
        if self.fail {
            return Err(anyhow!("DayZ is already running"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingShell {
    pub fail_navigation: bool,
    pub successes: Mutex<Vec<(String, String)>>,
    pub errors: Mutex<Vec<(String, String)>>,
    pub navigations: Mutex<Vec<View>>,
}

impl Shell for RecordingShell {
    fn notify_success(&self, title: &str, description: &str) {
        self.successes
            .lock()
            .unwrap()
            .push((title.to_string(), description.to_string()));
    }

    fn notify_error(&self, title: &str, description: &str) {
        self.errors
            .lock()
            .unwrap()
            .push((title.to_string(), description.to_string()));
    }

    fn navigate(&self, view: View) -> Result<()> {
        self.navigations.lock().unwrap().push(view);
        if self.fail_navigation {
            return Err(anyhow!("router not ready"));
        }
        Ok(())
    }
}

/// Master list source returning the same list on every fetch.
pub struct StaticMaster {
    pub servers: Vec<ServerRecord>,
    pub fetches: AtomicUsize,
}

impl StaticMaster {
    pub fn new(servers: Vec<ServerRecord>) -> Self {
        Self {
            servers,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl MasterListSource for StaticMaster {
    async fn fetch_master_list(&self) -> Result<Vec<ServerRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.servers.clone())
    }
}

pub fn server(addr: &str, ping: u32) -> ServerRecord {
    ServerRecord::new(addr, format!("Server {}", addr), 2302).with_ping(ping)
}
