//! Interfaces to the collaborators the launcher core drives but does not own.
//!
//! The native side (ping probe, Workshop lookups, game launch) and the shell
//! (notifications, navigation) are supplied by the host application. Async
//! operations return `Send` futures so they can run on tokio worker threads;
//! implementors can write them as plain `async fn`.

use crate::models::ServerRecord;
use anyhow::Result;
use std::future::Future;

/// Result text a probe returns for an unreachable server.
pub const OFFLINE_MARKER: &str = "Offline";

/// Native latency probe.
pub trait PingProbe: Send + Sync {
    /// Measure round-trip time to `addr`.
    ///
    /// Resolves to the latency in milliseconds as text, or [`OFFLINE_MARKER`].
    fn measure_ping(&self, addr: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Native Workshop mod management.
pub trait ModService: Send + Sync {
    /// Subset of `required` that is not installed locally. Empty means satisfied.
    fn get_missing_mods(&self, required: &[u64]) -> impl Future<Output = Result<Vec<u64>>> + Send;

    /// Subscribe to a Workshop item so it gets installed.
    fn queue_mod_install(&self, workshop_id: u64) -> impl Future<Output = Result<()>> + Send;
}

/// Pending-download list the mod manager view works through.
pub trait DownloadQueue: Send + Sync {
    fn push_mod(&self, workshop_id: u64, name: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Native game launch.
pub trait GameLauncher: Send + Sync {
    /// Launch the game connected to `server` with its mod set.
    ///
    /// `Ok(())` is the "no error" result; anything else is a failed launch.
    fn launch_with_mods(&self, server: &ServerRecord) -> impl Future<Output = Result<()>> + Send;
}

/// Source of the full server directory.
pub trait MasterListSource: Send + Sync {
    fn fetch_master_list(&self) -> impl Future<Output = Result<Vec<ServerRecord>>> + Send;
}

/// Views the core can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    ModManager,
}

impl View {
    pub fn route(&self) -> &'static str {
        match self {
            View::ModManager => "/mod-manager",
        }
    }
}

/// User-facing side effects: toasts and navigation.
pub trait Shell: Send + Sync {
    fn notify_success(&self, title: &str, description: &str);

    fn notify_error(&self, title: &str, description: &str);

    fn navigate(&self, view: View) -> Result<()>;
}
