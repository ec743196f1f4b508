//! Pre-launch validation.
//!
//! [`PlayValidationWorkflow`] is run when the user presses Play on a server.
//! It never launches with a mod set known to be incomplete: missing mods are
//! reported first and the user either queues them for download or cancels.
//!
//! ```text
//! Idle -> CheckingMods -> Launching -> Idle
//!              |
//!              v
//!   AwaitingUserResolution -(cancel)-> Idle
//!              |
//!          (download)
//!              v
//!      QueuingDownloads -> Idle
//! ```

use crate::metrics::Metrics;
use crate::models::ServerRecord;
use crate::services::bridge::{DownloadQueue, GameLauncher, ModService, Shell, View};
use crate::services::download_queue::UNKNOWN_MOD_NAME;
use crate::state::FavoriteStore;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

pub const LAUNCH_SUCCESS_TITLE: &str = "Successfully loaded mods & launched DayZ";
pub const LAUNCH_FAILURE_TITLE: &str = "Failed to launch DayZ";

/// Longest server name shown in a notification before it is cut off.
pub const MAX_NOTIFICATION_NAME_CHARS: usize = 45;

/// A required mod that is not installed locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingMod {
    pub workshop_id: u64,
    /// Name from the server's mod list, or [`UNKNOWN_MOD_NAME`]
    pub name: String,
}

/// Where the workflow currently is
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Idle,

    CheckingMods {
        addr: String,
    },

    /// Waiting for the user to download or cancel
    AwaitingUserResolution {
        server: ServerRecord,
        missing: Vec<MissingMod>,
    },

    /// Download was confirmed; install and queue requests are being issued
    QueuingDownloads {
        addr: String,
    },

    Launching {
        addr: String,
    },
}

/// Result of a play attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The game launched; `description` is the name shown in the notification
    Launched { description: String },

    /// The launcher reported an error; the user was notified
    LaunchFailed { reason: String },

    /// Mods are missing; the workflow now waits in `AwaitingUserResolution`
    MissingMods(Vec<MissingMod>),
}

/// A single install or queue request that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFailure {
    pub workshop_id: u64,
    pub error: String,
}

/// Aggregated result of the Download branch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Missing mods the user asked to download
    pub requested: usize,

    /// Mods for which both the install and the queue request succeeded
    pub queued: usize,

    pub install_failures: Vec<QueueFailure>,

    pub queue_failures: Vec<QueueFailure>,

    /// Whether the mod manager view was opened
    pub navigated: bool,
}

impl DownloadReport {
    pub fn failure_count(&self) -> usize {
        self.install_failures.len() + self.queue_failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0 && self.navigated
    }
}

/// Errors returned to the caller of the workflow
#[derive(Error, Debug)]
pub enum PlayError {
    #[error("Another play request is already in progress")]
    Busy,

    #[error("Server {0} is not a favorite")]
    UnknownServer(String),

    #[error("Failed to check installed mods: {0:#}")]
    ModCheck(anyhow::Error),

    #[error("No missing mods are waiting for a decision")]
    NotAwaitingResolution,
}

/// Puts a transient state back to `Idle` if the owning future is dropped
/// mid-flight. `Idle` and `AwaitingUserResolution` are left alone.
struct ResetOnDrop<'a> {
    state_tx: &'a watch::Sender<PlayState>,
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.state_tx.send_if_modified(|state| match state {
            PlayState::CheckingMods { .. }
            | PlayState::QueuingDownloads { .. }
            | PlayState::Launching { .. } => {
                tracing::debug!("Play request abandoned in {:?}, resetting", state);
                *state = PlayState::Idle;
                true
            }
            PlayState::Idle | PlayState::AwaitingUserResolution { .. } => false,
        });
    }
}

/// Server name as shown in notifications: at most 45 characters, then "...".
pub fn notification_name(name: &str) -> String {
    if name.chars().count() > MAX_NOTIFICATION_NAME_CHARS {
        let short: String = name.chars().take(MAX_NOTIFICATION_NAME_CHARS).collect();
        format!("{}...", short)
    } else {
        name.to_string()
    }
}

/// Play-intent state machine.
///
/// One play request runs at a time; a second `play` while the first has not
/// returned to `Idle` fails with [`PlayError::Busy`]. The current state is
/// published on a watch channel for the UI. Dropping a `play` or `download`
/// future part way through puts the state back to `Idle`.
pub struct PlayValidationWorkflow<M, L, D, S> {
    mods: Arc<M>,
    launcher: Arc<L>,
    queue: Arc<D>,
    shell: Arc<S>,
    state_tx: watch::Sender<PlayState>,
    metrics: Arc<Metrics>,
}

impl<M, L, D, S> PlayValidationWorkflow<M, L, D, S>
where
    M: ModService,
    L: GameLauncher,
    D: DownloadQueue,
    S: Shell,
{
    pub fn new(mods: Arc<M>, launcher: Arc<L>, queue: Arc<D>, shell: Arc<S>) -> Self {
        let (state_tx, _) = watch::channel(PlayState::Idle);
        Self {
            mods,
            launcher,
            queue,
            shell,
            state_tx,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn state(&self) -> PlayState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: PlayState) {
        self.state_tx.send_replace(state);
    }

    /// Play the favorite stored under `addr`, reading its current record.
    pub async fn play_favorite(
        &self,
        store: &FavoriteStore,
        addr: &str,
    ) -> Result<PlayOutcome, PlayError> {
        let server = store
            .get(addr)
            .ok_or_else(|| PlayError::UnknownServer(addr.to_string()))?;
        self.play(&server).await
    }

    /// Handle a Play press for `server`.
    ///
    /// Servers without mod requirements launch straight away. Otherwise the
    /// mod service is asked which required mods are missing; with none
    /// missing the game launches, with some missing the workflow stops in
    /// `AwaitingUserResolution` and returns them.
    pub async fn play(&self, server: &ServerRecord) -> Result<PlayOutcome, PlayError> {
        let started = self.state_tx.send_if_modified(|state| {
            if *state == PlayState::Idle {
                *state = PlayState::CheckingMods {
                    addr: server.addr.clone(),
                };
                true
            } else {
                false
            }
        });
        if !started {
            return Err(PlayError::Busy);
        }
        let _reset = ResetOnDrop {
            state_tx: &self.state_tx,
        };

        tracing::info!("Play requested for {} ({})", server.name, server.addr);

        if !server.has_mod_requirements() {
            tracing::debug!("{} has no mod requirements", server.addr);
            return Ok(self.launch(server).await);
        }

        let required = server.required_workshop_ids();
        let missing_ids = match self.mods.get_missing_mods(&required).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("Missing mod check for {} failed: {:#}", server.addr, e);
                self.set_state(PlayState::Idle);
                return Err(PlayError::ModCheck(e));
            }
        };

        if missing_ids.is_empty() {
            tracing::debug!("All {} mods for {} installed", required.len(), server.addr);
            return Ok(self.launch(server).await);
        }

        let mut seen = HashSet::new();
        let missing: Vec<MissingMod> = missing_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .map(|workshop_id| MissingMod {
                workshop_id,
                name: server
                    .mod_name(workshop_id)
                    .unwrap_or(UNKNOWN_MOD_NAME)
                    .to_string(),
            })
            .collect();

        tracing::info!(
            "{} is missing {} of {} required mods",
            server.addr,
            missing.len(),
            required.len()
        );

        self.set_state(PlayState::AwaitingUserResolution {
            server: server.clone(),
            missing: missing.clone(),
        });

        Ok(PlayOutcome::MissingMods(missing))
    }

    /// The user declined to download the missing mods.
    pub fn cancel(&self) -> Result<(), PlayError> {
        let cancelled = self.state_tx.send_if_modified(|state| {
            if matches!(state, PlayState::AwaitingUserResolution { .. }) {
                *state = PlayState::Idle;
                true
            } else {
                false
            }
        });

        if cancelled {
            tracing::info!("Missing mod download cancelled");
            Ok(())
        } else {
            Err(PlayError::NotAwaitingResolution)
        }
    }

    /// The user confirmed downloading the missing mods.
    ///
    /// Every missing mod gets an install request and a download queue entry.
    /// A failed request is logged and recorded in the report; it does not
    /// stop the remaining mods. Afterwards the mod manager view is opened once.
    pub async fn download(&self) -> Result<DownloadReport, PlayError> {
        let mut pending = None;
        self.state_tx.send_if_modified(|state| {
            let PlayState::AwaitingUserResolution { server, .. } = state else {
                return false;
            };
            let addr = server.addr.clone();
            pending = Some(std::mem::replace(state, PlayState::QueuingDownloads { addr }));
            true
        });

        let Some(PlayState::AwaitingUserResolution { server, missing }) = pending else {
            return Err(PlayError::NotAwaitingResolution);
        };
        let _reset = ResetOnDrop {
            state_tx: &self.state_tx,
        };

        let mut report = DownloadReport {
            requested: missing.len(),
            ..DownloadReport::default()
        };

        for m in &missing {
            let mut ok = true;

            if let Err(e) = self.mods.queue_mod_install(m.workshop_id).await {
                tracing::warn!("Install request for mod {} failed: {:#}", m.workshop_id, e);
                self.metrics.record_queue_failure();
                report.install_failures.push(QueueFailure {
                    workshop_id: m.workshop_id,
                    error: format!("{:#}", e),
                });
                ok = false;
            }

            if let Err(e) = self.queue.push_mod(m.workshop_id, &m.name).await {
                tracing::warn!("Queueing mod {} failed: {:#}", m.workshop_id, e);
                self.metrics.record_queue_failure();
                report.queue_failures.push(QueueFailure {
                    workshop_id: m.workshop_id,
                    error: format!("{:#}", e),
                });
                ok = false;
            }

            if ok {
                self.metrics.record_mod_queued();
                report.queued += 1;
            }
        }

        match self.shell.navigate(View::ModManager) {
            Ok(()) => report.navigated = true,
            Err(e) => tracing::warn!("Failed to open {}: {:#}", View::ModManager.route(), e),
        }

        tracing::info!(
            "Requested {} missing mods for {}: {} queued, {} failed requests",
            report.requested,
            server.addr,
            report.queued,
            report.failure_count()
        );

        self.set_state(PlayState::Idle);
        Ok(report)
    }

    async fn launch(&self, server: &ServerRecord) -> PlayOutcome {
        self.set_state(PlayState::Launching {
            addr: server.addr.clone(),
        });
        self.metrics.record_launch();

        let outcome = match self.launcher.launch_with_mods(server).await {
            Ok(()) => {
                let description = notification_name(&server.name);
                tracing::info!("Launched game for {}", server.addr);
                self.shell.notify_success(LAUNCH_SUCCESS_TITLE, &description);
                PlayOutcome::Launched { description }
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                self.metrics.record_launch_failure();
                tracing::error!("Launch for {} failed: {}", server.addr, reason);
                self.shell.notify_error(LAUNCH_FAILURE_TITLE, &reason);
                PlayOutcome::LaunchFailed { reason }
            }
        };

        self.set_state(PlayState::Idle);
        outcome
    }
}
