//! Services module - the launcher workflows built on top of the favorite store.
//!
//! # Components
//!
//! - [`PingEnricher`]: measures latency for favorites that have none yet and
//!   folds each result into the store exactly once
//! - [`MasterListReconciler`]: refreshes favorites from the master server list
//!   without ever adding or pruning entries
//! - [`PlayValidationWorkflow`]: the Play button state machine (mod check,
//!   missing-mod resolution, launch)
//! - [`ModDownloadQueue`]: pending downloads the workflow pushes missing mods into
//! - [`bridge`]: traits for the native side and the shell, which the host
//!   application implements
//!
//! # Usage Example
//!
//! ```ignore
//! use ftll::services::{PingEnricher, PlayValidationWorkflow, ModDownloadQueue};
//!
//! let enricher = PingEnricher::new(store.clone(), Arc::new(native_probe), 16);
//! enricher.enrich_all().await;
//!
//! let workflow = PlayValidationWorkflow::new(mods, launcher, Arc::new(ModDownloadQueue::new()), shell);
//! match workflow.play_favorite(&store, "203.0.113.7:27016").await? {
//!     PlayOutcome::MissingMods(missing) => { /* ask the user, then */ workflow.download().await?; }
//!     _ => {}
//! }
//! ```

pub mod bridge;
pub mod download_queue;
pub mod ping;
pub mod play;
pub mod reconcile;

pub use bridge::{
    DownloadQueue, GameLauncher, MasterListSource, ModService, OFFLINE_MARKER, PingProbe, Shell,
    View,
};
pub use download_queue::{ModDownloadQueue, QueuedMod, UNKNOWN_MOD_NAME};
pub use ping::{EnrichOutcome, EnrichSummary, PingEnricher, ProbeReading};
pub use play::{
    DownloadReport, LAUNCH_FAILURE_TITLE, LAUNCH_SUCCESS_TITLE, MissingMod, PlayError,
    PlayOutcome, PlayState, PlayValidationWorkflow, QueueFailure, notification_name,
};
pub use reconcile::{MasterListReconciler, ReconcileReport};
