// FTLL - favorite servers, ping enrichment and play validation for the DayZ launcher
//
// This library crate holds the launcher state layer. Rendering, the native
// Steam/DayZ calls and the mod download worker are supplied by the host
// application through the traits in `services::bridge`.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{LatencyClass, LauncherConfig, ModEntry, PING_OFFLINE, PING_UNMEASURED, ServerRecord};
pub use state::{AddOutcome, FAVORITES_KEY, FavoriteStore, StoreChange};
pub use storage::{BlobStore, FileBlobStore, MemoryBlobStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
