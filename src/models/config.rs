use serde::{Deserialize, Serialize};

/// Launcher configuration from FTLL Settings.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(rename = "FTLL_Settings", default)]
    pub launcher_settings: LauncherSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherSettings {
    /// Blob key the favorite list is stored under
    #[serde(rename = "Favorites Key", default = "default_favorites_key")]
    pub favorites_key: String,

    /// Directory holding persisted blobs, relative to the config directory
    #[serde(rename = "Storage Dir", default = "default_storage_dir")]
    pub storage_dir: String,

    #[serde(rename = "Log Dir", default = "default_log_dir")]
    pub log_dir: String,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,

    #[serde(rename = "Console Logging", default = "default_true")]
    pub console_logging: bool,

    #[serde(rename = "JSON Logs", default)]
    pub json_logs: bool,

    /// Upper bound on ping probes running at the same time
    #[serde(rename = "Max Concurrent Pings", default = "default_max_concurrent_pings")]
    pub max_concurrent_pings: usize,

    #[serde(rename = "Master Refresh Seconds", default = "default_master_refresh_secs")]
    pub master_refresh_secs: u64,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            favorites_key: default_favorites_key(),
            storage_dir: default_storage_dir(),
            log_dir: default_log_dir(),
            debug_mode: false,
            console_logging: true,
            json_logs: false,
            max_concurrent_pings: default_max_concurrent_pings(),
            master_refresh_secs: default_master_refresh_secs(),
        }
    }
}

impl LauncherSettings {
    pub fn master_refresh_interval(&self) -> std::time::Duration {
        // A zero interval would make tokio::time::interval panic.
        std::time::Duration::from_secs(self.master_refresh_secs.max(1))
    }
}

fn default_favorites_key() -> String {
    crate::state::FAVORITES_KEY.to_string()
}

fn default_storage_dir() -> String {
    "storage".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_pings() -> usize {
    16
}

fn default_master_refresh_secs() -> u64 {
    60
}
