use crate::models::LauncherConfig;
use crate::storage::FileBlobStore;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Name of the launcher settings file inside the config directory.
pub const SETTINGS_FILE: &str = "FTLL Settings.yaml";

/// Configuration manager for the launcher settings file.
///
/// Settings live in `FTLL Settings.yaml`; the favorites blob store lives in a
/// storage directory next to it (relative paths resolve against the config
/// directory).
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager, creating `config_dir` if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE),
            config_dir,
        })
    }

    /// Load the launcher settings, or defaults if the file doesn't exist.
    pub fn load_config(&self) -> Result<LauncherConfig> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Ok(LauncherConfig::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let config: LauncherConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(config)
    }

    pub fn save_config(&self, config: &LauncherConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Resolve a configured directory against the config directory.
    pub fn resolve_dir(&self, dir: &str) -> Utf8PathBuf {
        let dir = Utf8Path::new(dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.config_dir.join(dir)
        }
    }

    /// Open the blob store the favorites are persisted in.
    pub fn open_blob_store(&self, config: &LauncherConfig) -> Result<FileBlobStore> {
        FileBlobStore::new(self.resolve_dir(&config.launcher_settings.storage_dir))
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}
