use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::engine::config::PolicyConfig;
use crate::util::atomic_write;

/// Current usage file version
const USAGE_VERSION: &str = "1.0";

/// Durable key-value storage the engine relies on
///
/// Two logical tables: the configuration and the weekly usage counters.
/// Writes must be durable before returning.
pub trait StateStore: Send + Sync {
    /// Load the stored configuration, `None` if none has been saved yet
    fn load_config(&self) -> Result<Option<PolicyConfig>>;

    /// Durably save the configuration
    fn save_config(&self, config: &PolicyConfig) -> Result<()>;

    /// Load the weekly usage table
    fn load_usage(&self) -> Result<BTreeMap<String, u64>>;

    /// Durably save the weekly usage table
    fn save_usage(&self, usage: &BTreeMap<String, u64>) -> Result<()>;
}

/// Weekly usage counters as persisted on disk
#[derive(Debug, Clone, Deserialize, Serialize)]
struct UsageFile {
    pub version: String,

    /// Accumulated minutes keyed "site:week-id"
    pub minutes: BTreeMap<String, u64>,
}

/// File-backed store: YAML configuration plus a JSON usage table,
/// both written atomically
pub struct FileStore {
    config_path: PathBuf,
    usage_path: PathBuf,
}

impl FileStore {
    pub fn new(config_path: PathBuf, usage_path: PathBuf) -> Self {
        Self {
            config_path,
            usage_path,
        }
    }

    /// Resolve store paths from CLI overrides, falling back to the
    /// platform config/data directories
    pub fn resolve(config: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "site-warden")
            .context("Failed to determine platform config directory")?;

        let config_path = config.unwrap_or_else(|| dirs.config_dir().join("config.yaml"));
        let usage_path = data_dir
            .map(|dir| dir.join("usage.json"))
            .unwrap_or_else(|| dirs.data_dir().join("usage.json"));

        Ok(Self::new(config_path, usage_path))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

impl StateStore for FileStore {
    fn load_config(&self) -> Result<Option<PolicyConfig>> {
        if !self.config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file: {}", self.config_path.display()))?;

        let config: PolicyConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", self.config_path.display()))?;

        Ok(Some(config))
    }

    fn save_config(&self, config: &PolicyConfig) -> Result<()> {
        let content = serde_yaml::to_string(config).context("Failed to serialize config")?;

        atomic_write(&self.config_path, content.as_bytes())
            .with_context(|| format!("Failed to write config file: {}", self.config_path.display()))?;

        Ok(())
    }

    fn load_usage(&self) -> Result<BTreeMap<String, u64>> {
        if !self.usage_path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.usage_path)
            .with_context(|| format!("Failed to read usage file: {}", self.usage_path.display()))?;

        let file: UsageFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse usage file: {}", self.usage_path.display()))?;

        if file.version != USAGE_VERSION {
            tracing::warn!(
                "Usage file version mismatch (expected {}, got {}). Starting empty.",
                USAGE_VERSION,
                file.version
            );
            return Ok(BTreeMap::new());
        }

        Ok(file.minutes)
    }

    fn save_usage(&self, usage: &BTreeMap<String, u64>) -> Result<()> {
        let file = UsageFile {
            version: USAGE_VERSION.to_string(),
            minutes: usage.clone(),
        };

        let content =
            serde_json::to_string_pretty(&file).context("Failed to serialize usage table")?;

        atomic_write(&self.usage_path, content.as_bytes())
            .with_context(|| format!("Failed to write usage file: {}", self.usage_path.display()))?;

        Ok(())
    }
}

/// In-memory store for tests
#[cfg(test)]
pub struct MemoryStore {
    config: std::sync::Mutex<Option<PolicyConfig>>,
    usage: std::sync::Mutex<BTreeMap<String, u64>>,
    fail_writes: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self {
            config: std::sync::Mutex::new(None),
            usage: std::sync::Mutex::new(BTreeMap::new()),
            fail_writes: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail, to exercise persistence errors
    pub fn fail_writes(&self) {
        self.fail_writes
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("Simulated persistence failure");
        }
        Ok(())
    }
}

#[cfg(test)]
impl StateStore for MemoryStore {
    fn load_config(&self) -> Result<Option<PolicyConfig>> {
        Ok(self.config.lock().unwrap().clone())
    }

    fn save_config(&self, config: &PolicyConfig) -> Result<()> {
        self.check_writable()?;
        *self.config.lock().unwrap() = Some(config.clone());
        Ok(())
    }

    fn load_usage(&self) -> Result<BTreeMap<String, u64>> {
        Ok(self.usage.lock().unwrap().clone())
    }

    fn save_usage(&self, usage: &BTreeMap<String, u64>) -> Result<()> {
        self.check_writable()?;
        *self.usage.lock().unwrap() = usage.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> FileStore {
        FileStore::new(dir.join("config.yaml"), dir.join("usage.json"))
    }

    #[test]
    fn test_load_config_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.load_config().unwrap().is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let mut config = PolicyConfig::default();
        config.max_session_minutes = 45;
        config.blocked_sites.insert("tiktok.com".to_string());

        store.save_config(&config).unwrap();
        let loaded = store.load_config().unwrap().unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_usage_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.load_usage().unwrap().is_empty());
    }

    #[test]
    fn test_usage_roundtrip() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let mut usage = BTreeMap::new();
        usage.insert("youtube.com:2024-05-12".to_string(), 90);
        usage.insert("reddit.com:2024-05-12".to_string(), 15);

        store.save_usage(&usage).unwrap();
        let loaded = store.load_usage().unwrap();

        assert_eq!(loaded, usage);
    }

    #[test]
    fn test_usage_version_mismatch_starts_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let content = r#"{"version": "0.9", "minutes": {"youtube.com:2024-05-12": 90}}"#;
        std::fs::write(dir.path().join("usage.json"), content).unwrap();

        assert!(store.load_usage().unwrap().is_empty());
    }

    #[test]
    fn test_memory_store_fail_writes() {
        let store = MemoryStore::new();
        let usage = BTreeMap::new();

        store.save_usage(&usage).unwrap();
        store.fail_writes();
        assert!(store.save_usage(&usage).is_err());
        assert!(store.save_config(&PolicyConfig::default()).is_err());
    }
}
