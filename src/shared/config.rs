use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Deployment URL of the RPC backend. `None` runs against the in-memory backend.
    pub base_url: Option<String>,
    pub access_key: Option<String>,
    pub rpc_timeout_secs: u64,
    pub blob_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub sync_interval_secs: u64,
    pub max_retries: u32,
    pub photo_max_retries: u32,
    pub photo_backoff_secs: Vec<u64>,
    pub probe_interval_secs: u64,
    pub pull_after_sync: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    pub image_cache_max_bytes: u64,
    pub image_cache_max_age_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            database: DatabaseConfig {
                url: database_url_for(&data_dir),
                max_connections: 5,
            },
            remote: RemoteConfig {
                base_url: None,
                access_key: None,
                rpc_timeout_secs: 10,
                blob_timeout_secs: 60,
            },
            sync: SyncConfig {
                auto_sync: true,
                sync_interval_secs: 30,
                max_retries: 5,
                photo_max_retries: 5,
                photo_backoff_secs: vec![5, 15, 45, 120, 300],
                probe_interval_secs: 15,
                pull_after_sync: true,
            },
            storage: StorageConfig {
                data_dir,
                image_cache_max_bytes: 50 * 1024 * 1024, // 50MB
                image_cache_max_age_secs: 7 * 24 * 60 * 60, // 7 days
            },
        }
    }
}

impl RemoteConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn blob_timeout(&self) -> Duration {
        Duration::from_secs(self.blob_timeout_secs)
    }
}

impl SyncConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn photo_backoff(&self) -> Vec<Duration> {
        self.photo_backoff_secs
            .iter()
            .map(|secs| Duration::from_secs(*secs))
            .collect()
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from defaults overridden by `CHORE_SYNC_*` values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("CHORE_SYNC_DATA_DIR") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                cfg.storage.data_dir = trimmed.to_string();
                cfg.database.url = database_url_for(trimmed);
            }
        }
        if let Some(v) = lookup("CHORE_SYNC_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v.trim().to_string();
            }
        }
        if let Some(value) = lookup("CHORE_SYNC_DB_MAX_CONNECTIONS").and_then(|v| parse_u32(&v)) {
            cfg.database.max_connections = value;
        }

        if let Some(v) = lookup("CHORE_SYNC_REMOTE_URL") {
            let trimmed = v.trim().trim_end_matches('/');
            cfg.remote.base_url = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            };
        }
        if let Some(v) = lookup("CHORE_SYNC_ACCESS_KEY") {
            cfg.remote.access_key = if v.trim().is_empty() {
                None
            } else {
                Some(v.trim().to_string())
            };
        }
        if let Some(value) = lookup("CHORE_SYNC_RPC_TIMEOUT_SECS").and_then(|v| parse_u64(&v)) {
            cfg.remote.rpc_timeout_secs = value.max(1);
        }
        if let Some(value) = lookup("CHORE_SYNC_BLOB_TIMEOUT_SECS").and_then(|v| parse_u64(&v)) {
            cfg.remote.blob_timeout_secs = value.max(1);
        }

        if let Some(v) = lookup("CHORE_SYNC_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(value) = lookup("CHORE_SYNC_INTERVAL_SECS").and_then(|v| parse_u64(&v)) {
            cfg.sync.sync_interval_secs = value.max(1);
        }
        if let Some(value) = lookup("CHORE_SYNC_MAX_RETRIES").and_then(|v| parse_u32(&v)) {
            cfg.sync.max_retries = value;
        }
        if let Some(value) = lookup("CHORE_SYNC_PHOTO_MAX_RETRIES").and_then(|v| parse_u32(&v)) {
            cfg.sync.photo_max_retries = value;
        }
        if let Some(v) = lookup("CHORE_SYNC_PHOTO_BACKOFF_SECS") {
            let table: Vec<u64> = v.split(',').filter_map(parse_u64).collect();
            if !table.is_empty() {
                cfg.sync.photo_backoff_secs = table;
            }
        }
        if let Some(value) = lookup("CHORE_SYNC_PROBE_INTERVAL_SECS").and_then(|v| parse_u64(&v)) {
            cfg.sync.probe_interval_secs = value.max(1);
        }
        if let Some(v) = lookup("CHORE_SYNC_PULL_AFTER_SYNC") {
            cfg.sync.pull_after_sync = parse_bool(&v, cfg.sync.pull_after_sync);
        }

        if let Some(value) = lookup("CHORE_SYNC_IMAGE_CACHE_MAX_BYTES").and_then(|v| parse_u64(&v))
        {
            cfg.storage.image_cache_max_bytes = value;
        }
        if let Some(value) =
            lookup("CHORE_SYNC_IMAGE_CACHE_MAX_AGE_SECS").and_then(|v| parse_u64(&v))
        {
            cfg.storage.image_cache_max_age_secs = value;
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("Database url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.remote.rpc_timeout_secs == 0 || self.remote.blob_timeout_secs == 0 {
            return Err("Remote timeouts must be greater than 0".to_string());
        }
        if self.sync.max_retries == 0 {
            return Err("Sync max_retries must be greater than 0".to_string());
        }
        if self.sync.photo_max_retries == 0 {
            return Err("Sync photo_max_retries must be greater than 0".to_string());
        }
        if self.sync.photo_backoff_secs.is_empty() {
            return Err("Sync photo_backoff_secs must contain at least one entry".to_string());
        }
        if self
            .sync
            .photo_backoff_secs
            .windows(2)
            .any(|pair| pair[1] < pair[0])
        {
            return Err("Sync photo_backoff_secs must be non-decreasing".to_string());
        }
        if let Some(url) = &self.remote.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("Remote base_url must be an http(s) URL: {url}"));
            }
        }
        Ok(())
    }
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|dir| dir.join("chore-sync"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .into_owned()
}

fn database_url_for(data_dir: &str) -> String {
    let path = PathBuf::from(data_dir).join("chore-sync.db");
    format!("sqlite://{}?mode=rwc", path.display())
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}
