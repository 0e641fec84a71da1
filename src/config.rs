//! Session configuration
//!
//! ```toml
//! user = "coden"
//! revision_levels = "revision.json"
//!
//! [cache]
//! min_size = 2
//! refresh_interval_minutes = 1
//! warm_on_start = true
//!
//! [firestore]
//! project_id = "decks-1234"
//! bearer_token = "..."
//! ```
//!
//! Without a `[firestore]` or `[file_store]` table the session keeps its
//! cards in memory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decks::{CachedDecks, MIN_REFRESH_INTERVAL};
use crate::revision::{format_delay, RevisionConfigEntry, RevisionError, RevisionLevels};
use crate::store::firestore::FirestoreCollections;
use crate::store::{CardStore, FileStore, FirestoreClient, FirestoreStore, MemoryStore, StoreError};
use crate::user::User;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid revision config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Revision config error: {0}")]
    Revision(#[from] RevisionError),

    #[error("Could not open card store: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Look-ahead cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Refill once fewer cards than this are buffered
    #[serde(default = "default_min_size")]
    pub min_size: usize,
    #[serde(default = "default_refresh_interval_minutes")]
    pub refresh_interval_minutes: u64,
    /// Refill right after start instead of after the first interval
    #[serde(default = "default_warm_on_start")]
    pub warm_on_start: bool,
}

fn default_min_size() -> usize {
    2
}

fn default_refresh_interval_minutes() -> u64 {
    1
}

fn default_warm_on_start() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_size: default_min_size(),
            refresh_interval_minutes: default_refresh_interval_minutes(),
            warm_on_start: default_warm_on_start(),
        }
    }
}

impl CacheConfig {
    /// Refresh period, never shorter than a minute
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes.saturating_mul(60)).max(MIN_REFRESH_INTERVAL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirestoreConfig {
    pub project_id: String,
    #[serde(default = "default_user_collection")]
    pub user_collection: String,
    #[serde(default = "default_deck_collection")]
    pub deck_collection: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Pre-issued OAuth2 access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_user_collection() -> String {
    "users".to_string()
}

fn default_deck_collection() -> String {
    "deck".to_string()
}

fn default_api_base() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl FirestoreConfig {
    pub fn open(&self) -> Result<FirestoreStore> {
        let client = FirestoreClient::new(
            &self.api_base,
            &self.project_id,
            self.bearer_token.clone(),
            Duration::from_secs(self.request_timeout_secs),
        )?;
        let collections = FirestoreCollections {
            user_collection: self.user_collection.clone(),
            deck_collection: self.deck_collection.clone(),
        };
        Ok(FirestoreStore::new(client, collections))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStoreConfig {
    /// Defaults to the platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl FileStoreConfig {
    pub fn root(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| dirs::data_local_dir().map(|dir| dir.join("decks")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecksConfig {
    pub user: String,
    /// JSON revision table; the built-in table is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_levels: Option<PathBuf>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firestore: Option<FirestoreConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_store: Option<FileStoreConfig>,
}

impl DecksConfig {
    /// `{config dir}/decks/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("decks").join("config.toml"))
            .ok_or(ConfigError::ConfigDirNotFound)
    }

    /// Read a config file. A relative `revision_levels` path is taken
    /// relative to the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&contents)?;

        if let (Some(levels), Some(dir)) = (config.revision_levels.as_mut(), path.parent()) {
            if levels.is_relative() {
                *levels = dir.join(&*levels);
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.user.trim().is_empty() {
            return Err(ConfigError::Invalid("user must not be empty".to_string()));
        }
        if let Some(firestore) = &self.firestore {
            if firestore.project_id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "firestore.project_id must not be empty".to_string(),
                ));
            }
        }
        if self.firestore.is_some() && self.file_store.is_some() {
            return Err(ConfigError::Invalid(
                "configure either [firestore] or [file_store], not both".to_string(),
            ));
        }
        Ok(())
    }

    pub fn user(&self) -> User {
        User::new(self.user.clone())
    }

    pub fn revision_levels(&self) -> Result<RevisionLevels> {
        match &self.revision_levels {
            Some(path) => load_revision_levels(path),
            None => Ok(RevisionLevels::standard()),
        }
    }

    /// Build the configured card store
    pub fn open_store(&self) -> Result<Arc<dyn CardStore>> {
        if let Some(firestore) = &self.firestore {
            log::info!("Using Firestore project {}", firestore.project_id);
            return Ok(Arc::new(firestore.open()?));
        }
        if let Some(file_store) = &self.file_store {
            let root = file_store.root().ok_or_else(|| {
                ConfigError::Invalid("no file_store.path and no data directory".to_string())
            })?;
            log::info!("Using card files under {}", root.display());
            return Ok(Arc::new(FileStore::new(root)));
        }
        log::info!("No store configured, keeping cards in memory");
        Ok(Arc::new(MemoryStore::new()))
    }

    /// Open a cached deck session for the configured user.
    ///
    /// Must be called inside a tokio runtime.
    pub fn open(&self) -> Result<CachedDecks> {
        let levels = self.revision_levels()?;
        let store = self.open_store()?;
        Ok(CachedDecks::new(self.user(), Arc::new(levels), store, &self.cache))
    }
}

/// Load a revision table from its JSON config file
pub fn load_revision_levels(path: &Path) -> Result<RevisionLevels> {
    let contents = fs::read_to_string(path)?;
    let levels = parse_revision_levels(&contents)?;
    log::info!(
        "Loaded {} revision levels from {}",
        levels.len(),
        path.display()
    );
    Ok(levels)
}

pub fn parse_revision_levels(json: &str) -> Result<RevisionLevels> {
    let entries: Vec<RevisionConfigEntry> = serde_json::from_str(json)?;
    let levels = RevisionLevels::from_entries(&entries)?;
    for (level, delay) in levels.iter() {
        log::debug!("Revision level {}: {}", level, format_delay(delay));
    }
    Ok(levels)
}
