use crate::catalog::Catalog;
use crate::error::CacheError;
use crate::model::ApplicationEntry;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The catalog as stored on disk.
#[derive(Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub created_at: DateTime<Utc>,
    pub entries: Vec<ApplicationEntry>,
}

/// Persists the catalog between runs. Every failure reads as "no cache".
pub struct CacheManager {
    path: Option<PathBuf>,
    ttl: Duration,
}

impl CacheManager {
    pub fn new(path: Option<PathBuf>, ttl: Duration) -> Self {
        Self { path, ttl }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The cached catalog, if one exists and is younger than the TTL.
    pub fn load(&self) -> Option<Catalog> {
        self.load_at(Utc::now())
    }

    pub fn load_at(&self, now: DateTime<Utc>) -> Option<Catalog> {
        match self.read_snapshot() {
            Ok(snapshot) => {
                let age = now.signed_duration_since(snapshot.created_at);
                if age < Duration::zero() || age >= self.ttl {
                    debug!("cache is stale (created {})", snapshot.created_at);
                    return None;
                }
                let catalog = Catalog::from_entries(snapshot.entries);
                info!("loaded {} applications from cache", catalog.len());
                Some(catalog)
            }
            Err(CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no cache file yet");
                None
            }
            Err(e) => {
                warn!("ignoring unusable cache: {}", e);
                None
            }
        }
    }

    /// Writes the catalog; failures are logged and swallowed.
    pub fn save(&self, catalog: &Catalog) {
        self.save_at(catalog, Utc::now());
    }

    pub fn save_at(&self, catalog: &Catalog, created_at: DateTime<Utc>) {
        match self.write_snapshot(catalog, created_at) {
            Ok(path) => info!("cached {} applications to {:?}", catalog.len(), path),
            Err(e) => warn!("could not write cache: {}", e),
        }
    }

    fn read_snapshot(&self) -> Result<CacheSnapshot, CacheError> {
        let path = self.path.as_ref().ok_or(CacheError::NoLocation)?;
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_snapshot(&self, catalog: &Catalog, created_at: DateTime<Utc>) -> Result<&Path, CacheError> {
        let path = self.path.as_deref().ok_or(CacheError::NoLocation)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let snapshot = CacheSnapshot {
            created_at,
            entries: catalog.entries().to_vec(),
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        // Write then rename so a crash never leaves a half-written cache.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(path)
    }
}
