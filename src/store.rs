//! JSON persistence for the screencaps catalog, the episode-reference
//! catalog and the pending-retry queue.
//!
//! Every file is read whole and written whole. Writes land in a sibling
//! temporary file that is renamed over the target, so an interrupted run
//! leaves either the previous or the new content on disk.

use crate::catalog::{Catalog, EpisodeRecord, EpisodeReferences};
use crate::config::CatalogPaths;
use crate::retry::RetryQueue;
use crate::{HarvestError, Result};
use chrono::{Local, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk shape of the screencaps catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreencapsFile {
    #[serde(default)]
    pub screencaps: Vec<EpisodeRecord>,
    #[serde(default)]
    pub last_updated: Option<NaiveDateTime>,
    #[serde(default)]
    pub total_episodes: usize,
}

impl ScreencapsFile {
    pub fn from_catalog(catalog: &Catalog, now: NaiveDateTime) -> Self {
        Self {
            screencaps: catalog.records().to_vec(),
            last_updated: Some(now),
            total_episodes: catalog.len(),
        }
    }
}

pub trait CatalogStore {
    fn load_catalog(&self) -> Result<Catalog>;
    fn save_catalog(&self, catalog: &Catalog) -> Result<()>;
    fn load_references(&self) -> Result<EpisodeReferences>;
    fn save_references(&self, references: &EpisodeReferences) -> Result<()>;
    fn load_retries(&self) -> Result<RetryQueue>;
    fn save_retries(&self, queue: &RetryQueue) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    paths: CatalogPaths,
}

impl JsonStore {
    pub fn new(paths: CatalogPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &CatalogPaths {
        &self.paths
    }

    /// Fails before any network activity when the required input is absent.
    pub fn check_inputs(&self) -> Result<()> {
        if !self.paths.episodes.is_file() {
            return Err(HarvestError::MissingInput(self.paths.episodes.clone()));
        }
        Ok(())
    }
}

impl CatalogStore for JsonStore {
    fn load_catalog(&self) -> Result<Catalog> {
        let file: Option<ScreencapsFile> = read_json(&self.paths.screencaps)?;
        Ok(file
            .map(|f| Catalog::from_records(f.screencaps))
            .unwrap_or_default())
    }

    fn save_catalog(&self, catalog: &Catalog) -> Result<()> {
        let file = ScreencapsFile::from_catalog(catalog, Local::now().naive_local());
        write_json(&self.paths.screencaps, &file)
    }

    fn load_references(&self) -> Result<EpisodeReferences> {
        read_json(&self.paths.episodes)?
            .ok_or_else(|| HarvestError::MissingInput(self.paths.episodes.clone()))
    }

    fn save_references(&self, references: &EpisodeReferences) -> Result<()> {
        write_json(&self.paths.episodes, references)
    }

    fn load_retries(&self) -> Result<RetryQueue> {
        Ok(read_json(&self.paths.retries)?.unwrap_or_default())
    }

    fn save_retries(&self, queue: &RetryQueue) -> Result<()> {
        write_json(&self.paths.retries, queue)
    }
}

/// Keeps everything in memory. Backs `--dry-run` and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub catalog: RefCell<Catalog>,
    pub references: RefCell<EpisodeReferences>,
    pub retries: RefCell<RetryQueue>,
    pub catalog_writes: RefCell<usize>,
}

impl MemoryStore {
    pub fn new(catalog: Catalog, references: EpisodeReferences, retries: RetryQueue) -> Self {
        Self {
            catalog: RefCell::new(catalog),
            references: RefCell::new(references),
            retries: RefCell::new(retries),
            catalog_writes: RefCell::new(0),
        }
    }

    /// Snapshot of another store, so a run can proceed without touching it.
    pub fn snapshot_of<S: CatalogStore>(store: &S) -> Result<Self> {
        Ok(Self::new(
            store.load_catalog()?,
            store.load_references()?,
            store.load_retries()?,
        ))
    }
}

impl CatalogStore for MemoryStore {
    fn load_catalog(&self) -> Result<Catalog> {
        Ok(self.catalog.borrow().clone())
    }

    fn save_catalog(&self, catalog: &Catalog) -> Result<()> {
        *self.catalog.borrow_mut() = catalog.clone();
        *self.catalog_writes.borrow_mut() += 1;
        Ok(())
    }

    fn load_references(&self) -> Result<EpisodeReferences> {
        Ok(self.references.borrow().clone())
    }

    fn save_references(&self, references: &EpisodeReferences) -> Result<()> {
        *self.references.borrow_mut() = references.clone();
        Ok(())
    }

    fn load_retries(&self) -> Result<RetryQueue> {
        Ok(self.retries.borrow().clone())
    }

    fn save_retries(&self, queue: &RetryQueue) -> Result<()> {
        *self.retries.borrow_mut() = queue.clone();
        Ok(())
    }
}

/// `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path).map_err(|e| HarvestError::io(path, e))?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = temp_path(path);
    std::fs::write(&tmp, format!("{json}\n")).map_err(|e| HarvestError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| HarvestError::io(path, e))?;
    debug!(path = %path.display(), bytes = json.len(), "wrote json");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
