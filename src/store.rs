use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::{Item, TimeOfDay};

/// File name of the item collection inside the data directory
pub const STORE_FILE_NAME: &str = "refill-items.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to load items: {0}")]
    LoadFailed(#[source] io::Error),
    #[error("Failed to decode items: {0}")]
    DecodeFailed(#[source] serde_json::Error),
    #[error("Failed to save items: {0}")]
    SaveFailed(String),
}

/// The tracked item collection, persisted as one pretty-printed JSON file.
///
/// Construct one per process and share it by reference or `Arc`. Reads are
/// served from an in-memory copy once loaded; every mutation holds the write
/// lock for its whole read-modify-write cycle and rewrites the full file
/// before the cached copy changes.
pub struct ItemStore {
    path: PathBuf,
    cache: RwLock<Option<Vec<Item>>>,
    write_lock: Mutex<()>,
}

impl ItemStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All items in stored order. The first call seeds the defaults when no
    /// file exists yet.
    pub async fn fetch_all(&self) -> Result<Vec<Item>, StoreError> {
        let cached = self.cache.read().clone();
        if let Some(items) = cached {
            return Ok(items);
        }

        let _guard = self.write_lock.lock().await;
        self.current().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Item>, StoreError> {
        Ok(self.fetch_all().await?.into_iter().find(|i| i.id == id))
    }

    /// Replace the item with the same id in place, or append it
    pub async fn upsert(&self, item: Item) -> Result<(), StoreError> {
        check_item(&item)?;
        let _guard = self.write_lock.lock().await;
        let mut items = self.current().await?;
        match items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
        self.commit(items).await
    }

    /// Remove the item with this id. Unknown ids are ignored.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.current().await?;
        let Some(index) = items.iter().position(|i| i.id == id) else {
            debug!("Delete of unknown item {} ignored", id);
            return Ok(());
        };
        items.remove(index);
        self.commit(items).await
    }

    /// Overwrite the whole collection. Rejected without writing if an id
    /// repeats or an item has no name.
    pub async fn replace_all(&self, items: Vec<Item>) -> Result<(), StoreError> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            check_item(item)?;
            if !seen.insert(item.id.as_str()) {
                return Err(StoreError::SaveFailed(format!("duplicate item id {}", item.id)));
            }
        }
        let _guard = self.write_lock.lock().await;
        self.commit(items).await
    }

    /// Flip `checked` on one item, returning the updated item
    pub async fn toggle(&self, id: &str) -> Result<Option<Item>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.current().await?;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        item.checked = !item.checked;
        let updated = item.clone();
        self.commit(items).await?;
        Ok(Some(updated))
    }

    /// Uncheck everything, for the start of a new day. Returns how many
    /// items changed.
    pub async fn reset_checks(&self) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.current().await?;
        let mut changed = 0;
        for item in items.iter_mut().filter(|i| i.checked) {
            item.checked = false;
            changed += 1;
        }
        if changed > 0 {
            self.commit(items).await?;
        }
        Ok(changed)
    }

    /// Cached items, loading (or seeding) them first if needed. Callers
    /// hold the write lock.
    async fn current(&self) -> Result<Vec<Item>, StoreError> {
        let cached = self.cache.read().clone();
        if let Some(items) = cached {
            return Ok(items);
        }
        let items = self.load_or_seed().await?;
        *self.cache.write() = Some(items.clone());
        Ok(items)
    }

    async fn load_or_seed(&self) -> Result<Vec<Item>, StoreError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No item file at {:?}, seeding defaults", self.path);
                let seeded = seed_items();
                self.persist(&seeded).await?;
                return Ok(seeded);
            }
            Err(e) => return Err(StoreError::LoadFailed(e)),
        };
        let items: Vec<Item> = serde_json::from_slice(&data).map_err(StoreError::DecodeFailed)?;
        let loaded = items.len();
        let items = dedupe_by_id(items);
        if items.len() < loaded {
            warn!("Dropped {} items with repeated ids from {:?}", loaded - items.len(), self.path);
        }
        debug!("Loaded {} items from {:?}", items.len(), self.path);
        Ok(items)
    }

    /// Persist, then publish to the cache
    async fn commit(&self, items: Vec<Item>) -> Result<(), StoreError> {
        self.persist(&items).await?;
        *self.cache.write() = Some(items);
        Ok(())
    }

    /// Write to a sibling temp file and rename it over the store file, so a
    /// reader sees either the old or the new collection in full
    async fn persist(&self, items: &[Item]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(items)
            .map_err(|e| StoreError::SaveFailed(format!("Failed to serialize items: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::SaveFailed(e.to_string()))?;
        }

        let temp_path = self.temp_path();
        if let Err(e) = write_and_sync(&temp_path, &json).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::SaveFailed(e.to_string()));
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            warn!("Failed to replace {:?}: {}", self.path, e);
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::SaveFailed(e.to_string()));
        }

        debug!("Saved {} items to {:?}", items.len(), self.path);
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| STORE_FILE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

async fn write_and_sync(path: &Path, data: &[u8]) -> io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

fn check_item(item: &Item) -> Result<(), StoreError> {
    if item.name.trim().is_empty() {
        return Err(StoreError::SaveFailed(format!("item {} has an empty name", item.id)));
    }
    Ok(())
}

/// Collapse repeated ids: the last copy wins, kept at the first copy's position
fn dedupe_by_id(items: Vec<Item>) -> Vec<Item> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(items.len());
    let mut unique: Vec<Item> = Vec::with_capacity(items.len());
    for item in items {
        match positions.get(&item.id) {
            Some(&index) => unique[index] = item,
            None => {
                positions.insert(item.id.clone(), unique.len());
                unique.push(item);
            }
        }
    }
    unique
}

/// Items written on first run
pub fn seed_items() -> Vec<Item> {
    vec![
        Item::new("multivitamin", TimeOfDay::Morning)
            .with_brand("ritual")
            .with_dose("2 capsules"),
        Item::new("vitamin d", TimeOfDay::Morning)
            .with_brand("thorne")
            .with_dose("10,000 IU"),
        Item::new("adderall xr", TimeOfDay::Afternoon).with_dose("25 mg"),
        Item::new("magnesium glycinate", TimeOfDay::Evening).with_dose("400 mg"),
    ]
}
