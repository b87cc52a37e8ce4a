//! Menu Store
//!
//! File-backed storage for the weekly menu. Writes go through a single lock
//! and land via write-to-temp-then-rename, so readers never observe a
//! half-written file and overlapping `set_day` calls resolve last-write-wins.

use super::{check_day, MenuRecord};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Text shown to users when no menu file exists yet.
pub const MENU_MISSING: &str = "\u{26a0}\u{fe0f} File meal.json tidak ditemukan.";

#[async_trait]
pub trait MenuStore: Send + Sync {
    /// The whole week. Fails with `NotFound` when nothing was ever stored.
    async fn get_all(&self) -> Result<MenuRecord>;

    /// Replace one day's dishes (0..=6), creating the store if absent.
    async fn set_day(&self, day: usize, dishes: Vec<String>) -> Result<()>;
}

/// JSON file store: `[["nasi putih", "tempe"], [...], ...]`.
pub struct FileMenuStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileMenuStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "meal.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read(&self) -> Result<Option<MenuRecord>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => MenuRecord::from_json(&raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BotError::Persistence(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn write(&self, record: &MenuRecord) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, record.to_json()?).await?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            BotError::Persistence(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl MenuStore for FileMenuStore {
    async fn get_all(&self) -> Result<MenuRecord> {
        self.read()
            .await?
            .ok_or_else(|| BotError::NotFound(MENU_MISSING.to_string()))
    }

    async fn set_day(&self, day: usize, dishes: Vec<String>) -> Result<()> {
        check_day(day)?;

        let _guard = self.write_lock.lock().await;
        let mut record = self.read().await?.unwrap_or_default();
        record.set_day(day, dishes)?;
        self.write(&record).await?;

        tracing::info!(
            "Menu: stored {} dish(es) for day {} in {}",
            record.day(day).map_or(0, <[String]>::len),
            day,
            self.path.display()
        );
        Ok(())
    }
}
