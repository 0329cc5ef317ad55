use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use crate::collection::{Collection, MergeSummary};
use crate::error::StorageError;
use crate::record::{Record, TrackedRecord};

type StorageResult<T> = core::result::Result<T, StorageError>;

/// Source of the timestamps written into tracked records.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Owns the JSON file that holds the [`Collection`].
///
/// Every [`MergeStore::update`] reads the file, merges the batch and replaces the file
/// through a temporary sibling and a rename, so a failed call leaves the old file as it was.
/// `update` takes `&mut self`; concurrent writers must go through one owner.
pub struct MergeStore<C = SystemClock> {
    path: PathBuf,
    clock: C,
}

impl MergeStore<SystemClock> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, SystemClock)
    }
}

impl<C: Clock> MergeStore<C> {
    pub fn with_clock(path: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted collection. A missing file is an empty collection.
    pub async fn load(&self) -> StorageResult<Collection> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no collection on disk yet");
                return Ok(Collection::new());
            }
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let records: Vec<TrackedRecord> =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(Collection::from_records(records))
    }

    /// Replaces the file with `collection`, pretty printed.
    pub async fn save(&self, collection: &Collection) -> StorageResult<()> {
        let mut json = serde_json::to_vec_pretty(collection.records()).map_err(|source| {
            StorageError::Encode {
                path: self.path.clone(),
                source,
            }
        })?;
        json.push(b'\n');

        let tmp_path = self.tmp_path();
        if let Err(source) = self.write_and_swap(&tmp_path, &json).await {
            if let Err(e) = fs::remove_file(&tmp_path).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %tmp_path.display(), "couldn't clean up temporary file: {e}");
                }
            }
            return Err(StorageError::Write {
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }

    /// Merges `batch` into the persisted collection and returns how many ids were new.
    pub async fn update(&mut self, batch: Vec<Record>) -> StorageResult<usize> {
        Ok(self.update_with_summary(batch).await?.created)
    }

    #[instrument(skip_all, fields(path = %self.path.display(), batch = batch.len()))]
    pub async fn update_with_summary(&mut self, batch: Vec<Record>) -> StorageResult<MergeSummary> {
        if batch.is_empty() {
            debug!("empty batch, nothing to merge");
            return Ok(MergeSummary::default());
        }

        let mut collection = self.load().await?;
        let summary = collection.merge(batch, self.clock.now());
        self.save(&collection).await?;

        info!(
            created = summary.created,
            updated = summary.updated,
            duplicates = summary.duplicates,
            total = collection.len(),
            "merged batch"
        );
        Ok(summary)
    }

    async fn write_and_swap(&self, tmp_path: &Path, json: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = fs::File::create(tmp_path).await?;
        file.write_all(json).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(tmp_path, &self.path).await
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("collection.json"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
