//! Process-scoped cache of archive indices.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tempfile::TempPath;

use crate::error::{ArchiveError, JobError};
use crate::index::ArchiveIndex;
use crate::integrity;
use crate::path::EntryPath;

#[derive(Default)]
struct Slot {
    /// Failed builds so far. Read before queueing on `state`.
    failures: AtomicU64,
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    index: Option<Arc<ArchiveIndex>>,
    last_failure: Option<String>,
}

impl Slot {
    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared, append-only map from container paths to their indices.
///
/// Each container path owns a slot with its own lock. The first caller for a
/// path builds the index while holding the slot; concurrent callers for the
/// same path wait on that slot and then observe the published index, so a
/// path is never built twice. A failed build fails every caller that was
/// already waiting on it, but is not cached: the slot stays empty and the
/// next caller to arrive tries again.
///
/// Published indices are immutable and handed out behind an `Arc`.
#[derive(Default)]
pub struct ArchiveRegistry {
    slots: Mutex<HashMap<PathBuf, Arc<Slot>>>,
    copies: Mutex<HashMap<(PathBuf, EntryPath), TempPath>>,
    builds: AtomicUsize,
}

impl ArchiveRegistry {
    pub fn new() -> ArchiveRegistry {
        ArchiveRegistry::default()
    }

    fn slot(&self, archive_path: &Path) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(archive_path.to_path_buf()).or_default())
    }

    /// Return the index for `archive_path`, building it on first use.
    ///
    /// This performs blocking I/O when the index is not yet cached.
    pub fn get_or_build(&self, archive_path: &Path) -> Result<Arc<ArchiveIndex>, ArchiveError> {
        let slot = self.slot(archive_path);
        let failures = slot.failures.load(Ordering::Acquire);
        let mut state = slot.lock();
        if let Some(index) = state.index.as_ref() {
            return Ok(Arc::clone(index));
        }
        // A build failed while this caller was queued behind it.
        if slot.failures.load(Ordering::Acquire) != failures {
            return Err(ArchiveError::Unavailable {
                path: archive_path.to_path_buf(),
                reason: state.last_failure.clone().unwrap_or_default(),
            });
        }

        self.builds.fetch_add(1, Ordering::Relaxed);
        match ArchiveIndex::open(archive_path) {
            Ok(index) => {
                let index = Arc::new(index);
                state.index = Some(Arc::clone(&index));
                state.last_failure = None;
                Ok(index)
            }
            Err(e) => {
                tracing::warn!(path = %archive_path.display(), error = %e, "archive unreadable");
                state.last_failure = Some(e.to_string());
                slot.failures.fetch_add(1, Ordering::Release);
                Err(e)
            }
        }
    }

    /// The published index for `archive_path`, if one exists.
    ///
    /// Never builds, and returns `None` while a build is in progress.
    pub fn cached(&self, archive_path: &Path) -> Option<Arc<ArchiveIndex>> {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.get(archive_path)?)
        };
        let state = slot.state.try_lock().ok()?;
        state.index.as_ref().map(Arc::clone)
    }

    /// Number of index builds attempted, successful or not.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Number of published indices.
    pub fn len(&self) -> usize {
        let slots: Vec<Arc<Slot>> = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.values().cloned().collect()
        };
        slots
            .iter()
            .filter(|slot| slot.state.try_lock().is_ok_and(|state| state.index.is_some()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize an entry as a concrete file on disk.
    ///
    /// Unpacked entries already are one and their sibling path is returned.
    /// Packed entries are copied into a temporary file that lives as long as
    /// the registry; repeated calls return the same copy. When the entry
    /// records integrity, the copied bytes are verified first.
    pub fn copy_file_out(
        &self,
        archive_path: &Path,
        entry: &EntryPath,
    ) -> Result<PathBuf, JobError> {
        let index = self.get_or_build(archive_path)?;
        let record = index
            .lookup(entry)
            .ok_or_else(|| JobError::NotFound(archive_path.join(entry.to_relative_path())))?;

        if record.unpacked {
            return Ok(index.unpacked_path(entry));
        }

        let key = (archive_path.to_path_buf(), entry.clone());
        let mut copies = self.copies.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(copy) = copies.get(&key) {
            return Ok(copy.to_path_buf());
        }

        let mut file = File::open(index.container_path())?;
        file.seek(SeekFrom::Start(record.offset))?;
        let mut data = Vec::with_capacity(record.size as usize);
        file.take(record.size).read_to_end(&mut data)?;
        if (data.len() as u64) != record.size {
            return Err(JobError::IoFailure(std::io::ErrorKind::UnexpectedEof.into()));
        }

        if let Some(integrity) = &record.integrity {
            integrity::verify(integrity, &data).map_err(|e| {
                JobError::IntegrityViolation(e, archive_path.join(entry.to_relative_path()))
            })?;
        }

        let suffix = entry
            .extension()
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let mut temp = tempfile::Builder::new()
            .prefix("asar-")
            .suffix(&suffix)
            .tempfile()?;
        std::io::Write::write_all(&mut temp, &data)?;
        let temp = temp.into_temp_path();
        let path = temp.to_path_buf();

        tracing::debug!(
            archive = %archive_path.display(),
            entry = %entry,
            copy = %path.display(),
            "copied entry out of archive"
        );
        copies.insert(key, temp);
        Ok(path)
    }
}

impl std::fmt::Debug for ArchiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveRegistry")
            .field("indices", &self.len())
            .field("builds", &self.build_count())
            .finish()
    }
}
