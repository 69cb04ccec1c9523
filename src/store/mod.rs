//! Durable participant answer history.
//!
//! The whole `participant -> record` mapping lives in one JSON file that is
//! rewritten atomically (temp file → fsync → rename) on every mutation, so a
//! crash right after [`ResponseStore::append`] returns never loses or
//! duplicates that answer. All mutations go through one writer lock, which
//! keeps a campaign's incremental appends and concurrently posted comments
//! from overwriting each other.

pub mod types;

pub use types::{
    Answer, AnswerValue, Comment, NO_RESPONSE_TEXT, ParticipantId, ParticipantRecord,
};

use crate::error::{CheckinError, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};
use types::{StoreFile, default_store_version};
use uuid::Uuid;

/// Participant mapping held by the store.
pub type Records = BTreeMap<ParticipantId, ParticipantRecord>;

/// File-backed response store.
#[derive(Debug)]
pub struct ResponseStore {
    path: PathBuf,
    records: Mutex<Records>,
}

impl ResponseStore {
    /// Open the store at `path`.
    ///
    /// A missing file is a fresh store.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::StoreUnavailable`] if the file cannot be read
    /// and [`CheckinError::CorruptStore`] if it cannot be parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = Self::load(&path)?;
        debug!(
            "opened response store at {} ({} participants)",
            path.display(),
            records.len()
        );
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Open the store, starting empty if the file is corrupt.
    ///
    /// The unreadable file is moved to `<path>.corrupt-<unix-secs>` so its
    /// contents survive for manual inspection.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::StoreUnavailable`] if the file cannot be read
    /// or moved aside.
    pub fn open_or_recover(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match Self::open(&path) {
            Err(CheckinError::CorruptStore(reason)) => {
                let aside = corrupt_aside_path(&path);
                error!(
                    "response store {} is corrupt ({reason}); moving it to {} and starting empty",
                    path.display(),
                    aside.display()
                );
                std::fs::rename(&path, &aside).map_err(|e| {
                    CheckinError::StoreUnavailable(format!(
                        "failed to move corrupt store to '{}': {e}",
                        aside.display()
                    ))
                })?;
                Ok(Self {
                    path,
                    records: Mutex::new(Records::new()),
                })
            }
            other => other,
        }
    }

    /// Read the persisted mapping from `path`.
    ///
    /// # Errors
    ///
    /// Same as [`ResponseStore::open`].
    pub fn load(path: &Path) -> Result<Records> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no response store at {}, starting fresh", path.display());
                return Ok(Records::new());
            }
            Err(e) => {
                return Err(CheckinError::StoreUnavailable(format!(
                    "failed to read '{}': {e}",
                    path.display()
                )));
            }
        };

        let file: StoreFile = serde_json::from_slice(&bytes).map_err(|e| {
            CheckinError::CorruptStore(format!("failed to parse '{}': {e}", path.display()))
        })?;
        Ok(file.participants)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clone of the full mapping.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::StoreUnavailable`] if the lock is poisoned.
    pub fn snapshot(&self) -> Result<Records> {
        Ok(self.lock()?.clone())
    }

    /// Clone of one participant's record.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::StoreUnavailable`] if the lock is poisoned.
    pub fn record(&self, participant: &str) -> Result<Option<ParticipantRecord>> {
        Ok(self.lock()?.get(participant).cloned())
    }

    /// Most recent answer to `prompt_key` for a participant, ignoring
    /// answers from `excluding_run`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::StoreUnavailable`] if the lock is poisoned.
    pub fn latest_answer(
        &self,
        participant: &str,
        prompt_key: &str,
        excluding_run: Option<Uuid>,
    ) -> Result<Option<Answer>> {
        let records = self.lock()?;
        Ok(records
            .get(participant)
            .and_then(|r| r.latest_answer(prompt_key, excluding_run))
            .cloned())
    }

    /// Append one answer and durably rewrite the store.
    ///
    /// Appends are never deduplicated. Returns the index of the new answer
    /// within the participant's record.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::StoreUnavailable`] if the store cannot be
    /// written; the in-memory state is left unchanged in that case.
    pub fn append(&self, participant: &str, answer: Answer) -> Result<usize> {
        self.mutate(|records| {
            let record = records.entry(participant.to_owned()).or_default();
            record.answers.push(answer);
            Ok(record.answers.len() - 1)
        })
    }

    /// Attach a comment to an existing answer and durably rewrite the store.
    ///
    /// `answer_index` indexes the participant's whole record, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::NotFound`] for an unknown participant or
    /// index, or [`CheckinError::StoreUnavailable`] if the write fails.
    pub fn add_comment(&self, participant: &str, answer_index: usize, comment: Comment) -> Result<()> {
        self.mutate(|records| {
            let record = records.get_mut(participant).ok_or_else(|| {
                CheckinError::NotFound(format!("participant {participant} has no answers"))
            })?;
            let count = record.answers.len();
            let answer = record.answers.get_mut(answer_index).ok_or_else(|| {
                CheckinError::NotFound(format!(
                    "participant {participant} has no answer #{answer_index} ({count} recorded)"
                ))
            })?;
            answer.comments.push(comment);
            Ok(())
        })
    }

    /// Apply `f` to a copy of the mapping, persist it, then publish it.
    fn mutate<T>(&self, f: impl FnOnce(&mut Records) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        write_store_atomic(&self.path, &next)?;
        *guard = next;
        Ok(out)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>> {
        self.records
            .lock()
            .map_err(|_| CheckinError::StoreUnavailable("store lock poisoned".to_owned()))
    }
}

/// Write the full mapping atomically (temp file → fsync → rename).
fn write_store_atomic(path: &Path, records: &Records) -> Result<()> {
    let file = StoreFile {
        version: default_store_version(),
        participants: records.clone(),
    };
    let json = serde_json::to_vec_pretty(&file)
        .map_err(|e| CheckinError::StoreUnavailable(format!("failed to serialize store: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            CheckinError::StoreUnavailable(format!(
                "failed to create store directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let mut tmp = std::fs::File::create(&tmp_path).map_err(|e| {
        CheckinError::StoreUnavailable(format!(
            "failed to create temp file '{}': {e}",
            tmp_path.display()
        ))
    })?;
    tmp.write_all(&json)
        .map_err(|e| CheckinError::StoreUnavailable(format!("failed to write temp file: {e}")))?;
    tmp.sync_all()
        .map_err(|e| CheckinError::StoreUnavailable(format!("failed to sync temp file: {e}")))?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        CheckinError::StoreUnavailable(format!(
            "failed to rename '{}' to '{}': {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

fn corrupt_aside_path(path: &Path) -> PathBuf {
    let stamp = chrono::Utc::now().timestamp();
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".corrupt-{stamp}"));
    PathBuf::from(name)
}
