//! In-memory custody of live whispers.
//!
//! One `RwLock` guards the whole map. Every operation, `claim` and
//! `delete_by_sender` included, runs inside a single critical section, and
//! no map guard is held across a snapshot write. Snapshot saves are
//! serialized by a separate mutex, so the last save to start is the last
//! to land.

use crate::error::{AppError, AppResult, PersistenceError};
use crate::whisper::persistence::{MemoryBackend, SnapshotBackend};
use crate::whisper::record::{TargetSelector, UserId, WhisperBody, WhisperId, WhisperRecord};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

/// Fresh ids drawn before giving up on a create.
pub const MAX_ID_ATTEMPTS: usize = 8;

pub struct WhisperStore {
    whispers: RwLock<HashMap<WhisperId, WhisperRecord>>,
    backend: Arc<dyn SnapshotBackend>,
    save_lock: Mutex<()>,
}

/// Shared store handle passed to every handler.
pub type SharedWhisperStore = Arc<WhisperStore>;

impl WhisperStore {
    pub fn new(backend: Arc<dyn SnapshotBackend>) -> Self {
        Self {
            whispers: RwLock::new(HashMap::new()),
            backend,
            save_lock: Mutex::new(()),
        }
    }

    /// Store whose snapshots never leave the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Insert a new whisper under a fresh id.
    pub async fn create(
        &self,
        sender: UserId,
        target: TargetSelector,
        body: WhisperBody,
    ) -> AppResult<WhisperId> {
        self.create_with_ids(sender, target, body, WhisperId::generate)
            .await
    }

    async fn create_with_ids<F>(
        &self,
        sender: UserId,
        target: TargetSelector,
        body: WhisperBody,
        mut next_id: F,
    ) -> AppResult<WhisperId>
    where
        F: FnMut() -> WhisperId + Send,
    {
        let mut whispers = self.whispers.write().await;

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = next_id();
            if let Entry::Vacant(slot) = whispers.entry(id.clone()) {
                let open = target.is_open();
                slot.insert(WhisperRecord::new(id.clone(), sender, target, body));
                debug!(whisper_id = %id, %sender, open, "Whisper created");
                return Ok(id);
            }
            debug!(whisper_id = %id, "Whisper id collision, drawing again");
        }

        error!("Exhausted {} whisper id attempts", MAX_ID_ATTEMPTS);
        Err(AppError::IdentitySpaceExhausted)
    }

    /// Read a record without touching its claim state.
    pub async fn get(&self, id: &WhisperId) -> AppResult<WhisperRecord> {
        self.whispers
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    /// Bind an open whisper to `claimant` if nobody has claimed it yet.
    ///
    /// A claim happens once. Any later call, including one from the holder,
    /// gets `AlreadyClaimed`. Fixed-target whispers cannot be claimed.
    pub async fn claim(&self, id: &WhisperId, claimant: UserId) -> AppResult<WhisperRecord> {
        let mut whispers = self.whispers.write().await;
        let record = whispers.get_mut(id).ok_or(AppError::NotFound)?;

        if !record.target.is_open() {
            return Err(AppError::DeniedNotOwner);
        }

        match record.claimed_by {
            None => {
                record.claimed_by = Some(claimant);
                info!(whisper_id = %id, %claimant, "Open whisper claimed");
                Ok(record.clone())
            }
            Some(_) => Err(AppError::AlreadyClaimed),
        }
    }

    /// Snapshot of every live whisper sent by `sender`, in no particular order.
    pub async fn list_by_sender(&self, sender: UserId) -> Vec<WhisperRecord> {
        self.whispers
            .read()
            .await
            .values()
            .filter(|record| record.sender == sender)
            .cloned()
            .collect()
    }

    /// Remove every whisper sent by `sender` and return how many went.
    pub async fn delete_by_sender(&self, sender: UserId) -> usize {
        let mut whispers = self.whispers.write().await;
        let before = whispers.len();
        whispers.retain(|_, record| record.sender != sender);
        let removed = before - whispers.len();

        if removed > 0 {
            info!(%sender, count = removed, "Whispers deleted by sender");
        }
        removed
    }

    /// Drop every whisper.
    pub async fn purge_all(&self) -> usize {
        let mut whispers = self.whispers.write().await;
        let removed = whispers.len();
        whispers.clear();
        info!(count = removed, "All whispers purged");
        removed
    }

    pub async fn len(&self) -> usize {
        self.whispers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.whispers.read().await.is_empty()
    }

    /// Write every live whisper to the backend. Returns how many were written.
    pub async fn save_snapshot(&self) -> AppResult<usize> {
        let _saving = self.save_lock.lock().await;
        let records: Vec<WhisperRecord> = self.whispers.read().await.values().cloned().collect();

        match self.backend.save(&records).await {
            Ok(()) => {
                info!(
                    backend = %self.backend.describe(),
                    count = records.len(),
                    "Snapshot saved"
                );
                Ok(records.len())
            }
            Err(e) => {
                error!(backend = %self.backend.describe(), "Snapshot save failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Replace the live set with the backend's snapshot. Returns how many were loaded.
    pub async fn load_snapshot(&self) -> AppResult<usize> {
        let records = self.backend.load().await?;

        let mut loaded = HashMap::with_capacity(records.len());
        for record in records {
            if record.claimed_by.is_some() && !record.target.is_open() {
                return Err(PersistenceError::corrupt(format!(
                    "fixed-target whisper {} carries a claim",
                    record.id
                ))
                .into());
            }
            if let Some(duplicate) = loaded.insert(record.id.clone(), record) {
                return Err(PersistenceError::corrupt(format!(
                    "duplicate whisper id {}",
                    duplicate.id
                ))
                .into());
            }
        }

        let count = loaded.len();
        *self.whispers.write().await = loaded;
        info!(backend = %self.backend.describe(), count, "Snapshot loaded");
        Ok(count)
    }
}

impl Default for WhisperStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for WhisperStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperStore")
            .field("backend", &self.backend.describe())
            .finish_non_exhaustive()
    }
}
