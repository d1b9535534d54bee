//! The in-process surface the bot front end talks to.

use crate::config::WhisperConfig;
use crate::error::{AppError, AppResult};
use crate::whisper::access::{AccessController, Decision};
use crate::whisper::record::{
    Requester, TargetSelector, UserId, WhisperBody, WhisperId, WhisperSummary,
};
use crate::whisper::store::SharedWhisperStore;
use tracing::{info, warn};

/// Proof that the caller already checked maintenance privileges.
///
/// The core never decides who is an operator. Front ends mint this only after
/// their own check passes.
#[derive(Debug)]
pub struct Operator {
    _verified: (),
}

impl Operator {
    pub fn assume_verified() -> Self {
        Self { _verified: () }
    }
}

#[derive(Debug, Clone)]
pub struct WhisperService {
    store: SharedWhisperStore,
    access: AccessController,
    limits: WhisperConfig,
}

impl WhisperService {
    pub fn new(store: SharedWhisperStore, limits: WhisperConfig) -> Self {
        Self {
            access: AccessController::new(store.clone()),
            store,
            limits,
        }
    }

    pub fn store(&self) -> &SharedWhisperStore {
        &self.store
    }

    /// Compose a whisper. `target_raw` is a handle, a user id, or the open sentinel.
    pub async fn create_whisper(
        &self,
        sender: UserId,
        target_raw: &str,
        body: &str,
    ) -> AppResult<WhisperId> {
        let body = body.trim();
        if body.is_empty() {
            return Err(AppError::invalid_whisper("whisper text is empty"));
        }
        let chars = body.chars().count();
        if chars > self.limits.max_body_chars {
            return Err(AppError::invalid_whisper(format!(
                "whisper text is {} characters, the limit is {}",
                chars, self.limits.max_body_chars
            )));
        }

        let target = TargetSelector::parse(target_raw, &self.limits.open_sentinel);
        self.store
            .create(sender, target, WhisperBody::new(body))
            .await
    }

    pub async fn reveal_whisper(&self, requester: &Requester, id: &WhisperId) -> Decision {
        self.access.authorize(requester, id).await
    }

    /// The sender's whispers, oldest first.
    pub async fn list_mine(&self, sender: UserId) -> Vec<WhisperSummary> {
        let mut summaries: Vec<WhisperSummary> = self
            .store
            .list_by_sender(sender)
            .await
            .iter()
            .map(|record| record.summary())
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    pub async fn delete_mine(&self, sender: UserId) -> usize {
        self.store.delete_by_sender(sender).await
    }

    /// Write a snapshot now. A failure leaves memory untouched; try again later.
    pub async fn checkpoint(&self, _operator: &Operator) -> AppResult<usize> {
        self.store.save_snapshot().await
    }

    pub async fn reset(&self, _operator: &Operator) -> usize {
        warn!("Operator reset requested");
        self.store.purge_all().await
    }

    /// Restore the last snapshot. Called once at startup.
    pub async fn restore(&self) -> AppResult<usize> {
        let count = self.store.load_snapshot().await?;
        info!(count, "Whispers restored");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::whisper::store::WhisperStore;
    use std::sync::Arc;

    fn service() -> WhisperService {
        WhisperService::new(Arc::new(WhisperStore::in_memory()), WhisperConfig::default())
    }

    #[tokio::test]
    async fn test_create_rejects_empty_body() {
        let err = service()
            .create_whisper(UserId(1), "@bob", "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidWhisper(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_long_body() {
        let body = "x".repeat(201);
        let err = service()
            .create_whisper(UserId(1), "@bob", &body)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidWhisper(_)));

        let ok = "é".repeat(200);
        assert!(service().create_whisper(UserId(1), "@bob", &ok).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_parses_target() {
        let svc = service();
        let open = svc.create_whisper(UserId(1), "@all", "a").await.unwrap();
        let fixed = svc.create_whisper(UserId(1), "@Bob", "b").await.unwrap();

        assert!(svc.store().get(&open).await.unwrap().target.is_open());
        assert!(!svc.store().get(&fixed).await.unwrap().target.is_open());
    }

    #[tokio::test]
    async fn test_list_mine_is_sorted_and_bodyless() {
        let svc = service();
        let first = svc.create_whisper(UserId(1), "", "first secret").await.unwrap();
        let second = svc.create_whisper(UserId(1), "", "second secret").await.unwrap();
        svc.create_whisper(UserId(2), "", "other").await.unwrap();

        let mine = svc.list_mine(UserId(1)).await;
        assert_eq!(mine.len(), 2);
        assert!(mine[0].created_at <= mine[1].created_at);
        let ids: Vec<_> = mine.iter().map(|s| s.id.clone()).collect();
        assert!(ids.contains(&first) && ids.contains(&second));

        let json = serde_json::to_string(&mine).unwrap();
        assert!(!json.contains(' '));
    }

    #[tokio::test]
    async fn test_operator_maintenance() {
        let svc = service();
        svc.create_whisper(UserId(1), "", "a").await.unwrap();
        svc.create_whisper(UserId(2), "", "b").await.unwrap();

        let operator = Operator::assume_verified();
        assert_eq!(svc.checkpoint(&operator).await.unwrap(), 2);
        assert_eq!(svc.reset(&operator).await, 2);
        assert!(svc.list_mine(UserId(1)).await.is_empty());

        assert_eq!(svc.restore().await.unwrap(), 2);
        assert_eq!(svc.list_mine(UserId(1)).await.len(), 1);
    }
}
