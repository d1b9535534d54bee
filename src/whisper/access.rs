//! Who may read a whisper, and the one-time claim of open whispers.
//!
//! Open whispers go to whichever request reaches [`WhisperStore::claim`]
//! first. Two taps a few milliseconds apart can therefore resolve in either
//! order; the store's lock, not the wall clock, decides.

use crate::error::AppError;
use crate::whisper::record::{Requester, TargetSelector, WhisperBody, WhisperId, WhisperRecord};
use crate::whisper::store::SharedWhisperStore;
use tracing::{debug, warn};

/// What a requester may do with a record, judged from the record alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Reveal,
    ClaimAndReveal,
    DenyNotOwner,
    DenyAlreadyClaimed,
}

/// Outcome of a reveal attempt.
#[derive(Clone, PartialEq, Eq)]
pub enum Decision {
    Revealed(WhisperBody),
    DeniedNotOwner,
    DeniedAlreadyClaimed,
    NotFound,
}

impl Decision {
    pub fn is_revealed(&self) -> bool {
        matches!(self, Self::Revealed(_))
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Revealed(body) => Some(body.expose()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Revealed(_) => f.write_str("Revealed(<redacted>)"),
            Self::DeniedNotOwner => f.write_str("DeniedNotOwner"),
            Self::DeniedAlreadyClaimed => f.write_str("DeniedAlreadyClaimed"),
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Judge `requester` against `record`.
///
/// The sender gets no special treatment; they are checked like anyone else.
/// An open whisper is revealed once, to its claimant, and never again.
pub fn evaluate(record: &WhisperRecord, requester: &Requester) -> Verdict {
    match (&record.target, record.claimed_by) {
        (TargetSelector::Specific { recipient }, _) => {
            if recipient.matches(requester) {
                Verdict::Reveal
            } else {
                Verdict::DenyNotOwner
            }
        }
        (TargetSelector::OpenFirst, None) => Verdict::ClaimAndReveal,
        (TargetSelector::OpenFirst, Some(_)) => Verdict::DenyAlreadyClaimed,
    }
}

/// Drives reveal requests against the store.
#[derive(Debug, Clone)]
pub struct AccessController {
    store: SharedWhisperStore,
}

impl AccessController {
    pub fn new(store: SharedWhisperStore) -> Self {
        Self { store }
    }

    /// Decide whether `requester` may read whisper `id`, claiming it if open.
    pub async fn authorize(&self, requester: &Requester, id: &WhisperId) -> Decision {
        let record = match self.store.get(id).await {
            Ok(record) => record,
            Err(_) => return Decision::NotFound,
        };

        let decision = match evaluate(&record, requester) {
            Verdict::Reveal => Decision::Revealed(record.body),
            Verdict::DenyNotOwner => Decision::DeniedNotOwner,
            Verdict::DenyAlreadyClaimed => Decision::DeniedAlreadyClaimed,
            // The earlier read was only advisory; the claim itself decides.
            Verdict::ClaimAndReveal => match self.store.claim(id, requester.user_id).await {
                Ok(claimed) => Decision::Revealed(claimed.body),
                Err(AppError::AlreadyClaimed) => Decision::DeniedAlreadyClaimed,
                Err(AppError::NotFound) => Decision::NotFound,
                Err(AppError::DeniedNotOwner) => Decision::DeniedNotOwner,
                Err(e) => {
                    warn!(whisper_id = %id, "Unexpected claim failure: {}", e);
                    Decision::NotFound
                }
            },
        };

        debug!(
            whisper_id = %id,
            requester = %requester.user_id,
            decision = ?decision,
            "Reveal decided"
        );
        decision
    }
}
