pub mod access;
pub mod persistence;
pub mod record;
pub mod service;
pub mod store;

pub use access::{evaluate, AccessController, Decision, Verdict};
pub use persistence::{JsonFileBackend, MemoryBackend, SnapshotBackend, SqliteBackend};
pub use record::{
    Recipient, Requester, TargetSelector, UserId, WhisperBody, WhisperId, WhisperRecord,
    WhisperSummary,
};
pub use service::{Operator, WhisperService};
pub use store::{SharedWhisperStore, WhisperStore};
