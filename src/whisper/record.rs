//! Whisper records and the identities they are addressed to.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Random bytes behind each whisper id (16 base64 characters).
pub const WHISPER_ID_BYTES: usize = 12;

/// Opaque whisper reference, shared with the front end inside reveal buttons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WhisperId(String);

impl WhisperId {
    /// Draw a fresh random id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; WHISPER_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WhisperId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for WhisperId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for WhisperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric chat identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Identity presented when asking to read a whisper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub user_id: UserId,
    pub handle: Option<String>,
}

impl Requester {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }
}

/// A specific addressee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Recipient {
    Id(UserId),
    /// Lowercased, without the leading `@`.
    Handle(String),
}

impl Recipient {
    pub fn matches(&self, requester: &Requester) -> bool {
        match self {
            Self::Id(id) => *id == requester.user_id,
            Self::Handle(handle) => requester
                .handle
                .as_deref()
                .map(|h| h.trim_start_matches('@').eq_ignore_ascii_case(handle))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Handle(handle) => write!(f, "@{}", handle),
        }
    }
}

/// Who may read a whisper. Decided once at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TargetSelector {
    Specific { recipient: Recipient },
    OpenFirst,
}

impl TargetSelector {
    pub fn specific(recipient: Recipient) -> Self {
        Self::Specific { recipient }
    }

    /// Parse a raw target as typed by a sender.
    ///
    /// Empty input and `open_sentinel` (any case) make an open whisper, digits
    /// name a user id, anything else is a handle.
    pub fn parse(raw: &str, open_sentinel: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case(open_sentinel) {
            return Self::OpenFirst;
        }

        if raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = raw.parse::<u64>() {
                return Self::specific(Recipient::Id(UserId(id)));
            }
        }

        let handle = raw.trim_start_matches('@').to_ascii_lowercase();
        if handle.is_empty() {
            return Self::OpenFirst;
        }
        Self::specific(Recipient::Handle(handle))
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::OpenFirst)
    }
}

/// Secret text of a whisper. Wiped from memory when dropped.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct WhisperBody(String);

impl WhisperBody {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for WhisperBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WhisperBody(<{} chars redacted>)", self.0.chars().count())
    }
}

/// The persisted unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhisperRecord {
    pub id: WhisperId,
    pub sender: UserId,
    pub target: TargetSelector,
    pub body: WhisperBody,
    pub created_at: DateTime<Utc>,
    /// Set once, and only for open whispers.
    #[serde(default)]
    pub claimed_by: Option<UserId>,
}

impl WhisperRecord {
    pub fn new(id: WhisperId, sender: UserId, target: TargetSelector, body: WhisperBody) -> Self {
        Self {
            id,
            sender,
            target,
            body,
            created_at: Utc::now(),
            claimed_by: None,
        }
    }

    pub fn summary(&self) -> WhisperSummary {
        WhisperSummary {
            id: self.id.clone(),
            created_at: self.created_at,
        }
    }
}

/// What a sender sees when listing their own whispers. Never carries the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhisperSummary {
    pub id: WhisperId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_url_safe() {
        let id = WhisperId::generate();
        assert_eq!(id.as_str().len(), 16);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(id, WhisperId::generate());
    }

    #[test]
    fn test_parse_open_targets() {
        assert_eq!(TargetSelector::parse("", "@all"), TargetSelector::OpenFirst);
        assert_eq!(TargetSelector::parse("  ", "@all"), TargetSelector::OpenFirst);
        assert_eq!(TargetSelector::parse("@ALL", "@all"), TargetSelector::OpenFirst);
        assert_eq!(TargetSelector::parse("@", "@all"), TargetSelector::OpenFirst);
    }

    #[test]
    fn test_parse_specific_targets() {
        assert_eq!(
            TargetSelector::parse("@Bob", "@all"),
            TargetSelector::specific(Recipient::Handle("bob".into()))
        );
        assert_eq!(
            TargetSelector::parse("bob", "@all"),
            TargetSelector::specific(Recipient::Handle("bob".into()))
        );
        assert_eq!(
            TargetSelector::parse("123456", "@all"),
            TargetSelector::specific(Recipient::Id(UserId(123456)))
        );
    }

    #[test]
    fn test_recipient_matching() {
        let bob = Requester::new(UserId(7)).with_handle("Bob");
        let carol = Requester::new(UserId(8)).with_handle("carol");
        let anonymous = Requester::new(UserId(9));

        let by_handle = Recipient::Handle("bob".into());
        assert!(by_handle.matches(&bob));
        assert!(!by_handle.matches(&carol));
        assert!(!by_handle.matches(&anonymous));

        let by_id = Recipient::Id(UserId(9));
        assert!(by_id.matches(&anonymous));
        assert!(!by_id.matches(&bob));
    }

    #[test]
    fn test_body_debug_is_redacted() {
        let body = WhisperBody::new("top secret");
        let rendered = format!("{:?}", body);
        assert!(!rendered.contains("secret"));
        assert_eq!(body.expose(), "top secret");
    }

    #[test]
    fn test_record_json_shape() {
        let record = WhisperRecord::new(
            WhisperId::from("abc"),
            UserId(1),
            TargetSelector::specific(Recipient::Handle("bob".into())),
            WhisperBody::new("hi"),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["sender"], 1);
        assert_eq!(json["target"]["mode"], "specific");
        assert_eq!(json["target"]["recipient"]["kind"], "handle");
        assert_eq!(json["body"], "hi");
        assert!(json["claimed_by"].is_null());
    }
}
