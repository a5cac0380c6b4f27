use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted token record, keyed by its derived signature.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TokenRecord {
    /// When the token stops being valid
    pub expired_at: DateTime<Utc>,
    /// Opaque string-keyed metadata attached at issuance
    pub meta: Option<serde_json::Value>,
    /// Encoded HMAC signature; storage key and cryptographic check share this datum
    pub signature: String,
    /// Identifier of the owning principal
    pub subject: String,
}

/// Outward introspection result.
///
/// Every failure path yields the default (`active: false`, nothing else) so a
/// caller cannot distinguish a malformed token from an unknown or expired one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenIntrospection {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl TokenIntrospection {
    pub fn active(record: &TokenRecord) -> Self {
        Self {
            active: true,
            expired_at: Some(record.expired_at.timestamp()),
            meta: record.meta.clone(),
            subject: Some(record.subject.clone()),
        }
    }

    pub fn inactive() -> Self {
        Self::default()
    }
}
