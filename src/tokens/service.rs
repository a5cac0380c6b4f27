use chrono::{Duration, Utc};
use thiserror::Error;

use crate::storage::models::{TokenIntrospection, TokenRecord};
use crate::storage::{StorageError, TokenRepo};

use super::codec::{CodecError, HmacCodec};

#[derive(Debug, Error)]
pub enum IssueError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Issue a token for a subject and persist its record by signature.
///
/// The caller receives the opaque token; the signature stays server-side as
/// the lookup key.
pub async fn issue(
    store: &dyn TokenRepo,
    codec: &HmacCodec,
    subject_id: i64,
    ttl: Duration,
) -> Result<String, IssueError> {
    let (token, signature) = codec.generate()?;

    let record = TokenRecord {
        expired_at: Utc::now() + ttl,
        meta: None,
        signature,
        subject: subject_id.to_string(),
    };
    store.put_token(&record).await?;

    tracing::debug!(subject = %record.subject, "issued token");
    Ok(token)
}

/// Check whether a token is currently valid and active.
///
/// Any failure — malformed token, signature mismatch, unknown signature,
/// storage error, expired record — yields the same inactive shape. The
/// distinctions live in debug logs only, never in the response.
pub async fn introspect(
    store: &dyn TokenRepo,
    codec: &HmacCodec,
    token: &str,
) -> TokenIntrospection {
    if let Err(e) = codec.validate(token) {
        tracing::debug!(error = %e, "token failed validation");
        return TokenIntrospection::inactive();
    }

    let record = match store.get_token(&codec.signature(token)).await {
        Ok(record) => record,
        Err(e) => {
            tracing::debug!(error = %e, "token lookup failed");
            return TokenIntrospection::inactive();
        }
    };

    if record.expired_at <= Utc::now() {
        tracing::debug!(subject = %record.subject, "token expired");
        return TokenIntrospection::inactive();
    }

    TokenIntrospection::active(&record)
}

/// Revoke a token by deleting its record.
///
/// Revoking an unknown or already-revoked token succeeds; the signature is
/// parsed without a cryptographic check since deletion of a nonexistent key
/// is harmless.
pub async fn revoke(
    store: &dyn TokenRepo,
    codec: &HmacCodec,
    token: &str,
) -> Result<(), StorageError> {
    store.delete_token(&codec.signature(token)).await
}
