use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A persisted subscription token row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub subscription_id: i64,
    /// SHA-256 hash of the bearer token
    pub token_hash: String,
    /// Unix seconds. Persisted so the exact token string can be rebuilt.
    pub issued_at: i64,
    pub expires_at: i64,
    pub is_active: bool,
    pub revoked_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewToken {
    pub user_id: i64,
    pub subscription_id: i64,
    pub token_hash: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Durable bookkeeping of the active token per `(user_id, subscription_id)`.
///
/// Implementations must map a violation of the one-active-row uniqueness guard
/// to [`StoreError::Conflict`].
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// The single active row for the pair, if any. More than one is an
    /// [`StoreError::Integrity`] error.
    async fn find_active(
        &self,
        user_id: i64,
        subscription_id: i64,
    ) -> Result<Option<TokenRecord>, StoreError>;

    async fn insert_active(&self, token: NewToken) -> Result<TokenRecord, StoreError>;

    /// Deactivates every active row for the pair and stamps `revoked_at = now`.
    async fn revoke_all_active(
        &self,
        user_id: i64,
        subscription_id: i64,
        now: i64,
    ) -> Result<u64, StoreError>;

    /// Active, unexpired row matching the presented token's hash.
    async fn find_by_hash(
        &self,
        user_id: i64,
        subscription_id: i64,
        token_hash: &str,
        now: i64,
    ) -> Result<Option<TokenRecord>, StoreError>;

    /// Largest `issued_at` of any row for the pair, active or not.
    async fn latest_issued_at(
        &self,
        user_id: i64,
        subscription_id: i64,
    ) -> Result<Option<i64>, StoreError>;

    async fn revoke_all_for_user(&self, user_id: i64, now: i64) -> Result<u64, StoreError>;

    /// Deletes rows that expired before `cutoff`, or were revoked before it.
    async fn purge_stale(&self, cutoff: i64) -> Result<u64, StoreError>;
}
