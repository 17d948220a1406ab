//! Minting, rotation and validation of subscription tokens.
//!
//! [`TokenManager`] is the only component allowed to write to a [`TokenStore`].
//! It keeps at most one active row per `(user_id, subscription_id)` by always
//! revoking before inserting, and re-derives the exact token string of an
//! existing row from its persisted `issued_at`/`expires_at`.

use chrono::Utc;

use crate::codec::{self, SubscriptionClaims};
use crate::error::{StoreError, TokenError};
use crate::store::{NewToken, TokenRecord, TokenStore};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

pub struct TokenManager<S> {
    store: S,
    secret: String,
}

impl<S: TokenStore> TokenManager<S> {
    pub fn new(store: S, secret: impl Into<String>) -> Self {
        Self {
            store,
            secret: secret.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn get_or_create_token(
        &self,
        user_id: i64,
        subscription_id: i64,
        subscription_end: i64,
        max_lifetime_days: i64,
    ) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        self.get_or_create_token_at(user_id, subscription_id, subscription_end, max_lifetime_days, now)
            .await
    }

    /// Returns the current active token for the pair, minting one if none is live.
    pub async fn get_or_create_token_at(
        &self,
        user_id: i64,
        subscription_id: i64,
        subscription_end: i64,
        max_lifetime_days: i64,
        now: i64,
    ) -> Result<String, TokenError> {
        match self
            .try_get_or_create(user_id, subscription_id, subscription_end, max_lifetime_days, now)
            .await
        {
            Err(TokenError::Store(StoreError::Conflict)) => {
                log::warn!(
                    "Concurrent token mint for user {} subscription {}, retrying once",
                    user_id,
                    subscription_id
                );
                self.try_get_or_create(user_id, subscription_id, subscription_end, max_lifetime_days, now)
                    .await
                    .map_err(conflict_to_transient)
            }
            other => other,
        }
    }

    pub async fn rotate_token(
        &self,
        user_id: i64,
        subscription_id: i64,
        subscription_end: i64,
        max_lifetime_days: i64,
    ) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        self.rotate_token_at(user_id, subscription_id, subscription_end, max_lifetime_days, now)
            .await
    }

    /// Unconditionally supersedes the active token, even if it had lifetime left.
    pub async fn rotate_token_at(
        &self,
        user_id: i64,
        subscription_id: i64,
        subscription_end: i64,
        max_lifetime_days: i64,
        now: i64,
    ) -> Result<String, TokenError> {
        match self
            .mint(user_id, subscription_id, subscription_end, max_lifetime_days, now)
            .await
        {
            Err(TokenError::Store(StoreError::Conflict)) => {
                log::warn!(
                    "Concurrent token rotation for user {} subscription {}, retrying once",
                    user_id,
                    subscription_id
                );
                self.mint(user_id, subscription_id, subscription_end, max_lifetime_days, now)
                    .await
                    .map_err(conflict_to_transient)
            }
            other => other,
        }
    }

    pub async fn validate(&self, token: &str) -> Result<SubscriptionClaims, TokenError> {
        self.validate_at(token, Utc::now().timestamp()).await
    }

    /// Signature check followed by a store-liveness check.
    ///
    /// A token with a valid signature whose row was superseded or revoked fails
    /// with [`TokenError::Revoked`].
    pub async fn validate_at(&self, token: &str, now: i64) -> Result<SubscriptionClaims, TokenError> {
        let claims = match codec::decode_at(token, &self.secret, now) {
            Ok(claims) => claims,
            Err(e) => {
                log::warn!(
                    "Subscription token rejected ({}): {}",
                    e.code(),
                    token_prefix(token)
                );
                return Err(e);
            }
        };

        let hash = codec::token_hash(token);
        let row = self
            .store
            .find_by_hash(claims.user_id, claims.subscription_id, &hash, now)
            .await?;

        match row {
            Some(row) if row.expires_at == claims.exp => Ok(claims),
            Some(row) => {
                log::error!(
                    "Token row {} expires_at {} disagrees with claims exp {}",
                    row.id,
                    row.expires_at,
                    claims.exp
                );
                Err(TokenError::Revoked)
            }
            None => {
                log::warn!(
                    "Subscription token rejected (revoked_token): user {} subscription {}",
                    claims.user_id,
                    claims.subscription_id
                );
                Err(TokenError::Revoked)
            }
        }
    }

    pub async fn revoke(&self, user_id: i64, subscription_id: Option<i64>) -> Result<u64, TokenError> {
        self.revoke_at(user_id, subscription_id, Utc::now().timestamp())
            .await
    }

    /// Revokes the active tokens of one subscription, or of every subscription of the user.
    pub async fn revoke_at(
        &self,
        user_id: i64,
        subscription_id: Option<i64>,
        now: i64,
    ) -> Result<u64, TokenError> {
        let count = match subscription_id {
            Some(subscription_id) => {
                self.store
                    .revoke_all_active(user_id, subscription_id, now)
                    .await?
            }
            None => self.store.revoke_all_for_user(user_id, now).await?,
        };
        log::info!("Revoked {} subscription token(s) for user {}", count, user_id);
        Ok(count)
    }

    pub async fn cleanup(&self, retention_days: i64) -> Result<u64, TokenError> {
        self.cleanup_at(retention_days, Utc::now().timestamp()).await
    }

    /// Deletes token rows that expired or were revoked more than `retention_days` ago.
    pub async fn cleanup_at(&self, retention_days: i64, now: i64) -> Result<u64, TokenError> {
        let cutoff = now - retention_days * SECONDS_PER_DAY;
        let purged = self.store.purge_stale(cutoff).await?;
        log::info!("Purged {} stale subscription token row(s)", purged);
        Ok(purged)
    }

    async fn try_get_or_create(
        &self,
        user_id: i64,
        subscription_id: i64,
        subscription_end: i64,
        max_lifetime_days: i64,
        now: i64,
    ) -> Result<String, TokenError> {
        let active = self.store.find_active(user_id, subscription_id).await?;

        if let Some(row) = &active {
            if row.expires_at > now && row.expires_at <= subscription_end {
                let token = self.rebuild(row)?;
                if codec::token_hash(&token) == row.token_hash {
                    return Ok(token);
                }
                // The signing secret changed since this row was minted.
                log::warn!(
                    "Active token row {} no longer reproduces its hash, minting a new token",
                    row.id
                );
            }
        }

        self.mint(user_id, subscription_id, subscription_end, max_lifetime_days, now)
            .await
    }

    async fn mint(
        &self,
        user_id: i64,
        subscription_id: i64,
        subscription_end: i64,
        max_lifetime_days: i64,
        now: i64,
    ) -> Result<String, TokenError> {
        let expires_at = token_expiry(now, subscription_end, max_lifetime_days)?;

        // `iat` stays above every earlier row for the pair, revoked rows included.
        let issued_at = match self
            .store
            .latest_issued_at(user_id, subscription_id)
            .await?
        {
            Some(latest) if latest >= now => latest + 1,
            _ => now,
        };

        let claims = SubscriptionClaims::new(user_id, subscription_id, issued_at, expires_at);
        let token = codec::encode(&claims, &self.secret)?;
        let token_hash = codec::token_hash(&token);

        // Revoke strictly before insert: a caller must always be able to read its own token.
        let revoked = self
            .store
            .revoke_all_active(user_id, subscription_id, now)
            .await?;
        let row = self
            .store
            .insert_active(NewToken {
                user_id,
                subscription_id,
                token_hash,
                issued_at,
                expires_at,
            })
            .await?;

        log::info!(
            "Issued subscription token row {} for user {} subscription {} (revoked {}, expires_at {})",
            row.id,
            user_id,
            subscription_id,
            revoked,
            expires_at
        );

        Ok(token)
    }

    fn rebuild(&self, row: &TokenRecord) -> Result<String, TokenError> {
        let claims = SubscriptionClaims::new(
            row.user_id,
            row.subscription_id,
            row.issued_at,
            row.expires_at,
        );
        codec::encode(&claims, &self.secret)
    }
}

/// `min(now + max_lifetime_days, subscription_end)`, which must lie after `now`.
pub fn token_expiry(
    now: i64,
    subscription_end: i64,
    max_lifetime_days: i64,
) -> Result<i64, TokenError> {
    let expires_at = now
        .saturating_add(max_lifetime_days.saturating_mul(SECONDS_PER_DAY))
        .min(subscription_end);
    if expires_at <= now {
        return Err(TokenError::SubscriptionExpired);
    }
    Ok(expires_at)
}

fn conflict_to_transient(e: TokenError) -> TokenError {
    match e {
        TokenError::Store(StoreError::Conflict) => TokenError::Transient,
        other => other,
    }
}

fn token_prefix(token: &str) -> String {
    let end = token
        .char_indices()
        .nth(12)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    format!("{}…", token.get(..end).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const SECRET: &str = "lifecycle-test-secret";
    const NOW: i64 = 1_760_000_000;
    const DAY: i64 = SECONDS_PER_DAY;

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<TokenRecord>>,
        conflicts: AtomicUsize,
        insert_failures: AtomicUsize,
    }

    impl MemoryStore {
        fn with_conflicts(n: usize) -> Self {
            let store = Self::default();
            store.conflicts.store(n, Ordering::SeqCst);
            store
        }

        fn active_count(&self, user_id: i64, subscription_id: i64) -> usize {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.user_id == user_id && r.subscription_id == subscription_id && r.is_active)
                .count()
        }

        fn total_rows(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TokenStore for MemoryStore {
        async fn find_active(
            &self,
            user_id: i64,
            subscription_id: i64,
        ) -> Result<Option<TokenRecord>, StoreError> {
            let rows = self.rows.lock().unwrap();
            let active: Vec<_> = rows
                .iter()
                .filter(|r| r.user_id == user_id && r.subscription_id == subscription_id && r.is_active)
                .cloned()
                .collect();
            if active.len() > 1 {
                return Err(StoreError::Integrity("multiple active rows".to_string()));
            }
            Ok(active.into_iter().next())
        }

        async fn insert_active(&self, token: NewToken) -> Result<TokenRecord, StoreError> {
            if self
                .conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Conflict);
            }
            if self
                .insert_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Backend("connection reset".to_string()));
            }

            let mut rows = self.rows.lock().unwrap();
            if rows.iter().any(|r| {
                r.user_id == token.user_id && r.subscription_id == token.subscription_id && r.is_active
            }) {
                return Err(StoreError::Conflict);
            }
            let row = TokenRecord {
                id: rows.len() as i64 + 1,
                user_id: token.user_id,
                subscription_id: token.subscription_id,
                token_hash: token.token_hash,
                issued_at: token.issued_at,
                expires_at: token.expires_at,
                is_active: true,
                revoked_at: None,
                created_at: token.issued_at,
            };
            rows.push(row.clone());
            Ok(row)
        }

        async fn revoke_all_active(
            &self,
            user_id: i64,
            subscription_id: i64,
            now: i64,
        ) -> Result<u64, StoreError> {
            let mut count = 0;
            for row in self.rows.lock().unwrap().iter_mut() {
                if row.user_id == user_id && row.subscription_id == subscription_id && row.is_active {
                    row.is_active = false;
                    row.revoked_at = Some(now);
                    count += 1;
                }
            }
            Ok(count)
        }

        async fn find_by_hash(
            &self,
            user_id: i64,
            subscription_id: i64,
            token_hash: &str,
            now: i64,
        ) -> Result<Option<TokenRecord>, StoreError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| {
                    r.user_id == user_id
                        && r.subscription_id == subscription_id
                        && r.token_hash == token_hash
                        && r.is_active
                        && r.expires_at >= now
                })
                .cloned())
        }

        async fn latest_issued_at(
            &self,
            user_id: i64,
            subscription_id: i64,
        ) -> Result<Option<i64>, StoreError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.user_id == user_id && r.subscription_id == subscription_id)
                .map(|r| r.issued_at)
                .max())
        }

        async fn revoke_all_for_user(&self, user_id: i64, now: i64) -> Result<u64, StoreError> {
            let mut count = 0;
            for row in self.rows.lock().unwrap().iter_mut() {
                if row.user_id == user_id && row.is_active {
                    row.is_active = false;
                    row.revoked_at = Some(now);
                    count += 1;
                }
            }
            Ok(count)
        }

        async fn purge_stale(&self, cutoff: i64) -> Result<u64, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| {
                !(r.expires_at < cutoff || (!r.is_active && r.revoked_at.is_some_and(|t| t < cutoff)))
            });
            Ok((before - rows.len()) as u64)
        }
    }

    fn manager(store: MemoryStore) -> TokenManager<MemoryStore> {
        TokenManager::new(store, SECRET)
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let m = manager(MemoryStore::default());
        let first = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();
        let second = m
            .get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW + 3600)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(m.store().total_rows(), 1);

        let a = m.validate_at(&first, NOW + 10).await.unwrap();
        let b = m.validate_at(&second, NOW + 3700).await.unwrap();
        assert_eq!(a, b);
        assert_eq!((a.user_id, a.subscription_id), (1, 10));
    }

    #[tokio::test]
    async fn test_expiry_is_capped_by_subscription_end() {
        let m = manager(MemoryStore::default());
        let token = m.get_or_create_token_at(1, 10, NOW + 10 * DAY, 30, NOW).await.unwrap();
        let claims = m.validate_at(&token, NOW).await.unwrap();
        assert_eq!(claims.exp, NOW + 10 * DAY);
        assert_eq!(claims.iat, NOW);
    }

    #[tokio::test]
    async fn test_expiry_is_capped_by_max_lifetime() {
        let m = manager(MemoryStore::default());
        let token = m.get_or_create_token_at(1, 10, NOW + 365 * DAY, 30, NOW).await.unwrap();
        let claims = m.validate_at(&token, NOW).await.unwrap();
        assert_eq!(claims.exp, NOW + 30 * DAY);
    }

    #[tokio::test]
    async fn test_lapsed_subscription_cannot_mint() {
        let m = manager(MemoryStore::default());
        let err = m.get_or_create_token_at(1, 10, NOW, 30, NOW).await.unwrap_err();
        assert!(matches!(err, TokenError::SubscriptionExpired));
        assert_eq!(m.store().total_rows(), 0);
    }

    #[tokio::test]
    async fn test_rotation_revokes_previous_token() {
        let m = manager(MemoryStore::default());
        let old = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();
        let new = m.rotate_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();

        assert_ne!(old, new);
        assert!(matches!(m.validate_at(&old, NOW).await, Err(TokenError::Revoked)));
        assert!(m.validate_at(&new, NOW).await.is_ok());
        assert_eq!(m.store().active_count(1, 10), 1);
    }

    #[tokio::test]
    async fn test_at_most_one_active_row_per_pair() {
        let m = manager(MemoryStore::default());
        m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();
        m.rotate_token_at(1, 10, NOW + 60 * DAY, 30, NOW + 1).await.unwrap();
        m.rotate_token_at(1, 10, NOW + 60 * DAY, 30, NOW + 2).await.unwrap();
        m.get_or_create_token_at(1, 11, NOW + 60 * DAY, 30, NOW + 2).await.unwrap();

        assert_eq!(m.store().active_count(1, 10), 1);
        assert_eq!(m.store().active_count(1, 11), 1);
        assert_eq!(m.store().total_rows(), 4);
    }

    #[tokio::test]
    async fn test_expired_row_is_replaced() {
        let m = manager(MemoryStore::default());
        let old = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 1, NOW).await.unwrap();
        let later = NOW + 2 * DAY;
        let new = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 1, later).await.unwrap();

        assert_ne!(old, new);
        assert!(matches!(m.validate_at(&old, later).await, Err(TokenError::Expired)));
        assert_eq!(m.validate_at(&new, later).await.unwrap().exp, later + DAY);
        assert_eq!(m.store().active_count(1, 10), 1);
    }

    #[tokio::test]
    async fn test_shortened_subscription_reissues_within_bound() {
        let m = manager(MemoryStore::default());
        let old = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();
        let new = m.get_or_create_token_at(1, 10, NOW + 5 * DAY, 30, NOW + 10).await.unwrap();

        assert_ne!(old, new);
        assert_eq!(m.validate_at(&new, NOW + 10).await.unwrap().exp, NOW + 5 * DAY);
    }

    #[tokio::test]
    async fn test_secret_change_reissues() {
        let first = TokenManager::new(MemoryStore::default(), "first-secret");
        let old = first.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();

        let m = TokenManager::new(first.store, "second-secret");
        let new = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW + 5).await.unwrap();

        assert_ne!(old, new);
        assert!(m.validate_at(&new, NOW + 5).await.is_ok());
        assert!(matches!(
            m.validate_at(&old, NOW + 5).await,
            Err(TokenError::InvalidSignature)
        ));
        assert_eq!(m.store().active_count(1, 10), 1);
    }

    #[tokio::test]
    async fn test_single_conflict_is_retried() {
        let m = manager(MemoryStore::with_conflicts(1));
        let token = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();
        assert!(m.validate_at(&token, NOW).await.is_ok());
    }

    #[tokio::test]
    async fn test_repeated_conflict_is_transient() {
        let m = manager(MemoryStore::with_conflicts(2));
        let err = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap_err();
        assert!(matches!(err, TokenError::Transient));

        let m = manager(MemoryStore::with_conflicts(2));
        let err = m.rotate_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap_err();
        assert!(matches!(err, TokenError::Transient));
    }

    #[tokio::test]
    async fn test_interrupted_mint_recovers() {
        let m = manager(MemoryStore::default());
        let old = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();

        // Revoke lands, insert is lost.
        m.store().insert_failures.store(1, Ordering::SeqCst);
        assert!(m.rotate_token_at(1, 10, NOW + 60 * DAY, 30, NOW + 1).await.is_err());
        assert_eq!(m.store().active_count(1, 10), 0);

        let token = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW + 2).await.unwrap();
        assert!(m.validate_at(&token, NOW + 2).await.is_ok());
        assert!(matches!(m.validate_at(&old, NOW + 2).await, Err(TokenError::Revoked)));
    }

    #[tokio::test]
    async fn test_session_token_never_validates() {
        let m = manager(MemoryStore::default());
        let session = codec::encode_session_token(1, SECRET, 3600, NOW).unwrap();
        let err = m.validate_at(&session, NOW).await.unwrap_err();
        assert!(!matches!(err, TokenError::Revoked | TokenError::Expired));
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn test_revoke_for_user() {
        let m = manager(MemoryStore::default());
        let a = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();
        let b = m.get_or_create_token_at(1, 11, NOW + 60 * DAY, 30, NOW).await.unwrap();

        assert_eq!(m.revoke_at(1, Some(10), NOW).await.unwrap(), 1);
        assert!(matches!(m.validate_at(&a, NOW).await, Err(TokenError::Revoked)));
        assert!(m.validate_at(&b, NOW).await.is_ok());

        assert_eq!(m.revoke_at(1, None, NOW).await.unwrap(), 1);
        assert!(matches!(m.validate_at(&b, NOW).await, Err(TokenError::Revoked)));
        assert_eq!(m.revoke_at(1, None, NOW).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remint_after_revoke_in_same_second_is_distinct() {
        let m = manager(MemoryStore::default());
        let old = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();
        m.revoke_at(1, Some(10), NOW).await.unwrap();

        let new = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();
        assert_ne!(old, new);
        assert!(matches!(m.validate_at(&old, NOW).await, Err(TokenError::Revoked)));
        assert_eq!(m.validate_at(&new, NOW).await.unwrap().iat, NOW + 1);

        // And again, after a rotation that already bumped `iat`.
        m.rotate_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();
        m.revoke_at(1, None, NOW).await.unwrap();
        let third = m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();
        assert!(m.validate_at(&third, NOW).await.is_ok());
        assert!(matches!(m.validate_at(&new, NOW).await, Err(TokenError::Revoked)));
    }

    #[tokio::test]
    async fn test_duplicate_active_rows_are_an_integrity_error() {
        let store = MemoryStore::default();
        for hash in ["first", "second"] {
            let id = store.total_rows() as i64 + 1;
            store.rows.lock().unwrap().push(TokenRecord {
                id,
                user_id: 1,
                subscription_id: 10,
                token_hash: hash.to_string(),
                issued_at: NOW,
                expires_at: NOW + DAY,
                is_active: true,
                revoked_at: None,
                created_at: NOW,
            });
        }
        let m = manager(store);

        let err = m
            .get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW)
            .await
            .unwrap_err();
        assert!(
            matches!(err, TokenError::Store(StoreError::Integrity(_))),
            "{err:?}"
        );
        assert_eq!(err.code(), "internal_error");
        assert_eq!(m.store().total_rows(), 2);
    }

    #[tokio::test]
    async fn test_token_validates_at_its_exact_expiry() {
        let m = manager(MemoryStore::default());
        let token = m.get_or_create_token_at(1, 10, NOW + DAY, 30, NOW).await.unwrap();
        assert!(m.validate_at(&token, NOW + DAY).await.is_ok());
        assert!(matches!(
            m.validate_at(&token, NOW + DAY + 1).await,
            Err(TokenError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_cleanup_purges_old_rows() {
        let m = manager(MemoryStore::default());
        m.get_or_create_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();
        m.rotate_token_at(1, 10, NOW + 60 * DAY, 30, NOW).await.unwrap();

        assert_eq!(m.cleanup_at(90, NOW + 30 * DAY).await.unwrap(), 0);
        // Revoked row falls out of the retention window, then the expired active one.
        assert_eq!(m.cleanup_at(90, NOW + 91 * DAY).await.unwrap(), 1);
        assert_eq!(m.cleanup_at(90, NOW + 121 * DAY).await.unwrap(), 1);
        assert_eq!(m.store().total_rows(), 0);
    }

    #[test]
    fn test_token_expiry_bound() {
        assert_eq!(token_expiry(NOW, NOW + 10 * DAY, 30).unwrap(), NOW + 10 * DAY);
        assert_eq!(token_expiry(NOW, NOW + 90 * DAY, 30).unwrap(), NOW + 30 * DAY);
        assert!(matches!(
            token_expiry(NOW, NOW - 1, 30),
            Err(TokenError::SubscriptionExpired)
        ));
    }
}
