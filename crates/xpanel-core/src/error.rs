use thiserror::Error;

/// Failures surfaced by the subscription token lifecycle.
///
/// `Malformed`, `InvalidSignature`, `Expired` and `Revoked` are all presented
/// identically to end users; they stay distinct here so logs can tell a stolen
/// link replay apart from a lapsed one.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("subscription token is malformed")]
    Malformed,

    #[error("subscription token signature is invalid")]
    InvalidSignature,

    #[error("subscription token has expired")]
    Expired,

    #[error("subscription token has been revoked")]
    Revoked,

    #[error("subscription has expired")]
    SubscriptionExpired,

    /// A concurrent mint won the uniqueness race twice in a row.
    #[error("subscription token is being issued concurrently, try again")]
    Transient,

    #[error("token store error: {0}")]
    Store(#[source] StoreError),

    #[error("failed to sign subscription token: {0}")]
    Signing(String),
}

impl TokenError {
    /// True for every failure that means "this bearer string does not grant access".
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TokenError::Malformed
                | TokenError::InvalidSignature
                | TokenError::Expired
                | TokenError::Revoked
        )
    }

    /// Stable machine-readable code used in logs and JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed_token",
            TokenError::InvalidSignature => "invalid_signature",
            TokenError::Expired => "expired_token",
            TokenError::Revoked => "revoked_token",
            TokenError::SubscriptionExpired => "subscription_expired",
            TokenError::Transient => "transient_failure",
            TokenError::Store(_) => "internal_error",
            TokenError::Signing(_) => "internal_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The `(user_id, subscription_id, is_active)` uniqueness guard fired.
    #[error("active token already exists for this subscription")]
    Conflict,

    /// More than one active row exists for a single pair.
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("{0}")]
    Backend(String),
}

impl From<StoreError> for TokenError {
    fn from(e: StoreError) -> Self {
        TokenError::Store(e)
    }
}

#[derive(Debug, Error)]
#[error("node inventory error: {0}")]
pub struct InventoryError(pub String);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unsupported subscription format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to serialize client config: {0}")]
    Serialize(String),
}
