use serde::{Deserialize, Serialize};

use crate::links::SubscriptionLink;
use crate::nodes::{AggregatedNode, NodeStats};

/// The slice of a user subscription this core needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    pub plan_name: String,
    /// Unix timestamp (seconds).
    pub end_date: i64,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Response for GET /api/v1/user/subscription-links and the token refresh endpoint
#[derive(Debug, Serialize)]
pub struct SubscriptionLinksResponse {
    pub subscription: SubscriptionInfo,
    pub nodes: Vec<AggregatedNode>,
    pub node_stats: NodeStats,
    pub links: Vec<SubscriptionLink>,
    /// Token expiry (Unix seconds)
    pub expires_at: i64,
    pub expiring_soon: bool,
}
