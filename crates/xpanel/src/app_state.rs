use sea_orm::DatabaseConnection;
use xpanel_core::TokenManager;

use crate::db::{SeaOrmInventory, SeaOrmTokenStore};

/// Shared application state
pub struct AppState {
    /// Sea-ORM database connection pool
    pub db: DatabaseConnection,

    /// Sole writer of subscription token rows
    pub tokens: TokenManager<SeaOrmTokenStore>,

    /// Static servers and EdgeTunnel groups
    pub inventory: SeaOrmInventory,

    /// HMAC secret for verifying session tokens
    pub jwt_secret: String,

    /// Public origin used when building subscription links
    pub base_url: String,

    /// Upper bound on a subscription token's lifetime, in days
    pub token_max_lifetime_days: i64,

    /// Window in which a token is reported as expiring soon, in days
    pub token_warning_days: i64,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: &crate::config::ServeConfig) -> Self {
        Self {
            tokens: TokenManager::new(SeaOrmTokenStore::new(db.clone()), config.jwt_secret.clone()),
            inventory: SeaOrmInventory::new(db.clone()),
            db,
            jwt_secret: config.jwt_secret.clone(),
            base_url: config.public_base(),
            token_max_lifetime_days: config.token_max_lifetime_days,
            token_warning_days: config.token_warning_days,
        }
    }
}
