use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "subscription_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = true)]
    pub id: i64,

    pub user_id: i64,

    /// Foreign key to user_subscriptions table
    pub subscription_id: i64,

    /// SHA-256 hash of the subscription token
    pub token_hash: String,

    /// Unix timestamp (seconds), the token's `iat` claim.
    pub issued_at: i64,

    /// Unix timestamp (seconds), the token's `exp` claim.
    pub expires_at: i64,

    pub is_active: bool,

    /// Unix timestamp (seconds).
    pub revoked_at: Option<i64>,

    /// Unix timestamp (seconds).
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user_subscription::Entity",
        from = "Column::SubscriptionId",
        to = "super::user_subscription::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    UserSubscription,
}

impl Related<super::user_subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserSubscription.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
