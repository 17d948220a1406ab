use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `status` value of a live subscription.
pub const STATUS_ACTIVE: i32 = 1;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "user_subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = true)]
    pub id: i64,

    pub user_id: i64,

    /// Foreign key to plans table
    pub plan_id: i64,

    pub status: i32,

    /// Unix timestamp (seconds).
    pub start_date: i64,

    /// Unix timestamp (seconds).
    pub end_date: i64,

    /// Unix timestamp (seconds).
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::plan::Entity",
        from = "Column::PlanId",
        to = "super::plan::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Plan,
    #[sea_orm(has_many = "super::subscription_token::Entity")]
    SubscriptionToken,
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl Related<super::subscription_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubscriptionToken.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
