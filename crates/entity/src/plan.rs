use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "plans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = true)]
    pub id: i64,

    pub name: String,

    pub is_active: bool,

    /// Unix timestamp (seconds).
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_subscription::Entity")]
    UserSubscription,
    #[sea_orm(has_many = "super::plan_edgetunnel_group::Entity")]
    PlanEdgetunnelGroup,
}

impl Related<super::user_subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserSubscription.def()
    }
}

impl Related<super::edgetunnel_group::Entity> for Entity {
    fn to() -> RelationDef {
        super::plan_edgetunnel_group::Relation::EdgetunnelGroup.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::plan_edgetunnel_group::Relation::Plan.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
