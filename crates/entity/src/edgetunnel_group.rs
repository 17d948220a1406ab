use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "edgetunnel_groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = true)]
    pub id: i64,

    pub name: String,

    pub description: Option<String>,

    /// Disabling a group hides all of its nodes, whatever their own flag says.
    pub is_active: bool,

    /// Unix timestamp (seconds).
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::edgetunnel_node::Entity")]
    EdgetunnelNode,
    #[sea_orm(has_many = "super::plan_edgetunnel_group::Entity")]
    PlanEdgetunnelGroup,
}

impl Related<super::edgetunnel_node::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EdgetunnelNode.def()
    }
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        super::plan_edgetunnel_group::Relation::Plan.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::plan_edgetunnel_group::Relation::EdgetunnelGroup.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
