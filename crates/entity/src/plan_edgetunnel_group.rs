use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which EdgeTunnel groups a plan is entitled to.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "plan_edgetunnel_groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub plan_id: i64,

    #[sea_orm(primary_key, auto_increment = false)]
    pub group_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::plan::Entity",
        from = "Column::PlanId",
        to = "super::plan::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Plan,
    #[sea_orm(
        belongs_to = "super::edgetunnel_group::Entity",
        from = "Column::GroupId",
        to = "super::edgetunnel_group::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    EdgetunnelGroup,
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl Related<super::edgetunnel_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EdgetunnelGroup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
