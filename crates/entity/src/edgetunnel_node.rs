use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "edgetunnel_nodes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = true)]
    pub id: i64,

    /// NULL once the owning group is deleted.
    pub group_id: Option<i64>,

    pub name: String,

    pub host: String,

    pub port: i32,

    /// Empty means vless.
    pub protocol: String,

    pub uuid: Option<String>,

    pub path: Option<String>,

    pub country: String,

    pub city: String,

    pub flag_emoji: String,

    pub is_active: bool,

    pub sort_order: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::edgetunnel_group::Entity",
        from = "Column::GroupId",
        to = "super::edgetunnel_group::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    EdgetunnelGroup,
}

impl Related<super::edgetunnel_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EdgetunnelGroup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
