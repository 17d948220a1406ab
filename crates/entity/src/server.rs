use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A node of the static server pool, visible to every active subscription.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "servers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = true)]
    pub id: i64,

    pub name: String,

    pub host: String,

    pub port: i32,

    /// ss, vmess, trojan or vless
    pub protocol: String,

    /// Shadowsocks cipher
    pub method: Option<String>,

    pub password: Option<String>,

    pub uuid: Option<String>,

    /// WebSocket path
    pub path: Option<String>,

    pub country: String,

    pub city: String,

    pub flag_emoji: String,

    pub is_active: bool,

    pub sort_order: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
