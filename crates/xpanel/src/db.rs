//! sea-orm implementations of the core's persistence seams.

use async_trait::async_trait;
use entity::{
    edgetunnel_group, edgetunnel_node, plan, plan_edgetunnel_group, server, subscription_token,
    user_subscription,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use xpanel_core::models::SubscriptionInfo;
use xpanel_core::nodes::{GroupedNode, NodeCredentials, NodeGroup, StaticServer};
use xpanel_core::{InventoryError, NewToken, NodeInventory, StoreError, TokenRecord, TokenStore};

fn map_db_err(e: DbErr) -> StoreError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::Conflict,
        _ => StoreError::Backend(e.to_string()),
    }
}

fn map_inventory_err(e: DbErr) -> InventoryError {
    InventoryError(e.to_string())
}

fn to_record(row: subscription_token::Model) -> TokenRecord {
    TokenRecord {
        id: row.id,
        user_id: row.user_id,
        subscription_id: row.subscription_id,
        token_hash: row.token_hash,
        issued_at: row.issued_at,
        expires_at: row.expires_at,
        is_active: row.is_active,
        revoked_at: row.revoked_at,
        created_at: row.created_at,
    }
}

/// [`TokenStore`] backed by the `subscription_tokens` table.
#[derive(Clone)]
pub struct SeaOrmTokenStore {
    db: DatabaseConnection,
}

impl SeaOrmTokenStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for SeaOrmTokenStore {
    async fn find_active(
        &self,
        user_id: i64,
        subscription_id: i64,
    ) -> Result<Option<TokenRecord>, StoreError> {
        let mut rows = subscription_token::Entity::find()
            .filter(subscription_token::Column::UserId.eq(user_id))
            .filter(subscription_token::Column::SubscriptionId.eq(subscription_id))
            .filter(subscription_token::Column::IsActive.eq(true))
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        if rows.len() > 1 {
            log::error!(
                "{} active token rows for user {} subscription {}",
                rows.len(),
                user_id,
                subscription_id
            );
            return Err(StoreError::Integrity(format!(
                "{} active tokens for user {} subscription {}",
                rows.len(),
                user_id,
                subscription_id
            )));
        }
        Ok(rows.pop().map(to_record))
    }

    async fn insert_active(&self, token: NewToken) -> Result<TokenRecord, StoreError> {
        let model = subscription_token::ActiveModel {
            user_id: Set(token.user_id),
            subscription_id: Set(token.subscription_id),
            token_hash: Set(token.token_hash),
            issued_at: Set(token.issued_at),
            expires_at: Set(token.expires_at),
            is_active: Set(true),
            revoked_at: Set(None),
            created_at: Set(token.issued_at),
            ..Default::default()
        };

        let row = model.insert(&self.db).await.map_err(map_db_err)?;
        Ok(to_record(row))
    }

    async fn revoke_all_active(
        &self,
        user_id: i64,
        subscription_id: i64,
        now: i64,
    ) -> Result<u64, StoreError> {
        let result = subscription_token::Entity::update_many()
            .col_expr(subscription_token::Column::IsActive, Expr::value(false))
            .col_expr(subscription_token::Column::RevokedAt, Expr::value(now))
            .filter(subscription_token::Column::UserId.eq(user_id))
            .filter(subscription_token::Column::SubscriptionId.eq(subscription_id))
            .filter(subscription_token::Column::IsActive.eq(true))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected)
    }

    async fn find_by_hash(
        &self,
        user_id: i64,
        subscription_id: i64,
        token_hash: &str,
        now: i64,
    ) -> Result<Option<TokenRecord>, StoreError> {
        subscription_token::Entity::find()
            .filter(subscription_token::Column::TokenHash.eq(token_hash))
            .filter(subscription_token::Column::UserId.eq(user_id))
            .filter(subscription_token::Column::SubscriptionId.eq(subscription_id))
            .filter(subscription_token::Column::IsActive.eq(true))
            .filter(subscription_token::Column::ExpiresAt.gte(now))
            .one(&self.db)
            .await
            .map(|row| row.map(to_record))
            .map_err(map_db_err)
    }

    async fn latest_issued_at(
        &self,
        user_id: i64,
        subscription_id: i64,
    ) -> Result<Option<i64>, StoreError> {
        subscription_token::Entity::find()
            .filter(subscription_token::Column::UserId.eq(user_id))
            .filter(subscription_token::Column::SubscriptionId.eq(subscription_id))
            .order_by_desc(subscription_token::Column::IssuedAt)
            .one(&self.db)
            .await
            .map(|row| row.map(|r| r.issued_at))
            .map_err(map_db_err)
    }

    async fn revoke_all_for_user(&self, user_id: i64, now: i64) -> Result<u64, StoreError> {
        let result = subscription_token::Entity::update_many()
            .col_expr(subscription_token::Column::IsActive, Expr::value(false))
            .col_expr(subscription_token::Column::RevokedAt, Expr::value(now))
            .filter(subscription_token::Column::UserId.eq(user_id))
            .filter(subscription_token::Column::IsActive.eq(true))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected)
    }

    async fn purge_stale(&self, cutoff: i64) -> Result<u64, StoreError> {
        let result = subscription_token::Entity::delete_many()
            .filter(
                Condition::any()
                    .add(subscription_token::Column::ExpiresAt.lt(cutoff))
                    .add(
                        Condition::all()
                            .add(subscription_token::Column::IsActive.eq(false))
                            .add(subscription_token::Column::RevokedAt.lt(cutoff)),
                    ),
            )
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected)
    }
}

/// [`NodeInventory`] over the `servers`, `edgetunnel_*` and `plan_edgetunnel_groups` tables.
#[derive(Clone)]
pub struct SeaOrmInventory {
    db: DatabaseConnection,
}

impl SeaOrmInventory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NodeInventory for SeaOrmInventory {
    async fn active_servers(&self) -> Result<Vec<StaticServer>, InventoryError> {
        let rows = server::Entity::find()
            .filter(server::Column::IsActive.eq(true))
            .order_by_asc(server::Column::SortOrder)
            .all(&self.db)
            .await
            .map_err(map_inventory_err)?;

        Ok(rows
            .into_iter()
            .map(|s| StaticServer {
                id: s.id,
                name: s.name,
                host: s.host,
                port: s.port,
                protocol: s.protocol,
                credentials: NodeCredentials {
                    method: s.method,
                    password: s.password,
                    uuid: s.uuid,
                    path: s.path,
                },
                country: s.country,
                city: s.city,
                flag_emoji: s.flag_emoji,
                is_active: s.is_active,
                sort_order: s.sort_order,
            })
            .collect())
    }

    async fn entitled_group_ids(&self, plan_id: i64) -> Result<Vec<i64>, InventoryError> {
        let rows = plan_edgetunnel_group::Entity::find()
            .filter(plan_edgetunnel_group::Column::PlanId.eq(plan_id))
            .all(&self.db)
            .await
            .map_err(map_inventory_err)?;

        Ok(rows.into_iter().map(|r| r.group_id).collect())
    }

    async fn groups(&self, ids: &[i64]) -> Result<Vec<NodeGroup>, InventoryError> {
        let rows = edgetunnel_group::Entity::find()
            .filter(edgetunnel_group::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await
            .map_err(map_inventory_err)?;

        Ok(rows
            .into_iter()
            .map(|g| NodeGroup {
                id: g.id,
                name: g.name,
                is_active: g.is_active,
            })
            .collect())
    }

    async fn active_grouped_nodes(&self, group_ids: &[i64]) -> Result<Vec<GroupedNode>, InventoryError> {
        let rows = edgetunnel_node::Entity::find()
            .filter(edgetunnel_node::Column::GroupId.is_in(group_ids.iter().copied()))
            .filter(edgetunnel_node::Column::IsActive.eq(true))
            .order_by_asc(edgetunnel_node::Column::SortOrder)
            .all(&self.db)
            .await
            .map_err(map_inventory_err)?;

        Ok(rows
            .into_iter()
            .map(|n| GroupedNode {
                id: n.id,
                group_id: n.group_id,
                name: n.name,
                host: n.host,
                port: n.port,
                protocol: n.protocol,
                credentials: NodeCredentials {
                    method: None,
                    password: None,
                    uuid: n.uuid,
                    path: n.path,
                },
                country: n.country,
                city: n.city,
                flag_emoji: n.flag_emoji,
                is_active: n.is_active,
                sort_order: n.sort_order,
            })
            .collect())
    }
}

fn to_subscription_info(
    (sub, plan): (user_subscription::Model, Option<plan::Model>),
) -> SubscriptionInfo {
    SubscriptionInfo {
        id: sub.id,
        user_id: sub.user_id,
        plan_id: sub.plan_id,
        plan_name: plan.map(|p| p.name).unwrap_or_default(),
        end_date: sub.end_date,
    }
}

/// The user's active subscription with the furthest end date.
pub async fn latest_active_subscription(
    db: &DatabaseConnection,
    user_id: i64,
    now: i64,
) -> Result<Option<SubscriptionInfo>, DbErr> {
    let row = user_subscription::Entity::find()
        .filter(user_subscription::Column::UserId.eq(user_id))
        .filter(user_subscription::Column::Status.eq(user_subscription::STATUS_ACTIVE))
        .filter(user_subscription::Column::EndDate.gt(now))
        .order_by_desc(user_subscription::Column::EndDate)
        .order_by_desc(user_subscription::Column::Id)
        .find_also_related(plan::Entity)
        .one(db)
        .await?;

    Ok(row.map(to_subscription_info))
}

/// A specific subscription, only if it belongs to `user_id` and is still active.
pub async fn active_subscription(
    db: &DatabaseConnection,
    user_id: i64,
    subscription_id: i64,
    now: i64,
) -> Result<Option<SubscriptionInfo>, DbErr> {
    let row = user_subscription::Entity::find_by_id(subscription_id)
        .filter(user_subscription::Column::UserId.eq(user_id))
        .filter(user_subscription::Column::Status.eq(user_subscription::STATUS_ACTIVE))
        .filter(user_subscription::Column::EndDate.gt(now))
        .find_also_related(plan::Entity)
        .one(db)
        .await?;

    Ok(row.map(to_subscription_info))
}
