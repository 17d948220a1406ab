use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Guards the one-active-token-per-subscription invariant. Portable across SQLite and Postgres.
const UNIQUE_ACTIVE_TOKEN_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS uidx_subscription_tokens_active \
     ON subscription_tokens (user_id, subscription_id, is_active) WHERE is_active";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create plans table
        manager
            .create_table(
                Table::create()
                    .table(Plans::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Plans::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Plans::Name).string().not_null())
                    .col(
                        ColumnDef::new(Plans::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Plans::CreatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        // Create user_subscriptions table
        manager
            .create_table(
                Table::create()
                    .table(UserSubscriptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserSubscriptions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserSubscriptions::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserSubscriptions::PlanId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserSubscriptions::Status)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(UserSubscriptions::StartDate)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserSubscriptions::EndDate)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserSubscriptions::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_subscriptions_plan_id")
                            .from(UserSubscriptions::Table, UserSubscriptions::PlanId)
                            .to(Plans::Table, Plans::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_subscriptions_user_id")
                    .table(UserSubscriptions::Table)
                    .col(UserSubscriptions::UserId)
                    .to_owned(),
            )
            .await?;

        // Create subscription_tokens table
        manager
            .create_table(
                Table::create()
                    .table(SubscriptionTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SubscriptionTokens::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionTokens::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionTokens::SubscriptionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionTokens::TokenHash)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionTokens::IssuedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionTokens::ExpiresAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionTokens::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(SubscriptionTokens::RevokedAt).big_integer())
                    .col(
                        ColumnDef::new(SubscriptionTokens::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_tokens_subscription_id")
                            .from(SubscriptionTokens::Table, SubscriptionTokens::SubscriptionId)
                            .to(UserSubscriptions::Table, UserSubscriptions::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_subscription_tokens_user_id", SubscriptionTokens::UserId),
            (
                "idx_subscription_tokens_subscription_id",
                SubscriptionTokens::SubscriptionId,
            ),
            ("idx_subscription_tokens_token_hash", SubscriptionTokens::TokenHash),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(SubscriptionTokens::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        // sea-query has no partial index builder
        manager
            .get_connection()
            .execute_unprepared(UNIQUE_ACTIVE_TOKEN_INDEX)
            .await?;

        // Create servers table (static pool)
        manager
            .create_table(
                Table::create()
                    .table(Servers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Servers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Servers::Name).string().not_null())
                    .col(ColumnDef::new(Servers::Host).string().not_null())
                    .col(ColumnDef::new(Servers::Port).integer().not_null())
                    .col(ColumnDef::new(Servers::Protocol).string().not_null())
                    .col(ColumnDef::new(Servers::Method).string())
                    .col(ColumnDef::new(Servers::Password).string())
                    .col(ColumnDef::new(Servers::Uuid).string())
                    .col(ColumnDef::new(Servers::Path).string())
                    .col(
                        ColumnDef::new(Servers::Country)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Servers::City).string().not_null().default(""))
                    .col(
                        ColumnDef::new(Servers::FlagEmoji)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Servers::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Servers::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        // Create edgetunnel_groups table
        manager
            .create_table(
                Table::create()
                    .table(EdgetunnelGroups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EdgetunnelGroups::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EdgetunnelGroups::Name).string().not_null())
                    .col(ColumnDef::new(EdgetunnelGroups::Description).string())
                    .col(
                        ColumnDef::new(EdgetunnelGroups::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(EdgetunnelGroups::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Create edgetunnel_nodes table
        manager
            .create_table(
                Table::create()
                    .table(EdgetunnelNodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EdgetunnelNodes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EdgetunnelNodes::GroupId).big_integer())
                    .col(ColumnDef::new(EdgetunnelNodes::Name).string().not_null())
                    .col(ColumnDef::new(EdgetunnelNodes::Host).string().not_null())
                    .col(ColumnDef::new(EdgetunnelNodes::Port).integer().not_null())
                    .col(
                        ColumnDef::new(EdgetunnelNodes::Protocol)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(EdgetunnelNodes::Uuid).string())
                    .col(ColumnDef::new(EdgetunnelNodes::Path).string())
                    .col(
                        ColumnDef::new(EdgetunnelNodes::Country)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(EdgetunnelNodes::City)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(EdgetunnelNodes::FlagEmoji)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(EdgetunnelNodes::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(EdgetunnelNodes::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_edgetunnel_nodes_group_id")
                            .from(EdgetunnelNodes::Table, EdgetunnelNodes::GroupId)
                            .to(EdgetunnelGroups::Table, EdgetunnelGroups::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_edgetunnel_nodes_group_id")
                    .table(EdgetunnelNodes::Table)
                    .col(EdgetunnelNodes::GroupId)
                    .to_owned(),
            )
            .await?;

        // Create plan_edgetunnel_groups table (plan → group entitlement)
        manager
            .create_table(
                Table::create()
                    .table(PlanEdgetunnelGroups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlanEdgetunnelGroups::PlanId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlanEdgetunnelGroups::GroupId)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(PlanEdgetunnelGroups::PlanId)
                            .col(PlanEdgetunnelGroups::GroupId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_plan_edgetunnel_groups_plan_id")
                            .from(PlanEdgetunnelGroups::Table, PlanEdgetunnelGroups::PlanId)
                            .to(Plans::Table, Plans::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_plan_edgetunnel_groups_group_id")
                            .from(PlanEdgetunnelGroups::Table, PlanEdgetunnelGroups::GroupId)
                            .to(EdgetunnelGroups::Table, EdgetunnelGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order (due to foreign keys)
        manager
            .drop_table(Table::drop().table(PlanEdgetunnelGroups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EdgetunnelNodes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EdgetunnelGroups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Servers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SubscriptionTokens::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserSubscriptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Plans::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Plans {
    Table,
    Id,
    Name,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UserSubscriptions {
    Table,
    Id,
    UserId,
    PlanId,
    Status,
    StartDate,
    EndDate,
    CreatedAt,
}

#[derive(DeriveIden, Clone, Copy)]
enum SubscriptionTokens {
    Table,
    Id,
    UserId,
    SubscriptionId,
    TokenHash,
    IssuedAt,
    ExpiresAt,
    IsActive,
    RevokedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Servers {
    Table,
    Id,
    Name,
    Host,
    Port,
    Protocol,
    Method,
    Password,
    Uuid,
    Path,
    Country,
    City,
    FlagEmoji,
    IsActive,
    SortOrder,
}

#[derive(DeriveIden)]
enum EdgetunnelGroups {
    Table,
    Id,
    Name,
    Description,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum EdgetunnelNodes {
    Table,
    Id,
    GroupId,
    Name,
    Host,
    Port,
    Protocol,
    Uuid,
    Path,
    Country,
    City,
    FlagEmoji,
    IsActive,
    SortOrder,
}

#[derive(DeriveIden)]
enum PlanEdgetunnelGroups {
    Table,
    PlanId,
    GroupId,
}
