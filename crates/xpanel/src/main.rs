use clap::Parser;
use migration::MigratorTrait;
use sea_orm::Database;
use xpanel_core::TokenManager;
use xpanel_lib::{
    config::{Command, Config},
    db::SeaOrmTokenStore,
    server::run_server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let config = Config::parse();

    // Initialize logger based on command
    let log_level = match &config.command {
        Command::Serve(serve_config) => serve_config.log_level.as_str(),
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match config.command {
        Command::Serve(serve_config) => {
            run_server(serve_config).await?;
        }
        Command::Migrate { database_url } => {
            run_migrations(&database_url).await?;
        }
        Command::CleanupTokens {
            database_url,
            retention_days,
        } => {
            cleanup_tokens(&database_url, retention_days).await?;
        }
        Command::RevokeTokens {
            database_url,
            user_id,
            subscription_id,
        } => {
            revoke_tokens(&database_url, user_id, subscription_id).await?;
        }
    }

    Ok(())
}

async fn run_migrations(database_url: &str) -> anyhow::Result<()> {
    log::info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    log::info!("Running database migrations...");
    migration::Migrator::up(&db, None).await?;

    println!("✅ Database migrations completed successfully!");

    Ok(())
}

/// Maintenance commands never sign anything, so the manager gets no secret.
async fn token_manager(database_url: &str) -> anyhow::Result<TokenManager<SeaOrmTokenStore>> {
    let db = Database::connect(database_url).await?;
    Ok(TokenManager::new(SeaOrmTokenStore::new(db), String::new()))
}

async fn cleanup_tokens(database_url: &str, retention_days: i64) -> anyhow::Result<()> {
    if retention_days < 0 {
        anyhow::bail!("--retention-days must not be negative");
    }
    let manager = token_manager(database_url).await?;
    let purged = manager.cleanup(retention_days).await?;

    println!("✅ Purged {} stale subscription token row(s)", purged);

    Ok(())
}

async fn revoke_tokens(
    database_url: &str,
    user_id: i64,
    subscription_id: Option<i64>,
) -> anyhow::Result<()> {
    let manager = token_manager(database_url).await?;
    let revoked = manager.revoke(user_id, subscription_id).await?;

    match subscription_id {
        Some(id) => println!(
            "✅ Revoked {} token(s) for user {} subscription {}",
            revoked, user_id, id
        ),
        None => println!("✅ Revoked {} token(s) for user {}", revoked, user_id),
    }

    Ok(())
}
