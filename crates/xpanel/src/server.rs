use crate::{app_state::AppState, config::ServeConfig, handlers};
use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use migration::MigratorTrait;
use sea_orm::Database;

pub async fn run_server(config: ServeConfig) -> anyhow::Result<()> {
    log::info!("Starting xpanel subscription server...");
    config.validate()?;

    // 1. Connect to database
    log::info!("Connecting to database: {}", config.database_url);
    let db = Database::connect(&config.database_url).await?;

    // Run migrations
    log::info!("Running database migrations...");
    migration::Migrator::up(&db, None).await?;
    log::info!("Database migrations completed");

    // 2. Create AppState
    let app_state = web::Data::new(AppState::new(db, &config));
    log::info!(
        "Subscription links will be issued under {} (max token lifetime {} days)",
        app_state.base_url,
        app_state.token_max_lifetime_days
    );

    // 3. Start HTTP server
    let bind_address = config.bind_address.clone();
    let cors_origins = config.cors_origin_list();
    log::info!("Listening on {}", bind_address);

    HttpServer::new(move || {
        // Configure CORS
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        // Add all configured origins
        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .configure(routes)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}

/// Every HTTP route the server exposes.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route(
                "/user/subscription-links",
                web::get().to(handlers::get_subscription_links),
            )
            .route(
                "/user/subscription-token/refresh",
                web::post().to(handlers::refresh_subscription_token),
            ),
    )
    .route("/api/health", web::get().to(handlers::health))
    .route(
        "/api/subscription/{format}/{token}",
        web::get().to(handlers::get_subscription_content),
    );
}
