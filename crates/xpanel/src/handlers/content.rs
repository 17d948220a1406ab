use actix_web::{http::header, web, HttpResponse, Responder};
use chrono::Utc;
use xpanel_core::models::ErrorResponse;
use xpanel_core::nodes::aggregate;
use xpanel_core::render::render;
use xpanel_core::ClientFormat;

use crate::{
    app_state::AppState,
    db,
    handlers::{database_error, token_error_response},
};

/// GET /api/subscription/{format}/{token}
/// Serves the client configuration a subscription link points at
pub async fn get_subscription_content(
    app_state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (format, token) = path.into_inner();

    let format: ClientFormat = match format.parse() {
        Ok(f) => f,
        Err(e) => {
            log::warn!("{}", e);
            return HttpResponse::NotFound().json(ErrorResponse::new(
                "unsupported_format",
                "Unsupported subscription format",
            ));
        }
    };

    let now = Utc::now().timestamp();

    // Every rejection kind gets the same response body; the manager logs which one it was.
    let claims = match app_state.tokens.validate_at(&token, now).await {
        Ok(claims) => claims,
        Err(e) => return token_error_response(&e),
    };

    let subscription = match db::active_subscription(
        &app_state.db,
        claims.user_id,
        claims.subscription_id,
        now,
    )
    .await
    {
        Ok(Some(s)) => s,
        Ok(None) => {
            log::warn!(
                "Subscription {} of user {} is no longer active",
                claims.subscription_id,
                claims.user_id
            );
            return HttpResponse::Forbidden().json(ErrorResponse::new(
                "subscription_expired",
                "Subscription has expired",
            ));
        }
        Err(e) => return database_error("subscription lookup", e),
    };

    let nodes = match aggregate(&app_state.inventory, &subscription).await {
        Ok(nodes) => nodes,
        Err(e) => return database_error("node aggregation", e),
    };

    match render(format, &nodes, &subscription, now) {
        Ok(rendered) => {
            log::info!(
                "Served {} config with {} node(s) for subscription {}",
                format,
                nodes.len(),
                subscription.id
            );
            HttpResponse::Ok()
                .content_type(format!("{}; charset=utf-8", rendered.content_type))
                .insert_header((
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", rendered.filename),
                ))
                .insert_header((header::CACHE_CONTROL, "no-store"))
                .body(rendered.content)
        }
        Err(e) => {
            log::error!("Failed to render {} config: {}", format, e);
            HttpResponse::InternalServerError().json(ErrorResponse::new(
                "internal_error",
                "Failed to render subscription",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServeConfig;
    use crate::db::tests::{seed, setup};
    use actix_web::{test, App};
    use entity::user_subscription;
    use sea_orm::{ActiveModelTrait, Set};

    const SECRET: &str = "content-test-secret-0123";

    async fn app_state() -> web::Data<AppState> {
        let db = setup().await;
        seed(&db).await;
        let now = Utc::now().timestamp();
        user_subscription::ActiveModel {
            id: Set(1),
            end_date: Set(now + 60 * 86_400),
            ..Default::default()
        }
        .update(&db)
        .await
        .unwrap();

        let config = ServeConfig {
            database_url: "sqlite::memory:".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            jwt_secret: SECRET.to_string(),
            base_url: "https://panel.example.com".to_string(),
            token_max_lifetime_days: 30,
            token_warning_days: 7,
            cors_origins: String::new(),
            log_level: "info".to_string(),
        };
        web::Data::new(AppState::new(db, &config))
    }

    async fn issue(app_state: &AppState) -> String {
        let now = Utc::now().timestamp();
        app_state
            .tokens
            .get_or_create_token_at(7, 1, now + 60 * 86_400, 30, now)
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn test_valid_token_serves_clash_yaml() {
        let app_state = app_state().await;
        let token = issue(&app_state).await;
        let app = test::init_service(App::new().app_data(app_state).route(
            "/api/subscription/{format}/{token}",
            web::get().to(get_subscription_content),
        ))
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/subscription/clash/{token}"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        let disposition = resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert_eq!(disposition, "attachment; filename=\"Pro-clash.yaml\"");

        let body = test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("US - us-1"));
    }

    #[actix_web::test]
    async fn test_rejections_share_one_response() {
        let app_state = app_state().await;
        let token = issue(&app_state).await;
        let now = Utc::now().timestamp();
        let rotated = app_state
            .tokens
            .rotate_token_at(7, 1, now + 60 * 86_400, 30, now)
            .await
            .unwrap();
        assert_ne!(rotated, token);

        let app = test::init_service(App::new().app_data(app_state).route(
            "/api/subscription/{format}/{token}",
            web::get().to(get_subscription_content),
        ))
        .await;

        let mut bodies = Vec::new();
        for bad in [token.as_str(), "not-a-jwt", &format!("{rotated}x")] {
            let resp = test::call_service(
                &app,
                test::TestRequest::get()
                    .uri(&format!("/api/subscription/v2ray/{bad}"))
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), 401, "{bad}");
            bodies.push(test::read_body(resp).await);
        }
        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    }

    #[actix_web::test]
    async fn test_unknown_format_is_not_found() {
        let app_state = app_state().await;
        let token = issue(&app_state).await;
        let app = test::init_service(App::new().app_data(app_state).route(
            "/api/subscription/{format}/{token}",
            web::get().to(get_subscription_content),
        ))
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/subscription/wireguard/{token}"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);
    }
}
