pub mod content;
pub mod subscription;

pub use content::get_subscription_content;
pub use subscription::{get_subscription_links, refresh_subscription_token};

use actix_web::{http::header, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use xpanel_core::codec;
use xpanel_core::models::ErrorResponse;
use xpanel_core::TokenError;

use crate::app_state::AppState;

/// GET /api/health
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Session token from `Authorization: Bearer ...`, falling back to the `access_token` cookie.
pub fn get_session_token(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| req.cookie("access_token").map(|c| c.value().to_string()))
}

/// Resolves the authenticated user id, or the 401 response to send back.
pub fn authenticate(app_state: &AppState, req: &HttpRequest) -> Result<i64, HttpResponse> {
    let Some(token) = get_session_token(req) else {
        return Err(HttpResponse::Unauthorized().json(ErrorResponse::new(
            "unauthorized",
            "Not authenticated",
        )));
    };

    codec::verify_session_token(&token, &app_state.jwt_secret, Utc::now().timestamp()).map_err(|e| {
        log::warn!("Session token rejected ({})", e.code());
        HttpResponse::Unauthorized().json(ErrorResponse::new("invalid_token", "Invalid or expired session"))
    })
}

/// Maps a lifecycle failure that is not a bearer rejection to its HTTP response.
pub fn token_error_response(e: &TokenError) -> HttpResponse {
    match e {
        TokenError::SubscriptionExpired => HttpResponse::Forbidden().json(ErrorResponse::new(
            e.code(),
            "Subscription has expired",
        )),
        TokenError::Transient => HttpResponse::ServiceUnavailable().json(ErrorResponse::new(
            e.code(),
            "Subscription token is being issued, please retry",
        )),
        TokenError::Store(_) | TokenError::Signing(_) => {
            log::error!("Subscription token failure: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new(
                "internal_error",
                "Subscription token could not be issued",
            ))
        }
        _ => HttpResponse::Unauthorized().json(ErrorResponse::new(
            "unauthorized",
            "Invalid or expired subscription link",
        )),
    }
}

pub(crate) fn database_error(context: &str, e: impl std::fmt::Display) -> HttpResponse {
    log::error!("Database error ({}): {}", context, e);
    HttpResponse::InternalServerError().json(ErrorResponse::new(
        "internal_error",
        "Database error occurred",
    ))
}
