use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use xpanel_core::codec;
use xpanel_core::models::{ErrorResponse, SubscriptionInfo, SubscriptionLinksResponse};
use xpanel_core::nodes::{aggregate, NodeStats};
use xpanel_core::{SubscriptionLinks, TokenError};

use crate::{
    app_state::AppState,
    db,
    handlers::{authenticate, database_error, token_error_response},
};

#[derive(Clone, Copy)]
enum Issue {
    Reuse,
    Rotate,
}

/// GET /api/v1/user/subscription-links
/// Returns the node list and one link per client format for the user's active subscription
pub async fn get_subscription_links(
    app_state: web::Data<AppState>,
    req: HttpRequest,
) -> impl Responder {
    links_for_user(&app_state, &req, Issue::Reuse).await
}

/// POST /api/v1/user/subscription-token/refresh
/// Rotates the subscription token; every previously handed out link stops working
pub async fn refresh_subscription_token(
    app_state: web::Data<AppState>,
    req: HttpRequest,
) -> impl Responder {
    links_for_user(&app_state, &req, Issue::Rotate).await
}

async fn links_for_user(app_state: &AppState, req: &HttpRequest, issue: Issue) -> HttpResponse {
    let user_id = match authenticate(app_state, req) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let now = Utc::now().timestamp();

    let subscription = match db::latest_active_subscription(&app_state.db, user_id, now).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            return HttpResponse::NotFound().json(ErrorResponse::new(
                "no_active_subscription",
                "No active subscription",
            ));
        }
        Err(e) => return database_error("subscription lookup", e),
    };

    let issued = match issue {
        Issue::Reuse => {
            app_state
                .tokens
                .get_or_create_token_at(
                    user_id,
                    subscription.id,
                    subscription.end_date,
                    app_state.token_max_lifetime_days,
                    now,
                )
                .await
        }
        Issue::Rotate => {
            app_state
                .tokens
                .rotate_token_at(
                    user_id,
                    subscription.id,
                    subscription.end_date,
                    app_state.token_max_lifetime_days,
                    now,
                )
                .await
        }
    };
    let token = match issued {
        Ok(token) => token,
        Err(e) => return token_error_response(&e),
    };

    match build_response(app_state, subscription, &token, now).await {
        Ok(body) => HttpResponse::Ok().json(body),
        Err(response) => response,
    }
}

async fn build_response(
    app_state: &AppState,
    subscription: SubscriptionInfo,
    token: &str,
    now: i64,
) -> Result<SubscriptionLinksResponse, HttpResponse> {
    let claims = codec::decode_at(token, &app_state.jwt_secret, now).map_err(|e| {
        log::error!("Freshly issued token failed to decode: {}", e);
        token_error_response(&TokenError::Signing(e.to_string()))
    })?;

    let nodes = aggregate(&app_state.inventory, &subscription)
        .await
        .map_err(|e| database_error("node aggregation", e))?;

    let links = SubscriptionLinks::build(&app_state.base_url, token);

    Ok(SubscriptionLinksResponse {
        node_stats: NodeStats::of(&nodes),
        nodes,
        links: links.links().to_vec(),
        expires_at: claims.exp,
        expiring_soon: claims.is_expiring_soon(now, app_state.token_warning_days),
        subscription,
    })
}
