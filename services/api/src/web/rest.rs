//! services/api/src/web/rest.rs
//!
//! Assembles the REST router with its middleware stack and holds the master
//! definition for the OpenAPI specification.

use crate::web::{
    auth::{self, LoginRequest, LoginResponse, MessageResponse},
    home_news,
    middleware::{
        not_found, rate_limit, render_errors, request_timeout, require_auth, response_time,
        AUTH_HEADER,
    },
    shared_news::{self, CommentRequest},
    state::AppState,
    users::{self, ProfileUpdate, RegisterRequest},
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::warn;
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

/// Request bodies larger than this are rejected.
pub const MAX_BODY_BYTES: usize = 100 * 1024;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login_handler,
        auth::logout_handler,
        users::register_handler,
        users::get_user_handler,
        users::update_user_handler,
        users::delete_user_handler,
        users::add_saved_story_handler,
        users::remove_saved_story_handler,
        shared_news::list_shared_handler,
        shared_news::share_story_handler,
        shared_news::delete_shared_handler,
        shared_news::add_comment_handler,
        home_news::home_news_handler,
    ),
    components(
        schemas(LoginRequest, LoginResponse, MessageResponse, RegisterRequest, ProfileUpdate, CommentRequest)
    ),
    modifiers(&SessionTokenAddon),
    tags(
        (name = "sessions", description = "Login and logout."),
        (name = "users", description = "Accounts, filters and saved stories."),
        (name = "sharedNews", description = "The shared story feed and its comments."),
        (name = "homeNews", description = "Stories for the public home page.")
    )
)]
pub struct ApiDoc;

/// Registers the `x-auth` header scheme referenced by protected paths.
struct SessionTokenAddon;

impl Modify for SessionTokenAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                AUTH_HEADER,
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(AUTH_HEADER))),
            );
        }
    }
}

//=========================================================================================
// Router
//=========================================================================================

/// Builds the API router. Layers listed later wrap the ones listed earlier.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let config = app_state.config.clone();

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/sessions", post(auth::login_handler))
        .route("/api/users", post(users::register_handler))
        .route("/api/homenews", get(home_news::home_news_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/sessions/{id}", delete(auth::logout_handler))
        .route(
            "/api/users/{id}",
            get(users::get_user_handler)
                .put(users::update_user_handler)
                .delete(users::delete_user_handler),
        )
        .route("/api/users/{id}/savedstories", post(users::add_saved_story_handler))
        .route(
            "/api/users/{id}/savedstories/{sid}",
            delete(users::remove_saved_story_handler),
        )
        .route(
            "/api/sharednews",
            get(shared_news::list_shared_handler).post(shared_news::share_story_handler),
        )
        .route("/api/sharednews/{sid}", delete(shared_news::delete_shared_handler))
        .route("/api/sharednews/{sid}/comments", post(shared_news::add_comment_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::HeaderName::from_static(AUTH_HEADER)]);
    match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => warn!("Ignoring invalid CORS_ORIGIN '{}'", config.cors_origin),
    }

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), rate_limit))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), request_timeout))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), render_errors))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'self'"),
        ))
        .layer(axum_middleware::from_fn(response_time))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
