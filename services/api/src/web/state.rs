//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::middleware::RateLimiter;
use crate::web::token::TokenCodec;
use newswatcher_core::ports::{DatabaseService, NotificationService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub notifier: Arc<dyn NotificationService>,
    pub tokens: Arc<TokenCodec>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the token codec and rate limiter from `config`.
    pub fn new(
        db: Arc<dyn DatabaseService>,
        notifier: Arc<dyn NotificationService>,
        config: Arc<Config>,
    ) -> Self {
        let tokens = Arc::new(TokenCodec::new(&config.jwt_secret, config.token_ttl));
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_per_window,
            config.rate_limit_window,
        ));
        Self {
            db,
            notifier,
            tokens,
            rate_limiter,
            config,
        }
    }
}
