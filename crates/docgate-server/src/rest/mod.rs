mod handlers;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post, put};

use docgate_storage::Backend;

use crate::config::AppConfig;
use crate::envelope::Envelope;
use crate::identity::{JwtIdentityResolver, TokenIssuer};
use crate::metrics::{Metrics, metrics_handler};
use crate::middleware::credential_middleware;
use crate::rate_limit::UserRateLimiter;
use crate::recorder::AuditRecorder;

const MAX_REQUEST_BODY_SIZE: usize = 4 * 1024 * 1024; // 4 MB

pub struct AppState<B: Backend> {
    pub envelope: Arc<Envelope<B, JwtIdentityResolver>>,
    pub issuer: Arc<TokenIssuer>,
    pub policies: Arc<[String]>,
    pub limiter: Option<Arc<UserRateLimiter>>,
    pub metrics: Arc<Metrics>,
}

impl<B: Backend> AppState<B> {
    pub fn new(backend: Arc<B>, config: &AppConfig, metrics: Arc<Metrics>) -> Self {
        let recorder = AuditRecorder::new(
            config.auth.token_path.clone(),
            config.audit_persist_timeout(),
            Arc::clone(&metrics),
        );
        let resolver = JwtIdentityResolver::new(&config.auth.secret);
        let envelope = Envelope::new(backend, resolver, recorder, Arc::clone(&metrics));

        Self {
            envelope: Arc::new(envelope),
            issuer: Arc::new(TokenIssuer::new(
                &config.auth.secret,
                config.auth.token_ttl_secs,
            )),
            policies: config.accounts.policies.iter().cloned().collect(),
            limiter: UserRateLimiter::from_config(&config.rate_limit).map(Arc::new),
            metrics,
        }
    }
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            envelope: self.envelope.clone(),
            issuer: self.issuer.clone(),
            policies: self.policies.clone(),
            limiter: self.limiter.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

async fn metrics_middleware<B: Backend>(
    State(state): State<AppState<B>>,
    request: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> Response {
    state.metrics.record_request();

    let response = next.run(request).await;

    if response.status().is_success() {
        state.metrics.record_success();
    } else {
        state.metrics.record_error();
    }

    response
}

pub fn create_router<B: Backend>(state: AppState<B>) -> Router {
    let token_path = state.envelope.token_path().to_string();
    let metrics = state.metrics.clone();

    Router::new()
        .route("/api/data/{action}", post(handlers::data_operation))
        .route(&token_path, post(handlers::issue_token))
        .route("/api/users/me", get(handlers::whoami))
        .route("/api/users", post(handlers::create_user))
        .route(
            "/api/users/{user_id}",
            put(handlers::update_user).delete(handlers::delete_user),
        )
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(metrics_handler).with_state(metrics))
        .layer(middleware::from_fn(credential_middleware))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .with_state(state)
}
