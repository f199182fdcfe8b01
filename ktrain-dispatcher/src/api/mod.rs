//! API Module
//!
//! HTTP surface of the dispatcher. Handlers translate between DTOs and the
//! dispatcher service; they hold no state of their own.

pub mod auth;
pub mod error;
pub mod health;
pub mod training;
pub mod workload;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::service::Dispatcher;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// Bearer token required on protected routes, if any
    pub auth_token: Option<Arc<str>>,
    /// Fires on shutdown so long waits return early
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        auth_token: Option<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            dispatcher,
            auth_token: auth_token.map(Arc::from),
            shutdown,
        }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/train", post(training::submit_training))
        .route("/workloads/{id}", get(workload::get_workload))
        .route("/workloads/{id}/wait", get(workload::wait_workload))
        .route("/workloads/{id}/cancel", post(workload::cancel_workload))
        .route("/workloads/{id}/logs", get(workload::get_logs))
        .route("/workloads/{id}/result", get(workload::get_result))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode, header};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::cluster::InMemoryCluster;
    use crate::manifest::ManifestBuilder;
    use crate::manifest::tests::settings;
    use crate::service::dispatcher::ReusePolicy;

    pub(crate) const TOKEN: &str = "s3cr3t";

    pub(crate) fn app(auth_token: Option<&str>) -> (Arc<InMemoryCluster>, Router) {
        let cluster = Arc::new(InMemoryCluster::default());
        let dispatcher = Dispatcher::new(
            cluster.clone(),
            ManifestBuilder::new(settings()),
            ReusePolicy::default(),
            Duration::from_millis(5),
        );
        let state = AppState::new(
            Arc::new(dispatcher),
            auth_token.map(str::to_string),
            CancellationToken::new(),
        );
        (cluster, create_router(state))
    }

    pub(crate) fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    pub(crate) async fn json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let (_, app) = app(Some(TOKEN));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (_, app) = app(None);
        let response = app
            .oneshot(request("GET", "/jobs", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
