//! Bearer token authentication

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::api::AppState;
use crate::api::error::ApiError;

/// Reject requests without the configured bearer token. A no-op when no
/// token is configured.
pub async fn require_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.auth_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if tokens_match(token, expected) => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!("Rejected bad token for {} {}", req.method(), req.uri().path());
            Err(ApiError::Unauthorized)
        }
        None => Err(ApiError::Unauthorized),
    }
}

/// Comparison whose running time does not depend on where the inputs differ.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{TOKEN, app};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abd", "abc"));
        assert!(!tokens_match("ab", "abc"));
    }

    #[tokio::test]
    async fn test_missing_or_wrong_token_rejected() {
        let (_, app) = app(Some(TOKEN));

        let missing = app
            .clone()
            .oneshot(Request::get("/workloads/et-x-0").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .oneshot(
                Request::get("/workloads/et-x-0")
                    .header(header::AUTHORIZATION, "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_no_token_configured_allows_all() {
        let (_, app) = app(None);
        let response = app
            .oneshot(Request::get("/workloads/et-x-0").body(Body::empty()).unwrap())
            .await
            .unwrap();
        // Past auth, the workload just does not exist.
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
