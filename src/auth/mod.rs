//! Authentication and request scoping.
//!
//! The service key is a PSK compared in constant time. The caller's identity and
//! the tree being edited arrive as headers set by the authenticated gateway.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::TreeContext;

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying the tree's partition key.
pub const PARTITION_KEY_HEADER: &str = "x-partition-key";
/// Header carrying the authenticated caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all requests (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = header_str(request.headers(), API_KEY_HEADER).or_else(|| {
        header_str(request.headers(), header::AUTHORIZATION.as_str())
            .and_then(|s| s.strip_prefix("Bearer "))
    })
    .map(|s| s.to_string());

    match provided {
        Some(key) if constant_time_compare(&key, &expected) => next.run(request).await,
        Some(_) => AppError::Unauthorized("Invalid API key".to_string()).into_response(),
        None => AppError::Unauthorized("Missing or invalid API key".to_string()).into_response(),
    }
}

/// The tree scope and identity of a lock request.
#[derive(Debug, Clone)]
pub struct TreeCaller(pub TreeContext);

impl<S> FromRequestParts<S> for TreeCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tree_id = header_str(&parts.headers, PARTITION_KEY_HEADER)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Partition key required for editor lock".into()))?;

        let user_id = header_str(&parts.headers, USER_ID_HEADER)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::Unauthorized("Caller identity required".into()))?;

        Ok(TreeCaller(TreeContext::new(tree_id, user_id)))
    }
}

fn header_str<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare("short", "much-longer-key"));
    }

    #[tokio::test]
    async fn test_tree_caller_reads_scope_headers() {
        let (mut parts, _) = HttpRequest::builder()
            .header(PARTITION_KEY_HEADER, "T1")
            .header(USER_ID_HEADER, "alice")
            .body(())
            .unwrap()
            .into_parts();

        let TreeCaller(ctx) = TreeCaller::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(ctx, TreeContext::new("T1", "alice"));
    }

    #[tokio::test]
    async fn test_tree_caller_requires_partition_key() {
        let (mut parts, _) = HttpRequest::builder()
            .header(USER_ID_HEADER, "alice")
            .body(())
            .unwrap()
            .into_parts();

        let err = TreeCaller::from_request_parts(&mut parts, &()).await.unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_tree_caller_requires_identity() {
        let (mut parts, _) = HttpRequest::builder()
            .header(PARTITION_KEY_HEADER, "T1")
            .header(USER_ID_HEADER, "  ")
            .body(())
            .unwrap()
            .into_parts();

        let err = TreeCaller::from_request_parts(&mut parts, &()).await.unwrap_err();

        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
