//! Fixed-window request limiter for the authentication routes, backed by Redis.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

/// Counter key for a caller. `X-Forwarded-For` is only read when the service
/// sits behind a trusted proxy; otherwise the socket peer decides.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .filter(|_| trust_proxy)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let ip = match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    };
    format!("ratelimit:auth:{ip}")
}

/// Increments the caller's counter and returns the count within the current window.
async fn hit(state: &AppState, key: &str) -> Result<u64, redis::RedisError> {
    let mut conn = state.redis.get_multiplexed_async_connection().await?;
    let count: u64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
    if count == 1 {
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(state.config.rate_limit_window_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
    }
    Ok(count)
}

pub async fn limit_auth_requests(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(
        request.headers(),
        connect_info.map(|ConnectInfo(addr)| addr),
        state.config.trust_proxy,
    );
    match hit(&state, &key).await {
        Ok(count) if count > u64::from(state.config.rate_limit_max_requests) => {
            return AppError::TooManyRequests.into_response();
        }
        Ok(_) => {}
        Err(e) => warn!("Rate limiter unavailable, allowing request: {e}"),
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_forwarded_header_used_behind_trusted_proxy() {
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(
            client_key(&forwarded("203.0.113.7, 10.0.0.1"), Some(peer), true),
            "ratelimit:auth:203.0.113.7"
        );
    }

    #[test]
    fn test_spoofed_forwarded_headers_share_the_peer_bucket() {
        let peer: SocketAddr = "198.51.100.9:443".parse().unwrap();
        let keys: std::collections::HashSet<_> = ["10.0.0.0", "10.0.0.1", "10.0.0.2"]
            .into_iter()
            .map(|ip| client_key(&forwarded(ip), Some(peer), false))
            .collect();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains("ratelimit:auth:198.51.100.9"));
    }

    #[test]
    fn test_peer_address_when_not_proxied() {
        let peer: SocketAddr = "192.0.2.4:4000".parse().unwrap();
        assert_eq!(
            client_key(&HeaderMap::new(), Some(peer), true),
            "ratelimit:auth:192.0.2.4"
        );
        assert_eq!(
            client_key(&HeaderMap::new(), None, false),
            "ratelimit:auth:unknown"
        );
    }
}
