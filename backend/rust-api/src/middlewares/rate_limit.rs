use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::metrics::RATE_LIMITED_TOTAL;
use crate::services::AppState;

const LLM_RATE_LIMIT_PER_USER: u32 = 30; // requests per minute
const LLM_RATE_WINDOW_SECONDS: u64 = 60;

// Fixed window: the first hit creates the key with a TTL, later hits count
// against it until it expires.
const FIXED_WINDOW_SCRIPT: &str = r#"
    local key = KEYS[1]
    local limit = tonumber(ARGV[1])
    local window = tonumber(ARGV[2])

    local current = redis.call('GET', key)

    if current == false then
        redis.call('SET', key, 1, 'EX', window)
        return 1
    end

    current = tonumber(current)

    if current >= limit then
        return 0
    end

    redis.call('INCR', key)
    return 1
"#;

fn extract_client_ip_from(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    // Preferred order: X-Forwarded-For, Forwarded, X-Real-IP, ConnectInfo
    if let Some(s) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        return s.split(',').next().unwrap_or(s).trim().to_string();
    }

    if let Some(s) = headers.get("forwarded").and_then(|v| v.to_str().ok()) {
        let forwarded_for = s
            .split(';')
            .map(str::trim)
            .find_map(|part| part.strip_prefix("for="));
        if let Some(value) = forwarded_for {
            return value.trim().trim_matches('"').to_string();
        }
    }

    if let Some(s) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return s.trim().to_string();
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn rate_limit_disabled() -> bool {
    std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1"
}

fn llm_limit_per_user() -> u32 {
    std::env::var("RATE_LIMIT_LLM_PER_USER")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(LLM_RATE_LIMIT_PER_USER)
}

/// Throttles the routes that call the text generation service. Keyed by
/// learner, or by client address when no claims are present. Without Redis
/// the limiter is off; a Redis failure lets the request through.
pub async fn llm_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(redis) = state.redis.as_ref() else {
        return Ok(next.run(request).await);
    };
    if rate_limit_disabled() {
        tracing::debug!("Rate limiting disabled via RATE_LIMIT_DISABLED=1");
        return Ok(next.run(request).await);
    }

    let key = match request.extensions().get::<super::auth::JwtClaims>() {
        Some(claims) => format!("ratelimit:llm:user:{}", claims.sub),
        None => format!(
            "ratelimit:llm:ip:{}",
            extract_client_ip_from(request.headers(), request.extensions())
        ),
    };

    match check_rate_limit_with_window(redis, &key, llm_limit_per_user(), LLM_RATE_WINDOW_SECONDS)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("LLM rate limit exceeded for {}", key);
            RATE_LIMITED_TOTAL.with_label_values(&["llm"]).inc();
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
        Err(e) => tracing::warn!("Rate limit check failed, allowing request: {}", e),
    }

    Ok(next.run(request).await)
}

async fn check_rate_limit_with_window(
    redis: &ConnectionManager,
    key: &str,
    limit: u32,
    window_seconds: u64,
) -> anyhow::Result<bool> {
    let mut conn = redis.clone();

    let allowed: u32 = redis::Script::new(FIXED_WINDOW_SCRIPT)
        .key(key)
        .arg(limit)
        .arg(window_seconds)
        .invoke_async(&mut conn)
        .await?;

    Ok(allowed == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Extensions, HeaderValue};
    use serial_test::serial;

    #[test]
    fn prefers_first_forwarded_for_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(extract_client_ip_from(&headers, &Extensions::new()), "10.0.0.1");
    }

    #[test]
    fn reads_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("forwarded", HeaderValue::from_static("for=\"192.0.2.60\"; proto=http"));
        assert_eq!(extract_client_ip_from(&headers, &Extensions::new()), "192.0.2.60");
    }

    #[test]
    fn falls_back_to_connect_info() {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 9000))));
        assert_eq!(extract_client_ip_from(&HeaderMap::new(), &extensions), "127.0.0.1");
        assert_eq!(extract_client_ip_from(&HeaderMap::new(), &Extensions::new()), "unknown");
    }

    #[test]
    #[serial]
    fn limit_can_be_overridden_from_env() {
        std::env::set_var("RATE_LIMIT_LLM_PER_USER", "3");
        assert_eq!(llm_limit_per_user(), 3);
        std::env::remove_var("RATE_LIMIT_LLM_PER_USER");
        assert_eq!(llm_limit_per_user(), LLM_RATE_LIMIT_PER_USER);
    }
}
