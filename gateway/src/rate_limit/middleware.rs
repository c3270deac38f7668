//! 限流中间件
//!
//! 读取身份中间件写入的 `CallerIdentity`，调用准入引擎，超限时返回 429

use crate::rate_limit::engine::AdmissionEngine;
use crate::rate_limit::types::{Decision, RateLimitResult};
use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tasker_common::CallerIdentity;
use tasker_config::HeaderSettings;
use tracing::{debug, warn};

/// 限流中间件状态
#[derive(Debug, Clone)]
pub struct RateLimitMiddleware {
    pub engine: Arc<AdmissionEngine>,
    pub headers: HeaderSettings,
}

impl RateLimitMiddleware {
    pub fn new(engine: Arc<AdmissionEngine>, headers: HeaderSettings) -> Self {
        Self { engine, headers }
    }

    /// 为响应添加限流相关头
    fn add_rate_limit_headers(&self, headers: &mut HeaderMap, result: &RateLimitResult) {
        if self.headers.standard {
            insert_number(headers, "x-ratelimit-limit", result.limit);
            insert_number(headers, "x-ratelimit-remaining", result.remaining);
            insert_number(headers, "x-ratelimit-reset", result.reset_after_secs);

            if let Some(retry_after) = result.retry_after {
                insert_number(headers, "retry-after", retry_after);
            }
        }

        if self.headers.legacy {
            let reset_at = chrono::Utc::now().timestamp().max(0) as u64 + result.reset_after_secs;
            insert_number(headers, "x-rate-limit-limit", result.limit);
            insert_number(headers, "x-rate-limit-remaining", result.remaining);
            insert_number(headers, "x-rate-limit-reset", reset_at);
        }
    }
}

fn insert_number(headers: &mut HeaderMap, name: &'static str, value: u64) {
    headers.insert(name, HeaderValue::from(value));
}

/// 429 响应体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitExceeded {
    pub success: bool,
    pub message: String,
    pub retry_after: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub ip: String,
}

/// Axum 中间件函数
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimitMiddleware>>,
    request: Request,
    next: Next,
) -> Response {
    let identity = match request.extensions().get::<CallerIdentity>() {
        Some(identity) => identity.clone(),
        None => {
            // 身份中间件未运行时按匿名计数，而不是放行
            warn!(path = %request.uri().path(), "Caller identity missing, counting as anonymous");
            CallerIdentity::anonymous("unknown")
        }
    };

    let decision = state.engine.decide(request.uri().path(), &identity);

    match decision {
        Decision::Bypass => next.run(request).await,
        Decision::Deny(result) => {
            let retry_after = result.retry_after.unwrap_or(result.reset_after_secs);
            warn!(
                origin = %identity.origin(),
                user_id = ?identity.user_id(),
                tier = %result.tier,
                endpoint = %request.uri().path(),
                method = %request.method(),
                retry_after,
                "Rate limit exceeded"
            );

            let body = RateLimitExceeded {
                success: false,
                message: state.engine.policy(result.tier).message.clone(),
                retry_after,
                user_id: identity.user_id().map(ToString::to_string),
                ip: identity.origin().to_string(),
            };
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            state.add_rate_limit_headers(response.headers_mut(), &result);
            response
        }
        Decision::Allow(result) => {
            debug!(
                origin = %identity.origin(),
                tier = %result.tier,
                endpoint = %request.uri().path(),
                count = result.count,
                remaining = result.remaining,
                "Request allowed"
            );

            let mut response = next.run(request).await;
            state.add_rate_limit_headers(response.headers_mut(), &result);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use tasker_common::{ManualClock, UserId};
    use tasker_config::{QuotaRule, RateLimitSettings};
    use tower::ServiceExt;

    async fn handler() -> &'static str {
        "OK"
    }

    fn app(settings: RateLimitSettings, identity: CallerIdentity) -> Router {
        let engine =
            Arc::new(AdmissionEngine::new(&settings, Arc::new(ManualClock::new())).unwrap());
        let state = Arc::new(RateLimitMiddleware::new(engine, settings.headers));

        Router::new()
            .route("/", get(handler))
            .route("/health", get(handler))
            .layer(middleware::from_fn_with_state(state, rate_limit_middleware))
            .layer(axum::Extension(identity))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn tight_settings() -> RateLimitSettings {
        let mut settings = RateLimitSettings::default();
        settings.anonymous_general = QuotaRule::new(60_000, 2, "slow down");
        settings.authenticated = QuotaRule::new(60_000, 2, "user slow down");
        settings
    }

    #[tokio::test]
    async fn test_allowed_request_carries_standard_headers() {
        let app = app(tight_settings(), CallerIdentity::anonymous("10.0.0.1"));

        let response = app.oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "2");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "1");
        assert_eq!(headers.get("x-ratelimit-reset").unwrap(), "60");
        assert!(headers.get("retry-after").is_none());
        assert!(headers.get("x-rate-limit-limit").is_none());
    }

    #[tokio::test]
    async fn test_denied_request_returns_429_body() {
        let app = app(
            tight_settings(),
            CallerIdentity::authenticated(UserId::new("u-7"), "10.0.0.1"),
        );

        for _ in 0..2 {
            let response = app.clone().oneshot(get_request("/")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "60");
        assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "0");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "user slow down");
        assert_eq!(json["retryAfter"], 60);
        assert_eq!(json["userId"], "u-7");
        assert_eq!(json["ip"], "10.0.0.1");
    }

    #[tokio::test]
    async fn test_anonymous_denial_omits_user_id() {
        let app = app(tight_settings(), CallerIdentity::anonymous("10.0.0.1"));

        for _ in 0..2 {
            app.clone().oneshot(get_request("/")).await.unwrap();
        }
        let response = app.oneshot(get_request("/")).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("userId").is_none());
        assert_eq!(json["message"], "slow down");
    }

    #[tokio::test]
    async fn test_headers_disabled() {
        let mut settings = tight_settings();
        settings.headers.standard = false;
        let app = app(settings, CallerIdentity::anonymous("10.0.0.1"));

        for _ in 0..2 {
            let response = app.clone().oneshot(get_request("/")).await.unwrap();
            assert!(response.headers().get("x-ratelimit-limit").is_none());
        }
        let response = app.oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().get("retry-after").is_none());
    }

    #[tokio::test]
    async fn test_legacy_headers() {
        let mut settings = tight_settings();
        settings.headers.legacy = true;
        let app = app(settings, CallerIdentity::anonymous("10.0.0.1"));

        let response = app.oneshot(get_request("/")).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers.get("x-rate-limit-limit").unwrap(), "2");
        let reset_at: i64 = headers
            .get("x-rate-limit-reset")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(reset_at >= chrono::Utc::now().timestamp());
    }

    #[tokio::test]
    async fn test_skip_path_has_no_headers_and_never_denies() {
        let app = app(tight_settings(), CallerIdentity::anonymous("10.0.0.1"));

        for _ in 0..5 {
            let response = app.clone().oneshot(get_request("/health")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get("x-ratelimit-limit").is_none());
        }
    }
}
