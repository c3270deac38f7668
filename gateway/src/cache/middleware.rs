//! 列表响应缓存中间件
//!
//! 只处理已认证用户的 GET 请求；命中时直接返回缓存的响应体，
//! 未命中时执行下游处理并缓存 200 响应

use crate::cache::key::CacheKey;
use crate::cache::store::{CacheLookup, CachedPayload, ResponseCache};
use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tasker_common::CallerIdentity;
use tasker_errors::AppError;
use tracing::{error, info};

/// Axum 中间件函数
pub async fn response_cache_middleware(
    State(cache): State<Arc<ResponseCache>>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let user_id = match request
        .extensions()
        .get::<CallerIdentity>()
        .and_then(CallerIdentity::user_id)
    {
        Some(user_id) => user_id.clone(),
        None => return next.run(request).await,
    };

    let key = CacheKey::new(user_id, request.uri().path(), request.uri().query());

    if let CacheLookup::Hit(payload) = cache.lookup(&key) {
        info!(key = %key, "Cache hit");
        return cached_response(payload);
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(key = %key, error = %e, "Failed to buffer response body");
            return AppError::internal("Failed to read response body").into_response();
        }
    };

    cache.store(
        key.clone(),
        CachedPayload {
            body: bytes.clone(),
            content_type: parts.headers.get(header::CONTENT_TYPE).cloned(),
        },
    );
    info!(key = %key, ttl_secs = cache.ttl().as_secs(), "Cached response");

    Response::from_parts(parts, Body::from(bytes))
}

fn cached_response(payload: CachedPayload) -> Response {
    let mut response = Response::new(Body::from(payload.body));
    if let Some(content_type) = payload.content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
    }
    response
}
