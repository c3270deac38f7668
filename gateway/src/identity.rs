//! 调用方身份解析
//!
//! 认证由上游完成，网关只读取受信任的用户头和网络来源

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use tasker_common::{CallerIdentity, UserId};
use tasker_config::IdentitySettings;
use tasker_errors::AppError;
use tracing::trace;

const UNKNOWN_ORIGIN: &str = "unknown";

/// 身份解析器
pub trait IdentityResolver: Send + Sync + Debug {
    fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> CallerIdentity;
}

/// 基于受信任请求头的解析器
///
/// 默认只用连接对端地址。开启 `trust_forwarded` 时来源优先级为：
/// `x-forwarded-for` 最右一跳（受信任代理追加的那一跳） → `x-real-ip` → 连接对端地址 → `"unknown"`
#[derive(Debug, Clone)]
pub struct TrustedHeaderResolver {
    user_header: String,
    trust_forwarded: bool,
}

impl TrustedHeaderResolver {
    pub fn new(user_header: impl Into<String>, trust_forwarded: bool) -> Self {
        Self {
            user_header: user_header.into().to_ascii_lowercase(),
            trust_forwarded,
        }
    }

    pub fn from_settings(settings: &IdentitySettings) -> Self {
        Self::new(settings.user_header.clone(), settings.trust_forwarded)
    }

    fn origin(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        if self.trust_forwarded {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.rsplit(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(ip) = forwarded {
                return ip.to_string();
            }

            let real_ip = headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(ip) = real_ip {
                return ip.to_string();
            }
        }

        peer.map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string())
    }
}

impl IdentityResolver for TrustedHeaderResolver {
    fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> CallerIdentity {
        let origin = self.origin(headers, peer);
        let user_id = headers
            .get(self.user_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match user_id {
            Some(id) => CallerIdentity::authenticated(UserId::new(id), origin),
            None => CallerIdentity::anonymous(origin),
        }
    }
}

/// 身份中间件：把 `CallerIdentity` 写入请求扩展
pub async fn identity_middleware(
    State(resolver): State<Arc<dyn IdentityResolver>>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = resolver.resolve(request.headers(), peer);

    trace!(
        origin = %identity.origin(),
        authenticated = identity.is_authenticated(),
        "Resolved caller identity"
    );

    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// 已认证用户提取器
///
/// 应该在 identity_middleware 之后使用；匿名调用方返回 401
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserId);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .and_then(CallerIdentity::user_id)
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}
