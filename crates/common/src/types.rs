//! 通用类型定义

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 用户 ID
///
/// 由上游认证服务签发，网关只把它当作不透明字符串使用
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[display("{_0}")]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// 调用方身份
///
/// 每个请求由身份解析器生成一次，不做持久化。
/// `user_id` 存在当且仅当调用方已认证。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity {
    user_id: Option<UserId>,
    origin: String,
}

impl CallerIdentity {
    /// 匿名调用方（只有网络来源）
    pub fn anonymous(origin: impl Into<String>) -> Self {
        Self {
            user_id: None,
            origin: origin.into(),
        }
    }

    /// 已认证调用方
    pub fn authenticated(user_id: UserId, origin: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            origin: origin.into(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// 网络来源地址（IP 或 "unknown"）
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// 分页参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl Pagination {
    /// 非正数的页码和页大小回退到默认值
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let defaults = Self::default();
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(defaults.page),
            limit: limit.filter(|l| *l > 0).unwrap_or(defaults.limit),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit as usize
    }
}

/// 分页元信息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageInfo {
    pub fn new(pagination: &Pagination, total: u64) -> Self {
        let limit = u64::from(pagination.limit);
        Self {
            page: pagination.page,
            limit: pagination.limit,
            total,
            total_pages: total.div_ceil(limit) as u32,
            has_next: u64::from(pagination.page) * limit < total,
            has_prev: pagination.page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_identity_has_no_user() {
        let identity = CallerIdentity::anonymous("10.0.0.1");
        assert!(!identity.is_authenticated());
        assert!(identity.user_id().is_none());
        assert_eq!(identity.origin(), "10.0.0.1");
    }

    #[test]
    fn test_authenticated_identity() {
        let identity = CallerIdentity::authenticated(UserId::new("u-1"), "10.0.0.1");
        assert!(identity.is_authenticated());
        assert_eq!(identity.user_id().map(UserId::as_str), Some("u-1"));
    }

    #[test]
    fn test_pagination_defaults_on_zero() {
        let p = Pagination::new(Some(0), Some(0));
        assert_eq!(p, Pagination::default());
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_offset() {
        let p = Pagination::new(Some(3), Some(10));
        assert_eq!(p.offset(), 20);
    }

    #[test]
    fn test_page_info() {
        let info = PageInfo::new(&Pagination::new(Some(2), Some(10)), 25);
        assert_eq!(info.total_pages, 3);
        assert!(info.has_next);
        assert!(info.has_prev);

        let last = PageInfo::new(&Pagination::new(Some(3), Some(10)), 25);
        assert!(!last.has_next);
    }
}
