//! 缓存键
//!
//! 查询串按参数名稳定排序后重新编码，参数顺序不同的同一查询得到同一个键。
//! 列表接口不识别的参数（如 `_=<时间戳>`）不进入键

use crate::tasks::query::LIST_QUERY_PARAMS;
use std::fmt;
use tasker_common::UserId;
use url::form_urlencoded;

/// 缓存键：`(用户, 资源路径, 规范化查询串)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    user_id: UserId,
    resource: String,
    query: String,
}

impl CacheKey {
    pub fn new(user_id: UserId, resource: impl Into<String>, raw_query: Option<&str>) -> Self {
        Self {
            user_id,
            resource: resource.into(),
            query: normalize_query(raw_query.unwrap_or_default()),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// 规范化后的查询串
    pub fn query(&self) -> &str {
        &self.query
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}?{}", self.user_id, self.resource, self.query)
    }
}

/// 规范化查询串
///
/// 只保留 `LIST_QUERY_PARAMS` 中的参数，解码后按参数名排序；同名参数保持原有
/// 相对顺序（排序是稳定的），再统一重新编码，因此 `page=1&limit=5` 与
/// `limit=5&page=1`、`%20` 与 `+` 都得到同一结果
pub fn normalize_query(raw: &str) -> String {
    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(raw.as_bytes())
        .filter(|(k, _)| LIST_QUERY_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}
