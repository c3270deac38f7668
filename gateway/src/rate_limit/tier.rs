//! 配额层级选择

use crate::rate_limit::types::{EndpointClass, QuotaTier};
use tasker_common::CallerIdentity;

impl QuotaTier {
    /// 根据接口类别和调用方身份选择层级
    ///
    /// # 优先级
    /// 1. AnonymousAuthEndpoint: 认证敏感接口，不论是否已认证
    /// 2. AuthenticatedUser: 已认证
    /// 3. AnonymousGeneral: 未认证
    ///
    /// `Bypass` 类别在准入引擎中提前返回，这里按普通接口处理
    pub fn select(class: EndpointClass, identity: &CallerIdentity) -> Self {
        if class == EndpointClass::AuthSensitive {
            return Self::AnonymousAuthEndpoint;
        }
        if identity.is_authenticated() {
            Self::AuthenticatedUser
        } else {
            Self::AnonymousGeneral
        }
    }
}
