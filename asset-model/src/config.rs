//! 会话配置（SessionConfig）
//!
//! 可通过 builder 构造，也可从 JSON 加载；缺省字段取默认值。
//!
use crate::error::DomainResult;
use bon::Builder;
use serde::{Deserialize, Serialize};

pub const DEFAULT_STATE_ATTRIBUTE: &str = "AssetState";
pub const DEFAULT_COUNT_SUFFIX: &str = ".@Count";

#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 提交前执行本地必填校验
    #[builder(default = true)]
    validation_enabled: bool,
    /// 判别值所在的状态属性
    #[builder(default = DEFAULT_STATE_ATTRIBUTE.to_string(), into)]
    state_attribute: String,
    /// 聚合计数属性名后缀
    #[builder(default = DEFAULT_COUNT_SUFFIX.to_string(), into)]
    count_suffix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> DomainResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    pub fn state_attribute(&self) -> &str {
        &self.state_attribute
    }

    pub fn count_suffix(&self) -> &str {
        &self.count_suffix
    }
}
