//! 远端协作者（remote）
//!
//! 定义查询服务与命令服务的调用形状；线协议与传输不在本 crate 范围内。
//! 所有调用都是同步阻塞的，失败直接以 `DomainError` 返回，本层不做重试。
//!
//! `inmemory` 提供一个进程内实现，用于装配示例与测试。
//!
pub mod inmemory;

use crate::error::DomainResult;
use crate::oid::Oid;
use crate::value::AttributeValue;
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 远端返回的原始记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub oid: Oid,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl RawRecord {
    pub fn new(oid: Oid) -> Self {
        Self {
            oid,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}

/// 等值过滤条件（过滤树的构造由外部查询层负责，这里只透传）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterTerm {
    pub attribute: String,
    pub value: AttributeValue,
}

impl FilterTerm {
    pub fn equals(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// 声明式查询：资产类型 + 属性选择 + 过滤 + 排序
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[builder(into)]
    asset_type: String,
    #[builder(default)]
    selection: Vec<String>,
    #[builder(default)]
    filter: Vec<FilterTerm>,
    #[builder(into)]
    order_by: Option<String>,
}

impl Query {
    pub fn asset_type(&self) -> &str {
        &self.asset_type
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn filter(&self) -> &[FilterTerm] {
        &self.filter
    }

    pub fn order_by(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    /// 补全缺省的选择与排序
    pub(crate) fn with_defaults(
        mut self,
        selection: &[&str],
        order_by: Option<&str>,
    ) -> Self {
        if self.selection.is_empty() {
            self.selection = selection.iter().map(|name| name.to_string()).collect();
        }
        if self.order_by.is_none() {
            self.order_by = order_by.map(str::to_string);
        }
        self
    }

    pub(crate) fn ensure_selected(&mut self, name: &str) {
        if !self.selection.is_empty() && !self.selection.iter().any(|s| s == name) {
            self.selection.push(name.to_string());
        }
    }
}

/// 单个属性的待提交变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AttributeChange {
    Set {
        attribute: String,
        value: AttributeValue,
    },
    Add {
        attribute: String,
        item: Oid,
    },
    Remove {
        attribute: String,
        item: Oid,
    },
}

impl AttributeChange {
    pub fn attribute(&self) -> &str {
        match self {
            AttributeChange::Set { attribute, .. }
            | AttributeChange::Add { attribute, .. }
            | AttributeChange::Remove { attribute, .. } => attribute,
        }
    }
}

/// 一次提交的全部变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChanges {
    pub oid: Oid,
    pub asset_type: String,
    pub changes: Vec<AttributeChange>,
}

/// 查询/取回服务
pub trait QueryService {
    /// 执行声明式查询
    fn query(&self, query: &Query) -> DomainResult<Vec<RawRecord>>;

    /// 取回单个记录的选定属性；记录不存在时返回 `None`（存在性校验）
    fn retrieve(&self, oid: &Oid, selection: &[String]) -> DomainResult<Option<RawRecord>>;

    /// 取回单个属性；记录不存在时返回 `None`，存在但无值时返回 `Some(Null)`
    fn retrieve_attribute(&self, oid: &Oid, attribute: &str)
    -> DomainResult<Option<AttributeValue>>;
}

/// 命令服务
pub trait CommandService {
    /// 持久化待提交变更，返回稳定标识；规则/安全拒绝报 `DataViolation`
    fn save(&self, changes: &PendingChanges, comment: Option<&str>) -> DomainResult<Oid>;

    /// 对标识执行命名操作，返回结果标识；业务规则拒绝报 `InvalidOperation`
    fn execute_operation(&self, oid: &Oid, operation: &str) -> DomainResult<Oid>;
}
