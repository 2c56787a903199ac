//! 元模型（MetaModel）
//!
//! 描述远端资产类型：属性定义（名称、值类型、多值、只读、必填、关联类型）
//! 与操作描述（名称、校验属性）。元模型的发现过程不在本 crate 范围内，
//! 这里只定义协作接口，并提供一个静态实现用于装配与测试。
//!
use crate::error::{DomainError, DomainResult};
use crate::value::ValueKind;
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// 属性定义
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    #[builder(into)]
    name: String,
    kind: ValueKind,
    #[builder(default)]
    multi_value: bool,
    #[builder(default)]
    read_only: bool,
    #[builder(default)]
    required: bool,
    /// 关联属性指向的资产类型
    #[builder(into)]
    related_type: Option<String>,
}

impl AttributeDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_multi_value(&self) -> bool {
        self.multi_value
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn related_type(&self) -> Option<&str> {
        self.related_type.as_deref()
    }
}

/// 操作描述
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    #[builder(into)]
    name: String,
    /// 布尔属性，为真表示当前状态允许执行该操作
    #[builder(into)]
    validator: Option<String>,
}

impl OperationDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validator(&self) -> Option<&str> {
        self.validator.as_deref()
    }
}

/// 资产类型描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTypeDescriptor {
    token: String,
    attributes: BTreeMap<String, AttributeDefinition>,
    operations: BTreeMap<String, OperationDescriptor>,
}

impl AssetTypeDescriptor {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            attributes: BTreeMap::new(),
            operations: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, definition: AttributeDefinition) -> Self {
        self.attributes
            .insert(definition.name().to_string(), definition);
        self
    }

    pub fn with_operation(mut self, operation: OperationDescriptor) -> Self {
        self.operations
            .insert(operation.name().to_string(), operation);
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.attributes.values()
    }

    pub fn required_attributes(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.attributes.values().filter(|def| def.is_required())
    }

    pub fn operation(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.get(name)
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.values()
    }

    /// 按名称取属性定义，未声明时报 `UnknownAttribute`
    pub fn require_attribute(&self, name: &str) -> DomainResult<&AttributeDefinition> {
        self.attribute(name)
            .ok_or_else(|| DomainError::UnknownAttribute {
                asset_type: self.token.clone(),
                attribute: name.to_string(),
            })
    }
}

/// 元模型提供者
pub trait MetaModel {
    /// 解析资产类型；未知类型报 `UnknownAssetType`
    fn asset_type(&self, token: &str) -> DomainResult<Arc<AssetTypeDescriptor>>;
}

/// 预先装配好的静态元模型
#[derive(Debug, Clone, Default)]
pub struct StaticMetaModel {
    types: HashMap<String, Arc<AssetTypeDescriptor>>,
}

impl StaticMetaModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, descriptor: AssetTypeDescriptor) -> Self {
        self.types
            .insert(descriptor.token().to_string(), Arc::new(descriptor));
        self
    }

    /// 从 JSON 数组加载类型描述
    pub fn from_json(json: &str) -> DomainResult<Self> {
        let descriptors: Vec<AssetTypeDescriptor> = serde_json::from_str(json)?;
        Ok(descriptors
            .into_iter()
            .fold(Self::new(), |model, descriptor| model.with_type(descriptor)))
    }
}

impl MetaModel for StaticMetaModel {
    fn asset_type(&self, token: &str) -> DomainResult<Arc<AssetTypeDescriptor>> {
        self.types
            .get(token)
            .cloned()
            .ok_or_else(|| DomainError::UnknownAssetType {
                asset_type: token.to_string(),
            })
    }
}
