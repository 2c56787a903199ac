//! 属性值（AttributeValue）
//!
//! 以带标签的值变体承载远端属性，替代无类型的 `Get<T>(name)`。
//! `AttributeType` 负责在 Rust 类型与属性值之间转换，并声明对应的 `ValueKind`，
//! 以便与元模型中声明的属性类型相互校验。
//!
use crate::error::{DomainError, DomainResult};
use crate::oid::Oid;
use crate::rank::RankValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 元模型声明的属性值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    Relation,
    Rank,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::Decimal => "decimal",
            ValueKind::Boolean => "boolean",
            ValueKind::Date => "date",
            ValueKind::Relation => "relation",
            ValueKind::Rank => "rank",
        };
        f.write_str(name)
    }
}

/// 属性值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Null,
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Relation(Oid),
    Relations(Vec<Oid>),
    Rank(RankValue),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// 值的类型；`Null` 没有类型
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Text(_) => Some(ValueKind::Text),
            AttributeValue::Integer(_) => Some(ValueKind::Integer),
            AttributeValue::Decimal(_) => Some(ValueKind::Decimal),
            AttributeValue::Boolean(_) => Some(ValueKind::Boolean),
            AttributeValue::Date(_) => Some(ValueKind::Date),
            AttributeValue::Relation(_) | AttributeValue::Relations(_) => {
                Some(ValueKind::Relation)
            }
            AttributeValue::Rank(_) => Some(ValueKind::Rank),
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, AttributeValue::Relations(_))
    }

    /// 多值关系的成员；`Null` 视为空集合
    pub fn relations(&self) -> DomainResult<Vec<Oid>> {
        match self {
            AttributeValue::Null => Ok(Vec::new()),
            AttributeValue::Relations(items) => Ok(items.clone()),
            other => Err(mismatch("relations", other)),
        }
    }

    /// 是否可以写入声明为 `kind`（及多值性）的属性
    pub fn conforms_to(&self, kind: ValueKind, multi_value: bool) -> bool {
        match self {
            AttributeValue::Null => true,
            value => value.kind() == Some(kind) && value.is_multi() == multi_value,
        }
    }

    fn describe(&self) -> String {
        match self.kind() {
            None => "null".to_string(),
            Some(ValueKind::Relation) if self.is_multi() => "relations".to_string(),
            Some(kind) => kind.to_string(),
        }
    }
}

fn mismatch(expected: &str, found: &AttributeValue) -> DomainError {
    DomainError::TypeMismatch {
        expected: expected.to_string(),
        found: found.describe(),
    }
}

/// 可映射到属性值的 Rust 类型
pub trait AttributeType: Sized {
    /// 对应的元模型类型
    const KIND: ValueKind;
    /// 是否为多值属性
    const MULTI: bool = false;

    /// 从非空属性值转换
    fn from_value(value: &AttributeValue) -> DomainResult<Self>;

    fn into_value(self) -> AttributeValue;
}

macro_rules! scalar_attribute_type {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl AttributeType for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn from_value(value: &AttributeValue) -> DomainResult<Self> {
                match value {
                    AttributeValue::$variant(inner) => Ok(inner.clone()),
                    other => Err(mismatch(stringify!($kind), other)),
                }
            }

            fn into_value(self) -> AttributeValue {
                AttributeValue::$variant(self)
            }
        }
    };
}

scalar_attribute_type!(String, Text, Text);
scalar_attribute_type!(i64, Integer, Integer);
scalar_attribute_type!(f64, Decimal, Decimal);
scalar_attribute_type!(bool, Boolean, Boolean);
scalar_attribute_type!(DateTime<Utc>, Date, Date);
scalar_attribute_type!(Oid, Relation, Relation);
scalar_attribute_type!(RankValue, Rank, Rank);

impl AttributeType for Vec<Oid> {
    const KIND: ValueKind = ValueKind::Relation;
    const MULTI: bool = true;

    fn from_value(value: &AttributeValue) -> DomainResult<Self> {
        value.relations()
    }

    fn into_value(self) -> AttributeValue {
        AttributeValue::Relations(self)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Boolean(value)
    }
}

impl From<Oid> for AttributeValue {
    fn from(value: Oid) -> Self {
        AttributeValue::Relation(value)
    }
}
