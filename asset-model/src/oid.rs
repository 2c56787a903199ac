//! 对象标识（Oid）
//!
//! - `Stable`：远端持久化后分配的标识（资产类型 + 不透明键）；
//! - `Ephemeral`：尚未提交的新实体使用的进程内临时标识（资产类型 + v4 UUID）。
//!
//! 相等与哈希只取决于标识的值本身，与持有它的实体包装类型无关。
//!
//! 文本形式：稳定标识为 `Story:1042`，临时标识为 `Story:~<uuid>`，
//! `Display` 与 `FromStr` 可无损往返；serde 以文本形式序列化。
//!
use crate::error::{DomainError, DomainResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use uuid::Uuid;

const SEPARATOR: char = ':';
const EPHEMERAL_MARK: char = '~';

/// 资产标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Oid {
    Stable { asset_type: String, key: String },
    Ephemeral { asset_type: String, marker: Uuid },
}

impl Oid {
    /// 构造稳定标识，校验文本形式可无损往返
    pub fn stable(asset_type: impl Into<String>, key: impl Into<String>) -> DomainResult<Self> {
        let asset_type = asset_type.into();
        let key = key.into();
        validate_asset_type(&asset_type)?;
        if key.is_empty() || key.starts_with(EPHEMERAL_MARK) {
            return Err(DomainError::Parse {
                reason: format!("invalid oid key: {key:?}"),
            });
        }
        Ok(Oid::Stable { asset_type, key })
    }

    /// 为新实体分配临时标识
    pub fn ephemeral(asset_type: impl Into<String>) -> Self {
        Oid::Ephemeral {
            asset_type: asset_type.into(),
            marker: Uuid::new_v4(),
        }
    }

    pub fn asset_type(&self) -> &str {
        match self {
            Oid::Stable { asset_type, .. } | Oid::Ephemeral { asset_type, .. } => asset_type,
        }
    }

    /// 稳定键（临时标识没有）
    pub fn key(&self) -> Option<&str> {
        match self {
            Oid::Stable { key, .. } => Some(key),
            Oid::Ephemeral { .. } => None,
        }
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, Oid::Stable { .. })
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Oid::Ephemeral { .. })
    }
}

fn validate_asset_type(asset_type: &str) -> DomainResult<()> {
    if asset_type.is_empty() || asset_type.contains(SEPARATOR) {
        return Err(DomainError::Parse {
            reason: format!("invalid asset type token: {asset_type:?}"),
        });
    }
    Ok(())
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Oid::Stable { asset_type, key } => write!(f, "{asset_type}{SEPARATOR}{key}"),
            Oid::Ephemeral { asset_type, marker } => {
                write!(f, "{asset_type}{SEPARATOR}{EPHEMERAL_MARK}{}", marker.simple())
            }
        }
    }
}

impl FromStr for Oid {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((asset_type, rest)) = s.split_once(SEPARATOR) else {
            return Err(DomainError::Parse {
                reason: format!("oid without asset type: {s:?}"),
            });
        };
        match rest.strip_prefix(EPHEMERAL_MARK) {
            Some(marker) => {
                validate_asset_type(asset_type)?;
                Ok(Oid::Ephemeral {
                    asset_type: asset_type.to_string(),
                    marker: Uuid::parse_str(marker)?,
                })
            }
            None => Oid::stable(asset_type, rest),
        }
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
