//! 排序（Rank）
//!
//! 同一排序属性下的兄弟实体之间维护全序。排名值由远端提供，
//! 本层只读取、比较并回写远端给出的“紧邻之前/之后”伴随值，从不自行计算排名。
//!
use crate::asset::Asset;
use crate::attribute::Freshness;
use crate::error::{DomainError, DomainResult};
use crate::registry::AssetKind;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::marker::PhantomData;

/// 不透明的排名键
///
/// 仅远端实现需要通过 `from_raw/raw` 构造或解读它；客户端只比较。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankKey(i64);

impl RankKey {
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> i64 {
        self.0
    }
}

/// 远端返回的排名值，附带紧邻之前/之后的伴随键
///
/// 本地暂存的排名值没有伴随键（`before/after` 为 `None`）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankValue {
    key: RankKey,
    before: Option<RankKey>,
    after: Option<RankKey>,
}

impl RankValue {
    /// 暂存用：仅包含位置
    pub fn at(key: RankKey) -> Self {
        Self {
            key,
            before: None,
            after: None,
        }
    }

    pub fn with_companions(key: RankKey, before: RankKey, after: RankKey) -> Self {
        Self {
            key,
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn key(&self) -> RankKey {
        self.key
    }

    pub fn before(&self) -> Option<RankKey> {
        self.before
    }

    pub fn after(&self) -> Option<RankKey> {
        self.after
    }

    /// 按位置比较，忽略伴随键
    pub fn compare(&self, other: &RankValue) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// 某个实体在指定排序属性上的排名视图
pub struct Rank<K: AssetKind> {
    asset: Asset,
    attribute: String,
    _kind: PhantomData<fn() -> K>,
}

impl<K: AssetKind> Rank<K> {
    pub fn new(asset: Asset, attribute: impl Into<String>) -> Self {
        Self {
            asset,
            attribute: attribute.into(),
            _kind: PhantomData,
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// 当前排名（总是重新读取：其他实体移动后本实体的伴随键会变化）
    pub fn value(&self) -> DomainResult<RankValue> {
        read_rank(&self.asset, &self.attribute)
    }

    /// 将自身排到 `other` 之上，并立即提交自身
    pub fn set_above(&self, other: &K) -> DomainResult<()> {
        let target = read_rank(other.asset(), &self.attribute)?;
        let key = target.before().ok_or_else(|| missing_companion(other.asset(), "before"))?;
        self.move_to(key)
    }

    /// 将自身排到 `other` 之下，并立即提交自身
    pub fn set_below(&self, other: &K) -> DomainResult<()> {
        let target = read_rank(other.asset(), &self.attribute)?;
        let key = target.after().ok_or_else(|| missing_companion(other.asset(), "after"))?;
        self.move_to(key)
    }

    pub fn is_above(&self, other: &K) -> DomainResult<bool> {
        let mine = self.value()?;
        let theirs = read_rank(other.asset(), &self.attribute)?;
        Ok(mine.compare(&theirs) == Ordering::Less)
    }

    pub fn is_below(&self, other: &K) -> DomainResult<bool> {
        let mine = self.value()?;
        let theirs = read_rank(other.asset(), &self.attribute)?;
        Ok(mine.compare(&theirs) == Ordering::Greater)
    }

    fn move_to(&self, key: RankKey) -> DomainResult<()> {
        self.asset
            .set_value(&self.attribute, AttributeValue::Rank(RankValue::at(key)))?;
        self.asset.commit(None)?;
        self.asset.invalidate(&self.attribute);
        Ok(())
    }
}

fn read_rank(asset: &Asset, attribute: &str) -> DomainResult<RankValue> {
    match asset.get_value(attribute, Freshness::NonCachable)? {
        AttributeValue::Rank(value) => Ok(value),
        AttributeValue::Null => Err(DomainError::InvalidValue {
            reason: format!("{} has no value for {attribute}", asset.oid()),
        }),
        other => Err(DomainError::TypeMismatch {
            expected: "rank".to_string(),
            found: other.kind().map(|k| k.to_string()).unwrap_or_default(),
        }),
    }
}

fn missing_companion(asset: &Asset, which: &str) -> DomainError {
    DomainError::InvalidValue {
        reason: format!("rank of {} carries no '{which}' companion", asset.oid()),
    }
}

/// 具备排序属性的实体
pub trait Ranked: AssetKind {
    const RANK_ATTRIBUTE: &'static str = "Order";

    fn rank(&self) -> Rank<Self> {
        Rank::new(self.asset().clone(), Self::RANK_ATTRIBUTE)
    }
}
