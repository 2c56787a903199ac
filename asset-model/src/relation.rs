//! 关系集合（RelationCollection）
//!
//! 以（所属实体, 读取名, 写入名）三元组描述一个多值关系视图：
//! 读取名可以带类型过滤（如 `Owners:Member`），写入名总是基础关系（如 `Owners`）。
//!
//! 修改会立即提交所属实体，随后使读取名的缓存失效；读取总是重新取回完整成员列表。
//!
use crate::asset::Asset;
use crate::attribute::Freshness;
use crate::error::{DomainError, DomainResult};
use crate::oid::Oid;
use crate::registry::AssetKind;
use crate::value::{AttributeValue, ValueKind};
use std::marker::PhantomData;

pub struct RelationCollection<K: AssetKind> {
    owner: Asset,
    read_name: String,
    write_name: String,
    forced_read_only: bool,
    _kind: PhantomData<fn() -> K>,
}

impl<K: AssetKind> RelationCollection<K> {
    pub fn new(owner: Asset, read_name: impl Into<String>, write_name: impl Into<String>) -> Self {
        Self {
            owner,
            read_name: read_name.into(),
            write_name: write_name.into(),
            forced_read_only: false,
            _kind: PhantomData,
        }
    }

    /// 同一三元组的只读视图
    pub fn read_only(self) -> Self {
        Self {
            forced_read_only: true,
            ..self
        }
    }

    pub fn owner(&self) -> &Asset {
        &self.owner
    }

    pub fn read_name(&self) -> &str {
        &self.read_name
    }

    pub fn write_name(&self) -> &str {
        &self.write_name
    }

    pub fn is_read_only(&self) -> DomainResult<bool> {
        if self.forced_read_only {
            return Ok(true);
        }
        let definition = self
            .owner
            .session()
            .attribute_definition(&self.owner.asset_type(), &self.write_name)?;
        Ok(definition.is_read_only())
    }

    pub fn add(&self, item: &K) -> DomainResult<()> {
        self.ensure_writable()?;
        let member = item.asset().oid();
        self.owner
            .container()
            .borrow_mut()
            .add(&self.write_name, member)?;
        self.flush()
    }

    pub fn remove(&self, item: &K) -> DomainResult<()> {
        self.ensure_writable()?;
        let member = item.asset().oid();
        self.owner
            .container()
            .borrow_mut()
            .remove(&self.write_name, &member)?;
        self.flush()
    }

    /// 逐个移除当前成员后提交一次
    pub fn clear(&self) -> DomainResult<()> {
        self.ensure_writable()?;
        let members = self.members()?;
        {
            let mut container = self.owner.container().borrow_mut();
            for member in &members {
                container.remove(&self.write_name, member)?;
            }
        }
        self.flush()
    }

    pub fn contains(&self, item: &K) -> DomainResult<bool> {
        let member = item.asset().oid();
        Ok(self.members()?.contains(&member))
    }

    /// 当前成员，按 `K` 实例化（乐观，不再逐个校验存在性）
    pub fn to_vec(&self) -> DomainResult<Vec<K>> {
        let session = self.owner.session();
        let mut items = Vec::new();
        for member in self.members()? {
            let Some(materialized) = session.materialize(&member, false)? else {
                continue;
            };
            match materialized.downcast::<K>() {
                Ok(item) => items.push(item),
                Err(other) => {
                    tracing::trace!(%member, kind = other.kind_name(), "skipped foreign member");
                }
            }
        }
        Ok(items)
    }

    pub fn iter(&self) -> DomainResult<std::vec::IntoIter<K>> {
        Ok(self.to_vec()?.into_iter())
    }

    /// 服务端聚合计数
    pub fn count(&self) -> DomainResult<i64> {
        let name = format!(
            "{}{}",
            self.read_name,
            self.owner.session().config().count_suffix()
        );
        match self.owner.get_value(&name, Freshness::NonCachable)? {
            AttributeValue::Integer(count) => Ok(count),
            AttributeValue::Null => Ok(0),
            other => Err(DomainError::TypeMismatch {
                expected: ValueKind::Integer.to_string(),
                found: other
                    .kind()
                    .map(|kind| kind.to_string())
                    .unwrap_or_default(),
            }),
        }
    }

    fn members(&self) -> DomainResult<Vec<Oid>> {
        self.owner
            .get_value(&self.read_name, Freshness::NonCachable)?
            .relations()
    }

    fn ensure_writable(&self) -> DomainResult<()> {
        if self.is_read_only()? {
            return Err(DomainError::ReadOnlyViolation {
                attribute: self.write_name.clone(),
            });
        }
        let definition = self
            .owner
            .session()
            .attribute_definition(&self.owner.asset_type(), &self.write_name)?;
        if definition.kind() != ValueKind::Relation || !definition.is_multi_value() {
            return Err(DomainError::TypeMismatch {
                expected: "multi-value relation".to_string(),
                found: definition.kind().to_string(),
            });
        }
        Ok(())
    }

    fn flush(&self) -> DomainResult<()> {
        self.owner.commit(None)?;
        self.owner.invalidate(&self.read_name);
        Ok(())
    }
}
