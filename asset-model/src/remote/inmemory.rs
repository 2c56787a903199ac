//! 进程内资产存储（InMemoryAssetStore）
//!
//! 同时实现元模型、查询服务与命令服务，记录保存在 `DashMap` 中。
//! 每次远端调用都会记入调用日志，测试据此断言往返次数与提交内容。
//!
//! 服务端行为：
//! - 派生属性：`Base:Type` 按类型过滤关系成员，`Base.@Count` 返回成员数；
//! - 操作校验属性（如 `CheckInactivate`）按当前状态求值为布尔值；
//! - 排序属性返回带伴随键的排名，新记录缺省排到末尾；
//!   相邻键之间已无中点时，读取前按原顺序把该属性的键重新等距排布；
//! - 新记录缺省状态为 `ACTIVE`，缺失必填属性时报 `DataViolation`。
//!
use crate::attribute::AttributePath;
use crate::capability::asset_state;
use crate::config::{DEFAULT_COUNT_SUFFIX, DEFAULT_STATE_ATTRIBUTE};
use crate::error::{DomainError, DomainResult};
use crate::oid::Oid;
use crate::rank::{RankKey, RankValue};
use crate::remote::{
    AttributeChange, CommandService, PendingChanges, Query, QueryService, RawRecord,
};
use crate::schema::{AssetTypeDescriptor, MetaModel, StaticMetaModel};
use crate::value::{AttributeValue, ValueKind};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// 新排名键之间的间隔
pub const RANK_GAP: i64 = 1 << 16;

const FIRST_KEY: u64 = 1000;

type Attributes = BTreeMap<String, AttributeValue>;

/// 调用日志条目
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Query {
        asset_type: String,
    },
    Retrieve {
        oid: Oid,
    },
    RetrieveAttribute {
        oid: Oid,
        attribute: String,
    },
    Save {
        oid: Oid,
        changes: Vec<AttributeChange>,
        comment: Option<String>,
    },
    Operation {
        oid: Oid,
        operation: String,
    },
}

#[derive(Debug)]
pub struct InMemoryAssetStore {
    meta: StaticMetaModel,
    records: DashMap<Oid, Attributes>,
    next_key: AtomicU64,
    journal: Mutex<Vec<RemoteCall>>,
    save_rejection: Mutex<Option<String>>,
}

impl InMemoryAssetStore {
    pub fn new(meta: StaticMetaModel) -> Self {
        Self {
            meta,
            records: DashMap::new(),
            next_key: AtomicU64::new(FIRST_KEY),
            journal: Mutex::new(Vec::new()),
            save_rejection: Mutex::new(None),
        }
    }

    /// 直接写入一条记录（不记日志、不做必填校验），缺省值与保存时一致
    pub fn seed<I, N>(&self, asset_type: &str, attributes: I) -> DomainResult<Oid>
    where
        I: IntoIterator<Item = (N, AttributeValue)>,
        N: Into<String>,
    {
        let descriptor = self.meta.asset_type(asset_type)?;
        let mut record = Attributes::new();
        for (name, value) in attributes {
            let name = name.into();
            descriptor.require_attribute(&name)?;
            record.insert(name, normalize(value));
        }
        self.apply_defaults(&descriptor, &mut record);
        let oid = self.allocate(asset_type)?;
        self.records.insert(oid.clone(), record);
        Ok(oid)
    }

    /// 存储中的原始属性（不含派生值）
    pub fn record(&self, oid: &Oid) -> Option<Attributes> {
        self.records.get(oid).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.journal.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.journal.lock().clear();
    }

    /// 设置后所有保存都被拒绝（`DataViolation`），传 `None` 恢复
    pub fn reject_saves(&self, reason: Option<String>) {
        *self.save_rejection.lock() = reason;
    }

    fn log(&self, call: RemoteCall) {
        self.journal.lock().push(call);
    }

    fn allocate(&self, asset_type: &str) -> DomainResult<Oid> {
        let key = self.next_key.fetch_add(1, AtomicOrdering::Relaxed);
        Oid::stable(asset_type, key.to_string())
    }

    fn apply_defaults(&self, descriptor: &AssetTypeDescriptor, record: &mut Attributes) {
        for definition in descriptor.attributes() {
            let name = definition.name();
            let missing = record.get(name).is_none_or(AttributeValue::is_null);
            if !missing {
                continue;
            }
            if definition.kind() == ValueKind::Rank {
                let last = self.rank_keys(descriptor.token(), name).last().copied();
                let key = last.map_or(0, |key| key + RANK_GAP);
                record.insert(
                    name.to_string(),
                    AttributeValue::Rank(RankValue::at(RankKey::from_raw(key))),
                );
            } else if name == DEFAULT_STATE_ATTRIBUTE && definition.kind() == ValueKind::Integer {
                record.insert(
                    name.to_string(),
                    AttributeValue::Integer(asset_state::ACTIVE),
                );
            }
        }
    }

    /// 同类型记录在某个排序属性上的全部键（升序）
    fn rank_keys(&self, asset_type: &str, attribute: &str) -> Vec<i64> {
        let mut keys: Vec<i64> = self
            .records
            .iter()
            .filter(|entry| entry.key().asset_type() == asset_type)
            .filter_map(|entry| match entry.value().get(attribute) {
                Some(AttributeValue::Rank(rank)) => Some(rank.key().raw()),
                _ => None,
            })
            .collect();
        keys.sort_unstable();
        keys
    }

    /// 任一排序属性上相邻键的间隔不足以取中点时，重新等距排布该属性的键
    fn make_rank_room(&self, descriptor: &AssetTypeDescriptor) {
        let asset_type = descriptor.token();
        for definition in descriptor.attributes() {
            if definition.kind() != ValueKind::Rank {
                continue;
            }
            let keys = self.rank_keys(asset_type, definition.name());
            if keys.windows(2).any(|pair| pair[1] - pair[0] < 2) {
                self.rebalance(asset_type, definition.name());
            }
        }
    }

    /// 保持（键, 标识）顺序，把键改写为 `0, RANK_GAP, 2 * RANK_GAP, ...`
    fn rebalance(&self, asset_type: &str, attribute: &str) {
        let mut ranked: Vec<(i64, Oid)> = self
            .records
            .iter()
            .filter(|entry| entry.key().asset_type() == asset_type)
            .filter_map(|entry| match entry.value().get(attribute) {
                Some(AttributeValue::Rank(rank)) => Some((rank.key().raw(), entry.key().clone())),
                _ => None,
            })
            .collect();
        ranked.sort();

        for (index, (_, oid)) in ranked.iter().enumerate() {
            if let Some(mut record) = self.records.get_mut(oid) {
                let key = RankKey::from_raw(index as i64 * RANK_GAP);
                record.insert(attribute.to_string(), AttributeValue::Rank(RankValue::at(key)));
            }
        }
        tracing::debug!(asset_type, attribute, records = ranked.len(), "rebalanced rank keys");
    }

    fn descriptor(&self, oid: &Oid) -> DomainResult<Arc<AssetTypeDescriptor>> {
        self.meta.asset_type(oid.asset_type())
    }

    /// 按服务端规则求值属性；调用方不得持有 `records` 的任何引用
    fn evaluate(&self, oid: &Oid, record: &Attributes, name: &str) -> DomainResult<AttributeValue> {
        let descriptor = self.descriptor(oid)?;
        if let Some(operation) = descriptor
            .operations()
            .find(|operation| operation.validator() == Some(name))
        {
            let state = record.get(DEFAULT_STATE_ATTRIBUTE);
            return Ok(AttributeValue::Boolean(allows(operation.name(), state)));
        }

        let path = AttributePath::parse(name, DEFAULT_COUNT_SUFFIX);
        if path.is_plain() {
            let definition = descriptor.require_attribute(name)?;
            let stored = record.get(name).cloned().unwrap_or(AttributeValue::Null);
            return match (definition.kind(), stored) {
                (ValueKind::Rank, AttributeValue::Rank(rank)) => {
                    Ok(AttributeValue::Rank(self.with_companions(oid, name, rank.key())))
                }
                (_, stored) => Ok(stored),
            };
        }

        descriptor.require_attribute(path.base())?;
        let members = record
            .get(path.base())
            .map(AttributeValue::relations)
            .transpose()?
            .unwrap_or_default();
        let members = path.filter_members(members);
        if path.is_count() {
            Ok(AttributeValue::Integer(members.len() as i64))
        } else {
            Ok(AttributeValue::Relations(members))
        }
    }

    fn with_companions(&self, oid: &Oid, attribute: &str, key: RankKey) -> RankValue {
        let keys = self.rank_keys(oid.asset_type(), attribute);
        let raw = key.raw();
        let before = match keys.iter().rev().find(|other| **other < raw) {
            Some(previous) => previous + (raw - previous) / 2,
            None => raw - RANK_GAP,
        };
        let after = match keys.iter().find(|other| **other > raw) {
            Some(next) => raw + (next - raw) / 2,
            None => raw + RANK_GAP,
        };
        RankValue::with_companions(key, RankKey::from_raw(before), RankKey::from_raw(after))
    }

    fn apply_change(
        descriptor: &AssetTypeDescriptor,
        record: &mut Attributes,
        change: &AttributeChange,
    ) -> DomainResult<()> {
        let name = change.attribute();
        let definition = descriptor.require_attribute(name)?;
        if definition.is_read_only() {
            return Err(DomainError::DataViolation {
                reason: format!("{name} is read-only"),
            });
        }
        match change {
            AttributeChange::Set { value, .. } => {
                if !value.conforms_to(definition.kind(), definition.is_multi_value()) {
                    return Err(DomainError::DataViolation {
                        reason: format!("{name} does not accept {value:?}"),
                    });
                }
                record.insert(name.to_string(), normalize(value.clone()));
            }
            AttributeChange::Add { item, .. } | AttributeChange::Remove { item, .. } => {
                if definition.kind() != ValueKind::Relation || !definition.is_multi_value() {
                    return Err(DomainError::DataViolation {
                        reason: format!("{name} is not a multi-value relation"),
                    });
                }
                let mut members = record
                    .get(name)
                    .map(AttributeValue::relations)
                    .transpose()?
                    .unwrap_or_default();
                if let AttributeChange::Add { .. } = change {
                    if !members.contains(item) {
                        members.push(item.clone());
                    }
                } else {
                    members.retain(|member| member != item);
                }
                record.insert(name.to_string(), AttributeValue::Relations(members));
            }
        }
        Ok(())
    }
}

/// 排名只保存键，伴随键在读取时计算
fn normalize(value: AttributeValue) -> AttributeValue {
    match value {
        AttributeValue::Rank(rank) => AttributeValue::Rank(RankValue::at(rank.key())),
        other => other,
    }
}

fn allows(operation: &str, state: Option<&AttributeValue>) -> bool {
    let closed = matches!(state, Some(AttributeValue::Integer(asset_state::CLOSED)));
    match operation {
        "Inactivate" => !closed,
        "Reactivate" => closed,
        _ => true,
    }
}

/// 排序比较：`Null` 在前，不可比较的值视为相等
fn compare_values(left: Option<&AttributeValue>, right: Option<&AttributeValue>) -> Ordering {
    use AttributeValue as V;
    match (left, right) {
        (None | Some(V::Null), None | Some(V::Null)) => Ordering::Equal,
        (None | Some(V::Null), _) => Ordering::Less,
        (_, None | Some(V::Null)) => Ordering::Greater,
        (Some(V::Text(a)), Some(V::Text(b))) => a.cmp(b),
        (Some(V::Integer(a)), Some(V::Integer(b))) => a.cmp(b),
        (Some(V::Decimal(a)), Some(V::Decimal(b))) => a.total_cmp(b),
        (Some(V::Boolean(a)), Some(V::Boolean(b))) => a.cmp(b),
        (Some(V::Date(a)), Some(V::Date(b))) => a.cmp(b),
        (Some(V::Relation(a)), Some(V::Relation(b))) => a.cmp(b),
        (Some(V::Rank(a)), Some(V::Rank(b))) => a.compare(b),
        _ => Ordering::Equal,
    }
}

impl MetaModel for InMemoryAssetStore {
    fn asset_type(&self, token: &str) -> DomainResult<Arc<AssetTypeDescriptor>> {
        self.meta.asset_type(token)
    }
}

impl QueryService for InMemoryAssetStore {
    fn query(&self, query: &Query) -> DomainResult<Vec<RawRecord>> {
        self.log(RemoteCall::Query {
            asset_type: query.asset_type().to_string(),
        });
        let descriptor = self.meta.asset_type(query.asset_type())?;
        self.make_rank_room(&descriptor);

        let candidates: Vec<(Oid, Attributes)> = self
            .records
            .iter()
            .filter(|entry| entry.key().asset_type() == query.asset_type())
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut matched = Vec::with_capacity(candidates.len());
        for (oid, record) in candidates {
            let mut keep = true;
            for term in query.filter() {
                if self.evaluate(&oid, &record, &term.attribute)? != term.value {
                    keep = false;
                    break;
                }
            }
            if keep {
                matched.push((oid, record));
            }
        }

        match query.order_by() {
            Some(order) => matched.sort_by(|(a_oid, a), (b_oid, b)| {
                compare_values(a.get(order), b.get(order)).then_with(|| a_oid.cmp(b_oid))
            }),
            None => matched.sort_by(|(a, _), (b, _)| a.cmp(b)),
        }

        let mut results = Vec::with_capacity(matched.len());
        for (oid, record) in matched {
            let attributes = if query.selection().is_empty() {
                record
            } else {
                let mut selected = Attributes::new();
                for name in query.selection() {
                    selected.insert(name.clone(), self.evaluate(&oid, &record, name)?);
                }
                selected
            };
            results.push(RawRecord { oid, attributes });
        }
        Ok(results)
    }

    fn retrieve(&self, oid: &Oid, selection: &[String]) -> DomainResult<Option<RawRecord>> {
        self.log(RemoteCall::Retrieve { oid: oid.clone() });
        if let Ok(descriptor) = self.descriptor(oid) {
            self.make_rank_room(&descriptor);
        }
        let Some(record) = self.record(oid) else {
            return Ok(None);
        };
        let mut attributes = Attributes::new();
        for name in selection {
            attributes.insert(name.clone(), self.evaluate(oid, &record, name)?);
        }
        Ok(Some(RawRecord {
            oid: oid.clone(),
            attributes,
        }))
    }

    fn retrieve_attribute(
        &self,
        oid: &Oid,
        attribute: &str,
    ) -> DomainResult<Option<AttributeValue>> {
        self.log(RemoteCall::RetrieveAttribute {
            oid: oid.clone(),
            attribute: attribute.to_string(),
        });
        if let Ok(descriptor) = self.descriptor(oid) {
            self.make_rank_room(&descriptor);
        }
        match self.record(oid) {
            Some(record) => self.evaluate(oid, &record, attribute).map(Some),
            None => Ok(None),
        }
    }
}

impl CommandService for InMemoryAssetStore {
    fn save(&self, pending: &PendingChanges, comment: Option<&str>) -> DomainResult<Oid> {
        self.log(RemoteCall::Save {
            oid: pending.oid.clone(),
            changes: pending.changes.clone(),
            comment: comment.map(str::to_string),
        });
        if let Some(reason) = self.save_rejection.lock().clone() {
            return Err(DomainError::DataViolation { reason });
        }

        let descriptor = self.meta.asset_type(&pending.asset_type)?;
        let mut record = if pending.oid.is_ephemeral() {
            Attributes::new()
        } else {
            self.record(&pending.oid).ok_or_else(|| DomainError::NotFound {
                reason: format!("{} does not exist", pending.oid),
            })?
        };
        for change in &pending.changes {
            Self::apply_change(&descriptor, &mut record, change)?;
        }
        self.apply_defaults(&descriptor, &mut record);

        let missing: Vec<&str> = descriptor
            .required_attributes()
            .map(|definition| definition.name())
            .filter(|name| match record.get(*name) {
                None | Some(AttributeValue::Null) => true,
                Some(AttributeValue::Relations(items)) => items.is_empty(),
                Some(_) => false,
            })
            .collect();
        if !missing.is_empty() {
            return Err(DomainError::DataViolation {
                reason: format!("required attributes missing: {}", missing.join(", ")),
            });
        }

        let oid = if pending.oid.is_ephemeral() {
            self.allocate(&pending.asset_type)?
        } else {
            pending.oid.clone()
        };
        self.records.insert(oid.clone(), record);
        Ok(oid)
    }

    fn execute_operation(&self, oid: &Oid, operation: &str) -> DomainResult<Oid> {
        self.log(RemoteCall::Operation {
            oid: oid.clone(),
            operation: operation.to_string(),
        });
        let descriptor = self.descriptor(oid)?;
        if descriptor.operation(operation).is_none() {
            return Err(DomainError::InvalidOperation {
                operation: operation.to_string(),
                reason: format!("{} declares no such operation", oid.asset_type()),
            });
        }
        let Some(mut record) = self.record(oid) else {
            return Err(DomainError::NotFound {
                reason: format!("{oid} does not exist"),
            });
        };

        let refused = |reason: &str| DomainError::InvalidOperation {
            operation: operation.to_string(),
            reason: format!("{oid} {reason}"),
        };
        let state = record.get(DEFAULT_STATE_ATTRIBUTE);
        match operation {
            "Inactivate" => {
                if !allows(operation, state) {
                    return Err(refused("is already closed"));
                }
                record.insert(
                    DEFAULT_STATE_ATTRIBUTE.to_string(),
                    AttributeValue::Integer(asset_state::CLOSED),
                );
            }
            "Reactivate" => {
                if !allows(operation, state) {
                    return Err(refused("is not closed"));
                }
                record.insert(
                    DEFAULT_STATE_ATTRIBUTE.to_string(),
                    AttributeValue::Integer(asset_state::ACTIVE),
                );
            }
            "Delete" => {
                self.records.remove(oid);
                return Ok(oid.clone());
            }
            _ => return Err(refused("cannot run this operation here")),
        }
        self.records.insert(oid.clone(), record);
        Ok(oid.clone())
    }
}
