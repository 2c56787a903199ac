//! 属性容器（Container）
//!
//! 一个标识对应一个容器，由记录缓存独占持有，多个实体句柄共享同一容器。
//! 每个属性槽记录两层状态：
//! - 已取回的干净值（clean）；
//! - 待提交的变更（pending）：整体替换，或多值关系的增删增量。
//!
//! 读取时以待提交变更覆盖干净值；增量变更在缺少干净值时无法给出完整视图，
//! 此时返回 `None`，由属性访问层取回基准值后再叠加。
//!
use crate::error::{DomainError, DomainResult};
use crate::oid::Oid;
use crate::remote::{AttributeChange, RawRecord};
use crate::value::AttributeValue;
use std::collections::BTreeMap;

/// 待提交变更
#[derive(Debug, Clone, PartialEq)]
enum Pending {
    Set(AttributeValue),
    Delta { added: Vec<Oid>, removed: Vec<Oid> },
}

#[derive(Debug, Clone, Default)]
struct Slot {
    clean: Option<AttributeValue>,
    pending: Option<Pending>,
}

impl Slot {
    fn view(&self) -> Option<AttributeValue> {
        match &self.pending {
            None => self.clean.clone(),
            Some(Pending::Set(value)) => Some(value.clone()),
            Some(Pending::Delta { added, removed }) => {
                let base = self.clean.as_ref()?.relations().ok()?;
                Some(AttributeValue::Relations(apply_delta(base, added, removed)))
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.clean.is_none() && self.pending.is_none()
    }
}

fn apply_delta(mut base: Vec<Oid>, added: &[Oid], removed: &[Oid]) -> Vec<Oid> {
    base.retain(|oid| !removed.contains(oid));
    for oid in added {
        if !base.contains(oid) {
            base.push(oid.clone());
        }
    }
    base
}

/// 某个标识的属性容器
#[derive(Debug, Clone)]
pub struct Container {
    oid: Oid,
    asset_type: String,
    slots: BTreeMap<String, Slot>,
}

impl Container {
    pub fn new(oid: Oid, asset_type: impl Into<String>) -> Self {
        Self {
            oid,
            asset_type: asset_type.into(),
            slots: BTreeMap::new(),
        }
    }

    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    pub fn asset_type(&self) -> &str {
        &self.asset_type
    }

    pub fn is_new(&self) -> bool {
        self.oid.is_ephemeral()
    }

    /// 当前视图（待提交变更覆盖干净值）；`None` 表示需要取回
    pub fn get(&self, name: &str) -> Option<AttributeValue> {
        self.slots.get(name).and_then(Slot::view)
    }

    /// 是否持有干净值
    pub fn has_clean(&self, name: &str) -> bool {
        self.slots.get(name).is_some_and(|slot| slot.clean.is_some())
    }

    pub fn has_pending(&self, name: &str) -> bool {
        self.slots.get(name).is_some_and(|slot| slot.pending.is_some())
    }

    /// 暂存整体替换
    pub fn set(&mut self, name: &str, value: AttributeValue) {
        self.slot_mut(name).pending = Some(Pending::Set(value));
    }

    /// 暂存多值关系新增
    pub fn add(&mut self, name: &str, item: Oid) -> DomainResult<()> {
        let slot = self.slot_mut(name);
        let Some(pending) = slot.pending.as_mut() else {
            slot.pending = Some(Pending::Delta {
                added: vec![item],
                removed: Vec::new(),
            });
            return Ok(());
        };
        match pending {
            Pending::Set(value) => {
                let current = relations_of(name, value)?;
                *value = AttributeValue::Relations(apply_delta(current, &[item], &[]));
            }
            Pending::Delta { added, removed } => {
                if let Some(pos) = removed.iter().position(|oid| *oid == item) {
                    removed.remove(pos);
                } else if !added.contains(&item) {
                    added.push(item);
                }
            }
        }
        Ok(())
    }

    /// 暂存多值关系移除
    pub fn remove(&mut self, name: &str, item: &Oid) -> DomainResult<()> {
        let slot = self.slot_mut(name);
        let Some(pending) = slot.pending.as_mut() else {
            slot.pending = Some(Pending::Delta {
                added: Vec::new(),
                removed: vec![item.clone()],
            });
            return Ok(());
        };
        match pending {
            Pending::Set(value) => {
                let current = relations_of(name, value)?;
                *value = AttributeValue::Relations(apply_delta(
                    current,
                    &[],
                    std::slice::from_ref(item),
                ));
            }
            Pending::Delta { added, removed } => {
                if let Some(pos) = added.iter().position(|oid| oid == item) {
                    added.remove(pos);
                } else if !removed.contains(item) {
                    removed.push(item.clone());
                }
            }
        }
        Ok(())
    }

    /// 多值关系的当前成员；`None` 表示需要取回
    pub fn values(&self, name: &str) -> Option<DomainResult<Vec<Oid>>> {
        self.get(name).map(|value| value.relations())
    }

    /// 合并取回的干净值（保留待提交变更）
    pub fn merge_clean(&mut self, name: &str, value: AttributeValue) {
        self.slot_mut(name).clean = Some(value);
    }

    pub fn merge_record(&mut self, record: &RawRecord) {
        for (name, value) in &record.attributes {
            self.merge_clean(name, value.clone());
        }
    }

    /// 丢弃干净值，下次可缓存读取将重新取回；待提交变更保留
    pub fn invalidate(&mut self, name: &str) {
        if let Some(slot) = self.slots.get_mut(name) {
            slot.clean = None;
            if slot.is_empty() {
                self.slots.remove(name);
            }
        }
    }

    pub fn invalidate_all(&mut self) {
        self.slots.retain(|_, slot| {
            slot.clean = None;
            !slot.is_empty()
        });
    }

    /// 提交成功后，把待提交变更折叠为干净值
    pub fn mark_clean(&mut self) {
        for slot in self.slots.values_mut() {
            match slot.pending.take() {
                None => {}
                Some(Pending::Set(value)) => slot.clean = Some(value),
                Some(pending @ Pending::Delta { .. }) => {
                    slot.pending = Some(pending);
                    slot.clean = slot.view();
                    slot.pending = None;
                }
            }
        }
        self.slots.retain(|_, slot| !slot.is_empty());
    }

    pub fn is_dirty(&self) -> bool {
        self.slots.values().any(|slot| slot.pending.is_some())
    }

    pub fn dirty_attributes(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.pending.is_some())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// 待提交变更（按属性名排序）
    pub fn pending_changes(&self) -> Vec<AttributeChange> {
        let mut changes = Vec::new();
        for (name, slot) in &self.slots {
            match &slot.pending {
                None => {}
                Some(Pending::Set(value)) => changes.push(AttributeChange::Set {
                    attribute: name.clone(),
                    value: value.clone(),
                }),
                Some(Pending::Delta { added, removed }) => {
                    changes.extend(added.iter().map(|item| AttributeChange::Add {
                        attribute: name.clone(),
                        item: item.clone(),
                    }));
                    changes.extend(removed.iter().map(|item| AttributeChange::Remove {
                        attribute: name.clone(),
                        item: item.clone(),
                    }));
                }
            }
        }
        changes
    }

    pub(crate) fn rekey(&mut self, oid: Oid) {
        self.oid = oid;
    }

    fn slot_mut(&mut self, name: &str) -> &mut Slot {
        self.slots.entry(name.to_string()).or_default()
    }
}

fn relations_of(name: &str, value: &AttributeValue) -> DomainResult<Vec<Oid>> {
    value.relations().map_err(|_| DomainError::TypeMismatch {
        expected: format!("relations for {name}"),
        found: value
            .kind()
            .map(|kind| kind.to_string())
            .unwrap_or_else(|| "null".to_string()),
    })
}
