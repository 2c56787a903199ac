//! 记录缓存（RecordCache）
//!
//! 会话级缓存：每个标识恰好一个容器。实体的所有读写都经由这里拿到共享容器，
//! 因而提交前的修改对共享同一标识的其他句柄立即可见。
//!
use crate::container::Container;
use crate::error::{DomainError, DomainResult};
use crate::oid::Oid;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// 共享容器引用
pub type ContainerRef = Rc<RefCell<Container>>;

#[derive(Debug, Default)]
pub struct RecordCache {
    containers: HashMap<Oid, ContainerRef>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回标识唯一的容器，不存在时按给定资产类型创建空容器
    pub fn get_or_create(&mut self, oid: &Oid, asset_type: &str) -> ContainerRef {
        self.containers
            .entry(oid.clone())
            .or_insert_with(|| {
                tracing::trace!(%oid, "container created");
                Rc::new(RefCell::new(Container::new(oid.clone(), asset_type)))
            })
            .clone()
    }

    /// 不创建的探测
    pub fn lookup(&self, oid: &Oid) -> Option<ContainerRef> {
        self.containers.get(oid).cloned()
    }

    /// 稳定标识分配后迁移容器，容器自身的标识同步更新
    pub fn rekey(&mut self, old: &Oid, new: &Oid) -> DomainResult<()> {
        if old == new {
            return Ok(());
        }
        if self.containers.contains_key(new) {
            return Err(DomainError::InvalidState {
                reason: format!("cannot rekey {old} onto cached identity {new}"),
            });
        }
        let container = self.containers.remove(old).ok_or_else(|| DomainError::NotFound {
            reason: format!("no cached container for {old}"),
        })?;
        container.borrow_mut().rekey(new.clone());
        self.containers.insert(new.clone(), container);
        tracing::debug!(%old, %new, "container rekeyed");
        Ok(())
    }

    pub fn contains(&self, oid: &Oid) -> bool {
        self.containers.contains_key(oid)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// 使所有容器的干净值失效（待提交变更保留）
    pub fn invalidate_all(&self) {
        for container in self.containers.values() {
            container.borrow_mut().invalidate_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_container_per_identity() {
        let mut cache = RecordCache::new();
        let oid = Oid::stable("Story", "1").unwrap();
        let a = cache.get_or_create(&oid, "Story");
        let b = cache.get_or_create(&oid, "Story");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        a.borrow_mut().set("Name", "Foo".into());
        assert_eq!(b.borrow().get("Name"), Some("Foo".into()));
    }

    #[test]
    fn lookup_does_not_create() {
        let cache = RecordCache::new();
        assert!(cache.lookup(&Oid::stable("Story", "1").unwrap()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn rekey_moves_the_same_container() {
        let mut cache = RecordCache::new();
        let old = Oid::ephemeral("Story");
        let new = Oid::stable("Story", "7").unwrap();
        let container = cache.get_or_create(&old, "Story");

        cache.rekey(&old, &new).unwrap();
        assert!(!cache.contains(&old));
        let moved = cache.lookup(&new).unwrap();
        assert!(Rc::ptr_eq(&container, &moved));
        assert_eq!(moved.borrow().oid(), &new);
    }

    #[test]
    fn rekey_rejects_unknown_or_occupied_identity() {
        let mut cache = RecordCache::new();
        let a = Oid::ephemeral("Story");
        let b = Oid::stable("Story", "1").unwrap();
        assert!(matches!(cache.rekey(&a, &b), Err(DomainError::NotFound { .. })));

        cache.get_or_create(&a, "Story");
        cache.get_or_create(&b, "Story");
        assert!(matches!(cache.rekey(&a, &b), Err(DomainError::InvalidState { .. })));
        assert!(cache.contains(&a));
    }
}
