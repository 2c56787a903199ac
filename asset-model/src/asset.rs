//! 实体句柄（Asset）
//!
//! 所有具体实体类型共享的扁平句柄：会话 + 共享容器。
//! 同一标识的多个句柄指向缓存中同一个容器，提交后的重新键控对它们同时可见。
//! 相等与哈希委托给标识。
//!
//! 提交会把临时标识重新键控为稳定标识，句柄的哈希随之改变：
//! 提交前放入 `HashSet` / `HashMap` 键中的临时句柄在提交后无法再被找到，
//! 应在提交后（或以稳定的 `Oid` 为键）再放入哈希集合。
//!
use crate::attribute::{Freshness, Property};
use crate::cache::ContainerRef;
use crate::error::DomainResult;
use crate::oid::Oid;
use crate::rank::Rank;
use crate::registry::AssetKind;
use crate::relation::RelationCollection;
use crate::session::Session;
use crate::value::{AttributeType, AttributeValue};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Clone)]
pub struct Asset {
    session: Session,
    container: ContainerRef,
}

impl Asset {
    pub(crate) fn new(session: Session, container: ContainerRef) -> Self {
        Self { session, container }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn container(&self) -> &ContainerRef {
        &self.container
    }

    pub fn oid(&self) -> Oid {
        self.container.borrow().oid().clone()
    }

    pub fn asset_type(&self) -> String {
        self.container.borrow().asset_type().to_string()
    }

    /// 尚未提交（临时标识）
    pub fn is_new(&self) -> bool {
        self.container.borrow().is_new()
    }

    pub fn is_dirty(&self) -> bool {
        self.container.borrow().is_dirty()
    }

    // --- 类型化属性 ---

    pub fn get<T: AttributeType>(&self, property: &Property<T>) -> DomainResult<Option<T>> {
        self.session.read_property(&self.container, property)
    }

    pub fn set<T: AttributeType>(&self, property: &Property<T>, value: T) -> DomainResult<()> {
        self.session
            .write_property(&self.container, property, Some(value))
    }

    pub fn set_null<T: AttributeType>(&self, property: &Property<T>) -> DomainResult<()> {
        self.session.write_property(&self.container, property, None)
    }

    // --- 原始属性 ---

    pub fn get_value(&self, name: &str, freshness: Freshness) -> DomainResult<AttributeValue> {
        self.session.read_attribute(&self.container, name, freshness)
    }

    pub fn set_value(&self, name: &str, value: AttributeValue) -> DomainResult<()> {
        self.session.write_attribute(&self.container, name, value)
    }

    pub fn invalidate(&self, name: &str) {
        self.container.borrow_mut().invalidate(name);
    }

    pub fn invalidate_all(&self) {
        self.container.borrow_mut().invalidate_all();
    }

    // --- 提交与操作 ---

    /// 本地必填校验，返回缺失值的属性名
    pub fn invalid_attributes(&self) -> DomainResult<Vec<String>> {
        self.session.invalid_attributes(&self.container)
    }

    /// 提交，返回稳定标识
    pub fn commit(&self, comment: Option<&str>) -> DomainResult<Oid> {
        self.session.commit(&self.container, comment)
    }

    pub fn execute_operation(&self, operation: &str) -> DomainResult<Oid> {
        self.session.execute_operation(&self.container, operation)
    }

    /// 操作在当前状态下是否允许（读取操作的校验属性，不可缓存）
    pub fn can_execute(&self, operation: &str) -> DomainResult<bool> {
        self.session.can_execute(&self.container, operation)
    }

    // --- 门面 ---

    /// 读写名称相同的关系集合
    pub fn relation<K: AssetKind>(&self, name: &str) -> RelationCollection<K> {
        RelationCollection::new(self.clone(), name, name)
    }

    /// 读写名称不同的关系集合（按过滤名读取，按基础名修改）
    pub fn relation_with<K: AssetKind>(&self, read: &str, write: &str) -> RelationCollection<K> {
        RelationCollection::new(self.clone(), read, write)
    }

    pub fn rank<K: AssetKind>(&self, attribute: &str) -> Rank<K> {
        Rank::new(self.clone(), attribute)
    }
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.oid() == other.oid()
    }
}

impl Eq for Asset {}

/// 哈希取自当前标识，临时句柄提交后哈希会变化
impl Hash for Asset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.oid().hash(state);
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Asset").field(&self.oid()).finish()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.oid())
    }
}
