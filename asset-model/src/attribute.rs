//! 属性访问层
//!
//! 两级新鲜度：
//! - 可缓存读取：容器已有干净值则直接返回，否则取回单个属性、合并进容器并标记干净；
//! - 不可缓存读取：总是重新取回并直接返回，不触碰共享容器（审计字段、聚合值等）。
//!
//! 写入一律暂存到容器，提交前不发生远端调用。
//!
//! 派生属性名：`Base:Type` 表示按关联类型过滤的多值关系，`Base.@Count` 表示服务端聚合计数。
//! 派生属性总是只读，计数总是不可缓存。
//!
use crate::cache::ContainerRef;
use crate::error::{DomainError, DomainResult};
use crate::oid::Oid;
use crate::schema::AttributeDefinition;
use crate::session::Session;
use crate::value::{AttributeType, AttributeValue, ValueKind};
use std::fmt;
use std::marker::PhantomData;

/// 读取新鲜度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Freshness {
    Cachable,
    NonCachable,
}

/// 类型化属性声明
///
/// ```
/// use asset_model::attribute::Property;
///
/// const NAME: Property<String> = Property::cachable("Name");
/// assert_eq!(NAME.name(), "Name");
/// ```
pub struct Property<T> {
    name: &'static str,
    freshness: Freshness,
    _type: PhantomData<fn() -> T>,
}

impl<T> Property<T> {
    pub const fn cachable(name: &'static str) -> Self {
        Self {
            name,
            freshness: Freshness::Cachable,
            _type: PhantomData,
        }
    }

    pub const fn non_cachable(name: &'static str) -> Self {
        Self {
            name,
            freshness: Freshness::NonCachable,
            _type: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn freshness(&self) -> Freshness {
        self.freshness
    }
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Property<T> {}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("freshness", &self.freshness)
            .finish()
    }
}

/// 属性名解析结果：`Base[:Type][<count suffix>]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributePath<'a> {
    base: &'a str,
    type_filter: Option<&'a str>,
    count: bool,
}

impl<'a> AttributePath<'a> {
    pub fn parse(name: &'a str, count_suffix: &str) -> Self {
        let (rest, count) = match name.strip_suffix(count_suffix) {
            Some(rest) if !count_suffix.is_empty() => (rest, true),
            _ => (name, false),
        };
        let (base, type_filter) = match rest.split_once(':') {
            Some((base, filter)) => (base, Some(filter)),
            None => (rest, None),
        };
        Self {
            base,
            type_filter,
            count,
        }
    }

    pub fn base(&self) -> &'a str {
        self.base
    }

    pub fn type_filter(&self) -> Option<&'a str> {
        self.type_filter
    }

    pub fn is_count(&self) -> bool {
        self.count
    }

    pub fn is_plain(&self) -> bool {
        self.type_filter.is_none() && !self.count
    }

    /// 按类型过滤关系成员
    pub fn filter_members(&self, members: Vec<Oid>) -> Vec<Oid> {
        match self.type_filter {
            None => members,
            Some(filter) => members
                .into_iter()
                .filter(|oid| oid.asset_type() == filter)
                .collect(),
        }
    }
}

fn describe(kind: ValueKind, multi_value: bool) -> String {
    if multi_value {
        format!("{kind}[]")
    } else {
        kind.to_string()
    }
}

impl Session {
    /// 属性定义；派生名称由基础多值关系推导，且只读
    pub fn attribute_definition(
        &self,
        asset_type: &str,
        name: &str,
    ) -> DomainResult<AttributeDefinition> {
        let descriptor = self.meta_model().asset_type(asset_type)?;
        let path = AttributePath::parse(name, self.config().count_suffix());
        if path.is_plain() {
            return descriptor.require_attribute(name).cloned();
        }

        let base = descriptor.require_attribute(path.base())?;
        if base.kind() != ValueKind::Relation || !base.is_multi_value() {
            return Err(DomainError::TypeMismatch {
                expected: format!("multi-value relation for {name}"),
                found: describe(base.kind(), base.is_multi_value()),
            });
        }
        let definition = if path.is_count() {
            AttributeDefinition::builder()
                .name(name)
                .kind(ValueKind::Integer)
                .read_only(true)
                .build()
        } else {
            AttributeDefinition::builder()
                .name(name)
                .kind(ValueKind::Relation)
                .multi_value(true)
                .read_only(true)
                .maybe_related_type(path.type_filter().or(base.related_type()))
                .build()
        };
        Ok(definition)
    }

    pub(crate) fn read_attribute(
        &self,
        container: &ContainerRef,
        name: &str,
        freshness: Freshness,
    ) -> DomainResult<AttributeValue> {
        let path = AttributePath::parse(name, self.config().count_suffix());
        let oid = container.borrow().oid().clone();
        if oid.is_ephemeral() {
            return local_value(container, &path, name);
        }

        let freshness = if path.is_count() {
            Freshness::NonCachable
        } else {
            freshness
        };
        match freshness {
            Freshness::Cachable => {
                if let Some(value) = container.borrow().get(name) {
                    tracing::trace!(%oid, attribute = name, "cache hit");
                    return Ok(value);
                }
                let fetched = self.fetch_attribute(&oid, name)?;
                let mut container = container.borrow_mut();
                container.merge_clean(name, fetched);
                Ok(container.get(name).unwrap_or(AttributeValue::Null))
            }
            Freshness::NonCachable => self.fetch_attribute(&oid, name),
        }
    }

    pub(crate) fn fetch_attribute(&self, oid: &Oid, name: &str) -> DomainResult<AttributeValue> {
        tracing::debug!(%oid, attribute = name, "retrieve attribute");
        self.query_service()
            .retrieve_attribute(oid, name)?
            .ok_or_else(|| DomainError::NotFound {
                reason: format!("{oid} does not exist"),
            })
    }

    pub(crate) fn write_attribute(
        &self,
        container: &ContainerRef,
        name: &str,
        value: AttributeValue,
    ) -> DomainResult<()> {
        let asset_type = container.borrow().asset_type().to_string();
        let definition = self.attribute_definition(&asset_type, name)?;
        if definition.is_read_only() {
            return Err(DomainError::ReadOnlyViolation {
                attribute: name.to_string(),
            });
        }
        if !value.conforms_to(definition.kind(), definition.is_multi_value()) {
            return Err(DomainError::TypeMismatch {
                expected: describe(definition.kind(), definition.is_multi_value()),
                found: value
                    .kind()
                    .map(|kind| describe(kind, value.is_multi()))
                    .unwrap_or_else(|| "null".to_string()),
            });
        }
        container.borrow_mut().set(name, value);
        Ok(())
    }

    pub(crate) fn read_property<T: AttributeType>(
        &self,
        container: &ContainerRef,
        property: &Property<T>,
    ) -> DomainResult<Option<T>> {
        self.check_declared::<T>(container, property.name())?;
        let value = self.read_attribute(container, property.name(), property.freshness())?;
        if value.is_null() && !T::MULTI {
            return Ok(None);
        }
        T::from_value(&value).map(Some)
    }

    pub(crate) fn write_property<T: AttributeType>(
        &self,
        container: &ContainerRef,
        property: &Property<T>,
        value: Option<T>,
    ) -> DomainResult<()> {
        self.check_declared::<T>(container, property.name())?;
        let value = value.map_or(AttributeValue::Null, T::into_value);
        self.write_attribute(container, property.name(), value)
    }

    fn check_declared<T: AttributeType>(
        &self,
        container: &ContainerRef,
        name: &str,
    ) -> DomainResult<()> {
        let asset_type = container.borrow().asset_type().to_string();
        let definition = self.attribute_definition(&asset_type, name)?;
        if definition.kind() != T::KIND || definition.is_multi_value() != T::MULTI {
            return Err(DomainError::TypeMismatch {
                expected: describe(definition.kind(), definition.is_multi_value()),
                found: describe(T::KIND, T::MULTI),
            });
        }
        Ok(())
    }
}

/// 临时实体没有远端记录，派生值由本地容器推导
fn local_value(
    container: &ContainerRef,
    path: &AttributePath<'_>,
    name: &str,
) -> DomainResult<AttributeValue> {
    let base_name = if path.is_plain() { name } else { path.base() };
    let base = {
        let mut container = container.borrow_mut();
        match container.get(base_name) {
            Some(value) => value,
            None => {
                container.merge_clean(base_name, AttributeValue::Null);
                container.get(base_name).unwrap_or(AttributeValue::Null)
            }
        }
    };
    if path.is_plain() {
        return Ok(base);
    }
    let members = path.filter_members(base.relations()?);
    if path.is_count() {
        Ok(AttributeValue::Integer(members.len() as i64))
    } else {
        Ok(AttributeValue::Relations(members))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_derived_names() {
        let plain = AttributePath::parse("Name", ".@Count");
        assert!(plain.is_plain());
        assert_eq!(plain.base(), "Name");

        let filtered = AttributePath::parse("Owners:Member", ".@Count");
        assert_eq!(filtered.base(), "Owners");
        assert_eq!(filtered.type_filter(), Some("Member"));
        assert!(!filtered.is_count());

        let count = AttributePath::parse("Owners:Member.@Count", ".@Count");
        assert_eq!(count.base(), "Owners");
        assert_eq!(count.type_filter(), Some("Member"));
        assert!(count.is_count());
    }

    #[test]
    fn filter_members_by_type() {
        let path = AttributePath::parse("Children:Story", ".@Count");
        let members = vec![
            Oid::stable("Story", "1").unwrap(),
            Oid::stable("Defect", "2").unwrap(),
        ];
        assert_eq!(
            path.filter_members(members),
            vec![Oid::stable("Story", "1").unwrap()]
        );
    }

    #[test]
    fn properties_are_const_declarations() {
        const ESTIMATE: Property<f64> = Property::non_cachable("Estimate");
        let copy = ESTIMATE;
        assert_eq!(copy.name(), "Estimate");
        assert_eq!(copy.freshness(), Freshness::NonCachable);
    }
}
