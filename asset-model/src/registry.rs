//! 类型注册表（TypeRegistry）
//!
//! 以显式注册替代运行时反射：每个具体实体类型（`AssetKind`）声明资产类型与可选的判别值，
//! 注册后按资产类型分组，组内判别值变体按判别值升序在前，唯一的缺省变体在最后。
//! 分组索引在第一次解析时惰性构建，之后视为不可变。
//!
use crate::asset::Asset;
use crate::error::{DomainError, DomainResult};
use std::any::{Any, TypeId, type_name};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;

/// 具体实体类型的静态描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub asset_type: &'static str,
    /// 判别值：区分共享同一资产类型的多个客户端变体（如模板）
    pub discriminant: Option<i64>,
    /// 存在性校验与查询时预取的属性
    pub default_selection: &'static [&'static str],
    pub default_order: Option<&'static str>,
}

/// 具体实体类型
///
/// 实体是共享句柄 `Asset` 的新类型包装；通常由 `#[asset_kind]` 宏生成实现。
pub trait AssetKind: Sized + 'static {
    const ASSET_TYPE: &'static str;
    const DISCRIMINANT: Option<i64> = None;
    const DEFAULT_SELECTION: &'static [&'static str] = &[];
    const DEFAULT_ORDER: Option<&'static str> = None;

    fn from_asset(asset: Asset) -> Self;

    fn asset(&self) -> &Asset;

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor {
            asset_type: Self::ASSET_TYPE,
            discriminant: Self::DISCRIMINANT,
            default_selection: Self::DEFAULT_SELECTION,
            default_order: Self::DEFAULT_ORDER,
        }
    }
}

type Factory = fn(Asset) -> Box<dyn Any>;

fn construct<K: AssetKind>(asset: Asset) -> Box<dyn Any> {
    Box::new(K::from_asset(asset))
}

/// 一条注册：类型信息 + 工厂函数
#[derive(Clone, Copy)]
pub struct Registration {
    type_id: TypeId,
    kind_name: &'static str,
    descriptor: TypeDescriptor,
    factory: Factory,
}

impl Registration {
    pub fn of<K: AssetKind>() -> Self {
        Self {
            type_id: TypeId::of::<K>(),
            kind_name: type_name::<K>(),
            descriptor: K::descriptor(),
            factory: construct::<K>,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind_name
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn is<K: AssetKind>(&self) -> bool {
        self.type_id == TypeId::of::<K>()
    }

    pub(crate) fn instantiate(&self, asset: Asset) -> Materialized {
        Materialized {
            kind_name: self.kind_name,
            type_id: self.type_id,
            asset: asset.clone(),
            inner: (self.factory)(asset),
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("kind", &self.kind_name)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// 注册表
#[derive(Debug, Default)]
pub struct TypeRegistry {
    registrations: Vec<Registration>,
    index: OnceCell<HashMap<&'static str, Vec<usize>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册具体实体类型
    ///
    /// 同一 Rust 类型重复注册、同一资产类型下判别值重复均报 `AlreadyRegistered`；
    /// 同一资产类型出现两个缺省变体报 `DuplicateDefaultVariant`。
    pub fn register<K: AssetKind>(&mut self) -> DomainResult<()> {
        let candidate = Registration::of::<K>();
        for existing in &self.registrations {
            if existing.type_id == candidate.type_id {
                return Err(DomainError::AlreadyRegistered {
                    kind: candidate.kind_name.to_string(),
                });
            }
            if existing.descriptor.asset_type != candidate.descriptor.asset_type {
                continue;
            }
            match (existing.descriptor.discriminant, candidate.descriptor.discriminant) {
                (None, None) => {
                    return Err(DomainError::DuplicateDefaultVariant {
                        asset_type: candidate.descriptor.asset_type.to_string(),
                        existing: existing.kind_name,
                        duplicate: candidate.kind_name,
                    });
                }
                (Some(a), Some(b)) if a == b => {
                    return Err(DomainError::AlreadyRegistered {
                        kind: format!(
                            "{} ({}, discriminant {b})",
                            candidate.kind_name, candidate.descriptor.asset_type
                        ),
                    });
                }
                _ => {}
            }
        }
        self.registrations.push(candidate);
        self.index.take();
        Ok(())
    }

    /// 链式注册
    pub fn with<K: AssetKind>(mut self) -> DomainResult<Self> {
        self.register::<K>()?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn registration_of<K: AssetKind>(&self) -> Option<&Registration> {
        self.registrations.iter().find(|r| r.is::<K>())
    }

    /// 某资产类型的候选列表（判别值变体在前，缺省变体在后）
    pub fn candidates(&self, asset_type: &str) -> Vec<&Registration> {
        self.index()
            .get(asset_type)
            .map(|positions| positions.iter().map(|&i| &self.registrations[i]).collect())
            .unwrap_or_default()
    }

    /// 该资产类型是否存在判别值变体
    pub fn has_discriminated(&self, asset_type: &str) -> bool {
        self.candidates(asset_type)
            .iter()
            .any(|r| r.descriptor.discriminant.is_some())
    }

    fn index(&self) -> &HashMap<&'static str, Vec<usize>> {
        self.index.get_or_init(|| {
            let mut groups: HashMap<&'static str, Vec<usize>> = HashMap::new();
            for (i, registration) in self.registrations.iter().enumerate() {
                groups
                    .entry(registration.descriptor.asset_type)
                    .or_default()
                    .push(i);
            }
            for positions in groups.values_mut() {
                // None 排在所有 Some 之后
                positions.sort_by_key(|&i| {
                    let discriminant = self.registrations[i].descriptor.discriminant;
                    (discriminant.is_none(), discriminant)
                });
            }
            tracing::debug!(
                kinds = self.registrations.len(),
                asset_types = groups.len(),
                "type registry built"
            );
            groups
        })
    }
}

/// 类型擦除的实体实例，可还原为解析出的具体类型
pub struct Materialized {
    kind_name: &'static str,
    type_id: TypeId,
    asset: Asset,
    inner: Box<dyn Any>,
}

impl Materialized {
    pub fn kind_name(&self) -> &'static str {
        self.kind_name
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    pub fn is<K: AssetKind>(&self) -> bool {
        self.type_id == TypeId::of::<K>()
    }

    /// 还原为具体类型；类型不符时原样返回
    pub fn downcast<K: AssetKind>(self) -> Result<K, Self> {
        let Materialized {
            kind_name,
            type_id,
            asset,
            inner,
        } = self;
        match inner.downcast::<K>() {
            Ok(kind) => Ok(*kind),
            Err(inner) => Err(Materialized {
                kind_name,
                type_id,
                asset,
                inner,
            }),
        }
    }
}

impl fmt::Debug for Materialized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Materialized")
            .field("kind", &self.kind_name)
            .field("oid", &self.asset.oid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset_model_macros::asset_kind;

    #[asset_kind(asset_type = "Story")]
    struct Story(Asset);

    #[asset_kind(asset_type = "Story", discriminant = 200)]
    struct StoryTemplate(Asset);

    #[asset_kind(asset_type = "Story", discriminant = 128)]
    struct ClosedStory(Asset);

    #[asset_kind(asset_type = "Story")]
    struct OtherStory(Asset);

    #[asset_kind(asset_type = "Story", discriminant = 200)]
    struct OtherTemplate(Asset);

    #[asset_kind(asset_type = "Member")]
    struct Member(Asset);

    #[test]
    fn candidates_put_discriminated_variants_first() {
        let registry = TypeRegistry::new()
            .with::<Story>()
            .unwrap()
            .with::<StoryTemplate>()
            .unwrap()
            .with::<ClosedStory>()
            .unwrap()
            .with::<Member>()
            .unwrap();

        let order: Vec<_> = registry
            .candidates("Story")
            .iter()
            .map(|r| r.descriptor().discriminant)
            .collect();
        assert_eq!(order, vec![Some(128), Some(200), None]);
        assert_eq!(registry.candidates("Member").len(), 1);
        assert!(registry.candidates("Defect").is_empty());
        assert!(registry.has_discriminated("Story"));
        assert!(!registry.has_discriminated("Member"));
    }

    #[test]
    fn duplicate_default_variant_is_rejected() {
        let mut registry = TypeRegistry::new();
        registry.register::<Story>().unwrap();
        match registry.register::<OtherStory>() {
            Err(DomainError::DuplicateDefaultVariant {
                asset_type,
                existing,
                duplicate,
            }) => {
                assert_eq!(asset_type, "Story");
                assert!(existing.ends_with("Story"));
                assert!(duplicate.ends_with("OtherStory"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_discriminant_and_type_are_rejected() {
        let mut registry = TypeRegistry::new();
        registry.register::<StoryTemplate>().unwrap();
        assert!(matches!(
            registry.register::<OtherTemplate>(),
            Err(DomainError::AlreadyRegistered { .. })
        ));
        assert!(matches!(
            registry.register::<StoryTemplate>(),
            Err(DomainError::AlreadyRegistered { .. })
        ));
    }

    #[test]
    fn registering_after_build_refreshes_index() {
        let mut registry = TypeRegistry::new();
        registry.register::<Story>().unwrap();
        assert_eq!(registry.candidates("Story").len(), 1);

        registry.register::<StoryTemplate>().unwrap();
        assert_eq!(registry.candidates("Story").len(), 2);
        assert!(registry.registration_of::<StoryTemplate>().is_some());
    }
}
