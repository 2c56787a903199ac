//! 类型解析（resolve）
//!
//! 给定标识，决定要实例化的具体类型：
//! 1. 由标识中的资产类型取候选列表，没有候选即不存在；
//! 2. 缺省变体：不校验时直接返回（乐观，用于查询结果）；校验时先取回默认选择确认存在，
//!    并把取回的记录合并进缓存；
//! 3. 判别值变体：每次调用最多解析一次记录的判别值（不校验时走可缓存读取，校验时强制取回），
//!    返回第一个判别值相等的候选；
//! 4. 判别值无法解析（记录不存在）即不存在。
//!
//! 固定标识与固定远端状态下，解析结果是确定的。
//!
use crate::attribute::Freshness;
use crate::error::{DomainError, DomainResult};
use crate::oid::Oid;
use crate::registry::{Registration, TypeDescriptor};
use crate::session::Session;
use crate::value::AttributeValue;

/// 判别值解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discriminant {
    Absent,
    Value(Option<i64>),
}

impl Session {
    /// 解析具体类型；`Ok(None)` 表示记录不存在（或没有可用的类型）
    pub fn resolve(&self, oid: &Oid, validate: bool) -> DomainResult<Option<Registration>> {
        let candidates = self.registry().candidates(oid.asset_type());
        if candidates.is_empty() {
            tracing::debug!(%oid, "no registered kind for asset type");
            return Ok(None);
        }

        let mut discriminant = None;
        for candidate in candidates {
            match candidate.descriptor().discriminant {
                None => {
                    if discriminant == Some(Discriminant::Absent) {
                        return Ok(None);
                    }
                    if !validate {
                        return Ok(Some(*candidate));
                    }
                    return Ok(self
                        .confirm_exists(oid, candidate.descriptor())?
                        .then_some(*candidate));
                }
                Some(expected) => {
                    let actual = match discriminant {
                        Some(resolved) => resolved,
                        None => {
                            let resolved = self.resolve_discriminant(oid, validate)?;
                            discriminant = Some(resolved);
                            resolved
                        }
                    };
                    match actual {
                        Discriminant::Absent => return Ok(None),
                        Discriminant::Value(value) if value == Some(expected) => {
                            tracing::trace!(
                                %oid,
                                kind = candidate.kind_name(),
                                "resolved by discriminant"
                            );
                            return Ok(Some(*candidate));
                        }
                        Discriminant::Value(_) => {}
                    }
                }
            }
        }
        Ok(None)
    }

    fn resolve_discriminant(&self, oid: &Oid, validate: bool) -> DomainResult<Discriminant> {
        let attribute = self.config().state_attribute();
        if oid.is_ephemeral() {
            // 临时实体只存在于本会话缓存中
            let Some(container) = self.cached(oid) else {
                return Ok(Discriminant::Absent);
            };
            let value = container.borrow().get(attribute);
            return discriminant_of(attribute, value.unwrap_or(AttributeValue::Null));
        }

        let fetched = match self.cached(oid) {
            Some(container) if !validate => {
                match self.read_attribute(&container, attribute, Freshness::Cachable) {
                    Ok(value) => value,
                    Err(DomainError::NotFound { .. }) => return Ok(Discriminant::Absent),
                    Err(err) => return Err(err),
                }
            }
            _ => match self.query_service().retrieve_attribute(oid, attribute)? {
                Some(value) => {
                    self.container(oid)
                        .borrow_mut()
                        .merge_clean(attribute, value.clone());
                    value
                }
                None => return Ok(Discriminant::Absent),
            },
        };
        discriminant_of(attribute, fetched)
    }

    fn confirm_exists(&self, oid: &Oid, descriptor: &TypeDescriptor) -> DomainResult<bool> {
        if oid.is_ephemeral() {
            return Ok(self.is_cached(oid));
        }
        let selection: Vec<String> = descriptor
            .default_selection
            .iter()
            .map(|name| name.to_string())
            .collect();
        tracing::debug!(%oid, "existence check");
        match self.query_service().retrieve(oid, &selection)? {
            Some(record) => {
                self.container(oid).borrow_mut().merge_record(&record);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn discriminant_of(attribute: &str, value: AttributeValue) -> DomainResult<Discriminant> {
    match value {
        AttributeValue::Null => Ok(Discriminant::Value(None)),
        AttributeValue::Integer(code) => Ok(Discriminant::Value(Some(code))),
        other => Err(DomainError::TypeMismatch {
            expected: format!("integer discriminant in {attribute}"),
            found: other
                .kind()
                .map(|kind| kind.to_string())
                .unwrap_or_default(),
        }),
    }
}
