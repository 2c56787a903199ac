//! 提交与操作（commit）
//!
//! 提交流程：
//! 1. 启用校验时先做本地必填校验，失败即返回 `ValidationFailure`，不发生网络调用；
//! 2. 通过命令服务持久化待提交变更，得到稳定标识；
//! 3. 重新键控缓存、丢弃临时标识、把待提交变更折叠为干净值。
//!
//! 任何失败都保留容器中的待提交变更，调用方修正数据后可以重试。
//!
use crate::attribute::Freshness;
use crate::cache::ContainerRef;
use crate::error::{DomainError, DomainResult};
use crate::oid::Oid;
use crate::remote::PendingChanges;
use crate::session::Session;
use crate::value::AttributeValue;

impl Session {
    /// 必填校验：新实体要求全部必填属性非空；已持久化实体只检查待提交的必填属性
    pub(crate) fn invalid_attributes(&self, container: &ContainerRef) -> DomainResult<Vec<String>> {
        let container = container.borrow();
        let descriptor = self.asset_type(container.asset_type())?;
        let is_new = container.is_new();

        let mut invalid = Vec::new();
        for definition in descriptor.required_attributes() {
            let name = definition.name();
            if !is_new && !container.has_pending(name) {
                continue;
            }
            let present = match container.get(name) {
                None => false,
                Some(AttributeValue::Relations(items)) => !items.is_empty(),
                Some(value) => !value.is_null(),
            };
            if !present {
                invalid.push(name.to_string());
            }
        }
        Ok(invalid)
    }

    pub(crate) fn commit(&self, container: &ContainerRef, comment: Option<&str>) -> DomainResult<Oid> {
        if self.config().validation_enabled() {
            let attributes = self.invalid_attributes(container)?;
            if !attributes.is_empty() {
                return Err(DomainError::ValidationFailure { attributes });
            }
        }

        let pending = {
            let container = container.borrow();
            PendingChanges {
                oid: container.oid().clone(),
                asset_type: container.asset_type().to_string(),
                changes: container.pending_changes(),
            }
        };
        if pending.oid.is_stable() && pending.changes.is_empty() {
            tracing::trace!(oid = %pending.oid, "nothing to commit");
            return Ok(pending.oid);
        }

        tracing::debug!(
            oid = %pending.oid,
            changes = pending.changes.len(),
            "save"
        );
        let stable = self
            .command_service()
            .save(&pending, comment)
            .inspect_err(|err| tracing::warn!(oid = %pending.oid, error = %err, "save rejected"))?;

        self.rekey(&pending.oid, &stable)?;
        container.borrow_mut().mark_clean();
        Ok(stable)
    }

    pub(crate) fn execute_operation(
        &self,
        container: &ContainerRef,
        operation: &str,
    ) -> DomainResult<Oid> {
        let (oid, asset_type) = {
            let container = container.borrow();
            (container.oid().clone(), container.asset_type().to_string())
        };
        if oid.is_ephemeral() {
            return Err(DomainError::InvalidOperation {
                operation: operation.to_string(),
                reason: format!("{oid} has not been committed"),
            });
        }
        let descriptor = self.asset_type(&asset_type)?;
        if descriptor.operation(operation).is_none() {
            return Err(DomainError::InvalidOperation {
                operation: operation.to_string(),
                reason: format!("{asset_type} declares no such operation"),
            });
        }

        tracing::debug!(%oid, operation, "execute operation");
        self.command_service()
            .execute_operation(&oid, operation)
            .inspect_err(|err| tracing::warn!(%oid, operation, error = %err, "operation refused"))
    }

    pub(crate) fn can_execute(&self, container: &ContainerRef, operation: &str) -> DomainResult<bool> {
        let (is_new, asset_type) = {
            let container = container.borrow();
            (container.is_new(), container.asset_type().to_string())
        };
        let descriptor = self.asset_type(&asset_type)?;
        let Some(descriptor) = descriptor.operation(operation) else {
            return Err(DomainError::InvalidOperation {
                operation: operation.to_string(),
                reason: format!("{asset_type} declares no such operation"),
            });
        };
        if is_new {
            return Ok(false);
        }
        let Some(validator) = descriptor.validator() else {
            return Ok(true);
        };
        match self.read_attribute(container, validator, Freshness::NonCachable)? {
            AttributeValue::Boolean(allowed) => Ok(allowed),
            AttributeValue::Null => Ok(false),
            other => Err(DomainError::TypeMismatch {
                expected: format!("boolean validator {validator}"),
                found: other
                    .kind()
                    .map(|kind| kind.to_string())
                    .unwrap_or_default(),
            }),
        }
    }
}
