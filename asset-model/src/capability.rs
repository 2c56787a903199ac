//! 能力（capability）
//!
//! 以可组合的 trait 替代深层继承：任意 `AssetKind` 按需实现
//! `Closable` / `Reactivatable` / `Attachable`，默认方法即完整行为。
//!
//! ```ignore
//! #[asset_kind(asset_type = "Story")]
//! struct Story(Asset);
//!
//! impl Closable for Story {}
//! impl Reactivatable for Story {}
//! ```
//!
use crate::attribute::Freshness;
use crate::error::{DomainError, DomainResult};
use crate::registry::AssetKind;
use crate::relation::RelationCollection;
use crate::value::AttributeValue;

/// 状态属性的取值
pub mod asset_state {
    pub const FUTURE: i64 = 0;
    pub const ACTIVE: i64 = 64;
    pub const CLOSED: i64 = 128;
    /// 模板变体的判别值
    pub const TEMPLATE: i64 = 200;
    pub const DELETED: i64 = 255;
}

fn read_state<K: AssetKind>(kind: &K) -> DomainResult<Option<i64>> {
    let asset = kind.asset();
    let attribute = asset.session().config().state_attribute().to_string();
    match asset.get_value(&attribute, Freshness::NonCachable)? {
        AttributeValue::Integer(state) => Ok(Some(state)),
        AttributeValue::Null => Ok(None),
        other => Err(DomainError::TypeMismatch {
            expected: format!("integer {attribute}"),
            found: other
                .kind()
                .map(|kind| kind.to_string())
                .unwrap_or_default(),
        }),
    }
}

fn run_and_refresh<K: AssetKind>(kind: &K, operation: &str) -> DomainResult<()> {
    let asset = kind.asset();
    asset.execute_operation(operation)?;
    let attribute = asset.session().config().state_attribute().to_string();
    asset.invalidate(&attribute);
    Ok(())
}

/// 可关闭
pub trait Closable: AssetKind {
    const CLOSE_OPERATION: &'static str = "Inactivate";

    fn is_closed(&self) -> DomainResult<bool> {
        Ok(read_state(self)? == Some(asset_state::CLOSED))
    }

    fn can_close(&self) -> DomainResult<bool> {
        self.asset().can_execute(Self::CLOSE_OPERATION)
    }

    fn close(&self) -> DomainResult<()> {
        run_and_refresh(self, Self::CLOSE_OPERATION)
    }
}

/// 可重新激活
pub trait Reactivatable: Closable {
    const REACTIVATE_OPERATION: &'static str = "Reactivate";

    fn can_reactivate(&self) -> DomainResult<bool> {
        self.asset().can_execute(Self::REACTIVATE_OPERATION)
    }

    fn reactivate(&self) -> DomainResult<()> {
        run_and_refresh(self, Self::REACTIVATE_OPERATION)
    }
}

/// 可挂载附件（只管理关系，不涉及内容传输）
pub trait Attachable: AssetKind {
    const ATTACHMENTS_ATTRIBUTE: &'static str = "Attachments";

    type Attachment: AssetKind;

    fn attachments(&self) -> RelationCollection<Self::Attachment> {
        self.asset().relation(Self::ATTACHMENTS_ATTRIBUTE)
    }
}
