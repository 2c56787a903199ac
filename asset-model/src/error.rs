//! 统一错误定义
//!
//! 覆盖标识解析、元模型、类型注册、属性读写、提交与远端操作等环节，
//! 各协作者实现（查询/命令服务、元模型）统一转换为 `DomainError`。
//!
//! 注意：按标识查找时“记录不存在”以 `Ok(None)` 表达，而非错误，
//! 以便批量查找可以静默跳过缺失项。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 序列化/解析 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("parse error: {reason}")]
    Parse { reason: String },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },

    // --- 元模型/类型注册 ---
    #[error("unknown asset type: {asset_type}")]
    UnknownAssetType { asset_type: String },
    #[error("unknown attribute: {asset_type}.{attribute}")]
    UnknownAttribute {
        asset_type: String,
        attribute: String,
    },
    #[error("kind already registered: {kind}")]
    AlreadyRegistered { kind: String },
    #[error(
        "duplicate default variant: asset_type={asset_type}, existing={existing}, duplicate={duplicate}"
    )]
    DuplicateDefaultVariant {
        asset_type: String,
        existing: &'static str,
        duplicate: &'static str,
    },

    // --- 远端/提交 ---
    #[error("not found: {reason}")]
    NotFound { reason: String },
    #[error("invalid operation: operation={operation}, reason={reason}")]
    InvalidOperation { operation: String, reason: String },
    #[error("validation failed: attributes={attributes:?}")]
    ValidationFailure { attributes: Vec<String> },
    #[error("data violation: {reason}")]
    DataViolation { reason: String },
    #[error("remote error: {reason}")]
    Remote { reason: String },

    // --- 本地规则 ---
    #[error("read-only attribute: {attribute}")]
    ReadOnlyViolation { attribute: String },
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

impl From<uuid::Error> for DomainError {
    fn from(err: uuid::Error) -> Self {
        DomainError::Parse {
            reason: err.to_string(),
        }
    }
}
