//! ViewDB 统一错误处理
//!
//! ## 结构
//!
//! 1. `StoreError` 涵盖分区返回的所有失败：传输失败、携带存储端错误码的
//!    语句失败、视图或分区不存在，以及子文档失败。
//! 2. `PaginationError` 原样包装存储失败，并为 action 失败标注
//!    当时正在处理的页的游标。
//! 3. 索引生命周期错误位于 `crate::index::error`，与产生它们的管理器放在一起。

use thiserror::Error;

pub mod codes;
pub mod pagination;
pub mod subdoc;

pub use codes::ErrorCode;
pub use pagination::{ActionError, PaginationError, PaginationResult};
pub use subdoc::{SubDocFailure, SubDocumentError};

/// 所有跨越分区边界的调用使用的结果类型
pub type StoreResult<T> = Result<T, StoreError>;

/// 分区句柄报告的失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("statement failed with code {code}: {message}")]
    Statement { code: u32, message: String },

    #[error("view not found: {0}")]
    ViewNotFound(String),

    #[error("partition not found: {0}")]
    PartitionNotFound(String),

    #[error("sub-document error: {0}")]
    SubDocument(#[from] SubDocumentError),
}

impl StoreError {
    pub fn statement(code: impl Into<u32>, message: impl Into<String>) -> Self {
        StoreError::Statement {
            code: code.into(),
            message: message.into(),
        }
    }

    /// 存储端分配的错误码，仅语句失败时存在
    pub fn code(&self) -> Option<u32> {
        match self {
            StoreError::Statement { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// 核心能识别的错误码
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.code().and_then(ErrorCode::from_u32)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }

    /// 存储端报告的原始消息文本，不含变体前缀
    pub fn message(&self) -> String {
        match self {
            StoreError::Transport(msg)
            | StoreError::ViewNotFound(msg)
            | StoreError::PartitionNotFound(msg) => msg.clone(),
            StoreError::Statement { message, .. } => message.clone(),
            StoreError::SubDocument(err) => err.to_string(),
        }
    }
}
