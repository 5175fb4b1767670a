//! 分页错误
//!
//! 存储失败会在任何 action 执行前中止当前页，并原样向上传递。
//! action 失败携带失败页的起始游标，调用方可以从该页准确恢复。

use super::StoreError;
use thiserror::Error;

/// 调用方提供的行 action 可返回的错误类型
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type PaginationResult<T> = Result<T, PaginationError>;

#[derive(Error, Debug)]
pub enum PaginationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("row action failed on page starting at {}: {source}", display_cursor(.cursor))]
    Action {
        cursor: Option<String>,
        #[source]
        source: ActionError,
    },

    #[error("page starting at {} ended with a row that has no document id", display_cursor(.cursor))]
    MissingDocumentId { cursor: Option<String> },

    #[error("cursor did not advance past document `{cursor}`")]
    Stalled { cursor: String },

    #[error("invalid pagination spec: {0}")]
    InvalidSpec(String),
}

impl PaginationError {
    /// 作为 `resume_from` 传回即可重试失败页的游标
    ///
    /// `None` 表示失败发生在本次运行的第一页。
    pub fn resume_from(&self) -> Option<&str> {
        match self {
            PaginationError::Action { cursor, .. }
            | PaginationError::MissingDocumentId { cursor } => cursor.as_deref(),
            PaginationError::Stalled { cursor } => Some(cursor),
            PaginationError::Store(_) | PaginationError::InvalidSpec(_) => None,
        }
    }

    pub fn is_action_failure(&self) -> bool {
        matches!(self, PaginationError::Action { .. })
    }
}

fn display_cursor(cursor: &Option<String>) -> String {
    match cursor {
        Some(id) => format!("document `{}`", id),
        None => "the beginning of the range".to_string(),
    }
}
