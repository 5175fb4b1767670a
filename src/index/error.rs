//! 索引生命周期错误
//!
//! 每个失败都会标明所属的分区和索引（或索引集合），
//! 批量失败时可以准确看出是哪条链路出错。

use crate::core::{ErrorCode, StoreError};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

// "Build index fails. Index a, b already built"
static ALREADY_BUILT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bindex(?:es)?\s+([^.]+?)\s+(?:is\s+|are\s+)?already\s+built")
        .expect("already built pattern is valid")
});

pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index `{index}` targets partition `{partition}`, which was not supplied")]
    UnknownPartition { partition: String, index: String },

    #[error("failed to define index `{index}` on `{partition}`: {source}")]
    Define {
        partition: String,
        index: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to drop conflicting index `{index}` on `{partition}`: {source}")]
    Drop {
        partition: String,
        index: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to recreate index `{index}` on `{partition}` after dropping it: {source}")]
    Recreate {
        partition: String,
        index: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to build deferred indexes [{}] on `{partition}`: {source}", .indexes.join(", "))]
    Build {
        partition: String,
        indexes: Vec<String>,
        #[source]
        source: StoreError,
    },

    #[error("{} index operations failed: {}", .0.len(), join_failures(.0))]
    Batch(Vec<IndexError>),
}

impl IndexError {
    pub fn partition(&self) -> Option<&str> {
        match self {
            IndexError::UnknownPartition { partition, .. }
            | IndexError::Define { partition, .. }
            | IndexError::Drop { partition, .. }
            | IndexError::Recreate { partition, .. }
            | IndexError::Build { partition, .. } => Some(partition),
            IndexError::Batch(_) => None,
        }
    }

    /// 失败所属的索引；构建失败和批量失败返回 `None`
    pub fn index(&self) -> Option<&str> {
        match self {
            IndexError::UnknownPartition { index, .. }
            | IndexError::Define { index, .. }
            | IndexError::Drop { index, .. }
            | IndexError::Recreate { index, .. } => Some(index),
            IndexError::Build { .. } | IndexError::Batch(_) => None,
        }
    }

    /// 单个失败原样返回，多个失败合并为批量错误
    pub(crate) fn from_failures(mut failures: Vec<IndexError>) -> Option<Self> {
        match failures.len() {
            0 => None,
            1 => failures.pop(),
            _ => Some(IndexError::Batch(failures)),
        }
    }
}

fn join_failures(failures: &[IndexError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 生命周期管理器如何对待存储端失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 索引已存在，可通过删除重建恢复
    AlreadyExists,
    /// 延迟索引已构建，可忽略
    AlreadyBuilt,
    Fatal,
}

pub fn classify(error: &StoreError) -> FailureKind {
    let StoreError::Statement { code, message } = error else {
        return FailureKind::Fatal;
    };
    let message = message.to_lowercase();
    if *code == ErrorCode::IndexAlreadyExists.as_u32() || message.contains("already exists") {
        FailureKind::AlreadyExists
    } else if message.contains("already built") {
        FailureKind::AlreadyBuilt
    } else {
        FailureKind::Fatal
    }
}

/// "already built" 消息中列出的索引名，已去除引号
pub fn already_built_names(message: &str) -> Option<Vec<String>> {
    let caps = ALREADY_BUILT.captures(message)?;
    let names: Vec<String> = caps[1]
        .split(',')
        .map(|name| name.trim().trim_matches('`').trim_matches('"').trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    (!names.is_empty()).then_some(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&StoreError::statement(4300u32, "The index x already exists.")),
            FailureKind::AlreadyExists
        );
        assert_eq!(
            classify(&StoreError::statement(5000u32, "Index idx already exists")),
            FailureKind::AlreadyExists
        );
        assert_eq!(
            classify(&StoreError::statement(
                5000u32,
                "Build index fails. Index a, b already built"
            )),
            FailureKind::AlreadyBuilt
        );
        assert_eq!(
            classify(&StoreError::statement(12016u32, "Index Not Found")),
            FailureKind::Fatal
        );
        // 传输错误无论内容如何都不可恢复
        assert_eq!(
            classify(&StoreError::Transport("index already exists".to_string())),
            FailureKind::Fatal
        );
    }

    #[test]
    fn test_already_built_names() {
        assert_eq!(
            already_built_names("Build index fails. Index a, b already built"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            already_built_names("Index `by_type` is already built"),
            Some(vec!["by_type".to_string()])
        );
        assert_eq!(already_built_names("index service unavailable"), None);
    }

    #[test]
    fn test_error_locates_failure() {
        let error = IndexError::Define {
            partition: "travel".to_string(),
            index: "by_type".to_string(),
            source: StoreError::Transport("timeout".to_string()),
        };
        assert_eq!(error.partition(), Some("travel"));
        assert_eq!(error.index(), Some("by_type"));
        assert_eq!(
            error.to_string(),
            "failed to define index `by_type` on `travel`: transport error: timeout"
        );
    }

    #[test]
    fn test_from_failures() {
        assert!(IndexError::from_failures(Vec::new()).is_none());

        let single = IndexError::from_failures(vec![IndexError::UnknownPartition {
            partition: "beer".to_string(),
            index: "i".to_string(),
        }]);
        assert!(matches!(single, Some(IndexError::UnknownPartition { .. })));

        let batch = IndexError::from_failures(vec![
            IndexError::UnknownPartition {
                partition: "beer".to_string(),
                index: "i".to_string(),
            },
            IndexError::Build {
                partition: "travel".to_string(),
                indexes: vec!["a".to_string(), "b".to_string()],
                source: StoreError::Transport("reset".to_string()),
            },
        ])
        .expect("two failures");
        assert!(batch.to_string().starts_with("2 index operations failed: "));
        assert!(batch.to_string().contains("[a, b]"));
    }
}
