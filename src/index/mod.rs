//! 二级索引生命周期
//!
//! - 由语句模板渲染索引定义
//! - 幂等定义（冲突时删除并重建）
//! - 每个分区一次延迟构建请求
//! - 索引错误分类

pub mod error;
pub mod manager;
pub mod types;

pub use error::{already_built_names, classify, FailureKind, IndexError, IndexResult};
pub use manager::{build_indexes, BuildReport, IndexManager, IndexRef};
pub use types::{build_statement, quote_identifier, IndexDefinition};
