//! ViewDB - 面向分区文档存储的游标分页与索引生命周期管理
//!
//! 本 crate 基于宿主提供的分区句柄完成两项工作：
//! 按页遍历可容忍过期的视图查询并对每行执行 action，
//! 以及幂等地声明、替换和构建二级索引。

pub mod config;
pub mod core;
pub mod index;
pub mod query;
pub mod storage;
pub mod utils;

pub use crate::core::{PaginationError, Row, StoreError, ViewId};
pub use index::{build_indexes, IndexDefinition, IndexError, IndexManager};
pub use query::{paginate, Paginator, ViewQuerySpec};
pub use storage::{Cluster, Partition, Request};
