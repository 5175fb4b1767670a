//! 分区能力接口
//!
//! 核心代码从不直接访问集群，而是接收实现 [`Partition`] 的分区句柄，
//! 一切操作都通过 `execute` 完成。
//! [`MemoryPartition`] 是进程内实现，供测试以及无需真实集群的宿主程序使用。

pub mod memory_storage;

pub use memory_storage::{FaultTarget, IndexSnapshot, MemoryCluster, MemoryPartition};

use crate::core::{Response, StoreResult, ViewId};
use crate::query::view::ViewQuery;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// 视图的 map/reduce 源码，由分区原样保存
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub map: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce: Option<String>,
}

impl ViewDefinition {
    pub fn new(map: impl Into<String>) -> Self {
        Self {
            map: map.into(),
            reduce: None,
        }
    }

    pub fn with_reduce(mut self, reduce: impl Into<String>) -> Self {
        self.reduce = Some(reduce.into());
        self
    }
}

/// 带位置参数的声明式语句
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }
}

/// `Partition::execute` 接受的所有请求
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    View(ViewQuery),
    Statement(Statement),
}

impl From<ViewQuery> for Request {
    fn from(query: ViewQuery) -> Self {
        Request::View(query)
    }
}

impl From<Statement> for Request {
    fn from(statement: Statement) -> Self {
        Request::Statement(statement)
    }
}

/// 一个已打开的存储分区连接
///
/// 句柄被所有并发发出的操作共享，实现不能假定独占访问。
#[async_trait]
pub trait Partition: Send + Sync {
    fn name(&self) -> &str;

    /// 执行一个视图查询或语句
    async fn execute(&self, request: &Request) -> StoreResult<Response>;

    async fn define_view(&self, view: &ViewId, definition: &ViewDefinition) -> StoreResult<()>;
}

#[async_trait]
impl<P: Partition + ?Sized> Partition for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn execute(&self, request: &Request) -> StoreResult<Response> {
        (**self).execute(request).await
    }

    async fn define_view(&self, view: &ViewId, definition: &ViewDefinition) -> StoreResult<()> {
        (**self).define_view(view, definition).await
    }
}

/// 分区句柄的来源
#[async_trait]
pub trait Cluster: Send + Sync {
    type Partition: Partition;

    async fn open_partition(&self, name: &str) -> StoreResult<Self::Partition>;
}
