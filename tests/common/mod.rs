//! 集成测试共享工具模块
//!
//! 每个测试使用独立的内存集群，测试之间不共享状态

#![allow(dead_code)]

pub mod fixtures;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use viewdb::config::PaginationConfig;
use viewdb::core::ActionError;
use viewdb::utils::RecordingSink;
use viewdb::{Paginator, Row};

/// 不带页间延迟、记录事件的分页器
pub fn fast_paginator() -> (Paginator, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let paginator =
        Paginator::new(&PaginationConfig::default(), sink.clone()).with_page_delay(Duration::ZERO);
    (paginator, sink)
}

/// 收集交给 action 的每一行的 id
#[derive(Clone, Default)]
pub struct Collector {
    ids: Arc<Mutex<Vec<String>>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, row: Row) -> Result<(), ActionError> {
        let id = row.id.ok_or("row without id")?;
        self.ids.lock().push(id);
        Ok(())
    }

    /// 按 action 完成顺序排列的 id
    pub fn ids(&self) -> Vec<String> {
        self.ids.lock().clone()
    }

    pub fn sorted_ids(&self) -> Vec<String> {
        let mut ids = self.ids();
        ids.sort();
        ids
    }
}
