//! 视图游标分页
//!
//! 每一页都从配置的范围重新执行视图查询。第一页之后，查询从最后处理的文档之后继续
//! （读取最新索引、id 范围从该文档开始、跳过一行）。只有键等于范围下界的行
//! 才会交给 action；这类行少于 `limit` 时遍历结束。
//!
//! 同一页内各行的 action 并发执行，当前页的所有 action 完成后
//! 才会请求下一页。

use crate::config::PaginationConfig;
use crate::core::collation::keys_equal;
use crate::core::{ActionError, PaginationError, PaginationResult, Row, ViewId};
use crate::query::view::{SortOrder, ViewQuery, ViewQuerySpec};
use crate::storage::{Partition, Request};
use crate::utils::events::{Event, EventSink, LogSink};
use futures::future::try_join_all;
use futures::TryFutureExt;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// 一次完整遍历的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationSummary {
    pub pages: usize,
    pub rows: usize,
    /// 最后交给 action 的行的文档 id
    pub last_cursor: Option<String>,
}

pub struct Paginator {
    page_delay: Duration,
    sink: Arc<dyn EventSink>,
}

impl Paginator {
    pub fn new(config: &PaginationConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            page_delay: config.page_delay(),
            sink,
        }
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    pub fn page_delay(&self) -> Duration {
        self.page_delay
    }

    /// 遍历 `view`，对每个边界键行调用一次 `action`
    ///
    /// `resume_from` 用于继续之前的运行；传入失败运行报告的游标即可重试失败的那一页。
    pub async fn paginate<P, F, Fut, E>(
        &self,
        partition: &P,
        view: &ViewId,
        spec: &ViewQuerySpec,
        action: F,
        resume_from: Option<String>,
    ) -> PaginationResult<PaginationSummary>
    where
        P: Partition + ?Sized,
        F: Fn(Row) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Into<ActionError>,
    {
        let (boundary, limit) = validate(spec)?;
        let base = ViewQuery::build(view, spec);
        let mut cursor = resume_from;
        let mut summary = PaginationSummary {
            last_cursor: cursor.clone(),
            ..PaginationSummary::default()
        };

        loop {
            let query = match cursor.as_deref() {
                Some(doc_id) => base.clone().resume_after(doc_id),
                None => base.clone(),
            };
            let response = partition.execute(&Request::View(query)).await?;

            let page: Vec<Row> = response
                .rows
                .into_iter()
                .filter(|row| keys_equal(&row.key, boundary))
                .collect();
            let processed = page.len();
            let finished = (processed as u64) < limit;
            let last_id = page.last().map(|row| row.id.clone());

            try_join_all(
                page.into_iter()
                    .map(|row| action(row).map_err(|err| -> ActionError { err.into() })),
            )
            .await
            .map_err(|source| PaginationError::Action {
                cursor: cursor.clone(),
                source,
            })?;

            summary.pages += 1;
            summary.rows += processed;
            if let Some(Some(id)) = &last_id {
                summary.last_cursor = Some(id.clone());
            }
            self.sink.emit(&Event::PageProcessed {
                view: view.to_string(),
                page: summary.pages,
                rows: processed,
                cursor: cursor.clone(),
            });

            if finished {
                break;
            }

            let next = match last_id {
                Some(Some(id)) => id,
                // 满页必然有最后一行
                Some(None) | None => {
                    return Err(PaginationError::MissingDocumentId { cursor });
                }
            };
            if cursor.as_deref() == Some(next.as_str()) {
                return Err(PaginationError::Stalled { cursor: next });
            }

            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
            cursor = Some(next);
        }

        self.sink.emit(&Event::PaginationFinished {
            view: view.to_string(),
            pages: summary.pages,
            rows: summary.rows,
        });
        Ok(summary)
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(&PaginationConfig::default(), Arc::new(LogSink))
    }
}

/// 使用默认页间延迟分页，通过 `log` 门面记录日志
pub async fn paginate<P, F, Fut, E>(
    partition: &P,
    view: &ViewId,
    spec: &ViewQuerySpec,
    action: F,
    resume_from: Option<String>,
) -> PaginationResult<PaginationSummary>
where
    P: Partition + ?Sized,
    F: Fn(Row) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Into<ActionError>,
{
    Paginator::default()
        .paginate(partition, view, spec, action, resume_from)
        .await
}

/// 查询选项中的边界键和页大小
fn validate(spec: &ViewQuerySpec) -> PaginationResult<(&Value, u64)> {
    let range = spec
        .range
        .as_ref()
        .ok_or_else(|| PaginationError::InvalidSpec("a key range is required".to_string()))?;
    let boundary = range.start.as_ref().ok_or_else(|| {
        PaginationError::InvalidSpec("the key range needs a lower bound".to_string())
    })?;
    let limit = match spec.limit {
        Some(limit) if limit > 0 => limit,
        _ => {
            return Err(PaginationError::InvalidSpec(
                "limit must be a positive integer".to_string(),
            ))
        }
    };
    if spec.order == Some(SortOrder::Descending) {
        return Err(PaginationError::InvalidSpec(
            "only ascending views can be paginated".to_string(),
        ));
    }
    if spec.reduce == Some(true) || spec.group == Some(true) || spec.group_level.is_some() {
        return Err(PaginationError::InvalidSpec(
            "reduced rows carry no document id to resume from".to_string(),
        ));
    }
    Ok((boundary, limit))
}
