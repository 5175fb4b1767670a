//! 进程内分区
//!
//! 基于 [`MemoryPartition::emit`] 写入的行响应视图查询，并能识别索引管理器发出的
//! 索引语句（`CREATE [PRIMARY] INDEX`、`DROP [PRIMARY] INDEX`、`BUILD INDEX`），
//! 失败时返回与真实查询服务相同的错误码和消息。
//! 所有请求都会被记录，并可按请求类型注入故障。

use super::{Cluster, Partition, Request, ViewDefinition};
use crate::core::collation::{collate, collate_rows, keys_equal};
use crate::core::{ErrorCode, Metadata, Response, Row, StoreError, StoreResult, ViewId};
use crate::query::view::{SortOrder, ViewQuery};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock};

const PRIMARY_INDEX_NAME: &str = "#primary";

static CREATE_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+(PRIMARY\s+)?INDEX\s+(?:`?([A-Za-z0-9_#%-]+)`?\s+)?ON\s+`?([A-Za-z0-9_%-]+)`?")
        .expect("create index pattern is valid")
});

static DEFER_BUILD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)["']?defer_build["']?\s*:\s*true"#).expect("defer pattern is valid")
});

static DROP_PRIMARY_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*DROP\s+PRIMARY\s+INDEX\s+ON\s+`?([A-Za-z0-9_%-]+)`?")
        .expect("drop primary pattern is valid")
});

// DROP INDEX `bucket`.`name`
static DROP_INDEX_DOTTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*DROP\s+INDEX\s+`?([A-Za-z0-9_%-]+)`?\s*\.\s*`?([A-Za-z0-9_#%-]+)`?")
        .expect("drop index pattern is valid")
});

// DROP INDEX `name` ON `bucket`
static DROP_INDEX_ON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*DROP\s+INDEX\s+`?([A-Za-z0-9_#%-]+)`?\s+ON\s+`?([A-Za-z0-9_%-]+)`?")
        .expect("drop index pattern is valid")
});

static BUILD_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*BUILD\s+INDEX\s+ON\s+`?([A-Za-z0-9_%-]+)`?\s*\((.*)\)\s*;?\s*$")
        .expect("build index pattern is valid")
});

/// [`MemoryPartition`] 持有的单个二级索引状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSnapshot {
    pub name: String,
    pub definition: String,
    pub primary: bool,
    pub deferred: bool,
    pub built: bool,
}

/// 注入的故障作用于哪些请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultTarget {
    ViewQuery,
    /// 包含该文本的语句，不区分大小写
    Statement(String),
}

impl FaultTarget {
    fn matches(&self, request: &Request) -> bool {
        match (self, request) {
            (FaultTarget::ViewQuery, Request::View(_)) => true,
            (FaultTarget::Statement(pattern), Request::Statement(statement)) => statement
                .text
                .to_lowercase()
                .contains(&pattern.to_lowercase()),
            _ => false,
        }
    }
}

#[derive(Debug)]
struct Fault {
    target: FaultTarget,
    error: StoreError,
    skip: usize,
    remaining: usize,
}

#[derive(Debug, Default)]
struct PartitionState {
    documents: HashMap<String, Value>,
    views: HashMap<ViewId, ViewDefinition>,
    rows: HashMap<ViewId, Vec<Row>>,
    indexes: BTreeMap<String, IndexSnapshot>,
    statements: Vec<String>,
    view_queries: Vec<ViewQuery>,
    faults: Vec<Fault>,
}

#[derive(Debug, Clone)]
pub struct MemoryPartition {
    name: String,
    state: Arc<Mutex<PartitionState>>,
}

impl MemoryPartition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(PartitionState::default())),
        }
    }

    pub fn upsert_document(&self, id: impl Into<String>, document: Value) {
        self.state.lock().documents.insert(id.into(), document);
    }

    /// 向视图索引添加一行，相当于视图的 map 函数 emit 了它
    pub fn emit(&self, view: &ViewId, key: Value, id: impl Into<String>, value: Value) {
        self.state
            .lock()
            .rows
            .entry(view.clone())
            .or_default()
            .push(Row::new(id, key, value));
    }

    pub fn has_view(&self, view: &ViewId) -> bool {
        self.state.lock().views.contains_key(view)
    }

    /// 按执行顺序排列的语句文本
    pub fn executed_statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// 按执行顺序排列的视图查询
    pub fn view_queries(&self) -> Vec<ViewQuery> {
        self.state.lock().view_queries.clone()
    }

    pub fn indexes(&self) -> Vec<IndexSnapshot> {
        self.state.lock().indexes.values().cloned().collect()
    }

    pub fn index(&self, name: &str) -> Option<IndexSnapshot> {
        self.state.lock().indexes.get(name).cloned()
    }

    /// 让接下来 `times` 个匹配 `target` 的请求以 `error` 失败
    pub fn inject_fault(&self, target: FaultTarget, error: StoreError, times: usize) {
        self.inject_fault_after(target, error, 0, times);
    }

    /// 先放行 `skip` 个匹配的请求，再让接下来的 `times` 个失败
    pub fn inject_fault_after(
        &self,
        target: FaultTarget,
        error: StoreError,
        skip: usize,
        times: usize,
    ) {
        if times == 0 {
            return;
        }
        self.state.lock().faults.push(Fault {
            target,
            error,
            skip,
            remaining: times,
        });
    }
}

#[async_trait]
impl Partition for MemoryPartition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, request: &Request) -> StoreResult<Response> {
        // 让并发发出的请求有机会交错执行
        tokio::task::yield_now().await;

        let mut state = self.state.lock();
        match request {
            Request::View(query) => state.view_queries.push(query.clone()),
            Request::Statement(statement) => state.statements.push(statement.text.clone()),
        }
        if let Some(error) = state.take_fault(request) {
            return Err(error);
        }

        match request {
            Request::View(query) => state.query_view(query),
            Request::Statement(statement) => state.execute_statement(&self.name, &statement.text),
        }
    }

    async fn define_view(&self, view: &ViewId, definition: &ViewDefinition) -> StoreResult<()> {
        self.state
            .lock()
            .views
            .insert(view.clone(), definition.clone());
        Ok(())
    }
}

impl PartitionState {
    fn take_fault(&mut self, request: &Request) -> Option<StoreError> {
        let pos = self
            .faults
            .iter()
            .position(|fault| fault.target.matches(request))?;
        let fault = &mut self.faults[pos];
        if fault.skip > 0 {
            fault.skip -= 1;
            return None;
        }
        fault.remaining -= 1;
        let error = fault.error.clone();
        if fault.remaining == 0 {
            self.faults.remove(pos);
        }
        Some(error)
    }

    fn query_view(&self, query: &ViewQuery) -> StoreResult<Response> {
        if !self.views.contains_key(&query.view) {
            return Err(StoreError::ViewNotFound(query.view.to_string()));
        }

        let mut rows = self.rows.get(&query.view).cloned().unwrap_or_default();
        let total_rows = rows.len() as u64;
        rows.sort_by(|a, b| collate_rows(&a.key, a.id.as_deref(), &b.key, b.id.as_deref()));
        if query.order == SortOrder::Descending {
            rows.reverse();
        }

        let mut rows: Vec<Row> = rows
            .into_iter()
            .filter(|row| row_matches(query, row))
            .collect();

        let skip = (query.skip.unwrap_or(0) as usize).min(rows.len());
        rows.drain(..skip);
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        if query.include_docs {
            for row in &mut rows {
                row.doc = row
                    .id
                    .as_ref()
                    .and_then(|id| self.documents.get(id).cloned());
            }
        }

        let meta = Metadata {
            total_rows: Some(total_rows),
            status: Some("success".to_string()),
            result_count: rows.len(),
        };
        Ok(Response::new(rows, meta))
    }

    fn execute_statement(&mut self, partition: &str, text: &str) -> StoreResult<Response> {
        if let Some(caps) = CREATE_INDEX.captures(text) {
            let primary = caps.get(1).is_some();
            check_keyspace(partition, &caps[3])?;
            let name = match (caps.get(2), primary) {
                (Some(name), _) => name.as_str().to_string(),
                (None, true) => PRIMARY_INDEX_NAME.to_string(),
                (None, false) => return Err(syntax_error(text)),
            };
            if self.indexes.contains_key(&name) {
                return Err(StoreError::statement(
                    ErrorCode::IndexAlreadyExists,
                    format!("The index {} already exists.", name),
                ));
            }
            let deferred = DEFER_BUILD.is_match(text);
            self.indexes.insert(
                name.clone(),
                IndexSnapshot {
                    name,
                    definition: text.trim().to_string(),
                    primary,
                    deferred,
                    built: !deferred,
                },
            );
            return Ok(Response::success());
        }

        if let Some(caps) = DROP_PRIMARY_INDEX.captures(text) {
            check_keyspace(partition, &caps[1])?;
            return self.drop_index(PRIMARY_INDEX_NAME);
        }
        if let Some(caps) = DROP_INDEX_DOTTED.captures(text) {
            check_keyspace(partition, &caps[1])?;
            return self.drop_index(&caps[2]);
        }
        if let Some(caps) = DROP_INDEX_ON.captures(text) {
            check_keyspace(partition, &caps[2])?;
            return self.drop_index(&caps[1]);
        }

        if let Some(caps) = BUILD_INDEX.captures(text) {
            check_keyspace(partition, &caps[1])?;
            let names = parse_index_list(&caps[2]);
            if names.is_empty() {
                return Err(syntax_error(text));
            }
            return self.build_indexes(&names);
        }

        Err(syntax_error(text))
    }

    fn drop_index(&mut self, name: &str) -> StoreResult<Response> {
        match self.indexes.remove(name) {
            Some(_) => Ok(Response::success()),
            None => Err(index_not_found(name)),
        }
    }

    fn build_indexes(&mut self, names: &[String]) -> StoreResult<Response> {
        if let Some(missing) = names.iter().find(|name| !self.indexes.contains_key(*name)) {
            return Err(index_not_found(missing));
        }

        let mut already_built = Vec::new();
        for name in names {
            if let Some(index) = self.indexes.get_mut(name) {
                if index.built {
                    already_built.push(name.clone());
                } else {
                    index.built = true;
                }
            }
        }

        // 即使部分索引已构建，其余索引仍会被构建
        if already_built.is_empty() {
            Ok(Response::success())
        } else {
            Err(StoreError::statement(
                ErrorCode::InternalError,
                format!(
                    "Build index fails. Index {} already built",
                    already_built.join(", ")
                ),
            ))
        }
    }
}

fn row_matches(query: &ViewQuery, row: &Row) -> bool {
    if let Some(key) = &query.key {
        if !keys_equal(&row.key, key) {
            return false;
        }
    }
    if let Some(keys) = &query.keys {
        if !keys.iter().any(|key| keys_equal(&row.key, key)) {
            return false;
        }
    }

    let Some(range) = &query.range else {
        return true;
    };
    let descending = query.order == SortOrder::Descending;
    let in_view_order = |ord: Ordering| if descending { ord.reverse() } else { ord };
    let row_id = row.id.as_deref().unwrap_or("");
    let id_range = query.id_range.as_ref();

    if let Some(start) = &range.start {
        match in_view_order(collate(&row.key, start)) {
            Ordering::Less => return false,
            Ordering::Equal => {
                if let Some(start_id) = id_range.and_then(|r| r.start.as_deref()) {
                    if in_view_order(row_id.cmp(start_id)) == Ordering::Less {
                        return false;
                    }
                }
            }
            Ordering::Greater => {}
        }
    }
    if let Some(end) = &range.end {
        match in_view_order(collate(&row.key, end)) {
            Ordering::Greater => return false,
            Ordering::Equal => {
                if !range.inclusive_end {
                    return false;
                }
                if let Some(end_id) = id_range.and_then(|r| r.end.as_deref()) {
                    if in_view_order(row_id.cmp(end_id)) == Ordering::Greater {
                        return false;
                    }
                }
            }
            Ordering::Less => {}
        }
    }
    true
}

fn parse_index_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|name| name.trim().trim_matches('`').trim_matches('"').trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn check_keyspace(partition: &str, keyspace: &str) -> StoreResult<()> {
    if partition == keyspace {
        Ok(())
    } else {
        Err(StoreError::statement(
            ErrorCode::KeyspaceNotFound,
            format!("Keyspace not found in CB datastore: default:{}", keyspace),
        ))
    }
}

fn index_not_found(name: &str) -> StoreError {
    StoreError::statement(
        ErrorCode::IndexNotFound,
        format!("Index Not Found - cause: GSI index {} not found.", name),
    )
}

fn syntax_error(text: &str) -> StoreError {
    StoreError::statement(
        ErrorCode::SyntaxError,
        format!("syntax error - unsupported statement: {}", text.trim()),
    )
}

/// 一组具名的进程内分区
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    partitions: Arc<Mutex<HashMap<String, MemoryPartition>>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建指定名称的分区，已存在时直接返回
    pub fn create_partition(&self, name: &str) -> MemoryPartition {
        self.partitions
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| MemoryPartition::new(name))
            .clone()
    }
}

#[async_trait]
impl Cluster for MemoryCluster {
    type Partition = MemoryPartition;

    async fn open_partition(&self, name: &str) -> StoreResult<MemoryPartition> {
        self.partitions
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::PartitionNotFound(name.to_string()))
    }
}
