//! 视图查询选项及由其构建的具体查询
//!
//! `ViewQuerySpec` 是面向调用方的声明式选项集合：所有字段均可选，
//! 反序列化时拒绝未知的选项名。
//! `ViewQuery` 是分区实际执行的查询，所有默认值均已确定：
//! 升序、出错即停止、`update_after` 过期策略。

use crate::core::types::ViewId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// 查询读取索引前要求索引的新鲜程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Staleness {
    /// 按现状读取索引
    Ok,
    /// 按现状读取索引，随后安排一次更新
    #[default]
    UpdateAfter,
    /// 读取前先把索引更新到最新
    False,
}

impl Staleness {
    pub fn as_param(&self) -> &'static str {
        match self {
            Staleness::Ok => "ok",
            Staleness::UpdateAfter => "update_after",
            Staleness::False => "false",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    #[default]
    Stop,
    Continue,
}

impl OnError {
    pub fn as_param(&self) -> &'static str {
        match self {
            OnError::Stop => "stop",
            OnError::Continue => "continue",
        }
    }
}

fn default_inclusive_end() -> bool {
    true
}

/// 键范围，边界按视图顺序给出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRange {
    #[serde(default)]
    pub start: Option<Value>,
    #[serde(default)]
    pub end: Option<Value>,
    #[serde(default = "default_inclusive_end")]
    pub inclusive_end: bool,
}

impl KeyRange {
    pub fn new(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
            inclusive_end: true,
        }
    }

    pub fn from_start(start: impl Into<Value>) -> Self {
        Self {
            start: Some(start.into()),
            end: None,
            inclusive_end: true,
        }
    }

    pub fn with_inclusive_end(mut self, inclusive_end: bool) -> Self {
        self.inclusive_end = inclusive_end;
        self
    }
}

/// 文档 id 边界，只作用于键等于范围边界的行
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

impl IdRange {
    pub fn from_start(start: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: None,
        }
    }
}

/// 声明式视图查询选项
///
/// 可识别的选项集合是固定的，配置或 JSON 文档中出现其他选项名时
/// 反序列化失败
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewQuerySpec {
    pub order: Option<SortOrder>,
    pub stale: Option<Staleness>,
    pub on_error: Option<OnError>,
    pub group: Option<bool>,
    pub group_level: Option<u32>,
    pub reduce: Option<bool>,
    pub key: Option<Value>,
    pub keys: Option<Vec<Value>>,
    pub range: Option<KeyRange>,
    pub id_range: Option<IdRange>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub include_docs: Option<bool>,
    pub full_set: Option<bool>,
}

impl ViewQuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(mut self, start: impl Into<Value>, end: impl Into<Value>) -> Self {
        self.range = Some(KeyRange::new(start, end));
        self
    }

    pub fn with_key_range(mut self, range: KeyRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_stale(mut self, stale: Staleness) -> Self {
        self.stale = Some(stale);
        self
    }

    pub fn with_key(mut self, key: impl Into<Value>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_keys(mut self, keys: Vec<Value>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_include_docs(mut self, include_docs: bool) -> Self {
        self.include_docs = Some(include_docs);
        self
    }

    pub fn with_reduce(mut self, reduce: bool) -> Self {
        self.reduce = Some(reduce);
        self
    }

    pub fn with_group(mut self, group: bool) -> Self {
        self.group = Some(group);
        self
    }
}

/// 所有选项均已确定的视图查询
#[derive(Debug, Clone, PartialEq)]
pub struct ViewQuery {
    pub view: ViewId,
    pub order: SortOrder,
    pub stale: Staleness,
    pub on_error: OnError,
    pub group: bool,
    pub group_level: Option<u32>,
    pub reduce: Option<bool>,
    pub key: Option<Value>,
    pub keys: Option<Vec<Value>>,
    pub range: Option<KeyRange>,
    pub id_range: Option<IdRange>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub include_docs: bool,
    pub full_set: Option<bool>,
}

impl ViewQuery {
    /// 覆盖整个视图、全部使用默认值的查询
    pub fn new(view: ViewId) -> Self {
        Self {
            view,
            order: SortOrder::default(),
            stale: Staleness::default(),
            on_error: OnError::default(),
            group: false,
            group_level: None,
            reduce: None,
            key: None,
            keys: None,
            range: None,
            id_range: None,
            skip: None,
            limit: None,
            include_docs: false,
            full_set: None,
        }
    }

    /// 以默认值为基础应用 `spec`
    ///
    /// 选项按固定顺序应用：排序、过期策略、错误处理、分组、reduce、
    /// 键过滤、范围、skip、limit，最后是文档相关选项。
    pub fn build(view: &ViewId, spec: &ViewQuerySpec) -> Self {
        let mut query = Self::new(view.clone());
        if let Some(order) = spec.order {
            query.order = order;
        }
        if let Some(stale) = spec.stale {
            query.stale = stale;
        }
        if let Some(on_error) = spec.on_error {
            query.on_error = on_error;
        }
        if let Some(group) = spec.group {
            query.group = group;
        }
        if let Some(level) = spec.group_level {
            query.group_level = Some(level);
        }
        if let Some(reduce) = spec.reduce {
            query.reduce = Some(reduce);
        }
        if let Some(key) = &spec.key {
            query.key = Some(key.clone());
        }
        if let Some(keys) = &spec.keys {
            query.keys = Some(keys.clone());
        }
        if let Some(range) = &spec.range {
            query.range = Some(range.clone());
        }
        if let Some(id_range) = &spec.id_range {
            query.id_range = Some(id_range.clone());
        }
        if let Some(skip) = spec.skip {
            query.skip = Some(skip);
        }
        if let Some(limit) = spec.limit {
            query.limit = Some(limit);
        }
        if let Some(include_docs) = spec.include_docs {
            query.include_docs = include_docs;
        }
        if let Some(full_set) = spec.full_set {
            query.full_set = Some(full_set);
        }
        query
    }

    /// 从 `doc_id` 之后继续范围扫描
    ///
    /// 强制读取最新索引，id 范围从边界文档开始，并跳过该文档本身。
    pub fn resume_after(mut self, doc_id: &str) -> Self {
        let end = self.id_range.take().and_then(|range| range.end);
        self.stale = Staleness::False;
        self.id_range = Some(IdRange {
            start: Some(doc_id.to_string()),
            end,
        });
        self.skip = Some(1);
        self
    }

    /// 按应用顺序生成视图接口所需的查询参数
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            (
                "descending",
                (self.order == SortOrder::Descending).to_string(),
            ),
            ("stale", self.stale.as_param().to_string()),
            ("on_error", self.on_error.as_param().to_string()),
        ];
        if self.group {
            params.push(("group", "true".to_string()));
        }
        if let Some(level) = self.group_level {
            params.push(("group_level", level.to_string()));
        }
        if let Some(reduce) = self.reduce {
            params.push(("reduce", reduce.to_string()));
        }
        if let Some(key) = &self.key {
            params.push(("key", key.to_string()));
        }
        if let Some(keys) = &self.keys {
            params.push(("keys", Value::Array(keys.clone()).to_string()));
        }
        if let Some(range) = &self.range {
            if let Some(start) = &range.start {
                params.push(("startkey", start.to_string()));
            }
            if let Some(end) = &range.end {
                params.push(("endkey", end.to_string()));
            }
            params.push(("inclusive_end", range.inclusive_end.to_string()));
        }
        if let Some(id_range) = &self.id_range {
            if let Some(start) = &id_range.start {
                params.push(("startkey_docid", start.clone()));
            }
            if let Some(end) = &id_range.end {
                params.push(("endkey_docid", end.clone()));
            }
        }
        if let Some(skip) = self.skip {
            params.push(("skip", skip.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if self.include_docs {
            params.push(("include_docs", "true".to_string()));
        }
        if let Some(full_set) = self.full_set {
            params.push(("full_set", full_set.to_string()));
        }
        params
    }
}
