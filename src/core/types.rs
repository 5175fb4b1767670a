//! 与分区交换的值类型

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 由设计文档名和视图名定位的视图
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewId {
    pub design_document: String,
    pub view: String,
}

impl ViewId {
    pub fn new(design_document: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            design_document: design_document.into(),
            view: view.into(),
        }
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_design/{}/_view/{}", self.design_document, self.view)
    }
}

/// 一行结果
///
/// 视图行携带 emit 的键、emit 该行的文档 id 以及 emit 的值。
/// 语句结果行把结果对象放在 `value` 中，键为 null 且没有 id。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
}

impl Row {
    pub fn new(id: impl Into<String>, key: Value, value: Value) -> Self {
        Self {
            id: Some(id.into()),
            key,
            value,
            doc: None,
        }
    }

    pub fn from_value(value: Value) -> Self {
        Self {
            id: None,
            key: Value::Null,
            value,
            doc: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// 整个视图的行数（过滤前）
    pub total_rows: Option<u64>,
    pub status: Option<String>,
    pub result_count: usize,
}

/// `Partition::execute` 返回的行和元数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub rows: Vec<Row>,
    pub meta: Metadata,
}

impl Response {
    pub fn new(rows: Vec<Row>, meta: Metadata) -> Self {
        Self { rows, meta }
    }

    pub fn success() -> Self {
        Self {
            rows: Vec::new(),
            meta: Metadata {
                status: Some("success".to_string()),
                ..Metadata::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_view_id_display() {
        let view = ViewId::new("users", "by_country");
        assert_eq!(view.to_string(), "_design/users/_view/by_country");
    }

    #[test]
    fn test_row_deserialize_without_doc() {
        let row: Row = serde_json::from_value(json!({"id": "u1", "key": "fr", "value": null}))
            .expect("row should deserialize");
        assert_eq!(row, Row::new("u1", json!("fr"), Value::Null));
    }
}
