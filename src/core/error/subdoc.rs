//! 子文档变更失败
//!
//! 多路径变更可能以两种形式报告失败：描述失败操作的对象（或对象列表），
//! 或者只有失败数量、具体信息留在响应载荷中。两种形式在这里统一为
//! 同一个 `SubDocumentError`，下游无需关心客户端给出的是哪种形式。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 子文档请求中的一个失败操作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubDocFailure {
    /// 操作在请求中的位置
    pub index: usize,
    pub path: Option<String>,
    pub status: u32,
    pub message: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} sub-document operation(s) failed{}", .failures.len(), first_message(.failures))]
pub struct SubDocumentError {
    pub failures: Vec<SubDocFailure>,
}

impl SubDocumentError {
    pub fn new(failures: Vec<SubDocFailure>) -> Self {
        Self { failures }
    }

    /// 规范化原始失败报告
    ///
    /// `raw` 是客户端报告的错误：对象、对象列表或失败数量。
    /// 为数量时，`payload` 必须包含每个操作的结果，从中提取失败项。
    pub fn from_response(raw: &Value, payload: Option<&Value>) -> Self {
        let failures = match raw {
            Value::Object(_) => vec![parse_failure(0, raw)],
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| parse_failure(idx, item))
                .collect(),
            Value::Number(count) => {
                let mut failures = payload.map(failures_from_payload).unwrap_or_default();
                let expected = count.as_u64().unwrap_or(0) as usize;
                // 载荷缺失细节时以数量为准
                while failures.len() < expected {
                    failures.push(SubDocFailure {
                        index: failures.len(),
                        path: None,
                        status: 0,
                        message: "unknown sub-document failure".to_string(),
                    });
                }
                failures
            }
            other => vec![SubDocFailure {
                index: 0,
                path: None,
                status: 0,
                message: other.to_string(),
            }],
        };
        Self { failures }
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

fn first_message(failures: &[SubDocFailure]) -> String {
    match failures.first() {
        Some(failure) => format!(": {}", failure.message),
        None => String::new(),
    }
}

fn failures_from_payload(payload: &Value) -> Vec<SubDocFailure> {
    let Some(entries) = payload.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            if let Some(error) = entry.get("error").filter(|e| !e.is_null()) {
                let mut failure = parse_failure(idx, error);
                failure.index = idx;
                if failure.path.is_none() {
                    failure.path = string_field(entry, "path");
                }
                return Some(failure);
            }
            let status = entry.get("status").and_then(Value::as_u64).unwrap_or(0);
            (status != 0).then(|| parse_failure(idx, entry))
        })
        .collect()
}

fn parse_failure(default_index: usize, value: &Value) -> SubDocFailure {
    let index = value
        .get("index")
        .and_then(Value::as_u64)
        .map(|i| i as usize)
        .unwrap_or(default_index);
    let status = value
        .get("status")
        .or_else(|| value.get("code"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    let message = string_field(value, "message")
        .or_else(|| string_field(value, "error"))
        .unwrap_or_else(|| match value {
            Value::String(s) => s.clone(),
            _ => "unknown sub-document failure".to_string(),
        });

    SubDocFailure {
        index,
        path: string_field(value, "path"),
        status,
        message,
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_shape() {
        let raw = json!({"index": 1, "path": "profile.name", "status": 73, "message": "path not found"});
        let error = SubDocumentError::from_response(&raw, None);
        assert_eq!(error.len(), 1);
        assert_eq!(error.failures[0].index, 1);
        assert_eq!(error.failures[0].path.as_deref(), Some("profile.name"));
        assert_eq!(error.failures[0].status, 73);
        assert_eq!(
            error.to_string(),
            "1 sub-document operation(s) failed: path not found"
        );
    }

    #[test]
    fn test_count_shape_reads_payload() {
        let payload = json!([
            {"path": "a", "status": 0},
            {"path": "b", "error": {"status": 73, "message": "path not found"}},
            {"path": "c", "status": 75, "message": "value too deep"}
        ]);
        let error = SubDocumentError::from_response(&json!(2), Some(&payload));
        assert_eq!(error.len(), 2);
        assert_eq!(error.failures[0].index, 1);
        assert_eq!(error.failures[0].path.as_deref(), Some("b"));
        assert_eq!(error.failures[1].index, 2);
        assert_eq!(error.failures[1].status, 75);
    }

    #[test]
    fn test_both_shapes_collapse_to_same_value() {
        let from_object = SubDocumentError::from_response(
            &json!([{"index": 1, "path": "b", "status": 73, "message": "path not found"}]),
            None,
        );
        let from_count = SubDocumentError::from_response(
            &json!(1),
            Some(&json!([
                {"path": "a", "status": 0},
                {"path": "b", "status": 73, "message": "path not found"}
            ])),
        );
        assert_eq!(from_object, from_count);
    }

    #[test]
    fn test_count_without_payload_keeps_count() {
        let error = SubDocumentError::from_response(&json!(3), None);
        assert_eq!(error.len(), 3);
        assert!(error.failures.iter().all(|f| f.path.is_none()));
    }
}
