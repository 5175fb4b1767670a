//! 视图键排序规则
//!
//! 视图 emit 的键是 JSON 值，先按类型再按值排序：
//! null < false < true < 数字 < 字符串 < 数组 < 对象。
//! 数组逐元素比较，对象按排序后的条目比较。

use serde_json::{Number, Value};
use std::cmp::Ordering;

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// 视图键上的全序
pub fn collate(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ord = collate(left, right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let ord = lk.cmp(rk).then_with(|| collate(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn compare_numbers(x: &Number, y: &Number) -> Ordering {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a.cmp(&b);
    }
    if x.is_f64() || y.is_f64() {
        let a = x.as_f64().unwrap_or(f64::NAN);
        let b = y.as_f64().unwrap_or(f64::NAN);
        return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    }
    // 一个是负的 i64，另一个是超出 i64 范围的 u64
    if x.as_i64().is_some() {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// 按排序规则判断键相等，`10` 与 `10.0` 视为同一个键
pub fn keys_equal(a: &Value, b: &Value) -> bool {
    collate(a, b) == Ordering::Equal
}

/// 两行的顺序：先比较键，再比较文档 id
pub fn collate_rows(
    a_key: &Value,
    a_id: Option<&str>,
    b_key: &Value,
    b_id: Option<&str>,
) -> Ordering {
    collate(a_key, b_key).then_with(|| a_id.cmp(&b_id))
}
