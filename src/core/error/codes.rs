//! 核心会响应的存储错误码
//!
//! 错误码沿用查询服务的编号：
//! - 3xxx: 语句解析
//! - 4xxx: 计划阶段（索引定义冲突属于此类）
//! - 5xxx: 执行阶段
//! - 12xxx: 索引服务 / keyspace 查找

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// 语句无法解析
    SyntaxError = 3000,
    /// keyspace 上已存在同名索引
    IndexAlreadyExists = 4300,
    /// 通用执行失败，"already built" 的构建请求也使用该错误码
    InternalError = 5000,
    /// 语句中指定的 keyspace 不存在
    KeyspaceNotFound = 12003,
    /// 语句中指定的索引不存在
    IndexNotFound = 12016,
}

impl ErrorCode {
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            3000 => Some(ErrorCode::SyntaxError),
            4300 => Some(ErrorCode::IndexAlreadyExists),
            5000 => Some(ErrorCode::InternalError),
            12003 => Some(ErrorCode::KeyspaceNotFound),
            12016 => Some(ErrorCode::IndexNotFound),
            _ => None,
        }
    }
}

impl From<ErrorCode> for u32 {
    fn from(code: ErrorCode) -> Self {
        code.as_u32()
    }
}
