// 查询模块
//
// - view: 声明式视图查询选项及由其构建的具体查询
// - paginate: 基于游标的视图分页，每行调用一次 action

pub mod paginate;
pub mod view;

pub use paginate::{paginate, PaginationSummary, Paginator};
pub use view::{IdRange, KeyRange, OnError, SortOrder, Staleness, ViewQuery, ViewQuerySpec};
