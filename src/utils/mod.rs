// 工具模块：注入式事件接收器与宿主侧日志初始化

pub mod events;
pub mod logging;

pub use events::{Event, EventSink, LogSink, RecordingSink};
