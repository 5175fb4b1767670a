//! 分页引擎和索引管理器发出的结构化事件
//!
//! 组件在构造时接收 `Arc<dyn EventSink>`，而不是通过全局对象记录日志。
//! `LogSink` 转发到 `log` 门面，`RecordingSink` 把事件保存在内存中以便检查。

use log::Level;
use parking_lot::Mutex;
use std::fmt;

pub const LOG_TARGET: &str = "viewdb";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    PageProcessed {
        view: String,
        page: usize,
        rows: usize,
        cursor: Option<String>,
    },
    PaginationFinished {
        view: String,
        pages: usize,
        rows: usize,
    },
    IndexDefined {
        partition: String,
        index: String,
        deferred: bool,
    },
    IndexReplaced {
        partition: String,
        index: String,
    },
    IndexFailed {
        partition: String,
        index: String,
        error: String,
    },
    BuildTriggered {
        partition: String,
        indexes: Vec<String>,
    },
    BuildAlreadyDone {
        partition: String,
        indexes: Vec<String>,
        message: String,
    },
    BuildFailed {
        partition: String,
        indexes: Vec<String>,
        error: String,
    },
}

impl Event {
    pub fn level(&self) -> Level {
        match self {
            Event::PageProcessed { .. } => Level::Debug,
            Event::PaginationFinished { .. }
            | Event::IndexDefined { .. }
            | Event::BuildTriggered { .. } => Level::Info,
            Event::IndexReplaced { .. } | Event::BuildAlreadyDone { .. } => Level::Warn,
            Event::IndexFailed { .. } | Event::BuildFailed { .. } => Level::Error,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::PageProcessed {
                view,
                page,
                rows,
                cursor,
            } => write!(
                f,
                "page processed view={} page={} rows={} cursor={}",
                view,
                page,
                rows,
                cursor.as_deref().unwrap_or("-")
            ),
            Event::PaginationFinished { view, pages, rows } => {
                write!(f, "pagination finished view={} pages={} rows={}", view, pages, rows)
            }
            Event::IndexDefined {
                partition,
                index,
                deferred,
            } => write!(
                f,
                "index defined partition={} index={} deferred={}",
                partition, index, deferred
            ),
            Event::IndexReplaced { partition, index } => write!(
                f,
                "index already existed, dropped and recreated partition={} index={}",
                partition, index
            ),
            Event::IndexFailed {
                partition,
                index,
                error,
            } => write!(
                f,
                "index definition failed partition={} index={} error={}",
                partition, index, error
            ),
            Event::BuildTriggered { partition, indexes } => write!(
                f,
                "deferred build triggered partition={} indexes={}",
                partition,
                indexes.join(",")
            ),
            Event::BuildAlreadyDone {
                partition,
                indexes,
                message,
            } => write!(
                f,
                "deferred indexes already built partition={} indexes={} message={}",
                partition,
                indexes.join(","),
                message
            ),
            Event::BuildFailed {
                partition,
                indexes,
                error,
            } => write!(
                f,
                "deferred build failed partition={} indexes={} error={}",
                partition,
                indexes.join(","),
                error
            ),
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// 以 `viewdb` 为 target 把事件转发到 `log` 门面
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &Event) {
        log::log!(target: LOG_TARGET, event.level(), "{}", event);
    }
}

/// 按发出顺序保存所有事件
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.emit(&Event::IndexDefined {
            partition: "travel".to_string(),
            index: "by_type".to_string(),
            deferred: true,
        });
        sink.emit(&Event::BuildTriggered {
            partition: "travel".to_string(),
            indexes: vec!["by_type".to_string()],
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::IndexDefined { .. }));
        assert!(matches!(events[1], Event::BuildTriggered { .. }));

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_display_is_key_value() {
        let event = Event::PageProcessed {
            view: "_design/d/_view/v".to_string(),
            page: 2,
            rows: 10,
            cursor: None,
        };
        assert_eq!(
            event.to_string(),
            "page processed view=_design/d/_view/v page=2 rows=10 cursor=-"
        );
        assert_eq!(event.level(), Level::Debug);
    }

    #[test]
    fn test_log_sink_does_not_panic_without_logger() {
        LogSink.emit(&Event::PaginationFinished {
            view: "v".to_string(),
            pages: 1,
            rows: 0,
        });
    }
}
