//! 测试数据：视图、行和索引模板

use serde_json::{json, Value};
use viewdb::storage::{MemoryCluster, MemoryPartition, ViewDefinition};
use viewdb::{IndexDefinition, Partition, ViewId};

pub const PARTITION: &str = "travel-sample";

pub const INDEX_TEMPLATE: &str =
    r#"CREATE INDEX `{name}` ON `{bucket}`(type, country) WITH {"defer_build": {defer_build}}"#;

pub fn by_score() -> ViewId {
    ViewId::new("scores", "by_score")
}

/// 定义了 `by_score` 视图、每个 `(key, id)` 一行的分区
pub async fn scored_partition<S: AsRef<str>>(rows: &[(Value, S)]) -> MemoryPartition {
    let cluster = MemoryCluster::new();
    let partition = cluster.create_partition(PARTITION);
    partition
        .define_view(
            &by_score(),
            &ViewDefinition::new("function (doc, meta) { emit(doc.score, null); }"),
        )
        .await
        .expect("define view");
    for (key, id) in rows {
        partition.upsert_document(id.as_ref(), json!({ "score": key }));
        partition.emit(&by_score(), key.clone(), id.as_ref(), Value::Null);
    }
    partition
}

/// `count` 个共享 `key` 的行，id 补零以便按数值顺序排序
pub fn rows_with_key(key: Value, prefix: &str, count: usize) -> Vec<(Value, String)> {
    (0..count)
        .map(|i| (key.clone(), format!("{}::{:04}", prefix, i)))
        .collect()
}

pub fn index(partition: &str, name: &str) -> IndexDefinition {
    IndexDefinition::new(partition, name, INDEX_TEMPLATE)
}
