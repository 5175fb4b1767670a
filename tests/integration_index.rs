//! 索引生命周期集成测试
//!
//! 通过集群打开内存分区并运行索引管理器

mod common;

use common::fixtures::{index, INDEX_TEMPLATE};
use std::collections::HashMap;
use std::sync::Arc;
use viewdb::config::IndexConfig;
use viewdb::storage::{FaultTarget, MemoryCluster, MemoryPartition};
use viewdb::utils::{Event, RecordingSink};
use viewdb::{Cluster, IndexDefinition, IndexError, IndexManager, StoreError};

async fn open_all(cluster: &MemoryCluster, names: &[&str]) -> HashMap<String, MemoryPartition> {
    let mut partitions = HashMap::new();
    for name in names {
        cluster.create_partition(name);
        let partition = cluster.open_partition(name).await.expect("open partition");
        partitions.insert(name.to_string(), partition);
    }
    partitions
}

fn recording_manager() -> (IndexManager, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    (IndexManager::new(IndexConfig::default(), sink.clone()), sink)
}

fn statements_starting(partition: &MemoryPartition, prefix: &str) -> Vec<String> {
    partition
        .executed_statements()
        .into_iter()
        .filter(|statement| statement.starts_with(prefix))
        .collect()
}

#[tokio::test]
async fn test_open_missing_partition() {
    let cluster = MemoryCluster::new();
    let error = cluster
        .open_partition("nowhere")
        .await
        .expect_err("partition was never created");
    assert_eq!(error, StoreError::PartitionNotFound("nowhere".to_string()));
}

#[tokio::test]
async fn test_deferred_builds_batched_per_partition() {
    let cluster = MemoryCluster::new();
    let partitions = open_all(&cluster, &["alpha", "beta"]).await;
    let (manager, sink) = recording_manager();

    let definitions = vec![
        index("alpha", "a1").deferred(),
        index("alpha", "a2").deferred(),
        index("alpha", "a3").deferred(),
        index("beta", "b1").deferred(),
    ];
    let report = manager
        .build_indexes(&partitions, &definitions)
        .await
        .expect("build should succeed");

    let alpha_builds = statements_starting(&partitions["alpha"], "BUILD");
    let beta_builds = statements_starting(&partitions["beta"], "BUILD");
    assert_eq!(alpha_builds.len(), 1);
    assert_eq!(beta_builds.len(), 1);
    for name in ["a1", "a2", "a3"] {
        assert!(alpha_builds[0].contains(&format!("`{}`", name)));
    }
    assert!(beta_builds[0].contains("`b1`"));

    assert_eq!(report.built["alpha"].len(), 3);
    assert_eq!(report.built["beta"], vec!["b1".to_string()]);

    // 集群返回的句柄与原句柄共享状态
    let alpha = cluster.create_partition("alpha");
    assert!(alpha.indexes().iter().all(|snapshot| snapshot.built));

    let triggered = sink
        .events()
        .iter()
        .filter(|event| matches!(event, Event::BuildTriggered { .. }))
        .count();
    assert_eq!(triggered, 2);
}

#[tokio::test]
async fn test_rerun_replaces_existing_indexes() {
    let cluster = MemoryCluster::new();
    let partitions = open_all(&cluster, &["travel-sample"]).await;
    let (manager, _) = recording_manager();
    let definitions = vec![
        index("travel-sample", "by_country").deferred(),
        index("travel-sample", "by_type"),
    ];

    let first = manager
        .build_indexes(&partitions, &definitions)
        .await
        .expect("first run");
    assert!(first.replaced.is_empty());

    let second = manager
        .build_indexes(&partitions, &definitions)
        .await
        .expect("rerun converges");
    assert_eq!(second.replaced.len(), 2);
    assert_eq!(second.defined, first.defined);

    let travel = &partitions["travel-sample"];
    assert_eq!(statements_starting(travel, "DROP").len(), 2);
    let by_country = travel.index("by_country").expect("by_country");
    assert!(by_country.deferred);
    assert!(by_country.built);
}

#[tokio::test]
async fn test_single_drop_on_conflict() {
    let cluster = MemoryCluster::new();
    let partitions = open_all(&cluster, &["travel-sample"]).await;
    let (manager, sink) = recording_manager();
    let definition = index("travel-sample", "by_type");

    manager
        .build_indexes(&partitions, std::slice::from_ref(&definition))
        .await
        .expect("first run");
    let report = manager
        .build_indexes(&partitions, std::slice::from_ref(&definition))
        .await
        .expect("conflict resolves");

    let travel = &partitions["travel-sample"];
    assert_eq!(
        statements_starting(travel, "DROP"),
        vec![definition.drop_statement().text]
    );
    assert_eq!(statements_starting(travel, "CREATE").len(), 3);
    assert_eq!(report.replaced.len(), 1);
    assert!(sink
        .events()
        .iter()
        .any(|event| matches!(event, Event::IndexReplaced { index, .. } if index == "by_type")));
}

#[tokio::test]
async fn test_failures_do_not_cancel_siblings() {
    let cluster = MemoryCluster::new();
    let partitions = open_all(&cluster, &["alpha", "beta"]).await;
    partitions["alpha"].inject_fault(
        FaultTarget::Statement("`broken`".to_string()),
        StoreError::Transport("connection reset".to_string()),
        1,
    );
    let (manager, sink) = recording_manager();

    let error = manager
        .build_indexes(
            &partitions,
            &[
                index("alpha", "healthy").deferred(),
                index("alpha", "broken").deferred(),
                index("gamma", "orphan"),
                index("beta", "other").deferred(),
            ],
        )
        .await
        .expect_err("two definitions fail");

    let IndexError::Batch(failures) = error else {
        panic!("expected a batch of failures, got {:?}", error);
    };
    assert_eq!(failures.len(), 2);
    assert!(failures
        .iter()
        .any(|failure| matches!(failure, IndexError::Define { index, .. } if index == "broken")));
    assert!(failures
        .iter()
        .any(|failure| matches!(failure, IndexError::UnknownPartition { partition, .. } if partition == "gamma")));

    assert!(partitions["alpha"].index("healthy").expect("healthy").built);
    assert!(partitions["alpha"].index("broken").is_none());
    assert!(partitions["beta"].index("other").expect("other").built);

    let failed = sink
        .events()
        .iter()
        .filter(|event| matches!(event, Event::IndexFailed { .. }))
        .count();
    assert_eq!(failed, 2);
}

#[tokio::test]
async fn test_build_failure_reports_partition() {
    let cluster = MemoryCluster::new();
    let partitions = open_all(&cluster, &["alpha"]).await;
    partitions["alpha"].inject_fault(
        FaultTarget::Statement("BUILD INDEX".to_string()),
        StoreError::Transport("timeout".to_string()),
        1,
    );
    let (manager, _) = recording_manager();

    let error = manager
        .build_indexes(&partitions, &[index("alpha", "a1").deferred()])
        .await
        .expect_err("build fails");

    assert!(matches!(error, IndexError::Build { ref indexes, .. } if indexes == &["a1".to_string()]));
    assert_eq!(error.partition(), Some("alpha"));
    assert_eq!(error.index(), None);
    // 索引定义本身保持不变
    assert!(!partitions["alpha"].index("a1").expect("a1").built);
}

#[tokio::test]
async fn test_template_rendering_reaches_the_store() {
    let cluster = MemoryCluster::new();
    let partitions = open_all(&cluster, &["travel-sample"]).await;
    let definition = IndexDefinition::new("travel-sample", "by_route", INDEX_TEMPLATE);

    viewdb::build_indexes(&partitions, std::slice::from_ref(&definition))
        .await
        .expect("eager index");

    let statements = partitions["travel-sample"].executed_statements();
    assert_eq!(statements, vec![definition.render()]);
    assert!(statements[0].contains("ON `travel-sample`"));
    assert!(statements[0].contains(r#""defer_build": false"#));
}

#[tokio::test]
async fn test_shared_partition_handles() {
    let cluster = MemoryCluster::new();
    cluster.create_partition("alpha");
    let handle = Arc::new(cluster.open_partition("alpha").await.expect("open"));
    let partitions: HashMap<String, Arc<MemoryPartition>> =
        HashMap::from([("alpha".to_string(), handle.clone())]);

    IndexManager::default()
        .build_indexes(&partitions, &[index("alpha", "a1").deferred()])
        .await
        .expect("build through Arc handles");

    assert!(handle.index("a1").expect("a1").built);
}
