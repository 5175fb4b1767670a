//! 索引生命周期管理器
//!
//! 并发定义所有索引，每条链路相互独立：
//! 定义 -> （已存在）删除 -> 再次定义。第二次失败即为最终失败。
//! 带 `defer_build` 且定义成功的索引随后按分区分组，
//! 每个分区发送一次构建请求。返回 "already built" 的构建视为已完成。
//!
//! 调用之间不缓存任何状态；对在线集群重复执行相同定义会收敛，
//! 因为冲突都以存储端状态为准解决。

use super::error::{already_built_names, classify, FailureKind, IndexError, IndexResult};
use super::types::{build_statement, IndexDefinition};
use crate::config::IndexConfig;
use crate::storage::{Partition, Request};
use crate::utils::events::{Event, EventSink, LogSink};
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// 分区名与索引名
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexRef {
    pub partition: String,
    pub name: String,
}

impl IndexRef {
    fn of(definition: &IndexDefinition) -> Self {
        Self {
            partition: definition.partition.clone(),
            name: definition.name.clone(),
        }
    }
}

/// `build_indexes` 成功调用的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// 当前已定义的所有索引，按定义顺序排列
    pub defined: Vec<IndexRef>,
    /// 已存在并被删除重建的索引
    pub replaced: Vec<IndexRef>,
    /// 按分区记录的已构建延迟索引
    pub built: BTreeMap<String, Vec<String>>,
    /// 存储端报告为已构建的延迟索引
    pub already_built: BTreeMap<String, Vec<String>>,
}

enum Defined {
    Created,
    Replaced,
}

enum BuildOutcome {
    Built,
    /// 存储端报告为已构建的索引；组内其余索引已完成构建
    AlreadyBuilt(Vec<String>),
}

pub struct IndexManager {
    config: IndexConfig,
    sink: Arc<dyn EventSink>,
}

impl IndexManager {
    pub fn new(config: IndexConfig, sink: Arc<dyn EventSink>) -> Self {
        Self { config, sink }
    }

    /// 在各自分区上定义 `indexes`，然后构建其中的延迟索引
    ///
    /// 单个索引失败不会影响其他索引。所有定义链路和构建请求结束后才统一报告失败；
    /// 已定义或已构建的索引保持不变。
    pub async fn build_indexes<P: Partition>(
        &self,
        partitions: &HashMap<String, P>,
        indexes: &[IndexDefinition],
    ) -> IndexResult<BuildReport> {
        let outcomes = join_all(
            indexes
                .iter()
                .map(|definition| self.define(partitions, definition)),
        )
        .await;

        let mut report = BuildReport::default();
        let mut failures = Vec::new();
        let mut deferred: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (definition, outcome) in indexes.iter().zip(outcomes) {
            match outcome {
                Ok(defined) => {
                    if matches!(defined, Defined::Replaced) {
                        report.replaced.push(IndexRef::of(definition));
                    }
                    report.defined.push(IndexRef::of(definition));
                    if definition.defer_build {
                        deferred
                            .entry(definition.partition.as_str())
                            .or_default()
                            .push(definition.name.as_str());
                    }
                }
                Err(err) => {
                    self.sink.emit(&Event::IndexFailed {
                        partition: definition.partition.clone(),
                        index: definition.name.clone(),
                        error: err.to_string(),
                    });
                    failures.push(err);
                }
            }
        }

        if failures.is_empty() || !self.config.skip_build_on_define_failure {
            let builds = join_all(deferred.iter().map(|(partition, names)| async move {
                (
                    *partition,
                    names,
                    self.trigger_build(partitions, partition, names).await,
                )
            }))
            .await;

            for (partition, names, outcome) in builds {
                let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
                match outcome {
                    Ok(BuildOutcome::Built) => {
                        report.built.insert(partition.to_string(), names);
                    }
                    Ok(BuildOutcome::AlreadyBuilt(done)) => {
                        let rest: Vec<String> = names
                            .into_iter()
                            .filter(|name| !done.contains(name))
                            .collect();
                        if !rest.is_empty() {
                            report.built.insert(partition.to_string(), rest);
                        }
                        report.already_built.insert(partition.to_string(), done);
                    }
                    Err(err) => failures.push(err),
                }
            }
        }

        match IndexError::from_failures(failures) {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    async fn define<P: Partition>(
        &self,
        partitions: &HashMap<String, P>,
        definition: &IndexDefinition,
    ) -> IndexResult<Defined> {
        let partition = partitions.get(&definition.partition).ok_or_else(|| {
            IndexError::UnknownPartition {
                partition: definition.partition.clone(),
                index: definition.name.clone(),
            }
        })?;
        let create = Request::Statement(definition.create_statement());

        match partition.execute(&create).await {
            Ok(_) => {
                self.sink.emit(&Event::IndexDefined {
                    partition: definition.partition.clone(),
                    index: definition.name.clone(),
                    deferred: definition.defer_build,
                });
                Ok(Defined::Created)
            }
            Err(source)
                if self.config.recreate_on_conflict
                    && classify(&source) == FailureKind::AlreadyExists =>
            {
                partition
                    .execute(&Request::Statement(definition.drop_statement()))
                    .await
                    .map_err(|source| IndexError::Drop {
                        partition: definition.partition.clone(),
                        index: definition.name.clone(),
                        source,
                    })?;
                partition
                    .execute(&create)
                    .await
                    .map_err(|source| IndexError::Recreate {
                        partition: definition.partition.clone(),
                        index: definition.name.clone(),
                        source,
                    })?;
                self.sink.emit(&Event::IndexReplaced {
                    partition: definition.partition.clone(),
                    index: definition.name.clone(),
                });
                Ok(Defined::Replaced)
            }
            Err(source) => Err(IndexError::Define {
                partition: definition.partition.clone(),
                index: definition.name.clone(),
                source,
            }),
        }
    }

    async fn trigger_build<P: Partition>(
        &self,
        partitions: &HashMap<String, P>,
        partition_name: &str,
        names: &[&str],
    ) -> IndexResult<BuildOutcome> {
        let to_strings = || names.iter().map(|name| name.to_string()).collect::<Vec<_>>();
        // define() 已为每个延迟索引解析过该分区
        let Some(partition) = partitions.get(partition_name) else {
            return Err(IndexError::UnknownPartition {
                partition: partition_name.to_string(),
                index: names.join(", "),
            });
        };

        match partition
            .execute(&Request::Statement(build_statement(partition_name, names)))
            .await
        {
            Ok(_) => {
                self.sink.emit(&Event::BuildTriggered {
                    partition: partition_name.to_string(),
                    indexes: to_strings(),
                });
                Ok(BuildOutcome::Built)
            }
            Err(source) if classify(&source) == FailureKind::AlreadyBuilt => {
                let message = source.message();
                // 消息中没有可识别的索引名时，整组视为已构建
                let done = already_built_names(&message)
                    .map(|listed| {
                        names
                            .iter()
                            .filter(|name| listed.iter().any(|l| l == *name))
                            .map(|name| name.to_string())
                            .collect::<Vec<_>>()
                    })
                    .filter(|done| !done.is_empty())
                    .unwrap_or_else(to_strings);
                self.sink.emit(&Event::BuildAlreadyDone {
                    partition: partition_name.to_string(),
                    indexes: done.clone(),
                    message,
                });
                Ok(BuildOutcome::AlreadyBuilt(done))
            }
            Err(source) => {
                self.sink.emit(&Event::BuildFailed {
                    partition: partition_name.to_string(),
                    indexes: to_strings(),
                    error: source.to_string(),
                });
                Err(IndexError::Build {
                    partition: partition_name.to_string(),
                    indexes: to_strings(),
                    source,
                })
            }
        }
    }
}

impl Default for IndexManager {
    fn default() -> Self {
        Self::new(IndexConfig::default(), Arc::new(LogSink))
    }
}

/// 使用默认策略构建索引，通过 `log` 门面记录日志
pub async fn build_indexes<P: Partition>(
    partitions: &HashMap<String, P>,
    indexes: &[IndexDefinition],
) -> IndexResult<BuildReport> {
    IndexManager::default()
        .build_indexes(partitions, indexes)
        .await
}
