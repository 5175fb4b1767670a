//! 索引定义及由其渲染出的语句

use crate::storage::Statement;
use serde::{Deserialize, Serialize};

/// 替换为目标分区名
pub const BUCKET_TOKEN: &str = "{bucket}";
/// 替换为索引名
pub const NAME_TOKEN: &str = "{name}";
/// 替换为 `true` 或 `false`
pub const DEFER_BUILD_TOKEN: &str = "{defer_build}";

/// 要在某个分区上声明的二级索引
///
/// `template` 是包含替换标记的创建语句，例如
/// ``CREATE INDEX `{name}` ON `{bucket}`(type) WITH {"defer_build": {defer_build}}``
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub partition: String,
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub defer_build: bool,
}

impl IndexDefinition {
    pub fn new(
        partition: impl Into<String>,
        name: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            name: name.into(),
            template: template.into(),
            defer_build: false,
        }
    }

    pub fn with_defer_build(mut self, defer_build: bool) -> Self {
        self.defer_build = defer_build;
        self
    }

    pub fn deferred(self) -> Self {
        self.with_defer_build(true)
    }

    /// 替换所有标记后的模板
    pub fn render(&self) -> String {
        self.template
            .replace(BUCKET_TOKEN, &self.partition)
            .replace(NAME_TOKEN, &self.name)
            .replace(DEFER_BUILD_TOKEN, if self.defer_build { "true" } else { "false" })
    }

    pub fn create_statement(&self) -> Statement {
        Statement::new(self.render())
    }

    pub fn drop_statement(&self) -> Statement {
        Statement::new(format!(
            "DROP INDEX {}.{}",
            quote_identifier(&self.partition),
            quote_identifier(&self.name)
        ))
    }
}

/// 在 `partition` 上一次性构建所列全部索引的请求
pub fn build_statement<S: AsRef<str>>(partition: &str, names: &[S]) -> Statement {
    let names: Vec<String> = names
        .iter()
        .map(|name| quote_identifier(name.as_ref()))
        .collect();
    Statement::new(format!(
        "BUILD INDEX ON {}({})",
        quote_identifier(partition),
        names.join(", ")
    ))
}

pub fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}
