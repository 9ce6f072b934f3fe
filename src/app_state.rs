use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Duration;

use crate::performance::PerformanceStore;
use crate::task::TaskStore;
use crate::utils::parser_registry::ParserRegistry;

/// 全局应用状态，负责在各个 handler 之间共享解析器与资源目录
pub struct AppState {
    pub parser_registry: Arc<ParserRegistry>,
    pub resource_dir: String,
    pub task_store: Arc<TaskStore>,
    pub performance_store: Arc<PerformanceStore>,
}

impl AppState {
    pub fn new(resource_dir: String, task_ttl: Duration) -> Self {
        Self {
            parser_registry: Arc::new(ParserRegistry::new()),
            resource_dir,
            task_store: Arc::new(TaskStore::with_ttl(task_ttl)),
            performance_store: Arc::new(PerformanceStore::new(task_ttl)),
        }
    }

    /// 构建资源目录下的文件路径：{资源目录}/{文件名}
    /// 文件名只能是资源目录内的相对路径，包含 ".." 或绝对路径时返回 None
    pub fn resource_path(&self, file: &str) -> Option<String> {
        let path = Path::new(file);
        let inside = !file.is_empty()
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        inside.then(|| format!("{}/{}", self.resource_dir, file))
    }
}
