use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::decompose::SubBlock;
use crate::grid::{Grid, GridHeader};

/// 子网格的当前状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// 后台仍在解析或分割
    Pending,
    /// 已就绪，可以取走
    Ready,
    /// 已被请求过，数据已释放（或序号不存在）
    Taken,
}

/// 任务数据，存储分割后的子网格
/// 使用 HashMap 独立存储每个子网格，允许单独释放
pub struct TaskData {
    /// 父网格元数据
    pub header: GridHeader,
    /// 各轴分割数
    pub div: [usize; 3],
    /// 子网格描述列表
    pub chunks: Vec<SubBlock>,
    /// 每个子网格的数据，key 是 chunk_index
    /// 当子网格被请求后，对应的数据会被移除以释放内存
    /// None 表示正在分割中，Some(Grid) 表示已就绪
    pub chunk_data: RwLock<HashMap<usize, Option<Grid>>>,
    /// 后台解析或分割失败的原因
    failure: RwLock<Option<String>>,
    /// 任务创建时间，用于 TTL 过期检查
    pub created_at: Instant,
    /// 文件路径，用于后台解析
    pub file_path: String,
}

impl TaskData {
    /// 创建新的 TaskData（预处理阶段，子网格尚未生成）
    pub fn new(header: GridHeader, div: [usize; 3], chunks: Vec<SubBlock>, file_path: String) -> Self {
        let chunk_data = chunks.iter().map(|c| (c.index, None)).collect();

        Self {
            header,
            div,
            chunks,
            chunk_data: RwLock::new(chunk_data),
            failure: RwLock::new(None),
            created_at: Instant::now(),
            file_path,
        }
    }

    /// 设置指定子网格（后台分割完成后调用）
    pub fn set_chunk(&self, chunk_index: usize, grid: Grid) {
        self.chunk_data.write().insert(chunk_index, Some(grid));
    }

    /// 获取并移除指定子网格（用于请求后释放内存）
    /// 返回 None 如果：
    /// - 子网格不存在
    /// - 子网格还未就绪
    /// - 子网格已被请求
    pub fn take_chunk(&self, chunk_index: usize) -> Option<Grid> {
        let mut chunk_data = self.chunk_data.write();
        match chunk_data.get(&chunk_index) {
            Some(Some(_)) => chunk_data.remove(&chunk_index).flatten(),
            _ => None,
        }
    }

    /// 查询指定子网格的状态
    pub fn chunk_state(&self, chunk_index: usize) -> ChunkState {
        match self.chunk_data.read().get(&chunk_index) {
            Some(Some(_)) => ChunkState::Ready,
            Some(None) => ChunkState::Pending,
            None => ChunkState::Taken,
        }
    }

    /// 后台重新读取的网格必须与预处理时的头部一致，否则子网格描述已失效
    pub fn check_source(&self, grid: &Grid) -> Result<(), String> {
        let header = grid.header();
        if header == self.header {
            Ok(())
        } else {
            Err(format!(
                "文件在预处理后被修改: 头部 dims {:?} origin {:?}，当前 dims {:?} origin {:?}",
                self.header.dims, self.header.origin, header.dims, header.origin
            ))
        }
    }

    /// 记录后台任务失败
    pub fn mark_failed(&self, reason: impl Into<String>) {
        *self.failure.write() = Some(reason.into());
    }

    pub fn failure(&self) -> Option<String> {
        self.failure.read().clone()
    }

    /// 获取剩余（未被请求）的子网格数量
    pub fn remaining_chunk_count(&self) -> usize {
        self.chunk_data.read().len()
    }
}

pub struct TaskStore {
    tasks: RwLock<HashMap<String, Arc<TaskData>>>,
    /// TTL（Time-To-Live）过期时间
    default_ttl: Duration,
}

impl TaskStore {
    /// 默认 TTL 为 30 分钟
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(30 * 60))
    }

    /// 创建带自定义 TTL 的 TaskStore
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            default_ttl: ttl,
        }
    }

    pub fn insert(&self, data: TaskData) -> String {
        let task_id = Uuid::new_v4().to_string();
        self.tasks.write().insert(task_id.clone(), Arc::new(data));
        task_id
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<TaskData>> {
        self.tasks.read().get(task_id).cloned()
    }

    /// 清理过期的任务
    /// 返回清理的任务数量
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut tasks = self.tasks.write();
        let before_count = tasks.len();

        tasks.retain(|_, task| now.duration_since(task.created_at) < self.default_ttl);

        before_count - tasks.len()
    }

    /// 获取当前任务数量
    pub fn task_count(&self) -> usize {
        self.tasks.read().len()
    }

    /// 获取默认 TTL
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
