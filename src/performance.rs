use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// 性能数据记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// 开始时间 (Unix 时间戳，毫秒)
    pub start_time: u64,
    /// 结束时间 (Unix 时间戳，毫秒)
    pub end_time: u64,
    /// 行组 (同一行组颜色相同)
    pub channel_group: String,
    /// 行号 (在同一行组内的标识，如 "parse_file", "decompose")
    pub channel_index: String,
    /// 消息 (hover 时除了时间外的显示信息)
    pub msg: String,
}

impl PerformanceRecord {
    /// 记录从 `start_time` 到现在的一个阶段
    pub fn since(start_time: u64, channel_index: &str, msg: String) -> Self {
        Self {
            start_time,
            end_time: get_unix_timestamp_ms(),
            channel_group: "grid_task".to_string(),
            channel_index: channel_index.to_string(),
            msg,
        }
    }
}

/// 性能数据存储
/// 按 task_id 存储性能记录
pub struct PerformanceStore {
    /// task_id -> 性能记录列表
    records: RwLock<HashMap<String, Vec<PerformanceRecord>>>,
    /// task_id -> 创建时间
    session_times: RwLock<HashMap<String, SystemTime>>,
    /// TTL（Time-To-Live）过期时间
    default_ttl: Duration,
}

impl PerformanceStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            session_times: RwLock::new(HashMap::new()),
            default_ttl: ttl,
        }
    }

    /// 添加性能记录
    pub fn add_record(&self, task_id: &str, record: PerformanceRecord) {
        self.records
            .write()
            .entry(task_id.to_string())
            .or_default()
            .push(record);

        // 记录创建时间（如果还没有）
        self.session_times
            .write()
            .entry(task_id.to_string())
            .or_insert_with(SystemTime::now);
    }

    /// 获取指定任务的所有性能记录
    pub fn get_records(&self, task_id: &str) -> Option<Vec<PerformanceRecord>> {
        self.records.read().get(task_id).cloned()
    }

    /// 清理过期的记录
    pub fn cleanup_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut records = self.records.write();
        let mut session_times = self.session_times.write();
        let before_count = records.len();

        session_times.retain(|task_id, created_at| {
            let alive = now.duration_since(*created_at).unwrap_or(Duration::ZERO) <= self.default_ttl;
            if !alive {
                records.remove(task_id);
            }
            alive
        });

        before_count - records.len()
    }
}

/// 获取 Unix 时间戳（毫秒）
pub fn get_unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
