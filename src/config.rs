use std::time::Duration;

use clap::Parser;

/// 服务配置，全部来自命令行参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "SPH 网格分块服务")]
pub struct ServerConfig {
    /// 资源目录，.sph 和无格式记录文件都从这里读取
    #[arg(long, default_value = "test/resource")]
    pub resource_dir: String,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    /// 监听端口
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    /// 任务过期时间（分钟）
    #[arg(long, default_value_t = 30)]
    pub task_ttl_minutes: u64,
    /// 过期任务清理间隔（秒）
    #[arg(long, default_value_t = 5 * 60)]
    pub cleanup_interval_secs: u64,
}

impl ServerConfig {
    pub fn task_ttl(&self) -> Duration {
        Duration::from_secs(self.task_ttl_minutes * 60)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}
