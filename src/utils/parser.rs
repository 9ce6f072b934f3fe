use crate::error::Result;
use crate::grid::{Grid, GridHeader};

/// 网格文件解析器 trait
/// 不同文件格式需要实现这个 trait
pub trait GridParser: Send + Sync {
    /// 获取支持的文件扩展名（不含点号），例如: "sph"
    fn supported_extensions(&self) -> Vec<&'static str>;

    /// 检查文件扩展名是否被支持
    fn supports(&self, extension: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// 从文件路径解析完整网格
    fn parse_from_file(&self, file_path: &str) -> Result<Grid>;

    /// 快速获取文件的元数据（只读取头部记录，不解析采样数据）
    /// 用于预处理阶段快速返回分块信息
    fn read_header_from_file(&self, file_path: &str) -> Result<GridHeader>;

    /// 获取解析器名称（用于日志和错误信息）
    fn name(&self) -> &'static str;
}
