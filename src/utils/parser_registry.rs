use std::path::Path;

use crate::utils::parser::GridParser;

/// 解析器注册表
/// 管理所有可用的网格解析器，并根据文件扩展名匹配对应的解析器
pub struct ParserRegistry {
    parsers: Vec<Box<dyn GridParser>>,
}

impl ParserRegistry {
    /// 创建新的解析器注册表，自动注册所有可用的解析器
    pub fn new() -> Self {
        let parsers = crate::parsers::get_all_parsers();
        Self { parsers }
    }

    /// 根据文件扩展名查找匹配的解析器
    /// extension: 文件扩展名（不含点号），例如 "sph"
    pub fn find_parser(&self, extension: &str) -> Option<&dyn GridParser> {
        self.parsers
            .iter()
            .find(|parser| parser.supports(extension))
            .map(|p| p.as_ref())
    }

    /// 根据文件路径查找匹配的解析器
    /// 自动提取文件扩展名
    pub fn find_parser_for_file(&self, file_path: &str) -> Option<(&dyn GridParser, String)> {
        let extension = Path::new(file_path)
            .extension()
            .and_then(|ext| ext.to_str())?
            .to_string();

        self.find_parser(&extension)
            .map(|parser| (parser, extension))
    }

    /// 获取所有支持的扩展名列表
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self
            .parsers
            .iter()
            .flat_map(|parser| parser.supported_extensions())
            .map(|s| s.to_lowercase())
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
