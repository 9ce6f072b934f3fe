mod sph;

pub use sph::SphParser;

/// 获取所有可用的解析器
pub fn get_all_parsers() -> Vec<Box<dyn crate::utils::parser::GridParser>> {
    vec![Box::new(SphParser::new())]
}
