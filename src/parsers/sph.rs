use crate::codec::sph;
use crate::error::Result;
use crate::grid::{Grid, GridHeader};
use crate::utils::parser::GridParser;

/// 原生 .sph 文件解析器，字节序由文件头自动判定
pub struct SphParser;

impl SphParser {
    pub fn new() -> Self {
        SphParser
    }
}

impl Default for SphParser {
    fn default() -> Self {
        Self::new()
    }
}

impl GridParser for SphParser {
    fn supported_extensions(&self) -> Vec<&'static str> {
        vec!["sph"]
    }

    fn name(&self) -> &'static str {
        "SPH Parser"
    }

    fn parse_from_file(&self, file_path: &str) -> Result<Grid> {
        sph::load_file(file_path)
    }

    fn read_header_from_file(&self, file_path: &str) -> Result<GridHeader> {
        let (header, endian) = sph::read_header_file(file_path)?;
        log::debug!("{}: {:?} 字节序, dims {:?}", file_path, endian, header.dims);
        Ok(header)
    }
}
