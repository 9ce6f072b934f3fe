//! SPH 网格数据的编解码与共享边界分割
//!
//! - [`grid`]: 网格数据模型
//! - [`codec`]: 原生 .sph 格式与 FORTRAN 无格式记录的读写
//! - [`decompose`]: 相邻子网格共享一层格点的区域分割
//!
//! 其余模块组成 HTTP 分块服务：加载资源目录中的网格文件，后台分割后逐个下发子网格。

pub mod app_state;
pub mod codec;
pub mod config;
pub mod decompose;
pub mod error;
pub mod grid;
pub mod handlers;
pub mod parsers;
pub mod performance;
pub mod routes;
pub mod task;
pub mod utils;

pub use codec::Endian;
pub use decompose::{SharedEdgePlan, SubBlock, divide_share_edge};
pub use error::{GridError, Result};
pub use grid::{Grid, GridHeader, Precision, VecLen};
