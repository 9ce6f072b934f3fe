//! SPH 网格的二进制编解码
//!
//! - [`sph`]: 原生 .sph 文件格式（带字节序自动检测，单/双精度布局不同）
//! - [`fort`]: FORTRAN 无格式顺序记录（单条带长度标记的记录）

pub mod fort;
pub mod sph;

use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::grid::Precision;

/// 文件字节序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// 当前平台的字节序
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    pub fn swapped(self) -> Self {
        match self {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        }
    }

    /// 按该字节序解释 4 字节整数
    pub(crate) fn read_i32(self, bytes: &[u8; 4]) -> i32 {
        match self {
            Endian::Little => LittleEndian::read_i32(bytes),
            Endian::Big => BigEndian::read_i32(bytes),
        }
    }
}

/// 按精度读取 `count` 个采样值
pub(crate) fn read_samples<B: ByteOrder, R: Read>(
    r: &mut R,
    precision: Precision,
    count: usize,
) -> Result<Vec<f64>> {
    // 元素数来自文件内容，预分配设上限，避免损坏的文件导致一次性申请巨量内存
    let mut data = Vec::with_capacity(count.min(1 << 24));
    let on_err = GridError::reading("payload");
    match precision {
        Precision::Single => {
            for _ in 0..count {
                data.push(r.read_f32::<B>().map_err(&on_err)? as f64);
            }
        }
        Precision::Double => {
            for _ in 0..count {
                data.push(r.read_f64::<B>().map_err(&on_err)?);
            }
        }
    }
    Ok(data)
}

/// 按精度写出采样值
pub(crate) fn write_samples<B: ByteOrder, W: Write>(
    w: &mut W,
    precision: Precision,
    data: &[f64],
) -> Result<()> {
    match precision {
        Precision::Single => {
            for &v in data {
                w.write_f32::<B>(v as f32)?;
            }
        }
        Precision::Double => {
            for &v in data {
                w.write_f64::<B>(v)?;
            }
        }
    }
    Ok(())
}

/// 数据记录的字节数，需能放进 32 位记录标记
pub(crate) fn payload_marker(element_count: usize, precision: Precision) -> Result<i32> {
    element_count
        .checked_mul(precision.word_size())
        .and_then(|bytes| i32::try_from(bytes).ok())
        .ok_or_else(|| {
            GridError::consistency(format!(
                "{} 个采样值超出 32 位记录标记能表示的字节数",
                element_count
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endian_swapped() {
        assert_eq!(Endian::Little.swapped(), Endian::Big);
        assert_eq!(Endian::native().swapped().swapped(), Endian::native());
    }

    #[test]
    fn test_read_i32() {
        let bytes = [0, 0, 0, 8];
        assert_eq!(Endian::Big.read_i32(&bytes), 8);
        assert_eq!(Endian::Little.read_i32(&bytes), 8 << 24);
        assert_eq!(Endian::Big.read_i32(&[0xff, 0xff, 0xff, 0xfe]), -2);
    }

    #[test]
    fn test_payload_marker_overflow() {
        assert_eq!(payload_marker(3, Precision::Double).unwrap(), 24);
        assert!(matches!(
            payload_marker(usize::MAX / 2, Precision::Single),
            Err(GridError::Consistency { .. })
        ));
    }
}
