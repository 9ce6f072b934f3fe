//! FORTRAN 无格式顺序记录
//!
//! 文件只包含一条记录：`int32 字节数, 采样值, int32 字节数`。
//! 记录本身不携带尺寸和精度，读取时由调用方通过 [`RecordLayout`] 给出；
//! 字节序根据长度标记是否等于期望字节数推断。

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use serde::Deserialize;

use super::{Endian, payload_marker, read_samples, write_samples};
use crate::error::{GridError, Result};
use crate::grid::{Grid, GridHeader, Precision, VecLen, element_count};

fn default_veclen() -> VecLen {
    VecLen::Scalar
}

fn default_precision() -> Precision {
    Precision::Single
}

fn default_pitch() -> [f64; 3] {
    [1.0; 3]
}

/// 读取无格式记录所需的外部描述
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordLayout {
    /// 记录中的数组尺寸（包含要裁掉的袖区）
    pub dims: [usize; 3],
    #[serde(default = "default_veclen")]
    pub veclen: VecLen,
    #[serde(default = "default_precision")]
    pub precision: Precision,
    #[serde(default)]
    pub origin: [f64; 3],
    #[serde(default = "default_pitch")]
    pub pitch: [f64; 3],
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub step: i64,
    /// 各轴两端要裁掉的格点数 (left, right)
    #[serde(default)]
    pub cut: [(usize, usize); 3],
}

impl RecordLayout {
    /// 单精度标量、原点 0、间距 1、不裁剪
    pub fn new(dims: [usize; 3]) -> Self {
        Self {
            dims,
            veclen: default_veclen(),
            precision: default_precision(),
            origin: [0.0; 3],
            pitch: default_pitch(),
            time: 0.0,
            step: 0,
            cut: [(0, 0); 3],
        }
    }

    pub fn with_veclen(mut self, veclen: VecLen) -> Self {
        self.veclen = veclen;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_cut(mut self, cut: [(usize, usize); 3]) -> Self {
        self.cut = cut;
        self
    }

    /// 记录负载的期望字节数
    pub fn expected_bytes(&self) -> Option<usize> {
        element_count(self.dims, self.veclen)?.checked_mul(self.precision.word_size())
    }

    /// 裁剪后的尺寸
    fn cropped_dims(&self) -> Result<[usize; 3]> {
        let mut out = [0usize; 3];
        for axis in 0..3 {
            let (left, right) = self.cut[axis];
            let n = self.dims[axis];
            match left.checked_add(right) {
                Some(trim) if trim < n => out[axis] = n - trim,
                _ => {
                    return Err(GridError::format(format!(
                        "第 {} 轴裁剪量 ({}, {}) 超出尺寸 {}",
                        axis, left, right, n
                    )));
                }
            }
        }
        Ok(out)
    }
}

/// 从字节数组解码一条记录
pub fn decode(bytes: &[u8], layout: &RecordLayout) -> Result<Grid> {
    let mut reader = bytes;
    read_grid(&mut reader, layout)
}

/// 从 reader 读取一条记录并按 layout 裁剪
pub fn read_grid<R: Read>(r: &mut R, layout: &RecordLayout) -> Result<Grid> {
    if layout.dims.iter().any(|&n| n < 1) {
        return Err(GridError::format(format!(
            "dims {:?} 的每个维度都必须 >= 1",
            layout.dims
        )));
    }
    let expected = layout
        .expected_bytes()
        .ok_or_else(|| GridError::format(format!("dims {:?} 元素数溢出", layout.dims)))?;
    let cropped = layout.cropped_dims()?;

    let mut prefix = [0u8; 4];
    r.read_exact(&mut prefix)
        .map_err(GridError::reading("record marker"))?;
    let endian = infer_endian(&prefix, expected)?;

    let count = expected / layout.precision.word_size();
    let data = match endian {
        Endian::Little => read_samples::<LittleEndian, _>(r, layout.precision, count)?,
        Endian::Big => read_samples::<BigEndian, _>(r, layout.precision, count)?,
    };
    check_suffix(r, &prefix)?;

    let header = GridHeader {
        dims: cropped,
        veclen: layout.veclen,
        precision: layout.precision,
        origin: layout.origin,
        pitch: layout.pitch,
        step: layout.step,
        time: layout.time,
    };
    let data = crop(data, layout.dims, layout.veclen.count(), layout.cut, cropped);
    Ok(Grid::from_parts(header, data))
}

/// 从文件加载一条无格式记录
pub fn load_file(path: impl AsRef<Path>, layout: &RecordLayout) -> Result<Grid> {
    let file = File::open(path)?;
    read_grid(&mut BufReader::new(file), layout)
}

/// 按网格自身精度编码为一条记录
pub fn encode(grid: &Grid, endian: Endian) -> Result<Vec<u8>> {
    encode_as(grid, grid.precision, endian)
}

pub fn encode_as(grid: &Grid, precision: Precision, endian: Endian) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(8 + grid.data.len() * precision.word_size());
    write_grid_as(grid, precision, endian, &mut buf)?;
    Ok(buf)
}

/// 写出一条记录：长度标记、全部采样值、相同的长度标记
pub fn write_grid_as<W: Write>(
    grid: &Grid,
    precision: Precision,
    endian: Endian,
    w: &mut W,
) -> Result<()> {
    grid.validate()?;
    let marker = payload_marker(grid.data.len(), precision)?;
    match endian {
        Endian::Little => write_record::<LittleEndian, _>(w, precision, marker, &grid.data),
        Endian::Big => write_record::<BigEndian, _>(w, precision, marker, &grid.data),
    }
}

pub fn save_file(grid: &Grid, path: impl AsRef<Path>, endian: Endian) -> Result<()> {
    grid.validate()?;
    payload_marker(grid.data.len(), grid.precision)?;

    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    write_grid_as(grid, grid.precision, endian, &mut w)?;
    w.flush()?;
    Ok(())
}

fn write_record<B: ByteOrder, W: Write>(
    w: &mut W,
    precision: Precision,
    marker: i32,
    data: &[f64],
) -> Result<()> {
    w.write_i32::<B>(marker)?;
    write_samples::<B, _>(w, precision, data)?;
    w.write_i32::<B>(marker)?;
    Ok(())
}

/// 先按本机字节序比较长度标记，不匹配时再按相反字节序比较
fn infer_endian(prefix: &[u8; 4], expected: usize) -> Result<Endian> {
    let native = Endian::native();
    [native, native.swapped()]
        .into_iter()
        .find(|e| usize::try_from(e.read_i32(prefix)).is_ok_and(|len| len == expected))
        .ok_or_else(|| {
            GridError::format(format!(
                "无法确定字节序: 记录长度标记与期望的 {} 字节不符（dims 或精度可能有误）",
                expected
            ))
        })
}

/// 记录尾部的长度标记：存在时必须与头部一致，缺失时忽略
fn check_suffix<R: Read>(r: &mut R, prefix: &[u8; 4]) -> Result<()> {
    let mut suffix = [0u8; 4];
    match r.read_exact(&mut suffix) {
        Ok(()) if &suffix == prefix => Ok(()),
        Ok(()) => Err(GridError::format("记录首尾长度标记不一致")),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(()),
        Err(e) => Err(GridError::Io(e)),
    }
}

/// 按 cut 取出内部区域，逐行复制
fn crop(
    data: Vec<f64>,
    dims: [usize; 3],
    veclen: usize,
    cut: [(usize, usize); 3],
    cropped: [usize; 3],
) -> Vec<f64> {
    if cropped == dims {
        return data;
    }

    let row_len = cropped[0] * veclen;
    let mut out = Vec::with_capacity(cropped[0] * cropped[1] * cropped[2] * veclen);
    for k in cut[2].0..cut[2].0 + cropped[2] {
        for j in cut[1].0..cut[1].0 + cropped[1] {
            let start = ((k * dims[1] + j) * dims[0] + cut[0].0) * veclen;
            out.extend_from_slice(&data[start..start + row_len]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(values: &[f64], precision: Precision, endian: Endian) -> Vec<u8> {
        let grid = Grid::from_shape_vec(&[values.len()], values.to_vec(), precision).unwrap();
        encode(&grid, endian).unwrap()
    }

    #[test]
    fn test_crop_keeps_interior_samples() {
        let bytes = record(&[1.0, 2.0, 3.0, 4.0], Precision::Single, Endian::native());
        let layout = RecordLayout::new([4, 1, 1]).with_cut([(1, 1), (0, 0), (0, 0)]);

        let grid = decode(&bytes, &layout).unwrap();
        assert_eq!(grid.dims, [2, 1, 1]);
        assert_eq!(grid.data, vec![2.0, 3.0]);
    }

    #[test]
    fn test_range_covers_retained_samples_only() {
        let bytes = record(&[100.0, 1.0, 2.0, -100.0], Precision::Double, Endian::native());
        let layout = RecordLayout::new([4, 1, 1])
            .with_precision(Precision::Double)
            .with_cut([(1, 1), (0, 0), (0, 0)]);

        let grid = decode(&bytes, &layout).unwrap();
        assert_eq!(grid.min, vec![1.0]);
        assert_eq!(grid.max, vec![2.0]);
    }

    #[test]
    fn test_crop_vector_volume() {
        let dims = [4, 3, 3];
        let values: Vec<f64> = (0..4 * 3 * 3 * 3).map(|v| v as f64).collect();
        let full = Grid::new(dims, VecLen::Vector, Precision::Double, values).unwrap();
        let bytes = encode(&full, Endian::Little).unwrap();

        let layout = RecordLayout::new(dims)
            .with_veclen(VecLen::Vector)
            .with_precision(Precision::Double)
            .with_cut([(1, 2), (0, 1), (1, 1)]);
        let grid = decode(&bytes, &layout).unwrap();

        assert_eq!(grid.dims, [1, 2, 1]);
        for j in 0..2 {
            for c in 0..3 {
                assert_eq!(grid.value(0, j, 0, c), full.value(1, j, 1, c));
            }
        }
    }

    #[test]
    fn test_swapped_byte_order_is_inferred() {
        let values = [0.5, -1.5, 2.25];
        let bytes = record(&values, Precision::Single, Endian::native().swapped());

        let grid = decode(&bytes, &RecordLayout::new([3, 1, 1])).unwrap();
        assert_eq!(grid.data, values.to_vec());
    }

    #[test]
    fn test_wrong_dims_is_format_error() {
        let bytes = record(&[1.0, 2.0, 3.0], Precision::Single, Endian::Little);
        assert!(matches!(
            decode(&bytes, &RecordLayout::new([4, 1, 1])),
            Err(GridError::Format { .. })
        ));
        assert!(matches!(
            decode(&bytes, &RecordLayout::new([3, 1, 1]).with_precision(Precision::Double)),
            Err(GridError::Format { .. })
        ));
    }

    #[test]
    fn test_excessive_cut_is_format_error() {
        let bytes = record(&[1.0, 2.0, 3.0, 4.0], Precision::Single, Endian::Little);
        let layout = RecordLayout::new([4, 1, 1]).with_cut([(2, 2), (0, 0), (0, 0)]);
        assert!(matches!(decode(&bytes, &layout), Err(GridError::Format { .. })));
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = record(&[1.0, 2.0, 3.0, 4.0], Precision::Single, Endian::Little);
        let layout = RecordLayout::new([4, 1, 1]);

        assert!(matches!(
            decode(&bytes[..2], &layout),
            Err(GridError::Truncated { record: "record marker" })
        ));
        assert!(matches!(
            decode(&bytes[..10], &layout),
            Err(GridError::Truncated { record: "payload" })
        ));
    }

    #[test]
    fn test_trailing_marker() {
        let mut bytes = record(&[1.0, 2.0], Precision::Single, Endian::Little);
        let layout = RecordLayout::new([2, 1, 1]);

        assert!(decode(&bytes[..bytes.len() - 4], &layout).is_ok());

        let n = bytes.len();
        bytes[n - 4..].copy_from_slice(&9i32.to_le_bytes());
        assert!(matches!(decode(&bytes, &layout), Err(GridError::Format { .. })));
    }

    #[test]
    fn test_tie_with_running_min() {
        let bytes = record(&[5.0, 5.0], Precision::Single, Endian::Little);
        let grid = decode(&bytes, &RecordLayout::new([2, 1, 1])).unwrap();
        assert_eq!(grid.min, vec![5.0]);
        assert_eq!(grid.max, vec![5.0]);
    }

    #[test]
    fn test_encode_writes_bracketed_record() {
        let bytes = record(&[1.0, 2.0, 3.0], Precision::Double, Endian::Big);
        assert_eq!(bytes.len(), 4 + 24 + 4);
        assert_eq!(BigEndian::read_i32(&bytes[..4]), 24);
        assert_eq!(BigEndian::read_f64(&bytes[4..12]), 1.0);
        assert_eq!(BigEndian::read_i32(&bytes[28..]), 24);
    }

    #[test]
    fn test_layout_metadata_is_applied() {
        let bytes = record(&[1.0, 2.0], Precision::Single, Endian::Little);
        let mut layout = RecordLayout::new([2, 1, 1]);
        layout.origin = [1.0, 2.0, 3.0];
        layout.pitch = [0.5, 0.5, 0.5];
        layout.step = 12;
        layout.time = 0.25;

        let grid = decode(&bytes, &layout).unwrap();
        assert_eq!(grid.origin, [1.0, 2.0, 3.0]);
        assert_eq!(grid.pitch, [0.5; 3]);
        assert_eq!(grid.step, 12);
        assert_eq!(grid.time, 0.25);
    }

    #[test]
    fn test_single_layout_metadata_survives_sph_roundtrip() {
        let bytes = record(&[0.1, 0.2], Precision::Single, Endian::Little);
        let mut layout = RecordLayout::new([2, 1, 1]);
        layout.origin = [0.1, 0.0, 0.0];
        layout.pitch = [0.3, 1.0, 1.0];
        layout.time = 0.1;

        let grid = decode(&bytes, &layout).unwrap();
        assert_eq!(grid.time, 0.1f32 as f64);
        assert_eq!(grid.origin[0], 0.1f32 as f64);

        let sph_bytes = crate::codec::sph::encode(&grid, Endian::Big).unwrap();
        assert_eq!(crate::codec::sph::decode(&sph_bytes).unwrap(), grid);
    }

    #[test]
    fn test_layout_from_json_defaults() {
        let layout: RecordLayout = serde_json::from_str(
            r#"{"dims": [4, 1, 1], "veclen": 3, "cut": [[1, 1], [0, 0], [0, 0]]}"#,
        )
        .unwrap();
        assert_eq!(layout.veclen, VecLen::Vector);
        assert_eq!(layout.precision, Precision::Single);
        assert_eq!(layout.pitch, [1.0; 3]);
        assert_eq!(layout.cut[0], (1, 1));
    }
}
