//! 原生 .sph 网格文件的读写
//!
//! 文件由若干 FORTRAN 风格的记录组成（每条记录前后各有一个 int32 长度标记）。
//! 尺寸、原点、间距、时间记录的字段宽度随精度变化：
//!
//! ```text
//! 记录      单精度                               双精度
//! Header    4×int32: len, svType, dType, len     同左
//! Size      int32(12), 3×int32, int32(12)        int32(24), 3×int64, int32(24)
//! Origin    int32(12), 3×float32, int32(12)      int32(24), 3×float64, int32(24)
//! Pitch     同 Origin                            同 Origin
//! Time      int32(8), int32 step, float32, (8)   int32(16), int64 step, float64, (16)
//! Payload   int32 字节数, 采样值, int32 字节数    同左，8 字节步长
//! ```
//!
//! 读取时先按小端解析文件头，svType 无效时改用大端；之后所有字段沿用该字节序。
//! 写出时所有字段（包括文件头）使用调用方指定的同一字节序。

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{Endian, payload_marker, read_samples, write_samples};
use crate::error::{GridError, Result};
use crate::grid::{Grid, GridHeader, Precision, VecLen};

/// 文件头记录的字节数
pub const HEADER_BYTES: usize = 16;

/// 文件头记录的长度标记值
const HEADER_MARKER: i32 = 8;

/// 从字节数组解码网格
pub fn decode(bytes: &[u8]) -> Result<Grid> {
    let mut reader = bytes;
    read_grid(&mut reader)
}

/// 从 reader 读取完整网格（元数据 + 采样数据）
pub fn read_grid<R: Read>(r: &mut R) -> Result<Grid> {
    let (header, endian) = read_header(r)?;
    let count = header
        .element_count()
        .ok_or_else(|| GridError::format(format!("dims {:?} 元素数溢出", header.dims)))?;

    let data = match endian {
        Endian::Little => read_samples::<LittleEndian, _>(r, header.precision, count)?,
        Endian::Big => read_samples::<BigEndian, _>(r, header.precision, count)?,
    };
    Ok(Grid::from_parts(header, data))
}

/// 只读取元数据记录，返回元数据和检测到的字节序
///
/// 读取结束时 reader 停在第一个采样值处。
pub fn read_header<R: Read>(r: &mut R) -> Result<(GridHeader, Endian)> {
    let mut head = [0u8; HEADER_BYTES];
    r.read_exact(&mut head)
        .map_err(GridError::reading("header"))?;

    let endian = detect_endian(&head)?;
    let veclen = VecLen::from_sv_type(endian.read_i32(&word(&head, 1)))
        .ok_or_else(|| GridError::format("svType 无效"))?;
    let d_type = endian.read_i32(&word(&head, 2));
    let precision = Precision::from_code(d_type)
        .ok_or_else(|| GridError::format(format!("dType {} 无效，应为 1 或 2", d_type)))?;

    let header = match endian {
        Endian::Little => read_records::<LittleEndian, _>(r, veclen, precision)?,
        Endian::Big => read_records::<BigEndian, _>(r, veclen, precision)?,
    };
    Ok((header, endian))
}

/// 只读取文件的元数据
pub fn read_header_file(path: impl AsRef<Path>) -> Result<(GridHeader, Endian)> {
    let file = File::open(path)?;
    read_header(&mut BufReader::new(file))
}

/// 从 .sph 文件加载网格
pub fn load_file(path: impl AsRef<Path>) -> Result<Grid> {
    let file = File::open(path)?;
    read_grid(&mut BufReader::new(file))
}

/// 按网格自身精度编码
pub fn encode(grid: &Grid, endian: Endian) -> Result<Vec<u8>> {
    encode_as(grid, grid.precision, endian)
}

/// 按指定精度编码，不修改网格本身
pub fn encode_as(grid: &Grid, precision: Precision, endian: Endian) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(encoded_len(grid, precision));
    write_grid_as(grid, precision, endian, &mut buf)?;
    Ok(buf)
}

pub fn write_grid<W: Write>(grid: &Grid, endian: Endian, w: &mut W) -> Result<()> {
    write_grid_as(grid, grid.precision, endian, w)
}

/// 按指定精度和字节序写出网格
///
/// 所有一致性检查都在写出第一个字节之前完成。
pub fn write_grid_as<W: Write>(
    grid: &Grid,
    precision: Precision,
    endian: Endian,
    w: &mut W,
) -> Result<()> {
    grid.validate()?;
    let marker = payload_marker(grid.data.len(), precision)?;
    let dims = record_ints(grid, precision)?;

    match endian {
        Endian::Little => write_body::<LittleEndian, _>(grid, precision, dims, marker, w),
        Endian::Big => write_body::<BigEndian, _>(grid, precision, dims, marker, w),
    }
}

/// 保存为 .sph 文件
pub fn save_file(grid: &Grid, path: impl AsRef<Path>, endian: Endian) -> Result<()> {
    save_file_as(grid, path, grid.precision, endian)
}

pub fn save_file_as(
    grid: &Grid,
    path: impl AsRef<Path>,
    precision: Precision,
    endian: Endian,
) -> Result<()> {
    // 先检查再创建文件，避免留下不完整的文件
    grid.validate()?;
    payload_marker(grid.data.len(), precision)?;
    record_ints(grid, precision)?;

    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    write_grid_as(grid, precision, endian, &mut w)?;
    w.flush()?;
    Ok(())
}

/// 编码后的总字节数
pub fn encoded_len(grid: &Grid, precision: Precision) -> usize {
    let ws = precision.word_size();
    let records = HEADER_BYTES + 3 * (8 + 3 * ws) + (8 + 2 * ws);
    records + 8 + grid.data.len() * ws
}

fn word(head: &[u8; HEADER_BYTES], n: usize) -> [u8; 4] {
    let mut w = [0u8; 4];
    w.copy_from_slice(&head[n * 4..n * 4 + 4]);
    w
}

fn detect_endian(head: &[u8; HEADER_BYTES]) -> Result<Endian> {
    let sv_type = word(head, 1);
    [Endian::Little, Endian::Big]
        .into_iter()
        .find(|e| VecLen::from_sv_type(e.read_i32(&sv_type)).is_some())
        .ok_or_else(|| GridError::format("无法识别文件头: svType 在两种字节序下都无效"))
}

fn read_marker<B: ByteOrder, R: Read>(r: &mut R, record: &'static str) -> Result<i32> {
    r.read_i32::<B>().map_err(GridError::reading(record))
}

fn read_int<B: ByteOrder, R: Read>(
    r: &mut R,
    precision: Precision,
    record: &'static str,
) -> Result<i64> {
    match precision {
        Precision::Single => r.read_i32::<B>().map(i64::from),
        Precision::Double => r.read_i64::<B>(),
    }
    .map_err(GridError::reading(record))
}

fn read_real<B: ByteOrder, R: Read>(
    r: &mut R,
    precision: Precision,
    record: &'static str,
) -> Result<f64> {
    match precision {
        Precision::Single => r.read_f32::<B>().map(f64::from),
        Precision::Double => r.read_f64::<B>(),
    }
    .map_err(GridError::reading(record))
}

fn read_vec3<B: ByteOrder, R: Read>(
    r: &mut R,
    precision: Precision,
    record: &'static str,
) -> Result<[f64; 3]> {
    read_marker::<B, _>(r, record)?;
    let mut v = [0.0; 3];
    for x in v.iter_mut() {
        *x = read_real::<B, _>(r, precision, record)?;
    }
    read_marker::<B, _>(r, record)?;
    Ok(v)
}

/// 读取 size/origin/pitch/time 记录以及数据记录前的字节数字段
fn read_records<B: ByteOrder, R: Read>(
    r: &mut R,
    veclen: VecLen,
    precision: Precision,
) -> Result<GridHeader> {
    read_marker::<B, _>(r, "size")?;
    let mut raw_dims = [0i64; 3];
    for n in raw_dims.iter_mut() {
        *n = read_int::<B, _>(r, precision, "size")?;
    }
    read_marker::<B, _>(r, "size")?;

    let origin = read_vec3::<B, _>(r, precision, "origin")?;
    let pitch = read_vec3::<B, _>(r, precision, "pitch")?;

    read_marker::<B, _>(r, "time")?;
    let step = read_int::<B, _>(r, precision, "time")?;
    let time = read_real::<B, _>(r, precision, "time")?;
    read_marker::<B, _>(r, "time")?;

    // 数据记录的前置字节数，读取时不使用
    read_marker::<B, _>(r, "data size")?;

    let mut dims = [0usize; 3];
    for (d, &n) in dims.iter_mut().zip(raw_dims.iter()) {
        *d = usize::try_from(n)
            .ok()
            .filter(|&n| n >= 1)
            .ok_or_else(|| GridError::format(format!("网格维度 {:?} 无效", raw_dims)))?;
    }

    Ok(GridHeader {
        dims,
        veclen,
        precision,
        origin,
        pitch,
        step,
        time,
    })
}

/// 检查 dims 和 step 能否放进该精度记录的整数字段
fn record_ints(grid: &Grid, precision: Precision) -> Result<[i64; 3]> {
    let fits = |v: i64| match precision {
        Precision::Single => i32::try_from(v).is_ok(),
        Precision::Double => true,
    };

    let mut dims = [0i64; 3];
    for (d, &n) in dims.iter_mut().zip(grid.dims.iter()) {
        *d = i64::try_from(n)
            .ok()
            .filter(|&v| fits(v))
            .ok_or_else(|| {
                GridError::consistency(format!("维度 {} 超出记录整数范围", n))
            })?;
    }
    if !fits(grid.step) {
        return Err(GridError::consistency(format!(
            "step {} 超出单精度记录的 32 位整数范围",
            grid.step
        )));
    }
    Ok(dims)
}

fn write_int<B: ByteOrder, W: Write>(w: &mut W, precision: Precision, v: i64) -> Result<()> {
    match precision {
        // record_ints 已保证取值范围
        Precision::Single => w.write_i32::<B>(v as i32)?,
        Precision::Double => w.write_i64::<B>(v)?,
    }
    Ok(())
}

fn write_real<B: ByteOrder, W: Write>(w: &mut W, precision: Precision, v: f64) -> Result<()> {
    match precision {
        Precision::Single => w.write_f32::<B>(v as f32)?,
        Precision::Double => w.write_f64::<B>(v)?,
    }
    Ok(())
}

fn write_vec3<B: ByteOrder, W: Write>(w: &mut W, precision: Precision, v: [f64; 3]) -> Result<()> {
    let len = 3 * precision.word_size() as i32;
    w.write_i32::<B>(len)?;
    for x in v {
        write_real::<B, _>(w, precision, x)?;
    }
    w.write_i32::<B>(len)?;
    Ok(())
}

fn write_body<B: ByteOrder, W: Write>(
    grid: &Grid,
    precision: Precision,
    dims: [i64; 3],
    marker: i32,
    w: &mut W,
) -> Result<()> {
    let ws = precision.word_size() as i32;

    w.write_i32::<B>(HEADER_MARKER)?;
    w.write_i32::<B>(grid.veclen.sv_type())?;
    w.write_i32::<B>(precision.code())?;
    w.write_i32::<B>(HEADER_MARKER)?;

    w.write_i32::<B>(3 * ws)?;
    for n in dims {
        write_int::<B, _>(w, precision, n)?;
    }
    w.write_i32::<B>(3 * ws)?;

    write_vec3::<B, _>(w, precision, grid.origin)?;
    write_vec3::<B, _>(w, precision, grid.pitch)?;

    w.write_i32::<B>(2 * ws)?;
    write_int::<B, _>(w, precision, grid.step)?;
    write_real::<B, _>(w, precision, grid.time)?;
    w.write_i32::<B>(2 * ws)?;

    w.write_i32::<B>(marker)?;
    write_samples::<B, _>(w, precision, &grid.data)?;
    w.write_i32::<B>(marker)?;
    Ok(())
}
