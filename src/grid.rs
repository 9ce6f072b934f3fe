use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};

/// 浮点精度，同时决定 .sph 文件中记录的字段宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 4 字节 float
    Single,
    /// 8 字节 double
    Double,
}

impl Precision {
    /// 舍入到该精度可精确表示的值
    pub fn round(self, v: f64) -> f64 {
        match self {
            Precision::Single => v as f32 as f64,
            Precision::Double => v,
        }
    }

    /// 文件头中的 dType 编码
    pub fn code(self) -> i32 {
        match self {
            Precision::Single => 1,
            Precision::Double => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Precision::Single),
            2 => Some(Precision::Double),
            _ => None,
        }
    }

    /// 单个采样值占用的字节数
    pub fn word_size(self) -> usize {
        match self {
            Precision::Single => 4,
            Precision::Double => 8,
        }
    }
}

/// 每个格点的分量数：标量为 1，矢量为 3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum VecLen {
    Scalar,
    Vector,
}

impl VecLen {
    pub fn count(self) -> usize {
        match self {
            VecLen::Scalar => 1,
            VecLen::Vector => 3,
        }
    }

    /// 文件头中的 svType 编码
    pub fn sv_type(self) -> i32 {
        match self {
            VecLen::Scalar => 1,
            VecLen::Vector => 2,
        }
    }

    pub fn from_sv_type(sv_type: i32) -> Option<Self> {
        match sv_type {
            1 => Some(VecLen::Scalar),
            2 => Some(VecLen::Vector),
            _ => None,
        }
    }
}

impl TryFrom<usize> for VecLen {
    type Error = String;

    fn try_from(value: usize) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(VecLen::Scalar),
            3 => Ok(VecLen::Vector),
            other => Err(format!("veclen 只能是 1 或 3，但得到 {}", other)),
        }
    }
}

impl From<VecLen> for usize {
    fn from(value: VecLen) -> Self {
        value.count()
    }
}

/// 网格元数据（不含采样数据），用于只读取文件头的场景
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridHeader {
    pub dims: [usize; 3],
    pub veclen: VecLen,
    pub precision: Precision,
    pub origin: [f64; 3],
    pub pitch: [f64; 3],
    pub step: i64,
    pub time: f64,
}

impl GridHeader {
    /// 采样值总数 nx*ny*nz*veclen，溢出时返回 None
    pub fn element_count(&self) -> Option<usize> {
        element_count(self.dims, self.veclen)
    }
}

/// SPH 网格：规则三维网格上某一时间步的标量场或矢量场
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    /// 网格维度 [nx, ny, nz]
    pub dims: [usize; 3],
    /// 格点 (0,0,0) 的世界坐标
    pub origin: [f64; 3],
    /// 各轴相邻格点间距
    pub pitch: [f64; 3],
    pub veclen: VecLen,
    pub precision: Precision,
    pub step: i64,
    pub time: f64,
    /// 各分量最小值，长度等于 veclen
    pub min: Vec<f64>,
    /// 各分量最大值，长度等于 veclen
    pub max: Vec<f64>,
    /// 采样数据，x 变化最快，其次 y、z，分量在最内层
    /// 索引计算: index = ((k * ny + j) * nx + i) * veclen + c
    pub data: Vec<f64>,
}

impl Grid {
    /// 创建新的网格，origin 为 0，pitch 为 1，并计算 min/max
    pub fn new(
        dims: [usize; 3],
        veclen: VecLen,
        precision: Precision,
        data: Vec<f64>,
    ) -> Result<Self> {
        check_dims(dims)?;
        let expected = element_count(dims, veclen)
            .ok_or_else(|| GridError::consistency(format!("dims {:?} 元素数溢出", dims)))?;
        if data.len() != expected {
            return Err(GridError::consistency(format!(
                "数据量不匹配: dims {:?} veclen {} 需要 {} 个元素，但提供了 {} 个",
                dims,
                veclen.count(),
                expected,
                data.len()
            )));
        }

        let header = GridHeader {
            dims,
            veclen,
            precision,
            origin: [0.0; 3],
            pitch: [1.0; 3],
            step: 0,
            time: 0.0,
        };
        Ok(Self::from_parts(header, data))
    }

    /// 由 1~3 维数组构造标量网格
    ///
    /// `shape` 按最慢轴在前给出（例如 [nz, ny, nx]），维度不足 3 时其余轴补 1。
    pub fn from_shape_vec(shape: &[usize], data: Vec<f64>, precision: Precision) -> Result<Self> {
        if shape.is_empty() || shape.len() > 3 {
            return Err(GridError::consistency(format!(
                "shape 应包含 1~3 个维度，但得到 {} 个",
                shape.len()
            )));
        }

        let mut dims = [1usize; 3];
        for (axis, &n) in shape.iter().rev().enumerate() {
            dims[axis] = n;
        }
        Self::new(dims, VecLen::Scalar, precision, data)
    }

    /// 由已校验过的元数据和数据构造网格，min/max 按数据重新计算
    ///
    /// 单精度网格的数据、坐标和时间会先舍入到 f32。
    pub(crate) fn from_parts(header: GridHeader, data: Vec<f64>) -> Self {
        let mut grid = Grid {
            dims: header.dims,
            origin: header.origin,
            pitch: header.pitch,
            veclen: header.veclen,
            precision: header.precision,
            step: header.step,
            time: header.time,
            min: Vec::new(),
            max: Vec::new(),
            data,
        };
        if grid.precision == Precision::Single {
            grid.narrow_to_single();
        }
        grid.refresh_range();
        grid
    }

    pub fn with_origin(mut self, origin: [f64; 3]) -> Self {
        self.origin = origin.map(|v| self.precision.round(v));
        self
    }

    pub fn with_pitch(mut self, pitch: [f64; 3]) -> Self {
        self.pitch = pitch.map(|v| self.precision.round(v));
        self
    }

    pub fn with_time(mut self, step: i64, time: f64) -> Self {
        self.step = step;
        self.time = self.precision.round(time);
        self
    }

    /// 获取元数据副本
    pub fn header(&self) -> GridHeader {
        GridHeader {
            dims: self.dims,
            veclen: self.veclen,
            precision: self.precision,
            origin: self.origin,
            pitch: self.pitch,
            step: self.step,
            time: self.time,
        }
    }

    /// 格点数 nx*ny*nz
    pub fn point_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize, c: usize) -> usize {
        debug_assert!(i < self.dims[0] && j < self.dims[1] && k < self.dims[2]);
        debug_assert!(c < self.veclen.count());
        ((k * self.dims[1] + j) * self.dims[0] + i) * self.veclen.count() + c
    }

    #[inline]
    pub fn value(&self, i: usize, j: usize, k: usize, c: usize) -> f64 {
        self.data[self.index(i, j, k, c)]
    }

    /// 检查维度与数据长度是否一致，编码前调用
    pub fn validate(&self) -> Result<()> {
        check_dims(self.dims)?;
        match element_count(self.dims, self.veclen) {
            Some(expected) if expected == self.data.len() => Ok(()),
            Some(expected) => Err(GridError::consistency(format!(
                "数据长度 {} 与 dims {:?} x veclen {} = {} 不一致",
                self.data.len(),
                self.dims,
                self.veclen.count(),
                expected
            ))),
            None => Err(GridError::consistency(format!(
                "dims {:?} 元素数溢出",
                self.dims
            ))),
        }
    }

    /// 按当前数据重新计算 min/max
    pub fn refresh_range(&mut self) {
        let (min, max) = scan_range(&self.data, self.veclen);
        self.min = min;
        self.max = max;
    }

    /// 切换精度。降为单精度时数据、坐标和时间都会舍入到 f32
    pub fn set_precision(&mut self, precision: Precision) {
        self.precision = precision;
        if precision == Precision::Single {
            self.narrow_to_single();
        }
        self.refresh_range();
    }

    fn narrow_to_single(&mut self) {
        let round = |v: f64| Precision::Single.round(v);
        self.data.iter_mut().for_each(|v| *v = round(*v));
        self.origin = self.origin.map(round);
        self.pitch = self.pitch.map(round);
        self.time = round(self.time);
    }
}

/// 采样值总数 nx*ny*nz*veclen，溢出时返回 None
pub fn element_count(dims: [usize; 3], veclen: VecLen) -> Option<usize> {
    dims[0]
        .checked_mul(dims[1])?
        .checked_mul(dims[2])?
        .checked_mul(veclen.count())
}

fn check_dims(dims: [usize; 3]) -> Result<()> {
    if dims.iter().any(|&n| n < 1) {
        return Err(GridError::consistency(format!(
            "dims {:?} 的每个维度都必须 >= 1",
            dims
        )));
    }
    Ok(())
}

/// 逐分量计算 min/max
///
/// 第一个元组作为初值；之后每个值先与 min 比较，只有不小于 min 时才与 max 比较。
/// 与 min 相等的值不会触发 max 的比较。
pub fn scan_range(data: &[f64], veclen: VecLen) -> (Vec<f64>, Vec<f64>) {
    let n = veclen.count();
    let mut min = vec![0.0; n];
    let mut max = vec![0.0; n];

    let mut tuples = data.chunks_exact(n);
    let Some(first) = tuples.next() else {
        return (min, max);
    };
    min.copy_from_slice(first);
    max.copy_from_slice(first);

    for tuple in tuples {
        for (c, &v) in tuple.iter().enumerate() {
            if v < min[c] {
                min[c] = v;
            } else if v > max[c] {
                max[c] = v;
            }
        }
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_length_mismatch() {
        let err = Grid::new([2, 2, 1], VecLen::Scalar, Precision::Single, vec![0.0; 3]);
        assert!(matches!(err, Err(GridError::Consistency { .. })));
    }

    #[test]
    fn test_new_rejects_zero_dims() {
        let err = Grid::new([0, 2, 1], VecLen::Scalar, Precision::Single, vec![]);
        assert!(matches!(err, Err(GridError::Consistency { .. })));
    }

    #[test]
    fn test_index_is_x_fastest_component_innermost() {
        let data: Vec<f64> = (0..2 * 3 * 4 * 3).map(|v| v as f64).collect();
        let grid = Grid::new([2, 3, 4], VecLen::Vector, Precision::Double, data).unwrap();

        assert_eq!(grid.index(0, 0, 0, 0), 0);
        assert_eq!(grid.index(1, 0, 0, 0), 3);
        assert_eq!(grid.index(0, 1, 0, 0), 6);
        assert_eq!(grid.index(0, 0, 1, 2), 2 * 3 * 3 + 2);
        assert_eq!(grid.value(1, 2, 3, 1), grid.data[((3 * 3 + 2) * 2 + 1) * 3 + 1]);
    }

    #[test]
    fn test_range_per_component() {
        let data = vec![1.0, 10.0, -1.0, 4.0, 2.0, -3.0, -2.0, 20.0, 0.0];
        let grid = Grid::new([3, 1, 1], VecLen::Vector, Precision::Double, data).unwrap();

        assert_eq!(grid.min, vec![-2.0, 2.0, -3.0]);
        assert_eq!(grid.max, vec![4.0, 20.0, 0.0]);
    }

    #[test]
    fn test_range_tie_with_min_leaves_range_untouched() {
        let (min, max) = scan_range(&[5.0, 5.0], VecLen::Scalar);
        assert_eq!(min, vec![5.0]);
        assert_eq!(max, vec![5.0]);

        // 先下降再回升：回升值只在不小于 min 时才与 max 比较
        let (min, max) = scan_range(&[3.0, 1.0, 4.0, 1.0], VecLen::Scalar);
        assert_eq!(min, vec![1.0]);
        assert_eq!(max, vec![4.0]);
    }

    #[test]
    fn test_from_shape_vec_reverses_shape() {
        let grid =
            Grid::from_shape_vec(&[2, 3], (0..6).map(|v| v as f64).collect(), Precision::Double)
                .unwrap();

        assert_eq!(grid.dims, [3, 2, 1]);
        assert_eq!(grid.pitch, [1.0; 3]);
        assert_eq!(grid.veclen, VecLen::Scalar);
        assert_eq!(grid.min, vec![0.0]);
        assert_eq!(grid.max, vec![5.0]);

        assert!(Grid::from_shape_vec(&[], vec![], Precision::Double).is_err());
        assert!(Grid::from_shape_vec(&[1, 1, 1, 1], vec![0.0], Precision::Double).is_err());
    }

    #[test]
    fn test_set_precision_rounds_to_single() {
        let mut grid = Grid::new([2, 1, 1], VecLen::Scalar, Precision::Double, vec![0.1, 0.2])
            .unwrap()
            .with_origin([0.1, 0.0, 0.0])
            .with_time(3, 0.3);

        grid.set_precision(Precision::Single);

        assert_eq!(grid.precision, Precision::Single);
        assert_eq!(grid.data, vec![0.1f32 as f64, 0.2f32 as f64]);
        assert_eq!(grid.origin[0], 0.1f32 as f64);
        assert_eq!(grid.time, 0.3f32 as f64);
        assert_eq!(grid.max, vec![0.2f32 as f64]);
    }

    #[test]
    fn test_single_precision_values_are_rounded_on_construction() {
        let grid = Grid::new([2, 1, 1], VecLen::Scalar, Precision::Single, vec![0.1, 0.2])
            .unwrap()
            .with_origin([0.1, 0.0, 0.0])
            .with_pitch([0.3, 1.0, 1.0])
            .with_time(7, 0.7);

        assert_eq!(grid.data, vec![0.1f32 as f64, 0.2f32 as f64]);
        assert_eq!(grid.min, vec![0.1f32 as f64]);
        assert_eq!(grid.max, vec![0.2f32 as f64]);
        assert_eq!(grid.origin, [0.1f32 as f64, 0.0, 0.0]);
        assert_eq!(grid.pitch[0], 0.3f32 as f64);
        assert_eq!(grid.time, 0.7f32 as f64);

        let double = Grid::new([1, 1, 1], VecLen::Scalar, Precision::Double, vec![0.1])
            .unwrap()
            .with_origin([0.1, 0.0, 0.0]);
        assert_eq!(double.data, vec![0.1]);
        assert_eq!(double.origin[0], 0.1);
    }

    #[test]
    fn test_veclen_serde() {
        assert_eq!(serde_json::to_string(&VecLen::Vector).unwrap(), "3");
        let v: VecLen = serde_json::from_str("1").unwrap();
        assert_eq!(v, VecLen::Scalar);
        assert!(serde_json::from_str::<VecLen>("2").is_err());
    }

    #[test]
    fn test_validate_detects_mutated_data() {
        let mut grid = Grid::new([2, 1, 1], VecLen::Scalar, Precision::Single, vec![1.0, 2.0])
            .unwrap();
        assert!(grid.validate().is_ok());

        grid.data.push(3.0);
        assert!(matches!(grid.validate(), Err(GridError::Consistency { .. })));
    }
}
