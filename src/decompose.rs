//! 共享边界的区域分割
//!
//! 把一个网格切成 dx*dy*dz 个子网格，相邻子网格沿分割轴共享一层格点，
//! 这样每个子网格单独计算一阶差分模板（梯度、旋度）时在分割面上仍然正确。
//! 例如尺寸为 5 的轴分成 2 份，得到尺寸 (3, 3)，中间的格点两边各有一份。

use serde::Serialize;

use crate::grid::Grid;

/// 单个子网格在父网格中的位置
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubBlock {
    /// 输出顺序中的序号（k 最外层，i 最内层）
    pub index: usize,
    /// 在分割格阵中的坐标 [i, j, k]
    pub position: [usize; 3],
    /// 在父网格中的起始格点
    pub offset: [usize; 3],
    pub dims: [usize; 3],
    pub origin: [f64; 3],
}

/// 分割方案：只做尺寸计算，不复制数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedEdgePlan {
    div: [usize; 3],
    block: [usize; 3],
    last_block: [usize; 3],
}

impl SharedEdgePlan {
    /// 计算每个轴的块尺寸
    ///
    /// - `block = N / D + (D != 1 ? 1 : 0)`
    /// - `last_block = N - (block - 1) * (D - 1)`
    ///
    /// 任一轴的分割数、块尺寸或末块尺寸小于 1 时返回 None。
    pub fn new(dims: [usize; 3], div: [usize; 3]) -> Option<Self> {
        let mut block = [0usize; 3];
        let mut last_block = [0usize; 3];
        for axis in 0..3 {
            let (n, d) = (dims[axis], div[axis]);
            if d < 1 {
                return None;
            }
            block[axis] = n / d + usize::from(d != 1);
            if block[axis] < 1 {
                return None;
            }
            last_block[axis] = (block[axis] - 1)
                .checked_mul(d - 1)
                .and_then(|shared| n.checked_sub(shared))
                .filter(|&last| last >= 1)?;
        }
        Some(Self {
            div,
            block,
            last_block,
        })
    }

    pub fn div(&self) -> [usize; 3] {
        self.div
    }

    pub fn block(&self) -> [usize; 3] {
        self.block
    }

    pub fn last_block(&self) -> [usize; 3] {
        self.last_block
    }

    /// 子网格总数
    pub fn len(&self) -> usize {
        self.div.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按 k、j、i 的顺序列出全部子网格
    ///
    /// 下一个子网格的起点比上一个前进 `dims - 1` 个格点，原点前进 `pitch * (dims - 1)`，
    /// 相邻子网格因此共享边界上的一层格点。
    pub fn blocks(&self, origin: [f64; 3], pitch: [f64; 3]) -> Vec<SubBlock> {
        let mut out = Vec::with_capacity(self.len());
        let mut new_origin = origin;
        let mut offset = [0usize; 3];
        let mut dims = [0usize; 3];

        for k in 0..self.div[2] {
            new_origin[1] = origin[1];
            offset[1] = 0;
            dims[2] = self.axis_len(2, k);

            for j in 0..self.div[1] {
                new_origin[0] = origin[0];
                offset[0] = 0;
                dims[1] = self.axis_len(1, j);

                for i in 0..self.div[0] {
                    dims[0] = self.axis_len(0, i);
                    out.push(SubBlock {
                        index: out.len(),
                        position: [i, j, k],
                        offset,
                        dims,
                        origin: new_origin,
                    });

                    new_origin[0] += pitch[0] * (dims[0] - 1) as f64;
                    offset[0] += dims[0] - 1;
                }

                new_origin[1] += pitch[1] * (dims[1] - 1) as f64;
                offset[1] += dims[1] - 1;
            }

            new_origin[2] += pitch[2] * (dims[2] - 1) as f64;
            offset[2] += dims[2] - 1;
        }
        out
    }

    fn axis_len(&self, axis: usize, index: usize) -> usize {
        if index == self.div[axis] - 1 {
            self.last_block[axis]
        } else {
            self.block[axis]
        }
    }
}

/// 按共享边界方式分割网格
///
/// 返回的子网格按 k、j、i 顺序排列。分割数或块尺寸无效时返回空列表，
/// 调用方应把空列表当作失败处理。
///
/// 子网格沿用父网格的 min/max，不按自身数据重新计算。
pub fn divide_share_edge(grid: &Grid, div: [usize; 3]) -> Vec<Grid> {
    if grid.validate().is_err() {
        return Vec::new();
    }
    let Some(plan) = SharedEdgePlan::new(grid.dims, div) else {
        return Vec::new();
    };

    plan.blocks(grid.origin, grid.pitch)
        .iter()
        .map(|block| extract(grid, block))
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default()
}

/// 复制子网格数据，每次复制一行 (nx 个元组)
///
/// 子网格超出父网格范围，或父网格数据长度与 dims 不符时返回 None。
pub fn extract(grid: &Grid, block: &SubBlock) -> Option<Grid> {
    grid.validate().ok()?;
    let inside = (0..3).all(|axis| {
        block.dims[axis] >= 1
            && block.offset[axis]
                .checked_add(block.dims[axis])
                .is_some_and(|end| end <= grid.dims[axis])
    });
    if !inside {
        return None;
    }

    let veclen = grid.veclen.count();
    let [nx, ny, _] = grid.dims;
    let row_len = block.dims[0] * veclen;

    let mut data = Vec::with_capacity(block.dims[0] * block.dims[1] * block.dims[2] * veclen);
    for kk in 0..block.dims[2] {
        for jj in 0..block.dims[1] {
            let src = (((kk + block.offset[2]) * ny + jj + block.offset[1]) * nx
                + block.offset[0])
                * veclen;
            data.extend_from_slice(&grid.data[src..src + row_len]);
        }
    }

    Some(Grid {
        dims: block.dims,
        origin: block.origin,
        pitch: grid.pitch,
        veclen: grid.veclen,
        precision: grid.precision,
        step: grid.step,
        time: grid.time,
        min: grid.min.clone(),
        max: grid.max.clone(),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Precision, VecLen};

    fn ramp(dims: [usize; 3], veclen: VecLen) -> Grid {
        let n = dims[0] * dims[1] * dims[2] * veclen.count();
        Grid::new(dims, veclen, Precision::Double, (0..n).map(|v| v as f64).collect())
            .unwrap()
            .with_origin([10.0, 20.0, 30.0])
            .with_pitch([0.5, 1.0, 2.0])
            .with_time(3, 0.25)
    }

    #[test]
    fn test_five_points_in_two_share_middle() {
        let grid = ramp([5, 1, 1], VecLen::Scalar);
        let parts = divide_share_edge(&grid, [2, 1, 1]);

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].dims, [3, 1, 1]);
        assert_eq!(parts[1].dims, [3, 1, 1]);
        assert_eq!(parts[0].data, vec![0.0, 1.0, 2.0]);
        assert_eq!(parts[1].data, vec![2.0, 3.0, 4.0]);
        assert_eq!(parts[0].data.last(), parts[1].data.first());
        assert_eq!(parts[1].origin, [11.0, 20.0, 30.0]);
    }

    #[test]
    fn test_invalid_division_is_empty() {
        let grid = ramp([5, 1, 1], VecLen::Scalar);
        assert!(divide_share_edge(&grid, [0, 1, 1]).is_empty());
        assert!(divide_share_edge(&grid, [1, 1, 0]).is_empty());
        assert!(SharedEdgePlan::new([5, 1, 1], [2, 0, 1]).is_none());
    }

    #[test]
    fn test_single_point_split_in_two_is_accepted() {
        let plan = SharedEdgePlan::new([1, 1, 1], [2, 1, 1]).unwrap();
        assert_eq!(plan.block(), [1, 1, 1]);
        assert_eq!(plan.last_block(), [1, 1, 1]);

        let grid = ramp([1, 1, 1], VecLen::Scalar);
        let parts = divide_share_edge(&grid, [2, 1, 1]);
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.data == vec![0.0]));
    }

    #[test]
    fn test_over_partition_follows_block_formula() {
        // block = 2/3 + 1 = 1，last = 2 - 0 * 2 = 2
        let plan = SharedEdgePlan::new([2, 1, 1], [3, 1, 1]).unwrap();
        let dims: Vec<usize> = plan.blocks([0.0; 3], [1.0; 3]).iter().map(|b| b.dims[0]).collect();
        assert_eq!(dims, vec![1, 1, 2]);

        let parts = divide_share_edge(&ramp([2, 1, 1], VecLen::Scalar), [3, 1, 1]);
        assert_eq!(parts[2].data, vec![0.0, 1.0]);
    }

    #[test]
    fn test_lattice_order_and_coverage() {
        let grid = ramp([5, 4, 3], VecLen::Scalar);
        let plan = SharedEdgePlan::new(grid.dims, [2, 2, 1]).unwrap();
        assert_eq!(plan.block(), [3, 3, 3]);
        assert_eq!(plan.last_block(), [3, 2, 3]);

        let parts = divide_share_edge(&grid, [2, 2, 1]);
        assert_eq!(parts.len(), 4);

        let blocks = plan.blocks(grid.origin, grid.pitch);
        let positions: Vec<[usize; 3]> = blocks.iter().map(|b| b.position).collect();
        assert_eq!(positions, vec![[0, 0, 0], [1, 0, 0], [0, 1, 0], [1, 1, 0]]);
        assert_eq!(blocks[3].offset, [2, 2, 0]);
        assert_eq!(blocks[3].origin, [11.0, 22.0, 30.0]);

        for (part, block) in parts.iter().zip(&blocks) {
            assert_eq!(part.dims, block.dims);
            for k in 0..part.dims[2] {
                for j in 0..part.dims[1] {
                    for i in 0..part.dims[0] {
                        let expected = grid.value(
                            i + block.offset[0],
                            j + block.offset[1],
                            k + block.offset[2],
                            0,
                        );
                        assert_eq!(part.value(i, j, k, 0), expected);
                    }
                }
            }
        }
    }

    #[test]
    fn test_vector_rows_copied_whole() {
        let grid = ramp([3, 3, 1], VecLen::Vector);
        let parts = divide_share_edge(&grid, [1, 2, 1]);

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].dims, [3, 2, 1]);
        assert_eq!(parts[1].dims, [3, 2, 1]);
        assert_eq!(&parts[0].data[9..18], &grid.data[9..18]);
        assert_eq!(&parts[1].data[..9], &grid.data[9..18]);
    }

    #[test]
    fn test_children_keep_parent_range_and_metadata() {
        let grid = ramp([5, 1, 1], VecLen::Scalar);
        let parts = divide_share_edge(&grid, [2, 1, 1]);

        for part in &parts {
            assert_eq!(part.min, vec![0.0]);
            assert_eq!(part.max, vec![4.0]);
            assert_eq!(part.pitch, grid.pitch);
            assert_eq!(part.step, 3);
            assert_eq!(part.time, 0.25);
            assert_eq!(part.precision, Precision::Double);
        }
    }

    #[test]
    fn test_extract_rejects_block_outside_parent() {
        let grid = ramp([5, 4, 1], VecLen::Scalar);
        let plan = SharedEdgePlan::new(grid.dims, [2, 2, 1]).unwrap();
        let mut block = plan.blocks(grid.origin, grid.pitch)[3];
        assert!(extract(&grid, &block).is_some());

        block.offset[0] = 3;
        assert!(extract(&grid, &block).is_none());

        block.offset[0] = 0;
        block.dims[1] = 5;
        assert!(extract(&grid, &block).is_none());

        block.dims = [0, 1, 1];
        assert!(extract(&grid, &block).is_none());
    }

    #[test]
    fn test_inconsistent_parent_is_empty() {
        let mut grid = ramp([5, 1, 1], VecLen::Scalar);
        grid.data.truncate(3);
        assert!(divide_share_edge(&grid, [2, 1, 1]).is_empty());
    }
}
