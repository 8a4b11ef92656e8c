// crates/kf_fvm/src/grid/momentum.rs

//! 动量子网格
//!
//! 每个半径拥有一个 `n1 × n2` 的结构化动量网格。
//! 单元扁平索引为 `j * n1 + i`，方向 1 的面索引为 `j * (n1 + 1) + i`，
//! 方向 2 的面索引为 `j * n1 + i`（j 取 `0..=n2`）。

use super::radial::derive_cells;
use kf_foundation::{ensure, KfError, KfResult};

/// 二维结构化动量网格
#[derive(Debug, Clone, PartialEq)]
pub struct MomentumGrid {
    p1: Vec<f64>,
    p1_f: Vec<f64>,
    dp1: Vec<f64>,
    dp1_f: Vec<f64>,
    p2: Vec<f64>,
    p2_f: Vec<f64>,
    dp2: Vec<f64>,
    dp2_f: Vec<f64>,
}

impl MomentumGrid {
    /// 均匀网格
    pub fn uniform(n1: usize, p1: (f64, f64), n2: usize, p2: (f64, f64)) -> KfResult<Self> {
        ensure!(
            n1 > 0 && n2 > 0,
            KfError::allocation("MomentumGrid", format!("网格尺寸 {}x{} 退化", n1, n2))
        );
        Self::from_faces(linspace(p1.0, p1.1, n1), linspace(p2.0, p2.1, n2))
    }

    /// 由两个方向的面坐标构建
    pub fn from_faces(p1_f: Vec<f64>, p2_f: Vec<f64>) -> KfResult<Self> {
        ensure!(
            p1_f.len() >= 2 && p2_f.len() >= 2,
            KfError::allocation("MomentumGrid", "每个方向至少需要一个单元")
        );
        let (p1, dp1, dp1_f) = derive_cells("dp1", &p1_f)?;
        let (p2, dp2, dp2_f) = derive_cells("dp2", &p2_f)?;
        Ok(Self {
            p1,
            p1_f,
            dp1,
            dp1_f,
            p2,
            p2_f,
            dp2,
            dp2_f,
        })
    }

    /// 方向 1 单元数
    #[inline]
    pub fn n1(&self) -> usize {
        self.p1.len()
    }

    /// 方向 2 单元数
    #[inline]
    pub fn n2(&self) -> usize {
        self.p2.len()
    }

    /// 单元总数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n1() * self.n2()
    }

    /// 单元扁平索引
    #[inline]
    pub fn index(&self, i: usize, j: usize) -> usize {
        j * self.n1() + i
    }

    /// 尺寸是否与另一网格相同
    pub fn same_shape(&self, other: &MomentumGrid) -> bool {
        self.n1() == other.n1() && self.n2() == other.n2()
    }

    /// 方向 1 单元中心
    #[inline]
    pub fn p1(&self) -> &[f64] {
        &self.p1
    }
    /// 方向 1 面坐标
    #[inline]
    pub fn p1_f(&self) -> &[f64] {
        &self.p1_f
    }
    /// 方向 1 单元宽度
    #[inline]
    pub fn dp1(&self) -> &[f64] {
        &self.dp1
    }
    /// 方向 1 中心间距
    #[inline]
    pub fn dp1_f(&self) -> &[f64] {
        &self.dp1_f
    }
    /// 方向 2 单元中心
    #[inline]
    pub fn p2(&self) -> &[f64] {
        &self.p2
    }
    /// 方向 2 面坐标
    #[inline]
    pub fn p2_f(&self) -> &[f64] {
        &self.p2_f
    }
    /// 方向 2 单元宽度
    #[inline]
    pub fn dp2(&self) -> &[f64] {
        &self.dp2
    }
    /// 方向 2 中心间距
    #[inline]
    pub fn dp2_f(&self) -> &[f64] {
        &self.dp2_f
    }
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let h = (hi - lo) / n as f64;
    let mut faces: Vec<f64> = (0..=n).map(|k| lo + h * k as f64).collect();
    // 末端面精确等于上界
    faces[n] = hi;
    faces
}
