// crates/kf_fvm/src/boundary/deposition.rs

//! 沿径向路径的时间平均沉积
//!
//! 源在一个时间步内从 `r_previous` 移动到 `r_next`，沉积量按路径与各径向单元的
//! 重叠长度分配。路径经过最近点（径向坐标的变化方向反号）时，
//! 在最近点处拆成两段分别扫描。
//!
//! 权重按 `Σ w·VpVol·dr = 1` 归一化（路径完全位于网格内时）。

use super::overlap::overlap_width;
use crate::grid::Grid;
use kf_foundation::{KfError, KfResult};
use serde::{Deserialize, Serialize};

/// 一个时间步内的径向路径
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepositionPath {
    /// 步初位置
    pub r_previous: f64,
    /// 步末位置
    pub r_next: f64,
    /// 步内经过的最近点（若经过）
    pub closest_approach: Option<f64>,
}

impl DepositionPath {
    /// 不经过最近点的直线路径
    pub fn straight(r_previous: f64, r_next: f64) -> Self {
        Self {
            r_previous,
            r_next,
            closest_approach: None,
        }
    }

    /// 在 `r_closest` 处折返的路径
    pub fn turning(r_previous: f64, r_closest: f64, r_next: f64) -> Self {
        Self {
            r_previous,
            r_next,
            closest_approach: Some(r_closest),
        }
    }

    /// 按 `[min, max]` 给出的各段
    fn segments(&self) -> Vec<(f64, f64)> {
        let ordered = |a: f64, b: f64| (a.min(b), a.max(b));
        match self.closest_approach {
            Some(rc) => vec![ordered(self.r_previous, rc), ordered(rc, self.r_next)],
            None => vec![ordered(self.r_previous, self.r_next)],
        }
    }

    /// 路径总长度
    pub fn length(&self) -> f64 {
        self.segments().iter().map(|(a, b)| b - a).sum()
    }
}

/// 位移在步初与步末径向梯度上的投影反号时，路径经过了最近点
pub fn detect_turning_point(grad_previous: [f64; 3], grad_next: [f64; 3], displacement: [f64; 3]) -> bool {
    let dot = |g: [f64; 3]| g[0] * displacement[0] + g[1] * displacement[1] + g[2] * displacement[2];
    dot(grad_next) * dot(grad_previous) < 0.0
}

/// 每个半径的沉积密度（单位时间步内沉积量为 1）
pub fn box_deposition(grid: &Grid, path: &DepositionPath) -> KfResult<Vec<f64>> {
    for r in [path.r_previous, path.r_next].into_iter().chain(path.closest_approach) {
        if !r.is_finite() {
            return Err(KfError::invalid_input(format!("沉积路径坐标无效: {}", r)));
        }
    }

    let radial = grid.radial();
    let (r_f, dr) = (radial.r_f(), radial.dr());
    let vp_vol = grid.vp_vol();
    let mut weights = vec![0.0; grid.nr()];

    let length = path.length();
    if length == 0.0 {
        if let Some(ir) = containing_cell(r_f, path.r_next) {
            KfError::check_nonzero("VpVol", vp_vol[ir])?;
            weights[ir] = 1.0 / (vp_vol[ir] * dr[ir]);
        }
        return Ok(weights);
    }

    for (r_min, r_max) in path.segments() {
        if r_max == r_min {
            continue;
        }
        for ir in 0..grid.nr() {
            let overlap = overlap_width(r_f[ir], r_f[ir + 1], r_min, r_max);
            if overlap <= 0.0 {
                continue;
            }
            KfError::check_nonzero("VpVol", vp_vol[ir])?;
            weights[ir] += overlap / (vp_vol[ir] * dr[ir] * length);
        }
    }
    Ok(weights)
}

fn containing_cell(r_f: &[f64], r: f64) -> Option<usize> {
    let nr = r_f.len() - 1;
    if r < r_f[0] || r > r_f[nr] {
        return None;
    }
    Some((0..nr).find(|&ir| r < r_f[ir + 1]).unwrap_or(nr - 1))
}
