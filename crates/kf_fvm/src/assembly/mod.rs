// crates/kf_fvm/src/assembly/mod.rs

//! 通量差分装配
//!
//! 所有方向的面贡献都归结为同一个公式：对内部面，设从下侧单元流向上侧单元的
//! 净通量 `V_f · Φ` 中单元 `c` 的系数为 `φ`，则
//!
//! ```text
//! 下侧单元行:  (c, -φ / (V_l · Δ_l))
//! 上侧单元行:  (c, +φ / (V_u · Δ_u))
//! ```
//!
//! 其中 `Δ` 为单元在该方向的宽度。每一对贡献按体积加权后相互抵消，因此
//! 闭合系统的总粒子数守恒。边界面（每个方向第一个和最后一个面）不参与，
//! 由边界条件处理。
//!
//! 对流 `Φ = A · f_face`，扩散 `Φ = -D · ∂f`，二者分别见
//! [`advection`] 与 [`diffusion`]。

pub mod advection;
pub mod diffusion;
pub mod sink;

pub use advection::AdvectionAssembler;
pub use diffusion::DiffusionAssembler;
pub use sink::{ContributionSink, ScaledSink, VectorSink};

use kf_foundation::{KfError, KfResult};

/// 一个内部面两侧单元的行与体积倒数
#[derive(Debug, Clone, Copy)]
pub(crate) struct FacePair {
    pub row_l: usize,
    pub inv_l: f64,
    pub row_u: usize,
    pub inv_u: f64,
}

impl FacePair {
    /// 由两侧单元的行、体积因子与宽度构建
    #[inline]
    pub fn new(
        row_l: usize,
        (vp_l, width_l): (f64, f64),
        row_u: usize,
        (vp_u, width_u): (f64, f64),
    ) -> KfResult<Self> {
        Ok(Self {
            row_l,
            inv_l: inverse_volume(vp_l, width_l)?,
            row_u,
            inv_u: inverse_volume(vp_u, width_u)?,
        })
    }

    /// 输出列 `col` 上系数为 `phi` 的面通量
    #[inline]
    pub fn emit<S: ContributionSink + ?Sized>(&self, sink: &mut S, col: usize, phi: f64) {
        if phi == 0.0 {
            return;
        }
        sink.accumulate(self.row_l, col, -phi * self.inv_l);
        sink.accumulate(self.row_u, col, phi * self.inv_u);
    }
}

/// `1 / (V · Δ)`，零或非有限时返回数值退化错误
#[inline]
pub(crate) fn inverse_volume(vp: f64, width: f64) -> KfResult<f64> {
    let v = vp * width;
    KfError::check_nonzero("cell volume", v)?;
    Ok(1.0 / v)
}

/// 半径 `ir` 上单元 `(i, j)` 在子方程内的行号
#[inline]
pub(crate) fn cell_row(offset: usize, n1: usize, i: usize, j: usize) -> usize {
    offset + j * n1 + i
}
