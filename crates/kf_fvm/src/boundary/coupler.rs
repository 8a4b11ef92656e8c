// crates/kf_fvm/src/boundary/coupler.rs

//! 跨网格动量边界耦合
//!
//! 两个动量网格在方向 1 上首尾相接（下侧网格的最后一个面即上侧网格的第一个面），
//! 方向 2 的分辨率可以不同。穿过交界面的通量按方向 2 上的重叠子区间积分，
//! 系数取自下侧网格上的方程项（通过共享缓冲区读取）。
//!
//! ```text
//!     ________________ ________________
//!  ^ |                x                |
//!  | |     lower      x     upper      |
//!  2 |________________x________________|
//!                     1 ---->
//! ```
//!
//! 三种目标：通量记入下侧分布的最后一列单元、上侧分布的第一列单元，
//! 或每个半径一个值的密度型未知量。

use super::overlap::{OverlapScan, ENDPOINT_TOLERANCE};
use super::BoundaryCondition;
use crate::block_matrix::{InsertMode, RowBlockView, SubEquationId};
use crate::coefficients::CoefficientFamily;
use crate::grid::{Direction, Grid};
use crate::terms::{AdvectionTerm, DiffusionTerm, JacobianContext};
use crate::unknowns::{UnknownId, UnknownSource};
use kf_foundation::{KfError, KfResult, RaggedArray, SharedRagged};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 通量记入的未知量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouplingTarget {
    /// 下侧分布
    Lower,
    /// 上侧分布
    Upper,
    /// 密度型未知量（每半径一个值）
    Density,
}

/// 耦合的一侧
#[derive(Debug, Clone)]
pub struct CouplingSide {
    /// 分布函数未知量
    pub unknown: UnknownId,
    /// 所在子方程
    pub block: SubEquationId,
    /// 网格
    pub grid: Arc<Grid>,
}

/// 从下侧方程项共享的系数
#[derive(Debug, Clone)]
pub struct CouplingCoefficients {
    /// 方向 1 对流系数
    pub f1: SharedRagged,
    /// 方向 1 最近邻插值权重
    pub weights: SharedRagged,
    /// 方向 1 扩散系数
    pub d11: Option<SharedRagged>,
}

impl CouplingCoefficients {
    /// 从下侧网格上的对流项（与可选的扩散项）取得共享句柄
    pub fn from_terms(
        advection: &mut AdvectionTerm,
        diffusion: Option<&mut DiffusionTerm>,
    ) -> KfResult<Self> {
        let f1 = advection.coefficients_mut().share(CoefficientFamily::F1)?;
        let weights = advection.weights_mut().share(Direction::P1);
        let d11 = diffusion
            .map(|d| d.coefficients_mut().share(CoefficientFamily::D11))
            .transpose()?;
        Ok(Self { f1, weights, d11 })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Lower,
    Upper,
}

/// 跨网格耦合边界条件
pub struct CrossGridCoupler {
    name: String,
    target: CouplingTarget,
    lower: CouplingSide,
    upper: CouplingSide,
    coefficients: CouplingCoefficients,
    f_lower: Vec<f64>,
    f_upper: Vec<f64>,
    nnz_per_row: usize,
}

impl CrossGridCoupler {
    /// 创建耦合，检查两侧网格在交界面上相容
    pub fn new(
        name: impl Into<String>,
        target: CouplingTarget,
        lower: CouplingSide,
        upper: CouplingSide,
        coefficients: CouplingCoefficients,
    ) -> KfResult<Self> {
        let name = name.into();
        let nnz_per_row = check_compatible(&lower.grid, &upper.grid, target)
            .map_err(|e| e.with_context(name.as_str(), Some(lower.block.get()), None))?;
        log::debug!(
            "{}: 跨网格耦合 {:?}, 每行至多 {} 个非零元",
            name,
            target,
            nnz_per_row
        );
        Ok(Self {
            f_lower: vec![0.0; lower.grid.n_cells()],
            f_upper: vec![0.0; upper.grid.n_cells()],
            name,
            target,
            lower,
            upper,
            coefficients,
            nnz_per_row,
        })
    }

    /// 目标
    pub fn target(&self) -> CouplingTarget {
        self.target
    }

    /// 行块的行数
    pub fn n_rows(&self) -> usize {
        match self.target {
            CouplingTarget::Lower => self.lower.grid.n_cells(),
            CouplingTarget::Upper => self.upper.grid.n_cells(),
            CouplingTarget::Density => self.lower.grid.nr(),
        }
    }

    /// 遍历所有 `(侧, 行, 列, 值)`
    fn for_each_element<F>(&self, mut emit: F) -> KfResult<()>
    where
        F: FnMut(Side, usize, usize, f64) -> KfResult<()>,
    {
        let f1 = self.coefficients.f1.read();
        let weights = self.coefficients.weights.read();
        let d11 = self.coefficients.d11.as_ref().map(|h| h.read());
        let expected = self.lower.grid.face_layout(Direction::P1);
        KfError::check_size("F1", expected.total(), f1.len())?;
        KfError::check_size("interpolation weights", expected.total(), weights.len())?;
        if let Some(d) = &d11 {
            KfError::check_size("D11", expected.total(), d.len())?;
        }

        for ir in 0..self.lower.grid.nr() {
            self.radius_elements(ir, &f1, &weights, d11.as_deref(), &mut emit)
                .map_err(|e| e.with_context(self.name.as_str(), None, Some(ir)))?;
        }
        Ok(())
    }

    fn radius_elements<F>(
        &self,
        ir: usize,
        f1: &RaggedArray,
        weights: &RaggedArray,
        d11: Option<&RaggedArray>,
        emit: &mut F,
    ) -> KfResult<()>
    where
        F: FnMut(Side, usize, usize, f64) -> KfResult<()>,
    {
        let (lg, ug) = (&self.lower.grid, &self.upper.grid);
        let (lm, um) = (lg.momentum(ir), ug.momentum(ir));
        let (lnp, unp) = (lm.n1(), um.n1());
        let (ldxi, udxi) = (lm.dp2(), um.dp2());
        let (lvp, lvp_f) = (lg.vp().row(ir), lg.vp_f1().row(ir));
        let (uvp, uvp_f) = (ug.vp().row(ir), ug.vp_f1().row(ir));
        let (loff, uoff) = (lg.offset(ir), ug.offset(ir));
        let ap = f1.row(ir);
        let delta = weights.row(ir);
        let dpp = d11.map(|d| d.row(ir));

        let dp = um.p1()[0] - lm.p1()[lnp - 1];
        KfError::check_nonzero("p1 gap across boundary", dp)?;

        for ov in OverlapScan::new(lm.p2_f(), um.p2_f())? {
            let (j, jj) = (ov.lower, ov.upper);
            let lidx = lm.index(lnp - 1, j);
            let lidx_f = j * (lnp + 1) + lnp;
            let uidx = um.index(0, jj);
            let uidx_f = jj * (unp + 1);

            let ratio = udxi[jj] / ldxi[j];
            let (row, vd, lfac, ufac) = match self.target {
                CouplingTarget::Lower => (loff + lidx, lvp[lidx] * lm.dp1()[lnp - 1], 1.0, ratio * ratio),
                // 系数取自下侧网格，两侧因子不对称
                CouplingTarget::Upper => (uoff + uidx, -uvp[uidx] * um.dp1()[0], 1.0 / ratio, ratio),
                CouplingTarget::Density => (ir, -lg.vp_vol()[ir] / ldxi[j], 1.0, ratio * ratio),
            };
            KfError::check_nonzero("coupling volume", vd)?;

            let lower_factor = lvp_f[lidx_f] * lfac / vd * ov.width / ldxi[j];
            let upper_factor = uvp_f[uidx_f] * ufac / vd * ov.width / udxi[jj];

            let a = ap[lidx_f];
            let w = delta[lidx_f];
            emit(Side::Lower, row, loff + lidx, -a * w * lower_factor)?;
            emit(Side::Upper, row, uoff + uidx, -a * (1.0 - w) * upper_factor)?;

            if let Some(dpp) = dpp {
                let g = dpp[lidx_f] / dp;
                emit(Side::Lower, row, loff + lidx, -g * lower_factor)?;
                emit(Side::Upper, row, uoff + uidx, g * upper_factor)?;
            }
        }
        Ok(())
    }

    fn side_block(&self, side: Side) -> SubEquationId {
        match side {
            Side::Lower => self.lower.block,
            Side::Upper => self.upper.block,
        }
    }
}

/// 检查两侧网格，返回每行非零元上限
fn check_compatible(lower: &Grid, upper: &Grid, target: CouplingTarget) -> KfResult<usize> {
    KfError::check_size("coupled radial grids", lower.nr(), upper.nr())?;
    let mut nnz = 0;
    for ir in 0..lower.nr() {
        let (lm, um) = (lower.momentum(ir), upper.momentum(ir));
        check_abutting(ir, lm.p1_f(), um.p1_f())?;
        let scan = OverlapScan::new(lm.p2_f(), um.p2_f())?;
        let row_nnz = match target {
            CouplingTarget::Lower => scan.counts_per_lower().into_iter().max().unwrap_or(0) + 1,
            CouplingTarget::Upper => scan.counts_per_upper().into_iter().max().unwrap_or(0) + 1,
            CouplingTarget::Density => lm.n2() + um.n2(),
        };
        nnz = nnz.max(row_nnz);
    }
    Ok(nnz)
}

/// 下侧网格的最后一个 p1 面必须与上侧网格的第一个 p1 面重合
fn check_abutting(ir: usize, lower_faces: &[f64], upper_faces: &[f64]) -> KfResult<()> {
    let (Some(&l_first), Some(&l_last)) = (lower_faces.first(), lower_faces.last()) else {
        return Err(KfError::unsupported_grid(format!("半径 {} 的下侧网格没有 p1 面", ir)));
    };
    let (Some(&u_first), Some(&u_last)) = (upper_faces.first(), upper_faces.last()) else {
        return Err(KfError::unsupported_grid(format!("半径 {} 的上侧网格没有 p1 面", ir)));
    };
    let span = (l_last - l_first).abs().max((u_last - u_first).abs());
    let tol = ENDPOINT_TOLERANCE * span.max(1.0);
    if (l_last - u_first).abs() > tol {
        return Err(KfError::unsupported_grid(format!(
            "半径 {} 处两侧网格在 p1 方向不相接: 下侧止于 {}，上侧始于 {}",
            ir, l_last, u_first
        )));
    }
    Ok(())
}

impl BoundaryCondition for CrossGridCoupler {
    fn name(&self) -> &str {
        &self.name
    }

    fn nnz_per_row(&self) -> usize {
        self.nnz_per_row
    }

    fn rebuild(&mut self, _t: f64, unknowns: &dyn UnknownSource) -> KfResult<()> {
        let lower = unknowns.data(self.lower.unknown)?;
        KfError::check_size("lower distribution", self.f_lower.len(), lower.len())?;
        self.f_lower.copy_from_slice(lower);
        let upper = unknowns.data(self.upper.unknown)?;
        KfError::check_size("upper distribution", self.f_upper.len(), upper.len())?;
        self.f_upper.copy_from_slice(upper);
        Ok(())
    }

    fn add_to_matrix_elements(&self, rows: &mut RowBlockView<'_>, _rhs: Option<&mut [f64]>) -> KfResult<()> {
        KfError::check_size("coupler rows", self.n_rows(), rows.n_rows())?;
        self.for_each_element(|side, row, col, value| {
            if value == 0.0 {
                return Ok(());
            }
            rows.set_element(self.side_block(side), row, col, value, InsertMode::Add)
        })
    }

    fn add_to_vector_elements(&self, out: &mut [f64], _x: &[f64]) -> KfResult<()> {
        KfError::check_size("coupler rows", self.n_rows(), out.len())?;
        let (fl, fu) = (&self.f_lower, &self.f_upper);
        self.for_each_element(|side, row, col, value| {
            let f = match side {
                Side::Lower => fl[col],
                Side::Upper => fu[col],
            };
            out[row] += value * f;
            Ok(())
        })
    }

    fn add_to_jacobian_block(&self, ctx: &JacobianContext<'_>, jac: &mut RowBlockView<'_>) -> KfResult<()> {
        let side = if ctx.deriv == self.lower.unknown {
            Side::Lower
        } else if ctx.deriv == self.upper.unknown {
            Side::Upper
        } else {
            return Ok(());
        };
        let block = self.side_block(side);
        self.for_each_element(|s, row, col, value| {
            if s != side || value == 0.0 {
                return Ok(());
            }
            jac.set_element(block, row, col, value, InsertMode::Add)
        })
    }
}
