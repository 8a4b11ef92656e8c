// crates/kf_fvm/src/terms/mod.rs

//! 方程项
//!
//! 每个方程项表示 `df/dt = L f` 右端算子 `L` 的一部分。
//! 矩阵形式 `M` 与右端向量 `b` 满足 `vector_form(x) = M x + b`。
//!
//! - [`AdvectionTerm`]: 对流
//! - [`DiffusionTerm`]: 扩散
//! - [`TransientTerm`] / [`WeightedTransientTerm`]: 隐式 Euler 时间导数
//!
//! 系数由 [`CoefficientModel`] 在 `rebuild` 时写入，也可以直接修改系数存储。

pub mod advection;
pub mod diffusion;
pub mod jacobian;
pub mod models;
pub mod transient;

pub use advection::AdvectionTerm;
pub use diffusion::DiffusionTerm;
pub use jacobian::{DerivativeTarget, DifferentiationStore, JacobianContext};
pub use models::{CoefficientModel, ConstantCoefficients, LinearInUnknown};
pub use transient::{TransientTerm, WeightFn, WeightedTransientTerm};

use crate::block_matrix::{BlockView, RowBlockView};
use crate::grid::Grid;
use crate::unknowns::UnknownSource;
use kf_foundation::{KfError, KfResult};
use std::sync::Arc;

/// 方程项
pub trait EquationTerm: Send {
    /// 名称（出现在错误上下文中）
    fn name(&self) -> &str;

    /// 每行最多写入的非零元数
    fn nnz_per_row(&self) -> usize;

    /// 网格重建后重新分配
    fn grid_rebuilt(&mut self, grid: Arc<Grid>) -> KfResult<()>;

    /// 时间步开始时更新系数
    fn rebuild(&mut self, t: f64, dt: f64, unknowns: &dyn UnknownSource) -> KfResult<()>;

    /// 写入矩阵形式，`rhs` 为该子方程的右端向量
    fn set_matrix_elements(&self, view: &mut BlockView<'_>, rhs: Option<&mut [f64]>) -> KfResult<()>;

    /// `out += L x`（含右端项）
    fn set_vector_elements(&self, out: &mut [f64], x: &[f64]) -> KfResult<()>;

    /// 写入 `∂(L x)/∂deriv`
    fn set_jacobian_block(&mut self, ctx: &JacobianContext<'_>, jac: &mut RowBlockView<'_>) -> KfResult<()>;
}

pub(crate) fn check_vector_sizes(grid: &Grid, out: &[f64], x: &[f64]) -> KfResult<()> {
    KfError::check_size("output vector", grid.n_cells(), out.len())?;
    check_unknown_size(grid, x)
}

pub(crate) fn check_unknown_size(grid: &Grid, x: &[f64]) -> KfResult<()> {
    KfError::check_size("unknown vector", grid.n_cells(), x.len())
}

/// 矩阵块必须与网格同尺寸，与向量形式的尺寸检查一致
pub(crate) fn check_view_size(grid: &Grid, view: &BlockView<'_>) -> KfResult<()> {
    KfError::check_size("matrix block rows", grid.n_cells(), view.n_rows())?;
    KfError::check_size("matrix block columns", grid.n_cells(), view.n_cols())
}
