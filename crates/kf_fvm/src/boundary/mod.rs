// crates/kf_fvm/src/boundary/mod.rs

//! 边界条件
//!
//! 边界条件在主装配（`partial_assemble`）之后写入，以行块视图访问任意列块。
//!
//! - [`CrossGridCoupler`]: 两个动量网格交界面上的通量耦合
//! - [`BoundaryFlux`]: 外径向面上的出流
//! - [`box_deposition`]: 沿径向路径的时间平均沉积权重

pub mod coupler;
pub mod deposition;
pub mod outflow;
pub mod overlap;

pub use coupler::{CouplingCoefficients, CouplingSide, CouplingTarget, CrossGridCoupler};
pub use deposition::{box_deposition, detect_turning_point, DepositionPath};
pub use outflow::BoundaryFlux;
pub use overlap::{overlap_width, Overlap, OverlapScan};

use crate::block_matrix::RowBlockView;
use crate::grid::Grid;
use crate::terms::JacobianContext;
use crate::unknowns::UnknownSource;
use kf_foundation::KfResult;
use std::sync::Arc;

/// 边界条件
///
/// 与 [`EquationTerm`](crate::terms::EquationTerm) 使用同一符号约定：
/// 写入的是右端算子的贡献。
pub trait BoundaryCondition: Send {
    /// 名称（出现在错误上下文中）
    fn name(&self) -> &str;

    /// 每行最多写入的非零元数
    fn nnz_per_row(&self) -> usize;

    /// 网格重建
    fn grid_rebuilt(&mut self, _grid: Arc<Grid>) -> KfResult<()> {
        Ok(())
    }

    /// 时间步开始时更新
    fn rebuild(&mut self, t: f64, unknowns: &dyn UnknownSource) -> KfResult<()>;

    /// 累加矩阵形式
    fn add_to_matrix_elements(&self, rows: &mut RowBlockView<'_>, rhs: Option<&mut [f64]>) -> KfResult<()>;

    /// `out += L x`
    fn add_to_vector_elements(&self, out: &mut [f64], x: &[f64]) -> KfResult<()>;

    /// 累加 `∂(L x)/∂deriv`
    fn add_to_jacobian_block(&self, ctx: &JacobianContext<'_>, jac: &mut RowBlockView<'_>) -> KfResult<()>;
}
