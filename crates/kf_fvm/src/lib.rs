// crates/kf_fvm/src/lib.rs

//! KineticFlux 有限体积装配核心
//!
//! 在"径向 × 二维动量"网格上装配对流与扩散通量，输出分块稀疏矩阵、
//! 右端向量与 Jacobian。矩阵形式与向量形式共用同一个通量公式，
//! 两条路径在浮点误差内一致。
//!
//! # 模块概览
//!
//! - [`grid`]: 径向网格、逐半径动量网格与几何因子
//! - [`unknowns`]: 未知量存储与读取接口
//! - [`coefficients`]: 通量系数族与面插值权重
//! - [`assembly`]: 对流/扩散通量装配器与贡献接收器
//! - [`terms`]: 方程项、系数模型与 Jacobian
//! - [`boundary`]: 跨网格耦合、外边界出流、沉积权重
//! - [`operator`]: 组合方程项与边界条件
//! - [`block_matrix`]: 分块稀疏矩阵与块视图
//! - [`linear_algebra`]: CSR 矩阵与 BiCGStab 求解器
//! - [`dump`]: 系数导出
//!
//! # 示例
//!
//! ```
//! use kf_fvm::prelude::*;
//! use std::sync::Arc;
//!
//! let grid = Arc::new(Grid::uniform(
//!     RadialGrid::uniform(1, 0.0, 1.0).unwrap(),
//!     MomentumGrid::uniform(5, (0.0, 1.0), 1, (-1.0, 1.0)).unwrap(),
//!     RadialGeometry::Slab,
//!     MomentumGeometry::Cartesian,
//! ).unwrap());
//!
//! let mut diffusion = DiffusionTerm::new("diffusion", grid.clone()).unwrap();
//! diffusion.coefficients_mut().fill(CoefficientFamily::D11, 1.0).unwrap();
//!
//! let mut op = Operator::new(grid.clone());
//! op.set_diffusion(diffusion);
//!
//! let mut m = BlockMatrix::new();
//! let f = m.create_sub_equation("f", grid.n_cells(), op.nnz_per_row()).unwrap();
//! m.construct_system().unwrap();
//! op.build_matrix(&mut m, f, None).unwrap();
//! assert!((m.get(2, 2) + 50.0).abs() < 1e-10);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assembly;
pub mod block_matrix;
pub mod boundary;
pub mod coefficients;
pub mod dump;
pub mod grid;
pub mod linear_algebra;
pub mod operator;
pub mod terms;
pub mod unknowns;

// 重导出常用类型
pub use block_matrix::{BlockMatrix, BlockView, InsertMode, RowBlockView, SubEquationId};
pub use boundary::{
    box_deposition, BoundaryCondition, BoundaryFlux, CouplingCoefficients, CouplingSide,
    CouplingTarget, CrossGridCoupler, DepositionPath, OverlapScan,
};
pub use coefficients::{CoefficientFamily, CoefficientStore, InterpolationScheme, InterpolationWeights};
pub use dump::CoefficientDump;
pub use grid::{Direction, Grid, MomentumGeometry, MomentumGrid, RadialGeometry, RadialGrid};
pub use operator::Operator;
pub use terms::{
    AdvectionTerm, CoefficientModel, DiffusionTerm, EquationTerm, JacobianContext, TransientTerm,
};
pub use unknowns::{UnknownId, UnknownQuantityHandler, UnknownSource};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::block_matrix::{BlockMatrix, InsertMode, SubEquationId};
    pub use crate::boundary::{BoundaryCondition, BoundaryFlux, CouplingTarget, CrossGridCoupler};
    pub use crate::coefficients::{CoefficientFamily, InterpolationScheme};
    pub use crate::grid::{Grid, MomentumGeometry, MomentumGrid, RadialGeometry, RadialGrid};
    pub use crate::linear_algebra::{BiCgStabSolver, CsrMatrix, JacobiPreconditioner, SolverConfig};
    pub use crate::operator::Operator;
    pub use crate::terms::{AdvectionTerm, DiffusionTerm, EquationTerm, TransientTerm};
    pub use crate::unknowns::{UnknownId, UnknownQuantityHandler, UnknownSource};
    pub use kf_foundation::{KfError, KfResult};
}
