// crates/kf_fvm/src/linear_algebra/mod.rs

//! 稀疏线性代数
//!
//! 块矩阵导出的 CSR 快照、向量运算、预条件器与 BiCGStab 求解器。

pub mod csr;
pub mod preconditioner;
pub mod solver;
pub mod vector_ops;

pub use csr::{CsrMatrix, CsrPattern};
pub use preconditioner::{IdentityPreconditioner, JacobiPreconditioner, Preconditioner};
pub use solver::{BiCgStabSolver, IterativeSolver, SolverConfig, SolverResult, SolverStatus};
pub use vector_ops::{axpy, copy, dot, norm2, norm_inf};
