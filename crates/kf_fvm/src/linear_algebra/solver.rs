// crates/kf_fvm/src/linear_algebra/solver.rs

//! 迭代线性求解器
//!
//! 瞬态步 `(I - dt·A) x = b` 为非对称系统，使用 [`BiCgStabSolver`]。
//!
//! # 使用示例
//!
//! ```
//! use kf_fvm::linear_algebra::{
//!     BiCgStabSolver, CsrMatrix, IterativeSolver, JacobiPreconditioner, SolverConfig,
//! };
//!
//! let matrix = CsrMatrix::identity(3);
//! let b = vec![1.0, 2.0, 3.0];
//! let mut x = vec![0.0; 3];
//!
//! let precond = JacobiPreconditioner::from_matrix(&matrix);
//! let mut solver = BiCgStabSolver::new(SolverConfig::new(1e-10, 100));
//! let result = solver.solve(&matrix, &b, &mut x, &precond);
//! assert!(result.is_converged());
//! ```

use super::csr::CsrMatrix;
use super::preconditioner::Preconditioner;
use super::vector_ops::{axpy, copy, dot, norm2};
use serde::{Deserialize, Serialize};

/// 求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 相对收敛容差
    pub rtol: f64,
    /// 绝对收敛容差
    pub atol: f64,
    /// 最大迭代次数
    pub max_iter: usize,
    /// 是否输出迭代信息
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-10,
            atol: 1e-14,
            max_iter: 1000,
            verbose: false,
        }
    }
}

impl SolverConfig {
    /// 创建求解器配置
    pub fn new(rtol: f64, max_iter: usize) -> Self {
        Self {
            rtol,
            max_iter,
            ..Default::default()
        }
    }

    /// 设置绝对容差
    pub fn with_atol(mut self, atol: f64) -> Self {
        self.atol = atol;
        self
    }

    /// 启用详细输出
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

/// 求解器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// 收敛
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 发散
    Diverged,
    /// 停滞
    Stagnated,
}

/// 求解器结果
#[derive(Debug, Clone)]
pub struct SolverResult {
    /// 求解状态
    pub status: SolverStatus,
    /// 迭代次数
    pub iterations: usize,
    /// 最终残差范数
    pub residual_norm: f64,
    /// 初始残差范数
    pub initial_residual_norm: f64,
    /// 相对残差
    pub relative_residual: f64,
}

impl SolverResult {
    /// 是否成功收敛
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    fn finish(status: SolverStatus, iterations: usize, residual: f64, initial: f64) -> Self {
        Self {
            status,
            iterations,
            residual_norm: residual,
            initial_residual_norm: initial,
            relative_residual: if initial > 0.0 { residual / initial } else { 0.0 },
        }
    }
}

/// 迭代求解器 trait
pub trait IterativeSolver {
    /// 求解 Ax = b，`x` 输入初值、输出解
    fn solve<P: Preconditioner>(
        &mut self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &P,
    ) -> SolverResult;

    /// 求解器名称
    fn name(&self) -> &'static str;
}

/// 双共轭梯度稳定法求解器
pub struct BiCgStabSolver {
    config: SolverConfig,
    r: Vec<f64>,
    r0: Vec<f64>,
    p: Vec<f64>,
    v: Vec<f64>,
    s: Vec<f64>,
    t: Vec<f64>,
    p_hat: Vec<f64>,
    s_hat: Vec<f64>,
}

impl BiCgStabSolver {
    /// 创建 BiCGStab 求解器
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            r: Vec::new(),
            r0: Vec::new(),
            p: Vec::new(),
            v: Vec::new(),
            s: Vec::new(),
            t: Vec::new(),
            p_hat: Vec::new(),
            s_hat: Vec::new(),
        }
    }

    /// 配置
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            for w in [
                &mut self.r,
                &mut self.r0,
                &mut self.p,
                &mut self.v,
                &mut self.s,
                &mut self.t,
                &mut self.p_hat,
                &mut self.s_hat,
            ] {
                *w = vec![0.0; n];
            }
        }
    }
}

impl IterativeSolver for BiCgStabSolver {
    fn solve<P: Preconditioner>(
        &mut self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &P,
    ) -> SolverResult {
        let n = b.len();
        self.ensure_workspace(n);
        let rtol = self.config.rtol;
        let atol = self.config.atol;
        let stag_tol = 1e-30;
        let div_factor = 1e6;

        // r = b - A*x
        matrix.mul_vec(x, &mut self.r);
        for i in 0..n {
            self.r[i] = b[i] - self.r[i];
        }

        let initial_norm = norm2(&self.r);
        if initial_norm < atol {
            return SolverResult::finish(SolverStatus::Converged, 0, initial_norm, initial_norm);
        }

        copy(&self.r, &mut self.r0);

        let mut rho_old = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;
        self.v.fill(0.0);
        self.p.fill(0.0);

        for iter in 0..self.config.max_iter {
            let rho = dot(&self.r0, &self.r);
            if rho.abs() < stag_tol {
                return SolverResult::finish(
                    SolverStatus::Stagnated,
                    iter,
                    norm2(&self.r),
                    initial_norm,
                );
            }

            let beta = if iter == 0 {
                0.0
            } else {
                (rho / rho_old) * (alpha / omega)
            };
            rho_old = rho;

            // p = r + beta * (p - omega * v)
            for i in 0..n {
                self.p[i] = self.r[i] + beta * (self.p[i] - omega * self.v[i]);
            }

            precond.apply(&self.p, &mut self.p_hat);
            matrix.mul_vec(&self.p_hat, &mut self.v);

            let r0v = dot(&self.r0, &self.v);
            if r0v.abs() < stag_tol {
                return SolverResult::finish(
                    SolverStatus::Stagnated,
                    iter,
                    norm2(&self.r),
                    initial_norm,
                );
            }
            alpha = rho / r0v;

            // s = r - alpha * v
            for i in 0..n {
                self.s[i] = self.r[i] - alpha * self.v[i];
            }

            let s_norm = norm2(&self.s);
            if s_norm < atol || s_norm / initial_norm < rtol {
                axpy(alpha, &self.p_hat, x);
                return SolverResult::finish(
                    SolverStatus::Converged,
                    iter + 1,
                    s_norm,
                    initial_norm,
                );
            }

            precond.apply(&self.s, &mut self.s_hat);
            matrix.mul_vec(&self.s_hat, &mut self.t);

            let tt = dot(&self.t, &self.t);
            omega = if tt < stag_tol {
                1.0
            } else {
                dot(&self.t, &self.s) / tt
            };

            axpy(alpha, &self.p_hat, x);
            if omega.abs() < stag_tol {
                return SolverResult::finish(SolverStatus::Stagnated, iter + 1, s_norm, initial_norm);
            }
            axpy(omega, &self.s_hat, x);

            // r = s - omega * t
            for i in 0..n {
                self.r[i] = self.s[i] - omega * self.t[i];
            }

            let res_norm = norm2(&self.r);
            if self.config.verbose {
                log::trace!("BiCGStab iter {}: residual = {:.6e}", iter + 1, res_norm);
            }

            if res_norm < atol || res_norm / initial_norm < rtol {
                return SolverResult::finish(
                    SolverStatus::Converged,
                    iter + 1,
                    res_norm,
                    initial_norm,
                );
            }
            if res_norm > initial_norm * div_factor {
                return SolverResult::finish(
                    SolverStatus::Diverged,
                    iter + 1,
                    res_norm,
                    initial_norm,
                );
            }
        }

        SolverResult::finish(
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            norm2(&self.r),
            initial_norm,
        )
    }

    fn name(&self) -> &'static str {
        "BiCGStab"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear_algebra::preconditioner::{IdentityPreconditioner, JacobiPreconditioner};

    /// 非对称三对角矩阵（对角占优）
    fn upwind_matrix(n: usize) -> CsrMatrix {
        let mut row_ptr = vec![0];
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        for i in 0..n {
            if i > 0 {
                col_idx.push(i - 1);
                values.push(-1.5);
            }
            col_idx.push(i);
            values.push(4.0);
            if i + 1 < n {
                col_idx.push(i + 1);
                values.push(-0.5);
            }
            row_ptr.push(col_idx.len());
        }
        CsrMatrix::from_raw(n, n, row_ptr, col_idx, values)
    }

    #[test]
    fn test_bicgstab_solves_nonsymmetric() {
        let a = upwind_matrix(20);
        let x_true: Vec<f64> = (0..20).map(|i| (i as f64 * 0.3).sin()).collect();
        let mut b = vec![0.0; 20];
        a.mul_vec(&x_true, &mut b);

        let mut x = vec![0.0; 20];
        let precond = JacobiPreconditioner::from_matrix(&a);
        let mut solver = BiCgStabSolver::new(SolverConfig::new(1e-12, 200));
        let result = solver.solve(&a, &b, &mut x, &precond);
        assert!(result.is_converged());
        for (xi, ti) in x.iter().zip(&x_true) {
            assert!((xi - ti).abs() < 1e-9);
        }
    }

    #[test]
    fn test_already_converged() {
        let a = CsrMatrix::identity(4);
        let b = vec![1.0, 2.0, 3.0, 4.0];
        let mut x = b.clone();
        let mut solver = BiCgStabSolver::new(SolverConfig::default());
        let result = solver.solve(&a, &b, &mut x, &IdentityPreconditioner::new());
        assert!(result.is_converged());
        assert_eq!(result.iterations, 0);
    }
}
