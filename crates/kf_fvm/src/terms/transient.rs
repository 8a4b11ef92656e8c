// crates/kf_fvm/src/terms/transient.rs

//! 瞬态项
//!
//! 隐式 Euler 步写作 `L f - w (f - f_prev) / dt = 0`。
//! 矩阵形式为对角 `-w/dt`，右端 `b += w f_prev / dt`。

use super::jacobian::JacobianContext;
use super::{check_vector_sizes, check_view_size, EquationTerm};
use crate::block_matrix::{BlockView, InsertMode, RowBlockView};
use crate::grid::Grid;
use crate::unknowns::{UnknownId, UnknownSource};
use kf_foundation::{KfError, KfResult};
use std::sync::Arc;

/// 单元权重函数 `(grid, ir, cell) -> w`，`cell` 为半径内的局部单元索引
pub type WeightFn = Box<dyn Fn(&Grid, usize, usize) -> f64 + Send + Sync>;

/// 带单元权重的瞬态项
pub struct WeightedTransientTerm {
    name: String,
    grid: Arc<Grid>,
    unknown: UnknownId,
    weight_fn: WeightFn,
    weights: Vec<f64>,
    dt: f64,
    x_prev: Vec<f64>,
}

impl WeightedTransientTerm {
    /// 创建瞬态项，`unknown` 为该项所属的未知量
    pub fn new(
        name: impl Into<String>,
        grid: Arc<Grid>,
        unknown: UnknownId,
        weight_fn: WeightFn,
    ) -> Self {
        let weights = evaluate_weights(&grid, &weight_fn);
        let n = grid.n_cells();
        Self {
            name: name.into(),
            grid,
            unknown,
            weight_fn,
            weights,
            dt: 0.0,
            x_prev: vec![0.0; n],
        }
    }

    /// 单元权重
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// 最近一次 `rebuild` 的时间步长
    pub fn dt(&self) -> f64 {
        self.dt
    }

    fn require_rebuilt(&self) -> KfResult<()> {
        KfError::check_nonzero("dt", self.dt)
    }
}

fn evaluate_weights(grid: &Grid, weight_fn: &WeightFn) -> Vec<f64> {
    (0..grid.nr())
        .flat_map(|ir| (0..grid.momentum(ir).n_cells()).map(move |c| weight_fn(grid, ir, c)))
        .collect()
}

impl EquationTerm for WeightedTransientTerm {
    fn name(&self) -> &str {
        &self.name
    }

    fn nnz_per_row(&self) -> usize {
        1
    }

    fn grid_rebuilt(&mut self, grid: Arc<Grid>) -> KfResult<()> {
        self.weights = evaluate_weights(&grid, &self.weight_fn);
        self.x_prev = vec![0.0; grid.n_cells()];
        self.grid = grid;
        Ok(())
    }

    fn rebuild(&mut self, _t: f64, dt: f64, unknowns: &dyn UnknownSource) -> KfResult<()> {
        KfError::check_nonzero("dt", dt)?;
        let prev = unknowns.data_previous(self.unknown)?;
        KfError::check_size("previous step", self.x_prev.len(), prev.len())?;
        self.x_prev.copy_from_slice(prev);
        self.dt = dt;
        Ok(())
    }

    fn set_matrix_elements(&self, view: &mut BlockView<'_>, rhs: Option<&mut [f64]>) -> KfResult<()> {
        self.require_rebuilt()?;
        check_view_size(&self.grid, view)?;
        for (k, &w) in self.weights.iter().enumerate() {
            view.set_element(k, k, -w / self.dt, InsertMode::Add);
        }
        if let Some(rhs) = rhs {
            KfError::check_size("rhs", self.weights.len(), rhs.len())?;
            for ((b, &w), &xp) in rhs.iter_mut().zip(&self.weights).zip(&self.x_prev) {
                *b += w * xp / self.dt;
            }
        }
        Ok(())
    }

    fn set_vector_elements(&self, out: &mut [f64], x: &[f64]) -> KfResult<()> {
        self.require_rebuilt()?;
        check_vector_sizes(&self.grid, out, x)?;
        for (k, o) in out.iter_mut().enumerate() {
            *o -= self.weights[k] * (x[k] - self.x_prev[k]) / self.dt;
        }
        Ok(())
    }

    fn set_jacobian_block(&mut self, ctx: &JacobianContext<'_>, jac: &mut RowBlockView<'_>) -> KfResult<()> {
        if ctx.is_diagonal() {
            self.set_matrix_elements(&mut jac.block(ctx.deriv_block)?, None)?;
        }
        Ok(())
    }
}

/// 单位权重的瞬态项 `-(f - f_prev) / dt`
pub struct TransientTerm(WeightedTransientTerm);

impl TransientTerm {
    /// 创建瞬态项
    pub fn new(name: impl Into<String>, grid: Arc<Grid>, unknown: UnknownId) -> Self {
        Self(WeightedTransientTerm::new(
            name,
            grid,
            unknown,
            Box::new(|_: &Grid, _: usize, _: usize| 1.0),
        ))
    }
}

impl EquationTerm for TransientTerm {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn nnz_per_row(&self) -> usize {
        1
    }

    fn grid_rebuilt(&mut self, grid: Arc<Grid>) -> KfResult<()> {
        self.0.grid_rebuilt(grid)
    }

    fn rebuild(&mut self, t: f64, dt: f64, unknowns: &dyn UnknownSource) -> KfResult<()> {
        self.0.rebuild(t, dt, unknowns)
    }

    fn set_matrix_elements(&self, view: &mut BlockView<'_>, rhs: Option<&mut [f64]>) -> KfResult<()> {
        self.0.set_matrix_elements(view, rhs)
    }

    fn set_vector_elements(&self, out: &mut [f64], x: &[f64]) -> KfResult<()> {
        self.0.set_vector_elements(out, x)
    }

    fn set_jacobian_block(&mut self, ctx: &JacobianContext<'_>, jac: &mut RowBlockView<'_>) -> KfResult<()> {
        self.0.set_jacobian_block(ctx, jac)
    }
}
