// crates/kf_fvm/src/boundary/outflow.rs

//! 外径向面出流
//!
//! 最外层径向面上，对流系数 `a > 0`（向外）时通量 `a·f` 离开计算域，
//! 取最外层单元的值作为面值；`a <= 0` 时不产生通量。

use super::BoundaryCondition;
use crate::block_matrix::{InsertMode, RowBlockView};
use crate::coefficients::CoefficientFamily;
use crate::grid::{Direction, Grid};
use crate::terms::{AdvectionTerm, JacobianContext};
use crate::unknowns::UnknownSource;
use kf_foundation::{KfError, KfResult, SharedRagged};
use std::sync::Arc;

/// 外边界出流条件
pub struct BoundaryFlux {
    name: String,
    grid: Arc<Grid>,
    fr: SharedRagged,
}

impl BoundaryFlux {
    /// 以共享的径向对流系数创建
    pub fn new(name: impl Into<String>, grid: Arc<Grid>, fr: SharedRagged) -> Self {
        Self {
            name: name.into(),
            grid,
            fr,
        }
    }

    /// 从对流项取得径向系数
    pub fn from_term(name: impl Into<String>, term: &mut AdvectionTerm) -> KfResult<Self> {
        let grid = term.grid_handle();
        let fr = term.coefficients_mut().share(CoefficientFamily::Fr)?;
        Ok(Self::new(name, grid, fr))
    }

    /// 对角元 `(行, 值)`，只含出流单元
    fn diagonal(&self) -> KfResult<Vec<(usize, f64)>> {
        let fr = self.fr.read();
        KfError::check_size(
            "Fr",
            self.grid.face_layout(Direction::Radial).total(),
            fr.len(),
        )?;
        let nr = self.grid.nr();
        let ir = nr - 1;
        let dr = self.grid.radial().dr()[ir];
        let (vp, vp_f) = (self.grid.vp().row(ir), self.grid.vp_fr().row(nr));
        let offset = self.grid.offset(ir);

        let mut entries = Vec::new();
        for (k, &a) in fr.row(nr).iter().enumerate() {
            if a <= 0.0 {
                continue;
            }
            KfError::check_nonzero("Vp", vp[k])?;
            entries.push((offset + k, -a * vp_f[k] / (vp[k] * dr)));
        }
        Ok(entries)
    }

    fn with_context<T>(&self, result: KfResult<T>) -> KfResult<T> {
        result.map_err(|e| e.with_context(self.name.as_str(), None, Some(self.grid.nr() - 1)))
    }
}

impl BoundaryCondition for BoundaryFlux {
    fn name(&self) -> &str {
        &self.name
    }

    fn nnz_per_row(&self) -> usize {
        1
    }

    fn grid_rebuilt(&mut self, grid: Arc<Grid>) -> KfResult<()> {
        self.grid = grid;
        Ok(())
    }

    fn rebuild(&mut self, _t: f64, _unknowns: &dyn UnknownSource) -> KfResult<()> {
        Ok(())
    }

    fn add_to_matrix_elements(&self, rows: &mut RowBlockView<'_>, _rhs: Option<&mut [f64]>) -> KfResult<()> {
        let block = rows.block_id();
        for (k, v) in self.with_context(self.diagonal())? {
            rows.set_element(block, k, k, v, InsertMode::Add)?;
        }
        Ok(())
    }

    fn add_to_vector_elements(&self, out: &mut [f64], x: &[f64]) -> KfResult<()> {
        KfError::check_size("output vector", self.grid.n_cells(), out.len())?;
        KfError::check_size("unknown vector", self.grid.n_cells(), x.len())?;
        for (k, v) in self.with_context(self.diagonal())? {
            out[k] += v * x[k];
        }
        Ok(())
    }

    fn add_to_jacobian_block(&self, ctx: &JacobianContext<'_>, jac: &mut RowBlockView<'_>) -> KfResult<()> {
        if !ctx.is_diagonal() {
            return Ok(());
        }
        for (k, v) in self.with_context(self.diagonal())? {
            jac.set_element(ctx.deriv_block, k, k, v, InsertMode::Add)?;
        }
        Ok(())
    }
}
