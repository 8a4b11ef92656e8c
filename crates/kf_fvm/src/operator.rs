// crates/kf_fvm/src/operator.rs

//! 单个子方程的算子
//!
//! 算子把一组方程项和边界条件组合为子方程的右端算子 `L`：
//!
//! ```text
//! rebuild:      方程项 → 边界条件
//! build_matrix: 方程项（块视图）→ partial_assemble → 边界条件（行块视图）
//! ```
//!
//! 边界条件在方程项之后重建，因为耦合条件读取方程项共享出的系数。
//! 所有错误都附带出错部件的名称与子方程编号。

use crate::block_matrix::{BlockMatrix, SubEquationId};
use crate::boundary::BoundaryCondition;
use crate::grid::Grid;
use crate::terms::{AdvectionTerm, DiffusionTerm, EquationTerm, JacobianContext};
use crate::unknowns::UnknownSource;
use kf_foundation::{KfError, KfResult};
use std::sync::Arc;

/// 子方程的右端算子
pub struct Operator {
    grid: Arc<Grid>,
    advection: Option<AdvectionTerm>,
    diffusion: Option<DiffusionTerm>,
    terms: Vec<Box<dyn EquationTerm>>,
    boundaries: Vec<Box<dyn BoundaryCondition>>,
    transient: Option<Box<dyn EquationTerm>>,
}

impl Operator {
    /// 创建空算子
    pub fn new(grid: Arc<Grid>) -> Self {
        Self {
            grid,
            advection: None,
            diffusion: None,
            terms: Vec::new(),
            boundaries: Vec::new(),
            transient: None,
        }
    }

    /// 网格
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// 设置对流项
    pub fn set_advection(&mut self, term: AdvectionTerm) {
        self.advection = Some(term);
    }

    /// 设置扩散项
    pub fn set_diffusion(&mut self, term: DiffusionTerm) {
        self.diffusion = Some(term);
    }

    /// 追加其他方程项
    pub fn add_term(&mut self, term: Box<dyn EquationTerm>) {
        self.terms.push(term);
    }

    /// 追加边界条件
    pub fn add_boundary_condition(&mut self, bc: Box<dyn BoundaryCondition>) {
        self.boundaries.push(bc);
    }

    /// 设置瞬态项
    pub fn set_transient(&mut self, term: Box<dyn EquationTerm>) {
        self.transient = Some(term);
    }

    /// 对流项
    pub fn advection_mut(&mut self) -> Option<&mut AdvectionTerm> {
        self.advection.as_mut()
    }

    /// 扩散项
    pub fn diffusion_mut(&mut self) -> Option<&mut DiffusionTerm> {
        self.diffusion.as_mut()
    }

    /// 同时取得对流项与扩散项（用于建立耦合）
    pub fn transport_terms_mut(&mut self) -> (Option<&mut AdvectionTerm>, Option<&mut DiffusionTerm>) {
        (self.advection.as_mut(), self.diffusion.as_mut())
    }

    /// 是否没有任何部件
    pub fn is_empty(&self) -> bool {
        self.parts().next().is_none() && self.boundaries.is_empty()
    }

    /// 是否含瞬态项
    pub fn has_transient(&self) -> bool {
        self.transient.is_some()
    }

    /// 各部件每行非零元数之和
    pub fn nnz_per_row(&self) -> usize {
        self.parts().map(|t| t.nnz_per_row()).sum::<usize>()
            + self.boundaries.iter().map(|b| b.nnz_per_row()).sum::<usize>()
    }

    fn parts(&self) -> impl Iterator<Item = &dyn EquationTerm> + '_ {
        let advection = self.advection.iter().map(|t| -> &dyn EquationTerm { t });
        let diffusion = self.diffusion.iter().map(|t| -> &dyn EquationTerm { t });
        let terms = self.terms.iter().map(|t| -> &dyn EquationTerm { t.as_ref() });
        let transient = self.transient.iter().map(|t| -> &dyn EquationTerm { t.as_ref() });
        advection.chain(diffusion).chain(terms).chain(transient)
    }

    fn parts_mut(&mut self) -> impl Iterator<Item = &mut dyn EquationTerm> + '_ {
        let advection = self.advection.iter_mut().map(|t| -> &mut dyn EquationTerm { t });
        let diffusion = self.diffusion.iter_mut().map(|t| -> &mut dyn EquationTerm { t });
        let terms = self.terms.iter_mut().map(|t| -> &mut dyn EquationTerm { t.as_mut() });
        let transient = self.transient.iter_mut().map(|t| -> &mut dyn EquationTerm { t.as_mut() });
        advection.chain(diffusion).chain(terms).chain(transient)
    }

    /// 网格重建后通知所有部件
    pub fn grid_rebuilt(&mut self, grid: Arc<Grid>) -> KfResult<()> {
        for term in self.parts_mut() {
            let name = term.name().to_string();
            term.grid_rebuilt(Arc::clone(&grid))
                .map_err(|e| e.with_context(name, None, None))?;
        }
        for bc in &mut self.boundaries {
            let name = bc.name().to_string();
            bc.grid_rebuilt(Arc::clone(&grid))
                .map_err(|e| e.with_context(name, None, None))?;
        }
        self.grid = grid;
        Ok(())
    }

    /// 时间步开始时重建所有部件
    pub fn rebuild(&mut self, t: f64, dt: f64, unknowns: &dyn UnknownSource) -> KfResult<()> {
        for term in self.parts_mut() {
            if let Err(e) = term.rebuild(t, dt, unknowns) {
                return Err(e.with_context(term.name(), None, None));
            }
        }
        for bc in &mut self.boundaries {
            if let Err(e) = bc.rebuild(t, unknowns) {
                return Err(e.with_context(bc.name(), None, None));
            }
        }
        Ok(())
    }

    /// 写入矩阵形式，`rhs` 为该子方程的右端向量
    pub fn build_matrix(
        &self,
        matrix: &mut BlockMatrix,
        block: SubEquationId,
        mut rhs: Option<&mut [f64]>,
    ) -> KfResult<()> {
        for term in self.parts() {
            let mut view = matrix.view(block, block).map_err(in_block(term.name(), block))?;
            term.set_matrix_elements(&mut view, rhs.as_deref_mut())
                .map_err(in_block(term.name(), block))?;
        }
        matrix.partial_assemble();
        for bc in &self.boundaries {
            let mut rows = matrix.view_rows(block).map_err(in_block(bc.name(), block))?;
            bc.add_to_matrix_elements(&mut rows, rhs.as_deref_mut())
                .map_err(in_block(bc.name(), block))?;
        }
        Ok(())
    }

    /// `out += L x`
    pub fn build_vector(&self, block: SubEquationId, out: &mut [f64], x: &[f64]) -> KfResult<()> {
        for term in self.parts() {
            term.set_vector_elements(out, x)
                .map_err(|e| e.with_context(term.name(), Some(block.get()), None))?;
        }
        for bc in &self.boundaries {
            bc.add_to_vector_elements(out, x)
                .map_err(|e| e.with_context(bc.name(), Some(block.get()), None))?;
        }
        Ok(())
    }

    /// 写入 `∂(L x)/∂deriv` 到 Jacobian 矩阵的行块 `ctx.own_block`
    pub fn build_jacobian(&mut self, ctx: &JacobianContext<'_>, jac: &mut BlockMatrix) -> KfResult<()> {
        let block = ctx.own_block.get();
        for term in self.parts_mut() {
            let mut rows = jac.view_rows(ctx.own_block)?;
            if let Err(e) = term.set_jacobian_block(ctx, &mut rows) {
                return Err(e.with_context(term.name(), Some(block), None));
            }
        }
        for bc in &self.boundaries {
            let mut rows = jac.view_rows(ctx.own_block)?;
            bc.add_to_jacobian_block(ctx, &mut rows)
                .map_err(|e| e.with_context(bc.name(), Some(block), None))?;
        }
        Ok(())
    }
}

fn in_block(name: &str, block: SubEquationId) -> impl FnOnce(KfError) -> KfError + '_ {
    move |e| e.with_context(name, Some(block.get()), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::CoefficientFamily;
    use crate::grid::{MomentumGeometry, MomentumGrid, RadialGeometry, RadialGrid};
    use crate::terms::TransientTerm;
    use crate::unknowns::UnknownQuantityHandler;

    fn grid() -> Arc<Grid> {
        Arc::new(
            Grid::uniform(
                RadialGrid::uniform(2, 0.0, 1.0).unwrap(),
                MomentumGrid::uniform(3, (0.0, 1.0), 2, (-1.0, 1.0)).unwrap(),
                RadialGeometry::Slab,
                MomentumGeometry::Cartesian,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_matrix_plus_rhs_equals_vector() {
        let g = grid();
        let n = g.n_cells();
        let mut h = UnknownQuantityHandler::new();
        let f = h.insert("f", n, 1).unwrap();
        let prev: Vec<f64> = (0..n).map(|k| 0.5 + k as f64).collect();
        h.set_initial_value(f, Some(prev.as_slice()), 0.0).unwrap();

        let mut adv = AdvectionTerm::new("adv", g.clone(), 1).unwrap();
        adv.coefficients_mut().fill(CoefficientFamily::F1, 0.7).unwrap();
        adv.coefficients_mut().fill(CoefficientFamily::F2, -0.2).unwrap();
        let mut diff = DiffusionTerm::new("diff", g.clone()).unwrap();
        diff.coefficients_mut().fill(CoefficientFamily::D11, 0.3).unwrap();

        let mut op = Operator::new(g.clone());
        op.set_advection(adv);
        op.set_diffusion(diff);
        op.set_transient(Box::new(TransientTerm::new("df/dt", g.clone(), f)));
        op.rebuild(0.0, 0.1, &h).unwrap();
        assert_eq!(op.nnz_per_row(), 7 + 11 + 1);

        let mut m = BlockMatrix::new();
        let id = m.create_sub_equation("f", n, op.nnz_per_row()).unwrap();
        m.construct_system().unwrap();
        let mut rhs = vec![0.0; n];
        op.build_matrix(&mut m, id, Some(&mut rhs)).unwrap();
        assert_eq!(m.overflow_count(), 0);

        let x: Vec<f64> = (0..n).map(|k| (k as f64 * 0.7).cos()).collect();
        let mx = m.mul_vec(&x).unwrap();
        let mut v = vec![0.0; n];
        op.build_vector(id, &mut v, &x).unwrap();
        for k in 0..n {
            assert!((mx[k] + rhs[k] - v[k]).abs() < 1e-10, "row {}", k);
        }
    }

    #[test]
    fn test_errors_carry_term_and_block() {
        let g = grid();
        let mut h = UnknownQuantityHandler::new();
        let f = h.insert("f", g.n_cells(), 1).unwrap();
        let mut op = Operator::new(g.clone());
        op.set_transient(Box::new(TransientTerm::new("df/dt", g.clone(), f)));

        let mut m = BlockMatrix::new();
        let id = m.create_sub_equation("f", g.n_cells(), 1).unwrap();
        m.construct_system().unwrap();
        let err = op.build_matrix(&mut m, id, None).unwrap_err();
        match err {
            KfError::Assembly { term, block, .. } => {
                assert_eq!(term, "df/dt");
                assert_eq!(block, Some(0));
            }
            other => panic!("unexpected error: {other}"),
        }
        let err = op.build_matrix(&mut m, id, None).unwrap_err();
        assert!(matches!(err.root_cause(), KfError::NumericalDegeneracy { .. }));
    }
}
