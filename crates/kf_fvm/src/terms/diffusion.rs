// crates/kf_fvm/src/terms/diffusion.rs

//! 扩散项 `∇·(D ∇f)`，含两个动量方向间的交叉项

use super::jacobian::{add_coefficient_columns, DerivativeTarget, DifferentiationStore, JacobianContext};
use super::models::CoefficientModel;
use super::{check_unknown_size, check_vector_sizes, check_view_size, EquationTerm};
use crate::assembly::{diffusion, DiffusionAssembler, VectorSink};
use crate::block_matrix::{BlockView, RowBlockView};
use crate::coefficients::{CoefficientFamily, CoefficientStore};
use crate::grid::Grid;
use crate::unknowns::UnknownSource;
use kf_foundation::KfResult;
use std::sync::Arc;

/// 扩散项
pub struct DiffusionTerm {
    name: String,
    grid: Arc<Grid>,
    coefficients: CoefficientStore,
    model: Option<Box<dyn CoefficientModel>>,
    diff: DifferentiationStore,
}

impl DiffusionTerm {
    /// 创建并按网格分配系数
    pub fn new(name: impl Into<String>, grid: Arc<Grid>) -> KfResult<Self> {
        let mut coefficients = CoefficientStore::diffusion();
        coefficients.allocate(&grid)?;
        Ok(Self {
            name: name.into(),
            grid,
            coefficients,
            model: None,
            diff: DifferentiationStore::new(&CoefficientFamily::DIFFUSION, Vec::new()),
        })
    }

    /// 由模型在每次 `rebuild` 时计算系数
    pub fn with_model(mut self, model: Box<dyn CoefficientModel>) -> KfResult<Self> {
        self.diff = DifferentiationStore::new(&CoefficientFamily::DIFFUSION, model.derivative_targets());
        self.diff.allocate(&self.grid)?;
        self.model = Some(model);
        Ok(self)
    }

    /// 系数依赖的未知量
    pub fn derivative_targets(&self) -> &[DerivativeTarget] {
        self.diff.targets()
    }

    /// 网格
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// 系数
    pub fn coefficients(&self) -> &CoefficientStore {
        &self.coefficients
    }

    /// 可写系数
    pub fn coefficients_mut(&mut self) -> &mut CoefficientStore {
        &mut self.coefficients
    }

    fn assembler(&self) -> DiffusionAssembler<'_> {
        DiffusionAssembler::new(&self.name, &self.grid, &self.coefficients)
    }
}

impl EquationTerm for DiffusionTerm {
    fn name(&self) -> &str {
        &self.name
    }

    fn nnz_per_row(&self) -> usize {
        DiffusionAssembler::NNZ_PER_ROW
    }

    fn grid_rebuilt(&mut self, grid: Arc<Grid>) -> KfResult<()> {
        self.coefficients.allocate(&grid)?;
        self.diff.allocate(&grid)?;
        self.grid = grid;
        Ok(())
    }

    fn rebuild(&mut self, t: f64, _dt: f64, unknowns: &dyn UnknownSource) -> KfResult<()> {
        if let Some(model) = &self.model {
            self.coefficients.reset();
            model.evaluate(&self.grid, t, unknowns, &mut self.coefficients)?;
        }
        diffusion::check_layout(&self.grid, &self.coefficients)
    }

    fn set_matrix_elements(&self, view: &mut BlockView<'_>, _rhs: Option<&mut [f64]>) -> KfResult<()> {
        check_view_size(&self.grid, view)?;
        self.assembler().assemble(view)
    }

    fn set_vector_elements(&self, out: &mut [f64], x: &[f64]) -> KfResult<()> {
        check_vector_sizes(&self.grid, out, x)?;
        self.assembler().assemble(&mut VectorSink::new(out, x))
    }

    fn set_jacobian_block(&mut self, ctx: &JacobianContext<'_>, jac: &mut RowBlockView<'_>) -> KfResult<()> {
        if ctx.is_diagonal() && !self.coefficients.any_shared() {
            self.assembler().assemble(&mut jac.block(ctx.deriv_block)?)?;
        }
        let model = match &self.model {
            Some(m) => m.as_ref(),
            None => return Ok(()),
        };
        check_unknown_size(&self.grid, ctx.x)?;
        let (name, grid) = (&self.name, &self.grid);
        add_coefficient_columns(ctx, jac, grid, &mut self.diff, model, |coeffs, out| {
            DiffusionAssembler::new(name, grid, coeffs).assemble(&mut VectorSink::new(out, ctx.x))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{MomentumGeometry, MomentumGrid, RadialGeometry, RadialGrid};

    #[test]
    fn test_closed_system_conserves() {
        let g = Arc::new(
            Grid::uniform(
                RadialGrid::uniform(3, 0.0, 1.0).unwrap(),
                MomentumGrid::uniform(4, (0.0, 2.0), 3, (-1.0, 1.0)).unwrap(),
                RadialGeometry::Cylindrical,
                MomentumGeometry::SphericalPXi,
            )
            .unwrap(),
        );
        let mut term = DiffusionTerm::new("diff", g.clone()).unwrap();
        for (family, value) in [
            (CoefficientFamily::Drr, 0.4),
            (CoefficientFamily::D11, 1.0),
            (CoefficientFamily::D12, 0.2),
            (CoefficientFamily::D21, -0.1),
            (CoefficientFamily::D22, 0.6),
        ] {
            term.coefficients_mut().fill(family, value).unwrap();
        }
        let n = g.n_cells();
        let x: Vec<f64> = (0..n).map(|k| 1.0 + (k as f64).sin()).collect();
        let mut out = vec![0.0; n];
        term.set_vector_elements(&mut out, &x).unwrap();
        let vol = g.cell_volumes();
        let total: f64 = out.iter().zip(&vol).map(|(o, v)| o * v).sum();
        assert!(total.abs() < 1e-10, "total = {}", total);
    }
}
