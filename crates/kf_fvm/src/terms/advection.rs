// crates/kf_fvm/src/terms/advection.rs

//! 对流项 `-∇·(A f)`

use super::jacobian::{add_coefficient_columns, DerivativeTarget, DifferentiationStore, JacobianContext};
use super::models::CoefficientModel;
use super::{check_unknown_size, check_vector_sizes, check_view_size, EquationTerm};
use crate::assembly::{advection, AdvectionAssembler, VectorSink};
use crate::block_matrix::{BlockView, RowBlockView};
use crate::coefficients::{CoefficientFamily, CoefficientStore, InterpolationScheme, InterpolationWeights};
use crate::grid::Grid;
use crate::unknowns::UnknownSource;
use kf_foundation::KfResult;
use std::sync::Arc;

/// 对流项
pub struct AdvectionTerm {
    name: String,
    grid: Arc<Grid>,
    coefficients: CoefficientStore,
    weights: InterpolationWeights,
    scheme: Option<InterpolationScheme>,
    model: Option<Box<dyn CoefficientModel>>,
    diff: DifferentiationStore,
}

impl AdvectionTerm {
    /// 创建并按网格分配系数与权重
    pub fn new(name: impl Into<String>, grid: Arc<Grid>, stencil_order: usize) -> KfResult<Self> {
        let mut coefficients = CoefficientStore::advection();
        coefficients.allocate(&grid)?;
        let mut weights = InterpolationWeights::new(stencil_order)?;
        weights.allocate(&grid)?;
        Ok(Self {
            name: name.into(),
            grid,
            coefficients,
            weights,
            scheme: None,
            model: None,
            diff: DifferentiationStore::new(&CoefficientFamily::ADVECTION, Vec::new()),
        })
    }

    /// 由模型在每次 `rebuild` 时计算系数
    pub fn with_model(mut self, model: Box<dyn CoefficientModel>) -> KfResult<Self> {
        self.set_model(model)?;
        Ok(self)
    }

    /// 每次 `rebuild` 后按格式重置插值权重
    pub fn with_scheme(mut self, scheme: InterpolationScheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    /// 替换系数模型
    pub fn set_model(&mut self, model: Box<dyn CoefficientModel>) -> KfResult<()> {
        self.diff = DifferentiationStore::new(&CoefficientFamily::ADVECTION, model.derivative_targets());
        self.diff.allocate(&self.grid)?;
        self.model = Some(model);
        Ok(())
    }

    /// 系数依赖的未知量
    pub fn derivative_targets(&self) -> &[DerivativeTarget] {
        self.diff.targets()
    }

    /// 网格
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// 网格句柄
    pub fn grid_handle(&self) -> Arc<Grid> {
        Arc::clone(&self.grid)
    }

    /// 系数
    pub fn coefficients(&self) -> &CoefficientStore {
        &self.coefficients
    }

    /// 可写系数
    pub fn coefficients_mut(&mut self) -> &mut CoefficientStore {
        &mut self.coefficients
    }

    /// 插值权重
    pub fn weights(&self) -> &InterpolationWeights {
        &self.weights
    }

    /// 可写插值权重
    pub fn weights_mut(&mut self) -> &mut InterpolationWeights {
        &mut self.weights
    }

    fn assembler(&self) -> AdvectionAssembler<'_> {
        AdvectionAssembler::new(&self.name, &self.grid, &self.coefficients, &self.weights)
    }
}

impl EquationTerm for AdvectionTerm {
    fn name(&self) -> &str {
        &self.name
    }

    fn nnz_per_row(&self) -> usize {
        AdvectionAssembler::nnz_per_row(self.weights.stencil_order())
    }

    fn grid_rebuilt(&mut self, grid: Arc<Grid>) -> KfResult<()> {
        self.coefficients.allocate(&grid)?;
        self.weights.allocate(&grid)?;
        self.diff.allocate(&grid)?;
        self.grid = grid;
        log::debug!("{}: 网格重建，系数重新分配", self.name);
        Ok(())
    }

    fn rebuild(&mut self, t: f64, _dt: f64, unknowns: &dyn UnknownSource) -> KfResult<()> {
        if let Some(model) = &self.model {
            self.coefficients.reset();
            model.evaluate(&self.grid, t, unknowns, &mut self.coefficients)?;
        }
        advection::check_layout(&self.grid, &self.coefficients)?;
        if let Some(scheme) = self.scheme {
            self.weights.apply_scheme(scheme, &self.coefficients)?;
        }
        self.weights.check_bounds()
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
        let (name, grid, weights) = (&self.name, &self.grid, &self.weights);
        add_coefficient_columns(ctx, jac, grid, &mut self.diff, model, |coeffs, out| {
            AdvectionAssembler::new(name, grid, coeffs, weights).assemble(&mut VectorSink::new(out, ctx.x))
        })
    }
}
