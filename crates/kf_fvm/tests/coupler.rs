// crates/kf_fvm/tests/coupler.rs

//! 跨网格耦合：三种目标的手算回归值、守恒、矩阵/向量一致与 Jacobian

use kf_fvm::block_matrix::{BlockMatrix, SubEquationId};
use kf_fvm::boundary::{BoundaryCondition, CouplingCoefficients, CouplingSide, CouplingTarget, CrossGridCoupler};
use kf_fvm::coefficients::CoefficientFamily;
use kf_fvm::grid::{Grid, MomentumGeometry, MomentumGrid, RadialGeometry, RadialGrid};
use kf_fvm::terms::{AdvectionTerm, DiffusionTerm, JacobianContext};
use kf_fvm::unknowns::{UnknownId, UnknownQuantityHandler};
use kf_foundation::KfError;
use std::sync::Arc;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

fn slab(n1: usize, p1: (f64, f64), n2: usize) -> Arc<Grid> {
    Arc::new(
        Grid::uniform(
            RadialGrid::uniform(1, 0.0, 1.0).unwrap(),
            MomentumGrid::uniform(n1, p1, n2, (-1.0, 1.0)).unwrap(),
            RadialGeometry::Slab,
            MomentumGeometry::Cartesian,
        )
        .unwrap(),
    )
}

/// 下侧 2×1 网格 p1∈(0,1)，上侧 2×2 网格 p1∈(1,2)
struct Setup {
    handler: UnknownQuantityHandler,
    matrix: BlockMatrix,
    f_lower: UnknownId,
    f_upper: UnknownId,
    lower_block: SubEquationId,
    upper_block: SubEquationId,
    density_block: SubEquationId,
    advection: AdvectionTerm,
    diffusion: DiffusionTerm,
    lower: Arc<Grid>,
    upper: Arc<Grid>,
}

impl Setup {
    fn new(d11: f64) -> Self {
        let lower = slab(2, (0.0, 1.0), 1);
        let upper = slab(2, (1.0, 2.0), 2);

        let mut handler = UnknownQuantityHandler::new();
        let f_lower = handler.insert("f_lower", lower.n_cells(), 1).unwrap();
        let f_upper = handler.insert("f_upper", upper.n_cells(), 1).unwrap();
        handler.set_initial_value(f_lower, Some(&[0.3, 1.7][..]), 0.0).unwrap();
        handler.set_initial_value(f_upper, Some(&[0.9, 0.2, 1.1, 0.4][..]), 0.0).unwrap();

        let mut matrix = BlockMatrix::new();
        let lower_block = matrix.create_sub_equation("f_lower", lower.n_cells(), 4).unwrap();
        let upper_block = matrix.create_sub_equation("f_upper", upper.n_cells(), 4).unwrap();
        let density_block = matrix.create_sub_equation("n", 1, 4).unwrap();
        matrix.construct_system().unwrap();

        let mut advection = AdvectionTerm::new("advection", lower.clone(), 1).unwrap();
        advection.coefficients_mut().fill(CoefficientFamily::F1, 2.0).unwrap();
        let mut diffusion = DiffusionTerm::new("diffusion", lower.clone()).unwrap();
        diffusion.coefficients_mut().fill(CoefficientFamily::D11, d11).unwrap();

        Self {
            handler,
            matrix,
            f_lower,
            f_upper,
            lower_block,
            upper_block,
            density_block,
            advection,
            diffusion,
            lower,
            upper,
        }
    }

    fn coupler(&mut self, target: CouplingTarget, with_diffusion: bool) -> CrossGridCoupler {
        let diffusion = if with_diffusion { Some(&mut self.diffusion) } else { None };
        let coefficients = CouplingCoefficients::from_terms(&mut self.advection, diffusion).unwrap();
        let mut c = CrossGridCoupler::new(
            "boundary",
            target,
            CouplingSide {
                unknown: self.f_lower,
                block: self.lower_block,
                grid: self.lower.clone(),
            },
            CouplingSide {
                unknown: self.f_upper,
                block: self.upper_block,
                grid: self.upper.clone(),
            },
            coefficients,
        )
        .unwrap();
        c.rebuild(0.0, &self.handler).unwrap();
        c
    }

    fn row_block(&self, target: CouplingTarget) -> SubEquationId {
        match target {
            CouplingTarget::Lower => self.lower_block,
            CouplingTarget::Upper => self.upper_block,
            CouplingTarget::Density => self.density_block,
        }
    }

    fn assemble(&mut self, c: &CrossGridCoupler) -> SubEquationId {
        let block = self.row_block(c.target());
        let mut rows = self.matrix.view_rows(block).unwrap();
        c.add_to_matrix_elements(&mut rows, None).unwrap();
        block
    }

    /// (行块, 列块) 内的元素
    fn get(&self, row_block: SubEquationId, i: usize, col_block: SubEquationId, j: usize) -> f64 {
        let r = self.matrix.offset(row_block).unwrap();
        let c = self.matrix.offset(col_block).unwrap();
        self.matrix.get(r + i, c + j)
    }
}

// =============================================================================
// 手算回归值
// =============================================================================

#[test]
fn test_lower_target_regression() {
    let mut s = Setup::new(0.0);
    let c = s.coupler(CouplingTarget::Lower, false);
    assert_eq!(c.nnz_per_row(), 3);
    let row = s.assemble(&c);

    assert!(approx_eq(s.get(row, 1, s.lower_block, 1), -2.0));
    assert!(approx_eq(s.get(row, 1, s.upper_block, 0), -0.5));
    assert!(approx_eq(s.get(row, 1, s.upper_block, 2), -0.5));
    assert_eq!(s.get(row, 0, s.lower_block, 0), 0.0);
    assert_eq!(s.get(row, 1, s.upper_block, 1), 0.0);
}

#[test]
fn test_lower_target_with_diffusion() {
    let mut s = Setup::new(1.0);
    let c = s.coupler(CouplingTarget::Lower, true);
    let row = s.assemble(&c);

    assert!(approx_eq(s.get(row, 1, s.lower_block, 1), -6.0));
    assert!(approx_eq(s.get(row, 1, s.upper_block, 0), 0.5));
    assert!(approx_eq(s.get(row, 1, s.upper_block, 2), 0.5));
}

#[test]
fn test_upper_target_regression() {
    let mut s = Setup::new(0.0);
    let c = s.coupler(CouplingTarget::Upper, false);
    let row = s.assemble(&c);

    for k in [0, 2] {
        assert!(approx_eq(s.get(row, k, s.lower_block, 1), 2.0));
        assert!(approx_eq(s.get(row, k, s.upper_block, k), 1.0));
    }
    for k in [1, 3] {
        assert_eq!(s.get(row, k, s.lower_block, 1), 0.0);
    }
}

#[test]
fn test_density_target_regression() {
    let mut s = Setup::new(0.0);
    let c = s.coupler(CouplingTarget::Density, false);
    assert_eq!(c.n_rows(), 1);
    let row = s.assemble(&c);

    assert!(approx_eq(s.get(row, 0, s.lower_block, 1), 2.0));
    assert!(approx_eq(s.get(row, 0, s.upper_block, 0), 0.5));
    assert!(approx_eq(s.get(row, 0, s.upper_block, 2), 0.5));
}

// =============================================================================
// 守恒与一致性
// =============================================================================

#[test]
fn test_lower_and_upper_targets_conserve() {
    let mut s = Setup::new(0.7);
    let lower = s.coupler(CouplingTarget::Lower, true);
    let upper = s.coupler(CouplingTarget::Upper, true);

    let mut out_l = vec![0.0; s.lower.n_cells()];
    lower.add_to_vector_elements(&mut out_l, &[0.0; 2]).unwrap();
    let mut out_u = vec![0.0; s.upper.n_cells()];
    upper.add_to_vector_elements(&mut out_u, &[0.0; 4]).unwrap();

    let total: f64 = out_l.iter().zip(s.lower.cell_volumes()).map(|(o, v)| o * v).sum::<f64>()
        + out_u.iter().zip(s.upper.cell_volumes()).map(|(o, v)| o * v).sum::<f64>();
    assert!(total.abs() < 1e-12, "total = {}", total);
}

#[test]
fn test_matrix_matches_vector_for_all_targets() {
    for target in [CouplingTarget::Lower, CouplingTarget::Upper, CouplingTarget::Density] {
        let mut s = Setup::new(0.4);
        let c = s.coupler(target, true);
        let row = s.assemble(&c);

        let mut x = vec![0.0; s.matrix.size()];
        let lo = s.matrix.offset(s.lower_block).unwrap();
        let uo = s.matrix.offset(s.upper_block).unwrap();
        x[lo..lo + 2].copy_from_slice(&[0.3, 1.7]);
        x[uo..uo + 4].copy_from_slice(&[0.9, 0.2, 1.1, 0.4]);
        let mx = s.matrix.mul_vec(&x).unwrap();

        let mut v = vec![0.0; c.n_rows()];
        c.add_to_vector_elements(&mut v, &[]).unwrap();
        let ro = s.matrix.offset(row).unwrap();
        for k in 0..c.n_rows() {
            assert!(approx_eq(mx[ro + k], v[k]), "{:?} row {}", target, k);
        }
    }
}

#[test]
fn test_jacobian_selects_derivative_side() {
    let mut s = Setup::new(1.0);
    let c = s.coupler(CouplingTarget::Lower, true);
    let x = [0.3, 1.7];
    let ctx = JacobianContext {
        uqty: s.f_lower,
        deriv: s.f_upper,
        own_block: s.lower_block,
        deriv_block: s.upper_block,
        t: 0.0,
        x: &x,
        unknowns: &s.handler,
    };
    {
        let mut rows = s.matrix.view_rows(s.lower_block).unwrap();
        c.add_to_jacobian_block(&ctx, &mut rows).unwrap();
    }
    assert!(approx_eq(s.get(s.lower_block, 1, s.upper_block, 0), 0.5));
    assert!(approx_eq(s.get(s.lower_block, 1, s.upper_block, 2), 0.5));
    assert_eq!(s.get(s.lower_block, 1, s.lower_block, 1), 0.0);
}

// =============================================================================
// 网格检查
// =============================================================================

#[test]
fn test_mismatched_p2_range_is_rejected() {
    let mut s = Setup::new(0.0);
    let coefficients = CouplingCoefficients::from_terms(&mut s.advection, None).unwrap();
    let narrow = Arc::new(
        Grid::uniform(
            RadialGrid::uniform(1, 0.0, 1.0).unwrap(),
            MomentumGrid::uniform(2, (1.0, 2.0), 2, (-1.0, 0.5)).unwrap(),
            RadialGeometry::Slab,
            MomentumGeometry::Cartesian,
        )
        .unwrap(),
    );
    let result = CrossGridCoupler::new(
        "boundary",
        CouplingTarget::Lower,
        CouplingSide {
            unknown: s.f_lower,
            block: s.lower_block,
            grid: s.lower.clone(),
        },
        CouplingSide {
            unknown: s.f_upper,
            block: s.upper_block,
            grid: narrow,
        },
        coefficients,
    );
    let err = match result {
        Ok(_) => panic!("mismatched grids accepted"),
        Err(e) => e,
    };
    assert!(matches!(err.root_cause(), KfError::UnsupportedGrid { .. }));
    assert!(err.to_string().contains("boundary"));
}

#[test]
fn test_gap_between_grids_is_rejected() {
    let mut s = Setup::new(0.0);
    let coefficients = CouplingCoefficients::from_terms(&mut s.advection, None).unwrap();
    let detached = slab(2, (5.0, 6.0), 2);
    let result = CrossGridCoupler::new(
        "boundary",
        CouplingTarget::Lower,
        CouplingSide {
            unknown: s.f_lower,
            block: s.lower_block,
            grid: s.lower.clone(),
        },
        CouplingSide {
            unknown: s.f_upper,
            block: s.upper_block,
            grid: detached,
        },
        coefficients,
    );
    let err = match result {
        Ok(_) => panic!("non-abutting grids accepted"),
        Err(e) => e,
    };
    assert!(matches!(err.root_cause(), KfError::UnsupportedGrid { .. }));
    assert!(err.to_string().contains("boundary"));
    assert!(err.root_cause().to_string().contains("p1"));
}
