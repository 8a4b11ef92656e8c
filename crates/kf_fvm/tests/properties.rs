// crates/kf_fvm/tests/properties.rs

//! 装配核心的整体性质：守恒、矩阵/向量一致、权重范围、子方程划分、
//! 瞬态变换与经典离散模板

use kf_fvm::block_matrix::BlockMatrix;
use kf_fvm::boundary::OverlapScan;
use kf_fvm::coefficients::{CoefficientFamily, CoefficientStore, InterpolationScheme, InterpolationWeights};
use kf_fvm::grid::{Direction, Grid, MomentumGeometry, MomentumGrid, RadialGeometry, RadialGrid};
use kf_fvm::linear_algebra::{BiCgStabSolver, IterativeSolver, JacobiPreconditioner, SolverConfig};
use kf_fvm::terms::{AdvectionTerm, DiffusionTerm, EquationTerm};
use kf_fvm::unknowns::UnknownQuantityHandler;
use kf_foundation::KfError;
use std::sync::Arc;

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol * (1.0 + a.abs().max(b.abs()))
}

fn kinetic_grid(nr: usize, n1: usize, n2: usize) -> Arc<Grid> {
    Arc::new(
        Grid::uniform(
            RadialGrid::uniform(nr, 0.1, 1.0).unwrap(),
            MomentumGrid::uniform(n1, (0.0, 3.0), n2, (-1.0, 1.0)).unwrap(),
            RadialGeometry::Cylindrical,
            MomentumGeometry::SphericalPXi,
        )
        .unwrap(),
    )
}

fn line_grid(n1: usize, p_max: f64) -> Arc<Grid> {
    Arc::new(
        Grid::uniform(
            RadialGrid::uniform(1, 0.0, 1.0).unwrap(),
            MomentumGrid::uniform(n1, (0.0, p_max), 1, (-1.0, 1.0)).unwrap(),
            RadialGeometry::Slab,
            MomentumGeometry::Cartesian,
        )
        .unwrap(),
    )
}

/// 非均匀的确定性测试场
fn field(n: usize, phase: f64) -> Vec<f64> {
    (0..n).map(|k| (k as f64 * 0.37 + phase).sin() + 0.1 * k as f64).collect()
}

fn fill_varying(store: &mut CoefficientStore, family: CoefficientFamily, phase: f64) {
    let mut buf = store.write(family).unwrap();
    let values = field(buf.len(), phase);
    buf.as_mut_slice().copy_from_slice(&values);
}

fn advection(grid: &Arc<Grid>) -> AdvectionTerm {
    let mut term = AdvectionTerm::new("advection", grid.clone(), 1).unwrap();
    for (k, family) in CoefficientFamily::ADVECTION.into_iter().enumerate() {
        fill_varying(term.coefficients_mut(), family, k as f64);
    }
    term
}

/// 二阶模板，三个方向的每个面都写入非平凡权重，边界附近由装配截断
fn wide_advection(grid: &Arc<Grid>) -> AdvectionTerm {
    let mut term = AdvectionTerm::new("wide advection", grid.clone(), 2).unwrap();
    for (k, family) in CoefficientFamily::ADVECTION.into_iter().enumerate() {
        fill_varying(term.coefficients_mut(), family, 0.7 + k as f64);
    }
    let stencils = [
        [-0.125, 0.625, 0.625, -0.125],
        [0.0, 0.25, 0.75, 0.0],
        [0.1, 0.6, 0.4, -0.1],
    ];
    for direction in Direction::ALL {
        let layout = grid.face_layout(direction);
        for ir in 0..layout.n_rows() {
            for face in 0..layout.row_len(ir) {
                let weights = &stencils[(ir + face) % stencils.len()];
                term.weights_mut().set_stencil(direction, ir, face, weights).unwrap();
            }
        }
    }
    term
}

fn diffusion(grid: &Arc<Grid>) -> DiffusionTerm {
    let mut term = DiffusionTerm::new("diffusion", grid.clone()).unwrap();
    for (k, family) in CoefficientFamily::DIFFUSION.into_iter().enumerate() {
        fill_varying(term.coefficients_mut(), family, 0.5 * k as f64);
    }
    term
}

fn matrix_for(term: &dyn EquationTerm, n: usize) -> BlockMatrix {
    let mut m = BlockMatrix::new();
    let id = m.create_sub_equation("f", n, term.nnz_per_row()).unwrap();
    m.construct_system().unwrap();
    term.set_matrix_elements(&mut m.view(id, id).unwrap(), None).unwrap();
    m
}

// =============================================================================
// 守恒
// =============================================================================

#[test]
fn test_closed_system_conserves_particles() {
    let grid = kinetic_grid(4, 5, 3);
    let n = grid.n_cells();
    let volumes = grid.cell_volumes();
    let x = field(n, 0.3);

    let terms: Vec<Box<dyn EquationTerm>> = vec![
        Box::new(advection(&grid)),
        Box::new(wide_advection(&grid)),
        Box::new(diffusion(&grid)),
    ];
    for term in &terms {
        let mut out = vec![0.0; n];
        term.set_vector_elements(&mut out, &x).unwrap();
        let total: f64 = out.iter().zip(&volumes).map(|(o, v)| o * v).sum();
        let scale: f64 = out.iter().zip(&volumes).map(|(o, v)| (o * v).abs()).sum();
        assert!(total.abs() <= 1e-12 * scale.max(1.0), "{}: {}", term.name(), total);
    }
}

// =============================================================================
// 矩阵/向量一致
// =============================================================================

#[test]
fn test_matrix_form_matches_vector_form() {
    let grid = kinetic_grid(3, 4, 4);
    let n = grid.n_cells();
    let x = field(n, 1.1);

    let mut adv = advection(&grid);
    adv.weights_mut().set_weight(Direction::P1, 1, 6, 0.9).unwrap();
    adv.weights_mut().set_weight(Direction::Radial, 2, 3, 0.0).unwrap();

    let terms: Vec<Box<dyn EquationTerm>> = vec![
        Box::new(adv),
        Box::new(wide_advection(&grid)),
        Box::new(diffusion(&grid)),
    ];
    for term in &terms {
        let m = matrix_for(term.as_ref(), n);
        assert_eq!(m.overflow_count(), 0, "{}", term.name());
        let mx = m.mul_vec(&x).unwrap();
        let mut v = vec![0.0; n];
        term.set_vector_elements(&mut v, &x).unwrap();
        for k in 0..n {
            assert!(approx_eq(mx[k], v[k], 1e-12), "{} row {}: {} vs {}", term.name(), k, mx[k], v[k]);
        }
    }
}

#[test]
fn test_undersized_block_fails_like_vector_form() {
    let grid = kinetic_grid(2, 3, 1);
    let n = grid.n_cells();
    let x = field(n, 0.4);

    let mut m = BlockMatrix::new();
    let id = m.create_sub_equation("f", n / 2, 13).unwrap();
    m.construct_system().unwrap();

    let terms: Vec<Box<dyn EquationTerm>> = vec![
        Box::new(advection(&grid)),
        Box::new(wide_advection(&grid)),
        Box::new(diffusion(&grid)),
    ];
    for term in &terms {
        let err = term
            .set_matrix_elements(&mut m.view(id, id).unwrap(), None)
            .unwrap_err();
        assert!(matches!(err.root_cause(), KfError::SizeMismatch { .. }), "{}: {}", term.name(), err);

        let mut out = vec![0.0; n / 2];
        let err = term.set_vector_elements(&mut out, &x).unwrap_err();
        assert!(matches!(err.root_cause(), KfError::SizeMismatch { .. }), "{}: {}", term.name(), err);
    }
    assert_eq!(m.overflow_count(), 0);
}

// =============================================================================
// 插值权重
// =============================================================================

#[test]
fn test_interpolation_weight_bounds() {
    let grid = kinetic_grid(2, 3, 2);
    let mut w = InterpolationWeights::new(2).unwrap();
    w.allocate(&grid).unwrap();

    for d in Direction::ALL {
        assert!(w.nearest(d).as_slice().iter().all(|&v| v == InterpolationWeights::DEFAULT_WEIGHT));
    }
    let (lower, upper) = w.shares(Direction::P2, 1, 4).unwrap();
    assert_eq!(lower + upper, 1.0);

    assert!(w.set_weight(Direction::P1, 0, 1, 1.5).is_err());
    assert!(w.set_weight(Direction::P1, 0, 1, -0.1).is_err());
    w.set_weight(Direction::P1, 0, 1, 0.3).unwrap();
    let (lower, upper) = w.shares(Direction::P1, 0, 1).unwrap();
    assert_eq!((lower, lower + upper), (0.3, 1.0));

    let mut adv = advection(&grid).with_scheme(InterpolationScheme::Upwind);
    adv.rebuild(0.0, 0.0, &UnknownQuantityHandler::new()).unwrap();
    for d in Direction::ALL {
        assert!(adv.weights().nearest(d).as_slice().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}

// =============================================================================
// 子方程划分
// =============================================================================

#[test]
fn test_sub_equation_partition() {
    let mut m = BlockMatrix::new();
    let sizes = [7, 1, 12, 3];
    let ids: Vec<_> = sizes
        .iter()
        .enumerate()
        .map(|(k, &n)| m.create_sub_equation(format!("q{}", k), n, 2).unwrap())
        .collect();
    m.construct_system().unwrap();

    assert_eq!(m.next_subindex(), sizes.iter().sum::<usize>());
    let mut covered = vec![0usize; m.next_subindex()];
    for id in &ids {
        for row in m.sub_equation(*id).unwrap().range() {
            covered[row] += 1;
        }
    }
    assert!(covered.iter().all(|&c| c == 1));
}

// =============================================================================
// I - dt·A
// =============================================================================

#[test]
fn test_zero_dt_transient_returns_rhs() {
    let grid = kinetic_grid(2, 4, 3);
    let n = grid.n_cells();
    let term = diffusion(&grid);

    let mut m = BlockMatrix::new();
    let id = m.create_sub_equation("f", n, term.nnz_per_row() + 1).unwrap();
    m.construct_system().unwrap();
    term.set_matrix_elements(&mut m.view(id, id).unwrap(), None).unwrap();
    m.i_minus_dt_a(id, 0.0).unwrap();
    let a = m.assemble().unwrap();

    let b = field(n, 2.0);
    let mut x = vec![0.0; n];
    let precond = JacobiPreconditioner::from_matrix(&a);
    let result = BiCgStabSolver::new(SolverConfig::new(1e-12, 50)).solve(&a, &b, &mut x, &precond);
    assert!(result.is_converged());
    for k in 0..n {
        assert!(approx_eq(x[k], b[k], 1e-10));
    }
}

// =============================================================================
// 重叠扫描完整性
// =============================================================================

#[test]
fn test_overlap_widths_cover_range() {
    let faces = |n: usize, max: f64| -> Vec<f64> { (0..=n).map(|i| max * i as f64 / n as f64).collect() };
    let x_max = 2.0;
    for (a, b) in [(5, 5), (8, 4), (7, 3)] {
        let (lower, upper) = (faces(a, x_max), faces(b, x_max));
        let total: f64 = OverlapScan::new(&lower, &upper).unwrap().map(|o| o.width).sum();
        assert!(approx_eq(total, x_max, 1e-14), "{}:{} -> {}", a, b, total);
        assert!(OverlapScan::new(&lower, &upper).unwrap().all(|o| o.width > 0.0));
    }
}

// =============================================================================
// 经典模板
// =============================================================================

#[test]
fn test_uniform_1d_diffusion_stencil() {
    let (n1, d) = (5, 0.8);
    let grid = line_grid(n1, 1.0);
    let h = 1.0 / n1 as f64;
    let mut term = DiffusionTerm::new("diffusion", grid).unwrap();
    term.coefficients_mut().fill(CoefficientFamily::D11, d).unwrap();

    let m = matrix_for(&term, n1);
    let c = d / (h * h);
    for i in 1..n1 - 1 {
        assert!(approx_eq(m.get(i, i - 1), c, 1e-12));
        assert!(approx_eq(m.get(i, i), -2.0 * c, 1e-12));
        assert!(approx_eq(m.get(i, i + 1), c, 1e-12));
        assert_eq!(m.row_entries(i).len(), 3);
    }
    // 两端为零通量
    assert!(approx_eq(m.get(0, 0), -c, 1e-12));
    assert!(approx_eq(m.get(n1 - 1, n1 - 1), -c, 1e-12));
}

#[test]
fn test_full_upwind_advection() {
    let (n1, v) = (6, 1.3);
    let grid = line_grid(n1, 3.0);
    let h = 3.0 / n1 as f64;
    let mut term = AdvectionTerm::new("advection", grid, 1)
        .unwrap()
        .with_scheme(InterpolationScheme::Fixed(1.0));
    term.coefficients_mut().fill(CoefficientFamily::F1, v).unwrap();
    term.rebuild(0.0, 0.0, &UnknownQuantityHandler::new()).unwrap();

    let m = matrix_for(&term, n1);
    for i in 1..n1 - 1 {
        let off_diagonal: Vec<_> = m.row_entries(i).iter().filter(|&&(c, _)| c != i).copied().collect();
        assert_eq!(off_diagonal.len(), 1, "row {}", i);
        let (col, value) = off_diagonal[0];
        assert_eq!(col, i - 1);
        assert!(approx_eq(value, v / h, 1e-12));
        assert!(approx_eq(m.get(i, i), -v / h, 1e-12));
    }
}
