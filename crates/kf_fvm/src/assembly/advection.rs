// crates/kf_fvm/src/assembly/advection.rs

//! 对流通量装配
//!
//! 面通量 `Φ = A · Σ_k w_k f_{face-s+k}`，`w` 为面的插值模板。
//! 模板超出网格的单元直接跳过。

use super::{cell_row, ContributionSink, FacePair};
use crate::coefficients::{CoefficientFamily, CoefficientStore, InterpolationWeights};
use crate::grid::{Direction, Grid};
use kf_foundation::{KfError, KfResult};

/// 对流装配器
pub struct AdvectionAssembler<'a> {
    term: &'a str,
    grid: &'a Grid,
    coefficients: &'a CoefficientStore,
    weights: &'a InterpolationWeights,
}

impl<'a> AdvectionAssembler<'a> {
    /// 创建装配器
    pub fn new(
        term: &'a str,
        grid: &'a Grid,
        coefficients: &'a CoefficientStore,
        weights: &'a InterpolationWeights,
    ) -> Self {
        Self {
            term,
            grid,
            coefficients,
            weights,
        }
    }

    /// 每行非零元上限：三个方向各 `2s+1` 个单元，中心单元共用
    pub fn nnz_per_row(stencil_order: usize) -> usize {
        6 * stencil_order + 1
    }

    /// 输出全部内部面的贡献
    pub fn assemble<S: ContributionSink + ?Sized>(&self, sink: &mut S) -> KfResult<()> {
        for ir in 0..self.grid.nr() {
            self.assemble_radius(ir, sink)
                .map_err(|e| e.with_context(self.term, None, Some(ir)))?;
        }
        Ok(())
    }

    fn assemble_radius<S: ContributionSink + ?Sized>(&self, ir: usize, sink: &mut S) -> KfResult<()> {
        self.p1_faces(ir, sink)?;
        self.p2_faces(ir, sink)?;
        if ir > 0 {
            self.radial_face(ir, sink)?;
        }
        Ok(())
    }

    fn p1_faces<S: ContributionSink + ?Sized>(&self, ir: usize, sink: &mut S) -> KfResult<()> {
        let grid = self.grid;
        let m = grid.momentum(ir);
        let (n1, n2) = (m.n1(), m.n2());
        if n1 < 2 {
            return Ok(());
        }
        let s = self.weights.stencil_order();
        let width = self.weights.stencil_width();
        let offset = grid.offset(ir);

        let coeffs = self.coefficients.read(CoefficientFamily::F1)?;
        let stencil = self.weights.stencil(Direction::P1);
        let coeff = coeffs.row(ir);
        let st = stencil.row(ir);
        let vf = grid.vp_f1().row(ir);
        let vp = grid.vp().row(ir);
        let dp1 = m.dp1();

        for j in 0..n2 {
            for fi in 1..n1 {
                let face = j * (n1 + 1) + fi;
                let a = coeff[face];
                if a == 0.0 {
                    continue;
                }
                let l = m.index(fi - 1, j);
                let u = m.index(fi, j);
                let pair = FacePair::new(
                    offset + l,
                    (vp[l], dp1[fi - 1]),
                    offset + u,
                    (vp[u], dp1[fi]),
                )?;
                let flux = a * vf[face];
                for (k, &w) in st[face * width..(face + 1) * width].iter().enumerate() {
                    if fi + k < s || fi + k - s >= n1 {
                        continue;
                    }
                    let i = fi + k - s;
                    pair.emit(sink, cell_row(offset, n1, i, j), flux * w);
                }
            }
        }
        Ok(())
    }

    fn p2_faces<S: ContributionSink + ?Sized>(&self, ir: usize, sink: &mut S) -> KfResult<()> {
        let grid = self.grid;
        let m = grid.momentum(ir);
        let (n1, n2) = (m.n1(), m.n2());
        if n2 < 2 {
            log::trace!("{}: 半径 {} 的 p2 方向只有一个单元，跳过", self.term, ir);
            return Ok(());
        }
        let s = self.weights.stencil_order();
        let width = self.weights.stencil_width();
        let offset = grid.offset(ir);

        let coeffs = self.coefficients.read(CoefficientFamily::F2)?;
        let stencil = self.weights.stencil(Direction::P2);
        let coeff = coeffs.row(ir);
        let st = stencil.row(ir);
        let vf = grid.vp_f2().row(ir);
        let vp = grid.vp().row(ir);
        let dp2 = m.dp2();

        for fj in 1..n2 {
            for i in 0..n1 {
                let face = fj * n1 + i;
                let a = coeff[face];
                if a == 0.0 {
                    continue;
                }
                let l = m.index(i, fj - 1);
                let u = m.index(i, fj);
                let pair = FacePair::new(
                    offset + l,
                    (vp[l], dp2[fj - 1]),
                    offset + u,
                    (vp[u], dp2[fj]),
                )?;
                let flux = a * vf[face];
                for (k, &w) in st[face * width..(face + 1) * width].iter().enumerate() {
                    if fj + k < s || fj + k - s >= n2 {
                        continue;
                    }
                    let j = fj + k - s;
                    pair.emit(sink, cell_row(offset, n1, i, j), flux * w);
                }
            }
        }
        Ok(())
    }

    /// 半径 `ir_f - 1` 与 `ir_f` 之间的径向面
    fn radial_face<S: ContributionSink + ?Sized>(&self, ir_f: usize, sink: &mut S) -> KfResult<()> {
        let grid = self.grid;
        let nr = grid.nr();
        let s = self.weights.stencil_order();
        let width = self.weights.stencil_width();

        let coeffs = self.coefficients.read(CoefficientFamily::Fr)?;
        let coeff = coeffs.row(ir_f);
        if coeff.iter().all(|&a| a == 0.0) {
            return Ok(());
        }

        let lo = ir_f.saturating_sub(s);
        let hi = (ir_f + s).min(nr);
        for ir in lo..hi {
            grid.require_same_shape(ir, ir_f, "径向对流模板")?;
        }

        let stencil = self.weights.stencil(Direction::Radial);
        let st = stencil.row(ir_f);
        let vf = grid.vp_fr().row(ir_f);
        let vp_l = grid.vp().row(ir_f - 1);
        let vp_u = grid.vp().row(ir_f);
        let dr = grid.radial().dr();
        let (off_l, off_u) = (grid.offset(ir_f - 1), grid.offset(ir_f));

        for (c, &a) in coeff.iter().enumerate() {
            if a == 0.0 {
                continue;
            }
            let pair = FacePair::new(
                off_l + c,
                (vp_l[c], dr[ir_f - 1]),
                off_u + c,
                (vp_u[c], dr[ir_f]),
            )?;
            let flux = a * vf[c];
            for (k, &w) in st[c * width..(c + 1) * width].iter().enumerate() {
                if ir_f + k < s || ir_f + k - s >= nr {
                    continue;
                }
                let ir = ir_f + k - s;
                pair.emit(sink, grid.offset(ir) + c, flux * w);
            }
        }
        Ok(())
    }
}

/// 检查对流系数数组与网格一致
pub(crate) fn check_layout(grid: &Grid, coefficients: &CoefficientStore) -> KfResult<()> {
    for family in CoefficientFamily::ADVECTION {
        let expected = grid.face_layout(family.direction()).total();
        KfError::check_size(family.name(), expected, coefficients.read(family)?.len())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::InterpolationScheme;
    use crate::grid::{MomentumGeometry, MomentumGrid, RadialGeometry, RadialGrid};

    fn setup(nr: usize, n1: usize, n2: usize) -> (Grid, CoefficientStore, InterpolationWeights) {
        let grid = Grid::uniform(
            RadialGrid::uniform(nr, 0.0, 1.0).unwrap(),
            MomentumGrid::uniform(n1, (0.0, 1.0), n2, (-1.0, 1.0)).unwrap(),
            RadialGeometry::Slab,
            MomentumGeometry::Cartesian,
        )
        .unwrap();
        let mut store = CoefficientStore::advection();
        store.allocate(&grid).unwrap();
        let mut weights = InterpolationWeights::new(1).unwrap();
        weights.allocate(&grid).unwrap();
        (grid, store, weights)
    }

    fn dense(grid: &Grid, asm: &AdvectionAssembler<'_>) -> Vec<Vec<f64>> {
        let n = grid.n_cells();
        let mut m = vec![vec![0.0; n]; n];
        let mut sink = |r: usize, c: usize, v: f64| m[r][c] += v;
        asm.assemble(&mut sink).unwrap();
        m
    }

    #[test]
    fn test_upwind_single_off_diagonal() {
        let (grid, mut store, mut weights) = setup(1, 5, 1);
        store.fill(CoefficientFamily::F1, 2.0).unwrap();
        weights
            .apply_scheme(InterpolationScheme::Upwind, &store)
            .unwrap();
        let asm = AdvectionAssembler::new("adv", &grid, &store, &weights);
        let m = dense(&grid, &asm);
        let h = 0.2;
        for i in 1..5 {
            assert!((m[i][i - 1] - 2.0 / h).abs() < 1e-12);
            for k in 0..5 {
                if k != i && k != i - 1 {
                    assert_eq!(m[i][k], 0.0);
                }
            }
        }
    }

    #[test]
    fn test_columns_sum_to_zero() {
        let (grid, mut store, weights) = setup(3, 4, 3);
        store.fill(CoefficientFamily::F1, 1.5).unwrap();
        store.fill(CoefficientFamily::F2, -0.5).unwrap();
        store.fill(CoefficientFamily::Fr, 0.7).unwrap();
        let asm = AdvectionAssembler::new("adv", &grid, &store, &weights);
        let m = dense(&grid, &asm);
        let vol = grid.cell_volumes();
        for c in 0..grid.n_cells() {
            let total: f64 = (0..grid.n_cells()).map(|r| m[r][c] * vol[r]).sum();
            assert!(total.abs() < 1e-12, "列 {} 不守恒: {}", c, total);
        }
    }

    #[test]
    fn test_radial_requires_same_shape() {
        let (mut grid, _, _) = setup(2, 3, 1);
        grid.set_momentum_grid(
            1,
            std::sync::Arc::new(MomentumGrid::uniform(4, (0.0, 1.0), 1, (-1.0, 1.0)).unwrap()),
        )
        .unwrap();
        let mut store = CoefficientStore::advection();
        store.allocate(&grid).unwrap();
        store.fill(CoefficientFamily::Fr, 1.0).unwrap();
        let mut weights = InterpolationWeights::new(1).unwrap();
        weights.allocate(&grid).unwrap();
        let asm = AdvectionAssembler::new("adv", &grid, &store, &weights);
        let mut sink = |_: usize, _: usize, _: f64| {};
        let err = asm.assemble(&mut sink).unwrap_err();
        assert!(matches!(err.root_cause(), KfError::UnsupportedGrid { .. }));
    }
}
