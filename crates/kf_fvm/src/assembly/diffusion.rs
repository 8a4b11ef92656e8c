// crates/kf_fvm/src/assembly/diffusion.rs

//! 扩散通量装配
//!
//! 面通量 `Φ = -(D_aa ∂f/∂a + D_ab ∂f/∂b)`：
//! - 主项 `D_aa` 用面两侧单元中心差分
//! - 交叉项 `D_ab` 在面两侧单元上分别取 `b` 方向中心差分再平均，
//!   `b` 方向网格边缘退化为单侧差分
//!
//! `b` 方向只有一个单元时交叉项为零。

use super::{cell_row, ContributionSink, FacePair};
use crate::coefficients::{CoefficientFamily, CoefficientStore};
use crate::grid::Grid;
use kf_foundation::{KfError, KfResult};

/// 扩散装配器
pub struct DiffusionAssembler<'a> {
    term: &'a str,
    grid: &'a Grid,
    coefficients: &'a CoefficientStore,
}

impl<'a> DiffusionAssembler<'a> {
    /// 每行非零元上限：动量面 3x3 模板加两个径向邻居
    pub const NNZ_PER_ROW: usize = 11;

    /// 创建装配器
    pub fn new(term: &'a str, grid: &'a Grid, coefficients: &'a CoefficientStore) -> Self {
        Self {
            term,
            grid,
            coefficients,
        }
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
        let offset = grid.offset(ir);
        let d11 = self.coefficients.read(CoefficientFamily::D11)?;
        let d12 = self.coefficients.read(CoefficientFamily::D12)?;
        let (d11, d12) = (d11.row(ir), d12.row(ir));
        let vf = grid.vp_f1().row(ir);
        let vp = grid.vp().row(ir);
        let (dp1, dp1_f, p2) = (m.dp1(), m.dp1_f(), m.p2());

        for j in 0..n2 {
            for fi in 1..n1 {
                let face = j * (n1 + 1) + fi;
                let (a, b) = (d11[face], d12[face]);
                if a == 0.0 && b == 0.0 {
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

                if a != 0.0 {
                    let g = a * vf[face] / dp1_f[fi - 1];
                    pair.emit(sink, offset + u, -g);
                    pair.emit(sink, offset + l, g);
                }

                if b != 0.0 && n2 > 1 {
                    let jp = (j + 1).min(n2 - 1);
                    let jm = j.saturating_sub(1);
                    let g = 0.5 * b * vf[face] / (p2[jp] - p2[jm]);
                    for i in [fi - 1, fi] {
                        pair.emit(sink, cell_row(offset, n1, i, jp), -g);
                        pair.emit(sink, cell_row(offset, n1, i, jm), g);
                    }
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
        let offset = grid.offset(ir);
        let d22 = self.coefficients.read(CoefficientFamily::D22)?;
        let d21 = self.coefficients.read(CoefficientFamily::D21)?;
        let (d22, d21) = (d22.row(ir), d21.row(ir));
        let vf = grid.vp_f2().row(ir);
        let vp = grid.vp().row(ir);
        let (dp2, dp2_f, p1) = (m.dp2(), m.dp2_f(), m.p1());

        for fj in 1..n2 {
            for i in 0..n1 {
                let face = fj * n1 + i;
                let (a, b) = (d22[face], d21[face]);
                if a == 0.0 && b == 0.0 {
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

                if a != 0.0 {
                    let g = a * vf[face] / dp2_f[fj - 1];
                    pair.emit(sink, offset + u, -g);
                    pair.emit(sink, offset + l, g);
                }

                if b != 0.0 && n1 > 1 {
                    let ip = (i + 1).min(n1 - 1);
                    let im = i.saturating_sub(1);
                    let g = 0.5 * b * vf[face] / (p1[ip] - p1[im]);
                    for j in [fj - 1, fj] {
                        pair.emit(sink, cell_row(offset, n1, ip, j), -g);
                        pair.emit(sink, cell_row(offset, n1, im, j), g);
                    }
                }
            }
        }
        Ok(())
    }

    fn radial_face<S: ContributionSink + ?Sized>(&self, ir_f: usize, sink: &mut S) -> KfResult<()> {
        let grid = self.grid;
        let drr = self.coefficients.read(CoefficientFamily::Drr)?;
        let drr = drr.row(ir_f);
        if drr.iter().all(|&d| d == 0.0) {
            return Ok(());
        }
        grid.require_same_shape(ir_f - 1, ir_f, "径向扩散")?;

        let vf = grid.vp_fr().row(ir_f);
        let vp_l = grid.vp().row(ir_f - 1);
        let vp_u = grid.vp().row(ir_f);
        let dr = grid.radial().dr();
        let distance = grid.radial().dr_f()[ir_f - 1];
        KfError::check_nonzero("dr_f", distance)?;
        let (off_l, off_u) = (grid.offset(ir_f - 1), grid.offset(ir_f));

        for (c, &d) in drr.iter().enumerate() {
            if d == 0.0 {
                continue;
            }
            let pair = FacePair::new(
                off_l + c,
                (vp_l[c], dr[ir_f - 1]),
                off_u + c,
                (vp_u[c], dr[ir_f]),
            )?;
            let g = d * vf[c] / distance;
            pair.emit(sink, off_u + c, -g);
            pair.emit(sink, off_l + c, g);
        }
        Ok(())
    }
}

/// 检查扩散系数数组与网格一致
pub(crate) fn check_layout(grid: &Grid, coefficients: &CoefficientStore) -> KfResult<()> {
    for family in CoefficientFamily::DIFFUSION {
        let expected = grid.face_layout(family.direction()).total();
        KfError::check_size(family.name(), expected, coefficients.read(family)?.len())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{MomentumGeometry, MomentumGrid, RadialGeometry, RadialGrid};

    fn dense(grid: &Grid, store: &CoefficientStore) -> Vec<Vec<f64>> {
        let n = grid.n_cells();
        let mut m = vec![vec![0.0; n]; n];
        let mut sink = |r: usize, c: usize, v: f64| m[r][c] += v;
        DiffusionAssembler::new("diff", grid, store)
            .assemble(&mut sink)
            .unwrap();
        m
    }

    fn grid(nr: usize, n1: usize, n2: usize, mg: MomentumGeometry) -> Grid {
        Grid::uniform(
            RadialGrid::uniform(nr, 0.0, 1.0).unwrap(),
            MomentumGrid::uniform(n1, (0.0, 1.0), n2, (-1.0, 1.0)).unwrap(),
            RadialGeometry::Slab,
            mg,
        )
        .unwrap()
    }

    #[test]
    fn test_second_difference_stencil() {
        let g = grid(1, 5, 1, MomentumGeometry::Cartesian);
        let mut store = CoefficientStore::diffusion();
        store.allocate(&g).unwrap();
        store.fill(CoefficientFamily::D11, 3.0).unwrap();
        let m = dense(&g, &store);
        let k = 3.0 / (0.2 * 0.2);
        for i in 1..4 {
            assert!((m[i][i - 1] - k).abs() < 1e-9);
            assert!((m[i][i] + 2.0 * k).abs() < 1e-9);
            assert!((m[i][i + 1] - k).abs() < 1e-9);
        }
        assert!((m[0][0] + k).abs() < 1e-9);
        assert!((m[4][4] + k).abs() < 1e-9);
    }

    #[test]
    fn test_cross_terms_conserve() {
        let g = grid(2, 4, 3, MomentumGeometry::SphericalPXi);
        let mut store = CoefficientStore::diffusion();
        store.allocate(&g).unwrap();
        store.fill(CoefficientFamily::D12, 0.3).unwrap();
        store.fill(CoefficientFamily::D21, -0.2).unwrap();
        store.fill(CoefficientFamily::Drr, 0.1).unwrap();
        let m = dense(&g, &store);
        let vol = g.cell_volumes();
        for c in 0..g.n_cells() {
            let total: f64 = (0..g.n_cells()).map(|r| m[r][c] * vol[r]).sum();
            assert!(total.abs() < 1e-12);
        }
        for row in &m {
            assert!(row.iter().filter(|&&v| v != 0.0).count() <= DiffusionAssembler::NNZ_PER_ROW);
        }
    }

    #[test]
    fn test_single_p2_cell_has_no_cross_term() {
        let g = grid(1, 4, 1, MomentumGeometry::Cartesian);
        let mut store = CoefficientStore::diffusion();
        store.allocate(&g).unwrap();
        store.fill(CoefficientFamily::D12, 1.0).unwrap();
        let m = dense(&g, &store);
        assert!(m.iter().flatten().all(|&v| v == 0.0));
    }
}
