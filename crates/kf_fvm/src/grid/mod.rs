// crates/kf_fvm/src/grid/mod.rs

//! 网格模块
//!
//! 径向 × 两个动量方向的结构化网格，每个半径可拥有不同分辨率的动量子网格。
//!
//! # 布局约定
//!
//! - 单元：每个半径 `n1 * n2` 个，半径 `ir` 的单元在未知量向量中从 `offset(ir)` 开始
//! - 径向面：`nr + 1` 行，每行 `n1 * n2` 个；最外层面沿用最后一个半径的动量网格
//! - 方向 1 面：每个半径 `(n1 + 1) * n2` 个
//! - 方向 2 面：每个半径 `n1 * (n2 + 1)` 个
//!
//! # 几何因子
//!
//! 体积雅可比分解为径向因子与动量因子之积 `V = Vr(r) · Vm(p1, p2)`，
//! 分别在单元中心与各方向的面上求值。

mod momentum;
mod radial;

pub use momentum::MomentumGrid;
pub use radial::RadialGrid;

use kf_foundation::validation::{check_positive, ValidationReport, ValidationWarning};
use kf_foundation::{ensure, KfError, KfResult, RaggedArray, RaggedLayout};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

// =============================================================================
// 方向与几何
// =============================================================================

/// 通量方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// 径向
    Radial,
    /// 动量方向 1
    P1,
    /// 动量方向 2
    P2,
}

impl Direction {
    /// 全部方向
    pub const ALL: [Direction; 3] = [Direction::Radial, Direction::P1, Direction::P2];

    /// 数组下标
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Direction::Radial => 0,
            Direction::P1 => 1,
            Direction::P2 => 2,
        }
    }
}

/// 径向几何
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RadialGeometry {
    /// 平板，`Vr = 1`
    #[default]
    Slab,
    /// 柱坐标，`Vr = r`
    Cylindrical,
}

impl RadialGeometry {
    #[inline]
    fn jacobian(self, r: f64) -> f64 {
        match self {
            RadialGeometry::Slab => 1.0,
            RadialGeometry::Cylindrical => r,
        }
    }
}

/// 动量空间几何
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MomentumGeometry {
    /// 笛卡尔，`Vm = 1`
    #[default]
    Cartesian,
    /// 球坐标 p-xi，`Vm = 2π p²`
    SphericalPXi,
}

impl MomentumGeometry {
    #[inline]
    fn jacobian(self, p1: f64, _p2: f64) -> f64 {
        match self {
            MomentumGeometry::Cartesian => 1.0,
            MomentumGeometry::SphericalPXi => 2.0 * PI * p1 * p1,
        }
    }
}

// =============================================================================
// 完整网格
// =============================================================================

/// 径向 × 动量网格及其几何因子
#[derive(Debug, Clone)]
pub struct Grid {
    radial: RadialGrid,
    momentum: Vec<Arc<MomentumGrid>>,
    radial_geometry: RadialGeometry,
    momentum_geometry: MomentumGeometry,
    cells: RaggedLayout,
    vp: RaggedArray,
    vp_fr: RaggedArray,
    vp_f1: RaggedArray,
    vp_f2: RaggedArray,
    vp_vol: Vec<f64>,
}

impl Grid {
    /// 由径向网格与逐半径动量网格构建
    pub fn new(
        radial: RadialGrid,
        momentum: Vec<Arc<MomentumGrid>>,
        radial_geometry: RadialGeometry,
        momentum_geometry: MomentumGeometry,
    ) -> KfResult<Self> {
        let nr = radial.nr();
        ensure!(nr > 0, KfError::allocation("Grid", "径向单元数为零"));
        KfError::check_size("momentum grids", nr, momentum.len())?;
        if radial_geometry == RadialGeometry::Cylindrical && radial.r_f()[0] < 0.0 {
            return Err(KfError::unsupported_grid("柱坐标径向网格不能包含负半径"));
        }

        let cells = RaggedLayout::from_sizes(momentum.iter().map(|m| m.n_cells()));
        let mut grid = Self {
            vp: RaggedArray::zeros(cells.clone()),
            vp_fr: RaggedArray::zeros(RaggedLayout::from_sizes([])),
            vp_f1: RaggedArray::zeros(RaggedLayout::from_sizes([])),
            vp_f2: RaggedArray::zeros(RaggedLayout::from_sizes([])),
            vp_vol: Vec::with_capacity(nr),
            radial,
            momentum,
            radial_geometry,
            momentum_geometry,
            cells,
        };
        grid.rebuild_jacobians();
        log::debug!(
            "网格构建完成: nr={}, 单元总数={}, 动量网格{}",
            nr,
            grid.n_cells(),
            if grid.is_uniform() { "一致" } else { "逐半径不同" }
        );
        Ok(grid)
    }

    /// 所有半径共享同一动量网格
    pub fn uniform(
        radial: RadialGrid,
        momentum: MomentumGrid,
        radial_geometry: RadialGeometry,
        momentum_geometry: MomentumGeometry,
    ) -> KfResult<Self> {
        let shared = Arc::new(momentum);
        let grids = vec![shared; radial.nr()];
        Self::new(radial, grids, radial_geometry, momentum_geometry)
    }

    /// 每个半径只有一个动量单元的流体网格
    pub fn fluid(radial: RadialGrid, radial_geometry: RadialGeometry) -> KfResult<Self> {
        let single = MomentumGrid::uniform(1, (0.0, 1.0), 1, (0.0, 1.0))?;
        Self::uniform(radial, single, radial_geometry, MomentumGeometry::Cartesian)
    }

    fn rebuild_jacobians(&mut self) {
        let nr = self.nr();
        let rg = self.radial_geometry;
        let mg = self.momentum_geometry;

        let mut vp_rows = Vec::with_capacity(nr);
        let mut f1_rows = Vec::with_capacity(nr);
        let mut f2_rows = Vec::with_capacity(nr);
        let mut fr_rows = Vec::with_capacity(nr + 1);
        self.vp_vol.clear();

        for ir in 0..nr {
            let m = &self.momentum[ir];
            let vr = rg.jacobian(self.radial.r()[ir]);
            self.vp_vol.push(vr);

            let mut cell = Vec::with_capacity(m.n_cells());
            let mut f2 = Vec::with_capacity(m.n1() * (m.n2() + 1));
            for &p2 in m.p2() {
                for &p1 in m.p1() {
                    cell.push(vr * mg.jacobian(p1, p2));
                }
            }
            for &p2 in m.p2_f() {
                for &p1 in m.p1() {
                    f2.push(vr * mg.jacobian(p1, p2));
                }
            }
            let mut f1 = Vec::with_capacity((m.n1() + 1) * m.n2());
            for &p2 in m.p2() {
                for &p1 in m.p1_f() {
                    f1.push(vr * mg.jacobian(p1, p2));
                }
            }
            vp_rows.push(cell);
            f1_rows.push(f1);
            f2_rows.push(f2);
        }

        for ir_f in 0..=nr {
            let m = &self.momentum[ir_f.min(nr - 1)];
            let vr = rg.jacobian(self.radial.r_f()[ir_f]);
            let mut row = Vec::with_capacity(m.n_cells());
            for &p2 in m.p2() {
                for &p1 in m.p1() {
                    row.push(vr * mg.jacobian(p1, p2));
                }
            }
            fr_rows.push(row);
        }

        self.vp = RaggedArray::from_rows(&vp_rows);
        self.vp_f1 = RaggedArray::from_rows(&f1_rows);
        self.vp_f2 = RaggedArray::from_rows(&f2_rows);
        self.vp_fr = RaggedArray::from_rows(&fr_rows);
    }

    /// 替换某个半径的动量网格并重建几何因子
    pub fn set_momentum_grid(&mut self, ir: usize, momentum: Arc<MomentumGrid>) -> KfResult<()> {
        KfError::check_index("Radius", ir, self.nr())?;
        self.momentum[ir] = momentum;
        self.cells = RaggedLayout::from_sizes(self.momentum.iter().map(|m| m.n_cells()));
        self.rebuild_jacobians();
        Ok(())
    }

    // =========================================================================
    // 尺寸
    // =========================================================================

    /// 径向单元数
    #[inline]
    pub fn nr(&self) -> usize {
        self.radial.nr()
    }

    /// 径向网格
    #[inline]
    pub fn radial(&self) -> &RadialGrid {
        &self.radial
    }

    /// 第 ir 个半径的动量网格
    #[inline]
    pub fn momentum(&self, ir: usize) -> &MomentumGrid {
        &self.momentum[ir]
    }

    /// 第 ir 个半径的动量网格句柄
    #[inline]
    pub fn momentum_arc(&self, ir: usize) -> Arc<MomentumGrid> {
        Arc::clone(&self.momentum[ir])
    }

    /// 方向 1 单元数
    #[inline]
    pub fn n1(&self, ir: usize) -> usize {
        self.momentum[ir].n1()
    }

    /// 方向 2 单元数
    #[inline]
    pub fn n2(&self, ir: usize) -> usize {
        self.momentum[ir].n2()
    }

    /// 单元总数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.cells.total()
    }

    /// 半径 ir 的第一个单元在未知量向量中的位置
    #[inline]
    pub fn offset(&self, ir: usize) -> usize {
        self.cells.offset(ir)
    }

    /// 单元布局
    #[inline]
    pub fn cell_layout(&self) -> &RaggedLayout {
        &self.cells
    }

    /// 某方向的面布局
    pub fn face_layout(&self, direction: Direction) -> RaggedLayout {
        let nr = self.nr();
        match direction {
            Direction::Radial => RaggedLayout::from_sizes(
                (0..=nr).map(|ir| self.momentum[ir.min(nr - 1)].n_cells()),
            ),
            Direction::P1 => {
                RaggedLayout::from_sizes(self.momentum.iter().map(|m| (m.n1() + 1) * m.n2()))
            }
            Direction::P2 => {
                RaggedLayout::from_sizes(self.momentum.iter().map(|m| m.n1() * (m.n2() + 1)))
            }
        }
    }

    /// 径向几何
    #[inline]
    pub fn radial_geometry(&self) -> RadialGeometry {
        self.radial_geometry
    }

    /// 动量几何
    #[inline]
    pub fn momentum_geometry(&self) -> MomentumGeometry {
        self.momentum_geometry
    }

    // =========================================================================
    // 几何因子
    // =========================================================================

    /// 单元中心雅可比
    #[inline]
    pub fn vp(&self) -> &RaggedArray {
        &self.vp
    }

    /// 径向面雅可比（nr+1 行）
    #[inline]
    pub fn vp_fr(&self) -> &RaggedArray {
        &self.vp_fr
    }

    /// 方向 1 面雅可比
    #[inline]
    pub fn vp_f1(&self) -> &RaggedArray {
        &self.vp_f1
    }

    /// 方向 2 面雅可比
    #[inline]
    pub fn vp_f2(&self) -> &RaggedArray {
        &self.vp_f2
    }

    /// 径向体积因子
    #[inline]
    pub fn vp_vol(&self) -> &[f64] {
        &self.vp_vol
    }

    /// 单元体积 `V · dr · dp1 · dp2`
    pub fn cell_volumes(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.n_cells());
        for ir in 0..self.nr() {
            let m = &self.momentum[ir];
            let dr = self.radial.dr()[ir];
            let vp = self.vp.row(ir);
            for j in 0..m.n2() {
                for i in 0..m.n1() {
                    out.push(vp[m.index(i, j)] * dr * m.dp1()[i] * m.dp2()[j]);
                }
            }
        }
        out
    }

    // =========================================================================
    // 一致性
    // =========================================================================

    /// 所有半径的动量网格尺寸是否相同
    pub fn is_uniform(&self) -> bool {
        self.momentum.iter().all(|m| m.same_shape(&self.momentum[0]))
    }

    /// 要求所有半径的动量网格尺寸相同
    pub fn require_uniform(&self, what: &str) -> KfResult<()> {
        match self.first_nonuniform_radius() {
            None => Ok(()),
            Some(ir) => Err(KfError::unsupported_grid(format!(
                "{} 要求所有半径动量网格一致，半径 {} 为 {}x{}，半径 0 为 {}x{}",
                what,
                ir,
                self.n1(ir),
                self.n2(ir),
                self.n1(0),
                self.n2(0)
            ))),
        }
    }

    /// 要求相邻两个半径的动量网格尺寸相同
    pub fn require_same_shape(&self, ir_a: usize, ir_b: usize, what: &str) -> KfResult<()> {
        if self.momentum[ir_a].same_shape(&self.momentum[ir_b]) {
            Ok(())
        } else {
            Err(KfError::unsupported_grid(format!(
                "{} 跨越半径 {} ({}x{}) 与 {} ({}x{})，动量网格尺寸不同",
                what,
                ir_a,
                self.n1(ir_a),
                self.n2(ir_a),
                ir_b,
                self.n1(ir_b),
                self.n2(ir_b)
            )))
        }
    }

    fn first_nonuniform_radius(&self) -> Option<usize> {
        self.momentum
            .iter()
            .position(|m| !m.same_shape(&self.momentum[0]))
    }

    /// 检查宽度与体积因子
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        for (ir, &dr) in self.radial.dr().iter().enumerate() {
            check_positive(&mut report, "dr", ir, dr);
        }
        for (k, &v) in self.vp.as_slice().iter().enumerate() {
            check_positive(&mut report, "Vp", k, v);
        }
        if let Some(ir) = self.first_nonuniform_radius() {
            report.add_warning(ValidationWarning::NonUniformGrid { radius: ir });
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(nr: usize, n1: usize, n2: usize) -> Grid {
        Grid::uniform(
            RadialGrid::uniform(nr, 0.0, 1.0).unwrap(),
            MomentumGrid::uniform(n1, (0.0, 1.0), n2, (-1.0, 1.0)).unwrap(),
            RadialGeometry::Slab,
            MomentumGeometry::Cartesian,
        )
        .unwrap()
    }

    #[test]
    fn test_face_layouts() {
        let g = uniform(3, 4, 2);
        assert_eq!(g.n_cells(), 24);
        assert_eq!(g.face_layout(Direction::Radial).n_rows(), 4);
        assert_eq!(g.face_layout(Direction::Radial).row_len(3), 8);
        assert_eq!(g.face_layout(Direction::P1).row_len(0), 10);
        assert_eq!(g.face_layout(Direction::P2).row_len(2), 12);
        assert_eq!(g.vp_fr().n_rows(), 4);
        assert_eq!(g.offset(2), 16);
    }

    #[test]
    fn test_per_radius_layout() {
        let radial = RadialGrid::uniform(2, 0.0, 1.0).unwrap();
        let a = Arc::new(MomentumGrid::uniform(3, (0.0, 1.0), 1, (-1.0, 1.0)).unwrap());
        let b = Arc::new(MomentumGrid::uniform(5, (0.0, 1.0), 2, (-1.0, 1.0)).unwrap());
        let g = Grid::new(
            radial,
            vec![a, b],
            RadialGeometry::Slab,
            MomentumGeometry::Cartesian,
        )
        .unwrap();
        assert_eq!(g.n_cells(), 13);
        assert_eq!(g.offset(1), 3);
        assert!(!g.is_uniform());
        // 外侧径向面沿用最后一个半径的网格
        assert_eq!(g.face_layout(Direction::Radial).row_len(2), 10);
        assert!(matches!(
            g.require_uniform("Fr"),
            Err(KfError::UnsupportedGrid { .. })
        ));
        assert!(g.validate().has_warnings());
    }

    #[test]
    fn test_spherical_jacobian_vanishes_at_origin() {
        let g = Grid::uniform(
            RadialGrid::uniform(1, 0.0, 1.0).unwrap(),
            MomentumGrid::uniform(4, (0.0, 2.0), 2, (-1.0, 1.0)).unwrap(),
            RadialGeometry::Cylindrical,
            MomentumGeometry::SphericalPXi,
        )
        .unwrap();
        assert_eq!(g.vp_f1().get(0, 0), 0.0);
        let p = g.momentum(0).p1()[1];
        let expected = 0.5 * 2.0 * PI * p * p;
        assert!((g.vp().get(0, 1) - expected).abs() < 1e-12);
        assert!(g.validate().is_valid());
    }

    #[test]
    fn test_cylindrical_rejects_negative_radius() {
        let err = Grid::uniform(
            RadialGrid::uniform(2, -1.0, 1.0).unwrap(),
            MomentumGrid::uniform(1, (0.0, 1.0), 1, (0.0, 1.0)).unwrap(),
            RadialGeometry::Cylindrical,
            MomentumGeometry::Cartesian,
        )
        .unwrap_err();
        assert!(matches!(err, KfError::UnsupportedGrid { .. }));
    }
}
