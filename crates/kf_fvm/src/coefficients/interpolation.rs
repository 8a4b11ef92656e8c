// crates/kf_fvm/src/coefficients/interpolation.rs

//! 面插值权重
//!
//! 每个通量面持有一个最近邻权重 `δ ∈ [0,1]`，表示下侧单元（索引较小一侧）的份额，
//! 上侧单元份额为 `1-δ`。默认值 0.5 即中心差分。
//!
//! 宽模板权重每面存储 `2*s` 个值（`s` 为模板阶数），第 k 个值作用于
//! 单元 `face - s + k`。对流装配始终读取模板权重；修改最近邻权重时
//! 模板中心两项同步更新。

use super::store::{CoefficientFamily, CoefficientStore};
use crate::grid::{Direction, Grid};
use kf_foundation::ragged::RaggedRef;
use kf_foundation::{ensure, KfError, KfResult, RaggedBuffer, RaggedLayout, SharedRagged};
use serde::{Deserialize, Serialize};

/// 插值格式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InterpolationScheme {
    /// 中心差分（δ = 0.5）
    Central,
    /// 迎风：取流入侧单元
    Upwind,
    /// 顺风：取流出侧单元
    Downwind,
    /// 固定下侧份额
    Fixed(f64),
}

impl InterpolationScheme {
    /// 给定面通量系数时的下侧份额
    ///
    /// 系数为零时迎风与顺风都退化为中心差分。
    #[inline]
    pub fn lower_share(self, coefficient: f64) -> f64 {
        match self {
            Self::Central => 0.5,
            Self::Fixed(w) => w,
            Self::Upwind if coefficient > 0.0 => 1.0,
            Self::Upwind if coefficient < 0.0 => 0.0,
            Self::Downwind if coefficient > 0.0 => 0.0,
            Self::Downwind if coefficient < 0.0 => 1.0,
            Self::Upwind | Self::Downwind => 0.5,
        }
    }
}

impl Default for InterpolationScheme {
    fn default() -> Self {
        Self::Central
    }
}

/// 三个方向的插值权重
#[derive(Debug)]
pub struct InterpolationWeights {
    nearest: Vec<RaggedBuffer>,
    stencil: Vec<RaggedBuffer>,
    stencil_order: usize,
    allocated: bool,
}

impl InterpolationWeights {
    /// 默认最近邻权重
    pub const DEFAULT_WEIGHT: f64 = 0.5;

    /// 创建未分配的权重集合
    pub fn new(stencil_order: usize) -> KfResult<Self> {
        ensure!(
            stencil_order >= 1,
            KfError::invalid_input("插值模板阶数至少为 1")
        );
        let empty = || RaggedBuffer::owned(RaggedLayout::from_sizes([]));
        Ok(Self {
            nearest: (0..3).map(|_| empty()).collect(),
            stencil: (0..3).map(|_| empty()).collect(),
            stencil_order,
            allocated: false,
        })
    }

    /// 模板阶数
    #[inline]
    pub fn stencil_order(&self) -> usize {
        self.stencil_order
    }

    /// 每个面的模板宽度
    #[inline]
    pub fn stencil_width(&self) -> usize {
        2 * self.stencil_order
    }

    /// 是否已分配
    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// 按网格分配并写入默认值
    pub fn allocate(&mut self, grid: &Grid) -> KfResult<()> {
        for direction in Direction::ALL {
            let d = direction.index();
            let layout = grid.face_layout(direction);
            if self.nearest[d].is_shared() {
                let current = self.nearest[d].layout();
                if current != layout {
                    return Err(KfError::size_mismatch(
                        "interpolation weights",
                        layout.total(),
                        current.total(),
                    ));
                }
            } else {
                self.nearest[d].reallocate(layout);
                self.nearest[d].write().fill(Self::DEFAULT_WEIGHT);
            }
            self.rebuild_stencil(d);
        }
        self.allocated = true;
        log::debug!("插值权重分配完成: 模板阶数 {}", self.stencil_order);
        Ok(())
    }

    /// 由最近邻权重重建模板（非中心项清零）
    fn rebuild_stencil(&mut self, d: usize) {
        let width = self.stencil_width();
        let s = self.stencil_order;
        let nearest = self.nearest[d].read();
        let layout = RaggedLayout::from_sizes(nearest.layout().sizes().map(|n| n * width));
        let mut stencil = RaggedBuffer::owned(layout);
        {
            let mut st = stencil.write();
            let data = st.as_mut_slice();
            for (face, &w) in nearest.as_slice().iter().enumerate() {
                data[face * width + s - 1] = w;
                data[face * width + s] = 1.0 - w;
            }
        }
        drop(nearest);
        self.stencil[d] = stencil;
    }

    /// 由当前最近邻权重重建所有方向的模板
    ///
    /// 最近邻权重为外部缓冲区时，外部写入后需调用。
    pub fn sync_stencil(&mut self) {
        for d in 0..3 {
            self.rebuild_stencil(d);
        }
    }

    /// 最近邻权重（只读）
    pub fn nearest(&self, direction: Direction) -> RaggedRef<'_> {
        self.nearest[direction.index()].read()
    }

    /// 模板权重（只读），每面 `stencil_width()` 个
    pub fn stencil(&self, direction: Direction) -> RaggedRef<'_> {
        self.stencil[direction.index()].read()
    }

    /// 单个面的最近邻权重
    pub fn weight(&self, direction: Direction, ir: usize, face: usize) -> KfResult<f64> {
        let nearest = self.nearest(direction);
        KfError::check_index("Radius", ir, nearest.n_rows())?;
        KfError::check_index("Face", face, nearest.layout().row_len(ir))?;
        Ok(nearest.get(ir, face))
    }

    /// 单个面的 (下侧, 上侧) 份额
    pub fn shares(&self, direction: Direction, ir: usize, face: usize) -> KfResult<(f64, f64)> {
        let w = self.weight(direction, ir, face)?;
        Ok((w, 1.0 - w))
    }

    /// 设置单个面的最近邻权重
    pub fn set_weight(&mut self, direction: Direction, ir: usize, face: usize, w: f64) -> KfResult<()> {
        KfError::check_range("interpolation weight", w, 0.0, 1.0)?;
        let d = direction.index();
        {
            let mut nearest = self.nearest[d].write();
            KfError::check_index("Radius", ir, nearest.n_rows())?;
            KfError::check_index("Face", face, nearest.layout().row_len(ir))?;
            nearest.set(ir, face, w);
        }
        self.write_center(d, ir, face, w);
        Ok(())
    }

    fn write_center(&mut self, d: usize, ir: usize, face: usize, w: f64) {
        let width = self.stencil_width();
        let s = self.stencil_order;
        let mut st = self.stencil[d].write();
        let row = &mut st.row_mut(ir)[face * width..(face + 1) * width];
        row.fill(0.0);
        row[s - 1] = w;
        row[s] = 1.0 - w;
    }

    /// 设置单个面的完整模板
    ///
    /// 高阶模板允许负权重，但必须有限且总和为 1。
    pub fn set_stencil(
        &mut self,
        direction: Direction,
        ir: usize,
        face: usize,
        weights: &[f64],
    ) -> KfResult<()> {
        let width = self.stencil_width();
        KfError::check_size("stencil weights", width, weights.len())?;
        let sum: f64 = weights.iter().sum();
        ensure!(
            weights.iter().all(|w| w.is_finite()) && (sum - 1.0).abs() < 1e-12,
            KfError::invalid_input(format!("模板权重之和为 {}，应为 1", sum))
        );
        let mut st = self.stencil[direction.index()].write();
        KfError::check_index("Radius", ir, st.n_rows())?;
        KfError::check_index("Face", face, st.layout().row_len(ir) / width)?;
        st.row_mut(ir)[face * width..(face + 1) * width].copy_from_slice(weights);
        Ok(())
    }

    /// 按插值格式与对流系数重置所有权重
    pub fn apply_scheme(
        &mut self,
        scheme: InterpolationScheme,
        coefficients: &CoefficientStore,
    ) -> KfResult<()> {
        if let InterpolationScheme::Fixed(w) = scheme {
            KfError::check_range("interpolation weight", w, 0.0, 1.0)?;
        }
        for family in CoefficientFamily::ADVECTION {
            let d = family.direction().index();
            let coeffs = coefficients.read(family)?;
            {
                let mut nearest = self.nearest[d].write();
                KfError::check_size(family.name(), nearest.len(), coeffs.len())?;
                for (w, &c) in nearest.as_mut_slice().iter_mut().zip(coeffs.as_slice()) {
                    *w = scheme.lower_share(c);
                }
            }
            drop(coeffs);
            self.rebuild_stencil(d);
        }
        log::trace!("插值格式已应用: {:?}", scheme);
        Ok(())
    }

    /// 采用外部的最近邻权重缓冲区
    pub fn set_external(&mut self, direction: Direction, handle: SharedRagged) -> KfResult<()> {
        let d = direction.index();
        if self.allocated {
            let expected = self.nearest[d].layout();
            let actual = handle.read().layout().clone();
            if expected != actual {
                return Err(KfError::size_mismatch(
                    "interpolation weights",
                    expected.total(),
                    actual.total(),
                ));
            }
        }
        self.nearest[d] = RaggedBuffer::shared(handle);
        Ok(())
    }

    /// 取得最近邻权重的共享句柄
    pub fn share(&mut self, direction: Direction) -> SharedRagged {
        self.nearest[direction.index()].share()
    }

    /// 检查最近邻权重都在 `[0,1]` 内
    pub fn check_bounds(&self) -> KfResult<()> {
        for direction in Direction::ALL {
            for &w in self.nearest(direction).as_slice() {
                KfError::check_range("interpolation weight", w, 0.0, 1.0)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{MomentumGeometry, MomentumGrid, RadialGeometry, RadialGrid};

    fn grid() -> Grid {
        Grid::uniform(
            RadialGrid::uniform(2, 0.0, 1.0).unwrap(),
            MomentumGrid::uniform(4, (0.0, 1.0), 3, (-1.0, 1.0)).unwrap(),
            RadialGeometry::Slab,
            MomentumGeometry::Cartesian,
        )
        .unwrap()
    }

    #[test]
    fn test_default_is_central() {
        let g = grid();
        let mut w = InterpolationWeights::new(1).unwrap();
        w.allocate(&g).unwrap();
        for direction in Direction::ALL {
            assert!(w.nearest(direction).as_slice().iter().all(|&v| v == 0.5));
        }
        let (lo, hi) = w.shares(Direction::P1, 1, 3).unwrap();
        assert_eq!(lo + hi, 1.0);
    }

    #[test]
    fn test_upwind_follows_sign() {
        let g = grid();
        let mut store = CoefficientStore::advection();
        store.allocate(&g).unwrap();
        {
            let mut f1 = store.write(CoefficientFamily::F1).unwrap();
            f1.set(0, 1, 2.0);
            f1.set(0, 2, -2.0);
        }
        let mut w = InterpolationWeights::new(1).unwrap();
        w.allocate(&g).unwrap();
        w.apply_scheme(InterpolationScheme::Upwind, &store).unwrap();

        assert_eq!(w.weight(Direction::P1, 0, 1).unwrap(), 1.0);
        assert_eq!(w.weight(Direction::P1, 0, 2).unwrap(), 0.0);
        assert_eq!(w.weight(Direction::P1, 0, 3).unwrap(), 0.5);
        assert_eq!(&w.stencil(Direction::P1).row(0)[2..4], &[1.0, 0.0]);
        w.check_bounds().unwrap();
    }

    #[test]
    fn test_wide_stencil() {
        let g = grid();
        let mut w = InterpolationWeights::new(2).unwrap();
        w.allocate(&g).unwrap();
        assert_eq!(&w.stencil(Direction::P2).row(1)[0..4], &[0.0, 0.5, 0.5, 0.0]);

        w.set_stencil(Direction::P2, 1, 0, &[-0.125, 0.625, 0.625, -0.125])
            .unwrap();
        assert!(w
            .set_stencil(Direction::P2, 1, 0, &[0.5, 0.5, 0.5, 0.0])
            .is_err());
        assert!(w.set_weight(Direction::P2, 1, 0, 1.5).is_err());
    }
}
