// crates/kf_fvm/src/coefficients/store.rs

//! 通量系数存储
//!
//! 对流项持有 `Fr, F1, F2` 三族系数，扩散项持有 `Drr, D11, D12, D21, D22` 五族。
//! 每族是一个按半径分段的扁平数组，外层为半径，内层为该半径动量网格上的面索引。
//!
//! 系数族可以被外部组件共享：共享族只持有句柄，
//! 网格重建时不重新分配，仅检查布局是否匹配。

use crate::grid::{Direction, Grid};
use kf_foundation::ragged::{RaggedMut, RaggedRef};
use kf_foundation::{ensure, KfError, KfResult, RaggedBuffer, RaggedLayout, SharedRagged};
use serde::{Deserialize, Serialize};

/// 系数族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoefficientFamily {
    /// 径向对流
    Fr,
    /// 方向 1 对流
    F1,
    /// 方向 2 对流
    F2,
    /// 径向扩散
    Drr,
    /// 方向 1 扩散
    D11,
    /// 方向 1 面上对方向 2 导数的交叉扩散
    D12,
    /// 方向 2 面上对方向 1 导数的交叉扩散
    D21,
    /// 方向 2 扩散
    D22,
}

impl CoefficientFamily {
    /// 对流系数族
    pub const ADVECTION: [CoefficientFamily; 3] = [Self::Fr, Self::F1, Self::F2];

    /// 扩散系数族
    pub const DIFFUSION: [CoefficientFamily; 5] =
        [Self::Drr, Self::D11, Self::D12, Self::D21, Self::D22];

    /// 所在面的方向
    pub fn direction(self) -> Direction {
        match self {
            Self::Fr | Self::Drr => Direction::Radial,
            Self::F1 | Self::D11 | Self::D12 => Direction::P1,
            Self::F2 | Self::D21 | Self::D22 => Direction::P2,
        }
    }

    /// 名称
    pub fn name(self) -> &'static str {
        match self {
            Self::Fr => "Fr",
            Self::F1 => "F1",
            Self::F2 => "F2",
            Self::Drr => "Drr",
            Self::D11 => "D11",
            Self::D12 => "D12",
            Self::D21 => "D21",
            Self::D22 => "D22",
        }
    }
}

/// 一个方程项的系数存储
#[derive(Debug)]
pub struct CoefficientStore {
    families: Vec<(CoefficientFamily, RaggedBuffer)>,
    allocated: bool,
}

impl CoefficientStore {
    /// 创建未分配的存储
    pub fn new(families: &[CoefficientFamily]) -> Self {
        Self {
            families: families
                .iter()
                .map(|&f| (f, RaggedBuffer::owned(RaggedLayout::from_sizes([]))))
                .collect(),
            allocated: false,
        }
    }

    /// 对流系数存储
    pub fn advection() -> Self {
        Self::new(&CoefficientFamily::ADVECTION)
    }

    /// 扩散系数存储
    pub fn diffusion() -> Self {
        Self::new(&CoefficientFamily::DIFFUSION)
    }

    /// 包含的系数族
    pub fn families(&self) -> impl Iterator<Item = CoefficientFamily> + '_ {
        self.families.iter().map(|(f, _)| *f)
    }

    /// 是否已分配
    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    fn slot(&self, family: CoefficientFamily) -> KfResult<&RaggedBuffer> {
        self.families
            .iter()
            .find(|(f, _)| *f == family)
            .map(|(_, b)| b)
            .ok_or_else(|| KfError::invalid_input(format!("存储不包含系数族 {}", family.name())))
    }

    fn slot_mut(&mut self, family: CoefficientFamily) -> KfResult<&mut RaggedBuffer> {
        self.families
            .iter_mut()
            .find(|(f, _)| *f == family)
            .map(|(_, b)| b)
            .ok_or_else(|| KfError::invalid_input(format!("存储不包含系数族 {}", family.name())))
    }

    /// 按网格尺寸分配
    ///
    /// 自有族按面布局重新分配并清零（已发布的句柄同步看到新布局），外部族只检查布局。
    pub fn allocate(&mut self, grid: &Grid) -> KfResult<()> {
        ensure!(
            grid.nr() > 0,
            KfError::allocation("CoefficientStore", "径向单元数为零")
        );
        let mut total = 0;
        for (family, buffer) in &mut self.families {
            let layout = grid.face_layout(family.direction());
            total += layout.total();
            if buffer.is_shared() {
                let current = buffer.layout();
                if current != layout {
                    return Err(KfError::size_mismatch(
                        family.name(),
                        layout.total(),
                        current.total(),
                    ));
                }
            } else {
                buffer.reallocate(layout);
            }
        }
        self.allocated = true;
        log::debug!("系数存储分配完成: {} 族, 共 {} 个元素", self.families.len(), total);
        Ok(())
    }

    /// 采用外部缓冲区
    ///
    /// 原独占数据被释放。已分配时外部缓冲区布局必须一致。
    pub fn set_external(&mut self, family: CoefficientFamily, handle: SharedRagged) -> KfResult<()> {
        let allocated = self.allocated;
        let slot = self.slot_mut(family)?;
        if allocated {
            let expected = slot.layout();
            let actual = handle.read().layout().clone();
            if expected != actual {
                return Err(KfError::size_mismatch(
                    family.name(),
                    expected.total(),
                    actual.total(),
                ));
            }
        }
        *slot = RaggedBuffer::shared(handle);
        Ok(())
    }

    /// 取得共享句柄（独占族转为共享）
    pub fn share(&mut self, family: CoefficientFamily) -> KfResult<SharedRagged> {
        Ok(self.slot_mut(family)?.share())
    }

    /// 某族是否为外部缓冲区
    pub fn is_shared(&self, family: CoefficientFamily) -> bool {
        self.slot(family).map_or(false, RaggedBuffer::is_shared)
    }

    /// 是否存在外部缓冲区
    pub fn any_shared(&self) -> bool {
        self.families.iter().any(|(_, b)| b.is_shared())
    }

    /// 所有族清零（共享族同样清零）
    pub fn reset(&mut self) {
        for (_, buffer) in &mut self.families {
            buffer.write().fill(0.0);
        }
    }

    /// 释放独占内存，共享族不受影响
    pub fn release(&mut self) {
        for (_, buffer) in &mut self.families {
            if !buffer.is_shared() {
                *buffer = RaggedBuffer::owned(RaggedLayout::from_sizes([]));
            }
        }
        self.allocated = false;
    }

    /// 只读访问
    pub fn read(&self, family: CoefficientFamily) -> KfResult<RaggedRef<'_>> {
        Ok(self.slot(family)?.read())
    }

    /// 可写访问
    pub fn write(&mut self, family: CoefficientFamily) -> KfResult<RaggedMut<'_>> {
        Ok(self.slot_mut(family)?.write())
    }

    /// 整族填充常数
    pub fn fill(&mut self, family: CoefficientFamily, value: f64) -> KfResult<()> {
        self.write(family)?.fill(value);
        Ok(())
    }

    /// 所有族的元素都为零
    pub fn is_zero(&self) -> bool {
        self.families
            .iter()
            .all(|(_, b)| b.read().as_slice().iter().all(|&v| v == 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{MomentumGeometry, MomentumGrid, RadialGeometry, RadialGrid};
    use kf_foundation::RaggedArray;
    use parking_lot::RwLock;
    use std::sync::Arc;

    fn grid(nr: usize, n1: usize, n2: usize) -> Grid {
        Grid::uniform(
            RadialGrid::uniform(nr, 0.0, 1.0).unwrap(),
            MomentumGrid::uniform(n1, (0.0, 1.0), n2, (-1.0, 1.0)).unwrap(),
            RadialGeometry::Slab,
            MomentumGeometry::Cartesian,
        )
        .unwrap()
    }

    #[test]
    fn test_family_sizes() {
        let g = grid(3, 4, 2);
        let mut store = CoefficientStore::advection();
        store.allocate(&g).unwrap();
        // 径向族多一个外侧面
        assert_eq!(store.read(CoefficientFamily::Fr).unwrap().len(), 4 * 8);
        assert_eq!(store.read(CoefficientFamily::F1).unwrap().len(), 3 * 10);
        assert_eq!(store.read(CoefficientFamily::F2).unwrap().len(), 3 * 12);
        assert!(store.read(CoefficientFamily::D11).is_err());
    }

    #[test]
    fn test_external_buffer_is_not_reallocated() {
        let g = grid(2, 3, 1);
        let mut store = CoefficientStore::diffusion();
        store.allocate(&g).unwrap();

        let handle = Arc::new(RwLock::new(RaggedArray::filled(
            g.face_layout(Direction::P1),
            2.0,
        )));
        store.set_external(CoefficientFamily::D11, Arc::clone(&handle)).unwrap();
        assert!(store.is_shared(CoefficientFamily::D11));

        store.allocate(&g).unwrap();
        assert_eq!(store.read(CoefficientFamily::D11).unwrap().get(1, 2), 2.0);

        store.reset();
        assert_eq!(handle.read().get(1, 2), 0.0);

        store.release();
        assert!(store.is_shared(CoefficientFamily::D11));
        assert_eq!(Arc::strong_count(&handle), 2);
    }

    #[test]
    fn test_published_family_follows_owner() {
        let mut store = CoefficientStore::advection();
        store.allocate(&grid(2, 3, 1)).unwrap();
        let handle = store.share(CoefficientFamily::F1).unwrap();
        assert!(!store.is_shared(CoefficientFamily::F1));
        assert!(!store.any_shared());

        store.allocate(&grid(2, 5, 1)).unwrap();
        assert_eq!(handle.read().len(), 2 * 6);
        store.fill(CoefficientFamily::F1, 3.0).unwrap();
        assert_eq!(handle.read().get(1, 5), 3.0);
    }

    #[test]
    fn test_external_layout_mismatch() {
        let g = grid(2, 3, 1);
        let mut store = CoefficientStore::advection();
        store.allocate(&g).unwrap();
        let wrong = Arc::new(RwLock::new(RaggedArray::zeros(RaggedLayout::from_sizes([1]))));
        assert!(matches!(
            store.set_external(CoefficientFamily::F1, wrong),
            Err(KfError::SizeMismatch { .. })
        ));
    }
}
