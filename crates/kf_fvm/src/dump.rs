// crates/kf_fvm/src/dump.rs

//! 系数导出
//!
//! 每族系数导出为一个带维度的命名数组，维度顺序为
//! `[nr(+1), n2(+1), n1(+1)]`，面方向上的维度加一。数据按行主序排列，
//! 与系数存储的内部布局一致。

use crate::coefficients::{CoefficientFamily, CoefficientStore};
use crate::grid::{Direction, Grid};
use kf_foundation::{KfError, KfResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 一族系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpEntry {
    /// 系数族名称
    pub name: String,
    /// 维度 `[radius, p2, p1]`
    pub dims: [usize; 3],
    /// 扁平数据
    pub data: Vec<f64>,
}

/// 系数导出
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoefficientDump {
    /// 各族系数
    pub entries: Vec<DumpEntry>,
}

impl CoefficientDump {
    /// 创建空导出
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个系数存储中的所有族
    pub fn add_store(&mut self, grid: &Grid, store: &CoefficientStore) -> KfResult<()> {
        grid.require_uniform("系数导出")?;
        let m = grid.momentum(0);
        let (nr, n1, n2) = (grid.nr(), m.n1(), m.n2());

        for family in store.families() {
            let dims = match family.direction() {
                Direction::Radial => [nr + 1, n2, n1],
                Direction::P1 => [nr, n2, n1 + 1],
                Direction::P2 => [nr, n2 + 1, n1],
            };
            let data = store.read(family)?.as_slice().to_vec();
            KfError::check_size(family.name(), dims.iter().product(), data.len())?;
            self.entries.push(DumpEntry {
                name: family.name().to_string(),
                dims,
                data,
            });
        }
        Ok(())
    }

    /// 按名称查找
    pub fn get(&self, family: CoefficientFamily) -> Option<&DumpEntry> {
        self.entries.iter().find(|e| e.name == family.name())
    }

    /// 写入 JSON 文件
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> KfResult<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| KfError::serialization(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        log::debug!(
            "系数导出 {} 族到 {}",
            self.entries.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// 读取 JSON 文件
    pub fn read_json<P: AsRef<Path>>(path: P) -> KfResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| KfError::serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{MomentumGeometry, MomentumGrid, RadialGeometry, RadialGrid};
    use std::sync::Arc;

    #[test]
    fn test_dims_follow_face_direction() {
        let g = Grid::uniform(
            RadialGrid::uniform(2, 0.0, 1.0).unwrap(),
            MomentumGrid::uniform(3, (0.0, 1.0), 4, (-1.0, 1.0)).unwrap(),
            RadialGeometry::Slab,
            MomentumGeometry::Cartesian,
        )
        .unwrap();
        let mut store = CoefficientStore::advection();
        store.allocate(&g).unwrap();
        store.fill(CoefficientFamily::F1, 2.0).unwrap();

        let mut dump = CoefficientDump::new();
        dump.add_store(&g, &store).unwrap();
        assert_eq!(dump.get(CoefficientFamily::Fr).unwrap().dims, [3, 4, 3]);
        assert_eq!(dump.get(CoefficientFamily::F1).unwrap().dims, [2, 4, 4]);
        assert_eq!(dump.get(CoefficientFamily::F2).unwrap().dims, [2, 5, 3]);
        assert!(dump.get(CoefficientFamily::F1).unwrap().data.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_non_uniform_grid_is_rejected() {
        let radial = RadialGrid::uniform(2, 0.0, 1.0).unwrap();
        let grids = vec![
            Arc::new(MomentumGrid::uniform(2, (0.0, 1.0), 1, (-1.0, 1.0)).unwrap()),
            Arc::new(MomentumGrid::uniform(3, (0.0, 1.0), 1, (-1.0, 1.0)).unwrap()),
        ];
        let g = Grid::new(radial, grids, RadialGeometry::Slab, MomentumGeometry::Cartesian).unwrap();
        let mut store = CoefficientStore::diffusion();
        store.allocate(&g).unwrap();
        let err = CoefficientDump::new().add_store(&g, &store).unwrap_err();
        assert!(matches!(err, KfError::UnsupportedGrid { .. }));
    }
}
