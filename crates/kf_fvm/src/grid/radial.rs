// crates/kf_fvm/src/grid/radial.rs

//! 径向网格
//!
//! 存储 `nr + 1` 个面坐标及由此导出的单元中心、单元宽度与中心间距。

use kf_foundation::{ensure, KfError, KfResult};

/// 一维径向网格
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGrid {
    r: Vec<f64>,
    r_f: Vec<f64>,
    dr: Vec<f64>,
    dr_f: Vec<f64>,
}

impl RadialGrid {
    /// 均匀网格
    pub fn uniform(nr: usize, r_min: f64, r_max: f64) -> KfResult<Self> {
        ensure!(nr > 0, KfError::allocation("RadialGrid", "径向单元数为零"));
        let h = (r_max - r_min) / nr as f64;
        let faces = (0..=nr).map(|k| r_min + h * k as f64).collect();
        Self::from_faces(faces)
    }

    /// 由面坐标构建
    ///
    /// 面坐标必须严格递增，否则单元宽度为零或负。
    pub fn from_faces(r_f: Vec<f64>) -> KfResult<Self> {
        ensure!(
            r_f.len() >= 2,
            KfError::allocation("RadialGrid", "至少需要一个径向单元")
        );
        let (r, dr, dr_f) = derive_cells("dr", &r_f)?;
        Ok(Self { r, r_f, dr, dr_f })
    }

    /// 单元数
    #[inline]
    pub fn nr(&self) -> usize {
        self.r.len()
    }

    /// 单元中心
    #[inline]
    pub fn r(&self) -> &[f64] {
        &self.r
    }

    /// 面坐标（nr+1）
    #[inline]
    pub fn r_f(&self) -> &[f64] {
        &self.r_f
    }

    /// 单元宽度
    #[inline]
    pub fn dr(&self) -> &[f64] {
        &self.dr
    }

    /// 相邻单元中心间距（nr-1）
    #[inline]
    pub fn dr_f(&self) -> &[f64] {
        &self.dr_f
    }
}

/// 由面坐标导出中心、宽度与中心间距
pub(crate) fn derive_cells(
    name: &str,
    faces: &[f64],
) -> KfResult<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    for (k, w) in faces.windows(2).enumerate() {
        let width = w[1] - w[0];
        if !(width > 0.0) || !width.is_finite() {
            return Err(KfError::degeneracy(
                format!("{}[{}]", name, k),
                format!("面坐标 {} -> {} 非严格递增", w[0], w[1]),
            ));
        }
    }
    let centers: Vec<f64> = faces.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
    let widths = faces.windows(2).map(|w| w[1] - w[0]).collect();
    let distances = centers.windows(2).map(|w| w[1] - w[0]).collect();
    Ok((centers, widths, distances))
}
