// crates/kf_fvm/src/boundary/overlap.rs

//! 两组面坐标的重叠区间扫描
//!
//! 双指针同时遍历两组递增的面坐标，逐个给出正宽度的重叠子区间。
//! 哪一侧的当前区间先结束就推进哪一侧；两侧恰好在同一坐标结束时同时推进。

use kf_foundation::{ensure, KfError, KfResult};

/// 端点比较的相对容差
pub(crate) const ENDPOINT_TOLERANCE: f64 = 1e-12;

/// 一个重叠子区间
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlap {
    /// 下侧网格的单元索引
    pub lower: usize,
    /// 上侧网格的单元索引
    pub upper: usize,
    /// 重叠宽度
    pub width: f64,
}

/// 重叠扫描迭代器
#[derive(Debug, Clone)]
pub struct OverlapScan<'a> {
    lower: &'a [f64],
    upper: &'a [f64],
    j: usize,
    k: usize,
}

impl<'a> OverlapScan<'a> {
    /// 由两组面坐标创建，两组必须覆盖同一区间
    pub fn new(lower_faces: &'a [f64], upper_faces: &'a [f64]) -> KfResult<Self> {
        ensure!(
            lower_faces.len() >= 2 && upper_faces.len() >= 2,
            KfError::invalid_input("重叠扫描至少需要一个单元")
        );
        let (l0, l1) = (lower_faces[0], lower_faces[lower_faces.len() - 1]);
        let (u0, u1) = (upper_faces[0], upper_faces[upper_faces.len() - 1]);
        let tol = ENDPOINT_TOLERANCE * (l1 - l0).abs().max(u1 - u0).max(1.0);
        if (l0 - u0).abs() > tol || (l1 - u1).abs() > tol {
            return Err(KfError::unsupported_grid(format!(
                "两侧网格覆盖范围不同: [{}, {}] 与 [{}, {}]",
                l0, l1, u0, u1
            )));
        }
        Ok(Self {
            lower: lower_faces,
            upper: upper_faces,
            j: 0,
            k: 0,
        })
    }

    /// 每个下侧单元参与的重叠数
    pub fn counts_per_lower(self) -> Vec<usize> {
        let mut counts = vec![0; self.lower.len() - 1];
        for ov in self {
            counts[ov.lower] += 1;
        }
        counts
    }

    /// 每个上侧单元参与的重叠数
    pub fn counts_per_upper(self) -> Vec<usize> {
        let mut counts = vec![0; self.upper.len() - 1];
        for ov in self {
            counts[ov.upper] += 1;
        }
        counts
    }
}

impl Iterator for OverlapScan<'_> {
    type Item = Overlap;

    fn next(&mut self) -> Option<Overlap> {
        let (j, k) = (self.j, self.k);
        if j + 1 >= self.lower.len() || k + 1 >= self.upper.len() {
            return None;
        }
        let (l_end, u_end) = (self.lower[j + 1], self.upper[k + 1]);
        let width = overlap_width(self.lower[j], l_end, self.upper[k], u_end);

        if l_end == u_end {
            self.j += 1;
            self.k += 1;
        } else if u_end < l_end {
            self.k += 1;
        } else {
            self.j += 1;
        }
        Some(Overlap {
            lower: j,
            upper: k,
            width,
        })
    }
}

/// 区间 `[a0, a1]` 与 `[b0, b1]` 的重叠宽度，不相交时为非正值
#[inline]
pub fn overlap_width(a0: f64, a1: f64, b0: f64, b1: f64) -> f64 {
    a1.min(b1) - a0.max(b0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faces(n: usize, max: f64) -> Vec<f64> {
        (0..=n).map(|i| max * i as f64 / n as f64).collect()
    }

    #[test]
    fn test_equal_grids_pair_one_to_one() {
        let a = faces(4, 1.0);
        let pairs: Vec<_> = OverlapScan::new(&a, &a).unwrap().collect();
        assert_eq!(pairs.len(), 4);
        for (k, p) in pairs.iter().enumerate() {
            assert_eq!((p.lower, p.upper), (k, k));
            assert!((p.width - 0.25).abs() < 1e-15);
        }
    }

    #[test]
    fn test_tie_advances_both() {
        let lower = [0.0, 0.5, 1.0];
        let upper = [0.0, 0.25, 0.5, 0.75, 1.0];
        let pairs: Vec<_> = OverlapScan::new(&lower, &upper)
            .unwrap()
            .map(|p| (p.lower, p.upper))
            .collect();
        assert_eq!(pairs, vec![(0, 0), (0, 1), (1, 2), (1, 3)]);
        assert_eq!(
            OverlapScan::new(&lower, &upper).unwrap().counts_per_lower(),
            vec![2, 2]
        );
    }

    #[test]
    fn test_mismatched_range() {
        let err = OverlapScan::new(&[0.0, 1.0], &[0.0, 0.9]).unwrap_err();
        assert!(matches!(err, KfError::UnsupportedGrid { .. }));
    }

    #[test]
    fn test_seven_to_three_has_no_gaps() {
        let lower = faces(7, 2.0);
        let upper = faces(3, 2.0);
        let scan = OverlapScan::new(&lower, &upper).unwrap();
        let widths: Vec<f64> = scan.map(|p| p.width).collect();
        assert!(widths.iter().all(|&w| w > 0.0));
        // 7 + 3 - 1 个子区间（内部面不重合）
        assert_eq!(widths.len(), 9);
        assert!((widths.iter().sum::<f64>() - 2.0).abs() < 1e-14);
    }
}
