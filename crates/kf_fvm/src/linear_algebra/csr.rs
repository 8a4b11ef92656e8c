// crates/kf_fvm/src/linear_algebra/csr.rs

//! 压缩稀疏行（CSR）矩阵格式
//!
//! 块矩阵装配完成后导出的只读快照，用于矩阵-向量乘法与迭代求解。
//!
//! # 特性开关
//!
//! - `parallel`: 启用基于 `rayon` 的并行矩阵-向量乘法
//!
//! # 格式说明
//!
//! - `row_ptr`: 行指针，长度 n_rows + 1
//! - `col_idx`: 列索引，每行内升序
//! - `values`: 非零元值

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// =============================================================================
// 稀疏模式
// =============================================================================

/// CSR 矩阵的稀疏模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrPattern {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

impl CsrPattern {
    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// 第 row 行的列索引
    #[inline]
    pub fn row_indices(&self, row: usize) -> &[usize] {
        &self.col_idx[self.row_ptr[row]..self.row_ptr[row + 1]]
    }

    /// 查找 (row, col) 对应的值索引
    pub fn find_index(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_ptr[row];
        self.row_indices(row)
            .binary_search(&col)
            .ok()
            .map(|local| start + local)
    }
}

// =============================================================================
// CSR 矩阵
// =============================================================================

/// CSR 格式稀疏矩阵
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    pattern: CsrPattern,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// 从原始 CSR 数据创建矩阵
    ///
    /// `row_ptr` 长度为 `n_rows + 1` 且末尾等于 `col_idx.len()`，每行列索引升序。
    pub fn from_raw(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(row_ptr.len(), n_rows + 1, "row_ptr 长度必须为 n_rows + 1");
        debug_assert_eq!(col_idx.len(), values.len(), "col_idx 和 values 长度必须相等");
        debug_assert_eq!(row_ptr[n_rows], col_idx.len(), "row_ptr 末尾必须等于 nnz");

        Self {
            pattern: CsrPattern {
                n_rows,
                n_cols,
                row_ptr,
                col_idx,
            },
            values,
        }
    }

    /// 单位矩阵
    pub fn identity(n: usize) -> Self {
        Self::from_raw(n, n, (0..=n).collect(), (0..n).collect(), vec![1.0; n])
    }

    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.pattern.n_rows()
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.pattern.n_cols()
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 稀疏模式
    #[inline]
    pub fn pattern(&self) -> &CsrPattern {
        &self.pattern
    }

    /// 值切片
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// (row, col) 位置的值，不存在返回 0
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.pattern
            .find_index(row, col)
            .map_or(0.0, |idx| self.values[idx])
    }

    /// 第 row 行的 (列, 值)
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.pattern.row_ptr[row]..self.pattern.row_ptr[row + 1];
        self.pattern.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// 提取对角线
    pub fn extract_diagonal(&self) -> Vec<f64> {
        (0..self.n_rows()).map(|i| self.get(i, i)).collect()
    }

    /// y = A * x
    ///
    /// # Panics
    /// - `x.len() != self.n_cols()`
    /// - `y.len() != self.n_rows()`
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        for (row, out) in y.iter_mut().enumerate() {
            *out = self.row_dot(row, x);
        }
    }

    /// y += alpha * A * x
    pub fn mul_vec_add(&self, alpha: f64, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        for (row, out) in y.iter_mut().enumerate() {
            *out += alpha * self.row_dot(row, x);
        }
    }

    /// 并行 y = A * x（需启用 `parallel` 特性）
    #[cfg(feature = "parallel")]
    pub fn mul_vec_parallel(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        y.par_iter_mut()
            .enumerate()
            .for_each(|(row, out)| *out = self.row_dot(row, x));
    }

    #[inline]
    fn row_dot(&self, row: usize, x: &[f64]) -> f64 {
        let start = self.pattern.row_ptr[row];
        let end = self.pattern.row_ptr[row + 1];
        let mut sum = 0.0;
        for idx in start..end {
            sum += self.values[idx] * x[self.pattern.col_idx[idx]];
        }
        sum
    }

    /// 无穷范数（最大行绝对值和）
    pub fn infinity_norm(&self) -> f64 {
        (0..self.n_rows())
            .map(|row| self.row(row).map(|(_, v)| v.abs()).sum::<f64>())
            .fold(0.0, f64::max)
    }
}
