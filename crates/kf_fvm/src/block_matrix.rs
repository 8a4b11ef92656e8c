// crates/kf_fvm/src/block_matrix.rs

//! 分块稀疏矩阵
//!
//! 行列按子方程划分为连续区间，每个子方程对应一个未知量。
//! 写入通过短生命周期的视图完成：
//!
//! - [`BlockView`]: 固定 (行块, 列块)，坐标相对于两块的起点
//! - [`RowBlockView`]: 固定行块，列块逐次指定，用于 Jacobian 与边界条件
//!
//! 视图借用矩阵的可变引用，同一时刻只能存在一个。
//!
//! # 生命周期
//!
//! ```text
//! create_sub_equation × N → construct_system → (zero → 写入 → partial_assemble → 边界覆盖 → assemble)*
//! ```
//!
//! # 示例
//!
//! ```
//! use kf_fvm::block_matrix::{BlockMatrix, InsertMode};
//!
//! let mut m = BlockMatrix::new();
//! let f = m.create_sub_equation("f", 3, 3).unwrap();
//! let n = m.create_sub_equation("n", 1, 2).unwrap();
//! m.construct_system().unwrap();
//!
//! m.view(n, f).unwrap().set_element(0, 2, 1.5, InsertMode::Add);
//! assert_eq!(m.get(3, 2), 1.5);
//! ```

use crate::assembly::ContributionSink;
use crate::linear_algebra::CsrMatrix;
use kf_foundation::{ensure, KfError, KfResult};
use std::ops::Range;

/// 子方程编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubEquationId(pub usize);

impl SubEquationId {
    /// 原始编号
    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

/// 写入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// 覆盖
    Insert,
    /// 累加
    Add,
}

/// 已注册的子方程
#[derive(Debug, Clone)]
pub struct SubEquation {
    /// 名称
    pub name: String,
    /// 行数
    pub n: usize,
    /// 每行预留的非零元数
    pub nnz: usize,
    /// 在全局系统中的起始行
    pub offset: usize,
}

impl SubEquation {
    /// 全局行区间
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.n
    }
}

/// 分块稀疏矩阵
#[derive(Debug, Default)]
pub struct BlockMatrix {
    sub_equations: Vec<SubEquation>,
    next_subindex: usize,
    rows: Vec<Vec<(usize, f64)>>,
    capacity: Vec<usize>,
    constructed: bool,
    partially_assembled: bool,
    overflow_count: usize,
}

impl BlockMatrix {
    /// 创建空矩阵
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // 子方程
    // =========================================================================

    /// 注册 `n` 行的子方程，每行预留 `nnz` 个非零元
    pub fn create_sub_equation(
        &mut self,
        name: impl Into<String>,
        n: usize,
        nnz: usize,
    ) -> KfResult<SubEquationId> {
        let id = self.sub_equations.len();
        ensure!(
            !self.constructed,
            KfError::invalid_sub_equation(id, "系统已构建，不能再注册子方程")
        );
        ensure!(
            n > 0,
            KfError::invalid_sub_equation(id, "不支持零行子方程（有意限制）")
        );

        let name = name.into();
        log::debug!(
            "注册子方程 #{} '{}': 行 [{}, {}), nnz/行 = {}",
            id,
            name,
            self.next_subindex,
            self.next_subindex + n,
            nnz
        );
        self.sub_equations.push(SubEquation {
            name,
            n,
            nnz,
            offset: self.next_subindex,
        });
        self.next_subindex += n;
        Ok(SubEquationId(id))
    }

    /// 按已注册的子方程构建矩阵结构，只能调用一次
    pub fn construct_system(&mut self) -> KfResult<()> {
        ensure!(
            !self.constructed,
            KfError::invalid_input("construct_system 只能调用一次")
        );
        ensure!(
            !self.sub_equations.is_empty(),
            KfError::invalid_input("没有注册任何子方程")
        );

        let mut capacity = Vec::with_capacity(self.next_subindex);
        for eq in &self.sub_equations {
            capacity.extend(std::iter::repeat(eq.nnz).take(eq.n));
        }
        self.rows = capacity.iter().map(|&c| Vec::with_capacity(c)).collect();
        self.capacity = capacity;
        self.constructed = true;
        log::debug!(
            "块矩阵构建完成: {}x{}, 预留非零元 {}",
            self.next_subindex,
            self.next_subindex,
            self.capacity.iter().sum::<usize>()
        );
        Ok(())
    }

    /// 是否已构建
    #[inline]
    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// 已注册的行数总和
    #[inline]
    pub fn next_subindex(&self) -> usize {
        self.next_subindex
    }

    /// 全局维数
    #[inline]
    pub fn size(&self) -> usize {
        self.next_subindex
    }

    /// 子方程数量
    #[inline]
    pub fn n_sub_equations(&self) -> usize {
        self.sub_equations.len()
    }

    /// 所有子方程
    pub fn sub_equations(&self) -> &[SubEquation] {
        &self.sub_equations
    }

    /// 单个子方程
    pub fn sub_equation(&self, id: SubEquationId) -> KfResult<&SubEquation> {
        self.sub_equations
            .get(id.0)
            .ok_or_else(|| KfError::invalid_sub_equation(id.0, "未注册的子方程"))
    }

    /// 子方程起始行
    pub fn offset(&self, id: SubEquationId) -> KfResult<usize> {
        Ok(self.sub_equation(id)?.offset)
    }

    /// 超出预留容量的写入次数
    #[inline]
    pub fn overflow_count(&self) -> usize {
        self.overflow_count
    }

    // =========================================================================
    // 元素访问
    // =========================================================================

    fn require_constructed(&self) -> KfResult<()> {
        ensure!(
            self.constructed,
            KfError::invalid_input("块矩阵尚未调用 construct_system")
        );
        Ok(())
    }

    /// 全局坐标写入
    pub fn set_element(&mut self, row: usize, col: usize, value: f64, mode: InsertMode) -> KfResult<()> {
        self.require_constructed()?;
        KfError::check_index("Row", row, self.next_subindex)?;
        KfError::check_index("Column", col, self.next_subindex)?;
        self.write(row, col, value, mode);
        Ok(())
    }

    fn write(&mut self, row: usize, col: usize, value: f64, mode: InsertMode) {
        let entries = &mut self.rows[row];
        match entries.binary_search_by_key(&col, |&(c, _)| c) {
            Ok(k) => match mode {
                InsertMode::Insert => entries[k].1 = value,
                InsertMode::Add => entries[k].1 += value,
            },
            Err(k) => {
                if entries.len() >= self.capacity[row] {
                    if self.overflow_count == 0 {
                        log::warn!(
                            "第 {} 行非零元超出预留的 {} 个，矩阵将重新分配",
                            row,
                            self.capacity[row]
                        );
                    }
                    self.overflow_count += 1;
                }
                entries.insert(k, (col, value));
            }
        }
    }

    /// 全局坐标读取，不存在返回 0
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows
            .get(row)
            .and_then(|entries| {
                entries
                    .binary_search_by_key(&col, |&(c, _)| c)
                    .ok()
                    .map(|k| entries[k].1)
            })
            .unwrap_or(0.0)
    }

    /// 某行的 (列, 值)，按列升序
    pub fn row_entries(&self, row: usize) -> &[(usize, f64)] {
        self.rows.get(row).map_or(&[], Vec::as_slice)
    }

    /// 已存储的非零元数
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// y = A * x
    pub fn mul_vec(&self, x: &[f64]) -> KfResult<Vec<f64>> {
        KfError::check_size("x", self.next_subindex, x.len())?;
        Ok(self
            .rows
            .iter()
            .map(|entries| entries.iter().map(|&(c, v)| v * x[c]).sum())
            .collect())
    }

    // =========================================================================
    // 视图
    // =========================================================================

    /// (行块, 列块) 视图
    pub fn view(&mut self, row_block: SubEquationId, col_block: SubEquationId) -> KfResult<BlockView<'_>> {
        self.require_constructed()?;
        let rows = self.sub_equation(row_block)?.range();
        let cols = self.sub_equation(col_block)?.range();
        Ok(BlockView {
            matrix: self,
            rows,
            cols,
        })
    }

    /// 行块视图
    pub fn view_rows(&mut self, row_block: SubEquationId) -> KfResult<RowBlockView<'_>> {
        self.require_constructed()?;
        let rows = self.sub_equation(row_block)?.range();
        Ok(RowBlockView {
            matrix: self,
            block: row_block,
            rows,
        })
    }

    // =========================================================================
    // 整体操作
    // =========================================================================

    /// 清零所有元素
    pub fn zero(&mut self) {
        for entries in &mut self.rows {
            entries.clear();
        }
        self.partially_assembled = false;
    }

    /// 清除子方程的行与列，对角置 1
    pub fn zero_equation(&mut self, id: SubEquationId) -> KfResult<()> {
        self.require_constructed()?;
        let range = self.sub_equation(id)?.range();
        for (row, entries) in self.rows.iter_mut().enumerate() {
            if range.contains(&row) {
                entries.clear();
                entries.push((row, 1.0));
            } else {
                entries.retain(|&(c, _)| !range.contains(&c));
            }
        }
        log::trace!("子方程 #{} 已替换为单位行", id.0);
        Ok(())
    }

    /// 把子方程的行从 `A` 变换为 `I - dt·A`
    ///
    /// 只缩放该子方程的行，其他行不变。
    pub fn i_minus_dt_a(&mut self, id: SubEquationId, dt: f64) -> KfResult<()> {
        self.require_constructed()?;
        let range = self.sub_equation(id)?.range();
        for row in range.clone() {
            for entry in &mut self.rows[row] {
                entry.1 *= -dt;
            }
        }
        for row in range {
            self.write(row, row, 1.0, InsertMode::Add);
        }
        Ok(())
    }

    /// 主装配完成，之后的写入视为边界覆盖
    pub fn partial_assemble(&mut self) {
        self.partially_assembled = true;
        log::trace!("块矩阵部分装配: {} 个非零元", self.nnz());
    }

    /// 是否已部分装配
    #[inline]
    pub fn is_partially_assembled(&self) -> bool {
        self.partially_assembled
    }

    /// 导出 CSR 快照
    pub fn assemble(&mut self) -> KfResult<CsrMatrix> {
        self.require_constructed()?;
        let n = self.next_subindex;
        let nnz = self.nnz();
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        row_ptr.push(0);
        for entries in &self.rows {
            for &(c, v) in entries {
                col_idx.push(c);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }
        self.partially_assembled = false;
        if self.overflow_count > 0 {
            log::debug!("装配完成，累计 {} 次超出预留容量", self.overflow_count);
        }
        Ok(CsrMatrix::from_raw(n, n, row_ptr, col_idx, values))
    }
}

// =============================================================================
// 视图
// =============================================================================

/// (行块, 列块) 写入视图
pub struct BlockView<'a> {
    matrix: &'a mut BlockMatrix,
    rows: Range<usize>,
    cols: Range<usize>,
}

impl BlockView<'_> {
    /// 块内行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// 块内列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.cols.len()
    }

    /// 块内坐标写入
    ///
    /// # Panics
    /// 坐标超出块范围
    #[inline]
    pub fn set_element(&mut self, i: usize, j: usize, value: f64, mode: InsertMode) {
        assert!(i < self.rows.len(), "块内行索引越界");
        assert!(j < self.cols.len(), "块内列索引越界");
        self.matrix
            .write(self.rows.start + i, self.cols.start + j, value, mode);
    }

    /// 块内坐标读取
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix.get(self.rows.start + i, self.cols.start + j)
    }

    /// 全局偏移 (行, 列)
    pub fn offsets(&self) -> (usize, usize) {
        (self.rows.start, self.cols.start)
    }
}

impl ContributionSink for BlockView<'_> {
    #[inline]
    fn accumulate(&mut self, row: usize, col: usize, value: f64) {
        self.set_element(row, col, value, InsertMode::Add);
    }
}

/// 行块视图
pub struct RowBlockView<'a> {
    matrix: &'a mut BlockMatrix,
    block: SubEquationId,
    rows: Range<usize>,
}

impl RowBlockView<'_> {
    /// 行块编号
    #[inline]
    pub fn block_id(&self) -> SubEquationId {
        self.block
    }

    /// 行块行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// 在列块 `col_block` 内写入
    pub fn set_element(
        &mut self,
        col_block: SubEquationId,
        i: usize,
        j: usize,
        value: f64,
        mode: InsertMode,
    ) -> KfResult<()> {
        let cols = self.matrix.sub_equation(col_block)?.range();
        KfError::check_index("Row", i, self.rows.len())?;
        KfError::check_index("Column", j, cols.len())?;
        self.matrix
            .write(self.rows.start + i, cols.start + j, value, mode);
        Ok(())
    }

    /// 行块与列块的子视图
    pub fn block(&mut self, col_block: SubEquationId) -> KfResult<BlockView<'_>> {
        let cols = self.matrix.sub_equation(col_block)?.range();
        Ok(BlockView {
            matrix: &mut *self.matrix,
            rows: self.rows.clone(),
            cols,
        })
    }

    /// 读取行块内元素
    pub fn get(&self, col_block: SubEquationId, i: usize, j: usize) -> KfResult<f64> {
        let cols = self.matrix.sub_equation(col_block)?.range();
        Ok(self.matrix.get(self.rows.start + i, cols.start + j))
    }

    /// 某列块的起始列
    pub fn column_offset(&self, col_block: SubEquationId) -> KfResult<usize> {
        self.matrix.offset(col_block)
    }
}
