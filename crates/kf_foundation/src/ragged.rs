// crates/kf_foundation/src/ragged.rs

//! 分层（锯齿）数组
//!
//! 每个半径拥有一段长度不同的连续数据，整体存放在一个扁平缓冲区中，
//! 通过一次性计算的偏移表按 `(半径, 片内索引)` 访问。
//!
//! # 所有权
//!
//! [`RaggedBuffer`] 区分两种所有权：
//!
//! - `Owned`: 由持有者独占分配与释放
//! - `Published`: 由持有者分配，但已把句柄交给其他组件读取
//! - `Shared`: 由外部组件拥有，持有者只保留共享句柄，不重新分配
//!
//! 共享缓冲区通过读写锁访问，一次装配遍历内持有读锁，
//! 外部修改只能发生在两次遍历之间。
//!
//! # 示例
//!
//! ```
//! use kf_foundation::ragged::{RaggedArray, RaggedLayout};
//!
//! let layout = RaggedLayout::from_sizes([3, 5, 2]);
//! let mut arr = RaggedArray::zeros(layout);
//! arr.set(1, 4, 2.5);
//! assert_eq!(arr.row(1).len(), 5);
//! assert_eq!(arr.get(1, 4), 2.5);
//! assert_eq!(arr.len(), 10);
//! ```

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut, Range};
use std::sync::Arc;

// =============================================================================
// 布局
// =============================================================================

/// 分层布局（偏移表）
///
/// `offsets` 长度为 `n_rows + 1`，第 r 行占据 `offsets[r]..offsets[r+1]`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaggedLayout {
    offsets: Vec<usize>,
}

impl RaggedLayout {
    /// 由每行长度构建布局
    pub fn from_sizes<I: IntoIterator<Item = usize>>(sizes: I) -> Self {
        let mut offsets = vec![0];
        let mut running = 0;
        for n in sizes {
            running += n;
            offsets.push(running);
        }
        Self { offsets }
    }

    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    /// 元素总数
    #[inline]
    pub fn total(&self) -> usize {
        self.offsets[self.n_rows()]
    }

    /// 第 r 行起始偏移
    #[inline]
    pub fn offset(&self, row: usize) -> usize {
        self.offsets[row]
    }

    /// 第 r 行长度
    #[inline]
    pub fn row_len(&self, row: usize) -> usize {
        self.offsets[row + 1] - self.offsets[row]
    }

    /// 第 r 行在扁平缓冲区中的范围
    #[inline]
    pub fn row_range(&self, row: usize) -> Range<usize> {
        self.offsets[row]..self.offsets[row + 1]
    }

    /// 所有行长度是否相同
    pub fn is_uniform(&self) -> bool {
        let n = self.n_rows();
        n == 0 || (1..n).all(|r| self.row_len(r) == self.row_len(0))
    }

    /// 每行长度
    pub fn sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.offsets.windows(2).map(|w| w[1] - w[0])
    }
}

// =============================================================================
// 分层数组
// =============================================================================

/// 扁平存储的分层数组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaggedArray {
    layout: RaggedLayout,
    data: Vec<f64>,
}

impl RaggedArray {
    /// 创建全零数组
    pub fn zeros(layout: RaggedLayout) -> Self {
        Self::filled(layout, 0.0)
    }

    /// 创建常数填充数组
    pub fn filled(layout: RaggedLayout, value: f64) -> Self {
        let data = vec![value; layout.total()];
        Self { layout, data }
    }

    /// 由逐行数据构建
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let layout = RaggedLayout::from_sizes(rows.iter().map(Vec::len));
        let data = rows.iter().flatten().copied().collect();
        Self { layout, data }
    }

    /// 布局
    #[inline]
    pub fn layout(&self) -> &RaggedLayout {
        &self.layout
    }

    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.layout.n_rows()
    }

    /// 元素总数
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 第 r 行
    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[self.layout.row_range(row)]
    }

    /// 第 r 行（可变）
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let range = self.layout.row_range(row);
        &mut self.data[range]
    }

    /// 读取元素
    #[inline]
    pub fn get(&self, row: usize, k: usize) -> f64 {
        self.row(row)[k]
    }

    /// 写入元素
    #[inline]
    pub fn set(&mut self, row: usize, k: usize, value: f64) {
        self.row_mut(row)[k] = value;
    }

    /// 累加元素
    #[inline]
    pub fn add(&mut self, row: usize, k: usize, value: f64) {
        self.row_mut(row)[k] += value;
    }

    /// 整体填充
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// 扁平数据
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// 扁平数据（可变）
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// 逐行迭代
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.n_rows()).map(move |r| self.row(r))
    }
}

// =============================================================================
// 所有权标记
// =============================================================================

/// 外部共享的分层数组句柄
pub type SharedRagged = Arc<RwLock<RaggedArray>>;

/// 带所有权标记的缓冲区
#[derive(Debug)]
pub enum RaggedBuffer {
    /// 独占
    Owned(RaggedArray),
    /// 自有，句柄已发布
    Published(SharedRagged),
    /// 外部拥有，仅持有句柄
    Shared(SharedRagged),
}

impl RaggedBuffer {
    /// 独占分配
    pub fn owned(layout: RaggedLayout) -> Self {
        Self::Owned(RaggedArray::zeros(layout))
    }

    /// 采用外部缓冲区
    pub fn shared(handle: SharedRagged) -> Self {
        Self::Shared(handle)
    }

    /// 是否为外部缓冲区
    #[inline]
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared(_))
    }

    /// 是否已发布句柄
    #[inline]
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published(_))
    }

    /// 只读访问
    pub fn read(&self) -> RaggedRef<'_> {
        match self {
            Self::Owned(arr) => RaggedRef::Owned(arr),
            Self::Published(handle) | Self::Shared(handle) => RaggedRef::Shared(handle.read()),
        }
    }

    /// 可写访问
    pub fn write(&mut self) -> RaggedMut<'_> {
        match self {
            Self::Owned(arr) => RaggedMut::Owned(arr),
            Self::Published(handle) | Self::Shared(handle) => RaggedMut::Shared(handle.write()),
        }
    }

    /// 取得共享句柄
    ///
    /// 独占缓冲区转为 `Published`，此后本对象与调用者共同持有数据。
    pub fn share(&mut self) -> SharedRagged {
        match self {
            Self::Published(handle) | Self::Shared(handle) => Arc::clone(handle),
            Self::Owned(arr) => {
                let handle = Arc::new(RwLock::new(std::mem::replace(
                    arr,
                    RaggedArray::zeros(RaggedLayout::from_sizes([])),
                )));
                *self = Self::Published(Arc::clone(&handle));
                handle
            }
        }
    }

    /// 按新布局重新分配并清零
    ///
    /// 已发布的缓冲区原地替换，持有句柄的组件看到新布局；外部缓冲区不变。
    pub fn reallocate(&mut self, layout: RaggedLayout) {
        match self {
            Self::Owned(arr) => *arr = RaggedArray::zeros(layout),
            Self::Published(handle) => *handle.write() = RaggedArray::zeros(layout),
            Self::Shared(_) => {}
        }
    }

    /// 当前布局
    pub fn layout(&self) -> RaggedLayout {
        self.read().layout().clone()
    }
}

/// 只读访问守卫
pub enum RaggedRef<'a> {
    /// 独占数据的引用
    Owned(&'a RaggedArray),
    /// 共享数据的读锁
    Shared(RwLockReadGuard<'a, RaggedArray>),
}

impl Deref for RaggedRef<'_> {
    type Target = RaggedArray;

    fn deref(&self) -> &RaggedArray {
        match self {
            Self::Owned(arr) => arr,
            Self::Shared(guard) => guard,
        }
    }
}

/// 可写访问守卫
pub enum RaggedMut<'a> {
    /// 独占数据的可变引用
    Owned(&'a mut RaggedArray),
    /// 共享数据的写锁
    Shared(RwLockWriteGuard<'a, RaggedArray>),
}

impl Deref for RaggedMut<'_> {
    type Target = RaggedArray;

    fn deref(&self) -> &RaggedArray {
        match self {
            Self::Owned(arr) => arr,
            Self::Shared(guard) => guard,
        }
    }
}

impl DerefMut for RaggedMut<'_> {
    fn deref_mut(&mut self) -> &mut RaggedArray {
        match self {
            Self::Owned(arr) => arr,
            Self::Shared(guard) => guard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_offsets() {
        let layout = RaggedLayout::from_sizes([2, 0, 4]);
        assert_eq!(layout.n_rows(), 3);
        assert_eq!(layout.total(), 6);
        assert_eq!(layout.row_range(2), 2..6);
        assert_eq!(layout.row_len(1), 0);
        assert!(!layout.is_uniform());
        assert!(RaggedLayout::from_sizes([3, 3]).is_uniform());
    }

    #[test]
    fn test_rows_are_contiguous() {
        let arr = RaggedArray::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0, 5.0]]);
        assert_eq!(arr.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(arr.row(1), &[3.0, 4.0, 5.0]);
        assert_eq!(arr.rows().count(), 2);
    }

    #[test]
    fn test_shared_buffer_sees_external_writes() {
        let handle: SharedRagged = Arc::new(RwLock::new(RaggedArray::zeros(
            RaggedLayout::from_sizes([2]),
        )));
        let buffer = RaggedBuffer::shared(Arc::clone(&handle));
        handle.write().set(0, 1, 7.0);
        assert!(buffer.is_shared());
        assert_eq!(buffer.read().get(0, 1), 7.0);
        drop(buffer);
        // 句柄在持有者释放后仍然有效
        assert_eq!(handle.read().get(0, 1), 7.0);
    }

    #[test]
    fn test_share_promotes_owned() {
        let mut buffer = RaggedBuffer::owned(RaggedLayout::from_sizes([3]));
        buffer.write().set(0, 2, 1.5);
        let handle = buffer.share();
        assert!(buffer.is_published());
        assert!(!buffer.is_shared());
        assert_eq!(handle.read().get(0, 2), 1.5);
        buffer.write().set(0, 0, -1.0);
        assert_eq!(handle.read().get(0, 0), -1.0);

        buffer.reallocate(RaggedLayout::from_sizes([2, 2]));
        assert_eq!(handle.read().len(), 4);
    }
}
