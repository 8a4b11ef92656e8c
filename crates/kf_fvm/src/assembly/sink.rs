// crates/kf_fvm/src/assembly/sink.rs

//! 贡献接收器
//!
//! 装配器只通过 [`ContributionSink::accumulate`] 输出 `(行, 列, 系数)`，
//! 矩阵路径把系数写入矩阵，向量路径把 `系数 * x[列]` 累加到输出向量。
//! 两条路径共用同一份面通量公式。

/// 装配贡献接收器
pub trait ContributionSink {
    /// 累加一个贡献，行列均为子方程内的局部索引
    fn accumulate(&mut self, row: usize, col: usize, value: f64);
}

impl<F> ContributionSink for F
where
    F: FnMut(usize, usize, f64),
{
    #[inline]
    fn accumulate(&mut self, row: usize, col: usize, value: f64) {
        self(row, col, value)
    }
}

/// 向量形式接收器：`out[row] += value * x[col]`
pub struct VectorSink<'a> {
    out: &'a mut [f64],
    x: &'a [f64],
}

impl<'a> VectorSink<'a> {
    /// 创建向量接收器
    pub fn new(out: &'a mut [f64], x: &'a [f64]) -> Self {
        Self { out, x }
    }
}

impl ContributionSink for VectorSink<'_> {
    #[inline]
    fn accumulate(&mut self, row: usize, col: usize, value: f64) {
        self.out[row] += value * self.x[col];
    }
}

/// 缩放包装：所有贡献乘以固定因子
pub struct ScaledSink<'a, S: ContributionSink + ?Sized> {
    inner: &'a mut S,
    factor: f64,
}

impl<'a, S: ContributionSink + ?Sized> ScaledSink<'a, S> {
    /// 包装接收器
    pub fn new(inner: &'a mut S, factor: f64) -> Self {
        Self { inner, factor }
    }
}

impl<S: ContributionSink + ?Sized> ContributionSink for ScaledSink<'_, S> {
    #[inline]
    fn accumulate(&mut self, row: usize, col: usize, value: f64) {
        self.inner.accumulate(row, col, self.factor * value);
    }
}
