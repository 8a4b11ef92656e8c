// crates/kf_fvm/src/linear_algebra/vector_ops.rs

//! 向量运算（BLAS Level 1 风格）
//!
//! - [`dot`]: 点积 x·y
//! - [`norm2`]: 二范数 ||x||₂
//! - [`norm_inf`]: 无穷范数
//! - [`axpy`]: y = α*x + y
//! - [`copy`]: y = x

/// 点积 x·y
#[inline]
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y.iter()).map(|(&xi, &yi)| xi * yi).sum()
}

/// 二范数 ||x||₂
#[inline]
pub fn norm2(x: &[f64]) -> f64 {
    dot(x, x).sqrt()
}

/// 无穷范数（最大绝对值）
#[inline]
pub fn norm_inf(x: &[f64]) -> f64 {
    x.iter().map(|&v| v.abs()).fold(0.0, f64::max)
}

/// AXPY: y = α*x + y
#[inline]
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// 复制: y = x
#[inline]
pub fn copy(x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    y.copy_from_slice(x);
}
