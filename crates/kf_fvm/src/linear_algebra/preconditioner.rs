// crates/kf_fvm/src/linear_algebra/preconditioner.rs

//! 预条件器
//!
//! - [`IdentityPreconditioner`]: 恒等预条件器
//! - [`JacobiPreconditioner`]: 对角预条件器

use super::csr::CsrMatrix;

/// 预条件器：z = M⁻¹ * r
pub trait Preconditioner: Send + Sync {
    /// 应用预条件器
    fn apply(&self, r: &[f64], z: &mut [f64]);

    /// 名称
    fn name(&self) -> &'static str;

    /// 矩阵值变化后更新
    fn update(&mut self, matrix: &CsrMatrix);
}

/// 恒等预条件器（M = I）
#[derive(Debug, Clone, Default)]
pub struct IdentityPreconditioner;

impl IdentityPreconditioner {
    /// 创建恒等预条件器
    pub fn new() -> Self {
        Self
    }
}

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        z.copy_from_slice(r);
    }

    fn name(&self) -> &'static str {
        "Identity"
    }

    fn update(&mut self, _matrix: &CsrMatrix) {}
}

/// Jacobi 预条件器（M = diag(A)）
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner {
    inv_diag: Vec<f64>,
}

impl JacobiPreconditioner {
    /// 小于该值的对角元按 1 处理
    const ZERO_THRESHOLD: f64 = 1e-14;

    /// 从矩阵创建
    pub fn from_matrix(matrix: &CsrMatrix) -> Self {
        Self::from_diagonal(&matrix.extract_diagonal())
    }

    /// 从对角向量创建
    pub fn from_diagonal(diag: &[f64]) -> Self {
        let inv_diag = diag
            .iter()
            .map(|&d| {
                if d.abs() > Self::ZERO_THRESHOLD {
                    1.0 / d
                } else {
                    1.0
                }
            })
            .collect();
        Self { inv_diag }
    }

    /// 对角元倒数
    pub fn inv_diagonal(&self) -> &[f64] {
        &self.inv_diag
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        debug_assert_eq!(r.len(), z.len());
        debug_assert_eq!(r.len(), self.inv_diag.len());
        for ((zi, &ri), &inv) in z.iter_mut().zip(r).zip(&self.inv_diag) {
            *zi = ri * inv;
        }
    }

    fn name(&self) -> &'static str {
        "Jacobi"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        *self = Self::from_matrix(matrix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jacobi_zero_diagonal() {
        let p = JacobiPreconditioner::from_diagonal(&[2.0, 0.0, -4.0]);
        let mut z = [0.0; 3];
        p.apply(&[1.0, 1.0, 1.0], &mut z);
        assert_eq!(z, [0.5, 1.0, -0.25]);
    }

    #[test]
    fn test_identity() {
        let mut z = [0.0; 2];
        IdentityPreconditioner::new().apply(&[3.0, -1.0], &mut z);
        assert_eq!(z, [3.0, -1.0]);
    }
}
