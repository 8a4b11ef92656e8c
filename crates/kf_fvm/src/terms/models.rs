// crates/kf_fvm/src/terms/models.rs

//! 系数模型
//!
//! 物理系数公式不属于装配核心，模型只需按存储约定填写系数数组。
//! 系数依赖其他未知量时，模型声明 [`DerivativeTarget`]，Jacobian 通过
//! 解析偏导（[`CoefficientModel::evaluate_partial`]）或前向差分得到。

use super::jacobian::DerivativeTarget;
use crate::coefficients::{CoefficientFamily, CoefficientStore};
use crate::grid::Grid;
use crate::unknowns::{UnknownId, UnknownSource};
use kf_foundation::{KfError, KfResult};

/// 系数模型
pub trait CoefficientModel: Send + Sync {
    /// 模型名称
    fn name(&self) -> &str;

    /// 在时刻 `t` 计算系数，写入已清零的存储
    fn evaluate(
        &self,
        grid: &Grid,
        t: f64,
        unknowns: &dyn UnknownSource,
        store: &mut CoefficientStore,
    ) -> KfResult<()>;

    /// 系数依赖的未知量
    fn derivative_targets(&self) -> Vec<DerivativeTarget> {
        Vec::new()
    }

    /// 对 `target` 第 `multiple` 个副本的解析偏导
    ///
    /// 返回 `Ok(false)` 表示未提供，调用方改用前向差分。
    fn evaluate_partial(
        &self,
        _grid: &Grid,
        _t: f64,
        _unknowns: &dyn UnknownSource,
        _target: UnknownId,
        _multiple: usize,
        _store: &mut CoefficientStore,
    ) -> KfResult<bool> {
        Ok(false)
    }
}

/// 各族取常数
#[derive(Debug, Clone, Default)]
pub struct ConstantCoefficients {
    values: Vec<(CoefficientFamily, f64)>,
}

impl ConstantCoefficients {
    /// 空模型（所有系数为零）
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置一族的常数值
    pub fn with(mut self, family: CoefficientFamily, value: f64) -> Self {
        self.values.retain(|(f, _)| *f != family);
        self.values.push((family, value));
        self
    }

    /// 已设置的值
    pub fn values(&self) -> &[(CoefficientFamily, f64)] {
        &self.values
    }
}

impl CoefficientModel for ConstantCoefficients {
    fn name(&self) -> &str {
        "constant"
    }

    fn evaluate(
        &self,
        _grid: &Grid,
        _t: f64,
        _unknowns: &dyn UnknownSource,
        store: &mut CoefficientStore,
    ) -> KfResult<()> {
        for &(family, value) in &self.values {
            store.fill(family, value)?;
        }
        Ok(())
    }
}

/// 一族系数随某个每半径未知量线性变化
///
/// 半径 `ir` 上 `C = c0 + Σ_n slope[n] · y[n·nr + ir]`，径向外侧面取最后一个半径。
#[derive(Debug, Clone)]
pub struct LinearInUnknown {
    family: CoefficientFamily,
    base: f64,
    unknown: UnknownId,
    slopes: Vec<f64>,
    analytic: bool,
}

impl LinearInUnknown {
    /// 创建模型，`slopes` 长度即未知量副本数
    pub fn new(family: CoefficientFamily, base: f64, unknown: UnknownId, slopes: Vec<f64>) -> Self {
        Self {
            family,
            base,
            unknown,
            slopes,
            analytic: true,
        }
    }

    /// 关闭解析偏导，Jacobian 改用差分
    pub fn without_analytic_partial(mut self) -> Self {
        self.analytic = false;
        self
    }

    fn check_unknown(&self, grid: &Grid, unknowns: &dyn UnknownSource) -> KfResult<()> {
        let nr = grid.nr();
        if unknowns.n_elements(self.unknown)? != nr {
            return Err(KfError::unsupported_grid(format!(
                "{} 依赖的未知量每副本应有 {} 个元素",
                self.family.name(),
                nr
            )));
        }
        KfError::check_size(
            "unknown multiples",
            self.slopes.len(),
            unknowns.n_multiples(self.unknown)?,
        )
    }
}

impl CoefficientModel for LinearInUnknown {
    fn name(&self) -> &str {
        "linear"
    }

    fn evaluate(
        &self,
        grid: &Grid,
        _t: f64,
        unknowns: &dyn UnknownSource,
        store: &mut CoefficientStore,
    ) -> KfResult<()> {
        self.check_unknown(grid, unknowns)?;
        let nr = grid.nr();
        let y = unknowns.data(self.unknown)?;
        let mut coeffs = store.write(self.family)?;
        for row in 0..coeffs.n_rows() {
            let ir = row.min(nr - 1);
            let value = self.base
                + self
                    .slopes
                    .iter()
                    .enumerate()
                    .map(|(n, &s)| s * y[n * nr + ir])
                    .sum::<f64>();
            coeffs.row_mut(row).fill(value);
        }
        Ok(())
    }

    fn derivative_targets(&self) -> Vec<DerivativeTarget> {
        vec![DerivativeTarget::new(self.unknown, self.slopes.len())]
    }

    fn evaluate_partial(
        &self,
        grid: &Grid,
        _t: f64,
        unknowns: &dyn UnknownSource,
        target: UnknownId,
        multiple: usize,
        store: &mut CoefficientStore,
    ) -> KfResult<bool> {
        if !self.analytic {
            return Ok(false);
        }
        if target != self.unknown {
            return Ok(true);
        }
        self.check_unknown(grid, unknowns)?;
        KfError::check_index("Multiple", multiple, self.slopes.len())?;
        store.fill(self.family, self.slopes[multiple])?;
        Ok(true)
    }
}
