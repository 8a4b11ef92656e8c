// crates/kf_fvm/src/terms/jacobian.rs

//! 系数依赖的 Jacobian 列
//!
//! 系数 `C` 依赖未知量 `y` 时，通量项 `L(C(y)) f` 对 `y` 的导数为
//! `L(∂C/∂y) f`。对 `y` 的每个副本 `n` 单独求出偏导系数，
//! 再按向量形式作用于 `f`，结果写入列 `n·nr + ir`（`ir` 为行所在半径）。
//!
//! 径向面的系数按所在行的半径计入，即视作局部依赖。

use super::models::CoefficientModel;
use crate::block_matrix::{InsertMode, RowBlockView, SubEquationId};
use crate::coefficients::{CoefficientFamily, CoefficientStore};
use crate::grid::Grid;
use crate::unknowns::{PerturbedUnknowns, UnknownId, UnknownSource};
use kf_foundation::{KfError, KfResult};

/// 前向差分相对步长
const FD_STEP: f64 = 1.490_116_119_384_765_6e-8;

/// 系数依赖的未知量及其副本数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivativeTarget {
    /// 未知量
    pub id: UnknownId,
    /// 副本数
    pub multiples: usize,
}

impl DerivativeTarget {
    /// 创建目标
    pub fn new(id: UnknownId, multiples: usize) -> Self {
        Self { id, multiples }
    }
}

/// 一次 Jacobian 块装配的上下文
#[derive(Clone, Copy)]
pub struct JacobianContext<'a> {
    /// 行对应的未知量
    pub uqty: UnknownId,
    /// 求导的未知量
    pub deriv: UnknownId,
    /// 行块
    pub own_block: SubEquationId,
    /// 列块（`deriv` 所在子方程）
    pub deriv_block: SubEquationId,
    /// 当前时刻
    pub t: f64,
    /// `uqty` 的当前值
    pub x: &'a [f64],
    /// 所有未知量
    pub unknowns: &'a dyn UnknownSource,
}

impl JacobianContext<'_> {
    /// 是否为对自身的导数块
    #[inline]
    pub fn is_diagonal(&self) -> bool {
        self.uqty == self.deriv
    }
}

/// 偏导系数存储，每个副本一份，布局与主系数相同
#[derive(Debug)]
pub struct DifferentiationStore {
    families: Vec<CoefficientFamily>,
    targets: Vec<DerivativeTarget>,
    copies: Vec<CoefficientStore>,
}

impl DifferentiationStore {
    /// 创建未分配的存储
    pub fn new(families: &[CoefficientFamily], targets: Vec<DerivativeTarget>) -> Self {
        Self {
            families: families.to_vec(),
            targets,
            copies: Vec::new(),
        }
    }

    /// 已声明的目标
    pub fn targets(&self) -> &[DerivativeTarget] {
        &self.targets
    }

    /// 查找目标
    pub fn target(&self, id: UnknownId) -> Option<DerivativeTarget> {
        self.targets.iter().copied().find(|t| t.id == id)
    }

    /// 最大副本数
    pub fn max_multiples(&self) -> usize {
        self.targets.iter().map(|t| t.multiples).max().unwrap_or(0)
    }

    /// 按网格分配 `max_multiples()` 份存储
    pub fn allocate(&mut self, grid: &Grid) -> KfResult<()> {
        let n = self.max_multiples();
        self.copies = (0..n)
            .map(|_| {
                let mut store = CoefficientStore::new(&self.families);
                store.allocate(grid).map(|_| store)
            })
            .collect::<KfResult<_>>()?;
        if n > 0 {
            log::debug!("偏导系数存储分配完成: {} 份", n);
        }
        Ok(())
    }

    /// 第 `n` 份偏导系数
    pub fn copy(&self, n: usize) -> KfResult<&CoefficientStore> {
        self.copies
            .get(n)
            .ok_or_else(|| KfError::index_out_of_bounds("Multiple", n, self.copies.len()))
    }

    /// 计算 `target` 所有副本的偏导系数
    ///
    /// 模型未提供解析偏导时使用前向差分，扰动副本 `n` 在所有半径上的值。
    pub fn evaluate(
        &mut self,
        model: &dyn CoefficientModel,
        grid: &Grid,
        t: f64,
        unknowns: &dyn UnknownSource,
        target: DerivativeTarget,
    ) -> KfResult<()> {
        let nr = grid.nr();
        if unknowns.n_elements(target.id)? != nr {
            return Err(KfError::unsupported_grid(format!(
                "系数只能依赖每半径一个值的未知量，未知量 #{} 每副本 {} 个元素",
                target.id.get(),
                unknowns.n_elements(target.id)?
            )));
        }
        KfError::check_size("derivative multiples", target.multiples, unknowns.n_multiples(target.id)?)?;
        if self.copies.len() < target.multiples {
            self.allocate(grid)?;
        }

        let mut base: Option<CoefficientStore> = None;
        for n in 0..target.multiples {
            let store = &mut self.copies[n];
            store.reset();
            if model.evaluate_partial(grid, t, unknowns, target.id, n, store)? {
                continue;
            }

            if base.is_none() {
                let mut b = CoefficientStore::new(&self.families);
                b.allocate(grid)?;
                model.evaluate(grid, t, unknowns, &mut b)?;
                base = Some(b);
            }

            let mut y = unknowns.data(target.id)?.to_vec();
            let part = &mut y[n * nr..(n + 1) * nr];
            let scale = part.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
            let h = FD_STEP * scale;
            for v in part.iter_mut() {
                *v += h;
            }
            let perturbed = PerturbedUnknowns::new(unknowns, target.id, y)?;
            model.evaluate(grid, t, &perturbed, store)?;

            if let Some(b) = &base {
                for &family in &self.families {
                    let reference = b.read(family)?;
                    let mut diff = store.write(family)?;
                    for (d, &c) in diff.as_mut_slice().iter_mut().zip(reference.as_slice()) {
                        *d = (*d - c) / h;
                    }
                }
            }
            log::trace!("{}: 副本 {} 使用前向差分, h = {:.3e}", model.name(), n, h);
        }
        Ok(())
    }
}

/// 对某个 `deriv` 的所有副本装配系数导数列
///
/// `vector_form(coefficients, out)` 以给定系数计算项的向量形式。
pub(crate) fn add_coefficient_columns<F>(
    ctx: &JacobianContext<'_>,
    jac: &mut RowBlockView<'_>,
    grid: &Grid,
    diff: &mut DifferentiationStore,
    model: &dyn CoefficientModel,
    mut vector_form: F,
) -> KfResult<()>
where
    F: FnMut(&CoefficientStore, &mut [f64]) -> KfResult<()>,
{
    let target = match diff.target(ctx.deriv) {
        Some(t) => t,
        None => return Ok(()),
    };
    diff.evaluate(model, grid, ctx.t, ctx.unknowns, target)?;

    let mut column = vec![0.0; grid.n_cells()];
    for n in 0..target.multiples {
        column.fill(0.0);
        vector_form(diff.copy(n)?, &mut column)?;
        scatter_by_radius(jac, ctx.deriv_block, grid, n, &column)?;
    }
    Ok(())
}

/// 半径 `ir` 的行写入列 `multiple·nr + ir`
fn scatter_by_radius(
    jac: &mut RowBlockView<'_>,
    block: SubEquationId,
    grid: &Grid,
    multiple: usize,
    column: &[f64],
) -> KfResult<()> {
    let nr = grid.nr();
    for ir in 0..nr {
        let start = grid.offset(ir);
        let n = grid.momentum(ir).n_cells();
        let col = multiple * nr + ir;
        for (k, &v) in column[start..start + n].iter().enumerate() {
            if v != 0.0 {
                jac.set_element(block, start + k, col, v, InsertMode::Add)?;
            }
        }
    }
    Ok(())
}
