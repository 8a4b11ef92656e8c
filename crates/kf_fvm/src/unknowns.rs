// crates/kf_fvm/src/unknowns.rs

//! 未知量存储
//!
//! 每个未知量保存当前迭代值、上一时间步值以及按时间保存的历史。
//! 方程项通过 [`UnknownSource`] 读取耦合未知量，
//! 有限差分雅可比通过 [`PerturbedUnknowns`] 覆盖单个未知量。

use kf_foundation::{ensure, require, KfError, KfResult};
use serde::{Deserialize, Serialize};

/// 未知量编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct UnknownId(pub usize);

impl UnknownId {
    /// 获取索引值
    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

// =============================================================================
// 单个未知量的数据
// =============================================================================

/// 未知量数据（当前值、上一步值与历史）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantityData {
    data: Vec<f64>,
    old_data: Vec<f64>,
    old_time: f64,
    times: Vec<f64>,
    store: Vec<Vec<f64>>,
    has_changed: bool,
}

impl QuantityData {
    /// 创建全零数据
    pub fn new(n_elements: usize) -> Self {
        Self {
            data: vec![0.0; n_elements],
            old_data: vec![0.0; n_elements],
            old_time: 0.0,
            times: Vec::new(),
            store: Vec::new(),
            has_changed: true,
        }
    }

    /// 元素数
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 当前值
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// 上一时间步值
    #[inline]
    pub fn previous(&self) -> &[f64] {
        &self.old_data
    }

    /// 上一时间步的时刻
    #[inline]
    pub fn previous_time(&self) -> f64 {
        self.old_time
    }

    /// 最近一次写入是否改变了数据
    #[inline]
    pub fn has_changed(&self) -> bool {
        self.has_changed
    }

    /// 已保存的时刻
    #[inline]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// 已保存的历史
    #[inline]
    pub fn history(&self) -> &[Vec<f64>] {
        &self.store
    }

    /// 是否已有初值
    #[inline]
    pub fn has_initial_value(&self) -> bool {
        !self.store.is_empty()
    }

    /// 从 `vec[offset..offset + len]` 写入当前值
    ///
    /// `may_be_constant` 为真且数据逐元素相等时不复制，并将 `has_changed` 置为假。
    pub fn store(&mut self, vec: &[f64], offset: usize, may_be_constant: bool) -> KfResult<()> {
        let n = self.data.len();
        let src = require!(
            vec.get(offset..offset + n),
            KfError::index_out_of_bounds("QuantityData::store", offset + n, vec.len())
        );

        if may_be_constant && src == self.data.as_slice() {
            self.has_changed = false;
            log::trace!("数据未变化，跳过写入");
            return Ok(());
        }

        self.has_changed = true;
        self.data.copy_from_slice(src);
        Ok(())
    }

    /// 保存当前值为新的时间步
    ///
    /// `true_save` 为真时同时追加到历史。
    pub fn save_step(&mut self, t: f64, true_save: bool) {
        self.old_data.copy_from_slice(&self.data);
        self.old_time = t;
        if true_save {
            self.times.push(t);
            self.store.push(self.old_data.clone());
        }
    }

    /// 设置初值，缺省时为零
    ///
    /// 首次调用写入历史，之后调用覆盖历史中的第一项。
    pub fn set_initial_value(&mut self, value: Option<&[f64]>, t0: f64) -> KfResult<()> {
        let init = match value {
            Some(v) => {
                KfError::check_size("initial value", self.data.len(), v.len())?;
                v.to_vec()
            }
            None => vec![0.0; self.data.len()],
        };
        self.store(&init, 0, false)?;

        if !self.has_initial_value() {
            self.save_step(t0, true);
        } else {
            self.save_step(t0, false);
            self.times[0] = t0;
            self.store[0].copy_from_slice(&init);
        }
        Ok(())
    }
}

// =============================================================================
// 读取接口
// =============================================================================

/// 未知量读取接口
pub trait UnknownSource {
    /// 当前值
    fn data(&self, id: UnknownId) -> KfResult<&[f64]>;

    /// 上一时间步值
    fn data_previous(&self, id: UnknownId) -> KfResult<&[f64]>;

    /// 每个副本的元素数
    fn n_elements(&self, id: UnknownId) -> KfResult<usize>;

    /// 副本数
    fn n_multiples(&self, id: UnknownId) -> KfResult<usize>;
}

/// 已注册的未知量
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownQuantity {
    name: String,
    n_elements: usize,
    n_multiples: usize,
    data: QuantityData,
}

impl UnknownQuantity {
    /// 名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 每个副本的元素数
    pub fn n_elements(&self) -> usize {
        self.n_elements
    }

    /// 副本数
    pub fn n_multiples(&self) -> usize {
        self.n_multiples
    }

    /// 总元素数
    pub fn len(&self) -> usize {
        self.n_elements * self.n_multiples
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 数据
    pub fn data(&self) -> &QuantityData {
        &self.data
    }
}

/// 未知量管理器
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UnknownQuantityHandler {
    quantities: Vec<UnknownQuantity>,
}

impl UnknownQuantityHandler {
    /// 创建空管理器
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册未知量
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        n_elements: usize,
        n_multiples: usize,
    ) -> KfResult<UnknownId> {
        let name = name.into();
        ensure!(
            self.find(&name).is_none(),
            KfError::invalid_input(format!("未知量 '{}' 已注册", name))
        );
        ensure!(
            n_multiples > 0,
            KfError::invalid_input(format!("未知量 '{}' 的副本数为零", name))
        );
        let id = UnknownId(self.quantities.len());
        self.quantities.push(UnknownQuantity {
            data: QuantityData::new(n_elements * n_multiples),
            name,
            n_elements,
            n_multiples,
        });
        Ok(id)
    }

    /// 按名称查找
    pub fn find(&self, name: &str) -> Option<UnknownId> {
        self.quantities
            .iter()
            .position(|q| q.name == name)
            .map(UnknownId)
    }

    /// 未知量数量
    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    /// 获取未知量
    pub fn get(&self, id: UnknownId) -> KfResult<&UnknownQuantity> {
        self.quantities
            .get(id.0)
            .ok_or_else(|| KfError::index_out_of_bounds("Unknown", id.0, self.quantities.len()))
    }

    fn get_mut(&mut self, id: UnknownId) -> KfResult<&mut UnknownQuantity> {
        let n = self.quantities.len();
        self.quantities
            .get_mut(id.0)
            .ok_or_else(|| KfError::index_out_of_bounds("Unknown", id.0, n))
    }

    /// 写入当前值
    pub fn store(
        &mut self,
        id: UnknownId,
        vec: &[f64],
        offset: usize,
        may_be_constant: bool,
    ) -> KfResult<()> {
        self.get_mut(id)?.data.store(vec, offset, may_be_constant)
    }

    /// 设置初值
    pub fn set_initial_value(&mut self, id: UnknownId, value: Option<&[f64]>, t0: f64) -> KfResult<()> {
        self.get_mut(id)?.data.set_initial_value(value, t0)
    }

    /// 所有未知量保存时间步
    pub fn save_step(&mut self, t: f64, true_save: bool) {
        for q in &mut self.quantities {
            q.data.save_step(t, true_save);
        }
    }

    /// 数据是否在最近一次写入中改变
    pub fn has_changed(&self, id: UnknownId) -> KfResult<bool> {
        Ok(self.get(id)?.data.has_changed())
    }

    /// 迭代所有未知量
    pub fn iter(&self) -> impl Iterator<Item = (UnknownId, &UnknownQuantity)> {
        self.quantities
            .iter()
            .enumerate()
            .map(|(k, q)| (UnknownId(k), q))
    }
}

impl UnknownSource for UnknownQuantityHandler {
    fn data(&self, id: UnknownId) -> KfResult<&[f64]> {
        Ok(self.get(id)?.data.data())
    }

    fn data_previous(&self, id: UnknownId) -> KfResult<&[f64]> {
        Ok(self.get(id)?.data.previous())
    }

    fn n_elements(&self, id: UnknownId) -> KfResult<usize> {
        Ok(self.get(id)?.n_elements)
    }

    fn n_multiples(&self, id: UnknownId) -> KfResult<usize> {
        Ok(self.get(id)?.n_multiples)
    }
}

// =============================================================================
// 扰动视图
// =============================================================================

/// 覆盖一个未知量当前值的只读视图
pub struct PerturbedUnknowns<'a> {
    base: &'a dyn UnknownSource,
    id: UnknownId,
    data: Vec<f64>,
}

impl<'a> PerturbedUnknowns<'a> {
    /// 以 `data` 替换 `id` 的当前值
    pub fn new(base: &'a dyn UnknownSource, id: UnknownId, data: Vec<f64>) -> KfResult<Self> {
        let expected = base.n_elements(id)? * base.n_multiples(id)?;
        KfError::check_size("perturbed unknown", expected, data.len())?;
        Ok(Self { base, id, data })
    }
}

impl UnknownSource for PerturbedUnknowns<'_> {
    fn data(&self, id: UnknownId) -> KfResult<&[f64]> {
        if id == self.id {
            Ok(&self.data)
        } else {
            self.base.data(id)
        }
    }

    fn data_previous(&self, id: UnknownId) -> KfResult<&[f64]> {
        self.base.data_previous(id)
    }

    fn n_elements(&self, id: UnknownId) -> KfResult<usize> {
        self.base.n_elements(id)
    }

    fn n_multiples(&self, id: UnknownId) -> KfResult<usize> {
        self.base.n_multiples(id)
    }
}
