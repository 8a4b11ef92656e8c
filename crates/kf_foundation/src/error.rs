// crates/kf_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `KfError` 枚举和 `KfResult` 类型别名，用于整个装配核心的错误处理。
//!
//! # 错误分类
//!
//! 1. **前置条件错误**: 尺寸不匹配、非法子方程、越界索引，立即返回
//! 2. **网格不一致**: 依赖各半径动量网格一致的例程在校验失败时返回 `UnsupportedGrid`
//! 3. **数值退化**: 零单元宽度、零重叠体积等返回 `NumericalDegeneracy`，不传播 NaN/Inf
//!
//! 装配阶段的错误通过 [`KfError::with_context`] 包装为 `Assembly`，
//! 携带项名称、子方程编号与半径索引。
//!
//! # 示例
//!
//! ```
//! use kf_foundation::error::{KfError, KfResult};
//!
//! fn cell_width(dr: f64) -> KfResult<f64> {
//!     if dr == 0.0 {
//!         return Err(KfError::degeneracy("dr", "径向单元宽度为零"));
//!     }
//!     Ok(dr)
//! }
//!
//! assert!(cell_width(0.0).is_err());
//! ```

use thiserror::Error;

/// 统一结果类型
pub type KfResult<T> = Result<T, KfError>;

/// KineticFlux 错误类型
#[derive(Error, Debug)]
pub enum KfError {
    // ========================================================================
    // 前置条件错误
    // ========================================================================
    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    /// 数据超出范围
    #[error("数据超出范围: {field}={value}, 期望范围=[{min}, {max}]")]
    OutOfRange {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
        /// 最小允许值
        min: f64,
        /// 最大允许值
        max: f64,
    },

    /// 非法子方程
    #[error("非法子方程 {id}: {reason}")]
    InvalidSubEquation {
        /// 子方程编号
        id: usize,
        /// 原因
        reason: String,
    },

    // ========================================================================
    // 分配与网格
    // ========================================================================
    /// 内存分配失败（网格尺寸退化等）
    #[error("分配失败: {what}: {reason}")]
    Allocation {
        /// 分配对象
        what: String,
        /// 原因
        reason: String,
    },

    /// 不支持的网格配置
    #[error("不支持的网格配置: {message}")]
    UnsupportedGrid {
        /// 具体说明
        message: String,
    },

    /// 数值退化
    #[error("数值退化: {quantity}: {message}")]
    NumericalDegeneracy {
        /// 退化的量
        quantity: String,
        /// 具体说明
        message: String,
    },

    // ========================================================================
    // 上下文包装
    // ========================================================================
    /// 装配错误（带上下文）
    #[error("装配项 '{term}' 失败 (子方程={block:?}, 半径={radius:?}): {source}")]
    Assembly {
        /// 方程项名称
        term: String,
        /// 子方程编号
        block: Option<usize>,
        /// 半径索引
        radius: Option<usize>,
        /// 底层错误
        #[source]
        source: Box<KfError>,
    },

    // ========================================================================
    // 外部
    // ========================================================================
    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        /// 可选的底层 IO 错误
        #[source]
        source: Option<std::io::Error>,
    },

    /// 序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        /// 序列化失败原因
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl KfError {
    /// 无效输入
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 数据超出范围
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// 非法子方程
    pub fn invalid_sub_equation(id: usize, reason: impl Into<String>) -> Self {
        Self::InvalidSubEquation {
            id,
            reason: reason.into(),
        }
    }

    /// 分配失败
    pub fn allocation(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Allocation {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// 不支持的网格配置
    pub fn unsupported_grid(message: impl Into<String>) -> Self {
        Self::UnsupportedGrid {
            message: message.into(),
        }
    }

    /// 数值退化
    pub fn degeneracy(quantity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NumericalDegeneracy {
            quantity: quantity.into(),
            message: message.into(),
        }
    }

    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// IO 错误
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// 序列化错误
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// 以装配上下文包装错误
    ///
    /// 已经是 `Assembly` 的错误只补全缺失的子方程/半径信息，不重复嵌套。
    pub fn with_context(
        self,
        term: impl Into<String>,
        block: Option<usize>,
        radius: Option<usize>,
    ) -> Self {
        match self {
            Self::Assembly {
                term: inner_term,
                block: inner_block,
                radius: inner_radius,
                source,
            } => Self::Assembly {
                term: inner_term,
                block: inner_block.or(block),
                radius: inner_radius.or(radius),
                source,
            },
            other => Self::Assembly {
                term: term.into(),
                block,
                radius,
                source: Box::new(other),
            },
        }
    }

    /// 取出最内层错误
    pub fn root_cause(&self) -> &KfError {
        match self {
            Self::Assembly { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl KfError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> KfResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查值是否在范围内
    #[inline]
    pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> KfResult<()> {
        if !(min..=max).contains(&value) {
            Err(Self::out_of_range(field, value, min, max))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> KfResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }

    /// 检查除数为有限非零值
    #[inline]
    pub fn check_nonzero(quantity: &str, value: f64) -> KfResult<()> {
        if value == 0.0 || !value.is_finite() {
            Err(Self::degeneracy(quantity, format!("除数为 {}", value)))
        } else {
            Ok(())
        }
    }
}

// ========================================================================
// 标准库错误转换
// ========================================================================

impl From<std::io::Error> for KfError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

// ========================================================================
// 宏
// ========================================================================

/// 条件不满足时返回错误
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return Err($err.into());
        }
    };
}

/// 解包 Option，为 None 时返回错误
#[macro_export]
macro_rules! require {
    ($opt:expr, $err:expr $(,)?) => {
        match $opt {
            Some(v) => v,
            None => return Err($err.into()),
        }
    };
}

// ========================================================================
// 测试
// ========================================================================
