// crates/kf_foundation/src/validation.rs

//! 运行时验证工具
//!
//! 提供验证报告和错误/警告类型，用于网格与系数数据的检查。
//!
//! # 示例
//!
//! ```
//! use kf_foundation::validation::{check_finite, ValidationReport};
//!
//! let mut report = ValidationReport::new();
//! check_finite(&mut report, "dr", 3, f64::NAN);
//! assert!(report.has_errors());
//! ```

use std::fmt;

/// 验证报告
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// 错误列表
    pub errors: Vec<ValidationError>,
    /// 警告列表
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    /// 创建空的验证报告
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加错误
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// 添加警告
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// 是否有错误
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// 是否有警告
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// 是否通过（无错误）
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    /// 合并另一个报告
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "验证报告:")?;
        writeln!(f, "  错误: {} 个", self.errors.len())?;
        writeln!(f, "  警告: {} 个", self.warnings.len())?;

        for (i, err) in self.errors.iter().enumerate() {
            writeln!(f, "  E{}. {}", i + 1, err)?;
        }
        for (i, warn) in self.warnings.iter().enumerate() {
            writeln!(f, "  W{}. {}", i + 1, warn)?;
        }
        Ok(())
    }
}

/// 验证错误类型
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// 非有限值
    NonFinite {
        /// 字段名称
        field: &'static str,
        /// 所在位置
        index: usize,
        /// 非有限的数值
        value: f64,
    },
    /// 非正值（宽度、体积等）
    NonPositive {
        /// 字段名称
        field: &'static str,
        /// 所在位置
        index: usize,
        /// 实际值
        value: f64,
    },
    /// 一致性错误
    Inconsistent {
        /// 错误描述
        message: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite {
                field,
                index,
                value,
            } => write!(f, "位置{}: 字段{}={} (非有限值)", index, field, value),
            Self::NonPositive {
                field,
                index,
                value,
            } => write!(f, "位置{}: 字段{}={} (必须为正)", index, field, value),
            Self::Inconsistent { message } => write!(f, "一致性错误: {}", message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// 验证警告类型
#[derive(Debug, Clone)]
pub enum ValidationWarning {
    /// 各半径动量网格不一致
    NonUniformGrid {
        /// 第一个与半径 0 不同的半径
        radius: usize,
    },
    /// 其他提示
    Custom {
        /// 自定义消息
        message: String,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonUniformGrid { radius } => write!(
                f,
                "半径{}的动量网格与半径0不同，径向通量与系数导出不可用",
                radius
            ),
            Self::Custom { message } => write!(f, "{}", message),
        }
    }
}

// ============================================================================
// 验证辅助函数
// ============================================================================

/// 检查值是否有限
pub fn check_finite(
    report: &mut ValidationReport,
    field: &'static str,
    index: usize,
    value: f64,
) -> bool {
    if !value.is_finite() {
        report.add_error(ValidationError::NonFinite {
            field,
            index,
            value,
        });
        return false;
    }
    true
}

/// 检查值是否为有限正数
pub fn check_positive(
    report: &mut ValidationReport,
    field: &'static str,
    index: usize,
    value: f64,
) -> bool {
    if !check_finite(report, field, index, value) {
        return false;
    }
    if value <= 0.0 {
        report.add_error(ValidationError::NonPositive {
            field,
            index,
            value,
        });
        return false;
    }
    true
}
