// crates/kf_foundation/src/lib.rs

//! KineticFlux Foundation Layer
//!
//! 基础层，提供装配核心共用的基础抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型与 `ensure!`/`require!` 宏
//! - [`ragged`]: 按半径分段的扁平数组与所有权标记
//! - [`validation`]: 运行时验证报告
//!
//! # 示例
//!
//! ```
//! use kf_foundation::prelude::*;
//!
//! let layout = RaggedLayout::from_sizes([4, 4]);
//! let arr = RaggedArray::filled(layout, 0.5);
//! assert_eq!(arr.row(1), &[0.5; 4]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ragged;
pub mod validation;

// 重导出常用类型
pub use error::{KfError, KfResult};
pub use ragged::{RaggedArray, RaggedBuffer, RaggedLayout, SharedRagged};
pub use validation::{ValidationError, ValidationReport, ValidationWarning};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{KfError, KfResult};
    pub use crate::ragged::{RaggedArray, RaggedBuffer, RaggedLayout, SharedRagged};
    pub use crate::validation::{ValidationError, ValidationReport, ValidationWarning};
    pub use crate::{ensure, require};
}
