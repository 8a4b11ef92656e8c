// crates/kf_fvm/src/coefficients/mod.rs

//! 系数存储与插值权重
//!
//! - [`store`]: 对流/扩散系数族的分段存储，支持外部共享缓冲区
//! - [`interpolation`]: 面插值权重与插值格式

pub mod interpolation;
pub mod store;

pub use interpolation::{InterpolationScheme, InterpolationWeights};
pub use store::{CoefficientFamily, CoefficientStore};
