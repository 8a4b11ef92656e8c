// crates/kf_config/src/lib.rs

//! KineticFlux Config Layer
//!
//! 配置层，提供算例配置的 JSON 读写与校验。
//!
//! # 模块概览
//!
//! - [`scenario`]: ScenarioConfig 算例配置（网格、输运系数、时间推进、求解器）
//! - [`error`]: 配置错误类型

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod scenario;

// 重导出核心类型
pub use error::ConfigError;
pub use scenario::{
    AdvectionConfig, DiffusionConfig, GridConfig, InitialConfig, InterpolationSchemeConfig,
    LinearSolverConfig, MomentumGeometryKind, OutputConfig, RadialGeometryKind, ScenarioConfig,
    TransientConfig,
};
