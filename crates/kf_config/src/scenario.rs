// crates/kf_config/src/scenario.rs

//! ScenarioConfig - 装配算例配置
//!
//! 描述网格、常系数输运项、时间推进与线性求解参数，
//! 以 JSON 读写，供命令行工具构建网格与算子。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// 算例配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// 算例名称
    #[serde(default = "default_name")]
    pub name: String,

    /// 网格配置
    #[serde(default)]
    pub grid: GridConfig,

    /// 对流项配置
    #[serde(default)]
    pub advection: AdvectionConfig,

    /// 扩散项配置
    #[serde(default)]
    pub diffusion: DiffusionConfig,

    /// 初始分布
    #[serde(default)]
    pub initial: InitialConfig,

    /// 时间推进配置
    #[serde(default)]
    pub transient: TransientConfig,

    /// 线性求解器配置
    #[serde(default)]
    pub solver: LinearSolverConfig,

    /// 输出配置
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_name() -> String { "scenario".to_string() }

// =============================================================================
// 网格
// =============================================================================

/// 径向几何
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RadialGeometryKind {
    /// 平板，雅可比为 1
    #[default]
    Slab,
    /// 柱坐标，雅可比为 r
    Cylindrical,
}

/// 动量空间几何
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MomentumGeometryKind {
    /// 笛卡尔，雅可比为 1
    #[default]
    Cartesian,
    /// 球坐标 p-xi，雅可比为 p²
    SphericalPxi,
}

/// 网格配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// 径向单元数
    #[serde(default = "default_nr")]
    pub nr: usize,
    /// 径向下界
    #[serde(default)]
    pub r_min: f64,
    /// 径向上界
    #[serde(default = "default_one")]
    pub r_max: f64,
    /// 径向几何
    #[serde(default)]
    pub radial_geometry: RadialGeometryKind,

    /// 动量方向 1 单元数
    #[serde(default = "default_n1")]
    pub n1: usize,
    /// 动量方向 1 下界
    #[serde(default)]
    pub p1_min: f64,
    /// 动量方向 1 上界
    #[serde(default = "default_one")]
    pub p1_max: f64,

    /// 动量方向 2 单元数
    #[serde(default = "default_n2")]
    pub n2: usize,
    /// 动量方向 2 下界
    #[serde(default = "default_minus_one")]
    pub p2_min: f64,
    /// 动量方向 2 上界
    #[serde(default = "default_one")]
    pub p2_max: f64,

    /// 动量空间几何
    #[serde(default)]
    pub momentum_geometry: MomentumGeometryKind,

    /// 逐半径动量网格尺寸 `[n1, n2]`，缺省时所有半径相同
    #[serde(default)]
    pub per_radius: Option<Vec<[usize; 2]>>,
}

fn default_nr() -> usize { 4 }
fn default_n1() -> usize { 16 }
fn default_n2() -> usize { 1 }
fn default_one() -> f64 { 1.0 }
fn default_minus_one() -> f64 { -1.0 }

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            nr: default_nr(),
            r_min: 0.0,
            r_max: default_one(),
            radial_geometry: RadialGeometryKind::default(),
            n1: default_n1(),
            p1_min: 0.0,
            p1_max: default_one(),
            n2: default_n2(),
            p2_min: default_minus_one(),
            p2_max: default_one(),
            momentum_geometry: MomentumGeometryKind::default(),
            per_radius: None,
        }
    }
}

impl GridConfig {
    /// 第 ir 个半径的动量网格尺寸
    pub fn momentum_size(&self, ir: usize) -> (usize, usize) {
        match &self.per_radius {
            Some(sizes) => sizes.get(ir).map_or((self.n1, self.n2), |s| (s[0], s[1])),
            None => (self.n1, self.n2),
        }
    }
}

// =============================================================================
// 输运项
// =============================================================================

/// 插值格式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationSchemeConfig {
    /// 中心差分
    #[default]
    Central,
    /// 迎风
    Upwind,
    /// 顺风
    Downwind,
    /// 固定权重
    Custom(f64),
}

/// 常系数对流项配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvectionConfig {
    /// 径向系数
    #[serde(default)]
    pub fr: f64,
    /// 动量方向 1 系数
    #[serde(default)]
    pub f1: f64,
    /// 动量方向 2 系数
    #[serde(default)]
    pub f2: f64,
    /// 插值格式
    #[serde(default)]
    pub scheme: InterpolationSchemeConfig,
    /// 模板阶数（每个面 2*order 个权重）
    #[serde(default = "default_stencil_order")]
    pub stencil_order: usize,
}

fn default_stencil_order() -> usize { 1 }

impl Default for AdvectionConfig {
    fn default() -> Self {
        Self {
            fr: 0.0,
            f1: 0.0,
            f2: 0.0,
            scheme: InterpolationSchemeConfig::default(),
            stencil_order: default_stencil_order(),
        }
    }
}

impl AdvectionConfig {
    /// 是否存在非零系数
    pub fn is_active(&self) -> bool {
        self.fr != 0.0 || self.f1 != 0.0 || self.f2 != 0.0
    }
}

/// 常系数扩散项配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffusionConfig {
    /// 径向扩散
    #[serde(default)]
    pub drr: f64,
    /// 动量方向 1 扩散
    #[serde(default)]
    pub d11: f64,
    /// 交叉项 (1,2)
    #[serde(default)]
    pub d12: f64,
    /// 交叉项 (2,1)
    #[serde(default)]
    pub d21: f64,
    /// 动量方向 2 扩散
    #[serde(default)]
    pub d22: f64,
}

impl DiffusionConfig {
    /// 是否存在非零系数
    pub fn is_active(&self) -> bool {
        [self.drr, self.d11, self.d12, self.d21, self.d22]
            .iter()
            .any(|&d| d != 0.0)
    }
}

// =============================================================================
// 初值、时间推进与求解器
// =============================================================================

/// 动量方向 1 上的高斯初值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialConfig {
    /// 峰值
    #[serde(default = "default_one")]
    pub amplitude: f64,
    /// 峰值位置（p1 坐标）
    #[serde(default = "default_center")]
    pub center: f64,
    /// 宽度
    #[serde(default = "default_width")]
    pub width: f64,
}

fn default_center() -> f64 { 0.5 }
fn default_width() -> f64 { 0.1 }

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            amplitude: default_one(),
            center: default_center(),
            width: default_width(),
        }
    }
}

/// 时间推进配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransientConfig {
    /// 时间步长
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// 步数
    #[serde(default = "default_steps")]
    pub steps: usize,
}

fn default_dt() -> f64 { 1e-3 }
fn default_steps() -> usize { 10 }

impl Default for TransientConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            steps: default_steps(),
        }
    }
}

/// 线性求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSolverConfig {
    /// 相对收敛容差
    #[serde(default = "default_rtol")]
    pub rtol: f64,
    /// 绝对收敛容差
    #[serde(default = "default_atol")]
    pub atol: f64,
    /// 最大迭代次数
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// 是否打印迭代信息
    #[serde(default)]
    pub verbose: bool,
}

fn default_rtol() -> f64 { 1e-10 }
fn default_atol() -> f64 { 1e-14 }
fn default_max_iter() -> usize { 1000 }

impl Default for LinearSolverConfig {
    fn default() -> Self {
        Self {
            rtol: default_rtol(),
            atol: default_atol(),
            max_iter: default_max_iter(),
            verbose: false,
        }
    }
}

/// 输出配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// 系数导出文件（JSON）
    #[serde(default)]
    pub coefficient_dump: Option<PathBuf>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            grid: GridConfig::default(),
            advection: AdvectionConfig::default(),
            diffusion: DiffusionConfig::default(),
            initial: InitialConfig::default(),
            transient: TransientConfig::default(),
            solver: LinearSolverConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

// =============================================================================
// 读写与校验
// =============================================================================

impl ScenarioConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 字符串解析（不校验）
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// 保存到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.grid;

        if g.nr == 0 {
            return Err(ConfigError::invalid("grid.nr", g.nr, "径向单元数必须为正"));
        }
        check_interval("grid.r", g.r_min, g.r_max)?;
        if g.radial_geometry == RadialGeometryKind::Cylindrical && g.r_min < 0.0 {
            return Err(ConfigError::invalid(
                "grid.r_min",
                g.r_min,
                "柱坐标下半径不能为负",
            ));
        }
        check_interval("grid.p1", g.p1_min, g.p1_max)?;
        check_interval("grid.p2", g.p2_min, g.p2_max)?;

        match &g.per_radius {
            Some(sizes) => {
                if sizes.len() != g.nr {
                    return Err(ConfigError::invalid(
                        "grid.per_radius",
                        sizes.len(),
                        "长度必须等于 grid.nr",
                    ));
                }
                if let Some(bad) = sizes.iter().position(|s| s[0] == 0 || s[1] == 0) {
                    return Err(ConfigError::invalid(
                        "grid.per_radius",
                        bad,
                        "动量网格尺寸必须为正",
                    ));
                }
            }
            None => {
                if g.n1 == 0 || g.n2 == 0 {
                    return Err(ConfigError::invalid(
                        "grid.n1/n2",
                        format!("{}x{}", g.n1, g.n2),
                        "动量网格尺寸必须为正",
                    ));
                }
            }
        }

        if let InterpolationSchemeConfig::Custom(w) = self.advection.scheme {
            if !(0.0..=1.0).contains(&w) {
                return Err(ConfigError::invalid(
                    "advection.scheme.custom",
                    w,
                    "插值权重必须在 [0, 1] 范围内",
                ));
            }
        }
        if self.advection.stencil_order == 0 {
            return Err(ConfigError::invalid(
                "advection.stencil_order",
                0,
                "模板阶数至少为 1",
            ));
        }

        if !(self.transient.dt >= 0.0) {
            return Err(ConfigError::invalid(
                "transient.dt",
                self.transient.dt,
                "时间步长必须非负",
            ));
        }
        if !(self.initial.width > 0.0) {
            return Err(ConfigError::invalid(
                "initial.width",
                self.initial.width,
                "宽度必须为正",
            ));
        }

        if !(self.solver.rtol > 0.0) {
            return Err(ConfigError::invalid("solver.rtol", self.solver.rtol, "必须为正"));
        }
        if self.solver.max_iter == 0 {
            return Err(ConfigError::invalid("solver.max_iter", 0, "必须为正"));
        }

        Ok(())
    }
}

fn check_interval(key: &str, lo: f64, hi: f64) -> Result<(), ConfigError> {
    if !lo.is_finite() || !hi.is_finite() || hi <= lo {
        return Err(ConfigError::invalid(
            key,
            format!("[{}, {}]", lo, hi),
            "区间必须有限且上界大于下界",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ScenarioConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "grid": { "nr": 2, "n1": 5 },
            "advection": { "f1": 1.5, "scheme": "upwind" },
            "diffusion": { "d11": 0.1 }
        }"#;
        let config = ScenarioConfig::from_json(json).unwrap();
        assert_eq!(config.grid.nr, 2);
        assert_eq!(config.grid.n2, 1);
        assert_eq!(config.advection.scheme, InterpolationSchemeConfig::Upwind);
        assert_eq!(config.advection.stencil_order, 1);
        assert!(config.diffusion.is_active());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_weight_parsed() {
        let json = r#"{ "advection": { "scheme": { "custom": 0.75 } } }"#;
        let config = ScenarioConfig::from_json(json).unwrap();
        assert_eq!(config.advection.scheme, InterpolationSchemeConfig::Custom(0.75));
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let mut config = ScenarioConfig::default();
        config.advection.scheme = InterpolationSchemeConfig::Custom(1.5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_zero_radii_rejected() {
        let mut config = ScenarioConfig::default();
        config.grid.nr = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_per_radius_length_checked() {
        let mut config = ScenarioConfig::default();
        config.grid.per_radius = Some(vec![[4, 2]; 3]);
        assert!(config.validate().is_err());
        config.grid.per_radius = Some(vec![[4, 2]; config.grid.nr]);
        assert!(config.validate().is_ok());
        assert_eq!(config.grid.momentum_size(1), (4, 2));
    }

    #[test]
    fn test_negative_dt_rejected() {
        let mut config = ScenarioConfig::default();
        config.transient.dt = -1e-3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        let mut config = ScenarioConfig::default();
        config.name = "diffusion-1d".to_string();
        config.diffusion.d11 = 2.0;
        config.save_to_file(&path).unwrap();

        let loaded = ScenarioConfig::from_file(&path).unwrap();
        assert_eq!(loaded.name, "diffusion-1d");
        assert_eq!(loaded.diffusion.d11, 2.0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ScenarioConfig::from_file("/nonexistent/kf/scenario.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
