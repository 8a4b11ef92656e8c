// apps/kf_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 依次检查配置取值、网格几何以及配置与网格的组合是否可装配。

use super::setup::build_grid;
use anyhow::{bail, Context, Result};
use clap::Args;
use kf_config::ScenarioConfig;
use kf_foundation::{ValidationError, ValidationReport, ValidationWarning};
use kf_fvm::grid::Grid;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("验证配置: {}", args.config.display());

    let content = std::fs::read_to_string(&args.config)
        .with_context(|| format!("无法读取配置文件: {}", args.config.display()))?;
    let config = ScenarioConfig::from_json(&content)?;

    let mut report = ValidationReport::new();
    if let Err(e) = config.validate() {
        report.add_error(inconsistent(e.to_string()));
    } else {
        match build_grid(&config.grid) {
            Ok(grid) => {
                report.merge(grid.validate());
                check_combination(&config, &grid, &mut report);
            }
            Err(e) => report.add_error(inconsistent(format!("{:#}", e))),
        }
    }

    for err in &report.errors {
        error!("  ✗ {}", err);
    }
    for warning in &report.warnings {
        warn!("  ⚠ {}", warning);
    }
    println!("{}", report);

    let success = if args.strict {
        report.is_valid() && !report.has_warnings()
    } else {
        report.is_valid()
    };
    if success {
        println!("✓ 验证通过");
        Ok(())
    } else {
        println!("✗ 验证失败");
        bail!(
            "验证失败：发现 {} 个错误，{} 个警告",
            report.errors.len(),
            report.warnings.len()
        )
    }
}

fn check_combination(config: &ScenarioConfig, grid: &Grid, report: &mut ValidationReport) {
    if !grid.is_uniform() {
        if config.advection.fr != 0.0 || config.diffusion.drr != 0.0 {
            report.add_error(inconsistent(
                "逐半径动量网格不同时不能装配径向通量 (advection.fr / diffusion.drr)",
            ));
        }
        if config.output.coefficient_dump.is_some() {
            report.add_error(inconsistent("系数导出要求各半径动量网格相同"));
        }
    }

    let order = config.advection.stencil_order;
    if config.advection.is_active() && 2 * order > grid.n1(0).min(grid.nr()) {
        report.add_warning(ValidationWarning::Custom {
            message: format!("模板阶数 {} 超过最小网格维度，边界附近的面将截断模板", order),
        });
    }

    // 仅提示
    let dt = config.transient.dt;
    let dp1 = grid.momentum(0).dp1().iter().copied().fold(f64::INFINITY, f64::min);
    let courant = dt * config.advection.f1.abs() / dp1;
    if courant > 1.0 {
        report.add_warning(ValidationWarning::Custom {
            message: format!("p1 方向 Courant 数 {:.2} > 1，插值格式可能产生振荡", courant),
        });
    }

    if config.transient.steps == 0 {
        report.add_warning(ValidationWarning::Custom {
            message: "transient.steps 为 0，assemble 不会推进".to_string(),
        });
    }
}

fn inconsistent(message: impl Into<String>) -> ValidationError {
    ValidationError::Inconsistent {
        message: message.into(),
    }
}
