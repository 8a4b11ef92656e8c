// apps/kf_cli/src/commands/info.rs

//! 信息显示命令

use anyhow::{Context, Result};
use clap::Args;
use kf_config::ScenarioConfig;
use kf_fvm::block_matrix::InsertMode;
use kf_fvm::boundary::CouplingTarget;
use kf_fvm::coefficients::{CoefficientFamily, InterpolationScheme};
use kf_fvm::grid::{MomentumGeometry, RadialGeometry};
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 显示默认配置（JSON）
    #[arg(long)]
    pub defaults: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== KineticFlux 信息 ===");

    println!("kf_cli 版本: {}", env!("CARGO_PKG_VERSION"));
    println!("目标平台: {} / {}", std::env::consts::ARCH, std::env::consts::OS);

    println!("\n径向几何: {:?}", [RadialGeometry::Slab, RadialGeometry::Cylindrical]);
    println!(
        "动量几何: {:?}",
        [MomentumGeometry::Cartesian, MomentumGeometry::SphericalPXi]
    );
    println!(
        "插值格式: {:?}",
        [
            InterpolationScheme::Central,
            InterpolationScheme::Upwind,
            InterpolationScheme::Downwind,
            InterpolationScheme::Fixed(0.5),
        ]
    );

    let names = |families: &[CoefficientFamily]| -> Vec<&'static str> {
        families.iter().map(|f| f.name()).collect()
    };
    println!("对流系数: {:?}", names(&CoefficientFamily::ADVECTION));
    println!("扩散系数: {:?}", names(&CoefficientFamily::DIFFUSION));
    println!(
        "跨网格耦合目标: {:?}",
        [CouplingTarget::Lower, CouplingTarget::Upper, CouplingTarget::Density]
    );
    println!("写入模式: {:?}", [InsertMode::Insert, InsertMode::Add]);

    if args.defaults {
        let json = serde_json::to_string_pretty(&ScenarioConfig::default())
            .context("默认配置序列化失败")?;
        println!("\n=== 默认配置 ===\n{}", json);
    }

    Ok(())
}
