// apps/kf_cli/src/commands/setup.rs

//! 由算例配置构建网格、算子与初值

use anyhow::{Context, Result};
use kf_config::{
    GridConfig, InitialConfig, InterpolationSchemeConfig, MomentumGeometryKind, RadialGeometryKind,
    ScenarioConfig,
};
use kf_fvm::coefficients::{CoefficientFamily, InterpolationScheme};
use kf_fvm::grid::{Grid, MomentumGeometry, MomentumGrid, RadialGeometry, RadialGrid};
use kf_fvm::operator::Operator;
use kf_fvm::terms::{AdvectionTerm, DiffusionTerm};
use std::sync::Arc;
use tracing::info;

/// 构建网格，逐半径尺寸相同的动量网格共用一份
pub fn build_grid(config: &GridConfig) -> Result<Arc<Grid>> {
    let radial = RadialGrid::uniform(config.nr, config.r_min, config.r_max).context("径向网格")?;

    let mut momentum: Vec<Arc<MomentumGrid>> = Vec::with_capacity(config.nr);
    for ir in 0..config.nr {
        let (n1, n2) = config.momentum_size(ir);
        let shared = momentum.iter().find(|m| m.n1() == n1 && m.n2() == n2).cloned();
        let grid = match shared {
            Some(m) => m,
            None => Arc::new(
                MomentumGrid::uniform(
                    n1,
                    (config.p1_min, config.p1_max),
                    n2,
                    (config.p2_min, config.p2_max),
                )
                .with_context(|| format!("半径 {} 的动量网格", ir))?,
            ),
        };
        momentum.push(grid);
    }

    let grid = Grid::new(
        radial,
        momentum,
        radial_geometry(config.radial_geometry),
        momentum_geometry(config.momentum_geometry),
    )
    .context("网格构建失败")?;
    Ok(Arc::new(grid))
}

/// 按配置中非零的常系数组合对流与扩散项
pub fn build_operator(config: &ScenarioConfig, grid: Arc<Grid>) -> Result<Operator> {
    let mut op = Operator::new(grid.clone());

    let adv = &config.advection;
    if adv.is_active() {
        let mut term = AdvectionTerm::new("advection", grid.clone(), adv.stencil_order)?
            .with_scheme(scheme(adv.scheme));
        let store = term.coefficients_mut();
        for (family, value) in [
            (CoefficientFamily::Fr, adv.fr),
            (CoefficientFamily::F1, adv.f1),
            (CoefficientFamily::F2, adv.f2),
        ] {
            store.fill(family, value)?;
        }
        info!("对流项: Fr={}, F1={}, F2={}, 格式 {:?}", adv.fr, adv.f1, adv.f2, adv.scheme);
        op.set_advection(term);
    }

    let diff = &config.diffusion;
    if diff.is_active() {
        let mut term = DiffusionTerm::new("diffusion", grid)?;
        let store = term.coefficients_mut();
        for (family, value) in [
            (CoefficientFamily::Drr, diff.drr),
            (CoefficientFamily::D11, diff.d11),
            (CoefficientFamily::D12, diff.d12),
            (CoefficientFamily::D21, diff.d21),
            (CoefficientFamily::D22, diff.d22),
        ] {
            store.fill(family, value)?;
        }
        info!(
            "扩散项: Drr={}, D11={}, D12={}, D21={}, D22={}",
            diff.drr, diff.d11, diff.d12, diff.d21, diff.d22
        );
        op.set_diffusion(term);
    }

    Ok(op)
}

/// 沿 p1 的高斯分布，各半径与 p2 上相同
pub fn initial_distribution(config: &InitialConfig, grid: &Grid) -> Vec<f64> {
    let mut f = Vec::with_capacity(grid.n_cells());
    for ir in 0..grid.nr() {
        let m = grid.momentum(ir);
        for _ in 0..m.n2() {
            f.extend(m.p1().iter().map(|&p| {
                let s = (p - config.center) / config.width;
                config.amplitude * (-s * s).exp()
            }));
        }
    }
    f
}

/// 插值格式
pub fn scheme(config: InterpolationSchemeConfig) -> InterpolationScheme {
    match config {
        InterpolationSchemeConfig::Central => InterpolationScheme::Central,
        InterpolationSchemeConfig::Upwind => InterpolationScheme::Upwind,
        InterpolationSchemeConfig::Downwind => InterpolationScheme::Downwind,
        InterpolationSchemeConfig::Custom(w) => InterpolationScheme::Fixed(w),
    }
}

fn radial_geometry(kind: RadialGeometryKind) -> RadialGeometry {
    match kind {
        RadialGeometryKind::Slab => RadialGeometry::Slab,
        RadialGeometryKind::Cylindrical => RadialGeometry::Cylindrical,
    }
}

fn momentum_geometry(kind: MomentumGeometryKind) -> MomentumGeometry {
    match kind {
        MomentumGeometryKind::Cartesian => MomentumGeometry::Cartesian,
        MomentumGeometryKind::SphericalPxi => MomentumGeometry::SphericalPXi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_radius_grids_are_shared() {
        let mut config = GridConfig::default();
        config.nr = 3;
        config.per_radius = Some(vec![[4, 2], [6, 2], [4, 2]]);
        let grid = build_grid(&config).unwrap();
        assert_eq!(grid.n_cells(), 8 + 12 + 8);
        assert!(Arc::ptr_eq(&grid.momentum_arc(0), &grid.momentum_arc(2)));
        assert!(!grid.is_uniform());
    }

    #[test]
    fn test_initial_distribution_peaks_at_center() {
        let config = ScenarioConfig::default();
        let grid = build_grid(&config.grid).unwrap();
        let f = initial_distribution(&config.initial, &grid);
        assert_eq!(f.len(), grid.n_cells());
        let n1 = grid.n1(0);
        let peak = (0..n1).max_by(|&a, &b| f[a].total_cmp(&f[b])).unwrap();
        let p = grid.momentum(0).p1()[peak];
        assert!((p - config.initial.center).abs() <= grid.momentum(0).dp1()[peak]);
    }

    #[test]
    fn test_inactive_terms_are_skipped() {
        let config = ScenarioConfig::default();
        let grid = build_grid(&config.grid).unwrap();
        let op = build_operator(&config, grid).unwrap();
        assert!(op.is_empty());
    }
}
