// apps/kf_cli/src/commands/assemble.rs

//! 装配命令
//!
//! 每步重建算子、装配 `I - dt·A`，以 BiCGStab 求解
//! `(I - dt·A) x = x_prev + dt·b`，并报告粒子数守恒与矩阵统计。

use super::setup::{build_grid, build_operator, initial_distribution};
use anyhow::{bail, Context, Result};
use clap::Args;
use kf_config::ScenarioConfig;
use kf_fvm::block_matrix::BlockMatrix;
use kf_fvm::dump::CoefficientDump;
use kf_fvm::grid::Grid;
use kf_fvm::linear_algebra::{BiCgStabSolver, IterativeSolver, JacobiPreconditioner, SolverConfig};
use kf_fvm::operator::Operator;
use kf_fvm::unknowns::{UnknownQuantityHandler, UnknownSource};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// 装配参数
#[derive(Args)]
pub struct AssembleArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 系数导出文件，覆盖配置中的 output.coefficient_dump
    #[arg(short, long)]
    pub dump: Option<PathBuf>,

    /// 覆盖配置中的步数
    #[arg(long)]
    pub steps: Option<usize>,
}

/// 执行装配命令
pub fn execute(args: AssembleArgs) -> Result<()> {
    let config = ScenarioConfig::from_file(&args.config)
        .with_context(|| format!("读取配置失败: {}", args.config.display()))?;
    info!("=== 算例 {} ===", config.name);

    let grid = build_grid(&config.grid)?;
    let report = grid.validate();
    for warning in &report.warnings {
        warn!("网格: {}", warning);
    }
    if !report.is_valid() {
        bail!("网格无效:\n{}", report);
    }
    info!("网格: nr={}, {} 个单元", grid.nr(), grid.n_cells());

    let mut op = build_operator(&config, grid.clone())?;
    if op.is_empty() {
        warn!("所有输运系数为零，矩阵为单位阵");
    }

    let mut unknowns = UnknownQuantityHandler::new();
    let f = unknowns.insert("f", grid.n_cells(), 1)?;
    let initial = initial_distribution(&config.initial, &grid);
    unknowns.set_initial_value(f, Some(initial.as_slice()), 0.0)?;

    let mut matrix = BlockMatrix::new();
    let block = matrix.create_sub_equation("f", grid.n_cells(), op.nnz_per_row() + 1)?;
    matrix.construct_system()?;

    let volumes = grid.cell_volumes();
    let initial_total = total_particles(unknowns.data(f)?, &volumes);

    let dt = config.transient.dt;
    let steps = args.steps.unwrap_or(config.transient.steps);
    let mut solver_config = SolverConfig::new(config.solver.rtol, config.solver.max_iter)
        .with_atol(config.solver.atol);
    if config.solver.verbose {
        solver_config = solver_config.verbose();
    }
    let mut solver = BiCgStabSolver::new(solver_config);

    let start = Instant::now();
    let mut t = 0.0;
    let mut total_iterations = 0;
    for step in 1..=steps {
        op.rebuild(t, dt, &unknowns)
            .with_context(|| format!("第 {} 步重建失败", step))?;

        matrix.zero();
        let mut rhs = vec![0.0; grid.n_cells()];
        op.build_matrix(&mut matrix, block, Some(&mut rhs))
            .with_context(|| format!("第 {} 步装配失败", step))?;
        matrix.i_minus_dt_a(block, dt)?;
        let a = matrix.assemble()?;

        let previous = unknowns.data(f)?;
        let b: Vec<f64> = previous.iter().zip(&rhs).map(|(x, r)| x + dt * r).collect();
        let mut x = previous.to_vec();
        let precond = JacobiPreconditioner::from_matrix(&a);
        let result = solver.solve(&a, &b, &mut x, &precond);
        total_iterations += result.iterations;
        if !result.is_converged() {
            warn!(
                "第 {} 步未收敛: {:?}, 相对残差 {:.3e}",
                step, result.status, result.relative_residual
            );
        }

        t += dt;
        unknowns.save_step(t, false);
        unknowns.store(f, &x, 0, true)?;
        if step == 1 || step == steps {
            info!("步 {}: t={:.4e}, 迭代 {} 次", step, t, result.iterations);
        }
    }

    let final_total = total_particles(unknowns.data(f)?, &volumes);
    let drift = if initial_total != 0.0 {
        (final_total - initial_total) / initial_total
    } else {
        final_total - initial_total
    };

    info!("=== 装配完成 ===");
    info!("矩阵: {} 行, {} 个非零元", matrix.size(), matrix.nnz());
    if matrix.overflow_count() > 0 {
        warn!("{} 次写入超出预留容量", matrix.overflow_count());
    }
    info!("步数: {}, 总迭代 {} 次", steps, total_iterations);
    info!("粒子数: {:.6e} -> {:.6e} (相对变化 {:.3e})", initial_total, final_total, drift);
    info!("耗时: {:.3} s", start.elapsed().as_secs_f64());

    if let Some(path) = args.dump.or_else(|| config.output.coefficient_dump.clone()) {
        dump_coefficients(&mut op, &grid, &path)?;
    }

    Ok(())
}

fn total_particles(f: &[f64], volumes: &[f64]) -> f64 {
    f.iter().zip(volumes).map(|(f, v)| f * v).sum()
}

fn dump_coefficients(op: &mut Operator, grid: &Grid, path: &Path) -> Result<()> {
    let mut dump = CoefficientDump::new();
    let (advection, diffusion) = op.transport_terms_mut();
    if let Some(term) = advection {
        dump.add_store(grid, term.coefficients())?;
    }
    if let Some(term) = diffusion {
        dump.add_store(grid, term.coefficients())?;
    }
    dump.write_json(path)
        .with_context(|| format!("写入系数失败: {}", path.display()))?;
    info!("系数导出: {} 族 -> {}", dump.entries.len(), path.display());
    Ok(())
}
