// apps/kf_cli/src/main.rs

//! KineticFlux 命令行界面
//!
//! 读取算例配置，构建网格与算子，装配并推进隐式时间步。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// KineticFlux 有限体积装配命令行工具
#[derive(Parser)]
#[command(name = "kf_cli")]
#[command(author = "KineticFlux Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "KineticFlux finite-volume flux assembly", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 装配算子并推进时间步
    Assemble(commands::assemble::AssembleArgs),
    /// 显示信息
    Info(commands::info::InfoArgs),
    /// 验证配置
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // try_init 同时转接库 crate 的 log 记录
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Assemble(args) => commands::assemble::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
