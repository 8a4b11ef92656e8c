// apps/kf_cli/src/commands/mod.rs

//! 子命令实现

pub mod assemble;
pub mod info;
pub mod setup;
pub mod validate;
