//! RKPD 密钥存储诊断工具

mod commands;
mod context;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use context::Context;
use error::CliResult;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rkpd")]
#[command(about = "RKPD 密钥存储诊断工具 - inspect and maintain provisioned attestation keys")]
#[command(version)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "config/rkpd.toml")]
    config: String,

    /// 数据库路径 (覆盖配置文件)
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 按组件显示密钥池状态
    Status,

    /// 列出已存储的密钥
    List {
        /// 仅显示该组件的密钥
        #[arg(short = 'p', long)]
        component: Option<String>,
    },

    /// 显示密钥及其证书链详情
    Show {
        /// 密钥行 ID
        #[arg(short, long)]
        id: i64,
    },

    /// 删除所有密钥
    Clear {
        /// 确认删除
        #[arg(long)]
        yes: bool,
    },

    /// 删除即将过期的密钥
    PurgeExpiring {
        /// 过期时间窗口（秒），默认取配置
        #[arg(long)]
        within_secs: Option<u64>,
    },

    /// 显示最近处理的不良证书时间窗口
    BadWindow,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    let ctx = Context::open(&cli.config, cli.db)?;

    match cli.command {
        Commands::Status => commands::status::handle(&ctx)?,
        Commands::List { component } => commands::list::handle(&ctx, component)?,
        Commands::Show { id } => commands::show::handle(&ctx, id)?,
        Commands::Clear { yes } => commands::clear::handle(&ctx, yes)?,
        Commands::PurgeExpiring { within_secs } => {
            commands::purge_expiring::handle(&ctx, within_secs)?
        }
        Commands::BadWindow => commands::bad_window::handle(&ctx)?,
    }

    Ok(())
}
