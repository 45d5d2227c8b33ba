use colored::Colorize;

use super::format_time;
use crate::{context::Context, error::CliResult};

pub fn handle(ctx: &Context) -> CliResult<()> {
    match ctx.store.last_bad_cert_window()? {
        Some(record) => {
            println!("{}", "最近处理的不良证书窗口:".cyan().bold());
            println!("  开始: {}", format_time(record.range.start));
            println!("  结束: {}", format_time(record.range.end));
            println!("  版本: {}", record.version);
        }
        None => println!("{}", "尚未处理任何不良证书窗口".yellow()),
    }
    Ok(())
}
