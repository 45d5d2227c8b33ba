use colored::Colorize;
use time::{Duration, OffsetDateTime};

use super::format_time;
use crate::{context::Context, error::CliResult};

pub fn handle(ctx: &Context, within_secs: Option<u64>) -> CliResult<()> {
    let horizon = match within_secs {
        Some(secs) => Duration::seconds(secs.min(i64::MAX as u64) as i64),
        None => ctx.config.expiring_by(),
    };
    let cutoff = OffsetDateTime::now_utc() + horizon;

    let deleted = ctx.store.delete_expiring_keys(cutoff)?;
    println!(
        "{}",
        format!("已删除 {deleted} 个在 {} 前过期的密钥", format_time(cutoff))
            .green()
            .bold()
    );
    Ok(())
}
