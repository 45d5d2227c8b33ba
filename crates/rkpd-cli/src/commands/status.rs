use std::collections::BTreeMap;

use colored::Colorize;
use time::OffsetDateTime;

use crate::{context::Context, error::CliResult};

#[derive(Default)]
struct PoolCounts {
    total: usize,
    assigned: usize,
    expired: usize,
}

pub fn handle(ctx: &Context) -> CliResult<()> {
    println!("{}", format!("密钥库: {}", ctx.db_path.display()).cyan().bold());
    println!("目标空闲密钥数: {}", ctx.config.extra_signed_keys_available);
    println!();

    let now = OffsetDateTime::now_utc();
    let mut pools: BTreeMap<String, PoolCounts> = BTreeMap::new();
    for key in ctx.store.all_keys()? {
        let counts = pools.entry(key.component.clone()).or_default();
        counts.total += 1;
        if key.is_assigned() {
            counts.assigned += 1;
        } else if key.is_expired_at(now) {
            counts.expired += 1;
        }
    }

    if pools.is_empty() {
        println!("{}", "密钥库为空".yellow());
        return Ok(());
    }

    for (component, counts) in &pools {
        let unassigned = ctx.store.total_unassigned_keys_for_component(component, now)?;
        let line = format!(
            "  {component}: 总计 {} / 已分配 {} / 空闲 {} / 过期 {}",
            counts.total, counts.assigned, unassigned, counts.expired
        );
        if unassigned < ctx.config.extra_signed_keys_available {
            println!("{}", line.yellow());
        } else {
            println!("{}", line.green());
        }
    }
    Ok(())
}
