use colored::Colorize;
use time::OffsetDateTime;

use super::{fingerprint, format_time};
use crate::{context::Context, error::CliResult};

pub fn handle(ctx: &Context, component: Option<String>) -> CliResult<()> {
    let now = OffsetDateTime::now_utc();
    let keys: Vec<_> = ctx
        .store
        .all_keys()?
        .into_iter()
        .filter(|key| component.as_deref().map_or(true, |c| key.component == c))
        .collect();

    println!("{}", format!("共 {} 个密钥", keys.len()).cyan().bold());
    for key in keys {
        let state = match (&key.assignment, key.is_expired_at(now)) {
            (_, true) => "expired".red(),
            (Some(a), false) => format!("assigned to {}/{}", a.client_uid, a.irpc_uid).yellow(),
            (None, false) => "unassigned".green(),
        };
        println!(
            "  #{:<5} {}  {}  expires {}  {}",
            key.id.unwrap_or_default(),
            fingerprint(&key.public_key),
            key.component,
            format_time(key.expiration_time),
            state
        );
    }
    Ok(())
}
