use colored::Colorize;

use crate::{
    context::Context,
    error::{CliError, CliResult},
};

pub fn handle(ctx: &Context, yes: bool) -> CliResult<()> {
    if !yes {
        return Err(CliError::InvalidInput(
            "clearing the key store is irreversible; pass --yes".to_string(),
        ));
    }
    let deleted = ctx.store.delete_all_keys()?;
    println!("{}", format!("已删除 {deleted} 个密钥").green().bold());
    Ok(())
}
