use colored::Colorize;
use rkpd_pki::{decode_chain, validate_chain};

use super::{fingerprint, format_time};
use crate::{
    context::Context,
    error::{CliError, CliResult},
};

pub fn handle(ctx: &Context, id: i64) -> CliResult<()> {
    let key = ctx
        .store
        .all_keys()?
        .into_iter()
        .find(|key| key.id == Some(id))
        .ok_or(CliError::KeyNotFound(id))?;

    println!("{}", format!("密钥 #{id}").cyan().bold());
    println!("  组件: {}", key.component);
    println!("  公钥: {}", hex::encode(&key.public_key));
    println!("  密钥句柄: {}…", fingerprint(&key.key_blob));
    println!("  过期时间: {}", format_time(key.expiration_time));
    match &key.assignment {
        Some(a) => println!(
            "  分配: client {} / irpc {} ({})",
            a.client_uid,
            a.irpc_uid,
            format_time(a.assigned_at)
        ),
        None => println!("  分配: {}", "未分配".green()),
    }

    let certs = decode_chain(&key.certificate_chain)?;
    println!();
    println!("{}", format!("证书链 ({} 个证书):", certs.len()).cyan());
    for (index, cert) in certs.iter().enumerate() {
        println!("  [{index}] {}", cert.info.subject);
        println!("      颁发者: {}", cert.info.issuer);
        println!(
            "      有效期: {} → {}",
            format_time(cert.info.not_before),
            format_time(cert.info.not_after)
        );
        println!("      算法: {}", cert.info.signature_algorithm);
    }

    match validate_chain(&certs) {
        Ok(()) => println!("{}", "✓ 证书链验证通过".green().bold()),
        Err(e) => println!("{}", format!("✗ 证书链验证失败: {e}").red().bold()),
    }
    Ok(())
}
