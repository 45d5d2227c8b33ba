//! # RKPD - 远程密钥配置
//!
//! 为硬件安全组件配置并分发证明密钥
//!
//! ## 模块
//!
//! - `rkpd_pki` - 证书链解析与验证
//! - `rkpd_store` - 已配置密钥存储
//! - `rkpd_provisioner` - 配置引擎与密钥分配

pub use rkpd_pki;
pub use rkpd_provisioner;
pub use rkpd_store;
