//! 凭证保护 crate
//!
//! 为 Sproutly 的 AI Provider 凭证提供静态加密能力。
//!
//! ## 模块结构
//!
//! - `vault` - 密钥保管库抽象（文件/内存实现）
//! - `cipher` - 凭证字符串加解密封装

mod cipher;
mod vault;

pub use cipher::{CipherError, CredentialCipher};
pub use vault::{derive_key, FileKeyVault, KeyVault, MemoryKeyVault, VaultError, KEY_LEN, NONCE_SIZE};
