//! 凭证加密封装
//!
//! 在密钥保管库之上提供字符串形态的凭证加解密：
//! - 认证加密（防篡改），nonce 由保管库每次随机生成
//! - 格式：enc2:base64(nonce || ciphertext || tag)
//! - 构造时幂等地完成别名下的密钥初始化
//!
//! 任何失败路径都不返回部分明文；调用方将失败视为"凭证不可用"。

use crate::vault::{KeyVault, VaultError, NONCE_SIZE};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::Arc;
use thiserror::Error;

/// 加密前缀标识
const ENCRYPTED_PREFIX: &str = "enc2:";

/// 凭证加解密错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("加密失败")]
    EncryptFailed,

    #[error("解密失败：密钥错误或数据被篡改")]
    DecryptFailed,

    #[error("无效的加密格式")]
    InvalidFormat,

    #[error("无效的 Base64 编码")]
    InvalidBase64,

    #[error("无效的 UTF-8 编码")]
    InvalidUtf8,

    #[error("密钥不可用: {0}")]
    KeyUnavailable(String),
}

impl From<VaultError> for CipherError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::KeyUnavailable(msg) => CipherError::KeyUnavailable(msg),
            VaultError::EncryptFailed => CipherError::EncryptFailed,
            VaultError::DecryptFailed => CipherError::DecryptFailed,
            VaultError::Io(err) => CipherError::KeyUnavailable(err.to_string()),
        }
    }
}

/// 凭证加密器
///
/// 持有保管库引用和密钥别名，负责字符串编解码和格式校验。
pub struct CredentialCipher {
    vault: Arc<dyn KeyVault>,
    alias: String,
}

impl CredentialCipher {
    /// 创建凭证加密器，并确保别名下的密钥已就绪
    pub fn new(vault: Arc<dyn KeyVault>, alias: &str) -> Result<Self, CipherError> {
        vault.generate_key_if_absent(alias)?;
        Ok(Self {
            vault,
            alias: alias.to_string(),
        })
    }

    /// 加密明文凭证
    ///
    /// 返回格式：enc2:base64(nonce || ciphertext || tag)
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let blob = self
            .vault
            .encrypt_under_key(&self.alias, plaintext.as_bytes())?;
        Ok(format!("{}{}", ENCRYPTED_PREFIX, BASE64.encode(blob)))
    }

    /// 解密凭证密文
    pub fn decrypt(&self, encrypted: &str) -> Result<String, CipherError> {
        let encoded = encrypted
            .strip_prefix(ENCRYPTED_PREFIX)
            .ok_or(CipherError::InvalidFormat)?;

        let blob = BASE64
            .decode(encoded)
            .map_err(|_| CipherError::InvalidBase64)?;

        if blob.len() < NONCE_SIZE {
            return Err(CipherError::InvalidFormat);
        }

        let plaintext = self.vault.decrypt_under_key(&self.alias, &blob)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }

    /// 检查文本是否已加密
    pub fn is_encrypted(text: &str) -> bool {
        text.starts_with(ENCRYPTED_PREFIX)
    }

    /// 加密（如果尚未加密）
    pub fn encrypt_if_needed(&self, text: &str) -> Result<String, CipherError> {
        if Self::is_encrypted(text) {
            Ok(text.to_string())
        } else {
            self.encrypt(text)
        }
    }

    /// 解密（如果已加密）
    pub fn decrypt_if_needed(&self, text: &str) -> Result<String, CipherError> {
        if Self::is_encrypted(text) {
            self.decrypt(text)
        } else {
            Ok(text.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::MemoryKeyVault;
    use proptest::prelude::*;

    const ALIAS: &str = "test_alias";

    fn test_cipher() -> CredentialCipher {
        CredentialCipher::new(Arc::new(MemoryKeyVault::new()), ALIAS).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = test_cipher();
        let plaintext = "sk-abc123-secret-api-key";
        let encrypted = cipher.encrypt(plaintext).unwrap();
        assert!(encrypted.starts_with(ENCRYPTED_PREFIX));
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn test_different_nonces() {
        let cipher = test_cipher();
        let plaintext = "same-plaintext";
        let encrypted1 = cipher.encrypt(plaintext).unwrap();
        let encrypted2 = cipher.encrypt(plaintext).unwrap();
        assert_ne!(encrypted1, encrypted2);
        // 两者都能正确解密
        assert_eq!(cipher.decrypt(&encrypted1).unwrap(), plaintext);
        assert_eq!(cipher.decrypt(&encrypted2).unwrap(), plaintext);
    }

    #[test]
    fn test_tampered_data() {
        let cipher = test_cipher();
        let encrypted = cipher.encrypt("secret").unwrap();

        // 逐个字节翻转，认证都必须失败
        let encoded = encrypted.strip_prefix(ENCRYPTED_PREFIX).unwrap();
        let bytes = BASE64.decode(encoded).unwrap();
        for i in 0..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0xFF;
            let tampered = format!("{}{}", ENCRYPTED_PREFIX, BASE64.encode(&tampered));
            assert_eq!(cipher.decrypt(&tampered), Err(CipherError::DecryptFailed));
        }
    }

    #[test]
    fn test_invalid_format() {
        let cipher = test_cipher();
        assert_eq!(cipher.decrypt("no-prefix"), Err(CipherError::InvalidFormat));
        assert_eq!(cipher.decrypt(""), Err(CipherError::InvalidFormat));
    }

    #[test]
    fn test_invalid_base64() {
        let cipher = test_cipher();
        assert_eq!(
            cipher.decrypt("enc2:!!!invalid-base64!!!"),
            Err(CipherError::InvalidBase64)
        );
    }

    #[test]
    fn test_blob_shorter_than_nonce() {
        let cipher = test_cipher();
        let short = format!("{}{}", ENCRYPTED_PREFIX, BASE64.encode([0u8; 4]));
        assert_eq!(cipher.decrypt(&short), Err(CipherError::InvalidFormat));
    }

    #[test]
    fn test_is_encrypted() {
        assert!(CredentialCipher::is_encrypted("enc2:abc123"));
        assert!(!CredentialCipher::is_encrypted("plain-text"));
        assert!(!CredentialCipher::is_encrypted("enc1:old-format"));
        assert!(!CredentialCipher::is_encrypted(""));
    }

    #[test]
    fn test_encrypt_if_needed_already_encrypted() {
        let cipher = test_cipher();
        let already = "enc2:already-encrypted-data";
        assert_eq!(cipher.encrypt_if_needed(already).unwrap(), already);
    }

    #[test]
    fn test_decrypt_if_needed_not_encrypted() {
        let cipher = test_cipher();
        assert_eq!(cipher.decrypt_if_needed("not-encrypted").unwrap(), "not-encrypted");
    }

    #[test]
    fn test_unicode_content() {
        let cipher = test_cipher();
        let plaintext = "你好世界 🌍 こんにちは";
        let encrypted = cipher.encrypt(plaintext).unwrap();
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn test_empty_string() {
        let cipher = test_cipher();
        let encrypted = cipher.encrypt("").unwrap();
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "");
    }

    #[test]
    fn test_wrong_vault_key_fails() {
        let cipher1 = test_cipher();
        let cipher2 = test_cipher();
        let encrypted = cipher1.encrypt("secret").unwrap();
        assert_eq!(cipher2.decrypt(&encrypted), Err(CipherError::DecryptFailed));
    }

    #[test]
    fn test_new_runs_idempotent_key_generation() {
        let vault: Arc<dyn KeyVault> = Arc::new(MemoryKeyVault::new());

        let first = CredentialCipher::new(vault.clone(), ALIAS).unwrap();
        let encrypted = first.encrypt("secret").unwrap();

        // 再次构造不会轮换密钥，旧密文仍可解密
        let second = CredentialCipher::new(vault, ALIAS).unwrap();
        assert_eq!(second.decrypt(&encrypted).unwrap(), "secret");
    }

    proptest! {
        #[test]
        fn prop_roundtrip_any_credential(plaintext in "\\PC{16,64}") {
            let cipher = test_cipher();
            let encrypted = cipher.encrypt(&plaintext).unwrap();
            prop_assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
        }
    }
}
