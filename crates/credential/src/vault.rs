//! 密钥保管库抽象
//!
//! 模拟硬件/系统密钥库的最小接口：密钥按别名管理，只能在保管库内部
//! 参与加解密，原始密钥材料不会通过接口暴露。
//!
//! 提供两个实现：
//! - `FileKeyVault` - 桌面端默认实现，密钥落盘在数据目录（Unix 下 0600 权限）
//! - `MemoryKeyVault` - 进程内临时密钥，用于测试和没有安全存储的环境

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Nonce,
};
use parking_lot::RwLock;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// 密钥长度（256-bit）
pub const KEY_LEN: usize = 32;

/// Nonce 长度（12 字节）
pub const NONCE_SIZE: usize = 12;

/// 保管库错误
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("密钥不可用: {0}")]
    KeyUnavailable(String),

    #[error("加密失败")]
    EncryptFailed,

    #[error("解密失败：密钥错误或数据被篡改")]
    DecryptFailed,

    #[error("密钥存储 IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 密钥保管库接口
///
/// 密钥材料不可导出：调用方只能请求"用某个别名下的密钥加解密"。
pub trait KeyVault: Send + Sync {
    /// 幂等地创建别名下的密钥：已存在时不轮换、不重建
    fn generate_key_if_absent(&self, alias: &str) -> Result<(), VaultError>;

    /// 用别名下的密钥加密，返回 nonce ‖ ciphertext ‖ tag
    ///
    /// 每次调用生成新的随机 nonce。
    fn encrypt_under_key(&self, alias: &str, plaintext: &[u8]) -> Result<Vec<u8>, VaultError>;

    /// 解密 nonce ‖ ciphertext ‖ tag，认证失败时返回 `DecryptFailed`
    fn decrypt_under_key(&self, alias: &str, blob: &[u8]) -> Result<Vec<u8>, VaultError>;
}

/// 使用 SHA-256 从口令派生 256-bit 密钥
///
/// 用于从口令保护迁移过来的旧数据，以及测试中构造确定性密钥。
pub fn derive_key(passphrase: &str) -> [u8; KEY_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(passphrase.as_bytes());
    let result = hasher.finalize();
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&result);
    key
}

/// AEAD 加密：生成随机 nonce，返回 nonce ‖ ciphertext ‖ tag
fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
    let cipher = ChaCha20Poly1305::new(key.into());
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| VaultError::EncryptFailed)?;

    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

/// AEAD 解密：拆分 nonce 并校验认证标签
fn open(key: &[u8; KEY_LEN], blob: &[u8]) -> Result<Vec<u8>, VaultError> {
    if blob.len() < NONCE_SIZE {
        return Err(VaultError::DecryptFailed);
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| VaultError::DecryptFailed)
}

// ============================================================================
// 文件密钥保管库
// ============================================================================

/// 文件密钥保管库
///
/// 每个别名对应密钥目录下的一个 hex 编码密钥文件。
pub struct FileKeyVault {
    /// 密钥目录
    key_dir: PathBuf,
    /// 已加载密钥缓存（alias -> key）
    cache: RwLock<HashMap<String, [u8; KEY_LEN]>>,
}

impl FileKeyVault {
    /// 创建文件密钥保管库，目录不存在时自动创建
    pub fn new(key_dir: impl AsRef<Path>) -> Result<Self, VaultError> {
        let key_dir = key_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&key_dir)?;
        Ok(Self {
            key_dir,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// 平台数据目录下的默认密钥目录
    pub fn default_location() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("sproutly").join("keys"))
    }

    fn key_path(&self, alias: &str) -> PathBuf {
        self.key_dir.join(format!("{alias}.key"))
    }

    /// 读取并缓存别名下的密钥
    fn load_key(&self, alias: &str) -> Result<[u8; KEY_LEN], VaultError> {
        if let Some(key) = self.cache.read().get(alias) {
            return Ok(*key);
        }

        let path = self.key_path(alias);
        let encoded = std::fs::read_to_string(&path)
            .map_err(|_| VaultError::KeyUnavailable(format!("密钥文件不存在: {alias}")))?;

        let bytes = hex::decode(encoded.trim())
            .map_err(|_| VaultError::KeyUnavailable(format!("密钥文件损坏: {alias}")))?;
        if bytes.len() != KEY_LEN {
            return Err(VaultError::KeyUnavailable(format!("密钥长度无效: {alias}")));
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        self.cache.write().insert(alias.to_string(), key);
        Ok(key)
    }
}

impl KeyVault for FileKeyVault {
    fn generate_key_if_absent(&self, alias: &str) -> Result<(), VaultError> {
        let path = self.key_path(alias);
        if path.exists() {
            debug!(alias, "密钥已存在，跳过生成");
            return Ok(());
        }

        let mut key = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut key);
        std::fs::write(&path, hex::encode(key))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!(alias, "已生成新的保管库密钥");
        Ok(())
    }

    fn encrypt_under_key(&self, alias: &str, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let key = self.load_key(alias)?;
        seal(&key, plaintext)
    }

    fn decrypt_under_key(&self, alias: &str, blob: &[u8]) -> Result<Vec<u8>, VaultError> {
        let key = self.load_key(alias)?;
        open(&key, blob)
    }
}

// ============================================================================
// 内存密钥保管库
// ============================================================================

/// 内存密钥保管库
///
/// 密钥只存在于进程内，进程退出即丢失。用于测试和没有安全存储的环境。
#[derive(Default)]
pub struct MemoryKeyVault {
    keys: RwLock<HashMap<String, [u8; KEY_LEN]>>,
}

impl MemoryKeyVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用口令派生的密钥预置别名（确定性，便于测试和迁移）
    pub fn with_passphrase_key(self, alias: &str, passphrase: &str) -> Self {
        self.keys
            .write()
            .insert(alias.to_string(), derive_key(passphrase));
        self
    }
}

impl KeyVault for MemoryKeyVault {
    fn generate_key_if_absent(&self, alias: &str) -> Result<(), VaultError> {
        let mut keys = self.keys.write();
        if keys.contains_key(alias) {
            return Ok(());
        }

        let mut key = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut key);
        keys.insert(alias.to_string(), key);
        Ok(())
    }

    fn encrypt_under_key(&self, alias: &str, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let key = *self
            .keys
            .read()
            .get(alias)
            .ok_or_else(|| VaultError::KeyUnavailable(format!("未知别名: {alias}")))?;
        seal(&key, plaintext)
    }

    fn decrypt_under_key(&self, alias: &str, blob: &[u8]) -> Result<Vec<u8>, VaultError> {
        let key = *self
            .keys
            .read()
            .get(alias)
            .ok_or_else(|| VaultError::KeyUnavailable(format!("未知别名: {alias}")))?;
        open(&key, blob)
    }
}
