//! Sproutly AI 配置子系统
//!
//! 为 Sproutly 儿童教育应用提供 AI Provider 的配置管理、凭证保护与
//! 基于健康状态的路由。本 crate 是对外门面，实际能力由子 crate 提供：
//!
//! - sproutly-core crate（模型目录、校验、持久化存储、健康跟踪、能力路由）
//! - sproutly-credential crate（密钥保管库、凭证加密）
//!
//! 典型调用流程：调用方先通过 [`ConfigManager::healthy_models_for_capability`]
//! 拿到候选模型，按顺序取第一个并用 [`ConfigManager::get_config`] 获取
//! 凭证与端点，自行完成 HTTP 调用后，无论成功失败都必须回报
//! [`ConfigManager::update_health_status`]。

mod audit;
mod error;
mod manager;

pub use audit::{AuditEventKind, AuditSink, TracingAuditSink};
pub use error::ConfigError;
pub use manager::{ConfigManager, CREDENTIAL_KEY_ALIAS};

// 重新导出子 crate 的类型
pub use sproutly_core::{
    errors::{StoreError, ValidationError},
    validator, CapabilityRouter, ConfigStore, DbConnection, Environment, HealthTracker,
    ModelCapability, ModelConfig, ModelHealthStatus, ModelKind,
};
pub use sproutly_credential::{
    CipherError, CredentialCipher, FileKeyVault, KeyVault, MemoryKeyVault, VaultError,
};
