//! 对外统一错误类型
//!
//! 门面的所有失败都归入这里的类型化结果，任何操作都不允许让调用方
//! 崩溃。解密失败不在此列：对调用方来说损坏的凭证等价于未配置，
//! `get_config` 直接返回空。

use sproutly_core::errors::{StoreError, ValidationError};
use sproutly_credential::CipherError;
use thiserror::Error;

/// 配置子系统错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 校验失败，消息可直接面向用户
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// 存储层失败，指示设备级问题
    #[error("存储层错误: {0}")]
    Storage(#[from] StoreError),

    /// 凭证加密失败
    #[error("凭证加密失败: {0}")]
    Encryption(#[from] CipherError),

    /// 内部任务失败
    #[error("内部任务失败: {0}")]
    Internal(String),
}

impl ConfigError {
    /// 面向用户的提示文案
    ///
    /// 校验错误原样展示；加密和存储错误统一为通用提示，避免把内部
    /// 细节泄露到界面上。
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Validation(e) => e.to_string(),
            ConfigError::Storage(_) | ConfigError::Encryption(_) | ConfigError::Internal(_) => {
                "服务暂不可用，请重新配置".to_string()
            }
        }
    }
}
