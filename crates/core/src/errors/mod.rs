//! 错误类型模块
//!
//! 定义配置子系统内部的错误类型：
//! - `ValidationError` - 端点 URL / 凭证形态校验失败，消息可直接面向用户
//! - `StoreError` - 持久化存储层失败

use thiserror::Error;

/// 配置校验错误
///
/// 畸形输入是预期情况，全部以错误值返回，从不 panic。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("URL 无法解析: {0}")]
    MalformedUrl(String),

    #[error("端点必须使用 https: {0}")]
    InsecureScheme(String),

    #[error("端点不允许携带查询参数: {0}")]
    QueryNotAllowed(String),

    #[error("端点不允许携带片段: {0}")]
    FragmentNotAllowed(String),

    #[error("端点缺少域名: {0}")]
    MissingHost(String),

    #[error("域名不在白名单中: {0}")]
    DomainNotAllowed(String),

    #[error("凭证不能为空")]
    EmptyCredential,

    #[error("凭证长度不能少于 {min} 个字符")]
    CredentialTooShort { min: usize },
}

/// 存储层错误
///
/// 指示设备级问题（数据库不可用等），按失败结果向上传播，不静默吞掉。
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("数据库操作失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("数据库连接锁被污染")]
    LockPoisoned,

    #[error("无法解析数据目录")]
    DataDirUnavailable,

    #[error("存储目录操作失败: {0}")]
    Io(#[from] std::io::Error),
}
