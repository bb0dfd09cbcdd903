//! 配置审计模块
//!
//! 配置变更需要留痕：谁、对哪个模型、改了哪些字段。审计记录只包含
//! 字段名，从不包含字段值（凭证明文和密文都不允许进入审计通道）。
//!
//! 审计是 fire-and-forget 的：落地失败不允许影响主操作，接口也因此
//! 不返回错误。

use sproutly_core::ModelKind;

/// 审计事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventKind {
    /// 模型配置更新
    ConfigUpdated,
    /// 全部配置清空
    ConfigCleared,
    /// 环境切换
    EnvironmentSwitched,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::ConfigUpdated => "config_updated",
            AuditEventKind::ConfigCleared => "config_cleared",
            AuditEventKind::EnvironmentSwitched => "environment_switched",
        }
    }
}

/// 审计落地接口
///
/// 由外部协作方实现（数据库、远端日志等）。实现必须不阻塞、不失败，
/// 无法落地时自行丢弃。
pub trait AuditSink: Send + Sync {
    /// 记录一条审计事件
    ///
    /// `changed_fields` 只允许包含字段名。
    fn record(
        &self,
        kind: AuditEventKind,
        model: Option<ModelKind>,
        changed_fields: &[&str],
        actor: &str,
    );
}

/// 默认审计实现：输出到 tracing 的 audit target
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(
        &self,
        kind: AuditEventKind,
        model: Option<ModelKind>,
        changed_fields: &[&str],
        actor: &str,
    ) {
        tracing::info!(
            target: "audit",
            kind = kind.as_str(),
            model = model.map(|m| m.storage_key()),
            fields = ?changed_fields,
            actor,
            "配置审计事件"
        );
    }
}
