//! 配置管理门面
//!
//! 组合存储、加密、健康跟踪和能力路由，向应用其余部分暴露单一契约。
//! 所有触碰持久化存储的操作都是 async 的，内部通过 `spawn_blocking`
//! 执行，存储延迟不会卡住交互线程。
//!
//! 凭证生命周期：解密后的凭证只在单次调用的返回值里存在，子系统
//! 内部不缓存明文。

use crate::audit::{AuditEventKind, AuditSink, TracingAuditSink};
use crate::error::ConfigError;
use sproutly_core::validator::{validate_credential, validate_endpoint_url};
use sproutly_core::{
    CapabilityRouter, ConfigStore, Environment, HealthTracker, ModelCapability, ModelConfig,
    ModelHealthStatus, ModelKind,
};
use sproutly_credential::{CredentialCipher, FileKeyVault, KeyVault};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 保管库中凭证加密密钥的别名
pub const CREDENTIAL_KEY_ALIAS: &str = "sproutly_ai_config";

/// 默认审计操作者标识
const DEFAULT_ACTOR: &str = "system";

/// 配置管理器
pub struct ConfigManager {
    store: Arc<ConfigStore>,
    cipher: Arc<CredentialCipher>,
    health: Arc<HealthTracker>,
    router: Arc<CapabilityRouter>,
    audit: Arc<dyn AuditSink>,
    actor: String,
}

impl ConfigManager {
    /// 创建配置管理器
    ///
    /// 构造时幂等地完成保管库密钥初始化。
    pub fn new(
        store: Arc<ConfigStore>,
        vault: Arc<dyn KeyVault>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        let cipher = Arc::new(CredentialCipher::new(vault, CREDENTIAL_KEY_ALIAS)?);
        let health = Arc::new(HealthTracker::new());
        let router = Arc::new(CapabilityRouter::new(store.clone(), health.clone()));

        Ok(Self {
            store,
            cipher,
            health,
            router,
            audit,
            actor: DEFAULT_ACTOR.to_string(),
        })
    }

    /// 使用平台默认路径创建（数据目录下的存储文件 + 文件密钥保管库）
    pub fn with_defaults() -> Result<Self, ConfigError> {
        let store = Arc::new(ConfigStore::open(ConfigStore::default_location()?)?);

        let key_dir = FileKeyVault::default_location()
            .ok_or_else(|| ConfigError::Internal("无法解析密钥目录".to_string()))?;
        let vault = FileKeyVault::new(key_dir)
            .map_err(|e| ConfigError::Internal(format!("初始化密钥保管库失败: {e}")))?;

        Self::new(store, Arc::new(vault), Arc::new(TracingAuditSink))
    }

    /// 设置审计操作者标识
    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    // ------------------------------------------------------------------------
    // 配置读写
    // ------------------------------------------------------------------------

    /// 更新模型在当前环境下的配置
    ///
    /// 提供的字段先整体校验（端点按当前域名白名单检查），任一校验
    /// 失败则一个字段都不写入。凭证在落盘前加密。成功后发出审计
    /// 事件（只含字段名，不含值）。
    pub async fn update_config(
        &self,
        model: ModelKind,
        credential: Option<String>,
        endpoint: Option<String>,
    ) -> Result<(), ConfigError> {
        if credential.is_none() && endpoint.is_none() {
            debug!(model = %model, "没有需要更新的字段");
            return Ok(());
        }

        let store = self.store.clone();
        let cipher = self.cipher.clone();

        let changed = self
            .run_blocking(move || {
                let env = store.current_environment()?;
                let allow_list = store.domain_allow_list()?;

                // 先整体校验，再落盘
                if let Some(value) = credential.as_deref() {
                    validate_credential(value)?;
                }
                if let Some(url) = endpoint.as_deref() {
                    validate_endpoint_url(url, &allow_list)?;
                }

                let blob = match credential.as_deref() {
                    Some(value) => Some(cipher.encrypt(value)?),
                    None => None,
                };

                store.set_config(model, env, blob.as_deref(), endpoint.as_deref())?;

                let mut changed: Vec<&'static str> = Vec::new();
                if blob.is_some() {
                    changed.push("credential");
                }
                if endpoint.is_some() {
                    changed.push("endpoint");
                }
                Ok(changed)
            })
            .await?;

        info!(model = %model, fields = ?changed, "模型配置已更新");
        self.audit
            .record(AuditEventKind::ConfigUpdated, Some(model), &changed, &self.actor);
        Ok(())
    }

    /// 读取模型在当前环境下的配置
    ///
    /// 凭证或端点任一缺失时返回 `None`。解密失败同样返回 `None`：
    /// 对调用方来说损坏的凭证和未配置没有区别。存储失败会传播。
    pub async fn get_config(&self, model: ModelKind) -> Result<Option<ModelConfig>, ConfigError> {
        let store = self.store.clone();
        let cipher = self.cipher.clone();

        self.run_blocking(move || {
            let env = store.current_environment()?;

            let blob = match store.get_credential(model, env)? {
                Some(blob) => blob,
                None => return Ok(None),
            };
            let endpoint = match store.get_endpoint(model, env)? {
                Some(url) => url,
                None => return Ok(None),
            };

            let credential = match cipher.decrypt(&blob) {
                Ok(value) => value,
                Err(e) => {
                    warn!(model = %model, error = %e, "凭证解密失败，视为未配置");
                    return Ok(None);
                }
            };

            Ok(Some(ModelConfig {
                model,
                credential,
                endpoint,
                environment: env,
                updated_at: store.config_updated_at(model, env)?,
            }))
        })
        .await
    }

    /// 当前环境下已完整配置的模型（设置界面用）
    pub async fn configured_models(&self) -> Result<Vec<ModelKind>, ConfigError> {
        let store = self.store.clone();
        self.run_blocking(move || {
            let env = store.current_environment()?;
            let mut configured = Vec::new();
            for model in ModelKind::CATALOG {
                if store.is_configured(model, env)? {
                    configured.push(model);
                }
            }
            Ok(configured)
        })
        .await
    }

    // ------------------------------------------------------------------------
    // 环境与白名单
    // ------------------------------------------------------------------------

    /// 切换当前环境
    ///
    /// 各环境的配置相互独立，切换不清空、不迁移任何凭证。
    pub async fn switch_environment(&self, env: Environment) -> Result<(), ConfigError> {
        let store = self.store.clone();
        self.run_blocking(move || Ok(store.set_current_environment(env)?))
            .await?;

        info!(env = %env, "已切换当前环境");
        self.audit.record(
            AuditEventKind::EnvironmentSwitched,
            None,
            &["current_environment"],
            &self.actor,
        );
        Ok(())
    }

    /// 读取当前环境
    pub async fn current_environment(&self) -> Result<Environment, ConfigError> {
        let store = self.store.clone();
        self.run_blocking(move || Ok(store.current_environment()?))
            .await
    }

    /// 读取域名白名单
    pub async fn domain_allow_list(&self) -> Result<Vec<String>, ConfigError> {
        let store = self.store.clone();
        self.run_blocking(move || Ok(store.domain_allow_list()?))
            .await
    }

    /// 更新域名白名单（空白项被丢弃）
    pub async fn update_domain_allow_list(
        &self,
        domains: Vec<String>,
    ) -> Result<(), ConfigError> {
        let store = self.store.clone();
        self.run_blocking(move || {
            let cleaned: Vec<String> = domains
                .iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect();
            Ok(store.set_domain_allow_list(&cleaned)?)
        })
        .await?;

        self.audit.record(
            AuditEventKind::ConfigUpdated,
            None,
            &["domain_whitelist"],
            &self.actor,
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // 健康与路由
    // ------------------------------------------------------------------------

    /// 读取模型健康状态快照
    pub fn get_health_status(&self, model: ModelKind) -> ModelHealthStatus {
        self.health.get_status(model)
    }

    /// 上报一次调用结果
    ///
    /// 这是健康状态唯一的写入口。执行过实际 Provider 请求的调用方，
    /// 成功失败都必须上报。错误消息只进日志，不进存储。
    pub fn update_health_status(
        &self,
        model: ModelKind,
        success: bool,
        error_message: Option<&str>,
    ) {
        if let Some(message) = error_message {
            warn!(model = %model, error = %message, "模型调用失败");
        }
        self.health.record_outcome(model, success);
    }

    /// 全部目录模型的健康状态快照（诊断界面用）
    pub fn health_overview(&self) -> Vec<(ModelKind, ModelHealthStatus)> {
        ModelKind::CATALOG
            .into_iter()
            .map(|model| (model, self.health.get_status(model)))
            .collect()
    }

    /// 返回具备指定能力、已配置且健康的模型，按成功率降序
    ///
    /// 在路由结果之上再次确认配置仍然存在，防住"路由筛选后配置被
    /// 清空"的竞态。空列表是正常结果，调用方应走离线降级路径。
    pub async fn healthy_models_for_capability(
        &self,
        capability: ModelCapability,
    ) -> Result<Vec<ModelKind>, ConfigError> {
        let store = self.store.clone();
        let router = self.router.clone();

        self.run_blocking(move || {
            let mut candidates = router.candidates_for(capability)?;
            let env = store.current_environment()?;

            let mut confirmed = Vec::with_capacity(candidates.len());
            for model in candidates.drain(..) {
                if store.is_configured(model, env)? {
                    confirmed.push(model);
                } else {
                    debug!(model = %model, "候选模型的配置已不存在，剔除");
                }
            }
            Ok(confirmed)
        })
        .await
    }

    // ------------------------------------------------------------------------
    // 重置
    // ------------------------------------------------------------------------

    /// 清空全部配置并重置健康状态
    ///
    /// 用于整体凭证重置（如删除用户档案）。
    pub async fn clear_all_configs(&self) -> Result<(), ConfigError> {
        let store = self.store.clone();
        self.run_blocking(move || Ok(store.clear_all()?)).await?;

        self.health.reset_all();
        info!("全部模型配置与健康状态已重置");
        self.audit
            .record(AuditEventKind::ConfigCleared, None, &[], &self.actor);
        Ok(())
    }

    /// 在阻塞线程池上执行存储操作
    async fn run_blocking<T, F>(&self, task: F) -> Result<T, ConfigError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ConfigError> + Send + 'static,
    {
        tokio::task::spawn_blocking(task)
            .await
            .map_err(|e| ConfigError::Internal(e.to_string()))?
    }
}
