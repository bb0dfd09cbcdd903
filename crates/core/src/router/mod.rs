//! 能力路由模块
//!
//! 把"我需要一个能做 X 的模型"解析为一份按健康程度排序、可以逐个
//! 降级尝试的候选列表。路由本身无状态：只读取配置存储和健康跟踪器，
//! 不产生任何写入。

use crate::errors::StoreError;
use crate::health::HealthTracker;
use crate::models::{ModelCapability, ModelKind};
use crate::store::ConfigStore;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// 能力路由器
pub struct CapabilityRouter {
    store: Arc<ConfigStore>,
    health: Arc<HealthTracker>,
}

impl CapabilityRouter {
    pub fn new(store: Arc<ConfigStore>, health: Arc<HealthTracker>) -> Self {
        Self { store, health }
    }

    /// 返回具备指定能力、已配置且健康的模型，按成功率降序排列
    ///
    /// 过滤顺序：
    /// 1. 静态能力映射中具备该能力的模型
    /// 2. 在当前环境下凭证与端点都已配置的模型
    /// 3. 健康且熔断器关闭的模型
    ///
    /// 成功率相同时保持目录顺序（稳定排序）。空列表是正常结果，
    /// 表示调用方应该走离线降级路径。
    pub fn candidates_for(
        &self,
        capability: ModelCapability,
    ) -> Result<Vec<ModelKind>, StoreError> {
        let env = self.store.current_environment()?;
        let mut ranked: Vec<(ModelKind, f64)> = Vec::new();

        for model in ModelKind::with_capability(capability) {
            if !self.store.is_configured(model, env)? {
                debug!(model = %model, env = %env, "模型未配置，跳过");
                continue;
            }

            let status = self.health.get_status(model);
            if !status.is_healthy || status.in_circuit_breaker {
                debug!(
                    model = %model,
                    is_healthy = status.is_healthy,
                    in_circuit_breaker = status.in_circuit_breaker,
                    "模型不可用，跳过"
                );
                continue;
            }

            ranked.push((model, status.success_rate));
        }

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        Ok(ranked.into_iter().map(|(model, _)| model).collect())
    }
}
