//! 模型健康跟踪模块
//!
//! 每个模型维护一组指数移动平均的成功/错误率（近似大小为 W 的滑动
//! 窗口）和一个熔断器。状态只存在于内存：进程重启后所有模型回到
//! "未知即不健康"的默认值。
//!
//! 移动平均以 O(1) 的内存和更新成本近似固定窗口，代价是旧结果衰减
//! 比真实窗口慢。这里只做软健康信号，不承诺硬 SLA。
//!
//! 并发：状态表使用 DashMap，按模型键做互斥更新，不同模型之间不会
//! 相互阻塞。

use crate::models::{ModelHealthStatus, ModelKind};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

/// 滑动窗口大小
pub const HEALTH_WINDOW: f64 = 10.0;

/// 错误率超过该阈值时打开熔断器
const BREAKER_ERROR_THRESHOLD: f64 = 0.5;

/// 成功率超过该阈值才视为健康
const HEALTHY_SUCCESS_THRESHOLD: f64 = 0.5;

/// 熔断冷却时长（秒）
const BREAKER_COOLDOWN_SECS: i64 = 60;

/// 模型健康跟踪器
#[derive(Default)]
pub struct HealthTracker {
    /// 模型 -> 健康状态
    states: DashMap<ModelKind, ModelHealthStatus>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次调用结果
    ///
    /// 这是健康状态唯一的写入口：每次实际的 Provider 调用之后，
    /// 无论成功失败都必须上报。
    pub fn record_outcome(&self, model: ModelKind, success: bool) {
        self.record_outcome_at(model, success, Utc::now());
    }

    /// 以显式时间戳记录调用结果（测试可注入时间）
    pub(crate) fn record_outcome_at(
        &self,
        model: ModelKind,
        success: bool,
        now: DateTime<Utc>,
    ) {
        let mut entry = self.states.entry(model).or_default();
        let status = entry.value_mut();

        let outcome = if success { 1.0 } else { 0.0 };
        status.success_rate =
            clamp01((status.success_rate * (HEALTH_WINDOW - 1.0) + outcome) / HEALTH_WINDOW);
        status.error_rate = clamp01(
            (status.error_rate * (HEALTH_WINDOW - 1.0) + (1.0 - outcome)) / HEALTH_WINDOW,
        );

        if success {
            status.last_success_time = Some(now);
        } else {
            status.last_error_time = Some(now);
        }

        if status.error_rate > BREAKER_ERROR_THRESHOLD {
            if !status.in_circuit_breaker {
                warn!(
                    model = %model,
                    error_rate = status.error_rate,
                    "错误率超过阈值，打开熔断器"
                );
            }
            status.in_circuit_breaker = true;
            status.circuit_breaker_until = Some(now + Duration::seconds(BREAKER_COOLDOWN_SECS));
        } else {
            let still_cooling = status.in_circuit_breaker
                && status
                    .circuit_breaker_until
                    .map(|until| until > now)
                    .unwrap_or(false);

            if status.in_circuit_breaker && !still_cooling {
                info!(model = %model, "熔断冷却结束，关闭熔断器");
            }

            status.in_circuit_breaker = still_cooling;
            if !still_cooling {
                status.circuit_breaker_until = None;
            }
        }

        status.is_healthy =
            !status.in_circuit_breaker && status.success_rate > HEALTHY_SUCCESS_THRESHOLD;

        debug!(
            model = %model,
            success,
            success_rate = status.success_rate,
            error_rate = status.error_rate,
            in_circuit_breaker = status.in_circuit_breaker,
            "记录调用结果"
        );
    }

    /// 获取模型的健康状态快照，从不产生副作用
    ///
    /// 快照在读取侧应用冷却到期检查：冷却已过的熔断器对调用方呈现
    /// 为已关闭，即使之后没有任何调用结果触发重新评估。
    pub fn get_status(&self, model: ModelKind) -> ModelHealthStatus {
        self.status_at(model, Utc::now())
    }

    /// 以显式时间戳获取健康状态快照
    pub(crate) fn status_at(&self, model: ModelKind, now: DateTime<Utc>) -> ModelHealthStatus {
        let mut snapshot = self
            .states
            .get(&model)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        if snapshot.in_circuit_breaker {
            let expired = snapshot
                .circuit_breaker_until
                .map(|until| until <= now)
                .unwrap_or(true);

            if expired {
                snapshot.in_circuit_breaker = false;
                snapshot.circuit_breaker_until = None;
                snapshot.is_healthy = snapshot.success_rate > HEALTHY_SUCCESS_THRESHOLD;
            }
        }

        snapshot
    }

    /// 重置所有模型的健康状态为默认值
    pub fn reset_all(&self) {
        self.states.clear();
        info!("已重置全部模型健康状态");
    }
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
