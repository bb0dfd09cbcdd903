//! 核心类型和路由模块
//!
//! 包含模型目录、配置校验、持久化存储、健康跟踪与能力路由。
//!
//! ## 模块结构
//!
//! - `models` - 环境、模型目录与配置/健康值对象
//! - `errors` - 错误类型
//! - `validator` - 端点 URL 和凭证形态校验
//! - `store` - 按（模型, 环境）命名空间的持久化键值存储
//! - `health` - 滑动窗口健康统计与熔断器
//! - `router` - 能力到模型的路由

pub mod errors;
pub mod health;
pub mod models;
pub mod router;
pub mod store;
pub mod validator;

pub use errors::{StoreError, ValidationError};
pub use health::HealthTracker;
pub use models::{Environment, ModelCapability, ModelConfig, ModelHealthStatus, ModelKind};
pub use router::CapabilityRouter;
pub use store::{ConfigStore, DbConnection};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
