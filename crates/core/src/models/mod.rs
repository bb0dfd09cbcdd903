//! 模型目录与配置值对象
//!
//! 定义环境、模型目录（构建期固定）、能力映射，以及配置和健康状态的
//! 值对象。模型目录新增条目时只需要修改本文件的目录常量和能力映射。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 配置环境
///
/// 所有持久化配置都按环境隔离，同一时刻只有一个"当前环境"。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum Environment {
    /// 开发环境
    Development,
    /// 测试环境
    Test,
    /// 生产环境（默认）
    #[default]
    Production,
}

impl Environment {
    /// 获取存储键名
    pub fn storage_key(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }

    /// 从存储键名解析
    pub fn from_storage_key(key: &str) -> Option<Self> {
        match key {
            "development" => Some(Environment::Development),
            "test" => Some(Environment::Test),
            "production" => Some(Environment::Production),
            _ => None,
        }
    }

    /// 获取所有环境
    pub fn all() -> &'static [Environment] {
        &[
            Environment::Development,
            Environment::Test,
            Environment::Production,
        ]
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// 模型能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCapability {
    /// 文本生成
    TextGeneration,
    /// 向量嵌入
    Embedding,
    /// 重排序
    Reranking,
    /// 图片生成
    ImageGeneration,
}

impl ModelCapability {
    /// 获取能力的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelCapability::TextGeneration => "文本生成",
            ModelCapability::Embedding => "向量嵌入",
            ModelCapability::Reranking => "重排序",
            ModelCapability::ImageGeneration => "图片生成",
        }
    }
}

impl std::fmt::Display for ModelCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// 模型目录条目
///
/// 每个条目对应一个 Provider 用途的固定组合，构建期确定、运行期不变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// 主力文本生成模型
    TextGenPrimary,
    /// 备用文本生成模型
    TextGenSecondary,
    /// 向量嵌入模型
    Embedding,
    /// 重排序模型
    Reranker,
    /// 图片生成模型
    ImageGen,
}

impl ModelKind {
    /// 模型目录（顺序即路由同分时的优先顺序）
    pub const CATALOG: [ModelKind; 5] = [
        ModelKind::TextGenPrimary,
        ModelKind::TextGenSecondary,
        ModelKind::Embedding,
        ModelKind::Reranker,
        ModelKind::ImageGen,
    ];

    /// 获取存储键名
    pub fn storage_key(&self) -> &'static str {
        match self {
            ModelKind::TextGenPrimary => "text_gen_primary",
            ModelKind::TextGenSecondary => "text_gen_secondary",
            ModelKind::Embedding => "embedding",
            ModelKind::Reranker => "reranker",
            ModelKind::ImageGen => "image_gen",
        }
    }

    /// 从存储键名解析
    pub fn from_storage_key(key: &str) -> Option<Self> {
        Self::CATALOG
            .into_iter()
            .find(|m| m.storage_key() == key)
    }

    /// 获取模型的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::TextGenPrimary => "主力文本生成",
            ModelKind::TextGenSecondary => "备用文本生成",
            ModelKind::Embedding => "向量嵌入",
            ModelKind::Reranker => "重排序",
            ModelKind::ImageGen => "图片生成",
        }
    }

    /// 模型具备的能力（静态映射，构建期固定）
    pub fn capabilities(&self) -> &'static [ModelCapability] {
        match self {
            ModelKind::TextGenPrimary | ModelKind::TextGenSecondary => {
                &[ModelCapability::TextGeneration]
            }
            ModelKind::Embedding => &[ModelCapability::Embedding],
            ModelKind::Reranker => &[ModelCapability::Reranking],
            ModelKind::ImageGen => &[ModelCapability::ImageGeneration],
        }
    }

    /// 是否具备指定能力
    pub fn supports(&self, capability: ModelCapability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// 按目录顺序返回具备指定能力的模型
    pub fn with_capability(capability: ModelCapability) -> impl Iterator<Item = ModelKind> {
        Self::CATALOG
            .into_iter()
            .filter(move |m| m.supports(capability))
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// 模型配置值对象
///
/// 只在读取时构造，从不整体持久化。明文凭证不得写入存储或日志，
/// Debug 输出会对凭证脱敏。
#[derive(Clone)]
pub struct ModelConfig {
    /// 模型
    pub model: ModelKind,
    /// 解密后的凭证
    pub credential: String,
    /// 端点 URL
    pub endpoint: String,
    /// 所属环境
    pub environment: Environment,
    /// 最后更新时间
    pub updated_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("model", &self.model)
            .field("credential", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("environment", &self.environment)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// 模型健康状态快照
///
/// 只存在于内存，进程重启后全部回到默认值（未知即不健康）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelHealthStatus {
    /// 是否健康
    pub is_healthy: bool,
    /// 成功率（0-1，指数移动平均）
    pub success_rate: f64,
    /// 错误率（0-1，指数移动平均）
    pub error_rate: f64,
    /// 最近一次成功时间
    pub last_success_time: Option<DateTime<Utc>>,
    /// 最近一次失败时间
    pub last_error_time: Option<DateTime<Utc>>,
    /// 熔断器是否打开
    pub in_circuit_breaker: bool,
    /// 熔断冷却截止时间
    pub circuit_breaker_until: Option<DateTime<Utc>>,
}

impl Default for ModelHealthStatus {
    fn default() -> Self {
        Self {
            is_healthy: false,
            success_rate: 0.0,
            error_rate: 0.0,
            last_success_time: None,
            last_error_time: None,
            in_circuit_breaker: false,
            circuit_breaker_until: None,
        }
    }
}
