//! 配置存储模块
//!
//! 按（模型, 环境, 字段）派生确定性键名的持久化键值存储，进程重启后
//! 数据保留。凭证只以加密 blob 形态写入；端点 URL 以明文存储。
//!
//! 持久化键布局：
//! - `ai_config_<model>_<env>_credential` - 加密凭证 blob
//! - `ai_config_<model>_<env>_endpoint` - 端点 URL
//! - `current_environment` - 当前环境
//! - `domain_whitelist` - 逗号分隔的域名白名单

mod dao;

pub use dao::SettingsDao;

use crate::errors::StoreError;
use crate::models::{Environment, ModelKind};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// 数据库连接（跨线程共享，写操作在连接锁下串行）
pub type DbConnection = Arc<Mutex<Connection>>;

/// 配置键前缀
const KEY_PREFIX: &str = "ai_config_";

/// 当前环境键
const KEY_CURRENT_ENVIRONMENT: &str = "current_environment";

/// 域名白名单键（逗号分隔）
const KEY_DOMAIN_WHITELIST: &str = "domain_whitelist";

/// 配置字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    /// 加密凭证
    Credential,
    /// 端点 URL
    Endpoint,
}

impl ConfigField {
    fn as_str(&self) -> &'static str {
        match self {
            ConfigField::Credential => "credential",
            ConfigField::Endpoint => "endpoint",
        }
    }
}

/// 派生配置键名
///
/// 键名由模型和环境共同决定，切换环境或模型不会互相覆盖。
pub fn config_key(model: ModelKind, env: Environment, field: ConfigField) -> String {
    format!(
        "{}{}_{}_{}",
        KEY_PREFIX,
        model.storage_key(),
        env.storage_key(),
        field.as_str()
    )
}

/// 配置存储
pub struct ConfigStore {
    db: DbConnection,
}

impl ConfigStore {
    /// 打开磁盘存储，父目录不存在时自动创建
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 平台数据目录下的默认存储位置
    pub fn default_location() -> Result<std::path::PathBuf, StoreError> {
        dirs::data_dir()
            .map(|dir| dir.join("sproutly").join("config.db"))
            .ok_or(StoreError::DataDirUnavailable)
    }

    /// 打开内存存储（测试用）
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 基于已有连接创建存储并初始化表结构
    pub fn from_connection(db: DbConnection) -> Result<Self, StoreError> {
        {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            SettingsDao::init_table(&conn)?;
        }
        Ok(Self { db })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.db.lock().map_err(|_| StoreError::LockPoisoned)
    }

    // ------------------------------------------------------------------------
    // 凭证与端点
    // ------------------------------------------------------------------------

    /// 写入加密凭证 blob
    pub fn set_credential(
        &self,
        model: ModelKind,
        env: Environment,
        blob: &str,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        SettingsDao::set(&conn, &config_key(model, env, ConfigField::Credential), blob)?;
        Ok(())
    }

    /// 读取加密凭证 blob
    pub fn get_credential(
        &self,
        model: ModelKind,
        env: Environment,
    ) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        Ok(SettingsDao::get(
            &conn,
            &config_key(model, env, ConfigField::Credential),
        )?)
    }

    /// 写入端点 URL
    pub fn set_endpoint(
        &self,
        model: ModelKind,
        env: Environment,
        url: &str,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        SettingsDao::set(&conn, &config_key(model, env, ConfigField::Endpoint), url)?;
        Ok(())
    }

    /// 读取端点 URL
    pub fn get_endpoint(
        &self,
        model: ModelKind,
        env: Environment,
    ) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        Ok(SettingsDao::get(
            &conn,
            &config_key(model, env, ConfigField::Endpoint),
        )?)
    }

    /// 在单个事务内写入提供的字段（全部成功或全部不写）
    pub fn set_config(
        &self,
        model: ModelKind,
        env: Environment,
        credential_blob: Option<&str>,
        endpoint: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if let Some(blob) = credential_blob {
            SettingsDao::set(&tx, &config_key(model, env, ConfigField::Credential), blob)?;
        }
        if let Some(url) = endpoint {
            SettingsDao::set(&tx, &config_key(model, env, ConfigField::Endpoint), url)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 模型在指定环境下是否已完整配置（凭证与端点都存在）
    pub fn is_configured(&self, model: ModelKind, env: Environment) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let credential =
            SettingsDao::get(&conn, &config_key(model, env, ConfigField::Credential))?;
        let endpoint = SettingsDao::get(&conn, &config_key(model, env, ConfigField::Endpoint))?;
        Ok(credential.is_some() && endpoint.is_some())
    }

    /// 配置的最后更新时间（凭证与端点中较新的一个）
    pub fn config_updated_at(
        &self,
        model: ModelKind,
        env: Environment,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.lock()?;
        let mut latest: Option<i64> = None;
        for field in [ConfigField::Credential, ConfigField::Endpoint] {
            if let Some((_, ts)) =
                SettingsDao::get_with_timestamp(&conn, &config_key(model, env, field))?
            {
                latest = Some(latest.map_or(ts, |cur| cur.max(ts)));
            }
        }
        Ok(latest.and_then(|ts| DateTime::from_timestamp(ts, 0)))
    }

    // ------------------------------------------------------------------------
    // 全局设置
    // ------------------------------------------------------------------------

    /// 读取当前环境，未设置时默认生产环境
    pub fn current_environment(&self) -> Result<Environment, StoreError> {
        let conn = self.lock()?;
        let stored = SettingsDao::get(&conn, KEY_CURRENT_ENVIRONMENT)?;

        Ok(match stored {
            Some(value) => Environment::from_storage_key(&value).unwrap_or_else(|| {
                warn!(value, "存储的当前环境无法识别，回退到生产环境");
                Environment::Production
            }),
            None => Environment::Production,
        })
    }

    /// 写入当前环境
    pub fn set_current_environment(&self, env: Environment) -> Result<(), StoreError> {
        let conn = self.lock()?;
        SettingsDao::set(&conn, KEY_CURRENT_ENVIRONMENT, env.storage_key())?;
        Ok(())
    }

    /// 读取域名白名单（逗号分隔值解析并去除空白项）
    pub fn domain_allow_list(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let stored = SettingsDao::get(&conn, KEY_DOMAIN_WHITELIST)?;

        Ok(stored
            .map(|value| {
                value
                    .split(',')
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// 写入域名白名单
    pub fn set_domain_allow_list(&self, domains: &[String]) -> Result<(), StoreError> {
        let conn = self.lock()?;
        SettingsDao::set(&conn, KEY_DOMAIN_WHITELIST, &domains.join(","))?;
        Ok(())
    }

    /// 清空本存储命名空间下的所有键
    ///
    /// 用于整体凭证重置（如删除用户档案）。
    pub fn clear_all(&self) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let deleted = SettingsDao::delete_with_prefix(&tx, KEY_PREFIX)?;
        SettingsDao::delete(&tx, KEY_CURRENT_ENVIRONMENT)?;
        SettingsDao::delete(&tx, KEY_DOMAIN_WHITELIST)?;

        tx.commit()?;
        info!(deleted, "已清空全部模型配置");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> ConfigStore {
        ConfigStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_key_derivation_never_collides() {
        let mut keys = std::collections::HashSet::new();
        for model in ModelKind::CATALOG {
            for env in Environment::all() {
                for field in [ConfigField::Credential, ConfigField::Endpoint] {
                    assert!(keys.insert(config_key(model, *env, field)));
                }
            }
        }
    }

    #[test]
    fn test_key_layout_matches_contract() {
        assert_eq!(
            config_key(
                ModelKind::TextGenPrimary,
                Environment::Production,
                ConfigField::Credential
            ),
            "ai_config_text_gen_primary_production_credential"
        );
    }

    #[test]
    fn test_environment_isolation() {
        let store = test_store();
        store
            .set_credential(ModelKind::Embedding, Environment::Development, "enc2:dev")
            .unwrap();

        assert_eq!(
            store
                .get_credential(ModelKind::Embedding, Environment::Production)
                .unwrap(),
            None
        );
        assert_eq!(
            store
                .get_credential(ModelKind::Embedding, Environment::Development)
                .unwrap(),
            Some("enc2:dev".to_string())
        );
    }

    #[test]
    fn test_current_environment_defaults_to_production() {
        let store = test_store();
        assert_eq!(store.current_environment().unwrap(), Environment::Production);

        store.set_current_environment(Environment::Test).unwrap();
        assert_eq!(store.current_environment().unwrap(), Environment::Test);
    }

    #[test]
    fn test_domain_allow_list_parsing() {
        let store = test_store();
        assert!(store.domain_allow_list().unwrap().is_empty());

        store
            .set_domain_allow_list(&[
                "api.openai.com".to_string(),
                " generativelanguage.googleapis.com ".to_string(),
            ])
            .unwrap();

        // 手工写入带空白和空项的值也能正确解析
        {
            let conn = store.lock().unwrap();
            SettingsDao::set(
                &conn,
                KEY_DOMAIN_WHITELIST,
                "api.openai.com, dashscope.aliyuncs.com, ,",
            )
            .unwrap();
        }
        assert_eq!(
            store.domain_allow_list().unwrap(),
            vec![
                "api.openai.com".to_string(),
                "dashscope.aliyuncs.com".to_string()
            ]
        );
    }

    #[test]
    fn test_set_config_writes_both_fields() {
        let store = test_store();
        store
            .set_config(
                ModelKind::ImageGen,
                Environment::Production,
                Some("enc2:blob"),
                Some("https://api.example.com"),
            )
            .unwrap();

        assert!(store
            .is_configured(ModelKind::ImageGen, Environment::Production)
            .unwrap());
        assert!(store
            .config_updated_at(ModelKind::ImageGen, Environment::Production)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_is_configured_requires_both_fields() {
        let store = test_store();
        store
            .set_endpoint(
                ModelKind::Reranker,
                Environment::Production,
                "https://api.example.com",
            )
            .unwrap();
        assert!(!store
            .is_configured(ModelKind::Reranker, Environment::Production)
            .unwrap());
    }

    #[test]
    fn test_clear_all_wipes_namespace() {
        let store = test_store();
        store
            .set_config(
                ModelKind::TextGenPrimary,
                Environment::Production,
                Some("enc2:blob"),
                Some("https://api.example.com"),
            )
            .unwrap();
        store.set_current_environment(Environment::Test).unwrap();
        store
            .set_domain_allow_list(&["api.example.com".to_string()])
            .unwrap();

        store.clear_all().unwrap();

        assert!(!store
            .is_configured(ModelKind::TextGenPrimary, Environment::Production)
            .unwrap());
        assert_eq!(store.current_environment().unwrap(), Environment::Production);
        assert!(store.domain_allow_list().unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.db");

        {
            let store = ConfigStore::open(&path).unwrap();
            store
                .set_endpoint(
                    ModelKind::Embedding,
                    Environment::Production,
                    "https://api.example.com",
                )
                .unwrap();
        }

        let reopened = ConfigStore::open(&path).unwrap();
        assert_eq!(
            reopened
                .get_endpoint(ModelKind::Embedding, Environment::Production)
                .unwrap(),
            Some("https://api.example.com".to_string())
        );
    }
}
