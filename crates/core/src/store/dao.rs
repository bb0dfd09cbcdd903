//! 应用设置数据访问层
//!
//! 提供设置键值表的 CRUD 操作。所有方法都接收 `&Connection`，
//! 事务控制由调用方负责。

use rusqlite::{params, Connection, OptionalExtension};

/// 设置表 DAO
pub struct SettingsDao;

impl SettingsDao {
    /// 初始化设置表
    pub fn init_table(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS app_settings (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// 读取设置值
    pub fn get(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
        conn.query_row(
            "SELECT value FROM app_settings WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()
    }

    /// 读取设置值及其更新时间（Unix 秒）
    pub fn get_with_timestamp(
        conn: &Connection,
        key: &str,
    ) -> Result<Option<(String, i64)>, rusqlite::Error> {
        conn.query_row(
            "SELECT value, updated_at FROM app_settings WHERE key = ?1",
            [key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
    }

    /// 写入设置值（upsert，单键原子）
    pub fn set(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO app_settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    /// 删除单个键
    pub fn delete(conn: &Connection, key: &str) -> Result<(), rusqlite::Error> {
        conn.execute("DELETE FROM app_settings WHERE key = ?1", [key])?;
        Ok(())
    }

    /// 删除指定前缀下的所有键，返回删除数量
    ///
    /// 前缀按字面量匹配，LIKE 通配符会被转义。
    pub fn delete_with_prefix(conn: &Connection, prefix: &str) -> Result<usize, rusqlite::Error> {
        let pattern = format!("{}%", escape_like(prefix));
        let deleted = conn.execute(
            "DELETE FROM app_settings WHERE key LIKE ?1 ESCAPE '\\'",
            [pattern],
        )?;
        Ok(deleted)
    }
}

/// 转义 LIKE 模式中的通配符
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
