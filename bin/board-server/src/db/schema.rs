//! Schema bootstrap for the `messages` table.
//!
//! The table is created idempotently after every successful pool open, so a
//! database that was recreated while the server was running is usable again
//! as soon as the connection manager reconnects.
//!
//! `created_at` is stored as RFC 3339 text: the `Any` driver has no portable
//! timestamp type.

use sqlx::AnyPool;

/// SQL dialect, picked from the database URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    /// Infer the dialect from a sqlx connection URL.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "sqlite" => Some(Dialect::Sqlite),
            _ => None,
        }
    }

    fn create_messages(self) -> &'static str {
        match self {
            Dialect::MySql => {
                "CREATE TABLE IF NOT EXISTS messages (\
                     id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY, \
                     content VARCHAR(1000) NOT NULL, \
                     created_at VARCHAR(40) NOT NULL\
                 ) CHARACTER SET utf8mb4"
            }
            Dialect::Sqlite => {
                "CREATE TABLE IF NOT EXISTS messages (\
                     id INTEGER PRIMARY KEY AUTOINCREMENT, \
                     content TEXT NOT NULL, \
                     created_at TEXT NOT NULL\
                 )"
            }
        }
    }
}

/// Create the `messages` table if it does not exist yet.
pub async fn bootstrap(pool: &AnyPool, dialect: Dialect) -> Result<(), sqlx::Error> {
    sqlx::query(dialect.create_messages()).execute(pool).await?;
    tracing::debug!(?dialect, "messages schema ready");
    Ok(())
}
