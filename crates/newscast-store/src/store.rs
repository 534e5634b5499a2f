//! Database handle.

use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::articles::ArticleRepository;
use crate::error::StoreResult;
use crate::productions::ProductionRepository;
use crate::schema;

/// Shared SQLite connection.
///
/// Cheap to clone; every clone uses the same connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        info!(path = %path.display(), "Opened database");
        Ok(Self::from_connection(conn))
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Create all tables. Safe to call repeatedly.
    pub async fn init_schema(&self) -> StoreResult<()> {
        let db = self.conn.lock().await;
        for statement in schema::ALL {
            db.execute(statement, [])?;
        }
        Ok(())
    }

    pub fn articles(&self) -> ArticleRepository {
        ArticleRepository::new(self.conn.clone())
    }

    pub fn productions(&self) -> ProductionRepository {
        ProductionRepository::new(self.conn.clone())
    }
}
