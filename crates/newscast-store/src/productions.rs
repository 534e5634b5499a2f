//! Production repository.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use newscast_models::{ArticleId, EngagementMetrics, Production, ProductionId, ProductionStatus, Stage};

use crate::error::{StoreError, StoreResult};
use crate::time;

const COLUMNS: &str = "id, title, narration, article_ids, audio_path, video_path, thumbnail_path, duration, \
     status, created_at, completed_at, external_id, external_url, uploaded, uploaded_at, \
     views, likes, comments, metrics_refreshed_at, failure_stage, failure_message";

struct ProductionRow {
    id: i64,
    title: String,
    narration: Option<String>,
    article_ids: String,
    audio_path: Option<String>,
    video_path: Option<String>,
    thumbnail_path: Option<String>,
    duration: Option<f64>,
    status: String,
    created_at: String,
    completed_at: Option<String>,
    external_id: Option<String>,
    external_url: Option<String>,
    uploaded: bool,
    uploaded_at: Option<String>,
    views: i64,
    likes: i64,
    comments: i64,
    metrics_refreshed_at: Option<String>,
    failure_stage: Option<String>,
    failure_message: Option<String>,
}

impl ProductionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            narration: row.get(2)?,
            article_ids: row.get(3)?,
            audio_path: row.get(4)?,
            video_path: row.get(5)?,
            thumbnail_path: row.get(6)?,
            duration: row.get(7)?,
            status: row.get(8)?,
            created_at: row.get(9)?,
            completed_at: row.get(10)?,
            external_id: row.get(11)?,
            external_url: row.get(12)?,
            uploaded: row.get(13)?,
            uploaded_at: row.get(14)?,
            views: row.get(15)?,
            likes: row.get(16)?,
            comments: row.get(17)?,
            metrics_refreshed_at: row.get(18)?,
            failure_stage: row.get(19)?,
            failure_message: row.get(20)?,
        })
    }
}

fn counter(value: i64) -> u64 {
    value.max(0) as u64
}

fn path_text(path: &Option<PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.to_string_lossy().to_string())
}

impl TryFrom<ProductionRow> for Production {
    type Error = StoreError;

    fn try_from(row: ProductionRow) -> StoreResult<Self> {
        let article_ids: Vec<ArticleId> = serde_json::from_str(&row.article_ids)?;
        let status: ProductionStatus = row.status.parse()?;
        let failure_stage = row.failure_stage.as_deref().map(str::parse::<Stage>).transpose()?;

        Ok(Production {
            id: ProductionId(row.id),
            title: row.title,
            narration: row.narration,
            article_ids,
            audio_path: row.audio_path.map(PathBuf::from),
            video_path: row.video_path.map(PathBuf::from),
            thumbnail_path: row.thumbnail_path.map(PathBuf::from),
            duration_secs: row.duration,
            status,
            created_at: time::from_text(&row.created_at)?,
            completed_at: time::opt_from_text(row.completed_at)?,
            external_id: row.external_id,
            external_url: row.external_url,
            uploaded: row.uploaded,
            uploaded_at: time::opt_from_text(row.uploaded_at)?,
            metrics: EngagementMetrics {
                views: counter(row.views),
                likes: counter(row.likes),
                comments: counter(row.comments),
                refreshed_at: time::opt_from_text(row.metrics_refreshed_at)?,
            },
            failure_stage,
            failure_message: row.failure_message,
        })
    }
}

/// Repository for production records.
#[derive(Clone)]
pub struct ProductionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionRepository {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Insert a pending production.
    pub async fn create(&self, title: &str, article_ids: &[ArticleId]) -> StoreResult<Production> {
        let ids_json = serde_json::to_string(article_ids)?;
        let db = self.conn.lock().await;
        let created_at = Utc::now();
        db.execute(
            "INSERT INTO productions (title, article_ids, status, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![title, ids_json, ProductionStatus::Pending.as_str(), time::to_text(&created_at)],
        )?;
        let id = ProductionId(db.last_insert_rowid());
        debug!(production_id = %id, "Created production");

        let mut production = Production::new(id, title, article_ids.to_vec());
        production.created_at = created_at;
        Ok(production)
    }

    pub async fn get(&self, id: ProductionId) -> StoreResult<Option<Production>> {
        let db = self.conn.lock().await;
        let row = db
            .query_row(
                &format!("SELECT {} FROM productions WHERE id = ?1", COLUMNS),
                params![id.as_i64()],
                ProductionRow::from_row,
            )
            .optional()?;
        row.map(Production::try_from).transpose()
    }

    /// Like [`get`](Self::get) but a missing row is an error.
    pub async fn require(&self, id: ProductionId) -> StoreResult<Production> {
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::not_found("production", id.as_i64()))
    }

    /// Write every mutable column of `production`.
    pub async fn save(&self, production: &Production) -> StoreResult<()> {
        let db = self.conn.lock().await;
        let updated = db.execute(
            "UPDATE productions SET
                title = ?1, narration = ?2, article_ids = ?3, audio_path = ?4, video_path = ?5,
                thumbnail_path = ?6, duration = ?7, status = ?8, completed_at = ?9,
                external_id = ?10, external_url = ?11, uploaded = ?12, uploaded_at = ?13,
                views = ?14, likes = ?15, comments = ?16, metrics_refreshed_at = ?17,
                failure_stage = ?18, failure_message = ?19
             WHERE id = ?20",
            params![
                production.title,
                production.narration,
                serde_json::to_string(&production.article_ids)?,
                path_text(&production.audio_path),
                path_text(&production.video_path),
                path_text(&production.thumbnail_path),
                production.duration_secs,
                production.status.as_str(),
                time::opt_to_text(&production.completed_at),
                production.external_id,
                production.external_url,
                production.uploaded,
                time::opt_to_text(&production.uploaded_at),
                production.metrics.views as i64,
                production.metrics.likes as i64,
                production.metrics.comments as i64,
                time::opt_to_text(&production.metrics.refreshed_at),
                production.failure_stage.map(|s| s.as_str()),
                production.failure_message,
                production.id.as_i64(),
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("production", production.id.as_i64()));
        }
        Ok(())
    }

    /// Newest productions first.
    pub async fn list_recent(&self, limit: usize) -> StoreResult<Vec<Production>> {
        let db = self.conn.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM productions ORDER BY created_at DESC, id DESC LIMIT ?1",
            COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], ProductionRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(Production::try_from).collect()
    }

    /// Store fresh engagement counters.
    pub async fn update_metrics(&self, id: ProductionId, metrics: &EngagementMetrics) -> StoreResult<()> {
        let refreshed_at = metrics.refreshed_at.unwrap_or_else(Utc::now);
        let db = self.conn.lock().await;
        let updated = db.execute(
            "UPDATE productions SET views = ?1, likes = ?2, comments = ?3, metrics_refreshed_at = ?4 WHERE id = ?5",
            params![
                metrics.views as i64,
                metrics.likes as i64,
                metrics.comments as i64,
                time::to_text(&refreshed_at),
                id.as_i64(),
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("production", id.as_i64()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use newscast_models::PublishResult;

    async fn repo() -> ProductionRepository {
        let store = Store::open_in_memory().unwrap();
        store.init_schema().await.unwrap();
        store.productions()
    }

    #[tokio::test]
    async fn test_create_is_pending() {
        let repo = repo().await;
        let created = repo.create("Evening news", &[ArticleId(3), ArticleId(1)]).await.unwrap();

        let stored = repo.require(created.id).await.unwrap();
        assert_eq!(stored.status, ProductionStatus::Pending);
        assert_eq!(stored.article_ids, vec![ArticleId(3), ArticleId(1)]);
        assert_eq!(stored.title, "Evening news");
        assert!(stored.video_path.is_none());
    }

    #[tokio::test]
    async fn test_save_persists_lifecycle() {
        let repo = repo().await;
        let mut production = repo.create("Evening news", &[ArticleId(1)]).await.unwrap();

        production.start_processing().unwrap();
        production.audio_path = Some(PathBuf::from("/data/audio/narration_1.m4a"));
        production
            .complete(PathBuf::from("/data/videos/production_1.mp4"), 118.0)
            .unwrap();
        production
            .mark_uploaded(&PublishResult {
                external_id: "abc123".to_string(),
                url: "https://video.example/abc123".to_string(),
            })
            .unwrap();
        repo.save(&production).await.unwrap();

        let stored = repo.require(production.id).await.unwrap();
        assert_eq!(stored.status, ProductionStatus::Uploaded);
        assert_eq!(stored.duration_secs, Some(118.0));
        assert_eq!(stored.external_id.as_deref(), Some("abc123"));
        assert!(stored.uploaded);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_save_failure_stage() {
        let repo = repo().await;
        let mut production = repo.create("Evening news", &[]).await.unwrap();
        production.start_processing().unwrap();
        production.fail(Stage::Composition, "music step failed").unwrap();
        repo.save(&production).await.unwrap();

        let stored = repo.require(production.id).await.unwrap();
        assert_eq!(stored.status, ProductionStatus::Failed);
        assert_eq!(stored.failure_stage, Some(Stage::Composition));
        assert_eq!(stored.failure_message.as_deref(), Some("music step failed"));
    }

    #[tokio::test]
    async fn test_save_missing_row() {
        let repo = repo().await;
        let ghost = Production::new(ProductionId(77), "ghost", vec![]);
        assert!(repo.save(&ghost).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_recent_and_metrics() {
        let repo = repo().await;
        let first = repo.create("one", &[]).await.unwrap();
        let second = repo.create("two", &[]).await.unwrap();

        repo.update_metrics(
            first.id,
            &EngagementMetrics {
                views: 10,
                likes: 2,
                comments: 1,
                refreshed_at: None,
            },
        )
        .await
        .unwrap();

        let recent = repo.list_recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, second.id);

        let stored = repo.require(first.id).await.unwrap();
        assert_eq!(stored.metrics.views, 10);
        assert!(stored.metrics.refreshed_at.is_some());
    }
}
