//! Article repository.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use newscast_models::{Article, ArticleDraft, ArticleId, ProductionId};

use crate::error::{StoreError, StoreResult};
use crate::time;

const COLUMNS: &str = "id, source, title, url, summary, body, image_url, published_at, crawled_at, category, selected, used_in_production";

/// Raw column values, converted into [`Article`] outside the row callback.
struct ArticleRow {
    id: i64,
    source: String,
    title: String,
    url: String,
    summary: String,
    body: String,
    image_url: Option<String>,
    published_at: Option<String>,
    crawled_at: String,
    category: Option<String>,
    selected: bool,
    used_in_production: Option<i64>,
}

impl ArticleRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source: row.get(1)?,
            title: row.get(2)?,
            url: row.get(3)?,
            summary: row.get(4)?,
            body: row.get(5)?,
            image_url: row.get(6)?,
            published_at: row.get(7)?,
            crawled_at: row.get(8)?,
            category: row.get(9)?,
            selected: row.get(10)?,
            used_in_production: row.get(11)?,
        })
    }
}

impl TryFrom<ArticleRow> for Article {
    type Error = StoreError;

    fn try_from(row: ArticleRow) -> StoreResult<Self> {
        Ok(Article {
            id: ArticleId(row.id),
            source: row.source,
            title: row.title,
            url: row.url,
            summary: row.summary,
            body: row.body,
            image_url: row.image_url,
            published_at: time::opt_from_text(row.published_at)?,
            crawled_at: time::from_text(&row.crawled_at)?,
            category: row.category,
            selected: row.selected,
            used_in_production: row.used_in_production.map(ProductionId),
        })
    }
}

/// Repository for stored articles.
#[derive(Clone)]
pub struct ArticleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ArticleRepository {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Store supplier drafts. Drafts whose URL is already stored, or that
    /// lack a title or URL, are skipped. Returns the number inserted.
    pub async fn insert_drafts(&self, drafts: &[ArticleDraft]) -> StoreResult<usize> {
        let crawled_at = time::to_text(&Utc::now());
        let mut db = self.conn.lock().await;
        let tx = db.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO articles
                    (source, title, url, summary, body, image_url, published_at, crawled_at, category)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for draft in drafts {
                let draft = draft.clone().normalized();
                if !draft.is_valid() {
                    debug!(url = %draft.url, "Skipping incomplete article");
                    continue;
                }
                inserted += stmt.execute(params![
                    draft.source,
                    draft.title,
                    draft.url,
                    draft.summary,
                    draft.body,
                    draft.image_url,
                    time::opt_to_text(&draft.published_at),
                    crawled_at,
                    draft.category,
                ])?;
            }
        }
        tx.commit()?;
        info!(offered = drafts.len(), inserted, "Stored articles");
        Ok(inserted)
    }

    /// Select the newest unselected articles and mark them selected, in one
    /// transaction. A claimed article is never returned again.
    pub async fn claim_for_production(&self, limit: usize) -> StoreResult<Vec<Article>> {
        let mut db = self.conn.lock().await;
        let tx = db.transaction()?;
        let rows = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM articles WHERE selected = 0
                 ORDER BY COALESCE(published_at, crawled_at) DESC, id DESC
                 LIMIT ?1",
                COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![limit as i64], ArticleRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        for row in &rows {
            tx.execute("UPDATE articles SET selected = 1 WHERE id = ?1", params![row.id])?;
        }
        tx.commit()?;

        rows.into_iter()
            .map(|row| {
                let mut article = Article::try_from(row)?;
                article.selected = true;
                Ok(article)
            })
            .collect()
    }

    /// Record which production used `ids`. Articles already attached keep
    /// their first production.
    pub async fn attach_to_production(&self, ids: &[ArticleId], production_id: ProductionId) -> StoreResult<usize> {
        let db = self.conn.lock().await;
        let mut updated = 0;
        for id in ids {
            updated += db.execute(
                "UPDATE articles SET used_in_production = ?1 WHERE id = ?2 AND used_in_production IS NULL",
                params![production_id.as_i64(), id.as_i64()],
            )?;
        }
        Ok(updated)
    }

    pub async fn get(&self, id: ArticleId) -> StoreResult<Option<Article>> {
        let db = self.conn.lock().await;
        let row = db
            .query_row(
                &format!("SELECT {} FROM articles WHERE id = ?1", COLUMNS),
                params![id.as_i64()],
                ArticleRow::from_row,
            )
            .optional()?;
        row.map(Article::try_from).transpose()
    }

    /// Fetch several articles, in the order of `ids`. Missing ids are skipped.
    pub async fn get_many(&self, ids: &[ArticleId]) -> StoreResult<Vec<Article>> {
        let mut articles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(article) = self.get(*id).await? {
                articles.push(article);
            }
        }
        Ok(articles)
    }

    pub async fn count_unselected(&self) -> StoreResult<usize> {
        let db = self.conn.lock().await;
        let count: i64 = db.query_row("SELECT COUNT(*) FROM articles WHERE selected = 0", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use chrono::TimeZone;

    async fn repo() -> ArticleRepository {
        let store = Store::open_in_memory().unwrap();
        store.init_schema().await.unwrap();
        store.articles()
    }

    fn draft(n: u32) -> ArticleDraft {
        ArticleDraft::new("wire", format!("Headline {}", n), format!("https://news.example/{}", n))
            .with_summary("Summary")
            .with_published_at(Utc.with_ymd_and_hms(2024, 1, 1, n, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_duplicate_urls_are_ignored() {
        let repo = repo().await;
        assert_eq!(repo.insert_drafts(&[draft(1), draft(2)]).await.unwrap(), 2);
        assert_eq!(repo.insert_drafts(&[draft(2), draft(3)]).await.unwrap(), 1);
        assert_eq!(repo.count_unselected().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_incomplete_drafts_are_skipped() {
        let repo = repo().await;
        let blank = ArticleDraft::new("wire", "   ", "https://news.example/blank");
        assert_eq!(repo.insert_drafts(&[blank]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_claim_returns_newest_first_and_marks_selected() {
        let repo = repo().await;
        repo.insert_drafts(&[draft(1), draft(5), draft(3)]).await.unwrap();

        let claimed = repo.claim_for_production(2).await.unwrap();
        let titles: Vec<_> = claimed.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Headline 5", "Headline 3"]);
        assert!(claimed.iter().all(|a| a.selected));

        let second = repo.claim_for_production(10).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].title, "Headline 1");
        assert!(repo.claim_for_production(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attach_sets_production_once() {
        let repo = repo().await;
        repo.insert_drafts(&[draft(1)]).await.unwrap();
        let claimed = repo.claim_for_production(1).await.unwrap();
        let ids: Vec<_> = claimed.iter().map(|a| a.id).collect();

        assert_eq!(repo.attach_to_production(&ids, ProductionId(4)).await.unwrap(), 1);
        assert_eq!(repo.attach_to_production(&ids, ProductionId(9)).await.unwrap(), 0);

        let stored = repo.get(ids[0]).await.unwrap().unwrap();
        assert_eq!(stored.used_in_production, Some(ProductionId(4)));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let repo = repo().await;
        assert!(repo.get(ArticleId(42)).await.unwrap().is_none());
    }
}
