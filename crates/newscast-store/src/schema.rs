//! Table definitions.

pub(crate) const CREATE_ARTICLES: &str = "CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    title TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    summary TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL DEFAULT '',
    image_url TEXT,
    published_at TEXT,
    crawled_at TEXT NOT NULL,
    category TEXT,
    selected INTEGER NOT NULL DEFAULT 0,
    used_in_production INTEGER
)";

pub(crate) const CREATE_ARTICLES_SELECTED_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_articles_selected ON articles (selected, crawled_at)";

pub(crate) const CREATE_PRODUCTIONS: &str = "CREATE TABLE IF NOT EXISTS productions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    narration TEXT,
    article_ids TEXT NOT NULL DEFAULT '[]',
    audio_path TEXT,
    video_path TEXT,
    thumbnail_path TEXT,
    duration REAL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    completed_at TEXT,
    external_id TEXT,
    external_url TEXT,
    uploaded INTEGER NOT NULL DEFAULT 0,
    uploaded_at TEXT,
    views INTEGER NOT NULL DEFAULT 0,
    likes INTEGER NOT NULL DEFAULT 0,
    comments INTEGER NOT NULL DEFAULT 0,
    metrics_refreshed_at TEXT,
    failure_stage TEXT,
    failure_message TEXT
)";

pub(crate) const ALL: &[&str] = &[CREATE_ARTICLES, CREATE_ARTICLES_SELECTED_INDEX, CREATE_PRODUCTIONS];
