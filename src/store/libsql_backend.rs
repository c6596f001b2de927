//! libSQL implementation of the async `Database` trait.
//!
//! Supports local file and in-memory databases. Every keyword state change
//! is a single conditional UPDATE, so concurrent callers never both win.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::campaign::{
    Campaign, CampaignStats, ContentItem, ContentStatus, Keyword, KeywordStatus, NewCampaign,
    NewContent,
};
use crate::error::DatabaseError;
use crate::knowledge::CollectionStatus;
use crate::store::migrations;
use crate::store::traits::{CollectionUpdate, Database};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run a `SELECT COUNT(*)` style query and return the first column.
    async fn count(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row.get(0).unwrap_or(0);
                Ok(count.max(0) as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("{op}: {e}"))),
        }
    }

    async fn query_keyword(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<Keyword>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let keyword = row_to_keyword(&row)
                    .map_err(|e| DatabaseError::Query(format!("{op} row parse: {e}")))?;
                Ok(Some(keyword))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("{op}: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|e| {
        warn!(value = s, "Unparsable date in DB: {e}");
        NaiveDate::default()
    })
}

fn parse_time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .unwrap_or_else(|e| {
            warn!(value = s, "Unparsable publish time in DB: {e}");
            NaiveTime::default()
        })
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_optional_uuid(s: Option<String>) -> Option<Uuid> {
    s.and_then(|s| Uuid::parse_str(&s).ok())
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_uuid(id: Option<Uuid>) -> libsql::Value {
    match id {
        Some(id) => libsql::Value::Text(id.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_datetime(dt: Option<DateTime<Utc>>) -> libsql::Value {
    match dt {
        Some(dt) => libsql::Value::Text(dt.to_rfc3339()),
        None => libsql::Value::Null,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// Map a libsql Row to a Campaign.
///
/// Column order matches CAMPAIGN_COLUMNS.
fn row_to_campaign(row: &libsql::Row) -> Result<Campaign, libsql::Error> {
    let id_str: String = row.get(0)?;
    let start_str: String = row.get(2)?;
    let end_str: String = row.get(3)?;
    let frequency: i64 = row.get(4)?;
    let publish_str: String = row.get(5)?;
    let auto_approve: i64 = row.get(6)?;
    let is_active: i64 = row.get(7)?;
    let channels_str: String = row.get(9)?;
    let created_str: String = row.get(10)?;

    Ok(Campaign {
        id: parse_uuid(&id_str),
        plan_name: row.get(1)?,
        start_date: parse_date(&start_str),
        end_date: parse_date(&end_str),
        frequency: frequency.max(0) as u32,
        publish_time: parse_time(&publish_str),
        auto_approve: auto_approve != 0,
        is_active: is_active != 0,
        website_webhook_url: row.get::<String>(8).ok(),
        channels: serde_json::from_str(&channels_str).unwrap_or_default(),
        created_at: parse_datetime(&created_str),
    })
}

/// Map a libsql Row to a Keyword.
///
/// Column order matches KEYWORD_COLUMNS.
fn row_to_keyword(row: &libsql::Row) -> Result<Keyword, libsql::Error> {
    let id_str: String = row.get(0)?;
    let status_str: String = row.get(2)?;
    let collection_str: String = row.get(4)?;
    let campaign_str: Option<String> = row.get(7).ok();
    let created_str: String = row.get(8)?;
    let updated_str: String = row.get(9)?;

    Ok(Keyword {
        id: parse_uuid(&id_str),
        text: row.get(1)?,
        status: status_str.parse().unwrap_or(KeywordStatus::Available),
        knowledge: row.get::<String>(3).ok().unwrap_or_default(),
        collection_status: collection_str.parse().unwrap_or_default(),
        pending_questions: row.get::<String>(5).ok(),
        session_id: row.get::<String>(6).ok(),
        campaign_id: parse_optional_uuid(campaign_str),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to a ContentItem.
///
/// Column order matches CONTENT_COLUMNS.
fn row_to_content(row: &libsql::Row) -> Result<ContentItem, libsql::Error> {
    let id_str: String = row.get(0)?;
    let metadata_str: String = row.get(5)?;
    let images_str: String = row.get(7)?;
    let platforms_str: String = row.get(8)?;
    let status_str: String = row.get(9)?;
    let scheduled_str: Option<String> = row.get(10).ok();
    let published_str: Option<String> = row.get(11).ok();
    let created_str: String = row.get(12)?;

    Ok(ContentItem {
        id: parse_uuid(&id_str),
        campaign_id: parse_optional_uuid(row.get(1).ok()),
        keyword_id: parse_optional_uuid(row.get(2).ok()),
        title: row.get(3)?,
        body: row.get(4)?,
        seo_metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
        social_snippet: row.get(6)?,
        images: serde_json::from_str(&images_str).unwrap_or_default(),
        platforms: serde_json::from_str(&platforms_str).unwrap_or_default(),
        status: status_str.parse().unwrap_or(ContentStatus::Pending),
        scheduled_at: parse_optional_datetime(&scheduled_str),
        published_at: parse_optional_datetime(&published_str),
        created_at: parse_datetime(&created_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const CAMPAIGN_COLUMNS: &str = "id, plan_name, start_date, end_date, frequency, publish_time, auto_approve, is_active, website_webhook_url, channels, created_at";

const KEYWORD_COLUMNS: &str = "id, keyword, status, knowledge, collection_status, pending_questions, session_id, campaign_id, created_at, updated_at";

const CONTENT_COLUMNS: &str = "id, campaign_id, keyword_id, title, body, seo_metadata, social_snippet, images, platforms, status, scheduled_at, published_at, created_at";

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != '_migrations' ORDER BY name",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_tables: {e}")))?;

        let mut tables = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            if let Ok(name) = row.get::<String>(0) {
                tables.push(name);
            }
        }
        Ok(tables)
    }

    // ── Campaigns ───────────────────────────────────────────────────

    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign, DatabaseError> {
        let stored = Campaign {
            id: Uuid::new_v4(),
            plan_name: campaign.plan_name.clone(),
            start_date: campaign.start_date,
            end_date: campaign.end_date,
            frequency: campaign.frequency,
            publish_time: campaign.publish_time,
            auto_approve: campaign.auto_approve,
            is_active: true,
            website_webhook_url: campaign.website_webhook_url.clone(),
            channels: campaign.channels.clone(),
            created_at: Utc::now(),
        };

        self.conn()
            .execute(
                "INSERT INTO campaigns (id, plan_name, topic, start_date, end_date, frequency, publish_time, auto_approve, is_active, website_webhook_url, channels, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10, ?11)",
                params![
                    stored.id.to_string(),
                    stored.plan_name.clone(),
                    campaign.topic.clone(),
                    stored.start_date.format("%Y-%m-%d").to_string(),
                    stored.end_date.format("%Y-%m-%d").to_string(),
                    stored.frequency as i64,
                    stored.publish_time_label(),
                    stored.auto_approve as i64,
                    opt_text(stored.website_webhook_url.as_deref()),
                    to_json(&stored.channels)?,
                    stored.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_campaign: {e}")))?;

        debug!(campaign_id = %stored.id, plan = %stored.plan_name, "Campaign inserted into DB");
        Ok(stored)
    }

    async fn list_active_campaigns(&self) -> Result<Vec<Campaign>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE is_active = 1 ORDER BY created_at ASC, rowid ASC"
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_active_campaigns: {e}")))?;

        let mut campaigns = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_campaign(&row) {
                Ok(campaign) => campaigns.push(campaign),
                Err(e) => warn!("Skipping campaign row: {e}"),
            }
        }
        Ok(campaigns)
    }

    async fn deactivate_all_campaigns(&self) -> Result<usize, DatabaseError> {
        let count = self
            .conn()
            .execute("UPDATE campaigns SET is_active = 0 WHERE is_active = 1", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("deactivate_all_campaigns: {e}")))?;

        if count > 0 {
            info!(count, "Deactivated campaigns");
        }
        Ok(count as usize)
    }

    // ── Keywords ────────────────────────────────────────────────────

    async fn add_keywords(
        &self,
        keywords: &[String],
        campaign_id: Option<Uuid>,
    ) -> Result<usize, DatabaseError> {
        let conn = self.conn();
        let mut added = 0;
        for keyword in keywords.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO keywords (id, keyword, status, knowledge, collection_status, campaign_id, created_at, updated_at) VALUES (?1, ?2, 'available', '', 'needs_knowledge', ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    keyword,
                    opt_uuid(campaign_id),
                    now.clone(),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("add_keywords: {e}")))?;
            added += 1;
        }

        debug!(added, campaign_id = ?campaign_id, "Keywords inserted into DB");
        Ok(added)
    }

    async fn get_keyword(&self, id: Uuid) -> Result<Option<Keyword>, DatabaseError> {
        self.query_keyword(
            "get_keyword",
            &format!("SELECT {KEYWORD_COLUMNS} FROM keywords WHERE id = ?1"),
            params![id.to_string()],
        )
        .await
    }

    async fn get_available_keyword(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<Keyword>, DatabaseError> {
        self.query_keyword(
            "get_available_keyword",
            &format!(
                "SELECT {KEYWORD_COLUMNS} FROM keywords \
                 WHERE status = 'available' AND collection_status != 'awaiting_answers' \
                 AND (campaign_id = ?1 OR campaign_id IS NULL) \
                 ORDER BY rowid ASC LIMIT 1"
            ),
            params![campaign_id.to_string()],
        )
        .await
    }

    async fn get_keyword_awaiting_answers(
        &self,
        session_id: &str,
    ) -> Result<Option<Keyword>, DatabaseError> {
        self.query_keyword(
            "get_keyword_awaiting_answers",
            &format!(
                "SELECT {KEYWORD_COLUMNS} FROM keywords \
                 WHERE collection_status = 'awaiting_answers' AND session_id = ?1 \
                 ORDER BY updated_at DESC LIMIT 1"
            ),
            params![session_id],
        )
        .await
    }

    async fn update_keyword_collection_status(
        &self,
        id: Uuid,
        expected: CollectionStatus,
        update: CollectionUpdate<'_>,
    ) -> Result<bool, DatabaseError> {
        let awaiting = update.status == CollectionStatus::AwaitingAnswers;
        let questions = match update.pending_questions {
            Some(q) if awaiting => libsql::Value::Text(to_json(&q)?),
            _ => libsql::Value::Null,
        };
        let session = if awaiting {
            opt_text(update.session_id)
        } else {
            libsql::Value::Null
        };

        // Questions are only parked on keywords nobody has claimed yet.
        let sql = if awaiting {
            "UPDATE keywords SET collection_status = ?1, pending_questions = ?2, session_id = ?3, knowledge = COALESCE(?4, knowledge), updated_at = ?5 WHERE id = ?6 AND collection_status = ?7 AND status = 'available'"
        } else {
            "UPDATE keywords SET collection_status = ?1, pending_questions = ?2, session_id = ?3, knowledge = COALESCE(?4, knowledge), updated_at = ?5 WHERE id = ?6 AND collection_status = ?7"
        };

        let count = self
            .conn()
            .execute(
                sql,
                params![
                    update.status.to_string(),
                    questions,
                    session,
                    opt_text(update.knowledge),
                    Utc::now().to_rfc3339(),
                    id.to_string(),
                    expected.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_keyword_collection_status: {e}")))?;

        debug!(keyword_id = %id, from = %expected, to = %update.status, applied = count > 0, "Collection status update");
        Ok(count > 0)
    }

    async fn claim_keyword(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE keywords SET status = 'used', updated_at = ?1 WHERE id = ?2 AND status = 'available'",
                params![Utc::now().to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("claim_keyword: {e}")))?;

        Ok(count > 0)
    }

    async fn release_keyword(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE keywords SET status = 'available', updated_at = ?1 WHERE id = ?2 AND status = 'used'",
                params![Utc::now().to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("release_keyword: {e}")))?;

        Ok(count > 0)
    }

    // ── Content ─────────────────────────────────────────────────────

    async fn create_content(&self, content: &NewContent) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        self.conn()
            .execute(
                "INSERT INTO content (id, campaign_id, keyword_id, title, body, seo_metadata, social_snippet, images, platforms, status, scheduled_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    id.to_string(),
                    opt_uuid(content.campaign_id),
                    opt_uuid(content.keyword_id),
                    content.title.clone(),
                    content.body.clone(),
                    to_json(&content.seo_metadata)?,
                    content.social_snippet.clone(),
                    to_json(&content.images)?,
                    to_json(&content.platforms)?,
                    content.status.to_string(),
                    opt_datetime(content.scheduled_at),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_content: {e}")))?;

        debug!(content_id = %id, title = %content.title, status = %content.status, "Content inserted into DB");
        Ok(id)
    }

    async fn get_content(&self, id: Uuid) -> Result<Option<ContentItem>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CONTENT_COLUMNS} FROM content WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_content: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let item = row_to_content(&row)
                    .map_err(|e| DatabaseError::Query(format!("get_content row parse: {e}")))?;
                Ok(Some(item))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_content: {e}"))),
        }
    }

    async fn update_content_status(
        &self,
        id: Uuid,
        status: ContentStatus,
    ) -> Result<bool, DatabaseError> {
        let published_at = match status {
            ContentStatus::Published => libsql::Value::Text(Utc::now().to_rfc3339()),
            _ => libsql::Value::Null,
        };
        let count = self
            .conn()
            .execute(
                "UPDATE content SET status = ?1, published_at = COALESCE(?2, published_at) WHERE id = ?3",
                params![status.to_string(), published_at, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_content_status: {e}")))?;

        debug!(content_id = %id, status = %status, "Content status updated in DB");
        Ok(count > 0)
    }

    async fn count_by_status(&self, status: ContentStatus) -> Result<u64, DatabaseError> {
        self.count(
            "count_by_status",
            "SELECT COUNT(*) FROM content WHERE status = ?1",
            params![status.to_string()],
        )
        .await
    }

    async fn count_pending_content(&self, channel: &str) -> Result<u64, DatabaseError> {
        self.count(
            "count_pending_content",
            "SELECT COUNT(*) FROM content \
             WHERE status IN ('pending', 'approved') \
             AND EXISTS (SELECT 1 FROM json_each(content.platforms) WHERE json_each.value = ?1)",
            params![channel],
        )
        .await
    }

    async fn campaign_stats(&self, campaign_id: Uuid) -> Result<CampaignStats, DatabaseError> {
        let id = campaign_id.to_string();
        let mut stats = CampaignStats {
            total_keywords: self
                .count(
                    "campaign_stats",
                    "SELECT COUNT(*) FROM keywords WHERE campaign_id = ?1 OR campaign_id IS NULL",
                    params![id.clone()],
                )
                .await?,
            used_keywords: self
                .count(
                    "campaign_stats",
                    "SELECT COUNT(*) FROM keywords WHERE status = 'used' AND (campaign_id = ?1 OR campaign_id IS NULL)",
                    params![id.clone()],
                )
                .await?,
            ..Default::default()
        };

        let mut rows = self
            .conn()
            .query(
                "SELECT status, COUNT(*) FROM content WHERE campaign_id = ?1 GROUP BY status",
                params![id.clone()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("campaign_stats: {e}")))?;

        while let Ok(Some(row)) = rows.next().await {
            let status_str: String = row.get(0).unwrap_or_default();
            let count = row.get::<i64>(1).unwrap_or(0).max(0) as u64;
            match status_str.parse::<ContentStatus>() {
                Ok(ContentStatus::Pending) => stats.pending_articles = count,
                Ok(ContentStatus::Approved) => stats.approved_articles = count,
                Ok(ContentStatus::Published) => stats.published_articles = count,
                Err(e) => warn!("Skipping content status row: {e}"),
            }
        }

        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        stats.published_today = self
            .count(
                "campaign_stats",
                "SELECT COUNT(*) FROM content WHERE campaign_id = ?1 AND status = 'published' AND substr(published_at, 1, 10) = ?2",
                params![id, today],
            )
            .await?;

        Ok(stats)
    }
}
