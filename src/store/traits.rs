//! Unified `Database` trait: one async interface for campaign persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::campaign::{
    Campaign, CampaignStats, ContentItem, ContentStatus, Keyword, NewCampaign, NewContent,
};
use crate::error::DatabaseError;
use crate::knowledge::CollectionStatus;

/// Fields written by a knowledge-collection transition.
///
/// Pending questions and the owning session are only kept while the new
/// status is `AwaitingAnswers`; every other status clears both.
#[derive(Debug, Clone, Copy)]
pub struct CollectionUpdate<'a> {
    pub status: CollectionStatus,
    pub pending_questions: Option<&'a [String]>,
    /// `None` leaves the stored knowledge untouched.
    pub knowledge: Option<&'a str>,
    pub session_id: Option<&'a str>,
}

impl<'a> CollectionUpdate<'a> {
    pub fn new(status: CollectionStatus) -> Self {
        Self {
            status,
            pending_questions: None,
            knowledge: None,
            session_id: None,
        }
    }

    pub fn with_questions(mut self, questions: &'a [String], session_id: &'a str) -> Self {
        self.pending_questions = Some(questions);
        self.session_id = Some(session_id);
        self
    }

    pub fn with_knowledge(mut self, knowledge: &'a str) -> Self {
        self.knowledge = Some(knowledge);
        self
    }
}

/// Backend-agnostic record store covering campaigns, keywords and content.
#[async_trait]
pub trait Database: Send + Sync {
    /// Create or upgrade the schema. Idempotent.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Names of the application tables that exist.
    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError>;

    // ── Campaigns ───────────────────────────────────────────────────

    /// Insert a new active campaign.
    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign, DatabaseError>;

    /// All campaigns with the active flag set, oldest first.
    async fn list_active_campaigns(&self) -> Result<Vec<Campaign>, DatabaseError>;

    /// Clear the active flag on every campaign. Returns how many changed.
    async fn deactivate_all_campaigns(&self) -> Result<usize, DatabaseError>;

    // ── Keywords ────────────────────────────────────────────────────

    /// Insert keywords as `Available` / `NeedsKnowledge`. Returns the count added.
    async fn add_keywords(
        &self,
        keywords: &[String],
        campaign_id: Option<Uuid>,
    ) -> Result<usize, DatabaseError>;

    async fn get_keyword(&self, id: Uuid) -> Result<Option<Keyword>, DatabaseError>;

    /// Oldest available keyword for a campaign (or from the shared pool),
    /// skipping keywords that are waiting on answers.
    async fn get_available_keyword(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<Keyword>, DatabaseError>;

    /// The keyword whose questions are outstanding in this session, if any.
    async fn get_keyword_awaiting_answers(
        &self,
        session_id: &str,
    ) -> Result<Option<Keyword>, DatabaseError>;

    /// Compare-and-set on the collection status.
    ///
    /// Applies `update` only if the stored status equals `expected`.
    /// Returns `false` when another writer got there first.
    async fn update_keyword_collection_status(
        &self,
        id: Uuid,
        expected: CollectionStatus,
        update: CollectionUpdate<'_>,
    ) -> Result<bool, DatabaseError>;

    /// Mark an available keyword as used. Returns `false` if it was no longer available.
    async fn claim_keyword(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Return a claimed keyword to the pool after its article failed.
    async fn release_keyword(&self, id: Uuid) -> Result<bool, DatabaseError>;

    // ── Content ─────────────────────────────────────────────────────

    async fn create_content(&self, content: &NewContent) -> Result<Uuid, DatabaseError>;

    async fn get_content(&self, id: Uuid) -> Result<Option<ContentItem>, DatabaseError>;

    /// Move a content item to a new status; publishing stamps `published_at`.
    async fn update_content_status(
        &self,
        id: Uuid,
        status: ContentStatus,
    ) -> Result<bool, DatabaseError>;

    /// Count content items in a status across all campaigns.
    async fn count_by_status(&self, status: ContentStatus) -> Result<u64, DatabaseError>;

    /// Pending plus approved content targeting a channel.
    async fn count_pending_content(&self, channel: &str) -> Result<u64, DatabaseError>;

    async fn campaign_stats(&self, campaign_id: Uuid) -> Result<CampaignStats, DatabaseError>;
}
