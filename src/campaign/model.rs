//! Campaign, keyword and content records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CampaignDefaults;
use crate::images::ImageRef;
use crate::knowledge::CollectionStatus;

/// Longest campaign the agent will schedule, in days.
pub const MAX_DURATION_DAYS: i64 = 365;
/// Most articles per day a campaign may request.
pub const MAX_FREQUENCY: i64 = 10;

/// A content-marketing campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub plan_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Articles per day.
    pub frequency: u32,
    pub publish_time: NaiveTime,
    pub auto_approve: bool,
    pub is_active: bool,
    pub website_webhook_url: Option<String>,
    /// Social channel slugs (`twitter`, `linkedin`, `bluesky`).
    pub channels: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Total campaign length in days.
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// Publish time as `HH:MM`.
    pub fn publish_time_label(&self) -> String {
        self.publish_time.format("%H:%M").to_string()
    }

    /// Target platforms for generated content.
    ///
    /// Website when a webhook URL is configured, plus one entry per known
    /// social channel. Falls back to Website alone.
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        if self
            .website_webhook_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
        {
            platforms.push(Platform::Website);
        }
        for channel in &self.channels {
            if let Some(p) = Platform::from_channel(channel) {
                if !platforms.contains(&p) {
                    platforms.push(p);
                }
            }
        }
        if platforms.is_empty() {
            platforms.push(Platform::Website);
        }
        platforms
    }
}

/// Fields for a campaign that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCampaign {
    pub plan_name: String,
    pub topic: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub frequency: u32,
    pub publish_time: NaiveTime,
    pub auto_approve: bool,
    pub website_webhook_url: Option<String>,
    pub channels: Vec<String>,
}

/// Why a campaign request was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignValidation {
    Duration(i64),
    Frequency(i64),
    EmptyTopic,
}

impl fmt::Display for CampaignValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duration(_) => write!(f, "❌ 计划周期必须在 1-{MAX_DURATION_DAYS} 天之间。"),
            Self::Frequency(_) => write!(f, "❌ 发布频率必须在每天 1-{MAX_FREQUENCY} 篇之间。"),
            Self::EmptyTopic => write!(f, "❌ 请提供有效的计划主题。"),
        }
    }
}

impl NewCampaign {
    /// Validate a parsed campaign request and build the record to store.
    ///
    /// `end_date` is `start_date + duration` days.
    pub fn from_request(
        topic: Option<&str>,
        duration_days: Option<i64>,
        frequency: i64,
        start_date: NaiveDate,
        defaults: &CampaignDefaults,
    ) -> Result<Self, CampaignValidation> {
        let duration = duration_days.unwrap_or(defaults.duration_days);
        if duration <= 0 || duration > MAX_DURATION_DAYS {
            return Err(CampaignValidation::Duration(duration));
        }
        if frequency <= 0 || frequency > MAX_FREQUENCY {
            return Err(CampaignValidation::Frequency(frequency));
        }
        let topic = topic.map(str::trim).unwrap_or_default();
        if topic.is_empty() {
            return Err(CampaignValidation::EmptyTopic);
        }

        Ok(Self {
            plan_name: format!("{topic} SEO Campaign"),
            topic: topic.to_string(),
            start_date,
            end_date: start_date + Duration::days(duration),
            frequency: frequency as u32,
            publish_time: defaults.publish_time,
            auto_approve: defaults.auto_approve,
            website_webhook_url: defaults.website_webhook_url.clone(),
            channels: defaults.channels.clone(),
        })
    }
}

/// Availability of a keyword in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordStatus {
    Available,
    Used,
    Deprecated,
}

impl fmt::Display for KeywordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::Used => "used",
            Self::Deprecated => "deprecated",
        };
        write!(f, "{s}")
    }
}

impl FromStr for KeywordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "used" => Ok(Self::Used),
            "deprecated" => Ok(Self::Deprecated),
            other => Err(format!("unknown keyword status: {other}")),
        }
    }
}

/// A keyword in the pool together with its knowledge-collection state.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub id: Uuid,
    pub text: String,
    pub status: KeywordStatus,
    /// Free-form domain knowledge, possibly empty.
    pub knowledge: String,
    pub collection_status: CollectionStatus,
    /// Serialized JSON array of question strings, set only while awaiting answers.
    pub pending_questions: Option<String>,
    /// Conversation that owns the outstanding questions.
    pub session_id: Option<String>,
    pub campaign_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Keyword {
    /// Decode the stored pending questions.
    pub fn questions(&self) -> Result<Vec<String>, serde_json::Error> {
        match self.pending_questions.as_deref() {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw),
            _ => Ok(Vec::new()),
        }
    }
}

/// Review lifecycle of a generated content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Pending,
    Approved,
    Published,
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Published => "published",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "published" => Ok(Self::Published),
            other => Err(format!("unknown content status: {other}")),
        }
    }
}

/// Where a content item is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Website,
    Twitter,
    #[serde(rename = "linkedin")]
    LinkedIn,
    Bluesky,
}

impl Platform {
    /// Map a campaign channel slug to a platform.
    pub fn from_channel(channel: &str) -> Option<Self> {
        match channel.trim().to_lowercase().as_str() {
            "website" => Some(Self::Website),
            "twitter" | "x" => Some(Self::Twitter),
            "linkedin" => Some(Self::LinkedIn),
            "bluesky" => Some(Self::Bluesky),
            _ => None,
        }
    }

    /// Channel slug used for inventory accounting.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::Twitter => "twitter",
            Self::LinkedIn => "linkedin",
            Self::Bluesky => "bluesky",
        }
    }

    pub fn is_social(&self) -> bool {
        !matches!(self, Self::Website)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Website => "Website",
            Self::Twitter => "X (Twitter)",
            Self::LinkedIn => "LinkedIn",
            Self::Bluesky => "Bluesky",
        };
        write!(f, "{s}")
    }
}

/// A stored content item.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub keyword_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub seo_metadata: serde_json::Value,
    pub social_snippet: String,
    pub images: Vec<ImageRef>,
    pub platforms: Vec<Platform>,
    pub status: ContentStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a content item that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContent {
    pub campaign_id: Option<Uuid>,
    pub keyword_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub seo_metadata: serde_json::Value,
    pub social_snippet: String,
    pub images: Vec<ImageRef>,
    pub platforms: Vec<Platform>,
    pub status: ContentStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Progress counters for a campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignStats {
    pub total_keywords: u64,
    pub used_keywords: u64,
    pub pending_articles: u64,
    pub approved_articles: u64,
    pub published_articles: u64,
    pub published_today: u64,
}
