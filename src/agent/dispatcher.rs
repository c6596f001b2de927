//! Message router.
//!
//! A keyword waiting for answers in the sender's session takes priority over
//! everything else: the message is either a skip request or the answer.
//! Only when nothing is pending does the message go through the intent
//! parser to a command handler.

use std::sync::Arc;

use chrono::Local;
use tracing::{error, info, warn};

use crate::agent::responses::{self, SetupReport};
use crate::campaign::{Campaign, Keyword, NewCampaign};
use crate::config::CampaignDefaults;
use crate::content::{ArticleProducer, ProducedArticle};
use crate::error::{DatabaseError, KnowledgeError, PublishError};
use crate::intent::{IntentKind, IntentParams, IntentParser};
use crate::knowledge::{KnowledgeCollector, is_skip_request};
use crate::publish::PublishTrigger;
use crate::scheduler::{CampaignScheduler, replenishment_summary};
use crate::store::Database;

/// Session used by [`Dispatcher::handle`].
pub const DEFAULT_SESSION: &str = "default";
/// Most articles a single generate command produces.
pub const MAX_GENERATE_COUNT: u32 = 20;

/// Shared components the dispatcher drives.
pub struct AgentDeps {
    pub store: Arc<dyn Database>,
    pub producer: Arc<ArticleProducer>,
    pub collector: Arc<KnowledgeCollector>,
    pub scheduler: Arc<CampaignScheduler>,
    pub publisher: Arc<dyn PublishTrigger>,
}

/// Values the dispatcher reports or applies but does not own.
#[derive(Debug, Clone, Default)]
pub struct DispatcherSettings {
    pub campaign_defaults: CampaignDefaults,
    pub review_url: Option<String>,
    /// Model name when an LLM key is configured.
    pub llm_model: Option<String>,
    pub image_sources: Vec<String>,
}

pub struct Dispatcher {
    deps: AgentDeps,
    settings: DispatcherSettings,
    parser: IntentParser,
}

impl Dispatcher {
    pub fn new(deps: AgentDeps, settings: DispatcherSettings) -> Self {
        Self {
            deps,
            settings,
            parser: IntentParser::new(),
        }
    }

    fn store(&self) -> &Arc<dyn Database> {
        &self.deps.store
    }

    /// Handle a message in the default session.
    pub async fn handle(&self, message: &str) -> String {
        self.handle_in_session(DEFAULT_SESSION, message).await
    }

    /// Handle a message scoped to one conversation.
    pub async fn handle_in_session(&self, session_id: &str, message: &str) -> String {
        match self.store().get_keyword_awaiting_answers(session_id).await {
            Ok(Some(keyword)) => return self.handle_pending(keyword, message).await,
            Ok(None) => {}
            Err(e) => {
                error!(session_id, "Awaiting-answers lookup failed: {e}");
                return responses::STORE_UNAVAILABLE.to_string();
            }
        }

        let intent = self.parser.parse(message);
        info!(session_id, intent = %intent.kind, "Dispatching command");

        match (intent.kind, intent.params) {
            (IntentKind::Setup, _) => self.handle_setup().await,
            (
                IntentKind::CreateCampaign,
                IntentParams::Campaign {
                    duration_days,
                    topic,
                    frequency,
                },
            ) => {
                self.handle_create_campaign(topic.as_deref(), duration_days, frequency)
                    .await
            }
            (IntentKind::AddKeywords, IntentParams::Keywords(keywords)) => {
                self.handle_add_keywords(&keywords).await
            }
            (IntentKind::GenerateContent, IntentParams::Generate { count }) => {
                self.handle_generate(session_id, count).await
            }
            (IntentKind::StatusQuery, _) => self.handle_status().await,
            (IntentKind::StopCampaign, _) => self.handle_stop().await,
            (IntentKind::ManualTrigger, _) => self.handle_manual_trigger().await,
            _ => responses::UNKNOWN_COMMAND.to_string(),
        }
    }

    // ── Knowledge collection ────────────────────────────────────────

    async fn handle_pending(&self, keyword: Keyword, message: &str) -> String {
        let skipping = is_skip_request(message);
        let settled = if skipping {
            self.deps.collector.skip(&keyword).await
        } else {
            self.deps.collector.record_answers(&keyword, message).await
        };

        let keyword = match settled {
            Ok(keyword) => keyword,
            Err(KnowledgeError::CorruptQuestions { reason, .. }) => {
                warn!(keyword = %keyword.text, "Pending questions unreadable: {reason}");
                return responses::corrupt_questions(&keyword.text);
            }
            Err(KnowledgeError::Conflict { .. }) => {
                return responses::knowledge_conflict(&keyword.text);
            }
            Err(e) => {
                error!(keyword = %keyword.text, "Knowledge collection failed: {e}");
                return responses::operation_failed(&e.to_string());
            }
        };

        let header = if skipping {
            responses::knowledge_skipped(&keyword.text)
        } else {
            responses::knowledge_recorded(&keyword.text)
        };

        let campaign = match self.campaign_for(&keyword).await {
            Ok(Some(campaign)) => campaign,
            Ok(None) => return responses::knowledge_saved_without_campaign(&keyword.text),
            Err(e) => return responses::operation_failed(&e.to_string()),
        };

        match self.deps.producer.produce(&campaign, &keyword).await {
            Ok(Some(article)) => format!(
                "{header}\n\n{}",
                responses::articles_generated(&[article], self.settings.review_url.as_deref())
            ),
            Ok(None) => format!("{header}\n\n{}", responses::knowledge_conflict(&keyword.text)),
            Err(e) => format!(
                "{header}\n\n{}",
                responses::generation_failed(&keyword.text, &e.to_string())
            ),
        }
    }

    /// The keyword's own campaign when active, otherwise the first active one.
    async fn campaign_for(
        &self,
        keyword: &Keyword,
    ) -> Result<Option<Campaign>, DatabaseError> {
        let campaigns = self.store().list_active_campaigns().await?;
        let own = keyword
            .campaign_id
            .and_then(|id| campaigns.iter().find(|c| c.id == id).cloned());
        Ok(own.or_else(|| campaigns.into_iter().next()))
    }

    // ── Commands ────────────────────────────────────────────────────

    async fn handle_setup(&self) -> String {
        if let Err(e) = self.store().init_schema().await {
            error!("Schema initialisation failed: {e}");
            return format!("❌ 配置错误：{e}");
        }
        if self.settings.llm_model.is_none() {
            return responses::FIRST_RUN_GUIDE.to_string();
        }

        let tables = match self.store().list_tables().await {
            Ok(tables) => tables,
            Err(e) => return format!("❌ 配置错误：{e}"),
        };
        responses::setup_ready(&SetupReport {
            tables,
            llm_model: self.settings.llm_model.clone(),
            publish_configured: self.deps.publisher.is_configured(),
            image_sources: self.settings.image_sources.clone(),
        })
    }

    async fn handle_create_campaign(
        &self,
        topic: Option<&str>,
        duration_days: Option<i64>,
        frequency: i64,
    ) -> String {
        let today = Local::now().date_naive();
        let new = match NewCampaign::from_request(
            topic,
            duration_days,
            frequency,
            today,
            &self.settings.campaign_defaults,
        ) {
            Ok(new) => new,
            Err(invalid) => return invalid.to_string(),
        };

        match self.store().create_campaign(&new).await {
            Ok(campaign) => {
                info!(campaign_id = %campaign.id, plan = %campaign.plan_name, "Campaign created");
                responses::campaign_created(&new.topic, &campaign)
            }
            Err(e) => {
                error!("Campaign creation failed: {e}");
                responses::operation_failed(&e.to_string())
            }
        }
    }

    async fn handle_add_keywords(&self, keywords: &[String]) -> String {
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return responses::NO_KEYWORDS_GIVEN.to_string();
        }

        let campaign_id = match self.store().list_active_campaigns().await {
            Ok(campaigns) => campaigns.first().map(|c| c.id),
            Err(e) => return responses::operation_failed(&e.to_string()),
        };

        let added = match self.store().add_keywords(&keywords, campaign_id).await {
            Ok(added) => added,
            Err(e) => {
                error!("Adding keywords failed: {e}");
                return responses::operation_failed(&e.to_string());
            }
        };
        info!(added, "Keywords added");

        let summary = match self.deps.scheduler.replenish_inventory().await {
            Ok(report) => replenishment_summary(&report),
            Err(e) => {
                warn!("Replenishment after keyword add failed: {e}");
                None
            }
        };
        responses::keywords_added(added, summary.as_deref())
    }

    async fn handle_generate(&self, session_id: &str, count: u32) -> String {
        if count == 0 {
            return responses::ZERO_COUNT.to_string();
        }
        let count = count.min(MAX_GENERATE_COUNT) as usize;

        let campaign = match self.store().list_active_campaigns().await {
            Ok(campaigns) => match campaigns.into_iter().next() {
                Some(campaign) => campaign,
                None => return responses::NO_CAMPAIGN.to_string(),
            },
            Err(e) => return responses::operation_failed(&e.to_string()),
        };

        let mut produced: Vec<ProducedArticle> = Vec::new();
        let mut attempts = 0;
        while produced.len() < count && attempts < count * 2 {
            attempts += 1;
            let keyword = match self.store().get_available_keyword(campaign.id).await {
                Ok(Some(keyword)) => keyword,
                Ok(None) => break,
                Err(e) => {
                    error!("Keyword selection failed: {e}");
                    break;
                }
            };

            if !keyword.collection_status.is_settled() {
                match self.deps.collector.request_questions(&keyword, session_id).await {
                    Ok(questions) => {
                        let ask = responses::knowledge_questions(&keyword.text, &questions);
                        if produced.is_empty() {
                            return ask;
                        }
                        return format!(
                            "{}\n\n{ask}",
                            responses::articles_generated(&produced, self.settings.review_url.as_deref())
                        );
                    }
                    Err(KnowledgeError::Conflict { .. }) => continue,
                    Err(e) => {
                        error!(keyword = %keyword.text, "Opening Q&A failed: {e}");
                        break;
                    }
                }
            }

            match self.deps.producer.produce(&campaign, &keyword).await {
                Ok(Some(article)) => produced.push(article),
                Ok(None) => continue,
                Err(e) => {
                    if produced.is_empty() {
                        return responses::generation_failed(&keyword.text, &e.to_string());
                    }
                    break;
                }
            }
        }

        if produced.is_empty() {
            return responses::EMPTY_POOL.to_string();
        }
        responses::articles_generated(&produced, self.settings.review_url.as_deref())
    }

    async fn handle_status(&self) -> String {
        let campaign = match self.store().list_active_campaigns().await {
            Ok(campaigns) => match campaigns.into_iter().next() {
                Some(campaign) => campaign,
                None => return responses::NO_ACTIVE_CAMPAIGN.to_string(),
            },
            Err(e) => return responses::operation_failed(&e.to_string()),
        };

        match self.store().campaign_stats(campaign.id).await {
            Ok(stats) => responses::status_report(&campaign, &stats, Local::now().date_naive()),
            Err(e) => responses::operation_failed(&e.to_string()),
        }
    }

    async fn handle_stop(&self) -> String {
        match self.store().deactivate_all_campaigns().await {
            Ok(count) => {
                info!(count, "Campaigns deactivated");
                responses::campaigns_stopped(count)
            }
            Err(e) => responses::operation_failed(&e.to_string()),
        }
    }

    /// Fires regardless of how much approved content exists.
    async fn handle_manual_trigger(&self) -> String {
        let campaign_ids: Vec<_> = match self.store().list_active_campaigns().await {
            Ok(campaigns) => campaigns.iter().map(|c| c.id).collect(),
            Err(e) => {
                warn!("Listing campaigns for manual publish failed: {e}");
                Vec::new()
            }
        };

        match self.deps.publisher.trigger(&campaign_ids).await {
            Ok(()) => responses::PUBLISH_TRIGGERED.to_string(),
            Err(PublishError::NotConfigured) => responses::PUBLISH_NOT_CONFIGURED.to_string(),
            Err(e) => {
                warn!("Manual publish trigger failed: {e}");
                responses::publish_failed(&e.to_string())
            }
        }
    }
}
