//! Background campaign scheduler.
//!
//! One loop wakes every poll interval and runs three checks against the
//! wall clock:
//! - **Inventory** at minute 0: top up unpublished content per channel
//! - **Reminder** on 5-minute marks: warn before publish time while content awaits review
//! - **Publish** every minute: fire the publish webhook at a campaign's publish time
//!
//! Reminder and publish checks remember the window they last fired in, so
//! extra iterations inside the same window do nothing. The markers live in
//! memory only and reset on restart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::campaign::{Campaign, ContentStatus};
use crate::channels::OutgoingResponse;
use crate::config::SchedulerConfig;
use crate::content::ArticleProducer;
use crate::error::Error;
use crate::publish::PublishTrigger;
use crate::store::Database;

/// Last window each deduplicated check fired in.
#[derive(Debug, Default)]
struct FireMarkers {
    /// `(hour, minute / 5)`.
    reminder: Option<(u32, u32)>,
    /// `HH:MM`.
    publish: Option<String>,
}

/// Articles generated for one channel during replenishment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replenishment {
    pub campaign_id: Uuid,
    pub channel: &'static str,
    pub pending_before: u64,
    pub generated: usize,
}

pub struct CampaignScheduler {
    config: SchedulerConfig,
    store: Arc<dyn Database>,
    producer: Arc<ArticleProducer>,
    publisher: Arc<dyn PublishTrigger>,
    notify_tx: mpsc::Sender<OutgoingResponse>,
    review_url: Option<String>,
    markers: Mutex<FireMarkers>,
    running: AtomicBool,
}

impl CampaignScheduler {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn Database>,
        producer: Arc<ArticleProducer>,
        publisher: Arc<dyn PublishTrigger>,
        notify_tx: mpsc::Sender<OutgoingResponse>,
        review_url: Option<String>,
    ) -> Self {
        Self {
            config,
            store,
            producer,
            publisher,
            notify_tx,
            review_url,
            markers: Mutex::new(FireMarkers::default()),
            running: AtomicBool::new(true),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the loop before its next iteration. In-flight calls finish.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("Campaign scheduler stopping");
    }

    /// Run one iteration for the given local time. A failing check is
    /// logged and does not prevent the others.
    pub async fn tick(&self, now: NaiveDateTime) {
        if now.minute() == 0 {
            match self.replenish_inventory().await {
                Ok(report) => {
                    if let Some(summary) = replenishment_summary(&report) {
                        self.notify(summary).await;
                    }
                }
                Err(e) => error!("Inventory replenishment failed: {e}"),
            }
        }

        if now.minute() % 5 == 0 {
            if let Err(e) = self.check_reminders(now).await {
                error!("Reminder check failed: {e}");
            }
        }

        if let Err(e) = self.check_publish_time(now).await {
            error!("Publish check failed: {e}");
        }
    }

    /// Top up every active campaign's channels to the inventory threshold.
    ///
    /// Keywords are drafted with whatever knowledge they have; no Q&A is opened.
    pub async fn replenish_inventory(&self) -> Result<Vec<Replenishment>, Error> {
        let campaigns = self.store.list_active_campaigns().await?;
        let threshold = self.config.inventory_threshold;
        let mut report = Vec::new();

        for campaign in &campaigns {
            for platform in campaign.platforms() {
                let channel = platform.channel();
                let pending = self.store.count_pending_content(channel).await?;
                if pending >= threshold {
                    continue;
                }

                let needed = (threshold - pending) as usize;
                let generated = self.fill(campaign, needed).await?;
                debug!(campaign_id = %campaign.id, channel, pending, generated, "Inventory checked");
                if generated > 0 {
                    report.push(Replenishment {
                        campaign_id: campaign.id,
                        channel,
                        pending_before: pending,
                        generated,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Generate up to `needed` articles from the campaign's keyword pool.
    async fn fill(&self, campaign: &Campaign, needed: usize) -> Result<usize, Error> {
        let mut generated = 0;
        let mut attempts = 0;

        while generated < needed && attempts < needed * 2 {
            attempts += 1;
            let Some(keyword) = self.store.get_available_keyword(campaign.id).await? else {
                warn!(campaign_id = %campaign.id, "Keyword pool exhausted during replenishment");
                break;
            };

            match self.producer.produce(campaign, &keyword).await {
                Ok(Some(_)) => generated += 1,
                Ok(None) => continue,
                Err(e) => {
                    warn!(campaign_id = %campaign.id, "Stopping replenishment after failure: {e}");
                    break;
                }
            }
        }

        Ok(generated)
    }

    /// Remind about content awaiting review ahead of each campaign's publish time.
    ///
    /// Returns the number of reminders sent.
    pub async fn check_reminders(&self, now: NaiveDateTime) -> Result<usize, Error> {
        let window = (now.hour(), now.minute() / 5);
        {
            let mut markers = self.markers.lock().unwrap_or_else(|p| p.into_inner());
            if markers.reminder == Some(window) {
                return Ok(0);
            }
            markers.reminder = Some(window);
        }

        let mut sent = 0;
        for campaign in self.store.list_active_campaigns().await? {
            let reminder_at = campaign.publish_time - self.config.reminder_lead;
            let minutes_off = (now.minute() as i64 - reminder_at.minute() as i64).abs();
            if now.hour() != reminder_at.hour() || minutes_off >= self.config.reminder_window_minutes {
                continue;
            }

            let pending = self.store.count_by_status(ContentStatus::Pending).await?;
            if pending == 0 {
                continue;
            }
            let approved = self.store.count_by_status(ContentStatus::Approved).await?;

            self.notify(reminder_message(
                &campaign,
                pending,
                approved,
                self.review_url.as_deref(),
            ))
            .await;
            info!(campaign_id = %campaign.id, pending, "Pre-publish reminder sent");
            sent += 1;
        }

        Ok(sent)
    }

    /// Fire the publish webhook once for every campaign scheduled this minute.
    ///
    /// Returns the campaigns included in the call; empty when nothing fired.
    pub async fn check_publish_time(&self, now: NaiveDateTime) -> Result<Vec<Uuid>, Error> {
        let label = now.format("%H:%M").to_string();
        {
            let mut markers = self.markers.lock().unwrap_or_else(|p| p.into_inner());
            if markers.publish.as_deref() == Some(label.as_str()) {
                return Ok(Vec::new());
            }
            markers.publish = Some(label.clone());
        }

        let due: Vec<Uuid> = self
            .store
            .list_active_campaigns()
            .await?
            .into_iter()
            .filter(|c| c.publish_time_label() == label)
            .map(|c| c.id)
            .collect();
        if due.is_empty() {
            return Ok(due);
        }

        let approved = self.store.count_by_status(ContentStatus::Approved).await?;
        if approved == 0 {
            debug!(time = %label, "Publish time reached with no approved content");
            return Ok(Vec::new());
        }

        self.publisher.trigger(&due).await?;
        info!(time = %label, campaigns = due.len(), approved, "Publish triggered");
        Ok(due)
    }

    async fn notify(&self, message: String) {
        if self
            .notify_tx
            .send(OutgoingResponse::text(message))
            .await
            .is_err()
        {
            warn!("Notification receiver dropped");
        }
    }
}

/// One line per replenished channel; `None` when nothing was generated.
pub fn replenishment_summary(report: &[Replenishment]) -> Option<String> {
    if report.is_empty() {
        return None;
    }
    let lines: Vec<String> = report
        .iter()
        .map(|r| {
            format!(
                "检测到 {} 渠道剩余内容不足，已自动生成 {} 篇文章",
                r.channel, r.generated
            )
        })
        .collect();
    Some(lines.join("\n"))
}

fn reminder_message(
    campaign: &Campaign,
    pending: u64,
    approved: u64,
    review_url: Option<&str>,
) -> String {
    let mut message = format!(
        "⏰ 今日发布提醒 (3 小时后发布)\n\n\
         📅 发布计划：{}\n\
         - 时间：{}\n\
         - 待审核文章：{pending} 篇\n\
         - 已批准文章：{approved} 篇\n\n\
         ⚠️ 请尽快审核待发布内容",
        campaign.plan_name,
        campaign.publish_time_label(),
    );
    if let Some(url) = review_url {
        message.push_str(&format!("：\n{url}"));
    }
    message
}

/// Spawn the scheduler loop. Runs until [`CampaignScheduler::stop`] is called.
pub fn spawn_scheduler(
    scheduler: Arc<CampaignScheduler>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let interval = interval.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        info!(interval_secs = interval.as_secs(), "Campaign scheduler started");

        loop {
            ticker.tick().await;
            if !scheduler.is_running() {
                break;
            }
            scheduler.tick(Local::now().naive_local()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::campaign::{NewCampaign, NewContent, Platform};
    use crate::config::CampaignDefaults;
    use crate::content::{ArticleRequest, GeneratedArticle, GenerationProvider};
    use crate::error::{GenerationError, PublishError};
    use crate::images::FallbackImageProvider;
    use crate::store::LibSqlBackend;

    struct EchoGenerator;

    #[async_trait]
    impl GenerationProvider for EchoGenerator {
        async fn generate_article(
            &self,
            request: &ArticleRequest<'_>,
        ) -> Result<GeneratedArticle, GenerationError> {
            Ok(GeneratedArticle {
                title: request.keyword.to_string(),
                slug: "s".into(),
                meta_description: "d".into(),
                html_body: "<article></article>".into(),
                social_snippet: "s".into(),
            })
        }

        async fn generate_questions(&self, _keyword: &str) -> Vec<String> {
            Vec::new()
        }

        async fn structure_answers(
            &self,
            _keyword: &str,
            _questions: &[String],
            answer: &str,
        ) -> Result<String, GenerationError> {
            Ok(answer.to_string())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        calls: Mutex<Vec<Vec<Uuid>>>,
        fail: bool,
    }

    #[async_trait]
    impl PublishTrigger for RecordingPublisher {
        fn is_configured(&self) -> bool {
            true
        }

        async fn trigger(&self, campaign_ids: &[Uuid]) -> Result<(), PublishError> {
            self.calls.lock().unwrap().push(campaign_ids.to_vec());
            if self.fail {
                Err(PublishError::Status { status: 500 })
            } else {
                Ok(())
            }
        }
    }

    struct Harness {
        db: Arc<LibSqlBackend>,
        scheduler: CampaignScheduler,
        publisher: Arc<RecordingPublisher>,
        notifications: mpsc::Receiver<OutgoingResponse>,
    }

    async fn harness(threshold: u64, publisher: RecordingPublisher) -> Harness {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let producer = Arc::new(ArticleProducer::new(
            db.clone(),
            Arc::new(EchoGenerator),
            Arc::new(FallbackImageProvider::new(Vec::new())),
        ));
        let publisher = Arc::new(publisher);
        let (tx, rx) = mpsc::channel(16);
        let config = SchedulerConfig {
            inventory_threshold: threshold,
            ..SchedulerConfig::default()
        };
        let scheduler = CampaignScheduler::new(
            config,
            db.clone(),
            producer,
            publisher.clone(),
            tx,
            Some("https://review.example/pending".into()),
        );
        Harness {
            db,
            scheduler,
            publisher,
            notifications: rx,
        }
    }

    async fn campaign(db: &LibSqlBackend, topic: &str) -> Campaign {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let new = NewCampaign::from_request(Some(topic), Some(30), 1, today, &CampaignDefaults::default())
            .unwrap();
        db.create_campaign(&new).await.unwrap()
    }

    async fn content(db: &LibSqlBackend, status: ContentStatus) {
        db.create_content(&NewContent {
            campaign_id: None,
            keyword_id: None,
            title: "t".into(),
            body: "b".into(),
            seo_metadata: serde_json::json!({}),
            social_snippet: String::new(),
            images: Vec::new(),
            platforms: vec![Platform::Twitter],
            status,
            scheduled_at: None,
        })
        .await
        .unwrap();
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn words(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("kw-{i}")).collect()
    }

    #[tokio::test]
    async fn replenish_fills_to_threshold_once() {
        let h = harness(3, RecordingPublisher::default()).await;
        let c = campaign(&h.db, "Rust").await;
        h.db.add_keywords(&words(5), Some(c.id)).await.unwrap();

        let report = h.scheduler.replenish_inventory().await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].channel, "twitter");
        assert_eq!(report[0].generated, 3);
        assert_eq!(h.db.count_pending_content("twitter").await.unwrap(), 3);

        let summary = replenishment_summary(&report).unwrap();
        assert!(summary.contains("twitter 渠道剩余内容不足，已自动生成 3 篇文章"));

        let again = h.scheduler.replenish_inventory().await.unwrap();
        assert!(again.is_empty());
        assert!(replenishment_summary(&again).is_none());
        assert_eq!(h.db.count_pending_content("twitter").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn replenish_stops_when_pool_is_empty() {
        let h = harness(5, RecordingPublisher::default()).await;
        let c = campaign(&h.db, "Rust").await;
        h.db.add_keywords(&words(2), Some(c.id)).await.unwrap();

        let report = h.scheduler.replenish_inventory().await.unwrap();
        assert_eq!(report[0].generated, 2);
        assert_eq!(h.db.count_pending_content("twitter").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn replenish_only_runs_on_the_hour() {
        let mut h = harness(3, RecordingPublisher::default()).await;
        let c = campaign(&h.db, "Rust").await;
        h.db.add_keywords(&words(3), Some(c.id)).await.unwrap();

        h.scheduler.tick(at(8, 1)).await;
        assert_eq!(h.db.count_pending_content("twitter").await.unwrap(), 0);

        h.scheduler.tick(at(9, 0)).await;
        assert_eq!(h.db.count_pending_content("twitter").await.unwrap(), 3);

        let note = h.notifications.try_recv().unwrap();
        assert!(note.content.contains("已自动生成 3 篇文章"));
    }

    #[tokio::test]
    async fn reminder_fires_once_per_window() {
        let mut h = harness(10, RecordingPublisher::default()).await;
        campaign(&h.db, "Rust").await;
        content(&h.db, ContentStatus::Pending).await;
        content(&h.db, ContentStatus::Approved).await;

        assert_eq!(h.scheduler.check_reminders(at(7, 0)).await.unwrap(), 1);
        let note = h.notifications.try_recv().unwrap();
        assert!(note.content.contains("待审核文章：1 篇"));
        assert!(note.content.contains("已批准文章：1 篇"));
        assert!(note.content.contains("https://review.example/pending"));

        assert_eq!(h.scheduler.check_reminders(at(7, 0)).await.unwrap(), 0);
        assert_eq!(h.scheduler.check_reminders(at(7, 5)).await.unwrap(), 0);
        assert!(h.notifications.try_recv().is_err());
    }

    #[tokio::test]
    async fn reminder_needs_pending_content() {
        let mut h = harness(10, RecordingPublisher::default()).await;
        campaign(&h.db, "Rust").await;
        content(&h.db, ContentStatus::Approved).await;

        assert_eq!(h.scheduler.check_reminders(at(7, 0)).await.unwrap(), 0);
        assert!(h.notifications.try_recv().is_err());
    }

    #[tokio::test]
    async fn reminder_ignores_other_hours() {
        let h = harness(10, RecordingPublisher::default()).await;
        campaign(&h.db, "Rust").await;
        content(&h.db, ContentStatus::Pending).await;

        assert_eq!(h.scheduler.check_reminders(at(6, 55)).await.unwrap(), 0);
        assert_eq!(h.scheduler.check_reminders(at(10, 0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn publish_fires_once_for_all_due_campaigns() {
        let h = harness(10, RecordingPublisher::default()).await;
        let a = campaign(&h.db, "Rust").await;
        let b = campaign(&h.db, "Go").await;
        content(&h.db, ContentStatus::Approved).await;

        let fired = h.scheduler.check_publish_time(at(10, 0)).await.unwrap();
        assert_eq!(fired.len(), 2);
        assert!(fired.contains(&a.id) && fired.contains(&b.id));

        assert!(h.scheduler.check_publish_time(at(10, 0)).await.unwrap().is_empty());
        assert_eq!(h.publisher.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn publish_skips_without_approved_content() {
        let h = harness(10, RecordingPublisher::default()).await;
        campaign(&h.db, "Rust").await;
        content(&h.db, ContentStatus::Pending).await;

        assert!(h.scheduler.check_publish_time(at(10, 0)).await.unwrap().is_empty());
        assert!(h.scheduler.check_publish_time(at(10, 1)).await.unwrap().is_empty());
        assert!(h.publisher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_webhook_is_not_retried_within_the_minute() {
        let h = harness(
            10,
            RecordingPublisher {
                fail: true,
                ..Default::default()
            },
        )
        .await;
        campaign(&h.db, "Rust").await;
        content(&h.db, ContentStatus::Approved).await;

        h.scheduler.tick(at(10, 0)).await;
        h.scheduler.tick(at(10, 0)).await;
        assert_eq!(h.publisher.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stop_clears_running_flag() {
        let h = harness(10, RecordingPublisher::default()).await;
        assert!(h.scheduler.is_running());
        h.scheduler.stop();
        assert!(!h.scheduler.is_running());
    }

    #[tokio::test]
    async fn zero_interval_loop_still_exits_cleanly() {
        let h = harness(10, RecordingPublisher::default()).await;
        let scheduler = Arc::new(h.scheduler);
        scheduler.stop();

        let handle = spawn_scheduler(Arc::clone(&scheduler), Duration::ZERO);
        handle.await.unwrap();
    }
}
