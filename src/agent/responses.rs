//! User-facing reply text.

use chrono::NaiveDate;

use crate::campaign::{Campaign, CampaignStats};
use crate::content::ProducedArticle;

pub const UNKNOWN_COMMAND: &str =
    "抱歉，我不理解这个指令。请尝试：'启动 SEO 计划'、'添加关键词'或'生成内容'。";
pub const NO_CAMPAIGN: &str = "⚠️ 请先创建运营计划。";
pub const NO_ACTIVE_CAMPAIGN: &str = "当前没有活跃的运营计划。";
pub const NO_KEYWORDS_GIVEN: &str = "❌ 请至少提供一个关键词。";
pub const EMPTY_POOL: &str = "⚠️ 词库中没有可用的关键词，请先添加关键词。";
pub const ZERO_COUNT: &str = "❌ 生成数量必须大于 0。";
pub const STORE_UNAVAILABLE: &str = "❌ 数据存储暂时不可用，请稍后重试。";
pub const PUBLISH_TRIGGERED: &str = "✅ 已触发发布流程。请稍等 1-2 分钟查看结果。";
pub const PUBLISH_NOT_CONFIGURED: &str =
    "⚠️ 未配置发布 Webhook，请设置 SEO_AGENT_PUBLISH_WEBHOOK_URL。";

pub const FIRST_RUN_GUIDE: &str = "检测到首次使用，需要配置语言模型 API Key：

1. 选择后端：SEO_AGENT_LLM_BACKEND=openai 或 anthropic
2. 将 Key 添加到环境变量：
   OPENAI_API_KEY=your_key_here
   或 ANTHROPIC_API_KEY=your_key_here
3. 可选配置：
   - UNSPLASH_ACCESS_KEY（配图）
   - SEO_AGENT_PUBLISH_WEBHOOK_URL（发布）

配置完成后，重新启动并输入\"初始化系统\"。";

/// Collaborators reported by the setup command.
#[derive(Debug, Clone)]
pub struct SetupReport {
    pub tables: Vec<String>,
    pub llm_model: Option<String>,
    pub publish_configured: bool,
    pub image_sources: Vec<String>,
}

pub fn setup_ready(report: &SetupReport) -> String {
    let llm = match &report.llm_model {
        Some(model) => format!("✅ {model}"),
        None => "⚠️ 未配置".to_string(),
    };
    let publish = if report.publish_configured {
        "✅ 已配置"
    } else {
        "⚠️ 未配置"
    };
    let images = if report.image_sources.is_empty() {
        "⚠️ 未配置".to_string()
    } else {
        format!("✅ {}", report.image_sources.join(" → "))
    };

    format!(
        "✅ 数据库已就绪！\n\n\
         📋 数据表：{tables}\n\n\
         ⚙️ 协作服务：\n\
         - 语言模型：{llm}\n\
         - 发布 Webhook：{publish}\n\
         - 配图来源：{images}\n\n\
         🎯 下一步：创建你的第一个运营计划\n\
         示例：启动一个为期 30 天的计划，主题是 Web3 隐私技术，每天 1 篇",
        tables = report.tables.join(", "),
    )
}

pub fn campaign_created(topic: &str, campaign: &Campaign) -> String {
    format!(
        "✅ 运营计划已创建！\n\n\
         📋 计划概况：\n\
         - 主题：{topic}\n\
         - 周期：{} 天\n\
         - 频率：每天 {} 篇\n\
         - 发布时间：{} (可修改)\n\n\
         🎯 下一步：添加关键词\n\
         示例：把这些关键词加到词库里：关键词1, 关键词2, 关键词3",
        campaign.duration_days(),
        campaign.frequency,
        campaign.publish_time_label(),
    )
}

pub fn keywords_added(count: usize, replenished: Option<&str>) -> String {
    let mut response = format!("✅ 已添加 {count} 个关键词。");
    if let Some(summary) = replenished {
        response.push_str("\n\n");
        response.push_str(summary);
    }
    response
}

pub fn articles_generated(articles: &[ProducedArticle], review_url: Option<&str>) -> String {
    let mut response = format!("✅ 已生成 {} 篇文章，已保存到内容库", articles.len());
    if !articles.is_empty() {
        response.push_str("\n\n📋 内容概览：\n");
        let lines: Vec<String> = articles
            .iter()
            .enumerate()
            .map(|(i, a)| format!("{}. \"{}\"", i + 1, a.title))
            .collect();
        response.push_str(&lines.join("\n"));
    }
    match review_url {
        Some(url) => response.push_str(&format!("\n\n👉 请前往审核内容：\n{url}")),
        None => response.push_str("\n\n👉 请审核生成的内容"),
    }
    response.push_str("\n审核后将状态改为「已批准」即可进入发布流程。");
    response
}

pub fn knowledge_questions(keyword: &str, questions: &[String]) -> String {
    let listed: Vec<String> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {q}", i + 1))
        .collect();
    format!(
        "💡 在为「{keyword}」撰写文章之前，想先了解一些一手信息：\n\n\
         {}\n\n\
         请直接回复你的回答；回复「跳过」则直接生成文章。",
        listed.join("\n")
    )
}

pub fn knowledge_recorded(keyword: &str) -> String {
    format!("📚 已记录「{keyword}」的背景知识。")
}

pub fn knowledge_skipped(keyword: &str) -> String {
    format!("⏭️ 已跳过「{keyword}」的知识收集。")
}

pub fn corrupt_questions(keyword: &str) -> String {
    format!("❌ 「{keyword}」的待回答问题无法读取。请重新回答，或回复「跳过」直接生成。")
}

pub fn knowledge_conflict(keyword: &str) -> String {
    format!("⚠️ 「{keyword}」的状态已被其他操作更新，请重新发送指令。")
}

pub fn generation_failed(keyword: &str, reason: &str) -> String {
    format!("❌ 「{keyword}」的内容生成失败：{reason}")
}

pub fn knowledge_saved_without_campaign(keyword: &str) -> String {
    format!("📚 已记录「{keyword}」的背景知识，创建运营计划后即可生成文章。")
}

pub fn campaigns_stopped(count: usize) -> String {
    format!("✅ 已停止 {count} 个活跃计划。")
}

pub fn publish_failed(reason: &str) -> String {
    format!("❌ 发布触发失败：{reason}")
}

pub fn operation_failed(reason: &str) -> String {
    format!("❌ 操作失败：{reason}")
}

pub fn status_report(campaign: &Campaign, stats: &CampaignStats, today: NaiveDate) -> String {
    let total = campaign.duration_days().max(1);
    let elapsed = (today - campaign.start_date).num_days().clamp(0, total);
    let progress = elapsed * 100 / total;

    format!(
        "📊 运营进度汇报\n\n\
         📅 计划：{plan}\n\
         ⏱️ 进度：{elapsed}/{total} 天 ({progress}%)\n\n\
         📝 内容统计：\n\
         - 总关键词：{} 个\n\
         - 已使用：{} 个\n\
         - 待审核：{} 篇\n\
         - 已批准：{} 篇\n\
         - 已发布：{} 篇\n\n\
         🎯 今日进度：{}/{} 篇已发布",
        stats.total_keywords,
        stats.used_keywords,
        stats.pending_articles,
        stats.approved_articles,
        stats.published_articles,
        stats.published_today,
        campaign.frequency,
        plan = campaign.plan_name,
    )
}
