//! Deterministic intent parser for chat commands.
//!
//! Each intent owns a list of case-insensitive patterns. Intents are tried
//! in a fixed priority order and the first intent with any matching pattern
//! wins, regardless of how specific a later match would be.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Confidence reported for every pattern match.
pub const MATCH_CONFIDENCE: f32 = 0.9;
/// Articles requested by a generate command that names no count.
pub const DEFAULT_GENERATE_COUNT: u32 = 5;
/// Articles per day when a campaign command names no frequency.
pub const DEFAULT_FREQUENCY: i64 = 1;

/// The command a message maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Setup,
    CreateCampaign,
    AddKeywords,
    GenerateContent,
    StatusQuery,
    StopCampaign,
    ManualTrigger,
    Unknown,
}

impl IntentKind {
    /// Match order; earlier entries win ties.
    pub const PRIORITY: [IntentKind; 7] = [
        IntentKind::Setup,
        IntentKind::CreateCampaign,
        IntentKind::AddKeywords,
        IntentKind::GenerateContent,
        IntentKind::StatusQuery,
        IntentKind::StopCampaign,
        IntentKind::ManualTrigger,
    ];

    fn patterns(&self) -> &'static [&'static str] {
        match self {
            Self::Setup => &[r"启动.*SEO.*自动化", r"初始化|配置|设置.*系统", r"^\s*/?setup\b"],
            Self::CreateCampaign => &[
                r"启动.*计划",
                r"创建.*运营.*计划",
                r"为期\s*(\d+)\s*天",
                r"主题是?\s*(.+?)(?:，|,|$)",
                r"每天\s*(\d+)\s*篇",
                r"\bcreate\s+(a\s+)?campaign\b",
            ],
            Self::AddKeywords => &[
                r"关键词.*加到.*词库",
                r"添加.*关键词",
                r"把这些关键词",
                r"\badd\s+keywords?\b",
            ],
            Self::GenerateContent => &[
                r"现在生成内容",
                r"生成\s*(\d+)?\s*篇?文章",
                r"立即生成",
                r"生成.*内容",
                r"\bgenerate\b",
            ],
            Self::StatusQuery => &[
                r"汇报.*进度",
                r"查看.*状态",
                r"统计.*数据",
                r"当前.*进展",
                r"^\s*/?status\b",
            ],
            Self::StopCampaign => &[
                r"停止.*计划",
                r"暂停.*运营",
                r"结束.*SEO",
                r"\bstop\s+(the\s+)?campaigns?\b",
            ],
            Self::ManualTrigger => &[r"trigger_publish", r"手动发布", r"立即发布"],
            Self::Unknown => &[],
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Setup => "setup",
            Self::CreateCampaign => "create_campaign",
            Self::AddKeywords => "add_keywords",
            Self::GenerateContent => "generate_content",
            Self::StatusQuery => "status_query",
            Self::StopCampaign => "stop_campaign",
            Self::ManualTrigger => "manual_trigger",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Parameters extracted for an intent.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentParams {
    None,
    Campaign {
        duration_days: Option<i64>,
        topic: Option<String>,
        frequency: i64,
    },
    Keywords(Vec<String>),
    Generate {
        count: u32,
    },
}

/// A classified message.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub kind: IntentKind,
    pub params: IntentParams,
    pub confidence: f32,
}

impl Intent {
    pub fn unknown() -> Self {
        Self {
            kind: IntentKind::Unknown,
            params: IntentParams::None,
            confidence: 0.0,
        }
    }
}

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"为期\s*(\d+)\s*天").expect("duration pattern"));
static TOPIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"主题是?\s*([^，,。]+)").expect("topic pattern"));
static TOPIC_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"每天.*$").expect("topic tail pattern"));
static FREQUENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"每天\s*(\d+)\s*篇").expect("frequency pattern"));
static KEYWORD_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,，、]").expect("keyword delimiter pattern"));
static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:生成|generate)\s*(\d+)").expect("generate count pattern")
});

/// Classifies free-text messages into [`Intent`]s.
pub struct IntentParser {
    table: Vec<(IntentKind, Vec<Regex>)>,
}

impl IntentParser {
    pub fn new() -> Self {
        let table = IntentKind::PRIORITY
            .iter()
            .map(|kind| {
                let regexes = kind
                    .patterns()
                    .iter()
                    .map(|p| Regex::new(&format!("(?i){p}")).expect("intent pattern"))
                    .collect();
                (*kind, regexes)
            })
            .collect();
        Self { table }
    }

    /// Classify one message. Pure: no I/O, no state.
    pub fn parse(&self, message: &str) -> Intent {
        let message = message.trim();

        for (kind, patterns) in &self.table {
            if patterns.iter().any(|re| re.is_match(message)) {
                debug!(intent = %kind, "Matched intent");
                return Intent {
                    kind: *kind,
                    params: extract_params(*kind, message),
                    confidence: MATCH_CONFIDENCE,
                };
            }
        }

        Intent::unknown()
    }
}

impl Default for IntentParser {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_params(kind: IntentKind, message: &str) -> IntentParams {
    match kind {
        IntentKind::CreateCampaign => extract_campaign(message),
        IntentKind::AddKeywords => IntentParams::Keywords(extract_keywords(message)),
        IntentKind::GenerateContent => IntentParams::Generate {
            count: extract_count(message),
        },
        _ => IntentParams::None,
    }
}

/// Numbers too large for the target type saturate so range checks reject them.
fn capture_number(re: &Regex, message: &str) -> Option<i64> {
    re.captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().parse::<i64>().unwrap_or(i64::MAX))
}

fn extract_campaign(message: &str) -> IntentParams {
    let topic = TOPIC_RE
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| TOPIC_TAIL_RE.replace(m.as_str().trim(), "").trim().to_string())
        .filter(|t| !t.is_empty());

    IntentParams::Campaign {
        duration_days: capture_number(&DURATION_RE, message),
        topic,
        frequency: capture_number(&FREQUENCY_RE, message).unwrap_or(DEFAULT_FREQUENCY),
    }
}

/// Split the keyword list that follows a colon or precedes "加到词库里".
pub fn extract_keywords(message: &str) -> Vec<String> {
    let list = if let Some((_, rest)) = message.split_once('：') {
        rest
    } else if let Some((_, rest)) = message.split_once(':') {
        rest
    } else if let Some((head, _)) = message.split_once("加到词库里") {
        head.trim_start_matches(|c: char| c.is_whitespace())
            .trim_start_matches("把这些关键词")
    } else {
        message
    };

    KEYWORD_SPLIT_RE
        .split(list)
        .map(str::trim)
        .filter(|kw| !kw.is_empty())
        .map(String::from)
        .collect()
}

fn extract_count(message: &str) -> u32 {
    match capture_number(&COUNT_RE, message) {
        Some(n) => u32::try_from(n).unwrap_or(u32::MAX),
        None => DEFAULT_GENERATE_COUNT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(msg: &str) -> Intent {
        IntentParser::new().parse(msg)
    }

    #[test]
    fn unknown_message() {
        let intent = parse("今天天气怎么样");
        assert_eq!(intent.kind, IntentKind::Unknown);
        assert_eq!(intent.params, IntentParams::None);
        assert_eq!(intent.confidence, 0.0);
    }

    #[test]
    fn create_campaign_extracts_all_fields() {
        let intent = parse("启动一个为期 30 天的计划，主题是 Web3 隐私技术，每天 2 篇");
        assert_eq!(intent.kind, IntentKind::CreateCampaign);
        assert_eq!(intent.confidence, MATCH_CONFIDENCE);
        assert_eq!(
            intent.params,
            IntentParams::Campaign {
                duration_days: Some(30),
                topic: Some("Web3 隐私技术".into()),
                frequency: 2,
            }
        );
    }

    #[test]
    fn create_campaign_strips_trailing_frequency_from_topic() {
        let intent = parse("为期 7 天，主题是 Rust 编程每天 3 篇");
        assert_eq!(
            intent.params,
            IntentParams::Campaign {
                duration_days: Some(7),
                topic: Some("Rust 编程".into()),
                frequency: 3,
            }
        );
    }

    #[test]
    fn create_campaign_defaults() {
        let intent = parse("启动 SEO 计划");
        assert_eq!(intent.kind, IntentKind::CreateCampaign);
        assert_eq!(
            intent.params,
            IntentParams::Campaign {
                duration_days: None,
                topic: None,
                frequency: DEFAULT_FREQUENCY,
            }
        );
    }

    #[test]
    fn oversized_numbers_saturate() {
        let intent = parse("为期 99999999999999999999 天，主题是 x");
        match intent.params {
            IntentParams::Campaign { duration_days, .. } => {
                assert_eq!(duration_days, Some(i64::MAX))
            }
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn add_keywords_after_colon_drops_empty_tokens() {
        let intent = parse("把这些关键词加到词库里：A, B, ,C");
        assert_eq!(intent.kind, IntentKind::AddKeywords);
        assert_eq!(
            intent.params,
            IntentParams::Keywords(vec!["A".into(), "B".into(), "C".into()])
        );
    }

    #[test]
    fn add_keywords_mixed_delimiters() {
        assert_eq!(
            extract_keywords("添加关键词: 零知识证明，隐私币、 混币器 ,"),
            vec!["零知识证明", "隐私币", "混币器"]
        );
    }

    #[test]
    fn add_keywords_before_marker() {
        assert_eq!(
            extract_keywords("把这些关键词 alpha, beta 加到词库里"),
            vec!["alpha", "beta"]
        );
    }

    #[test]
    fn generate_count() {
        let intent = parse("生成 3 篇文章");
        assert_eq!(intent.kind, IntentKind::GenerateContent);
        assert_eq!(intent.params, IntentParams::Generate { count: 3 });

        let intent = parse("生成内容");
        assert_eq!(intent.kind, IntentKind::GenerateContent);
        assert_eq!(
            intent.params,
            IntentParams::Generate {
                count: DEFAULT_GENERATE_COUNT
            }
        );
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse("汇报一下进度").kind, IntentKind::StatusQuery);
        assert_eq!(parse("停止所有计划").kind, IntentKind::StopCampaign);
        assert_eq!(parse("trigger_publish").kind, IntentKind::ManualTrigger);
        assert_eq!(parse("TRIGGER_PUBLISH").kind, IntentKind::ManualTrigger);
        assert_eq!(parse("初始化系统").kind, IntentKind::Setup);
        assert_eq!(parse("启动 seo 自动化").kind, IntentKind::Setup);
    }

    #[test]
    fn overlap_resolves_by_priority_not_specificity() {
        // Both a duration (create_campaign) and a keyword trigger match.
        let intent = parse("为期 10 天，把这些关键词加到词库里：a, b");
        assert_eq!(intent.kind, IntentKind::CreateCampaign);

        // Keyword trigger beats generate.
        let intent = parse("添加关键词后立即生成");
        assert_eq!(intent.kind, IntentKind::AddKeywords);
    }

    #[test]
    fn priority_order_is_declaration_order() {
        let names: Vec<String> = IntentKind::PRIORITY.iter().map(|k| k.to_string()).collect();
        assert_eq!(
            names,
            [
                "setup",
                "create_campaign",
                "add_keywords",
                "generate_content",
                "status_query",
                "stop_campaign",
                "manual_trigger"
            ]
        );
    }

    #[test]
    fn all_patterns_compile() {
        let parser = IntentParser::new();
        assert_eq!(parser.table.len(), IntentKind::PRIORITY.len());
        assert!(parser.table.iter().all(|(_, res)| !res.is_empty()));
    }
}
