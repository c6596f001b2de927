//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmBackend;

/// Complete agent configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmSettings,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    pub scheduler: SchedulerConfig,
    pub campaign: CampaignDefaults,
    pub publish: PublishConfig,
    pub images: ImageConfig,
    /// Link to the content review view, shown in reminders.
    pub review_url: Option<String>,
    /// Directory for rolling log files; stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Build the full configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            llm: LlmSettings::from_env()?,
            db_path: std::env::var("SEO_AGENT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/seo-agent.db")),
            scheduler: SchedulerConfig::from_env()?,
            campaign: CampaignDefaults::from_env()?,
            publish: PublishConfig::from_env()?,
            images: ImageConfig::from_env(),
            review_url: non_empty_env("SEO_AGENT_REVIEW_URL"),
            log_dir: non_empty_env("SEO_AGENT_LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Language-model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub backend: LlmBackend,
    /// `None` until the user configures a key; `setup` reports it.
    pub api_key: Option<SecretString>,
    pub model: String,
}

impl LlmSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match std::env::var("SEO_AGENT_LLM_BACKEND")
            .unwrap_or_else(|_| "openai".to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => LlmBackend::OpenAi,
            "anthropic" => LlmBackend::Anthropic,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "SEO_AGENT_LLM_BACKEND".into(),
                    message: format!("unknown backend '{other}' (expected openai or anthropic)"),
                });
            }
        };

        let key_var = match backend {
            LlmBackend::OpenAi => "OPENAI_API_KEY",
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        };
        let default_model = match backend {
            LlmBackend::OpenAi => "gpt-4o",
            LlmBackend::Anthropic => "claude-sonnet-4-20250514",
        };

        Ok(Self {
            backend,
            api_key: non_empty_env(key_var).map(SecretString::from),
            model: std::env::var("SEO_AGENT_MODEL").unwrap_or_else(|_| default_model.to_string()),
        })
    }
}

/// Background scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Sleep between loop iterations.
    pub poll_interval: Duration,
    /// Pending content per channel below which inventory is replenished.
    pub inventory_threshold: u64,
    /// How long before publish time the reminder fires.
    pub reminder_lead: chrono::Duration,
    /// Width of the reminder match window, in minutes.
    pub reminder_window_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(60),
            inventory_threshold: 10,
            reminder_lead: chrono::Duration::hours(3),
            reminder_window_minutes: 5,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            enabled: env_parse("SEO_AGENT_SCHEDULER_ENABLED", defaults.enabled)?,
            poll_interval: poll_interval(env_parse(
                "SEO_AGENT_POLL_INTERVAL_SECS",
                defaults.poll_interval.as_secs(),
            )?)?,
            inventory_threshold: env_parse(
                "SEO_AGENT_INVENTORY_THRESHOLD",
                defaults.inventory_threshold,
            )?,
            ..defaults
        })
    }
}

/// The scheduler ticker cannot run on a zero period.
fn poll_interval(secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: "SEO_AGENT_POLL_INTERVAL_SECS".to_string(),
            message: "must be at least 1 second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

/// Values applied to campaigns created from a chat command.
#[derive(Debug, Clone)]
pub struct CampaignDefaults {
    /// Used when the command names no duration.
    pub duration_days: i64,
    pub publish_time: NaiveTime,
    pub auto_approve: bool,
    pub website_webhook_url: Option<String>,
    pub channels: Vec<String>,
}

impl Default for CampaignDefaults {
    fn default() -> Self {
        Self {
            duration_days: 30,
            publish_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default(),
            auto_approve: false,
            website_webhook_url: None,
            channels: vec!["twitter".to_string()],
        }
    }
}

impl CampaignDefaults {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let publish_time = match non_empty_env("SEO_AGENT_PUBLISH_TIME") {
            Some(raw) => NaiveTime::parse_from_str(&raw, "%H:%M").map_err(|e| {
                ConfigError::InvalidValue {
                    key: "SEO_AGENT_PUBLISH_TIME".into(),
                    message: format!("expected HH:MM: {e}"),
                }
            })?,
            None => defaults.publish_time,
        };

        let channels = match non_empty_env("SEO_AGENT_CHANNELS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.channels,
        };

        Ok(Self {
            duration_days: defaults.duration_days,
            publish_time,
            auto_approve: env_parse("SEO_AGENT_AUTO_APPROVE", defaults.auto_approve)?,
            website_webhook_url: non_empty_env("WEBSITE_WEBHOOK_URL"),
            channels,
        })
    }
}

/// Publish webhook settings.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub webhook_url: Option<String>,
    pub timeout: Duration,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl PublishConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            webhook_url: non_empty_env("SEO_AGENT_PUBLISH_WEBHOOK_URL"),
            timeout: Duration::from_secs(env_parse(
                "SEO_AGENT_PUBLISH_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
        })
    }
}

/// Image provider credentials.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub unsplash_access_key: Option<SecretString>,
    pub openai_api_key: Option<SecretString>,
    pub model: String,
}

impl ImageConfig {
    pub fn from_env() -> Self {
        Self {
            unsplash_access_key: non_empty_env("UNSPLASH_ACCESS_KEY").map(SecretString::from),
            openai_api_key: non_empty_env("OPENAI_API_KEY").map(SecretString::from),
            model: std::env::var("IMAGE_GENERATION_MODEL").unwrap_or_else(|_| "dall-e-3".into()),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match non_empty_env(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.inventory_threshold, 10);
        assert_eq!(config.reminder_lead, chrono::Duration::hours(3));
        assert_eq!(config.reminder_window_minutes, 5);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = poll_interval(0).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "SEO_AGENT_POLL_INTERVAL_SECS"));
        assert_eq!(poll_interval(1).unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn campaign_defaults() {
        let defaults = CampaignDefaults::default();
        assert_eq!(defaults.publish_time.format("%H:%M").to_string(), "10:00");
        assert_eq!(defaults.channels, vec!["twitter"]);
        assert_eq!(defaults.duration_days, 30);
        assert!(!defaults.auto_approve);
    }

    #[test]
    fn publish_timeout_is_short() {
        assert_eq!(PublishConfig::default().timeout, Duration::from_secs(10));
    }

    #[test]
    fn env_parse_falls_back_to_default() {
        let value: u64 = env_parse("SEO_AGENT_TEST_UNSET_VARIABLE_XYZ", 42).unwrap();
        assert_eq!(value, 42);
    }
}
