use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::models::{Group, Target};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub request_timeout: u64,
    /// Extra attempts after a timed out fetch
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between automatic passes
    pub check_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Minimum gap between two outbound messages
    pub dispatch_delay_ms: u64,
    /// Seconds before a webhook call is abandoned
    pub request_timeout: u64,
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// File holding the webhook URL, e.g. `webhook.txt`
    #[serde(default)]
    pub endpoint_file: Option<PathBuf>,
    #[serde(default)]
    pub targets: Vec<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0".to_string(),
            request_timeout: 10,
            retry_attempts: 1,
            retry_delay_ms: 10_000,
        }
    }
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { check_interval: 3600 }
    }
}

impl SchedulerConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            dispatch_delay_ms: 750,
            request_timeout: 10,
            discord: DiscordConfig::default(),
        }
    }
}

impl NotificationsConfig {
    pub fn dispatch_delay(&self) -> Duration {
        Duration::from_millis(self.dispatch_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            username: Some("Restock Watcher".to_string()),
            avatar_url: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "restock-watcher.log".to_string(),
        }
    }
}

impl AppConfig {
    /// Layered load: `config/default`, then `path`, then `RESTOCK__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let s = builder
            // Add environment variables with prefix "RESTOCK_"
            .add_source(Environment::with_prefix("RESTOCK").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message(
                "Scraper request_timeout must be greater than 0".into(),
            ));
        }

        if self.scheduler.check_interval == 0 {
            return Err(ConfigError::Message(
                "Scheduler check_interval must be greater than 0".into(),
            ));
        }

        if self.notifications.request_timeout == 0 {
            return Err(ConfigError::Message(
                "Notifications request_timeout must be greater than 0".into(),
            ));
        }

        if self.groups.is_empty() {
            return Err(ConfigError::Message("At least one group must be configured".into()));
        }

        let mut names = HashSet::new();
        // State is keyed by canonical URL, so a target may only belong to one group
        let mut owners: HashMap<String, &str> = HashMap::new();
        for group in &self.groups {
            if group.name.trim().is_empty() {
                return Err(ConfigError::Message("Group name must not be empty".into()));
            }

            if !names.insert(group.name.as_str()) {
                return Err(ConfigError::Message(format!("Duplicate group name: {}", group.name)));
            }

            match (&group.endpoint, &group.endpoint_file) {
                (Some(endpoint), None) => {
                    if !is_http_url(endpoint) {
                        return Err(ConfigError::Message(format!(
                            "Group '{}' endpoint must be an http(s) URL",
                            group.name
                        )));
                    }
                }
                (None, Some(_)) => {}
                _ => {
                    return Err(ConfigError::Message(format!(
                        "Group '{}' needs exactly one of endpoint or endpoint_file",
                        group.name
                    )));
                }
            }

            if group.targets.is_empty() {
                return Err(ConfigError::Message(format!("Group '{}' has no targets", group.name)));
            }

            if let Some(bad) = group.targets.iter().find(|t| !is_http_url(t)) {
                return Err(ConfigError::Message(format!(
                    "Group '{}' has an invalid target URL: {}",
                    group.name, bad
                )));
            }

            for target in &group.targets {
                let canonical = canonical_url(target);
                if let Some(owner) = owners.insert(canonical, group.name.as_str()) {
                    return Err(ConfigError::Message(format!(
                        "Target {} is listed in both '{}' and '{}'",
                        target, owner, group.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Resolve configured groups into runtime groups, reading endpoint files.
    pub fn load_groups(&self) -> Result<Vec<Group>, AppError> {
        self.groups.iter().map(GroupConfig::resolve).collect()
    }
}

impl GroupConfig {
    pub fn resolve(&self) -> Result<Group, AppError> {
        let endpoint = match (&self.endpoint, &self.endpoint_file) {
            (Some(endpoint), _) => endpoint.trim().to_string(),
            (None, Some(file)) => {
                let endpoint = std::fs::read_to_string(file)?.trim().to_string();
                if !is_http_url(&endpoint) {
                    return Err(AppError::Validation(format!(
                        "Endpoint file {} for group '{}' does not contain an http(s) URL",
                        file.display(),
                        self.name
                    )));
                }
                endpoint
            }
            (None, None) => {
                return Err(AppError::Validation(format!(
                    "Group '{}' has no endpoint",
                    self.name
                )));
            }
        };

        let targets = self
            .targets
            .iter()
            .map(|url| Target::new(url))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Group::new(self.name.clone(), endpoint, targets))
    }
}

fn canonical_url(value: &str) -> String {
    Url::parse(value.trim())
        .map(|url| url.to_string())
        .unwrap_or_else(|_| value.trim().to_string())
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value.trim())
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}
