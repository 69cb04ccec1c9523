//! Configuration for the check-in bot.
//!
//! Loaded from TOML; every section falls back to defaults that reproduce
//! the deployed bot (weekday 08:00 Pacific check-ins, 09:00 daily reminder).

use crate::campaign::prompt::{Prompt, default_prompts, validate_prompts};
use crate::error::{CheckinError, Result};
use crate::reminder::DEFAULT_REMINDER_TEXT;
use crate::retry::RetryPolicy;
use crate::scheduler::{CalendarRule, Weekday};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timezone the deployed bot ran in.
pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RollcallConfig {
    pub discord: DiscordConfig,
    pub channels: ChannelsConfig,
    pub campaign: CampaignConfig,
    pub reminder: ReminderConfig,
    pub store: StoreConfig,
}

/// Discord connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token. Usually supplied through `DISCORD_BOT_TOKEN`.
    pub bot_token: String,
    /// Guild whose members form the roster. Looked up from the roster
    /// channel when unset.
    pub guild_id: Option<String>,
    /// REST API base URL.
    pub api_base_url: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            guild_id: None,
            api_base_url: "https://discord.com/api/v10".to_owned(),
        }
    }
}

/// Channel references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Channel whose guild supplies the roster.
    pub roster_channel_id: String,
    /// Channel receiving campaign reports.
    pub report_channel_id: String,
    /// Channel receiving the daily reminder. No reminder when unset.
    pub reminder_channel_id: Option<String>,
}

fn default_campaign_schedule() -> CalendarRule {
    CalendarRule::on_weekdays(8, 0, DEFAULT_TIMEZONE, &Weekday::WORKWEEK)
}

/// Check-in campaign settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    pub schedule: CalendarRule,
    /// Seconds to pause between participants.
    pub pacing_secs: u64,
    /// Delete participants' replies once recorded.
    pub cleanup_replies: bool,
    pub retry: RetryPolicy,
    /// Ordered questions.
    pub prompts: Vec<Prompt>,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            schedule: default_campaign_schedule(),
            pacing_secs: 2,
            cleanup_replies: false,
            retry: RetryPolicy::default(),
            prompts: default_prompts(),
        }
    }
}

impl CampaignConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }
}

/// Daily reminder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    pub enabled: bool,
    pub schedule: CalendarRule,
    pub message: String,
    pub retry: RetryPolicy,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: CalendarRule::daily(9, 0, DEFAULT_TIMEZONE),
            message: DEFAULT_REMINDER_TEXT.to_owned(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Response store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store file. Defaults to `responses.json` in the data directory.
    pub path: Option<PathBuf>,
    /// Move an unreadable store aside and start empty instead of refusing
    /// to start.
    pub recover_corrupt: bool,
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(crate::paths::responses_file)
    }
}

impl RollcallConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| CheckinError::InvalidConfig(format!("{}: {e}", path.display())))
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CheckinError::InvalidConfig(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/rollcall/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_file()
    }

    /// Apply the environment variables the deployed bot was configured with.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides_from(&mut self, mut var: impl FnMut(&str) -> Option<String>) {
        let mut get = |key: &str| var(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        if let Some(token) = get("DISCORD_BOT_TOKEN") {
            self.discord.bot_token = token;
        }
        if let Some(id) = get("DISCORD_CHANNEL_ID") {
            self.channels.roster_channel_id = id;
        }
        if let Some(id) = get("DISCORD_RESPONSE_CHANNEL_ID") {
            self.channels.report_channel_id = id;
        }
        if let Some(id) = get("CHECK_IN_CHANNEL_ID") {
            self.channels.reminder_channel_id = Some(id);
        }
    }

    /// Check everything that could make a scheduled fire fail. Runs before
    /// any job is registered.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::InvalidConfig`] or
    /// [`CheckinError::InvalidRule`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.discord.bot_token.trim().is_empty() {
            return Err(CheckinError::InvalidConfig(
                "discord.bot_token is empty (set DISCORD_BOT_TOKEN)".to_owned(),
            ));
        }
        if self.discord.api_base_url.trim().is_empty() {
            return Err(CheckinError::InvalidConfig("discord.api_base_url is empty".to_owned()));
        }
        self.validate_engine()
    }

    /// Validation of everything except the Discord credentials.
    ///
    /// # Errors
    ///
    /// See [`RollcallConfig::validate`].
    pub fn validate_engine(&self) -> Result<()> {
        self.validate_campaign()?;
        self.validate_reminder()
    }

    fn validate_campaign(&self) -> Result<()> {
        if self.channels.roster_channel_id.trim().is_empty() {
            return Err(CheckinError::InvalidConfig(
                "channels.roster_channel_id is empty (set DISCORD_CHANNEL_ID)".to_owned(),
            ));
        }
        if self.channels.report_channel_id.trim().is_empty() {
            return Err(CheckinError::InvalidConfig(
                "channels.report_channel_id is empty (set DISCORD_RESPONSE_CHANNEL_ID)".to_owned(),
            ));
        }
        validate_prompts(&self.campaign.prompts)?;
        self.campaign
            .schedule
            .validate()
            .map_err(|e| CheckinError::InvalidRule(format!("campaign.schedule: {e}")))?;
        self.campaign.retry.validate("campaign.retry")
    }

    fn validate_reminder(&self) -> Result<()> {
        if !self.reminder.enabled {
            return Ok(());
        }
        self.reminder
            .schedule
            .validate()
            .map_err(|e| CheckinError::InvalidRule(format!("reminder.schedule: {e}")))?;
        if self.reminder.message.trim().is_empty() {
            return Err(CheckinError::InvalidConfig("reminder.message is empty".to_owned()));
        }
        self.reminder.retry.validate("reminder.retry")
    }
}
