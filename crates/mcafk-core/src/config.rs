//! Configuration loading and validation.
//!
//! Mirrors the proxy's `config.json` layout: Discord notification shapes
//! (validated here, delivered by external glue), Minecraft account and server
//! settings, and the per-module option bags the predictors and behavior
//! modules consume. Every field has a default so a missing or partial file
//! still yields a runnable configuration; `validate()` rejects what the
//! defaults cannot paper over.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_GAME_PORT, DEFAULT_LOCAL_HOST, DEFAULT_REMOTE_HOST, GAME_VERSION};
use crate::error::{Error, Result};

// =============================================================================
// Field validators
// =============================================================================

/// Validate a Minecraft username: 3-16 characters of `[A-Za-z0-9_]`.
pub fn valid_username(name: &str) -> bool {
    (3..=16).contains(&name.len())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a Discord bot token: exactly 72 characters when set.
pub fn valid_bot_token(token: &str) -> bool {
    token.is_empty() || (token.len() == 72 && token.chars().all(|c| !c.is_whitespace()))
}

/// Validate a game version string of the `1.x` or `1.x.y` form.
pub fn valid_game_version(version: &str) -> bool {
    let mut parts = version.split('.');
    if parts.next() != Some("1") {
        return false;
    }
    let mut seen = 0;
    for part in parts {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) || part.len() > 2 {
            return false;
        }
        seen += 1;
    }
    (1..=2).contains(&seen)
}

/// Validate a webhook URL: http(s) scheme with a non-empty host part.
pub fn valid_webhook_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty())
}

// =============================================================================
// Discord section (shapes only; delivery is external glue)
// =============================================================================

/// Interactive Discord bot settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordBotConfig {
    /// Whether to use the Discord bot or not.
    pub enabled: bool,
    /// The Discord bot token to send updates to.
    pub bot_token: String,
    /// The prefix for the Discord bot's simple commands.
    pub prefix: String,
}

impl Default for DiscordBotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            prefix: "!".to_string(),
        }
    }
}

/// Webhook target for queue-position updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueWebhookConfig {
    /// Webhook URL for queue updates.
    pub url: String,
    /// Begin sending updates from this position and under.
    pub report_at: u32,
}

impl Default for QueueWebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            report_at: 9999,
        }
    }
}

/// Webhook URLs for logging.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhooksConfig {
    /// Whether to use the Discord webhooks or not.
    pub enabled: bool,
    /// Queue update target.
    pub queue: QueueWebhookConfig,
    /// Webhook URL for in-game chat.
    pub game_chat: String,
    /// Webhook URL for server updates.
    pub server_info: String,
}

/// Discord notification configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub bot: DiscordBotConfig,
    pub webhooks: WebhooksConfig,
}

// =============================================================================
// Minecraft section
// =============================================================================

/// Account authentication type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    #[default]
    Microsoft,
    Mojang,
    Offline,
}

/// Minecraft account details. Credentials are never persisted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// In-game player name (only significant in offline mode).
    pub username: String,
    /// Account email; empty for offline accounts.
    pub email: String,
    /// Account password; empty for Microsoft device-code auth.
    pub password: String,
    /// Authentication type.
    pub auth: AuthKind,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            username: "default-username".to_string(),
            email: String::new(),
            password: String::new(),
            auth: AuthKind::Microsoft,
        }
    }
}

/// Address of the remote server the bot connects to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteServerConfig {
    pub host: String,
    pub port: u16,
    pub version: String,
}

impl Default for RemoteServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_REMOTE_HOST.to_string(),
            port: DEFAULT_GAME_PORT,
            version: GAME_VERSION.to_string(),
        }
    }
}

/// The local endpoint proxy users connect to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalServerConfig {
    pub host: String,
    pub port: u16,
    pub version: String,
    /// Whether to enable online-mode on the proxy.
    pub online_mode: bool,
    /// Maximum allowed players to connect to the local server.
    pub max_players: u32,
}

impl Default for LocalServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_LOCAL_HOST.to_string(),
            port: DEFAULT_GAME_PORT,
            version: GAME_VERSION.to_string(),
            online_mode: true,
            max_players: 1,
        }
    }
}

/// MOTD options for the local server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MotdConfig {
    /// Prefix to the standard MOTD (color codes allowed).
    pub prefix: String,
}

/// Display options for the local server, unrelated to proxy behavior.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalServerOptions {
    pub motd_options: MotdConfig,
}

// =============================================================================
// Module option bags
// =============================================================================

/// Walk-around anti-idle movement options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkAroundConfig {
    pub enabled: bool,
    /// Wander radius around the last observed position, in blocks.
    pub radius: f64,
    /// Milliseconds between wander steps.
    pub interval_ms: u64,
}

impl Default for WalkAroundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius: 8.0,
            interval_ms: 5000,
        }
    }
}

/// Look-around anti-idle options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookAroundConfig {
    pub enabled: bool,
    /// Milliseconds between glances.
    pub interval_ms: u64,
}

impl Default for LookAroundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 3000,
        }
    }
}

/// Kill-aura passive options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KillAuraConfig {
    pub enabled: bool,
}

impl Default for KillAuraConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Anti-idle module settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiAfkConfig {
    pub enabled: bool,
    pub walk_around: WalkAroundConfig,
    pub look_around: LookAroundConfig,
    pub kill_aura: KillAuraConfig,
}

impl Default for AntiAfkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            walk_around: WalkAroundConfig::default(),
            look_around: LookAroundConfig::default(),
            kill_aura: KillAuraConfig::default(),
        }
    }
}

/// Auto-eat options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoEatConfig {
    pub enabled: bool,
    /// Keep eating until the hunger bar is full.
    pub eat_until_full: bool,
    /// Milliseconds to wait between eat attempts.
    pub eating_timeout_ms: u64,
    /// Eat when health drops to this value, in half-hearts.
    pub min_health: f32,
    /// Eat when the food level drops to this value.
    pub min_hunger: i32,
    /// Re-select the previously held item after eating.
    pub return_to_last_item: bool,
    /// Eat from the off hand.
    pub use_off_hand: bool,
    /// Food items never to eat. Enforcement needs inventory data and stays
    /// with the protocol adapter; the list is validated and passed through.
    pub banned_food: Vec<String>,
}

impl Default for AutoEatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            eat_until_full: true,
            eating_timeout_ms: 3000,
            min_health: 14.0,
            min_hunger: 15,
            return_to_last_item: true,
            use_off_hand: true,
            banned_food: vec![
                "rotten_flesh".to_string(),
                "pufferfish".to_string(),
                "chorus_fruit".to_string(),
                "poisonous_potato".to_string(),
                "spider_eye".to_string(),
            ],
        }
    }
}

/// Proxy behavior settings not found in stock server options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyBehaviorConfig {
    /// Whether the bot should reconnect when disconnected.
    pub restart_on_disconnect: bool,
    pub anti_afk: AntiAfkConfig,
    pub auto_eat: AutoEatConfig,
    /// Player names allowed to attach to the proxy. `None` allows anyone.
    pub whitelist: Option<Vec<String>>,
}

impl Default for ProxyBehaviorConfig {
    fn default() -> Self {
        Self {
            restart_on_disconnect: true,
            anti_afk: AntiAfkConfig::default(),
            auto_eat: AutoEatConfig::default(),
            whitelist: None,
        }
    }
}

/// All Minecraft related settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MinecraftConfig {
    pub account: AccountConfig,
    pub remote_server: RemoteServerConfig,
    pub local_server: LocalServerConfig,
    pub local_server_options: LocalServerOptions,
    pub local_server_proxy_config: ProxyBehaviorConfig,
}

// =============================================================================
// Top level
// =============================================================================

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discord: DiscordConfig,
    pub minecraft: MinecraftConfig,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| {
            Error::config("<root>", format!("invalid JSON: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every rule the defaults cannot guarantee.
    pub fn validate(&self) -> Result<()> {
        if !valid_username(&self.minecraft.account.username) {
            return Err(Error::config(
                "minecraft.account.username",
                "must be 3-16 characters of [A-Za-z0-9_]",
            ));
        }

        if !valid_bot_token(&self.discord.bot.bot_token) {
            return Err(Error::config(
                "discord.bot.bot_token",
                "must be 72 characters when set",
            ));
        }

        for (field, server) in [
            ("minecraft.remote_server", &self.minecraft.remote_server.host),
            ("minecraft.local_server", &self.minecraft.local_server.host),
        ] {
            if server.is_empty() {
                return Err(Error::config(format!("{field}.host"), "must not be empty"));
            }
        }

        if self.minecraft.remote_server.port == 0 {
            return Err(Error::config("minecraft.remote_server.port", "must be non-zero"));
        }
        if self.minecraft.local_server.port == 0 {
            return Err(Error::config("minecraft.local_server.port", "must be non-zero"));
        }

        for (field, version) in [
            (
                "minecraft.remote_server.version",
                &self.minecraft.remote_server.version,
            ),
            (
                "minecraft.local_server.version",
                &self.minecraft.local_server.version,
            ),
        ] {
            if !valid_game_version(version) {
                return Err(Error::config(field, "must look like 1.x or 1.x.y"));
            }
        }

        if self.minecraft.local_server.max_players == 0 {
            return Err(Error::config(
                "minecraft.local_server.max_players",
                "must be at least 1",
            ));
        }

        if self.discord.webhooks.enabled {
            for (field, url) in [
                ("discord.webhooks.queue.url", &self.discord.webhooks.queue.url),
                ("discord.webhooks.game_chat", &self.discord.webhooks.game_chat),
                ("discord.webhooks.server_info", &self.discord.webhooks.server_info),
            ] {
                if !url.is_empty() && !valid_webhook_url(url) {
                    return Err(Error::config(field, "must be an http(s) URL"));
                }
            }
        }

        let behavior = &self.minecraft.local_server_proxy_config;

        if let Some(whitelist) = &behavior.whitelist {
            for name in whitelist {
                if !valid_username(name) {
                    return Err(Error::config(
                        "minecraft.local_server_proxy_config.whitelist",
                        format!("invalid username {name:?}"),
                    ));
                }
            }
        }

        let anti_afk = &behavior.anti_afk;
        if anti_afk.walk_around.radius <= 0.0 || !anti_afk.walk_around.radius.is_finite() {
            return Err(Error::config(
                "minecraft.local_server_proxy_config.anti_afk.walk_around.radius",
                "must be a positive number",
            ));
        }
        if anti_afk.walk_around.interval_ms == 0 || anti_afk.look_around.interval_ms == 0 {
            return Err(Error::config(
                "minecraft.local_server_proxy_config.anti_afk",
                "intervals must be non-zero",
            ));
        }

        let auto_eat = &behavior.auto_eat;
        if !(0.0..=20.0).contains(&auto_eat.min_health) {
            return Err(Error::config(
                "minecraft.local_server_proxy_config.auto_eat.min_health",
                "must be within 0..=20",
            ));
        }
        if !(0..=20).contains(&auto_eat.min_hunger) {
            return Err(Error::config(
                "minecraft.local_server_proxy_config.auto_eat.min_hunger",
                "must be within 0..=20",
            ));
        }
        if auto_eat.eating_timeout_ms == 0 {
            return Err(Error::config(
                "minecraft.local_server_proxy_config.auto_eat.eating_timeout_ms",
                "must be non-zero",
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
