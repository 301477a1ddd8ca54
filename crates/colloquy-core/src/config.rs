use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ColloquyError, Result};
use crate::types::UserIdentity;

/// Subscription key value shipped in sample configs; never valid.
pub const PLACEHOLDER_SUBSCRIPTION_KEY: &str = "YourSubscriptionKey";

/// Environment variable overriding `speech.subscription_key`.
pub const SPEECH_KEY_ENV: &str = "COLLOQUY_SPEECH_KEY";

/// Environment variable overriding `bot.secret`.
pub const BOT_SECRET_ENV: &str = "COLLOQUY_BOT_SECRET";

/// Top-level configuration for the Colloquy bridge.
///
/// Loaded from `~/.colloquy/config.toml` by default. Each section corresponds
/// to one collaborator of the turn coordinator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColloquyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub turn: TurnConfig,
}

impl ColloquyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ColloquyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Replace secrets with values from the environment when present.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(SPEECH_KEY_ENV) {
            if !key.trim().is_empty() {
                self.speech.subscription_key = key;
            }
        }
        if let Ok(secret) = std::env::var(BOT_SECRET_ENV) {
            if !secret.trim().is_empty() {
                self.bot.secret = secret;
            }
        }
    }

    /// Check value ranges that would otherwise surface as odd runtime behavior.
    pub fn validate(&self) -> Result<()> {
        if self.synthesis.sample_rate == 0 {
            return Err(ColloquyError::Config(
                "synthesis.sample_rate must be greater than zero".to_string(),
            ));
        }
        if self.turn.repoll_interval_ms == 0 {
            return Err(ColloquyError::Config(
                "turn.repoll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.turn.max_reply_polls == 0 {
            return Err(ColloquyError::Config(
                "turn.max_reply_polls must be greater than zero".to_string(),
            ));
        }
        if self.bot.user_id.trim().is_empty() {
            return Err(ColloquyError::Config("bot.user_id must not be empty".to_string()));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Speech recognition service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Cognitive service subscription key.
    pub subscription_key: String,
    /// Service region, e.g. "westeurope".
    pub region: String,
    /// BCP-47 recognition language.
    pub language: String,
}

impl SpeechConfig {
    /// Whether a usable subscription key is configured.
    pub fn has_credentials(&self) -> bool {
        let key = self.subscription_key.trim();
        !key.is_empty() && key != PLACEHOLDER_SUBSCRIPTION_KEY
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            subscription_key: String::new(),
            region: "westeurope".to_string(),
            language: "en-us".to_string(),
        }
    }
}

/// Speech synthesis and playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Output sample rate of synthesized PCM (mono, 16-bit).
    pub sample_rate: u32,
    /// Speaking pace used by the built-in synthesizer, in milliseconds per character.
    pub ms_per_char: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            ms_per_char: 55,
        }
    }
}

/// Bot conversation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Channel secret or token.
    pub secret: String,
    /// User id attached to outgoing messages.
    pub user_id: String,
    /// Display name attached to outgoing messages.
    pub user_name: String,
    /// Greeting posted by the built-in bot when a conversation opens.
    pub greeting: Option<String>,
    /// Artificial reply latency of the built-in bot.
    pub reply_delay_ms: u64,
}

impl BotConfig {
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        let identity = UserIdentity::default();
        Self {
            secret: String::new(),
            user_id: identity.user_id,
            user_name: identity.user_name,
            greeting: None,
            reply_delay_ms: 300,
        }
    }
}

/// Turn coordinator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Delay before polling again when no bot reply has arrived yet.
    pub repoll_interval_ms: u64,
    /// Polls without a bot reply before the turn is abandoned.
    pub max_reply_polls: u32,
}

impl TurnConfig {
    pub fn repoll_interval(&self) -> Duration {
        Duration::from_millis(self.repoll_interval_ms)
    }
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            repoll_interval_ms: 500,
            max_reply_polls: 20,
        }
    }
}
