//! CLI argument definitions for the Colloquy application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "COLLOQUY_CONFIG";

/// Colloquy - talk to a bot by voice, one turn at a time.
///
/// Lines typed on stdin are treated as finalized speech transcripts.
#[derive(Parser, Debug)]
#[command(name = "colloquy", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Greeting the bot posts when the conversation opens.
    #[arg(short = 'g', long = "greeting")]
    pub greeting: Option<String>,

    /// Delay before the bot's reply becomes visible, in milliseconds.
    #[arg(long = "reply-delay-ms")]
    pub reply_delay_ms: Option<u64>,

    /// Wait for `/start` instead of starting the conversation immediately.
    #[arg(long = "no-autostart")]
    pub no_autostart: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > COLLOQUY_CONFIG env var > ~/.colloquy/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Resolve the bot greeting.
    ///
    /// Priority: --greeting flag > config file value. An empty flag disables it.
    pub fn resolve_greeting(&self, config_greeting: Option<&str>) -> Option<String> {
        match self.greeting.as_deref() {
            Some(g) if g.trim().is_empty() => None,
            Some(g) => Some(g.to_string()),
            None => config_greeting.map(str::to_string),
        }
    }

    /// Resolve the bot reply delay.
    ///
    /// Priority: --reply-delay-ms flag > config file value.
    pub fn resolve_reply_delay(&self, config_ms: u64) -> Duration {
        Duration::from_millis(self.reply_delay_ms.unwrap_or(config_ms))
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".colloquy").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".colloquy").join("config.toml");
    }
    PathBuf::from("config.toml")
}
