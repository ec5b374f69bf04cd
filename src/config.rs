use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::judge::PollPolicy;

#[derive(Parser)]
#[command(name = "codearena", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: String,

    /// Whether to flush the existing database
    #[arg(long = "flush-data", short = 'f', default_value_t = false)]
    pub flush_data: bool,
}

impl CliArgs {
    /// Load the configuration from the specified file
    pub fn to_config(&self) -> anyhow::Result<Config> {
        let file = std::fs::File::open(&self.config_path)?;
        let reader = std::io::BufReader::new(file);
        let mut config: Config = serde_json::from_reader(reader)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub cooldown: CooldownConfig,
    pub admin: AdminConfig,
}

impl Config {
    /// `JUDGE0_KEY` wins over the key in the file
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("JUDGE0_KEY")
            && !key.is_empty()
        {
            self.judge.api_key = Some(key);
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.judge.max_poll_rounds > 0,
            "judge.max_poll_rounds must be at least 1"
        );
        anyhow::ensure!(
            self.cooldown.window_secs > 0,
            "cooldown.window_secs must be at least 1"
        );
        anyhow::ensure!(!self.admin.token.is_empty(), "admin.token must not be empty");
        Ok(())
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

#[derive(Deserialize, Debug, Default)]
pub struct DatabaseConfig {
    /// Defaults to the platform data directory
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct JudgeConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_host: Option<String>,
    pub request_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub max_poll_rounds: u32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://judge0-ce.p.rapidapi.com".to_string(),
            api_key: None,
            api_host: Some("judge0-ce.p.rapidapi.com".to_string()),
            request_timeout_ms: 10_000,
            poll_interval_ms: 1_000,
            max_poll_rounds: 60,
        }
    }
}

impl JudgeConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_rounds: self.max_poll_rounds,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CooldownConfig {
    /// In-process store when absent
    pub redis_url: Option<String>,
    pub window_secs: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            window_secs: 10,
        }
    }
}

/// Bootstrap administrator, stored as user 0
#[derive(Deserialize, Debug, Clone)]
pub struct AdminConfig {
    pub name: String,
    pub email: String,
    pub token: String,
}
