//! Handles settings for the application. Configuration is written in
//! `settings.toml`, with `FISBOT_*` environment variables taking precedence
//! (so secrets never have to live in the file).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
}

/// MWK-per-TRY multipliers, one per rate category.
#[derive(Debug, Deserialize)]
pub struct Rates {
    pub pos: f64,
    pub atm: f64,
}

#[derive(Debug, Deserialize)]
pub struct WhatsApp {
    pub access_token: String,
    pub phone_number_id: String,
    pub verify_token: String,
}

#[derive(Debug, Deserialize)]
pub struct Sms {
    pub gateway_url: String,
    pub sender_id: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
    pub vision_api_key: String,
    pub gemini_api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub database: Database,
    pub server: Server,
    pub rates: Rates,
    pub whatsapp: WhatsApp,
    /// Optional: without it monthly summaries go out chat-only.
    pub sms: Option<Sms>,
    pub providers: Providers,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("FISBOT").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
