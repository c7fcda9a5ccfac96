//! Bot configuration from environment variables.
//!
//! Everything is read once at startup; a `.env` file is honoured if
//! present. Store credentials come as a pair: providing only one of the
//! URL and the API key is a configuration error, because a flush would
//! then fail at the worst possible moment.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::vad::VadEngineKind;

const DEFAULT_SAMPLE_RATE: u32 = 16000;
const DEFAULT_STOP_SECS: f32 = 0.5;
const DEFAULT_ASSETS_DIR: &str = "assets";
const DEFAULT_PROMPTS_DIR: &str = "prompts";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("STORE_URL and STORE_API_KEY must be provided together")]
    PartialStoreCredentials,
}

/// Persistence credentials, present as a pair or not at all.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub api_key: String,
}

/// Everything the binary needs to run one room.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub room_url: String,
    pub sample_rate: u32,
    pub vad_engine: VadEngineKind,
    pub stop_secs: f32,
    pub store: Option<StoreConfig>,
    pub assets_dir: PathBuf,
    pub prompts_dir: PathBuf,
}

impl BotConfig {
    /// Load configuration from the environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let room_url = env::var("ROOM_URL").map_err(|_| ConfigError::Missing("ROOM_URL"))?;

        let sample_rate = match env::var("AUDIO_SAMPLE_RATE") {
            Ok(raw) => parse_sample_rate(&raw)?,
            Err(_) => DEFAULT_SAMPLE_RATE,
        };

        let vad_engine = match env::var("VAD_ENGINE") {
            Ok(raw) => raw.parse::<VadEngineKind>().map_err(|e| ConfigError::Invalid {
                name: "VAD_ENGINE",
                reason: e,
            })?,
            Err(_) => VadEngineKind::default(),
        };

        let stop_secs = match env::var("VAD_STOP_SECS") {
            Ok(raw) => parse_stop_secs(&raw)?,
            Err(_) => DEFAULT_STOP_SECS,
        };

        let store = store_config(env::var("STORE_URL").ok(), env::var("STORE_API_KEY").ok())?;

        let assets_dir = env::var("SPRITE_ASSETS_DIR")
            .unwrap_or_else(|_| DEFAULT_ASSETS_DIR.to_string())
            .into();
        let prompts_dir = env::var("PROMPTS_DIR")
            .unwrap_or_else(|_| DEFAULT_PROMPTS_DIR.to_string())
            .into();

        Ok(Self {
            room_url,
            sample_rate,
            vad_engine,
            stop_secs,
            store,
            assets_dir,
            prompts_dir,
        })
    }

    pub fn greeting_path(&self) -> PathBuf {
        self.prompts_dir.join("greeting.txt")
    }

    pub fn system_prompt_path(&self) -> PathBuf {
        self.prompts_dir.join("system.txt")
    }
}

fn parse_sample_rate(raw: &str) -> Result<u32, ConfigError> {
    let rate = raw.parse::<u32>().map_err(|e| ConfigError::Invalid {
        name: "AUDIO_SAMPLE_RATE",
        reason: e.to_string(),
    })?;
    if rate != 8000 && rate != 16000 {
        return Err(ConfigError::Invalid {
            name: "AUDIO_SAMPLE_RATE",
            reason: format!("{rate} is not a supported rate (8000 or 16000)"),
        });
    }
    Ok(rate)
}

fn parse_stop_secs(raw: &str) -> Result<f32, ConfigError> {
    let secs = raw.parse::<f32>().map_err(|e| ConfigError::Invalid {
        name: "VAD_STOP_SECS",
        reason: e.to_string(),
    })?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::Invalid {
            name: "VAD_STOP_SECS",
            reason: format!("{secs} must be a positive duration"),
        });
    }
    Ok(secs)
}

fn store_config(
    url: Option<String>,
    api_key: Option<String>,
) -> Result<Option<StoreConfig>, ConfigError> {
    match (url, api_key) {
        (Some(url), Some(api_key)) => Ok(Some(StoreConfig { url, api_key })),
        (None, None) => Ok(None),
        _ => Err(ConfigError::PartialStoreCredentials),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rate_allows_only_supported_rates() {
        assert_eq!(parse_sample_rate("8000").unwrap(), 8000);
        assert_eq!(parse_sample_rate("16000").unwrap(), 16000);
        assert!(parse_sample_rate("44100").is_err());
        assert!(parse_sample_rate("phone").is_err());
    }

    #[test]
    fn stop_secs_must_be_positive() {
        assert_eq!(parse_stop_secs("0.5").unwrap(), 0.5);
        assert!(parse_stop_secs("0").is_err());
        assert!(parse_stop_secs("-1").is_err());
        assert!(parse_stop_secs("NaN").is_err());
    }

    #[test]
    fn store_credentials_are_all_or_nothing() {
        assert!(store_config(None, None).unwrap().is_none());
        assert!(store_config(Some("url".into()), Some("key".into()))
            .unwrap()
            .is_some());
        assert!(matches!(
            store_config(Some("url".into()), None),
            Err(ConfigError::PartialStoreCredentials)
        ));
        assert!(matches!(
            store_config(None, Some("key".into())),
            Err(ConfigError::PartialStoreCredentials)
        ));
    }
}
