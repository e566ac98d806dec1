//! Application Configuration Module
//!
//! Loads the VoxAI console settings from environment variables (and an
//! optional `.env` file) into a single struct handed to the runtime.

use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use voxai_core::orchestrator::OrchestratorConfig;
use voxai_core::voice::{Voice, default_catalog};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseProvider {
    Gemini,
    OpenAI,
    /// Offline canned replies, no API key needed.
    Scripted,
}

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub provider: ResponseProvider,
    pub gemini_api_key: Option<SecretString>,
    pub openai_api_key: Option<SecretString>,
    pub chat_model: String,
    pub log_level: Level,
    pub prompts_dir: PathBuf,
    pub default_language: String,
    pub session_label: String,
    pub settle_delay: Duration,
    pub restart_delay: Duration,
    pub response_timeout: Duration,
    /// Silence after which the console recognizer gives up on an utterance.
    pub listen_timeout: Duration,
    /// Console synthesizer pacing, per spoken word.
    pub speech_word: Duration,
    pub voices: Vec<Voice>,
    pub discard_stale_intents: bool,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
}

fn invalid(var: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `RESPONSE_PROVIDER`: "gemini" (default), "openai" or "scripted".
    // *   `GEMINI_API_KEY` / `OPENAI_API_KEY`: required for the matching provider.
    // *   `CHAT_MODEL`: (Optional) Defaults to the provider's model.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    // *   `PROMPTS_DIR`, `DEFAULT_LANGUAGE`, `SESSION_LABEL`: (Optional)
    // *   `SETTLE_DELAY_MS`, `RESTART_DELAY_MS`, `RESPONSE_TIMEOUT_MS`,
    //     `LISTEN_TIMEOUT_MS`, `SPEECH_WORD_MS`: (Optional) timings in milliseconds.
    // *   `VOICES`: (Optional) `name@lang` pairs separated by commas.
    // *   `DISCARD_STALE_INTENTS`: (Optional) "true" to drop late intent labels.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match var("RESPONSE_PROVIDER")
            .unwrap_or_else(|| "gemini".to_string())
            .to_lowercase()
            .as_str()
        {
            "gemini" => ResponseProvider::Gemini,
            "openai" => ResponseProvider::OpenAI,
            "scripted" => ResponseProvider::Scripted,
            other => return Err(invalid("RESPONSE_PROVIDER", other)),
        };

        let gemini_api_key = var("GEMINI_API_KEY").map(SecretString::from);
        let openai_api_key = var("OPENAI_API_KEY").map(SecretString::from);

        let chat_model = var("CHAT_MODEL").unwrap_or_else(|| match provider {
            ResponseProvider::OpenAI => DEFAULT_OPENAI_MODEL.to_string(),
            _ => DEFAULT_GEMINI_MODEL.to_string(),
        });

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| invalid("RUST_LOG", &log_level_str))?;

        let millis = |key: &str, default: u64| -> Result<Duration, ConfigError> {
            match var(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| invalid(key, &raw)),
                None => Ok(Duration::from_millis(default)),
            }
        };

        let discard_stale_intents = match var("DISCARD_STALE_INTENTS") {
            None => false,
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(invalid("DISCARD_STALE_INTENTS", &raw)),
            },
        };

        let voices = match var("VOICES") {
            Some(raw) => parse_voices(&raw)?,
            None => default_catalog(),
        };

        let config = Self {
            provider,
            gemini_api_key,
            openai_api_key,
            chat_model,
            log_level,
            prompts_dir: PathBuf::from(var("PROMPTS_DIR").unwrap_or_else(|| "prompts".to_string())),
            default_language: var("DEFAULT_LANGUAGE").unwrap_or_else(|| "en-US".to_string()),
            session_label: var("SESSION_LABEL").unwrap_or_else(|| "demo@example.com".to_string()),
            settle_delay: millis("SETTLE_DELAY_MS", 400)?,
            restart_delay: millis("RESTART_DELAY_MS", 200)?,
            response_timeout: millis("RESPONSE_TIMEOUT_MS", 15_000)?,
            listen_timeout: millis("LISTEN_TIMEOUT_MS", 8_000)?,
            speech_word: millis("SPEECH_WORD_MS", 250)?,
            voices,
            discard_stale_intents,
        };

        // Validate that the required API key is present for the selected provider.
        match config.provider {
            ResponseProvider::Gemini if config.gemini_api_key.is_none() => Err(
                ConfigError::MissingVar("GEMINI_API_KEY must be set for gemini provider".to_string()),
            ),
            ResponseProvider::OpenAI if config.openai_api_key.is_none() => Err(
                ConfigError::MissingVar("OPENAI_API_KEY must be set for openai provider".to_string()),
            ),
            _ => Ok(config),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            default_language: self.default_language.clone(),
            session_label: self.session_label.clone(),
            settle_delay: self.settle_delay,
            restart_delay: self.restart_delay,
            response_timeout: self.response_timeout,
            discard_stale_intents: self.discard_stale_intents,
        }
    }
}

/// Parses `name@lang,name@lang`. Names may contain spaces.
fn parse_voices(raw: &str) -> Result<Vec<Voice>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.rsplit_once('@') {
            Some((name, lang)) if !name.trim().is_empty() && !lang.trim().is_empty() => {
                Ok(Voice::new(name.trim(), lang.trim()))
            }
            _ => Err(invalid("VOICES", entry)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_gemini_key() {
        let config = load(&[("GEMINI_API_KEY", "g-key")]).unwrap();
        assert_eq!(config.provider, ResponseProvider::Gemini);
        assert_eq!(config.chat_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.gemini_api_key.unwrap().expose_secret(), "g-key");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.settle_delay, Duration::from_millis(400));
        assert_eq!(config.restart_delay, Duration::from_millis(200));
        assert_eq!(config.response_timeout, Duration::from_secs(15));
        assert_eq!(config.default_language, "en-US");
        assert_eq!(config.prompts_dir, PathBuf::from("prompts"));
        assert!(!config.discard_stale_intents);
        assert_eq!(config.voices, default_catalog());
    }

    #[test]
    fn test_missing_key_for_provider() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(_))));
        assert!(matches!(
            load(&[("RESPONSE_PROVIDER", "openai"), ("GEMINI_API_KEY", "g")]),
            Err(ConfigError::MissingVar(_))
        ));
    }

    #[test]
    fn test_scripted_provider_needs_no_key() {
        let config = load(&[("RESPONSE_PROVIDER", "Scripted")]).unwrap();
        assert_eq!(config.provider, ResponseProvider::Scripted);
    }

    #[test]
    fn test_openai_model_default_and_overrides() {
        let config = load(&[
            ("RESPONSE_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk"),
            ("RUST_LOG", "debug"),
            ("SETTLE_DELAY_MS", "750"),
            ("DISCARD_STALE_INTENTS", "true"),
        ])
        .unwrap();
        assert_eq!(config.chat_model, DEFAULT_OPENAI_MODEL);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.orchestrator_config().settle_delay, Duration::from_millis(750));
        assert!(config.orchestrator_config().discard_stale_intents);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cases = [
            ("RUST_LOG", "LOUD"),
            ("RESPONSE_TIMEOUT_MS", "soon"),
            ("RESPONSE_PROVIDER", "carrier-pigeon"),
            ("DISCARD_STALE_INTENTS", "maybe"),
            ("VOICES", "Samantha"),
        ];
        for (var, value) in cases {
            let result = load(&[("RESPONSE_PROVIDER", "scripted"), (var, value)]);
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { .. })),
                "{var}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_voices_parse_name_at_lang() {
        let config = load(&[
            ("RESPONSE_PROVIDER", "scripted"),
            ("VOICES", "Google español@es-ES, Karen@en-AU"),
        ])
        .unwrap();
        assert_eq!(
            config.voices,
            vec![Voice::new("Google español", "es-ES"), Voice::new("Karen", "en-AU")]
        );
    }
}
