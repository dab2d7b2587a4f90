use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::quiz::controller::FEEDBACK_DELAY;
use crate::quiz::provider::ProviderConfig;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var} has an invalid value `{value}`")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub provider: ProviderConfig,
    pub feedback_delay: Duration,
    /// Directory holding `start.ogg`, `correct.ogg`, `incorrect.ogg` and `end.ogg`.
    pub sounds_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // blank values count as unset
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let telegram_token = get("TELOXIDE_TOKEN").ok_or(ConfigError::Missing("TELOXIDE_TOKEN"))?;
        let api_key = get("GEMINI_API_KEY")
            .or_else(|| get("API_KEY"))
            .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let timeout_secs = parsed(&get, "QUIZ_REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let feedback_ms = parsed(
            &get,
            "QUIZ_FEEDBACK_DELAY_MS",
            FEEDBACK_DELAY.as_millis() as u64,
        )?;

        Ok(Self {
            telegram_token,
            provider: ProviderConfig {
                base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
                api_key,
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
                timeout: Duration::from_secs(timeout_secs),
            },
            feedback_delay: Duration::from_millis(feedback_ms),
            sounds_dir: get("QUIZ_SOUNDS_DIR").map(PathBuf::from),
        })
    }
}

fn parsed<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var) {
        Some(value) => parse(var, value),
        None => Ok(default),
    }
}

fn parse<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { var, value })
}
