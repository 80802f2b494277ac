use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AgentError, Result};
use crate::types::{DEFAULT_MODEL, DEFAULT_VIEWPORT};

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for the decision service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub display_width: u32,
    pub display_height: u32,
    pub environment: String,
}

impl ServiceConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
            display_width: DEFAULT_VIEWPORT.0,
            display_height: DEFAULT_VIEWPORT.1,
            environment: "browser".to_string(),
        }
    }

    /// Read the credential and optional base URL from the process environment.
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honored.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(AgentError::MissingCredential(API_KEY_VAR))?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var(BASE_URL_VAR) {
            config = config.with_base_url(base_url)?;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let parsed = url::Url::parse(&base_url)
            .map_err(|e| AgentError::Config(format!("invalid base URL '{base_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AgentError::Config(format!(
                "base URL must use http:// or https://, got '{base_url}'"
            )));
        }
        self.base_url = base_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn with_display(mut self, width: u32, height: u32) -> Self {
        self.display_width = width;
        self.display_height = height;
        self
    }

    pub fn responses_url(&self) -> String {
        format!("{}/responses", self.base_url)
    }
}

/// Knobs of the turn loop itself.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    /// Pause between turns.
    pub turn_delay: Duration,
    /// How long a `wait` action sleeps.
    pub wait_duration: Duration,
    /// Echo pending safety checks back with the next call output.
    pub acknowledge_safety_checks: bool,
    pub screenshots_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            turn_delay: Duration::from_secs(1),
            wait_duration: Duration::from_secs(3),
            acknowledge_safety_checks: false,
            screenshots_dir: None,
        }
    }
}

/// Launch settings for the headless Chrome provider.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub width: u32,
    pub height: u32,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub idle_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT.0,
            height: DEFAULT_VIEWPORT.1,
            headless: true,
            chrome_path: None,
            idle_timeout: Duration::from_secs(600),
        }
    }
}
