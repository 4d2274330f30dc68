//! Session configuration
//!
//! Loaded from TOML. Every section and field has a default, so an empty
//! file is a valid configuration.

use crate::error::ConfigError;
use crate::units::UnitTag;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WandConfig {
    /// Directory for JSON-lines turn logs; `None` keeps logs in memory
    pub log_dir: Option<PathBuf>,
    /// Loop behaviour
    pub session: SessionConfig,
    /// Document and generation parameters
    pub story: StoryConfig,
    /// Remote service endpoints
    pub gateways: GatewayConfig,
    /// Which interaction units a session registers
    pub units: UnitsConfig,
}

impl WandConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io`, `ConfigError::Parse` or `ConfigError::Invalid`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` or `ConfigError::Invalid`.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// `ConfigError::Serialize` if rendering fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.story.slot_count < 2 {
            return Err(ConfigError::Invalid(format!(
                "story.slot_count must be at least 2, got {}",
                self.story.slot_count
            )));
        }
        if self.session.turn_budget < 1 {
            return Err(ConfigError::Invalid(format!(
                "session.turn_budget must be at least 1, got {}",
                self.session.turn_budget
            )));
        }
        if self.session.options_per_page == 0 {
            return Err(ConfigError::Invalid(
                "session.options_per_page must be positive".into(),
            ));
        }
        if self.story.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "story.max_attempts must be positive".into(),
            ));
        }
        if !self.story.variance.is_finite() || self.story.variance <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "story.variance must be a positive number, got {}",
                self.story.variance
            )));
        }
        Ok(())
    }

    /// With turn budget
    #[inline]
    #[must_use]
    pub fn with_turn_budget(mut self, budget: i64) -> Self {
        self.session.turn_budget = budget;
        self
    }

    /// With interrupt negotiation on or off
    #[inline]
    #[must_use]
    pub fn with_interrupts(mut self, enabled: bool) -> Self {
        self.session.enable_interrupt = enabled;
        self
    }

    /// With critic fallback for free-text menu replies
    #[inline]
    #[must_use]
    pub fn with_critic_options(mut self, enabled: bool) -> Self {
        self.session.use_critic_for_options = enabled;
        self
    }

    /// With reply timeout
    #[inline]
    #[must_use]
    pub fn with_reply_timeout(mut self, secs: Option<u64>) -> Self {
        self.session.reply_timeout_secs = secs;
        self
    }

    /// With document length
    #[inline]
    #[must_use]
    pub fn with_slot_count(mut self, slot_count: usize) -> Self {
        self.story.slot_count = slot_count;
        self
    }

    /// With unit preset
    #[inline]
    #[must_use]
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.units.preset = preset.into();
        self
    }

    /// With tag filter
    #[inline]
    #[must_use]
    pub fn with_filtering_tags(mut self, tags: Vec<UnitTag>) -> Self {
        self.units.filtering_tags = Some(tags);
        self
    }

    /// With log directory
    #[inline]
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}

/// Loop behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interactions before the session ends
    pub turn_budget: i64,
    /// Let units propose themselves before the menu
    pub enable_interrupt: bool,
    /// Map free-text menu replies through the critic service
    pub use_critic_for_options: bool,
    /// Menu page size
    pub options_per_page: usize,
    /// Reply wait limit; `None` waits forever
    pub reply_timeout_secs: Option<u64>,
    /// Tell the user how many turns remain each iteration
    pub announce_turns: bool,
}

impl SessionConfig {
    /// Reply timeout as a duration
    #[inline]
    #[must_use]
    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turn_budget: 12,
            enable_interrupt: true,
            use_critic_for_options: false,
            options_per_page: 6,
            reply_timeout_secs: None,
            announce_turns: true,
        }
    }
}

/// Document and generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    /// Number of slots (sentences)
    pub slot_count: usize,
    /// Text every generation prompt starts with
    pub initial_prompt: String,
    /// Topics offered when adding a sketch
    pub suggested_topics: Vec<String>,
    /// Sharpness of sketch curves
    pub variance: f64,
    /// Substrings that make a generated sentence unacceptable
    pub bad_tokens: Vec<String>,
    /// Preceding sentences included in a prompt
    pub max_horizon: usize,
    /// Generation attempts per slot
    pub max_attempts: usize,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            slot_count: 10,
            initial_prompt: "Story for kids: Once upon a time, ".into(),
            suggested_topics: ["Business", "Science", "World", "Sports"]
                .into_iter()
                .map(String::from)
                .collect(),
            variance: 1.0,
            bad_tokens: ["{", "}", "_", "(", ")", "[", "]"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_horizon: 2,
            max_attempts: 5,
        }
    }
}

/// Remote service endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Generation endpoint
    pub generation_url: String,
    /// Critic/scoring endpoint
    pub critic_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl GatewayConfig {
    /// Request timeout as a duration
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            generation_url: "http://localhost:8765/api/pnb".into(),
            critic_url: "http://localhost:8765/api/carp".into(),
            timeout_secs: 60,
        }
    }
}

/// Unit selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitsConfig {
    /// Preset name, see [`crate::units::preset`]
    pub preset: String,
    /// Keep only units carrying at least one of these tags
    pub filtering_tags: Option<Vec<UnitTag>>,
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            preset: "full".into(),
            filtering_tags: None,
        }
    }
}
