//! Client configuration: local display windows, the buzz-block heuristic and the
//! fallback timeouts used when a snapshot does not carry its own.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use crate::dto::snapshot::Question;

/// Default location on disk where the client looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/client.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_SYNC_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration handed to the synchronizer.
pub struct ClientConfig {
    /// How long score deltas stay visible after a snapshot changed a score.
    pub score_delta_window: Duration,
    /// How long a transient advisory message stays visible.
    pub advisory_window: Duration,
    /// Reading-time delay applied before the first buzz on a clue.
    pub buzz_block: BuzzBlockConfig,
    /// Timeouts used when the snapshot leaves one out.
    pub timeouts: TimeoutDefaults,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Read-speed heuristic for the first-buzz block.
pub struct BuzzBlockConfig {
    /// Reading time granted per word of clue text.
    pub per_word: Duration,
    /// Lower clamp.
    pub min: Duration,
    /// Upper clamp.
    pub max: Duration,
}

impl BuzzBlockConfig {
    /// Block delay for `question`: its word count times [`Self::per_word`],
    /// raised to `min` then capped at `max`. `max` wins when the bounds cross.
    pub fn delay_for(&self, question: &Question) -> Duration {
        let words = u32::try_from(question.word_count()).unwrap_or(u32::MAX);
        self.per_word.saturating_mul(words).max(self.min).min(self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Per-phase countdown lengths used when a snapshot omits them.
pub struct TimeoutDefaults {
    /// Choosing a clue.
    pub pick: Duration,
    /// Buzz window, counted once it opens.
    pub buzz: Duration,
    /// Regular answer.
    pub answer: Duration,
    /// Daily double wager.
    pub wager: Duration,
    /// Final round answer.
    pub final_answer: Duration,
    /// Final round wager.
    pub final_wager: Duration,
    /// Confirm or challenge vote.
    pub vote: Duration,
}

impl ClientConfig {
    /// Load the configuration from disk, falling back to the built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded client config");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "invalid client config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse and validate a JSON document. Missing keys keep their default.
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(contents)?;
        raw.validate()?;
        Ok(raw.into())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

/// Reasons a config document was refused.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not valid JSON for [`RawConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

#[derive(Debug, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[validate(range(min = 1))]
    score_delta_window_ms: u64,
    #[validate(range(min = 1))]
    advisory_window_ms: u64,
    #[validate(nested)]
    buzz_block: RawBuzzBlock,
    #[validate(nested)]
    timeouts: RawTimeouts,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            score_delta_window_ms: 3_000,
            advisory_window_ms: 5_000,
            buzz_block: RawBuzzBlock::default(),
            timeouts: RawTimeouts::default(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
#[validate(schema(function = "validate_block_range"))]
struct RawBuzzBlock {
    per_word_ms: u64,
    min_ms: u64,
    max_ms: u64,
}

impl Default for RawBuzzBlock {
    fn default() -> Self {
        Self {
            per_word_ms: 250,
            min_ms: 1_000,
            max_ms: 5_000,
        }
    }
}

fn validate_block_range(block: &RawBuzzBlock) -> Result<(), ValidationError> {
    if block.min_ms > block.max_ms {
        let mut err = ValidationError::new("buzz_block_range");
        err.message = Some(
            format!(
                "buzz block min ({} ms) exceeds max ({} ms)",
                block.min_ms, block.max_ms
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
/// Fallback timeouts in whole seconds.
struct RawTimeouts {
    #[validate(range(min = 1))]
    pick: u64,
    #[validate(range(min = 1))]
    buzz: u64,
    #[validate(range(min = 1))]
    answer: u64,
    #[validate(range(min = 1))]
    wager: u64,
    #[validate(range(min = 1))]
    final_answer: u64,
    #[validate(range(min = 1))]
    final_wager: u64,
    #[validate(range(min = 1))]
    vote: u64,
}

impl Default for RawTimeouts {
    fn default() -> Self {
        Self {
            pick: 10,
            buzz: 10,
            answer: 10,
            wager: 10,
            final_answer: 30,
            final_wager: 30,
            vote: 10,
        }
    }
}

impl From<RawConfig> for ClientConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            score_delta_window: Duration::from_millis(value.score_delta_window_ms),
            advisory_window: Duration::from_millis(value.advisory_window_ms),
            buzz_block: BuzzBlockConfig {
                per_word: Duration::from_millis(value.buzz_block.per_word_ms),
                min: Duration::from_millis(value.buzz_block.min_ms),
                max: Duration::from_millis(value.buzz_block.max_ms),
            },
            timeouts: TimeoutDefaults {
                pick: Duration::from_secs(value.timeouts.pick),
                buzz: Duration::from_secs(value.timeouts.buzz),
                answer: Duration::from_secs(value.timeouts.answer),
                wager: Duration::from_secs(value.timeouts.wager),
                final_answer: Duration::from_secs(value.timeouts.final_answer),
                final_wager: Duration::from_secs(value.timeouts.final_wager),
                vote: Duration::from_secs(value.timeouts.vote),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
