//! Run configuration.
//!
//! # Responsibility
//! - Hold deck/note-type names, batch size and scheduling knobs.
//! - Overlay `MARKDECK_*` environment variables on built-in defaults.
//!
//! # Invariants
//! - A validated config has `batch_size > 0` and a reorder probability in `[0, 1]`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_DECK: &str = "Articles";
pub const DEFAULT_NOTE_MODEL: &str = "Pocket Article";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_REORDER_PROBABILITY: f64 = 0.3;

const ENV_DECK: &str = "MARKDECK_DECK";
const ENV_NOTE_MODEL: &str = "MARKDECK_NOTE_MODEL";
const ENV_BATCH_SIZE: &str = "MARKDECK_BATCH_SIZE";

/// Whether an archived item is put back in the unread list when none of its
/// cards has been reviewed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReaddPolicy {
    #[default]
    Disabled,
    WhenUnreviewed,
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidBatchSize(String),
    InvalidProbability(f64),
    EmptyName(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBatchSize(value) => {
                write!(f, "batch size must be a positive integer, got `{value}`")
            }
            Self::InvalidProbability(value) => {
                write!(f, "reorder probability must be within [0, 1], got {value}")
            }
            Self::EmptyName(name) => write!(f, "{name} cannot be empty"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Deck new notes are created in.
    pub deck: String,
    /// Note type of linked notes.
    pub note_model: String,
    /// Max mutations per store round trip.
    pub batch_size: usize,
    /// Chance of swapping each new-card position during reordering.
    pub reorder_probability: f64,
    /// Only touch notes modified within this many days.
    pub edited_within_days: Option<u32>,
    pub readd_policy: ReaddPolicy,
    /// Fixed seed for reproducible new-card ordering.
    pub seed: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            deck: DEFAULT_DECK.to_string(),
            note_model: DEFAULT_NOTE_MODEL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            reorder_probability: DEFAULT_REORDER_PROBABILITY,
            edited_within_days: None,
            readd_policy: ReaddPolicy::Disabled,
            seed: None,
        }
    }
}

impl SyncConfig {
    /// Defaults overlaid with process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(deck) = lookup(ENV_DECK) {
            config.deck = deck.trim().to_string();
        }
        if let Some(model) = lookup(ENV_NOTE_MODEL) {
            config.note_model = model.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_BATCH_SIZE) {
            config.batch_size = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidBatchSize(raw.clone()))?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize("0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.reorder_probability) {
            return Err(ConfigError::InvalidProbability(self.reorder_probability));
        }
        if self.deck.trim().is_empty() {
            return Err(ConfigError::EmptyName("deck"));
        }
        if self.note_model.trim().is_empty() {
            return Err(ConfigError::EmptyName("note model"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ReaddPolicy, SyncConfig};

    #[test]
    fn defaults_match_article_deck() {
        let config = SyncConfig::default();
        assert_eq!(config.deck, "Articles");
        assert_eq!(config.note_model, "Pocket Article");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.readd_policy, ReaddPolicy::Disabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = SyncConfig::from_lookup(|key| match key {
            "MARKDECK_DECK" => Some(" Reading ".to_string()),
            "MARKDECK_BATCH_SIZE" => Some("25".to_string()),
            _ => None,
        })
        .expect("config should load");
        assert_eq!(config.deck, "Reading");
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.note_model, "Pocket Article");
    }

    #[test]
    fn rejects_zero_or_garbled_batch_size() {
        let zero = SyncConfig::from_lookup(|key| {
            (key == "MARKDECK_BATCH_SIZE").then(|| "0".to_string())
        });
        assert!(matches!(zero, Err(ConfigError::InvalidBatchSize(_))));

        let garbled = SyncConfig::from_lookup(|key| {
            (key == "MARKDECK_BATCH_SIZE").then(|| "many".to_string())
        });
        assert!(matches!(garbled, Err(ConfigError::InvalidBatchSize(_))));
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let config = SyncConfig {
            reorder_probability: 1.5,
            ..SyncConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidProbability(1.5))
        );
    }
}
