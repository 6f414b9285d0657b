use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_ARITY_LIMIT: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid selector config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("max_arity must be between 1 and {MAX_ARITY_LIMIT}, got {value}")]
    ArityOutOfRange { value: usize },
    #[error("init_type must not be empty")]
    EmptyInitType,
}

/// Selector settings, read from a RON file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectorConfig {
    /// Upper bound on flat operands per instruction, keys included.
    pub max_arity: usize,
    /// Aggregate type used to initialise the destination temporary of a multi-key group.
    pub init_type: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_arity: 4,
            init_type: "Undef".to_string(),
        }
    }
}

impl SelectorConfig {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_ARITY_LIMIT).contains(&self.max_arity) {
            return Err(ConfigError::ArityOutOfRange {
                value: self.max_arity,
            });
        }
        if self.init_type.trim().is_empty() {
            return Err(ConfigError::EmptyInitType);
        }
        Ok(())
    }
}
