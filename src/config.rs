use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_MAX_SEGMENTS: usize = 900;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Master switch. When off, every load passes straight through.
    pub enabled: bool,
    /// Targets treated as if no descriptor matched them.
    pub disabled_targets: Vec<String>,
    pub max_segments_per_context: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            disabled_targets: Vec::new(),
            max_segments_per_context: DEFAULT_MAX_SEGMENTS,
        }
    }
}

impl AgentConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn is_target_enabled(&self, target_id: &str) -> bool {
        self.enabled && !self.disabled_targets.iter().any(|t| t == target_id)
    }
}
