//! Configuration types for the engine.

use std::fs;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::error::ColoringError;
use crate::layout::LayoutConfig;

/// attempts between two progress reports of a background run
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// minimum delay between two snapshot deliveries
pub const DEFAULT_PUBLISH_INTERVAL_MS: u64 = 50;

/// delay between two steps of a paced run
pub const DEFAULT_PACING_INTERVAL_MS: u64 = 100;

/// capacity of the channel between the executor and the host
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/** Top-level engine configuration.
Loaded from JSON at runtime, every field has a default. */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub session: SessionConfig,
    pub layout: LayoutConfig,
}

/** execution session configuration: batching, throttling and pacing */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// number of attempts between two progress messages
    pub batch_size: usize,
    /// minimum interval between two deliveries to the observers (milliseconds)
    pub publish_interval_ms: u64,
    /// tick of the paced driver (milliseconds)
    pub pacing_interval_ms: u64,
    /// bounded channel between the background executor and the host
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            publish_interval_ms: DEFAULT_PUBLISH_INTERVAL_MS,
            pacing_interval_ms: DEFAULT_PACING_INTERVAL_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn publish_interval(&self) -> Duration { Duration::from_millis(self.publish_interval_ms) }

    pub fn pacing_interval(&self) -> Duration { Duration::from_millis(self.pacing_interval_ms) }
}

impl EngineConfig {
    /** reads a configuration from a JSON file */
    pub fn from_file(filename:&str) -> Result<Self, ColoringError> {
        let content = fs::read_to_string(filename)?;
        Self::from_json(&content)
    }

    pub fn from_json(content:&str) -> Result<Self, ColoringError> {
        let res:Self = serde_json::from_str(content)?;
        if res.session.batch_size == 0 || res.session.channel_capacity == 0 {
            return Err(ColoringError::InvalidConfiguration(
                "batch_size and channel_capacity must be positive".to_string()
            ));
        }
        Ok(res)
    }
}
