//! Player configuration
//!
//! Defaults mirror the fixed constants of the playback engine; a TOML file
//! can override them for non-standard chunk sizes or buffer depths.

use serde::Deserialize;
use std::path::Path;

use crate::constants::*;
use crate::error::{Error, Result};

/// Tunable playback parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,

    /// Samples requested from the source per read
    pub chunk_samples: usize,

    /// Capacity of the streaming ring buffer in samples
    pub ring_capacity: usize,

    /// Frames per device callback in the callback-driven modes
    pub frames_per_buffer: u32,

    /// Initial capacity of the preload sample store
    pub store_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            chunk_samples: DEFAULT_CHUNK_SAMPLES,
            ring_capacity: DEFAULT_RING_CAPACITY,
            frames_per_buffer: DEFAULT_FRAMES_PER_BUFFER,
            store_capacity: DEFAULT_STORE_CAPACITY,
        }
    }
}

impl PlayerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the parameters can actually drive a session
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be nonzero".into()));
        }
        if self.chunk_samples == 0 {
            return Err(Error::Config("chunk_samples must be nonzero".into()));
        }
        if self.frames_per_buffer == 0 {
            return Err(Error::Config("frames_per_buffer must be nonzero".into()));
        }
        // One slot is reserved to distinguish full from empty, so a ring of
        // capacity N holds at most N-1 samples.
        if self.ring_capacity <= self.chunk_samples {
            return Err(Error::Config(format!(
                "ring_capacity ({}) must exceed chunk_samples ({})",
                self.ring_capacity, self.chunk_samples
            )));
        }
        Ok(())
    }
}
