//! Bridge configuration, fixed for the lifetime of a render session.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::encoding::SampleEncoding;
use crate::error::ConfigError;

/// Upper bound on channel count.
pub const MAX_CHANNELS: usize = 32;

/// Frames per render cycle of a Web Audio worklet.
pub const DEFAULT_QUANTUM: usize = 128;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Frames per render cycle.
    pub quantum: usize,
    pub channels: usize,
    /// Layout of generator blocks delivered as raw bytes.
    pub encoding: SampleEncoding,
    pub sample_rate: u32,
    /// Capacity of the session slot table.
    pub max_sessions: usize,
    /// Capacity of the deferred render-event queue.
    pub event_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            quantum: DEFAULT_QUANTUM,
            channels: 2,
            encoding: SampleEncoding::F32Le,
            sample_rate: 48000,
            max_sessions: 8,
            event_capacity: 256,
        }
    }
}

impl BridgeConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_quantum(mut self, quantum: usize) -> Self {
        self.quantum = quantum;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_encoding(mut self, encoding: SampleEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quantum == 0 {
            return Err(ConfigError::Invalid("quantum must be at least one frame".into()));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(ConfigError::Invalid(format!(
                "channel count {} outside 1..={}",
                self.channels, MAX_CHANNELS
            )));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample rate must be non-zero".into()));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::Invalid("registry needs at least one session slot".into()));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event queue capacity must be non-zero".into()));
        }
        Ok(())
    }

    /// Samples in one interleaved block: `quantum * channels`.
    #[inline(always)]
    pub fn block_len(&self) -> usize {
        self.quantum * self.channels
    }

    /// Bytes in one encoded block.
    pub fn block_bytes(&self) -> usize {
        self.block_len() * self.encoding.bytes_per_sample()
    }

    /// Wall-clock length of one cycle in nanoseconds.
    pub fn quantum_nanos(&self) -> f64 {
        (self.quantum as f64 / self.sample_rate as f64) * 1_000_000_000.0
    }
}
