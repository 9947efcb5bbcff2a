//! Memory layout of generator blocks that arrive as raw bytes.

use std::fmt;

use dasp::Sample;
use serde::{Deserialize, Serialize};

/// How one sample is laid out in a byte block handed over by a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleEncoding {
    /// 32-bit IEEE float, little-endian. What a WebAssembly heap holds.
    #[default]
    F32Le,
    F32Be,
    /// Signed 16-bit PCM, little-endian.
    I16Le,
}

impl SampleEncoding {
    #[inline(always)]
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::F32Le | Self::F32Be => 4,
            Self::I16Le => 2,
        }
    }

    /// Decode the sample at `index` (in samples, not bytes).
    ///
    /// Caller guarantees `bytes` holds at least `(index + 1) * bytes_per_sample()` bytes.
    #[inline(always)]
    pub fn decode(self, bytes: &[u8], index: usize) -> f32 {
        let at = index * self.bytes_per_sample();
        match self {
            Self::F32Le => f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]),
            Self::F32Be => f32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]),
            Self::I16Le => i16::from_le_bytes([bytes[at], bytes[at + 1]]).to_sample::<f32>(),
        }
    }

    /// Encode `value` into `out`, which must be exactly `bytes_per_sample()` long.
    ///
    /// Used by generators that render into byte buffers and by tests.
    pub fn encode(self, value: f32, out: &mut [u8]) {
        match self {
            Self::F32Le => out.copy_from_slice(&value.to_le_bytes()),
            Self::F32Be => out.copy_from_slice(&value.to_be_bytes()),
            Self::I16Le => out.copy_from_slice(&value.to_sample::<i16>().to_le_bytes()),
        }
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::F32Le => "f32 little-endian",
            Self::F32Be => "f32 big-endian",
            Self::I16Le => "i16 little-endian",
        };
        f.write_str(name)
    }
}
