//! Bounds-checked view over a generator block.
//!
//! A view is built once per cycle from whatever the generator handed back and
//! is rejected outright unless it holds exactly one quantum of samples.

use relay_core::{RenderFailure, SampleEncoding};

use crate::rt_processing::generator::SampleBlock;

#[derive(Debug, Clone, Copy)]
enum Storage<'a> {
    Native(&'a [f32]),
    Encoded { bytes: &'a [u8], encoding: SampleEncoding },
}

/// Read-only, length-known view of one interleaved block.
#[derive(Debug, Clone, Copy)]
pub struct SampleView<'a> {
    storage: Storage<'a>,
    len: usize,
}

impl<'a> SampleView<'a> {
    /// Wrap `block`, requiring exactly `expected` samples.
    ///
    /// Byte blocks are measured in whole samples of `encoding`; a trailing
    /// partial sample counts as a size mismatch.
    pub fn new(block: SampleBlock<'a>, encoding: SampleEncoding, expected: usize) -> Result<Self, RenderFailure> {
        match block {
            SampleBlock::Samples(samples) => {
                if samples.len() != expected {
                    return Err(RenderFailure::SizeMismatch { expected, actual: samples.len() });
                }
                Ok(Self { storage: Storage::Native(samples), len: expected })
            }
            SampleBlock::Bytes(bytes) => {
                let width = encoding.bytes_per_sample();
                if bytes.len() != expected * width {
                    return Err(RenderFailure::SizeMismatch { expected, actual: bytes.len() / width });
                }
                Ok(Self { storage: Storage::Encoded { bytes, encoding }, len: expected })
            }
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sample at interleaved position `index`. Panics past the end.
    #[inline(always)]
    pub fn get(&self, index: usize) -> f32 {
        assert!(index < self.len, "sample index {} out of {}", index, self.len);
        match self.storage {
            Storage::Native(samples) => samples[index],
            Storage::Encoded { bytes, encoding } => encoding.decode(bytes, index),
        }
    }

    /// The underlying floats when no decoding is needed.
    #[inline(always)]
    pub fn as_native(&self) -> Option<&'a [f32]> {
        match self.storage {
            Storage::Native(samples) => Some(samples),
            Storage::Encoded { .. } => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }
}
