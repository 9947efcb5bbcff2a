//! Demo generator: a sine tone on every channel.

use relay_backend::rt_processing::generator::{BlockGenerator, SampleBlock};
use relay_core::{BridgeConfig, SampleEncoding};

const AMPLITUDE: f32 = 0.2;

pub struct ToneGenerator {
    /// Normalized phase in [0, 1).
    phase: f64,
    increment: f64,
    channels: usize,
    samples: Vec<f32>,
    /// Set when the tone is delivered pre-encoded, as a foreign engine would.
    encoded: Option<(SampleEncoding, Vec<u8>)>,
}

impl ToneGenerator {
    /// Native float blocks, sized once from `config`.
    pub fn new(frequency: f32, config: &BridgeConfig) -> Self {
        Self {
            phase: 0.0,
            increment: frequency as f64 / config.sample_rate as f64,
            channels: config.channels,
            samples: vec![0.0; config.block_len()],
            encoded: None,
        }
    }

    /// Blocks serialized in the configured encoding.
    pub fn encoded(frequency: f32, config: &BridgeConfig) -> Self {
        let mut tone = Self::new(frequency, config);
        tone.encoded = Some((config.encoding, vec![0; config.block_bytes()]));
        tone
    }

    fn render(&mut self, quantum: usize) -> bool {
        let len = quantum * self.channels;
        if len > self.samples.len() {
            return false;
        }
        for frame in self.samples[..len].chunks_exact_mut(self.channels) {
            let value = (self.phase * std::f64::consts::TAU).sin() as f32 * AMPLITUDE;
            frame.fill(value);
            self.phase = (self.phase + self.increment).fract();
        }
        true
    }
}

impl BlockGenerator for ToneGenerator {
    fn generate(&mut self, quantum: usize) -> Option<SampleBlock<'_>> {
        if !self.render(quantum) {
            return None;
        }
        let len = quantum * self.channels;
        match &mut self.encoded {
            None => Some(SampleBlock::Samples(&self.samples[..len])),
            Some((encoding, bytes)) => {
                let width = encoding.bytes_per_sample();
                for (sample, out) in self.samples[..len].iter().zip(bytes.chunks_exact_mut(width)) {
                    encoding.encode(*sample, out);
                }
                Some(SampleBlock::Bytes(&bytes[..len * width]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(block: Option<SampleBlock<'_>>) -> Vec<f32> {
        match block {
            Some(SampleBlock::Samples(s)) => s.to_vec(),
            other => panic!("expected native samples, got {:?}", other),
        }
    }

    #[test]
    fn test_channels_carry_the_same_sample() {
        let config = BridgeConfig::default().with_quantum(32).with_channels(3);
        let mut tone = ToneGenerator::new(440.0, &config);
        let block = samples(tone.generate(32));

        assert_eq!(block.len(), 96);
        for frame in block.chunks_exact(3) {
            assert_eq!(frame[0], frame[1]);
            assert_eq!(frame[1], frame[2]);
            assert!(frame[0].abs() <= AMPLITUDE);
        }
    }

    #[test]
    fn test_phase_continues_across_blocks() {
        let config = BridgeConfig::default().with_quantum(4).with_channels(1).with_sample_rate(16);
        // One period every 16 samples, so two blocks are half a cycle.
        let mut tone = ToneGenerator::new(1.0, &config);
        let first = samples(tone.generate(4));
        let second = samples(tone.generate(4));

        assert_eq!(first[0], 0.0);
        assert!((first[3] - second[0]).abs() > 0.0);
        assert!((second[0] - AMPLITUDE).abs() < 1e-6);
        assert!(tone.phase >= 0.0 && tone.phase < 1.0);
    }

    #[test]
    fn test_oversized_quantum_yields_nothing() {
        let config = BridgeConfig::default().with_quantum(8);
        let mut tone = ToneGenerator::new(440.0, &config);
        assert!(tone.generate(16).is_none());
        assert!(tone.generate(8).is_some());
    }

    #[test]
    fn test_encoded_blocks_decode_to_the_tone() {
        let config = BridgeConfig::default()
            .with_quantum(16)
            .with_encoding(SampleEncoding::F32Be);
        let mut native = ToneGenerator::new(440.0, &config);
        let mut encoded = ToneGenerator::encoded(440.0, &config);

        let expected = samples(native.generate(16));
        let Some(SampleBlock::Bytes(bytes)) = encoded.generate(16) else {
            panic!("expected bytes");
        };
        assert_eq!(bytes.len(), config.block_bytes());
        for (i, want) in expected.iter().enumerate() {
            assert_eq!(SampleEncoding::F32Be.decode(bytes, i), *want);
        }
    }
}
