//! Interleaved <-> planar conversion. Allocation-free.

use crate::rt_processing::sample_buffer::SampleView;

/// Split an interleaved block into per-channel buffers.
///
/// `destinations[c][s] = source[s * N + c]` for every frame `s < quantum`,
/// where `N == destinations.len()`.
///
/// Callers validate sizes first; a short source or destination is a
/// programming error and panics.
#[inline]
pub fn deinterleave<D: AsMut<[f32]>>(source: &SampleView<'_>, quantum: usize, destinations: &mut [D]) {
    let channels = destinations.len();
    assert!(source.len() >= quantum * channels, "source holds {} samples, need {}", source.len(), quantum * channels);

    if let Some(samples) = source.as_native() {
        for (ch, dst) in destinations.iter_mut().enumerate() {
            let dst = &mut dst.as_mut()[..quantum];
            for (frame, out) in dst.iter_mut().enumerate() {
                *out = samples[frame * channels + ch];
            }
        }
    } else {
        for (ch, dst) in destinations.iter_mut().enumerate() {
            let dst = &mut dst.as_mut()[..quantum];
            for (frame, out) in dst.iter_mut().enumerate() {
                *out = source.get(frame * channels + ch);
            }
        }
    }
}

/// Write `frames` frames of planar `channels`, starting at frame `offset`,
/// into the interleaved `output`.
#[inline]
pub fn interleave<S: AsRef<[f32]>>(channels: &[S], offset: usize, frames: usize, output: &mut [f32]) {
    let count = channels.len();
    assert!(output.len() >= frames * count, "output holds {} samples, need {}", output.len(), frames * count);

    for (ch, src) in channels.iter().enumerate() {
        let src = &src.as_ref()[offset..offset + frames];
        for (frame, &sample) in src.iter().enumerate() {
            output[frame * count + ch] = sample;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt_processing::generator::SampleBlock;
    use relay_core::SampleEncoding;

    fn view(samples: &[f32]) -> SampleView<'_> {
        SampleView::new(SampleBlock::Samples(samples), SampleEncoding::F32Le, samples.len()).unwrap()
    }

    #[test]
    fn test_stereo_split() {
        let source = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut left = [0.0; 3];
        let mut right = [0.0; 3];
        {
            let mut dest: [&mut [f32]; 2] = [&mut left, &mut right];
            deinterleave(&view(&source), 3, &mut dest);
        }
        assert_eq!(left, [1.0, 3.0, 5.0]);
        assert_eq!(right, [2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_round_trip_various_layouts() {
        for &(quantum, channels) in &[(1usize, 1usize), (128, 2), (7, 3), (64, 6)] {
            let source: Vec<f32> = (0..quantum * channels).map(|i| i as f32 * 0.5 - 3.0).collect();
            let mut planar = vec![vec![0.0f32; quantum]; channels];
            deinterleave(&view(&source), quantum, &mut planar);

            let mut rebuilt = vec![0.0f32; quantum * channels];
            interleave(&planar, 0, quantum, &mut rebuilt);
            assert_eq!(rebuilt, source, "quantum {} channels {}", quantum, channels);
        }
    }

    #[test]
    fn test_encoded_source_matches_native() {
        let source: Vec<f32> = (0..16).map(|i| i as f32 / 16.0).collect();
        let bytes: Vec<u8> = source.iter().flat_map(|s| s.to_le_bytes()).collect();
        let encoded = SampleView::new(SampleBlock::Bytes(&bytes), SampleEncoding::F32Le, 16).unwrap();

        let mut from_native = vec![vec![0.0f32; 8]; 2];
        let mut from_bytes = vec![vec![0.0f32; 8]; 2];
        deinterleave(&view(&source), 8, &mut from_native);
        deinterleave(&encoded, 8, &mut from_bytes);
        assert_eq!(from_native, from_bytes);
    }

    #[test]
    fn test_interleave_with_offset() {
        let planar = vec![vec![0.0, 1.0, 2.0, 3.0], vec![10.0, 11.0, 12.0, 13.0]];
        let mut out = [0.0; 4];
        interleave(&planar, 2, 2, &mut out);
        assert_eq!(out, [2.0, 12.0, 3.0, 13.0]);
    }

    #[test]
    #[should_panic(expected = "need")]
    fn test_short_source_panics() {
        let source = [0.0; 4];
        let mut planar = vec![vec![0.0f32; 3]; 2];
        deinterleave(&view(&source), 3, &mut planar);
    }
}
