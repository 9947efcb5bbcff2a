//! One render cycle: pull a block, validate it, split it into channels.

use std::sync::Arc;

use relay_core::{BridgeConfig, RenderFailure, RenderResult, SampleEncoding, SessionHandle};

use crate::rt_processing::deinterleave::deinterleave;
use crate::rt_processing::sample_buffer::SampleView;
use crate::rt_processing::session::SessionRegistry;

/// Stateless per cycle. Holds only the registry and the session layout.
#[derive(Clone)]
pub struct AudioBridge {
    registry: Arc<SessionRegistry>,
    channels: usize,
    encoding: SampleEncoding,
}

impl AudioBridge {
    pub fn new(registry: Arc<SessionRegistry>, config: &BridgeConfig) -> Self {
        Self {
            registry,
            channels: config.channels,
            encoding: config.encoding,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Render `quantum` frames of `session` into `destinations`.
    ///
    /// Destinations are written only after the generator block has passed
    /// validation, so any failure leaves them exactly as the caller left them.
    /// Mismatched destinations are a caller bug: they assert in debug builds
    /// and fail without touching memory in release builds.
    #[inline]
    pub fn render_block<D: AsMut<[f32]>>(
        &self,
        session: SessionHandle,
        quantum: usize,
        destinations: &mut [D],
    ) -> RenderResult {
        if !self.destinations_fit(quantum, destinations) {
            debug_assert!(
                false,
                "render_block needs {} destinations of {} frames",
                self.channels, quantum
            );
            return Err(RenderFailure::PreconditionViolation);
        }

        let expected = quantum * self.channels;
        let encoding = self.encoding;
        self.registry
            .with_generator(session, |generator| {
                let block = generator
                    .generate(quantum)
                    .ok_or(RenderFailure::GeneratorUnavailable)?;
                let view = SampleView::new(block, encoding, expected)?;
                deinterleave(&view, quantum, destinations);
                Ok(())
            })
            .and_then(|rendered| rendered)
    }

    fn destinations_fit<D: AsMut<[f32]>>(&self, quantum: usize, destinations: &mut [D]) -> bool {
        destinations.len() == self.channels
            && destinations.iter_mut().all(|d| d.as_mut().len() == quantum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt_processing::generator::{BlockGenerator, ExternGenerator, SampleBlock};
    use std::ffi::c_void;

    /// Hands back whatever was queued, then nothing.
    struct Scripted {
        block: Vec<f32>,
        available: bool,
    }

    impl BlockGenerator for Scripted {
        fn generate(&mut self, _quantum: usize) -> Option<SampleBlock<'_>> {
            self.available.then_some(SampleBlock::Samples(&self.block))
        }
    }

    struct Bytes(Vec<u8>);

    impl BlockGenerator for Bytes {
        fn generate(&mut self, _quantum: usize) -> Option<SampleBlock<'_>> {
            Some(SampleBlock::Bytes(&self.0))
        }
    }

    fn bridge_with(config: &BridgeConfig, generator: Box<dyn BlockGenerator>) -> (AudioBridge, SessionHandle) {
        let registry = Arc::new(SessionRegistry::with_capacity(4));
        let handle = registry.create(generator).unwrap();
        (AudioBridge::new(registry, config), handle)
    }

    #[test]
    fn test_render_splits_channels() {
        let config = BridgeConfig::default().with_quantum(3);
        let generator = Scripted { block: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], available: true };
        let (bridge, handle) = bridge_with(&config, Box::new(generator));

        let mut dest = vec![vec![0.0f32; 3]; 2];
        assert_eq!(bridge.render_block(handle, 3, &mut dest), Ok(()));
        assert_eq!(dest[0], [1.0, 3.0, 5.0]);
        assert_eq!(dest[1], [2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_short_block_leaves_destinations_untouched() {
        let config = BridgeConfig::default().with_quantum(3);
        let generator = Scripted { block: vec![9.0; 5], available: true };
        let (bridge, handle) = bridge_with(&config, Box::new(generator));

        let mut dest = vec![vec![0.0f32; 3]; 2];
        let result = bridge.render_block(handle, 3, &mut dest);
        assert_eq!(result, Err(RenderFailure::SizeMismatch { expected: 6, actual: 5 }));
        assert!(dest.iter().flatten().all(|&s| s == 0.0));
    }

    #[test]
    fn test_missing_block_is_unavailable() {
        let config = BridgeConfig::default().with_quantum(2);
        let generator = Scripted { block: vec![1.0; 4], available: false };
        let (bridge, handle) = bridge_with(&config, Box::new(generator));

        let mut dest = vec![vec![0.5f32; 2]; 2];
        assert_eq!(bridge.render_block(handle, 2, &mut dest), Err(RenderFailure::GeneratorUnavailable));
        assert!(dest.iter().flatten().all(|&s| s == 0.5));
    }

    #[test]
    fn test_encoded_session() {
        let config = BridgeConfig::default().with_quantum(2).with_encoding(SampleEncoding::I16Le);
        let bytes: Vec<u8> = [0i16, 16384, -16384, i16::MIN]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let (bridge, handle) = bridge_with(&config, Box::new(Bytes(bytes)));

        let mut dest = vec![vec![0.0f32; 2]; 2];
        bridge.render_block(handle, 2, &mut dest).unwrap();
        assert_eq!(dest[0], [0.0, -0.5]);
        assert_eq!(dest[1], [0.5, -1.0]);
    }

    #[test]
    fn test_torn_down_session_fails() {
        let config = BridgeConfig::default().with_quantum(1);
        let generator = Scripted { block: vec![1.0, 1.0], available: true };
        let (bridge, handle) = bridge_with(&config, Box::new(generator));

        let mut dest = vec![vec![0.0f32; 1]; 2];
        bridge.render_block(handle, 1, &mut dest).unwrap();
        drop(bridge.registry().teardown(handle).unwrap());

        dest.iter_mut().for_each(|d| d.fill(0.0));
        assert_eq!(bridge.render_block(handle, 1, &mut dest), Err(RenderFailure::StaleSession));
        assert!(dest.iter().flatten().all(|&s| s == 0.0));
    }

    /// Native engine that always hands back `len` samples.
    struct ShortEngine {
        buffer: Vec<f32>,
        len: usize,
    }

    unsafe extern "C" fn short_render(ctx: *mut c_void, _frames: u32, out_len: *mut usize) -> *const f32 {
        let engine = unsafe { &*(ctx as *const ShortEngine) };
        unsafe { *out_len = engine.len };
        engine.buffer.as_ptr()
    }

    #[test]
    fn test_extern_block_of_wrong_length() {
        let config = BridgeConfig::default().with_quantum(3);
        let mut engine = ShortEngine { buffer: vec![0.75; 8], len: 5 };
        let generator = unsafe {
            ExternGenerator::new(&mut engine as *mut ShortEngine as *mut c_void, short_render)
        };
        let (bridge, handle) = bridge_with(&config, Box::new(generator));

        let mut dest = vec![vec![0.0f32; 3]; 2];
        assert_eq!(
            bridge.render_block(handle, 3, &mut dest),
            Err(RenderFailure::SizeMismatch { expected: 6, actual: 5 })
        );
        assert!(dest.iter().flatten().all(|&s| s == 0.0));

        // The engine must outlive its generator.
        drop(bridge.registry().teardown(handle).unwrap());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "render_block needs"))]
    fn test_wrong_destination_count() {
        let config = BridgeConfig::default().with_quantum(2);
        let generator = Scripted { block: vec![1.0; 4], available: true };
        let (bridge, handle) = bridge_with(&config, Box::new(generator));

        let mut dest = vec![vec![0.0f32; 2]; 1];
        assert_eq!(bridge.render_block(handle, 2, &mut dest), Err(RenderFailure::PreconditionViolation));
        assert!(dest[0].iter().all(|&s| s == 0.0));
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "render_block needs"))]
    fn test_wrong_destination_length() {
        let config = BridgeConfig::default().with_quantum(2);
        let generator = Scripted { block: vec![1.0; 4], available: true };
        let (bridge, handle) = bridge_with(&config, Box::new(generator));

        let mut dest = vec![vec![0.0f32; 2], vec![0.0f32; 1]];
        assert_eq!(bridge.render_block(handle, 2, &mut dest), Err(RenderFailure::PreconditionViolation));
    }
}
