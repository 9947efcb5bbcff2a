//! The boundary with the native computation engine.

use std::ffi::c_void;

/// One rendered block as handed over by a generator.
///
/// Both variants borrow the generator, so a block can never outlive the call
/// that produced it.
#[derive(Debug, Clone, Copy)]
pub enum SampleBlock<'a> {
    /// Interleaved native floats.
    Samples(&'a [f32]),
    /// Interleaved samples in the session's configured `SampleEncoding`.
    Bytes(&'a [u8]),
}

/// A block-based audio engine the bridge pulls from.
///
/// `generate` runs on the audio thread. It must finish in bounded time and
/// must not block, allocate or log. Returning `None` reports that no block is
/// available this cycle; the bridge substitutes silence.
pub trait BlockGenerator: Send + 'static {
    /// Render `quantum` interleaved frames.
    fn generate(&mut self, quantum: usize) -> Option<SampleBlock<'_>>;
}

/// C ABI render entry point of a native engine.
///
/// Returns a pointer to an interleaved float block and writes its length in
/// samples to `out_len`. A null return means the engine had nothing to give.
pub type ExternRenderFn =
    unsafe extern "C" fn(ctx: *mut c_void, frames: u32, out_len: *mut usize) -> *const f32;

/// Adapts a native engine exposed through [`ExternRenderFn`].
pub struct ExternGenerator {
    ctx: *mut c_void,
    render: ExternRenderFn,
}

// SAFETY: `ExternGenerator::new` requires the engine context to be usable from
// whichever single thread currently drives the session.
unsafe impl Send for ExternGenerator {}

impl ExternGenerator {
    /// # Safety
    ///
    /// - `render` must be safe to call with `ctx` from the audio thread.
    /// - A non-null pointer it returns must address `*out_len` initialized
    ///   floats that stay valid and unmodified until the next call.
    pub unsafe fn new(ctx: *mut c_void, render: ExternRenderFn) -> Self {
        Self { ctx, render }
    }
}

impl BlockGenerator for ExternGenerator {
    fn generate(&mut self, quantum: usize) -> Option<SampleBlock<'_>> {
        let frames = u32::try_from(quantum).ok()?;
        let mut len = 0usize;
        // SAFETY: upheld by the contract of `ExternGenerator::new`.
        let ptr = unsafe { (self.render)(self.ctx, frames, &mut len) };
        if ptr.is_null() || !ptr.is_aligned() {
            return None;
        }
        // SAFETY: non-null and aligned; length and lifetime per `new`. The
        // borrow of `self` ends the view before the next render call.
        let samples = unsafe { std::slice::from_raw_parts(ptr, len) };
        Some(SampleBlock::Samples(samples))
    }
}
