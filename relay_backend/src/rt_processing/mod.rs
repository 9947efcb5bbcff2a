pub mod bridge;
pub mod callback;
pub mod deinterleave;
pub mod events;
pub mod generator;
pub mod performance;
pub mod sample_buffer;
pub mod session;

use std::cell::Cell;

thread_local! {
    static RENDER_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is inside a render callback.
pub fn on_render_thread() -> bool {
    RENDER_THREAD.with(Cell::get)
}

/// Marks the current thread as the render thread until dropped.
pub(crate) struct RenderThreadScope {
    previous: bool,
}

impl RenderThreadScope {
    #[inline(always)]
    pub(crate) fn enter() -> Self {
        let previous = RENDER_THREAD.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for RenderThreadScope {
    #[inline(always)]
    fn drop(&mut self) {
        RENDER_THREAD.with(|flag| flag.set(self.previous));
    }
}
