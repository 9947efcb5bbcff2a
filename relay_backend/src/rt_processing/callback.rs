//! Render callback host.
//!
//! Design goals:
//! - Run exactly one bridge cycle per quantum, synchronously, never retrying.
//! - Never allocate, log or wait on an OS lock inside the callback.
//! - Silence-fill before delegating, so a failed cycle still yields defined output.
//! - Report failures through atomics and the deferred event queue only.

use std::sync::Arc;

use relay_core::{BridgeConfig, RenderFailure, RenderResult, SessionHandle};

use crate::rt_processing::RenderThreadScope;
use crate::rt_processing::bridge::AudioBridge;
use crate::rt_processing::deinterleave::interleave;
use crate::rt_processing::events::{EventSink, RenderEvent};
use crate::rt_processing::performance::PerformanceMonitor;
use crate::rt_processing::session::ActiveSession;

pub struct RenderHost {
    bridge: AudioBridge,
    session: Arc<ActiveSession>,
    events: Arc<EventSink>,
    monitor: Arc<PerformanceMonitor>,

    quantum: usize,
    channels: usize,

    /// Planar staging for device callbacks: [channel][frame].
    scratch: Vec<Vec<f32>>,
    /// Frames of `scratch` already handed to the device. `quantum` means empty.
    cursor: usize,
    /// Session the scratch was rendered from.
    scratch_session: Option<SessionHandle>,
    cycle: u64,
}

impl RenderHost {
    pub fn new(
        bridge: AudioBridge,
        config: &BridgeConfig,
        session: Arc<ActiveSession>,
        events: Arc<EventSink>,
        monitor: Arc<PerformanceMonitor>,
    ) -> Self {
        let scratch = (0..config.channels).map(|_| vec![0.0; config.quantum]).collect();
        Self {
            bridge,
            session,
            events,
            monitor,
            quantum: config.quantum,
            channels: config.channels,
            scratch,
            cursor: config.quantum,
            scratch_session: None,
            cycle: 0,
        }
    }

    pub fn quantum(&self) -> usize {
        self.quantum
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    /// Shared selector for the session this host renders.
    pub fn active_session(&self) -> &Arc<ActiveSession> {
        &self.session
    }

    /// Run one cycle into host-shaped planar buffers.
    ///
    /// Destinations are zeroed first; on failure they stay silent.
    pub fn process_planar<D: AsMut<[f32]>>(&mut self, destinations: &mut [D]) -> RenderResult {
        let _render_thread = RenderThreadScope::enter();
        let monitor = Arc::clone(&self.monitor);
        let _timer = monitor.scoped_cycle();
        for dst in destinations.iter_mut() {
            dst.as_mut().fill(0.0);
        }
        let session = self.session.get();
        self.run_cycle(session, destinations)
    }

    /// Fill an interleaved device buffer of any length.
    ///
    /// Device buffers rarely line up with the quantum, so rendered frames are
    /// staged in `scratch` and a new cycle runs only once it is used up. A
    /// trailing partial frame is zeroed. Frames left over from a session that
    /// is no longer active, or has been torn down, are discarded.
    pub fn process_interleaved(&mut self, output: &mut [f32]) {
        let _render_thread = RenderThreadScope::enter();
        let staged_gone = self
            .scratch_session
            .is_some_and(|handle| !self.bridge.registry().is_live(handle));
        if staged_gone || self.session.get() != self.scratch_session {
            self.cursor = self.quantum;
        }
        let channels = self.channels;
        let frames = output.len() / channels;

        let mut written = 0;
        while written < frames {
            if self.cursor == self.quantum {
                self.refill_scratch();
            }
            let n = (self.quantum - self.cursor).min(frames - written);
            interleave(
                &self.scratch,
                self.cursor,
                n,
                &mut output[written * channels..(written + n) * channels],
            );
            self.cursor += n;
            written += n;
        }

        output[frames * channels..].fill(0.0);
    }

    fn refill_scratch(&mut self) {
        let monitor = Arc::clone(&self.monitor);
        let _timer = monitor.scoped_cycle();
        // Vec::new does not allocate; the buffers are only moved out and back.
        let mut scratch = std::mem::take(&mut self.scratch);
        for ch in scratch.iter_mut() {
            ch.fill(0.0);
        }
        let session = self.session.get();
        let _ = self.run_cycle(session, &mut scratch);
        self.scratch_session = session;
        self.scratch = scratch;
        self.cursor = 0;
    }

    #[inline]
    fn run_cycle<D: AsMut<[f32]>>(&mut self, session: Option<SessionHandle>, destinations: &mut [D]) -> RenderResult {
        self.cycle += 1;
        let result = match session {
            Some(handle) => self.bridge.render_block(handle, self.quantum, destinations),
            None => Err(RenderFailure::GeneratorUnavailable),
        };

        match result {
            Ok(()) => self.monitor.add_frames_delivered(self.quantum as u64),
            Err(failure) => {
                self.monitor.increment_failed();
                self.events.record(RenderEvent {
                    cycle: self.cycle,
                    session,
                    failure,
                });
            }
        }
        result
    }
}
