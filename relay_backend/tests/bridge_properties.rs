use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use relay_backend::rt_processing::bridge::AudioBridge;
use relay_backend::rt_processing::generator::{BlockGenerator, SampleBlock};
use relay_backend::rt_processing::session::SessionRegistry;
use relay_backend::{BridgeConfig, BridgeRuntime, RenderFailure, SessionHandle};

/// Interleaved stereo block whose every sample encodes (cycle, frame, channel).
/// Odd calls succeed, even calls fail in the configured way.
struct Alternating {
    calls: u64,
    block: Vec<f32>,
    short: Vec<f32>,
    fail_short: bool,
}

impl Alternating {
    fn new(quantum: usize, fail_short: bool) -> Self {
        Self {
            calls: 0,
            block: vec![0.0; quantum * 2],
            short: vec![1.0; quantum * 2 - 1],
            fail_short,
        }
    }
}

fn encode(cycle: u64, frame: usize, channel: usize) -> f32 {
    ((cycle % 1000) * 1000 + frame as u64 * 2 + channel as u64) as f32
}

impl BlockGenerator for Alternating {
    fn generate(&mut self, quantum: usize) -> Option<SampleBlock<'_>> {
        self.calls += 1;
        if self.calls % 2 == 0 {
            return self.fail_short.then_some(SampleBlock::Samples(&self.short));
        }
        for frame in 0..quantum {
            for ch in 0..2 {
                self.block[frame * 2 + ch] = encode(self.calls, frame, ch);
            }
        }
        Some(SampleBlock::Samples(&self.block))
    }
}

fn bridge(quantum: usize, generator: impl BlockGenerator) -> (AudioBridge, Arc<SessionRegistry>, SessionHandle) {
    let config = BridgeConfig::default().with_quantum(quantum);
    let registry = Arc::new(SessionRegistry::with_capacity(4));
    let handle = registry.create(Box::new(generator)).unwrap();
    (AudioBridge::new(Arc::clone(&registry), &config), registry, handle)
}

#[test]
fn stress_alternating_success_and_failure() {
    const QUANTUM: usize = 128;
    let (bridge, _registry, handle) = bridge(QUANTUM, Alternating::new(QUANTUM, true));
    let mut dest = vec![vec![0.0f32; QUANTUM]; 2];
    let capacities: Vec<usize> = dest.iter().map(Vec::capacity).collect();

    for cycle in 1..=10_000u64 {
        dest.iter_mut().for_each(|ch| ch.fill(0.0));
        let result = bridge.render_block(handle, QUANTUM, &mut dest);

        if cycle % 2 == 1 {
            assert_eq!(result, Ok(()), "cycle {}", cycle);
            assert_eq!(dest[0][5], encode(cycle, 5, 0));
            assert_eq!(dest[1][QUANTUM - 1], encode(cycle, QUANTUM - 1, 1));
        } else {
            assert_eq!(
                result,
                Err(RenderFailure::SizeMismatch { expected: QUANTUM * 2, actual: QUANTUM * 2 - 1 })
            );
            assert!(dest.iter().flatten().all(|&s| s == 0.0), "cycle {} wrote on failure", cycle);
        }
        assert_eq!(dest.len(), 2);
        assert!(dest.iter().all(|ch| ch.len() == QUANTUM));
        assert!(dest.iter().map(Vec::capacity).eq(capacities.iter().copied()));
    }
}

#[test]
fn every_sample_lands_in_its_channel() {
    const QUANTUM: usize = 64;
    let (bridge, _registry, handle) = bridge(QUANTUM, Alternating::new(QUANTUM, false));
    let mut dest = vec![vec![0.0f32; QUANTUM]; 2];

    bridge.render_block(handle, QUANTUM, &mut dest).unwrap();
    for frame in 0..QUANTUM {
        for ch in 0..2 {
            assert_eq!(dest[ch][frame], encode(1, frame, ch));
        }
    }
}

#[test]
fn consecutive_cycles_read_fresh_blocks() {
    const QUANTUM: usize = 16;
    let (bridge, _registry, handle) = bridge(QUANTUM, Alternating::new(QUANTUM, false));
    let mut first = vec![vec![0.0f32; QUANTUM]; 2];
    let mut second = vec![vec![0.0f32; QUANTUM]; 2];
    let mut third = vec![vec![0.0f32; QUANTUM]; 2];

    bridge.render_block(handle, QUANTUM, &mut first).unwrap();
    assert_eq!(bridge.render_block(handle, QUANTUM, &mut second), Err(RenderFailure::GeneratorUnavailable));
    bridge.render_block(handle, QUANTUM, &mut third).unwrap();

    // The generator rewrote its one buffer in place; the bridge must not have
    // served cycle 1's contents again.
    assert!(second.iter().flatten().all(|&s| s == 0.0));
    assert_eq!(first[0][0], encode(1, 0, 0));
    assert_eq!(third[0][0], encode(3, 0, 0));
    assert_ne!(first, third);
}

#[test]
fn torn_down_handle_always_fails() {
    const QUANTUM: usize = 32;
    let (bridge, registry, handle) = bridge(QUANTUM, Alternating::new(QUANTUM, false));
    let mut dest = vec![vec![0.0f32; QUANTUM]; 2];
    bridge.render_block(handle, QUANTUM, &mut dest).unwrap();

    drop(registry.teardown(handle).unwrap());
    let replacement = registry.create(Box::new(Alternating::new(QUANTUM, false))).unwrap();
    assert_eq!(replacement.index(), handle.index());

    for _ in 0..10 {
        let mut dest = vec![vec![0.5f32; QUANTUM]; 2];
        assert_eq!(bridge.render_block(handle, QUANTUM, &mut dest), Err(RenderFailure::StaleSession));
        assert!(dest.iter().flatten().all(|&s| s == 0.5));
    }
}

#[test]
fn teardown_races_with_render_thread() {
    const QUANTUM: usize = 128;
    let runtime = BridgeRuntime::new(BridgeConfig::default().with_quantum(QUANTUM)).unwrap();
    let handle = runtime.create_session(Box::new(Alternating::new(QUANTUM, false))).unwrap();
    runtime.activate(Some(handle)).unwrap();

    let torn_down = Arc::new(AtomicBool::new(false));
    let mut host = runtime.render_host();
    let flag = Arc::clone(&torn_down);

    let render = thread::spawn(move || {
        let mut dest = vec![vec![0.0f32; QUANTUM]; 2];
        let mut after_teardown = 0;
        while after_teardown < 100 {
            let was_torn_down = flag.load(Ordering::SeqCst);
            let result = host.process_planar(&mut dest);
            if was_torn_down {
                assert!(result.is_err());
                assert!(dest.iter().flatten().all(|&s| s == 0.0));
                after_teardown += 1;
            }
        }
    });

    thread::sleep(std::time::Duration::from_millis(5));
    runtime.teardown_session(handle).unwrap();
    torn_down.store(true, Ordering::SeqCst);
    render.join().unwrap();

    assert!(runtime.performance().failed_cycles >= 100);
}
