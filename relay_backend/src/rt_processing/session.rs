//! Fixed-capacity table of live generator sessions.
//!
//! Sessions are created and torn down from a control thread. The audio thread
//! only ever `try_lock`s a slot, so a slot that is being rewritten reads as an
//! unavailable generator for that cycle instead of stalling the callback.

use std::sync::atomic::{AtomicU64, Ordering};

use relay_core::{RenderFailure, SessionError, SessionHandle};
use spin::Mutex;

use crate::rt_processing::generator::BlockGenerator;

const OCCUPIED: u64 = 1;

/// Generation in the high half, occupied flag in bit 0.
#[inline(always)]
fn pack_state(generation: u32, occupied: bool) -> u64 {
    ((generation as u64) << 32) | occupied as u64
}

#[inline(always)]
fn state_generation(state: u64) -> u32 {
    (state >> 32) as u32
}

struct Slot {
    generator: Mutex<Option<Box<dyn BlockGenerator>>>,
    /// Lock-free liveness. Claimed by CAS in `create`; cleared and bumped to
    /// the next generation by `teardown` while `generator` is locked.
    state: AtomicU64,
}

impl Slot {
    #[inline(always)]
    fn holds(&self, handle: SessionHandle) -> bool {
        self.state.load(Ordering::Acquire) == pack_state(handle.generation(), true)
    }
}

pub struct SessionRegistry {
    slots: Box<[Slot]>,
}

impl SessionRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                generator: Mutex::new(None),
                state: AtomicU64::new(pack_state(0, false)),
            })
            .collect();
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Install a generator in the first free slot. Control thread only.
    ///
    /// Occupied slots are skipped without touching their lock, so a session
    /// that is rendering is never disturbed.
    pub fn create(&self, generator: Box<dyn BlockGenerator>) -> Result<SessionHandle, SessionError> {
        for (index, slot) in self.slots.iter().enumerate() {
            let state = slot.state.load(Ordering::Acquire);
            if state & OCCUPIED != 0 {
                continue;
            }
            if slot
                .state
                .compare_exchange(state, state | OCCUPIED, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }
            // No handle for this generation exists yet, so the audio thread
            // has no reason to hold this lock.
            *slot.generator.lock() = Some(generator);
            return Ok(SessionHandle::from_parts(index as u32, state_generation(state)));
        }
        Err(SessionError::RegistryFull { capacity: self.slots.len() })
    }

    /// Remove a session and hand its generator back to the caller.
    ///
    /// Waits for an in-flight render of the same slot to finish. The returned
    /// generator should be dropped on the control thread, not the audio thread.
    pub fn teardown(&self, handle: SessionHandle) -> Result<Box<dyn BlockGenerator>, SessionError> {
        let slot = self
            .slots
            .get(handle.index() as usize)
            .filter(|slot| slot.holds(handle))
            .ok_or(SessionError::Stale(handle))?;

        let mut guard = slot.generator.lock();
        if !slot.holds(handle) {
            return Err(SessionError::Stale(handle));
        }
        let generator = guard.take().ok_or(SessionError::Stale(handle))?;
        slot.state.store(
            pack_state(handle.generation().wrapping_add(1), false),
            Ordering::Release,
        );
        Ok(generator)
    }

    /// Lock-free; safe to call from any thread, including the audio thread.
    #[inline]
    pub fn is_live(&self, handle: SessionHandle) -> bool {
        self.slots
            .get(handle.index() as usize)
            .is_some_and(|slot| slot.holds(handle))
    }

    pub fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state.load(Ordering::Acquire) & OCCUPIED != 0)
            .count()
    }

    /// Run `f` against the generator behind `handle`. Audio thread.
    ///
    /// Never waits: a contended slot yields `GeneratorUnavailable`.
    #[inline]
    pub fn with_generator<R>(
        &self,
        handle: SessionHandle,
        f: impl FnOnce(&mut dyn BlockGenerator) -> R,
    ) -> Result<R, RenderFailure> {
        let slot = self
            .slots
            .get(handle.index() as usize)
            .filter(|slot| slot.holds(handle))
            .ok_or(RenderFailure::StaleSession)?;

        let Some(mut guard) = slot.generator.try_lock() else {
            return Err(RenderFailure::GeneratorUnavailable);
        };
        if !slot.holds(handle) {
            return Err(RenderFailure::StaleSession);
        }
        match guard.as_deref_mut() {
            Some(generator) => Ok(f(generator)),
            None => Err(RenderFailure::GeneratorUnavailable),
        }
    }
}

const NO_SESSION: u64 = u64::MAX;

/// The session a render host pulls from, switchable from another thread.
///
/// Stored as one packed atomic so the audio thread reads it with a single load.
pub struct ActiveSession {
    packed: AtomicU64,
}

impl ActiveSession {
    pub fn new(initial: Option<SessionHandle>) -> Self {
        Self { packed: AtomicU64::new(Self::pack(initial)) }
    }

    pub fn set(&self, handle: Option<SessionHandle>) {
        self.packed.store(Self::pack(handle), Ordering::Release);
    }

    #[inline(always)]
    pub fn get(&self) -> Option<SessionHandle> {
        match self.packed.load(Ordering::Acquire) {
            NO_SESSION => None,
            bits => Some(SessionHandle::from_parts((bits >> 32) as u32, bits as u32)),
        }
    }

    fn pack(handle: Option<SessionHandle>) -> u64 {
        match handle {
            Some(h) => ((h.index() as u64) << 32) | h.generation() as u64,
            None => NO_SESSION,
        }
    }
}

impl Default for ActiveSession {
    fn default() -> Self {
        Self::new(None)
    }
}
