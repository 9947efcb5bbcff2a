use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use quanta::{Clock, Instant as QuantaInstant};
use relay_core::BridgeConfig;

/// Snapshot of render statistics for logging (non-RT).
#[derive(Debug, Clone)]
pub struct PerformanceSnapshot {
    /// Render cycles attempted.
    pub cycles: u64,
    /// Cycles that fell back to silence.
    pub failed_cycles: u64,
    /// Frames the generator actually delivered.
    pub frames_delivered: u64,
    pub min_cycle_nanos: Option<u64>,
    pub max_cycle_nanos: Option<u64>,
    /// EMA of cycle duration in nanoseconds.
    pub ema_cycle_nanos: f64,
    /// Wall-clock budget of one quantum.
    pub budget_nanos: f64,
    /// EMA cycle time as a share of the budget.
    pub load_percent: f64,
    pub timestamp: Instant,
}

impl PerformanceSnapshot {
    pub fn failure_ratio(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.failed_cycles as f64 / self.cycles as f64
        }
    }
}

/// Realtime-safe render statistics.
///
/// The render thread only touches atomics here. `snapshot` and `reset` are
/// for the control thread.
pub struct PerformanceMonitor {
    clock: Clock,
    /// f64 bits; rebased once the device rate is known.
    budget_bits: AtomicU64,

    cycles: AtomicU64,
    failed_cycles: AtomicU64,
    frames_delivered: AtomicU64,

    min_cycle_nanos: AtomicU64,
    max_cycle_nanos: AtomicU64,
    /// f64 bits
    ema_cycle_bits: AtomicU64,
    ema_alpha: f64,
}

impl PerformanceMonitor {
    /// `ema_alpha` in (0, 1]; around 0.05..0.2 tracks load without jitter.
    pub fn new(config: &BridgeConfig, ema_alpha: f64) -> Self {
        assert!(ema_alpha > 0.0 && ema_alpha <= 1.0);
        Self {
            clock: Clock::new(),
            budget_bits: AtomicU64::new(config.quantum_nanos().to_bits()),
            cycles: AtomicU64::new(0),
            failed_cycles: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            min_cycle_nanos: AtomicU64::new(u64::MAX),
            max_cycle_nanos: AtomicU64::new(0),
            ema_cycle_bits: AtomicU64::new(0),
            ema_alpha,
        }
    }

    /// Measure load against a different quantum period, e.g. after the
    /// device settled on another sample rate. Control thread.
    pub fn set_budget_nanos(&self, nanos: f64) {
        self.budget_bits.store(nanos.to_bits(), Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn add_frames_delivered(&self, frames: u64) {
        self.frames_delivered.fetch_add(frames, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn increment_failed(&self) {
        self.failed_cycles.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_cycle_nanos(&self, nanos: u64) {
        self.min_cycle_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_cycle_nanos.fetch_max(nanos, Ordering::Relaxed);

        let alpha = self.ema_alpha;
        let _ = self
            .ema_cycle_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let old = f64::from_bits(bits);
                Some((alpha * nanos as f64 + (1.0 - alpha) * old).to_bits())
            });
    }

    /// Counts a cycle now and records its duration when the guard drops.
    #[inline(always)]
    pub fn scoped_cycle(&self) -> CycleTimer<'_> {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        CycleTimer {
            monitor: self,
            start: self.clock.now(),
        }
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let min_raw = self.min_cycle_nanos.load(Ordering::Relaxed);
        let max_raw = self.max_cycle_nanos.load(Ordering::Relaxed);
        let ema = f64::from_bits(self.ema_cycle_bits.load(Ordering::Relaxed));
        let budget_nanos = f64::from_bits(self.budget_bits.load(Ordering::Relaxed));
        let load_percent = if budget_nanos > 0.0 {
            (ema / budget_nanos) * 100.0
        } else {
            0.0
        };

        PerformanceSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            failed_cycles: self.failed_cycles.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            min_cycle_nanos: (min_raw != u64::MAX).then_some(min_raw),
            max_cycle_nanos: (max_raw != 0).then_some(max_raw),
            ema_cycle_nanos: ema,
            budget_nanos,
            load_percent,
            timestamp: Instant::now(),
        }
    }
}

/// Records elapsed cycle time on drop. Atomics only.
pub struct CycleTimer<'a> {
    monitor: &'a PerformanceMonitor,
    start: QuantaInstant,
}

impl Drop for CycleTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.monitor.clock.now().saturating_duration_since(self.start);
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.monitor.record_cycle_nanos(nanos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peaks_and_ema() {
        let monitor = PerformanceMonitor::new(&BridgeConfig::default(), 0.5);
        monitor.record_cycle_nanos(1000);
        monitor.record_cycle_nanos(3000);

        let snap = monitor.snapshot();
        assert_eq!(snap.min_cycle_nanos, Some(1000));
        assert_eq!(snap.max_cycle_nanos, Some(3000));
        // 0.5 * 1000 = 500, then 0.5 * 3000 + 0.5 * 500 = 1750
        assert!((snap.ema_cycle_nanos - 1750.0).abs() < 1e-9);
        assert!(snap.load_percent > 0.0);
    }

    #[test]
    fn test_scoped_cycle_counts() {
        let monitor = PerformanceMonitor::new(&BridgeConfig::default(), 0.1);
        {
            let _timer = monitor.scoped_cycle();
        }
        monitor.increment_failed();

        let snap = monitor.snapshot();
        assert_eq!(snap.cycles, 1);
        assert_eq!(snap.failed_cycles, 1);
        assert_eq!(snap.failure_ratio(), 1.0);
        assert!(snap.min_cycle_nanos.is_some());
    }

    #[test]
    fn test_budget_rebase_changes_load() {
        let monitor = PerformanceMonitor::new(&BridgeConfig::default(), 1.0);
        monitor.record_cycle_nanos(1_000_000);
        let at_48k = monitor.snapshot();
        assert!((at_48k.budget_nanos - 128.0 / 48000.0 * 1e9).abs() < 1.0);

        monitor.set_budget_nanos(128.0 / 44100.0 * 1e9);
        let at_44k = monitor.snapshot();
        assert!(at_44k.load_percent < at_48k.load_percent);
        assert!((at_44k.load_percent - 1e6 / (128.0 / 44100.0 * 1e9) * 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_fresh_monitor_has_no_peaks() {
        let monitor = PerformanceMonitor::new(&BridgeConfig::default(), 0.1);
        monitor.add_frames_delivered(128);

        let snap = monitor.snapshot();
        assert_eq!(snap.frames_delivered, 128);
        assert_eq!(snap.min_cycle_nanos, None);
        assert_eq!(snap.max_cycle_nanos, None);
    }
}
