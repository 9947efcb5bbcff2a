//! Registration entry point tying sessions, the render host and the output
//! device together.

use std::sync::Arc;

use relay_core::{BridgeConfig, ConfigError, SessionError, SessionHandle};
use tracing::{debug, info};

use crate::audio_device::capability::{self, RenderCapability};
use crate::audio_device::enumeration::DeviceEnumerator;
use crate::audio_device::negotiation::NegotiatedConfig;
use crate::audio_device::output::OutputStream;
use crate::audio_device::{DeviceError, DeviceResult};
use crate::rt_processing::bridge::AudioBridge;
use crate::rt_processing::callback::RenderHost;
use crate::rt_processing::events::EventSink;
use crate::rt_processing::generator::BlockGenerator;
use crate::rt_processing::performance::{PerformanceMonitor, PerformanceSnapshot};
use crate::rt_processing::session::{ActiveSession, SessionRegistry};

const EMA_ALPHA: f64 = 0.1;

pub struct BridgeRuntime {
    config: BridgeConfig,
    registry: Arc<SessionRegistry>,
    active: Arc<ActiveSession>,
    events: Arc<EventSink>,
    monitor: Arc<PerformanceMonitor>,
    stream: Option<OutputStream>,
}

impl BridgeRuntime {
    pub fn new(config: BridgeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            registry: Arc::new(SessionRegistry::with_capacity(config.max_sessions)),
            active: Arc::new(ActiveSession::default()),
            events: Arc::new(EventSink::new(config.event_capacity)),
            monitor: Arc::new(PerformanceMonitor::new(&config, EMA_ALPHA)),
            stream: None,
            config,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventSink> {
        &self.events
    }

    pub fn create_session(&self, generator: Box<dyn BlockGenerator>) -> Result<SessionHandle, SessionError> {
        let handle = self.registry.create(generator)?;
        debug!("Created session {}", handle);
        Ok(handle)
    }

    /// Tear a session down and drop its generator on this thread.
    ///
    /// If it was the rendered session, the host falls back to silence.
    pub fn teardown_session(&self, handle: SessionHandle) -> Result<(), SessionError> {
        if self.active.get() == Some(handle) {
            self.active.set(None);
        }
        let generator = self.registry.teardown(handle)?;
        drop(generator);
        debug!("Tore down session {}", handle);
        Ok(())
    }

    /// Choose which session the render host pulls from. Takes effect next cycle.
    pub fn activate(&self, handle: Option<SessionHandle>) -> Result<(), SessionError> {
        if let Some(h) = handle {
            if !self.registry.is_live(h) {
                return Err(SessionError::Stale(h));
            }
        }
        self.active.set(handle);
        Ok(())
    }

    pub fn active_session(&self) -> Option<SessionHandle> {
        self.active.get()
    }

    /// A render host wired to this runtime's sessions and statistics.
    pub fn render_host(&self) -> RenderHost {
        RenderHost::new(
            AudioBridge::new(Arc::clone(&self.registry), &self.config),
            &self.config,
            Arc::clone(&self.active),
            Arc::clone(&self.events),
            Arc::clone(&self.monitor),
        )
    }

    /// Open the default output device and start rendering.
    ///
    /// Refused unless the process-wide capability check succeeded.
    pub fn start_output(&mut self) -> DeviceResult<()> {
        let (device_name, negotiated) = match capability::check(&self.config) {
            RenderCapability::Available { device_name, negotiated } => (device_name, negotiated),
            RenderCapability::Unavailable { reason } => return Err(DeviceError::Unavailable(reason.clone())),
        };

        let enumerator = DeviceEnumerator::scan()?;
        let info = enumerator.find_by_name(device_name)?;
        let device = enumerator.select_device(info)?;

        let stream = OutputStream::start(device, negotiated, self.render_host())?;
        self.adopt_negotiated(stream.config());
        self.stream = Some(stream);
        Ok(())
    }

    /// Rebase load statistics on the rate the device actually runs at.
    fn adopt_negotiated(&self, negotiated: &NegotiatedConfig) {
        if !negotiated.sample_rate_matched {
            info!(
                "Device runs at {} Hz instead of {} Hz; generator blocks are not resampled",
                negotiated.sample_rate, self.config.sample_rate
            );
        }
        self.monitor.set_budget_nanos(negotiated.quantum_nanos());
    }

    pub fn stop_output(&mut self) {
        if self.stream.take().is_some() {
            info!("Output stream stopped");
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Log render failures queued by the audio thread. Control thread only.
    pub fn pump_events(&self) -> usize {
        self.events.log_pending()
    }

    pub fn performance(&self) -> PerformanceSnapshot {
        self.monitor.snapshot()
    }
}
