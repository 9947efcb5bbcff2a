//! One-time check that this process can drive an audio output at all.
//!
//! The check runs once, at startup, and its outcome is cached for the life
//! of the process. Nothing on the render path consults it.

use std::sync::OnceLock;

use relay_core::BridgeConfig;
use tracing::{info, warn};

use crate::audio_device::enumeration::DeviceEnumerator;
use crate::audio_device::negotiation::{NegotiatedConfig, negotiate};
use crate::audio_device::DeviceResult;

#[derive(Debug, Clone)]
pub enum RenderCapability {
    Available { device_name: String, negotiated: NegotiatedConfig },
    Unavailable { reason: String },
}

impl RenderCapability {
    pub fn from_detection(result: DeviceResult<(String, NegotiatedConfig)>) -> Self {
        match result {
            Ok((device_name, negotiated)) => Self::Available { device_name, negotiated },
            Err(e) => Self::Unavailable { reason: e.to_string() },
        }
    }
}

static CAPABILITY: OnceLock<RenderCapability> = OnceLock::new();

/// Check the default output device, once per process.
///
/// Later calls return the first outcome regardless of `config`.
pub fn check(config: &BridgeConfig) -> &'static RenderCapability {
    CAPABILITY.get_or_init(|| {
        let capability = RenderCapability::from_detection(detect(config));
        match &capability {
            RenderCapability::Available { device_name, negotiated } => {
                info!("Audio output available on {}: {}", device_name, negotiated)
            }
            RenderCapability::Unavailable { reason } => warn!("Audio output unavailable: {}", reason),
        }
        capability
    })
}

fn detect(config: &BridgeConfig) -> DeviceResult<(String, NegotiatedConfig)> {
    let enumerator = DeviceEnumerator::scan()?;
    let device = enumerator.default_output()?;
    let negotiated = negotiate(device, config)?;
    Ok((device.name.clone(), negotiated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_device::DeviceError;

    #[test]
    fn test_failed_detection_is_unavailable() {
        let capability = RenderCapability::from_detection(Err(DeviceError::NoDevicesFound));
        match capability {
            RenderCapability::Unavailable { reason } => assert_eq!(reason, "no audio output device found"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
