use cpal::traits::{DeviceTrait, HostTrait};
use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::audio_device::{DeviceError, DeviceResult};

/// Sample rates tried inside each supported range.
const COMMON_RATES: [u32; 11] = [8000, 11025, 16000, 22050, 32000, 44100, 48000, 88200, 96000, 176400, 192000];

#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub name: String,
    pub host_name: String,
    pub is_default: bool,

    pub supported_sample_rates: Vec<u32>,
    pub min_sample_rate: u32,
    pub max_sample_rate: u32,
    pub default_sample_rate: u32,

    pub supported_channels: Vec<u16>,
    pub max_channels: u16,
    pub default_channels: u16,

    pub supported_sample_formats: Vec<cpal::SampleFormat>,
    pub default_sample_format: cpal::SampleFormat,

    /// Inclusive frames-per-callback range, when the host reports one.
    pub buffer_size_range: Option<(u32, u32)>,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}ch @ {}Hz, {}]{}",
            self.name,
            self.default_channels,
            self.default_sample_rate,
            self.host_name,
            if self.is_default { " (default)" } else { "" }
        )
    }
}

/// Output devices of the default cpal host, scanned once.
pub struct DeviceEnumerator {
    host: cpal::Host,
    devices: Vec<(cpal::Device, DeviceInfo)>,
}

impl DeviceEnumerator {
    pub fn scan() -> DeviceResult<Self> {
        let host = cpal::default_host();
        let host_name = host.id().name().to_string();
        let default_name = host.default_output_device().and_then(|d| d.name().ok());

        let outputs = host
            .output_devices()
            .map_err(|e| DeviceError::QueryFailed(format!("Failed to list output devices: {}", e)))?;

        let mut devices = Vec::new();
        for device in outputs {
            match Self::query_device_info(&device, &host_name, default_name.as_deref()) {
                Ok(info) => devices.push((device, info)),
                Err(e) => debug!("Skipping output device: {}", e),
            }
        }

        if devices.is_empty() {
            return Err(DeviceError::NoDevicesFound);
        }
        Ok(Self { host, devices })
    }

    fn query_device_info(device: &cpal::Device, host_name: &str, default_name: Option<&str>) -> DeviceResult<DeviceInfo> {
        let name = device
            .name()
            .map_err(|e| DeviceError::QueryFailed(format!("Failed to get device name: {}", e)))?;
        let default_config = device
            .default_output_config()
            .map_err(|e| DeviceError::QueryFailed(format!("{}: no default config: {}", name, e)))?;
        let ranges = device
            .supported_output_configs()
            .map_err(|e| DeviceError::QueryFailed(format!("{}: no supported configs: {}", name, e)))?;

        let mut rates = BTreeSet::new();
        let mut channels = BTreeSet::new();
        let mut formats = Vec::new();
        let mut min_sample_rate = u32::MAX;
        let mut max_sample_rate = 0u32;
        let mut buffer_size_range: Option<(u32, u32)> = None;

        for range in ranges {
            let lo = range.min_sample_rate().0;
            let hi = range.max_sample_rate().0;
            min_sample_rate = min_sample_rate.min(lo);
            max_sample_rate = max_sample_rate.max(hi);
            rates.extend(COMMON_RATES.iter().copied().filter(|r| (lo..=hi).contains(r)));
            channels.insert(range.channels());
            if let cpal::SupportedBufferSize::Range { min, max } = *range.buffer_size() {
                buffer_size_range = Some(match buffer_size_range {
                    Some((lo, hi)) => (lo.min(min), hi.max(max)),
                    None => (min, max),
                });
            }
            if !formats.contains(&range.sample_format()) {
                formats.push(range.sample_format());
            }
        }

        let default_sample_rate = default_config.sample_rate().0;
        Ok(DeviceInfo {
            is_default: default_name == Some(name.as_str()),
            name,
            host_name: host_name.to_string(),
            supported_sample_rates: rates.into_iter().collect(),
            min_sample_rate: min_sample_rate.min(default_sample_rate),
            max_sample_rate: max_sample_rate.max(default_sample_rate),
            default_sample_rate,
            max_channels: channels.iter().copied().max().unwrap_or(default_config.channels()),
            supported_channels: channels.into_iter().collect(),
            default_channels: default_config.channels(),
            supported_sample_formats: formats,
            default_sample_format: default_config.sample_format(),
            buffer_size_range,
        })
    }

    pub fn host_name(&self) -> &'static str {
        self.host.id().name()
    }

    pub fn output_devices(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices.iter().map(|(_, info)| info)
    }

    /// The host's default output, or the first device when none is flagged.
    pub fn default_output(&self) -> DeviceResult<&DeviceInfo> {
        self.output_devices()
            .find(|info| info.is_default)
            .or_else(|| self.output_devices().next())
            .ok_or(DeviceError::NoDevicesFound)
    }

    /// Case-insensitive; exact name first, then substring.
    pub fn find_by_name(&self, name: &str) -> DeviceResult<&DeviceInfo> {
        let wanted = name.to_lowercase();
        self.output_devices()
            .find(|info| info.name.to_lowercase() == wanted)
            .or_else(|| self.output_devices().find(|info| info.name.to_lowercase().contains(&wanted)))
            .ok_or_else(|| DeviceError::DeviceNotFound(name.to_string()))
    }

    /// The cpal handle behind a scanned device.
    pub fn select_device(&self, info: &DeviceInfo) -> DeviceResult<&cpal::Device> {
        self.devices
            .iter()
            .find(|(_, candidate)| candidate.name == info.name)
            .map(|(device, _)| device)
            .ok_or_else(|| DeviceError::DeviceNotFound(info.name.clone()))
    }
}
