//! Fit the bridge's fixed session layout onto what a device offers.
//!
//! Channel count and quantum are not negotiable: the bridge was configured
//! with them and every generator block is shaped by them. Sample rate and
//! sample format are chosen from what the device supports. The device buffer
//! is pinned to the quantum only when the device accepts that size; the
//! render host re-blocks any other size.

use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use relay_core::BridgeConfig;
use std::fmt;

use crate::audio_device::enumeration::DeviceInfo;
use crate::audio_device::{DeviceError, DeviceResult};

/// Formats the output stream can convert into, best first.
const FORMAT_PREFERENCE: [SampleFormat; 3] = [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16];

#[derive(Debug, Clone)]
pub struct NegotiatedConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub quantum: u32,
    pub sample_format: SampleFormat,
    pub stream_config: StreamConfig,
    pub sample_rate_matched: bool,
}

impl NegotiatedConfig {
    pub fn latency_ms(&self) -> f32 {
        calculate_latency_ms(self.sample_rate, self.quantum)
    }

    /// Wall-clock length of one quantum at the negotiated rate.
    pub fn quantum_nanos(&self) -> f64 {
        (self.quantum as f64 / self.sample_rate as f64) * 1_000_000_000.0
    }

    pub fn fixed_buffer(&self) -> bool {
        matches!(self.stream_config.buffer_size, BufferSize::Fixed(_))
    }
}

impl fmt::Display for NegotiatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ch @ {}Hz, quantum {} ({:.2} ms), format {:?}, {} device buffer",
            self.channels,
            self.sample_rate,
            self.quantum,
            self.latency_ms(),
            self.sample_format,
            if self.fixed_buffer() { "fixed" } else { "default" }
        )
    }
}

pub fn negotiate(device: &DeviceInfo, config: &BridgeConfig) -> DeviceResult<NegotiatedConfig> {
    let channels = negotiate_channels(device, config.channels)?;
    let sample_rate = negotiate_sample_rate(device, config.sample_rate);
    let sample_format = negotiate_sample_format(device)?;
    let quantum = u32::try_from(config.quantum)
        .map_err(|_| DeviceError::Unavailable(format!("quantum {} too large", config.quantum)))?;

    Ok(NegotiatedConfig {
        sample_rate,
        channels,
        quantum,
        sample_format,
        stream_config: StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: negotiate_buffer_size(device, quantum),
        },
        sample_rate_matched: sample_rate == config.sample_rate,
    })
}

fn negotiate_channels(device: &DeviceInfo, requested: usize) -> DeviceResult<u16> {
    let unsupported = || DeviceError::ChannelsNotSupported {
        channels: requested,
        max: device.max_channels,
    };
    let channels = u16::try_from(requested).map_err(|_| unsupported())?;
    if device.supported_channels.contains(&channels) {
        Ok(channels)
    } else {
        Err(unsupported())
    }
}

fn negotiate_buffer_size(device: &DeviceInfo, quantum: u32) -> BufferSize {
    match device.buffer_size_range {
        Some((min, max)) if (min..=max).contains(&quantum) => BufferSize::Fixed(quantum),
        _ => BufferSize::Default,
    }
}

fn negotiate_sample_rate(device: &DeviceInfo, requested: u32) -> u32 {
    if (device.min_sample_rate..=device.max_sample_rate).contains(&requested) {
        requested
    } else {
        find_closest_sample_rate(device, requested)
    }
}

fn negotiate_sample_format(device: &DeviceInfo) -> DeviceResult<SampleFormat> {
    FORMAT_PREFERENCE
        .iter()
        .copied()
        .find(|format| device.supported_sample_formats.contains(format))
        .ok_or_else(|| DeviceError::FormatNotSupported(device.supported_sample_formats.clone()))
}

pub fn calculate_latency_ms(sample_rate: u32, quantum: u32) -> f32 {
    (quantum as f32 / sample_rate as f32) * 1000.0
}

pub fn find_closest_sample_rate(device: &DeviceInfo, target: u32) -> u32 {
    device
        .supported_sample_rates
        .iter()
        .copied()
        .min_by_key(|&rate| (rate as i64 - target as i64).abs())
        .unwrap_or_else(|| target.clamp(device.min_sample_rate, device.max_sample_rate))
}
