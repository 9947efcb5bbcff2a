//! cpal output stream driven by a `RenderHost`.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use tracing::{error, info};

use crate::audio_device::negotiation::NegotiatedConfig;
use crate::audio_device::{DeviceError, DeviceResult};
use crate::rt_processing::callback::RenderHost;

/// A running output stream. Dropping it stops playback.
pub struct OutputStream {
    stream: cpal::Stream,
    negotiated: NegotiatedConfig,
}

impl OutputStream {
    pub fn start(device: &cpal::Device, negotiated: &NegotiatedConfig, host: RenderHost) -> DeviceResult<Self> {
        let config = &negotiated.stream_config;
        let stream = match negotiated.sample_format {
            SampleFormat::F32 => build_native(device, config, host)?,
            SampleFormat::I16 => build_converted::<i16>(device, config, host)?,
            SampleFormat::U16 => build_converted::<u16>(device, config, host)?,
            other => return Err(DeviceError::FormatNotSupported(vec![other])),
        };

        stream
            .play()
            .map_err(|e| DeviceError::PlayStream(e.to_string()))?;
        info!("Output stream started: {}", negotiated);

        Ok(Self {
            stream,
            negotiated: negotiated.clone(),
        })
    }

    pub fn config(&self) -> &NegotiatedConfig {
        &self.negotiated
    }
}

fn build_native(device: &cpal::Device, config: &StreamConfig, mut host: RenderHost) -> DeviceResult<cpal::Stream> {
    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| host.process_interleaved(data),
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| DeviceError::BuildStream(e.to_string()))
}

fn build_converted<T>(device: &cpal::Device, config: &StreamConfig, mut host: RenderHost) -> DeviceResult<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    // Allocated here, before the stream exists; the callback only reuses it.
    let mut staged = vec![0.0f32; host.quantum() * host.channels()];
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for chunk in data.chunks_mut(staged.len()) {
                    let staged = &mut staged[..chunk.len()];
                    host.process_interleaved(staged);
                    for (out, &sample) in chunk.iter_mut().zip(staged.iter()) {
                        *out = T::from_sample(sample);
                    }
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| DeviceError::BuildStream(e.to_string()))
}
