pub mod capability;
pub mod enumeration;
pub mod negotiation;
pub mod output;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("no audio output device found")]
    NoDevicesFound,
    #[error("output device not found: {0}")]
    DeviceNotFound(String),
    #[error("device query failed: {0}")]
    QueryFailed(String),
    #[error("{channels} channels not supported (device max {max})")]
    ChannelsNotSupported { channels: usize, max: u16 },
    #[error("no usable sample format among {0:?}")]
    FormatNotSupported(Vec<cpal::SampleFormat>),
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
    #[error("failed to build output stream: {0}")]
    BuildStream(String),
    #[error("failed to start output stream: {0}")]
    PlayStream(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;
