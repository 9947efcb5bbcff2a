//! Realtime side of the relay bridge.
//!
//! `rt_processing` holds everything that runs inside the audio callback.
//! `audio_device` opens the platform output stream that drives it, and
//! `services` carries the I/O collaborators that must stay off that thread.

pub mod audio_device;
pub mod rt_processing;
pub mod runtime;
pub mod services;

pub use relay_core::{BridgeConfig, RenderFailure, RenderResult, SampleEncoding, SessionHandle};
pub use runtime::BridgeRuntime;
