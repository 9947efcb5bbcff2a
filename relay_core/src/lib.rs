//! Shared data model for the relay audio bridge.
//!
//! Nothing in this crate touches an audio device or spawns a thread. It holds
//! the types that both the realtime backend and the application agree on.

pub mod config;
pub mod encoding;
pub mod error;
pub mod session;

pub use config::BridgeConfig;
pub use encoding::SampleEncoding;
pub use error::{ConfigError, RenderFailure, RenderResult, SessionError};
pub use session::SessionHandle;
