//! I/O collaborators of the bridge.
//!
//! Each service owns a worker thread, takes requests over a channel and
//! answers on a per-request reply channel. None of them may be driven from
//! the render callback.

pub mod file_dialog;
pub mod persistence;
pub mod tick;

use std::path::PathBuf;

use thiserror::Error;

use crate::rt_processing::on_render_thread;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("persistent store is not mounted")]
    NotMounted,
    #[error("service worker is gone")]
    Disconnected,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { context, path, source }
    }
}

#[inline(always)]
fn debug_assert_off_render_thread(service: &str) {
    debug_assert!(!on_render_thread(), "{} invoked from the render callback", service);
}

/// A reply channel that already holds `result`, for requests that never
/// reached a worker.
fn ready<T>(result: T) -> crossbeam::channel::Receiver<T> {
    let (tx, rx) = crossbeam::channel::bounded(1);
    let _ = tx.send(result);
    rx
}
