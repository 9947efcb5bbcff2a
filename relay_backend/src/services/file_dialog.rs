//! User-driven file import and export.
//!
//! Dialogs are slow, modal and may be cancelled, so they live on a worker
//! thread. Callers send a [`FileRequest`] and get a receiver for the
//! [`FileResponse`]. Cancellation is an outcome, not an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::services::{ServiceError, ServiceResult, debug_assert_off_render_thread, ready};

/// The native dialog. Implementations may block until the user answers.
pub trait FilePicker: Send + 'static {
    /// `None` when the user dismissed the dialog.
    fn pick_files(&mut self, extensions: &[String], allow_multiple: bool) -> Option<Vec<PathBuf>>;

    /// Ask where to save a file called `file_name`.
    fn pick_save_path(&mut self, file_name: &str) -> Option<PathBuf>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRequest {
    Import { extensions: Vec<String>, allow_multiple: bool },
    Export { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Staged copies of the picked files.
    Imported(Vec<PathBuf>),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Saved(PathBuf),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileResponse {
    Import(ImportOutcome),
    Export(ExportOutcome),
}

/// Directory that holds imported files until the application consumes them.
pub struct StagingArea {
    dir: PathBuf,
    staged: Mutex<Vec<PathBuf>>,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), staged: Mutex::new(Vec::new()) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn staged(&self) -> Vec<PathBuf> {
        self.staged.lock().clone()
    }

    /// Delete every staged file. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut staged = self.staged.lock();
        let mut removed = 0;
        for path in staged.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => debug!("Could not remove staged {}: {}", path.display(), e),
            }
        }
        removed
    }

    fn stage(&self, source: &Path) -> ServiceResult<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(ServiceError::io("failed to create", &self.dir))?;
        let name = source
            .file_name()
            .ok_or_else(|| ServiceError::Io {
                context: "not a file",
                path: source.to_path_buf(),
                source: std::io::ErrorKind::InvalidInput.into(),
            })?;
        let target = self.dir.join(name);
        fs::copy(source, &target).map_err(ServiceError::io("failed to stage", source))?;

        let mut staged = self.staged.lock();
        if !staged.contains(&target) {
            staged.push(target.clone());
        }
        Ok(target)
    }
}

struct Envelope {
    request: FileRequest,
    reply: Sender<ServiceResult<FileResponse>>,
}

pub struct FileDialogService {
    tx: Option<Sender<Envelope>>,
    worker: Option<JoinHandle<()>>,
    staging: Arc<StagingArea>,
}

impl FileDialogService {
    pub fn spawn(picker: Box<dyn FilePicker>, staging_dir: impl Into<PathBuf>) -> ServiceResult<Self> {
        let staging = Arc::new(StagingArea::new(staging_dir));
        let (tx, rx) = channel::unbounded();
        let worker_staging = Arc::clone(&staging);
        let worker = thread::Builder::new()
            .name("relay-file-dialog".into())
            .spawn(move || run(rx, picker, worker_staging))
            .map_err(ServiceError::io("failed to spawn worker for", "relay-file-dialog"))?;
        Ok(Self { tx: Some(tx), worker: Some(worker), staging })
    }

    pub fn staging(&self) -> &Arc<StagingArea> {
        &self.staging
    }

    pub fn request(&self, request: FileRequest) -> Receiver<ServiceResult<FileResponse>> {
        debug_assert_off_render_thread("file dialog");
        let (reply, rx) = channel::bounded(1);
        if let Some(tx) = &self.tx {
            if tx.send(Envelope { request, reply }).is_ok() {
                return rx;
            }
        }
        ready(Err(ServiceError::Disconnected))
    }

    /// Ask the user for files with one of `extensions` (any file when empty).
    pub fn request_import(&self, extensions: &[&str], allow_multiple: bool) -> Receiver<ServiceResult<FileResponse>> {
        self.request(FileRequest::Import {
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            allow_multiple,
        })
    }

    /// Offer `path` to the user as a download.
    pub fn request_export(&self, path: impl Into<PathBuf>) -> Receiver<ServiceResult<FileResponse>> {
        self.request(FileRequest::Export { path: path.into() })
    }
}

impl Drop for FileDialogService {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("File dialog worker panicked");
            }
        }
    }
}

fn run(rx: Receiver<Envelope>, mut picker: Box<dyn FilePicker>, staging: Arc<StagingArea>) {
    for Envelope { request, reply } in rx {
        let response = match request {
            FileRequest::Import { extensions, allow_multiple } => {
                import(picker.as_mut(), &staging, &extensions, allow_multiple).map(FileResponse::Import)
            }
            FileRequest::Export { path } => export(picker.as_mut(), &path).map(FileResponse::Export),
        };
        let _ = reply.send(response);
    }
    debug!("File dialog worker exiting");
}

fn import(
    picker: &mut dyn FilePicker,
    staging: &StagingArea,
    extensions: &[String],
    allow_multiple: bool,
) -> ServiceResult<ImportOutcome> {
    let Some(picked) = picker.pick_files(extensions, allow_multiple) else {
        debug!("Import cancelled");
        return Ok(ImportOutcome::Cancelled);
    };

    let limit = if allow_multiple { usize::MAX } else { 1 };
    let mut staged = Vec::new();
    for source in picked.iter().filter(|p| matches_extension(p, extensions)).take(limit) {
        staged.push(staging.stage(source)?);
    }
    info!("Imported {} file(s) into {}", staged.len(), staging.dir().display());
    Ok(ImportOutcome::Imported(staged))
}

fn export(picker: &mut dyn FilePicker, path: &Path) -> ServiceResult<ExportOutcome> {
    fs::metadata(path).map_err(ServiceError::io("cannot export", path))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string());

    let Some(destination) = picker.pick_save_path(&file_name) else {
        debug!("Export of {} cancelled", path.display());
        return Ok(ExportOutcome::Cancelled);
    };
    fs::copy(path, &destination).map_err(ServiceError::io("failed to export to", &destination))?;
    info!("Exported {} to {}", path.display(), destination.display());
    Ok(ExportOutcome::Saved(destination))
}

/// Case-insensitive; `".sav"` and `"sav"` are equivalent. Empty list accepts all.
fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
}
