//! Mirror of a working directory onto durable storage.
//!
//! `mount` pre-populates the working tree from the durable copy; `flush`
//! writes the working tree back. The owning application calls these at
//! startup, shutdown and on explicit save.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::services::{ServiceError, ServiceResult, debug_assert_off_render_thread, ready};

/// Totals of one mount or flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub files: usize,
    pub bytes: u64,
}

type Reply = Sender<ServiceResult<SyncReport>>;

enum Command {
    Mount { durable: PathBuf, working: PathBuf, reply: Reply },
    Flush { reply: Reply },
}

struct Mount {
    durable: PathBuf,
    working: PathBuf,
}

pub struct PersistenceService {
    tx: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
}

impl PersistenceService {
    pub fn spawn() -> ServiceResult<Self> {
        let (tx, rx) = channel::unbounded();
        let worker = thread::Builder::new()
            .name("relay-persistence".into())
            .spawn(move || run(rx))
            .map_err(ServiceError::io("failed to spawn worker for", "relay-persistence"))?;
        Ok(Self { tx: Some(tx), worker: Some(worker) })
    }

    /// Mount `durable` at `working`. The receiver fires once the working tree
    /// has been populated.
    pub fn mount(&self, durable: impl Into<PathBuf>, working: impl Into<PathBuf>) -> Receiver<ServiceResult<SyncReport>> {
        debug_assert_off_render_thread("persistence mount");
        let (reply, rx) = channel::bounded(1);
        self.send(Command::Mount { durable: durable.into(), working: working.into(), reply }, rx)
    }

    /// Write the working tree back to durable storage.
    pub fn flush(&self) -> Receiver<ServiceResult<SyncReport>> {
        debug_assert_off_render_thread("persistence flush");
        let (reply, rx) = channel::bounded(1);
        self.send(Command::Flush { reply }, rx)
    }

    fn send(&self, command: Command, rx: Receiver<ServiceResult<SyncReport>>) -> Receiver<ServiceResult<SyncReport>> {
        if let Some(tx) = &self.tx {
            if tx.send(command).is_ok() {
                return rx;
            }
        }
        ready(Err(ServiceError::Disconnected))
    }
}

impl Drop for PersistenceService {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after queued commands.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Persistence worker panicked");
            }
        }
    }
}

fn run(rx: Receiver<Command>) {
    let mut mount: Option<Mount> = None;
    for command in rx {
        match command {
            Command::Mount { durable, working, reply } => {
                let result = mount_store(&durable, &working);
                if result.is_ok() {
                    mount = Some(Mount { durable, working });
                }
                let _ = reply.send(result);
            }
            Command::Flush { reply } => {
                let result = match &mount {
                    Some(m) => flush_store(m),
                    None => Err(ServiceError::NotMounted),
                };
                let _ = reply.send(result);
            }
        }
    }
    debug!("Persistence worker exiting");
}

fn mount_store(durable: &Path, working: &Path) -> ServiceResult<SyncReport> {
    fs::create_dir_all(durable).map_err(ServiceError::io("failed to create", durable))?;
    fs::create_dir_all(working).map_err(ServiceError::io("failed to create", working))?;
    let report = copy_tree(durable, working)?;
    info!(
        files = report.files,
        bytes = report.bytes,
        "Mounted {} at {}",
        durable.display(),
        working.display()
    );
    Ok(report)
}

fn flush_store(mount: &Mount) -> ServiceResult<SyncReport> {
    fs::create_dir_all(&mount.durable).map_err(ServiceError::io("failed to create", &mount.durable))?;
    let report = copy_tree(&mount.working, &mount.durable)?;
    info!(files = report.files, bytes = report.bytes, "Flushed to {}", mount.durable.display());
    Ok(report)
}

/// Recursively copy `from` into `to`, overwriting existing files.
fn copy_tree(from: &Path, to: &Path) -> ServiceResult<SyncReport> {
    let mut report = SyncReport::default();
    let entries = fs::read_dir(from).map_err(ServiceError::io("failed to read", from))?;

    for entry in entries {
        let entry = entry.map_err(ServiceError::io("failed to read", from))?;
        let source = entry.path();
        let target = to.join(entry.file_name());
        let file_type = entry.file_type().map_err(ServiceError::io("failed to stat", &source))?;

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(ServiceError::io("failed to create", &target))?;
            let nested = copy_tree(&source, &target)?;
            report.files += nested.files;
            report.bytes += nested.bytes;
        } else if file_type.is_file() {
            report.bytes += fs::copy(&source, &target).map_err(ServiceError::io("failed to copy", &source))?;
            report.files += 1;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_populates_working_tree() {
        let durable = tempfile::tempdir().unwrap();
        let working = tempfile::tempdir().unwrap();
        fs::create_dir(durable.path().join("saves")).unwrap();
        fs::write(durable.path().join("saves/song.sav"), b"abcd").unwrap();
        fs::write(durable.path().join("settings.json"), b"{}").unwrap();

        let service = PersistenceService::spawn().unwrap();
        let report = service.mount(durable.path(), working.path()).recv().unwrap().unwrap();

        assert_eq!(report, SyncReport { files: 2, bytes: 6 });
        assert_eq!(fs::read(working.path().join("saves/song.sav")).unwrap(), b"abcd");
    }

    #[test]
    fn test_flush_writes_back() {
        let durable = tempfile::tempdir().unwrap();
        let working = tempfile::tempdir().unwrap();

        let service = PersistenceService::spawn().unwrap();
        service.mount(durable.path(), working.path()).recv().unwrap().unwrap();

        fs::write(working.path().join("project.rplg"), b"state").unwrap();
        let report = service.flush().recv().unwrap().unwrap();

        assert_eq!(report.files, 1);
        assert_eq!(fs::read(durable.path().join("project.rplg")).unwrap(), b"state");
    }

    #[test]
    fn test_flush_before_mount() {
        let service = PersistenceService::spawn().unwrap();
        let result = service.flush().recv().unwrap();
        assert!(matches!(result, Err(ServiceError::NotMounted)));
    }

    #[test]
    fn test_mount_creates_missing_durable_dir() {
        let root = tempfile::tempdir().unwrap();
        let durable = root.path().join("store");
        let working = root.path().join("work");

        let service = PersistenceService::spawn().unwrap();
        let report = service.mount(&durable, &working).recv().unwrap().unwrap();

        assert_eq!(report, SyncReport::default());
        assert!(durable.is_dir());
        assert!(working.is_dir());
    }
}
