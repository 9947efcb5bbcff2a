//! relay - plays a native block generator through the default audio output.

mod picker;
mod tone;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use relay_backend::audio_device::capability;
use relay_backend::audio_device::enumeration::DeviceEnumerator;
use relay_backend::services::ServiceResult;
use relay_backend::services::file_dialog::{
    ExportOutcome, FileDialogService, FileRequest, FileResponse, ImportOutcome,
};
use relay_backend::services::persistence::PersistenceService;
use relay_backend::services::tick::UiTicker;
use relay_backend::{BridgeConfig, BridgeRuntime};
use tracing::{debug, info, warn};

use crate::picker::RfdPicker;
use crate::tone::ToneGenerator;

const TICK_INTERVAL: Duration = Duration::from_millis(100);
const STATS_INTERVAL: Duration = Duration::from_secs(1);
const CONFIG_SNAPSHOT: &str = "relay.json";

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Bridge a block-based audio engine to the system output")]
#[command(version)]
struct Cli {
    /// JSON bridge configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// How long to run, in seconds
    #[arg(long, default_value_t = 10)]
    seconds: u64,

    /// Frequency of the demo tone in Hz
    #[arg(long, default_value_t = 440.0)]
    frequency: f32,

    /// Deliver the tone as encoded bytes instead of native floats
    #[arg(long)]
    encoded: bool,

    /// Durable directory the working tree is restored from and flushed to
    #[arg(long, default_value = "relay-store")]
    store: PathBuf,

    /// Working directory
    #[arg(long, default_value = "relay-work")]
    work: PathBuf,

    /// Open an import dialog for these extensions (e.g. "gb,gbc,sav")
    #[arg(long, value_delimiter = ',', num_args = 0..)]
    import: Option<Vec<String>>,

    /// Offer this file for export
    #[arg(long)]
    export: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        return list_devices();
    }

    let config = match &cli.config {
        Some(path) => BridgeConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    info!(
        "Bridge: quantum {}, {} channels, {} Hz, {}",
        config.quantum, config.channels, config.sample_rate, config.encoding
    );

    capability::check(&config);

    let persistence = PersistenceService::spawn()?;
    let restored = persistence
        .mount(&cli.store, &cli.work)
        .recv()
        .context("persistence worker stopped")??;
    info!(
        "Restored {} file(s), {} bytes from {}",
        restored.files,
        restored.bytes,
        cli.store.display()
    );

    let mut runtime = BridgeRuntime::new(config.clone())?;
    let tone = if cli.encoded {
        ToneGenerator::encoded(cli.frequency, &config)
    } else {
        ToneGenerator::new(cli.frequency, &config)
    };
    let session = runtime.create_session(Box::new(tone))?;
    runtime.activate(Some(session))?;

    let headless = match runtime.start_output() {
        Ok(()) => None,
        Err(e) => {
            warn!("No audio output ({}), rendering headless", e);
            Some(HeadlessDriver::spawn(&runtime)?)
        }
    };

    let mut requests = VecDeque::new();
    if let Some(extensions) = cli.import.clone() {
        requests.push_back(FileRequest::Import { extensions, allow_multiple: true });
    }
    if let Some(path) = cli.export.clone() {
        requests.push_back(FileRequest::Export { path });
    }
    let dialogs = if requests.is_empty() {
        None
    } else {
        Some(FileDialogService::spawn(
            Box::new(RfdPicker),
            std::env::temp_dir().join("relay-file-dialog"),
        )?)
    };

    run_loop(&runtime, dialogs.as_ref(), requests, Duration::from_secs(cli.seconds))?;

    log_stats(&runtime);
    runtime.stop_output();
    drop(headless);
    runtime.teardown_session(session)?;
    runtime.pump_events();

    let snapshot = cli.work.join(CONFIG_SNAPSHOT);
    std::fs::write(&snapshot, config.to_json()?).with_context(|| format!("writing {}", snapshot.display()))?;
    let flushed = persistence.flush().recv().context("persistence worker stopped")??;
    info!("Flushed {} file(s), {} bytes to {}", flushed.files, flushed.bytes, cli.store.display());

    if let Some(dialogs) = dialogs {
        let removed = dialogs.staging().clear();
        debug!("Removed {} staged file(s)", removed);
    }
    Ok(())
}

/// Control loop: drains render events every tick, logs statistics, and
/// walks through queued file requests one dialog at a time.
fn run_loop(
    runtime: &BridgeRuntime,
    dialogs: Option<&FileDialogService>,
    mut requests: VecDeque<FileRequest>,
    duration: Duration,
) -> Result<()> {
    let ticker = UiTicker::new(TICK_INTERVAL);
    let deadline = Instant::now() + duration;
    let mut last_stats = Instant::now();

    let mut pending: Option<Receiver<ServiceResult<FileResponse>>> =
        dialogs.and_then(|dialogs| requests.pop_front().map(|request| dialogs.request(request)));

    loop {
        let reply = pending.clone().unwrap_or_else(channel::never);
        select! {
            recv(ticker.receiver()) -> tick => {
                let now = tick.context("ticker stopped")?;
                runtime.pump_events();
                if now.duration_since(last_stats) >= STATS_INTERVAL {
                    log_stats(runtime);
                    last_stats = now;
                }
                if now >= deadline {
                    return Ok(());
                }
            }
            recv(reply) -> response => {
                match response {
                    Ok(Ok(response)) => log_response(response),
                    Ok(Err(e)) => warn!("File request failed: {}", e),
                    Err(_) => warn!("File dialog worker stopped"),
                }
                pending = dialogs.and_then(|dialogs| requests.pop_front().map(|request| dialogs.request(request)));
            }
        }
    }
}

fn log_response(response: FileResponse) {
    match response {
        FileResponse::Import(ImportOutcome::Imported(paths)) => {
            for path in paths {
                info!("Staged {}", path.display());
            }
        }
        FileResponse::Export(ExportOutcome::Saved(path)) => info!("Saved {}", path.display()),
        FileResponse::Import(ImportOutcome::Cancelled) | FileResponse::Export(ExportOutcome::Cancelled) => {
            info!("File dialog cancelled")
        }
    }
}

fn log_stats(runtime: &BridgeRuntime) {
    let stats = runtime.performance();
    info!(
        "{} output: cycles {} (failed {:.1}%), frames {}, load {:.1}%, max cycle {} ns, dropped events {}",
        if runtime.is_streaming() { "device" } else { "headless" },
        stats.cycles,
        stats.failure_ratio() * 100.0,
        stats.frames_delivered,
        stats.load_percent,
        stats.max_cycle_nanos.unwrap_or(0),
        runtime.events().dropped()
    );
}

fn list_devices() -> Result<()> {
    let enumerator = DeviceEnumerator::scan()?;
    println!("Host: {}", enumerator.host_name());
    for device in enumerator.output_devices() {
        println!("{}", device);
    }
    Ok(())
}

/// Stands in for the platform audio callback when no device is available,
/// driving the render host on a quantum-period clock.
struct HeadlessDriver {
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl HeadlessDriver {
    fn spawn(runtime: &BridgeRuntime) -> Result<Self> {
        let mut host = runtime.render_host();
        let period = Duration::from_nanos(runtime.config().quantum_nanos() as u64);
        let (stop, stopped) = channel::bounded::<()>(0);

        let worker = thread::Builder::new()
            .name("relay-headless".into())
            .spawn(move || {
                let clock = channel::tick(period);
                let mut buffers = vec![vec![0.0f32; host.quantum()]; host.channels()];
                loop {
                    select! {
                        recv(stopped) -> _ => break,
                        recv(clock) -> _ => {
                            let _ = host.process_planar(&mut buffers);
                        }
                    }
                }
            })
            .context("spawning headless render thread")?;

        Ok(Self { stop: Some(stop), worker: Some(worker) })
    }
}

impl Drop for HeadlessDriver {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Headless render thread panicked");
            }
        }
    }
}
