//! Connection lifecycle management.
//!
//! `ConnectionManager` owns the single live transport port and drives the
//! device-connection state machine: idle → awaiting-permission → opening →
//! streaming → closing/failed. It is the only writer of the connection state,
//! holds at most one port and one byte-delivery subscription at a time, and
//! converts every transport failure into a `Failed` state plus a status
//! notification instead of letting it escape.
//!
//! Byte delivery runs on one dedicated reader thread per connection: the
//! thread polls the port, feeds chunks through the reassembler and classifier,
//! appends surviving lines to the store and pushes them to subscribers. That
//! single thread is the serialized execution context the pipeline requires.

use crate::classify::{FilterSet, Severity};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::events::{EventBus, MonitorEvent};
use crate::port::{DeviceDescriptor, LineParameters, SerialBackend, TransportPort};
use crate::reassembler::LineReassembler;
use crate::store::LogStore;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::broadcast;

/// Current phase of the device connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// No connection; a device may be selected.
    Idle,
    /// Waiting for the platform's access grant.
    AwaitingPermission,
    /// Port acquired, line parameters and reset pulse in progress.
    Opening,
    /// Live: exactly one byte-delivery subscription is feeding the pipeline.
    Streaming,
    /// Teardown in progress.
    Closing,
    /// The last open attempt or live stream failed. Recoverable by an
    /// operator-initiated open; there is no automatic retry.
    Failed(String),
}

type SharedPort = Arc<Mutex<Box<dyn TransportPort>>>;

/// Handle onto the reader thread servicing one byte-delivery subscription.
struct ReaderHandle {
    stop: Arc<AtomicBool>,
    thread_id: thread::ThreadId,
    handle: Option<thread::JoinHandle<()>>,
}

impl ReaderHandle {
    /// Signal the reader to stop and wait for it to exit. When invoked from
    /// the reader thread itself (error teardown), the handle is dropped
    /// instead of self-joining.
    fn shutdown(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if thread::current().id() != self.thread_id && handle.join().is_err() {
                tracing::warn!("reader thread panicked before shutdown");
            }
        }
    }
}

impl std::fmt::Debug for ReaderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderHandle")
            .field("stopped", &self.stop.load(Ordering::Acquire))
            .finish()
    }
}

/// Tunables snapshot taken from the serial config section at construction.
#[derive(Debug, Clone)]
struct SerialSettings {
    read_buffer_bytes: usize,
    read_timeout: Duration,
    reset_pulse: Duration,
    poll_interval: Duration,
}

/// Mutable connection state, guarded by one mutex.
struct ConnState {
    phase: ConnectionState,
    selected: Option<DeviceDescriptor>,
    last_baud: u32,
    port: Option<SharedPort>,
    reader: Option<ReaderHandle>,
    /// Bumped on every teardown and open attempt. A reader or in-flight open
    /// whose epoch no longer matches has been superseded and must stand down.
    epoch: u64,
}

struct Inner {
    backend: Arc<dyn SerialBackend>,
    store: Arc<LogStore>,
    events: EventBus,
    filters: RwLock<FilterSet>,
    /// Pending-remainder state; locked for the duration of one chunk's
    /// processing, touched only by the reader thread.
    reassembler: Mutex<LineReassembler>,
    settings: SerialSettings,
    state: Mutex<ConnState>,
}

/// Outcome of an open attempt that did not reach `Streaming`.
enum OpenAbort {
    /// A concurrent close/reselect superseded the attempt; no `Failed` state.
    Cancelled,
    Failed(AppError),
}

/// Long-lived manager for one device connection at a time.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(backend: Arc<dyn SerialBackend>, config: &Config) -> Self {
        let serial = &config.serial;
        Self {
            inner: Arc::new(Inner {
                backend,
                store: Arc::new(LogStore::new()),
                events: EventBus::new(),
                filters: RwLock::new(config.filters),
                reassembler: Mutex::new(LineReassembler::new()),
                settings: SerialSettings {
                    read_buffer_bytes: serial.read_buffer_bytes,
                    read_timeout: serial.read_timeout(),
                    reset_pulse: serial.reset_pulse(),
                    poll_interval: serial.poll_interval(),
                },
                state: Mutex::new(ConnState {
                    phase: ConnectionState::Idle,
                    selected: None,
                    last_baud: serial.default_baud,
                    port: None,
                    reader: None,
                    epoch: 0,
                }),
            }),
        }
    }

    /// Register a consumer for status changes and appended-line batches.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }

    /// The log history this connection feeds.
    pub fn store(&self) -> Arc<LogStore> {
        Arc::clone(&self.inner.store)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().phase.clone()
    }

    pub fn selected(&self) -> Option<DeviceDescriptor> {
        self.inner.state.lock().selected.clone()
    }

    pub fn filters(&self) -> FilterSet {
        *self.inner.filters.read()
    }

    /// Toggle visibility for one severity. Applies at ingest time only;
    /// already-stored lines are not recomputed.
    pub fn set_filter(&self, severity: Severity, visible: bool) {
        self.inner.filters.write().set_visible(severity, visible);
    }

    /// Drop the stored history. An in-flight partial line is unaffected and
    /// completes into the emptied store.
    pub fn clear_log(&self) {
        self.inner.store.clear();
    }

    /// Enumerate currently attached devices.
    pub fn list_devices(&self) -> AppResult<Vec<DeviceDescriptor>> {
        self.inner
            .backend
            .list_devices()
            .map_err(|e| AppError::DeviceUnavailable(e.to_string()))
    }

    /// Record the operator's device choice.
    ///
    /// While idle this only records intent. Selecting a *different* device
    /// while opening or streaming tears the current connection fully down and
    /// then opens the new device at the last requested baud rate, so the
    /// manager never holds two live ports.
    pub async fn select(&self, device: DeviceDescriptor) -> AppResult<()> {
        let (reopen, baud) = {
            let mut st = self.inner.state.lock();
            let live = matches!(
                st.phase,
                ConnectionState::Opening | ConnectionState::Streaming
            );
            let changed = st.selected.as_ref() != Some(&device);
            st.selected = Some(device.clone());
            (live && changed, st.last_baud)
        };
        self.inner.events.status(format!("selected {}", device.label()));
        if reopen {
            self.open_device(device, baud).await
        } else {
            Ok(())
        }
    }

    /// Open the selected device at the given baud rate and start streaming.
    ///
    /// From `Failed` this is simply a fresh attempt. Any existing connection
    /// is torn down first.
    pub async fn open(&self, baud: u32) -> AppResult<()> {
        let selected = self.inner.state.lock().selected.clone();
        let Some(device) = selected else {
            self.inner.events.status("no device selected");
            return Err(AppError::NoSelection);
        };
        self.open_device(device, baud).await
    }

    /// Tear down the current connection, if any, and return to `Idle`.
    pub async fn close(&self) -> AppResult<()> {
        let inner = &self.inner;
        let (reader, port) = inner.begin_teardown();
        let had_connection = reader.is_some() || port.is_some();
        let errors = inner.release(reader, port);
        inner.state.lock().phase = ConnectionState::Idle;

        if !errors.is_empty() {
            inner
                .events
                .status(format!("disconnected ({})", errors.join("; ")));
        } else if had_connection {
            inner.events.status("disconnected");
        }
        Ok(())
    }

    /// Write bytes to the live port.
    pub fn write(&self, data: &[u8]) -> AppResult<usize> {
        let port = {
            let st = self.inner.state.lock();
            match (&st.phase, &st.port) {
                (ConnectionState::Streaming, Some(port)) => Arc::clone(port),
                _ => return Err(AppError::IoError("no live connection".into())),
            }
        };
        let result = port
            .lock()
            .write_bytes(data)
            .map_err(|e| AppError::IoError(e.to_string()));
        result
    }

    async fn open_device(&self, device: DeviceDescriptor, baud: u32) -> AppResult<()> {
        let inner = &self.inner;

        // A fresh attempt always starts from a fully torn-down connection.
        let (reader, port) = inner.begin_teardown();
        let errors = inner.release(reader, port);
        if !errors.is_empty() {
            inner
                .events
                .status(format!("previous connection released ({})", errors.join("; ")));
        }
        {
            let mut st = inner.state.lock();
            st.phase = ConnectionState::Idle;
            st.last_baud = baud;
        }

        if !inner.backend.has_permission(&device) {
            inner.state.lock().phase = ConnectionState::AwaitingPermission;
            inner
                .events
                .status(format!("requesting permission for {}", device.label()));

            let granted = match inner.backend.request_permission(&device).await {
                Ok(granted) => granted,
                Err(e) => {
                    inner.state.lock().phase = ConnectionState::Idle;
                    inner.events.status(format!("permission request failed: {e}"));
                    return Err(AppError::open_failed(e));
                }
            };
            if !granted {
                // Denied: back to idle, nothing held.
                inner.state.lock().phase = ConnectionState::Idle;
                inner.events.status("permission denied");
                return Err(AppError::PermissionDenied);
            }
        }

        let epoch = {
            let mut st = inner.state.lock();
            st.phase = ConnectionState::Opening;
            st.epoch += 1;
            st.epoch
        };
        inner.events.status(format!("opening {}", device.label()));

        match self.establish(&device, baud, epoch).await {
            Ok(()) => {
                inner
                    .events
                    .status(format!("connected to {}", device.label()));
                Ok(())
            }
            Err(OpenAbort::Cancelled) => {
                tracing::debug!(device = %device.port_name, "open attempt superseded by close");
                Err(AppError::OpenFailed("open cancelled by close".into()))
            }
            Err(OpenAbort::Failed(err)) => {
                let reason = err.to_string();
                {
                    let mut st = inner.state.lock();
                    if st.epoch == epoch {
                        st.phase = ConnectionState::Failed(reason.clone());
                    }
                }
                inner.events.status(format!("open failed: {reason}"));
                Err(err)
            }
        }
    }

    /// Acquire the port, apply parameters, pulse the reset lines and start the
    /// byte-delivery subscription. Checks the epoch around every suspension
    /// point so a concurrent close cancels the attempt instead of leaking a
    /// stale port.
    async fn establish(
        &self,
        device: &DeviceDescriptor,
        baud: u32,
        epoch: u64,
    ) -> Result<(), OpenAbort> {
        let inner = &self.inner;

        let mut port = inner
            .backend
            .open(device)
            .map_err(|e| OpenAbort::Failed(AppError::open_failed(e)))?;

        let mut params = LineParameters::eight_n_one(baud);
        params.read_timeout = inner.settings.read_timeout;
        if let Err(e) = port.set_line_parameters(&params) {
            if let Err(close_err) = port.close() {
                tracing::warn!(error = %close_err, "closing misconfigured port failed");
            }
            return Err(OpenAbort::Failed(AppError::open_failed(e)));
        }

        // Honor a close that raced ahead of the reset pulse.
        if inner.state.lock().epoch != epoch {
            if let Err(e) = port.close() {
                tracing::warn!(error = %e, "closing cancelled port failed");
            }
            return Err(OpenAbort::Cancelled);
        }

        // DTR/RTS pulse to reset an attached microcontroller. Sleeps on this
        // task, never on the delivery path. Not every adapter wires the
        // control lines, so failures are non-fatal.
        match port.set_control_lines(true, true) {
            Ok(()) => {
                tokio::time::sleep(inner.settings.reset_pulse).await;
                if let Err(e) = port.set_control_lines(false, false) {
                    tracing::warn!(error = %e, "failed to release control lines after reset pulse");
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping reset pulse"),
        }

        let shared: SharedPort = Arc::new(Mutex::new(port));

        let mut st = inner.state.lock();
        if st.epoch != epoch {
            drop(st);
            if let Err(e) = shared.lock().close() {
                tracing::warn!(error = %e, "closing cancelled port failed");
            }
            return Err(OpenAbort::Cancelled);
        }
        debug_assert!(st.reader.is_none(), "previous subscription still live");

        let reader = match spawn_reader(Arc::clone(&self.inner), Arc::clone(&shared), epoch) {
            Ok(reader) => reader,
            Err(e) => {
                drop(st);
                if let Err(close_err) = shared.lock().close() {
                    tracing::warn!(error = %close_err, "closing port after reader spawn failure failed");
                }
                return Err(OpenAbort::Failed(AppError::OpenFailed(format!(
                    "failed to start reader thread: {e}"
                ))));
            }
        };
        st.port = Some(shared);
        st.reader = Some(reader);
        st.phase = ConnectionState::Streaming;
        Ok(())
    }
}

impl Inner {
    /// Take the live connection out of the state, invalidating any in-flight
    /// open attempt and marking the transition.
    fn begin_teardown(&self) -> (Option<ReaderHandle>, Option<SharedPort>) {
        let mut st = self.state.lock();
        st.epoch += 1;
        if st.reader.is_some() || st.port.is_some() {
            st.phase = ConnectionState::Closing;
        }
        (st.reader.take(), st.port.take())
    }

    /// Best-effort teardown in fixed order: stop the subscription, close the
    /// port, drop the handle. Each step runs even if a prior one failed;
    /// failures are aggregated and reported, not swallowed.
    fn release(
        &self,
        reader: Option<ReaderHandle>,
        port: Option<SharedPort>,
    ) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(reader) = reader {
            reader.shutdown();
        }
        if let Some(port) = port {
            if let Err(e) = port.lock().close() {
                errors.push(format!("port close: {e}"));
            }
            drop(port);
        }
        for err in &errors {
            tracing::warn!("teardown step failed: {err}");
        }
        errors
    }

    /// One chunk through reassembly, classification and storage. Runs only on
    /// the reader thread, which serializes the whole pipeline.
    fn ingest(&self, chunk: &[u8]) {
        let lines = self.reassembler.lock().feed(chunk);
        if lines.is_empty() {
            return;
        }
        let filters = *self.filters.read();
        let mut appended = Vec::new();
        for text in lines {
            let severity = Severity::of_line(&text);
            if !filters.is_visible(severity) {
                continue;
            }
            appended.push(self.store.append(text, severity));
        }
        if !appended.is_empty() {
            self.events.lines_appended(appended);
        }
    }

    /// Transport failure reported by the reader thread: same teardown as an
    /// explicit close, then `Failed` plus a status notification.
    fn fail_from_reader(&self, epoch: u64, reason: String) {
        let port = {
            let mut st = self.state.lock();
            if st.epoch != epoch {
                // A teardown already superseded this reader.
                return;
            }
            st.epoch += 1;
            st.phase = ConnectionState::Failed(reason.clone());
            // Runs on the reader thread itself; dropping the handle detaches
            // instead of self-joining.
            st.reader.take();
            st.port.take()
        };
        if let Some(port) = port {
            if let Err(e) = port.lock().close() {
                tracing::warn!(error = %e, "port close failed during error teardown");
            }
        }
        self.events.status(format!("read error: {reason}"));
    }
}

/// Start the byte-delivery subscription: one thread polling the port and
/// feeding the pipeline until stopped or a transport error fires.
fn spawn_reader(
    inner: Arc<Inner>,
    port: SharedPort,
    epoch: u64,
) -> std::io::Result<ReaderHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let handle = thread::Builder::new()
        .name("serial-reader".to_string())
        .spawn(move || {
            let mut buffer = vec![0u8; inner.settings.read_buffer_bytes];
            while !stop_flag.load(Ordering::Acquire) {
                let result = port.lock().read_bytes(&mut buffer);
                match result {
                    Ok(0) => thread::sleep(inner.settings.poll_interval),
                    Ok(n) => inner.ingest(&buffer[..n]),
                    Err(e) if e.is_transient() => thread::sleep(inner.settings.poll_interval),
                    Err(e) => {
                        if !stop_flag.load(Ordering::Acquire) {
                            inner.fail_from_reader(epoch, e.to_string());
                        }
                        break;
                    }
                }
            }
            tracing::debug!("reader thread exiting");
        })?;
    let thread_id = handle.thread().id();
    Ok(ReaderHandle {
        stop,
        thread_id,
        handle: Some(handle),
    })
}
