// src/session.rs
//! Parsing session lifecycle and control surface

use crate::{
    config::{resolve_interval, ConfigSource, GpsConfig},
    dispatch::DispatchQueue,
    error::{ParserError, Result},
    gps::data::SessionStatus,
    sink::EventSink,
    tail::{TailContext, TailReader},
    watch::{ChangeNotifier, WatchToken},
};
use log::{debug, error, info};
use std::{
    fs::File,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{self, Sender},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    Reading,
    AwaitingNotification,
    Stopping,
    Stopped,
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            SessionState::Opening | SessionState::Reading | SessionState::AwaitingNotification
        )
    }
}

/// Wake-up delivered to a reader waiting for new data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    Changed,
    Stop,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// State shared between the control surface and the reader thread
pub(crate) struct Shared {
    state: Mutex<SessionState>,
    stop: AtomicBool,
    offset: AtomicU64,
    malformed: AtomicU64,
    /// Pending bridge registration while the reader awaits a change
    pub(crate) watch: Mutex<Option<WatchToken>>,
    wake: Mutex<Option<Sender<Wake>>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
            stop: AtomicBool::new(false),
            offset: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            watch: Mutex::new(None),
            wake: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    fn set_state(&self, next: SessionState) {
        *lock(&self.state) = next;
    }

    /// Move to `next` unless a stop is pending; only `Stopped` overrides a stop
    pub(crate) fn transition(&self, next: SessionState) {
        let mut state = lock(&self.state);
        if *state == SessionState::Stopping && next != SessionState::Stopped {
            return;
        }
        debug!("Session state {:?} -> {:?}", *state, next);
        *state = next;
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub(crate) fn set_offset(&self, offset: u64) {
        self.offset.store(offset, Ordering::Release);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn clear_wake(&self) {
        lock(&self.wake).take();
    }
}

/// Tails one NMEA file and delivers decoded events to a sink.
///
/// `start` and `stop` are idempotent and never block on the read loop,
/// which runs on its own thread.
pub struct NmeaSession {
    dir: PathBuf,
    file_name: String,
    notifier: Arc<dyn ChangeNotifier>,
    sink: Arc<dyn EventSink>,
    config: Arc<dyn ConfigSource>,
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl NmeaSession {
    pub fn new(
        dir: impl Into<PathBuf>,
        file_name: impl Into<String>,
        notifier: Arc<dyn ChangeNotifier>,
        sink: Arc<dyn EventSink>,
        config: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
            notifier,
            sink,
            config,
            shared: Arc::new(Shared::new()),
            reader: Mutex::new(None),
        }
    }

    /// Session for the file named in `config`, which also supplies the latency
    pub fn from_config(config: GpsConfig, notifier: Arc<dyn ChangeNotifier>, sink: Arc<dyn EventSink>) -> Self {
        let dir = config.nmea_dir.clone();
        let file_name = config.nmea_file.clone();
        Self::new(dir, file_name, notifier, sink, Arc::new(config))
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Bytes of the tracked file consumed so far in this session
    pub fn read_offset(&self) -> u64 {
        self.shared.offset.load(Ordering::Acquire)
    }

    /// Sentences dropped as malformed since the session started
    pub fn malformed_count(&self) -> u64 {
        self.shared.malformed.load(Ordering::Relaxed)
    }

    /// Start parsing from the beginning of the tracked file.
    ///
    /// A no-op while a session is already running. Fails with
    /// [`ParserError::FileNotFound`] if the file cannot be opened, leaving
    /// the session idle.
    pub fn start(&self) -> Result<()> {
        let mut reader = lock(&self.reader);

        let state = self.shared.state();
        if state.is_running() {
            debug!("Session already running ({:?})", state);
            return Ok(());
        }

        // reap the previous run
        if let Some(handle) = reader.take() {
            match handle.join() {
                Ok(Err(e)) => debug!("Previous session ended with error: {}", e),
                Err(_) => error!("Previous reader thread panicked"),
                Ok(Ok(())) => {}
            }
        }

        self.shared.set_state(SessionState::Opening);
        let path = self.path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                error!("Could not open file {}: {}", path.display(), e);
                self.shared.set_state(SessionState::Idle);
                return Err(if e.kind() == ErrorKind::NotFound {
                    ParserError::FileNotFound(path)
                } else {
                    ParserError::Io(e)
                });
            }
        };

        self.shared.stop.store(false, Ordering::Release);
        self.shared.set_offset(0);
        self.shared.malformed.store(0, Ordering::Relaxed);

        let queue = match DispatchQueue::new(resolve_interval(self.config.as_ref())) {
            Ok(queue) => queue,
            Err(e) => {
                self.shared.set_state(SessionState::Idle);
                return Err(e);
            }
        };

        // first task of the session, ahead of any decoded event; a stop
        // must never deliver End without it
        let sink = Arc::clone(&self.sink);
        queue.enqueue_always(move || sink.on_session_status(SessionStatus::Begin));

        let (wake_tx, wake_rx) = mpsc::channel();
        *lock(&self.shared.wake) = Some(wake_tx.clone());

        let context = TailContext {
            dir: self.dir.clone(),
            file_name: self.file_name.clone(),
            notifier: Arc::clone(&self.notifier),
            sink: Arc::clone(&self.sink),
            shared: Arc::clone(&self.shared),
        };
        let tail = TailReader::new(context, queue, wake_tx, wake_rx);

        self.shared.set_state(SessionState::Reading);
        let spawned = thread::Builder::new()
            .name("nmea-tail".to_string())
            .spawn(move || tail.run(file));

        match spawned {
            Ok(handle) => {
                info!("Parsing started: {}", path.display());
                *reader = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.clear_wake();
                self.shared.set_state(SessionState::Idle);
                Err(e.into())
            }
        }
    }

    /// Request the running session to stop.
    ///
    /// Returns without waiting for the reader; it closes the file, drops
    /// undelivered events and delivers a final `SessionEnd` on its own.
    /// Use [`NmeaSession::join`] to wait for that.
    pub fn stop(&self) -> Result<()> {
        let _reader = lock(&self.reader);

        {
            let mut state = lock(&self.shared.state);
            if !state.is_running() {
                debug!("Stop ignored in state {:?}", *state);
                return Ok(());
            }
            *state = SessionState::Stopping;
        }

        self.shared.stop.store(true, Ordering::Release);

        let pending = lock(&self.shared.watch).take();
        if let Some(token) = pending {
            self.notifier.unregister(&self.dir, token);
        }
        if let Some(wake) = lock(&self.shared.wake).as_ref() {
            let _ = wake.send(Wake::Stop);
        }

        info!("Parsing stop requested");
        Ok(())
    }

    /// Block until the reader thread exits, surfacing a fatal read or
    /// decode error.
    pub fn join(&self) -> Result<()> {
        let handle = lock(&self.reader).take();
        match handle {
            Some(handle) => handle
                .join()
                .map_err(|_| ParserError::Other("reader thread panicked".to_string()))?,
            None => Ok(()),
        }
    }
}

impl Drop for NmeaSession {
    fn drop(&mut self) {
        let _ = self.stop();
        if let Err(e) = self.join() {
            debug!("Session ended with error: {}", e);
        }
    }
}
