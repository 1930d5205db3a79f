// src/tail.rs
//! File tail reader: the read loop behind a running session
//!
//! Reads the tracked file in fixed-size chunks from the session's offset,
//! decodes each chunk and queues the resulting events. At end of file it
//! closes the file and sleeps until the change-notification bridge reports
//! a write to the tracked file, then reopens and continues where it left
//! off.

use crate::{
    dispatch::{DispatchQueue, Shutdown, Task},
    error::Result,
    gps::{
        data::{GpsEvent, RawSentenceEvent, SessionStatus},
        fix::{satellite_status, FixAggregator},
        nmea::{DecodeOutcome, DecodedSentence, NmeaDecoder},
    },
    session::{lock, SessionState, Shared, Wake},
    sink::EventSink,
    watch::{ChangeEvent, ChangeNotifier},
};
use log::{debug, error, info, trace, warn};
use std::{
    fs::File,
    io::{ErrorKind, Read, Seek, SeekFrom},
    path::PathBuf,
    sync::{
        mpsc::{Receiver, Sender},
        Arc,
    },
};

/// Bytes read from the tracked file per iteration
pub const CHUNK_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassEnd {
    EndOfFile,
    StopRequested,
}

pub(crate) struct TailContext {
    pub(crate) dir: PathBuf,
    pub(crate) file_name: String,
    pub(crate) notifier: Arc<dyn ChangeNotifier>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) shared: Arc<Shared>,
}

pub(crate) struct TailReader {
    context: TailContext,
    queue: Option<DispatchQueue>,
    decoder: NmeaDecoder,
    fix: FixAggregator,
    offset: u64,
    wake_tx: Sender<Wake>,
    wake_rx: Receiver<Wake>,
}

impl TailReader {
    pub(crate) fn new(
        context: TailContext,
        queue: DispatchQueue,
        wake_tx: Sender<Wake>,
        wake_rx: Receiver<Wake>,
    ) -> Self {
        Self {
            context,
            queue: Some(queue),
            decoder: NmeaDecoder::new(),
            fix: FixAggregator::new(),
            offset: 0,
            wake_tx,
            wake_rx,
        }
    }

    /// Run the session to completion on the current thread
    pub(crate) fn run(mut self, file: File) -> Result<()> {
        let result = self.tail(file);
        let shared = Arc::clone(&self.context.shared);

        let final_task: Option<Task> = match &result {
            Ok(()) => {
                let sink = Arc::clone(&self.context.sink);
                Some(Box::new(move || sink.on_session_status(SessionStatus::End)))
            }
            Err(e) => {
                error!("Parsing aborted at offset {}: {}", self.offset, e);
                None
            }
        };
        if let Some(queue) = self.queue.take() {
            queue.shutdown(Shutdown::Discard, final_task);
        }

        let pending = lock(&shared.watch).take();
        if let Some(token) = pending {
            self.context.notifier.unregister(&self.context.dir, token);
        }
        shared.clear_wake();
        self.decoder.reset();
        self.fix.clear();
        self.offset = 0;
        shared.set_offset(0);
        shared.transition(SessionState::Stopped);

        if result.is_ok() {
            info!("Parsing stopped");
        }
        result
    }

    fn tail(&mut self, mut file: File) -> Result<()> {
        self.fix.reset();

        loop {
            if self.read_pass(&mut file)? == PassEnd::StopRequested {
                return Ok(());
            }
            drop(file);

            file = loop {
                if !self.await_change()? {
                    return Ok(());
                }
                self.context.shared.transition(SessionState::Opening);
                match self.reopen() {
                    Ok(file) => break file,
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        warn!("Tracked file is gone, waiting for it to reappear");
                    }
                    Err(e) => return Err(e.into()),
                }
            };
        }
    }

    fn reopen(&self) -> std::io::Result<File> {
        let mut file = File::open(self.context.dir.join(&self.context.file_name))?;
        if self.offset > 0 {
            file.seek(SeekFrom::Start(self.offset))?;
        }
        trace!("Reopened at offset {}", self.offset);
        Ok(file)
    }

    fn read_pass(&mut self, file: &mut File) -> Result<PassEnd> {
        self.context.shared.transition(SessionState::Reading);
        let mut buffer = [0u8; CHUNK_SIZE];

        loop {
            if self.context.shared.stop_requested() {
                return Ok(PassEnd::StopRequested);
            }

            let read = match file.read(&mut buffer) {
                Ok(read) => read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if read == 0 {
                return Ok(PassEnd::EndOfFile);
            }

            for outcome in self.decoder.feed(&buffer, read)? {
                self.handle(outcome);
            }
            self.offset += read as u64;
            self.context.shared.set_offset(self.offset);
        }
    }

    /// Wait for the tracked file to change. Returns false if a stop was
    /// requested instead.
    fn await_change(&mut self) -> Result<bool> {
        let shared = Arc::clone(&self.context.shared);
        shared.transition(SessionState::AwaitingNotification);

        {
            let mut watch = lock(&shared.watch);
            if shared.stop_requested() {
                return Ok(false);
            }

            let tracked = self.context.file_name.clone();
            let wake = self.wake_tx.clone();
            let handler = Arc::new(move |event: ChangeEvent| {
                if event.resumes(&tracked) {
                    let _ = wake.send(Wake::Changed);
                }
            });
            *watch = Some(
                self.context
                    .notifier
                    .register(&self.context.dir, &self.context.file_name, handler)?,
            );
        }
        debug!("Waiting for {} to change", self.context.file_name);

        // data may have landed between end of file and registration
        if !self.has_unread_data() {
            // woken by the bridge handler or by stop()
            let _ = self.wake_rx.recv();
        }

        let pending = lock(&shared.watch).take();
        if let Some(token) = pending {
            self.context.notifier.unregister(&self.context.dir, token);
        }
        while self.wake_rx.try_recv().is_ok() {}

        Ok(!shared.stop_requested())
    }

    fn has_unread_data(&self) -> bool {
        std::fs::metadata(self.context.dir.join(&self.context.file_name))
            .map(|meta| meta.len() > self.offset)
            .unwrap_or(false)
    }

    fn handle(&mut self, outcome: DecodeOutcome) {
        let (sentence, raw) = match outcome {
            DecodeOutcome::Sentence { sentence, raw } => (sentence, raw),
            DecodeOutcome::Malformed(reason) => {
                warn!("Dropping malformed sentence: {}", reason);
                self.context.shared.record_malformed();
                return;
            }
        };

        log_sentence(&sentence);

        let event = match &sentence {
            DecodedSentence::Gsv(gsv) => Some(GpsEvent::SatelliteStatus(satellite_status(gsv))),
            _ => self.fix.apply(&sentence).map(GpsEvent::Location),
        };
        let raw = RawSentenceEvent::new(raw);

        let sink = Arc::clone(&self.context.sink);
        let queued = match &self.queue {
            Some(queue) => queue.enqueue(move || deliver(sink.as_ref(), event, raw)),
            None => false,
        };
        if !queued {
            warn!("Dispatch queue closed, {} event dropped", sentence.kind());
        }
    }
}

fn deliver(sink: &dyn EventSink, event: Option<GpsEvent>, raw: RawSentenceEvent) {
    match event {
        Some(GpsEvent::Location(location)) => sink.on_location(&location),
        Some(GpsEvent::SatelliteStatus(status)) => sink.on_satellite_status(&status),
        None => {}
    }
    sink.on_raw_sentence(&raw);
}

fn log_sentence(sentence: &DecodedSentence) {
    match sentence {
        DecodedSentence::Gga(gga) => debug!(
            "{}GGA time={:?} lat={:?} lon={:?} alt={:?} quality={:?} sats={:?} hdop={:?}",
            gga.talker, gga.time, gga.latitude, gga.longitude, gga.altitude, gga.fix_quality,
            gga.satellites_used, gga.hdop
        ),
        DecodedSentence::Rmc(rmc) => debug!(
            "{}RMC time={:?} date={:?} valid={} lat={:?} lon={:?} speed={:?}kn track={:?}",
            rmc.talker, rmc.time, rmc.date, rmc.valid, rmc.latitude, rmc.longitude, rmc.speed_knots,
            rmc.track_angle
        ),
        DecodedSentence::Gsa(gsa) => debug!(
            "{}GSA mode={:?} fix={:?} prns={:?} pdop={:?} hdop={:?} vdop={:?}",
            gsa.talker, gsa.selection_mode, gsa.fix_mode, gsa.prns, gsa.pdop, gsa.hdop, gsa.vdop
        ),
        DecodedSentence::Gsv(gsv) => debug!(
            "{}GSV {}/{} in view={:?} collected={}",
            gsv.talker,
            gsv.message_number,
            gsv.total_messages,
            gsv.satellites_in_view,
            gsv.satellites.len()
        ),
        DecodedSentence::Unrecognized { address } => trace!("Unrecognized sentence {}", address),
    }
}
