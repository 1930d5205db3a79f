// src/dispatch.rs
//! Single-worker task queue that throttles consumer callbacks
//!
//! Tasks run strictly in enqueue order, one at a time, with at least
//! `interval` between the start of consecutive tasks. Enqueueing never
//! blocks.

use crate::error::Result;
use log::{debug, error, trace};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Task),
    /// Runs even when the queue is discarding
    Always(Task),
    /// Last task before the worker exits; always runs
    Finish(Task),
}

/// What happens to tasks still queued at shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Drain,
    Discard,
}

pub struct DispatchQueue {
    sender: Option<Sender<Message>>,
    worker: Option<JoinHandle<()>>,
    discard: Arc<AtomicBool>,
    interval: Duration,
}

impl DispatchQueue {
    /// Spawn the worker thread
    pub fn new(interval: Duration) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let discard = Arc::new(AtomicBool::new(false));

        let worker_discard = Arc::clone(&discard);
        let worker = thread::Builder::new()
            .name("nmea-dispatch".to_string())
            .spawn(move || run_worker(receiver, worker_discard, interval))?;

        debug!("Dispatch queue started, interval {:?}", interval);

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            discard,
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Queue a task; returns false if the worker is gone
    pub fn enqueue<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.sender {
            Some(sender) => sender.send(Message::Run(Box::new(task))).is_ok(),
            None => false,
        }
    }

    /// Queue a task that a discarding shutdown still runs
    pub fn enqueue_always<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.sender {
            Some(sender) => sender.send(Message::Always(Box::new(task))).is_ok(),
            None => false,
        }
    }

    /// Stop the worker and join it.
    ///
    /// `final_task`, if any, runs after the queued tasks were drained or
    /// discarded and is the last task the worker ever runs.
    pub fn shutdown(mut self, mode: Shutdown, final_task: Option<Task>) {
        self.close(mode, final_task);
    }

    fn close(&mut self, mode: Shutdown, final_task: Option<Task>) {
        if mode == Shutdown::Discard {
            self.discard.store(true, Ordering::Release);
        }

        if let Some(sender) = self.sender.take() {
            if let Some(task) = final_task {
                let _ = sender.send(Message::Finish(task));
            }
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Dispatch worker panicked");
            }
            debug!("Dispatch queue stopped");
        }
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        self.close(Shutdown::Discard, None);
    }
}

fn run_worker(receiver: Receiver<Message>, discard: Arc<AtomicBool>, interval: Duration) {
    let mut last_run: Option<Instant> = None;

    while let Ok(message) = receiver.recv() {
        let (task, keep) = match message {
            Message::Run(task) => (task, false),
            Message::Always(task) => (task, true),
            Message::Finish(task) => {
                throttle(&mut last_run, interval);
                task();
                break;
            }
        };

        if !keep && discard.load(Ordering::Acquire) {
            trace!("Discarding queued task");
            continue;
        }
        throttle(&mut last_run, interval);
        // shutdown may have been requested while throttled
        if !keep && discard.load(Ordering::Acquire) {
            trace!("Discarding queued task");
            continue;
        }
        task();
    }
}

/// Sleep until `interval` has passed since the previous task started
fn throttle(last_run: &mut Option<Instant>, interval: Duration) {
    if let Some(previous) = *last_run {
        let elapsed = previous.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
    *last_run = Some(Instant::now());
}
