//! Background decoding.
//!
//! Uploads are decoded on a worker thread so the controller stays
//! responsive. Jobs and results travel over channels; results are tagged
//! with the generation of the upload that produced them.

use bannerswap_core::{BannerSource, DocumentLoader, LoadResult, LoadedDocument};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Work sent to the decoding thread.
#[derive(Debug)]
pub enum LoadJob {
    Document {
        generation: u64,
        filename: String,
        bytes: Vec<u8>,
    },
    Banner {
        generation: u64,
        filename: String,
        bytes: Vec<u8>,
    },
}

enum WorkerCommand {
    Run(LoadJob),
    Shutdown,
}

/// Result of a decode.
#[derive(Debug)]
pub enum LoadOutcome {
    Document(LoadResult<LoadedDocument>),
    Banner(LoadResult<BannerSource>),
}

/// A finished job.
#[derive(Debug)]
pub struct LoadEvent {
    pub generation: u64,
    pub filename: String,
    pub outcome: LoadOutcome,
}

/// Decoding thread handle.
pub struct LoadWorker {
    /// Channel to send jobs to the worker thread.
    cmd_tx: Sender<WorkerCommand>,
    /// Channel to receive finished jobs from the worker thread.
    event_rx: Receiver<LoadEvent>,
    _thread: Option<JoinHandle<()>>,
}

impl LoadWorker {
    /// Start a worker decoding with `loader`.
    pub fn spawn(loader: DocumentLoader) -> Self {
        let (cmd_tx, cmd_rx) = channel::<WorkerCommand>();
        let (event_tx, event_rx) = channel::<LoadEvent>();

        let handle = thread::spawn(move || {
            log::debug!("Load worker started");
            while let Ok(WorkerCommand::Run(job)) = cmd_rx.recv() {
                let event = match job {
                    LoadJob::Document {
                        generation,
                        filename,
                        bytes,
                    } => {
                        let outcome = LoadOutcome::Document(loader.load(&filename, bytes));
                        LoadEvent {
                            generation,
                            filename,
                            outcome,
                        }
                    }
                    LoadJob::Banner {
                        generation,
                        filename,
                        bytes,
                    } => {
                        let outcome = LoadOutcome::Banner(loader.load_banner(&filename, &bytes));
                        LoadEvent {
                            generation,
                            filename,
                            outcome,
                        }
                    }
                };
                if event_tx.send(event).is_err() {
                    break;
                }
            }
            log::debug!("Load worker exiting");
        });

        Self {
            cmd_tx,
            event_rx,
            _thread: Some(handle),
        }
    }

    /// Queue a job. Returns false if the worker has stopped.
    pub fn submit(&self, job: LoadJob) -> bool {
        self.cmd_tx.send(WorkerCommand::Run(job)).is_ok()
    }

    /// Drain finished jobs (non-blocking).
    pub fn poll_events(&self) -> Vec<LoadEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Block until a job finishes or `timeout` elapses.
    pub fn wait_event(&self, timeout: Duration) -> Option<LoadEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                log::error!("Load worker disconnected");
                None
            }
        }
    }
}

impl Drop for LoadWorker {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WorkerCommand::Shutdown);
    }
}
