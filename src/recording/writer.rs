// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Background writer feeding a [`RecordingStore`].

use std::path::Path;
use std::sync::Mutex;
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::RecordingError;

use super::{RecordingService, RecordingStore, RequestRecord, ResponseRecord};

enum Command {
    Request(RequestRecord),
    Response(ResponseRecord),
}

/// Recorder that persists to SQLite on a dedicated thread.
///
/// `record_*` only enqueue. Write failures are logged by the worker.
pub struct SqliteRecorder {
    tx: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SqliteRecorder {
    /// Open the store at `db_path` and start the worker.
    pub fn open(db_path: &Path) -> Result<Self, RecordingError> {
        let store = RecordingStore::open_at(db_path)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = std::thread::Builder::new()
            .name("switchyard-recorder".to_string())
            .spawn(move || run_worker(store, rx))
            .map_err(|e| RecordingError::OpenFailed(format!("Failed to start recorder: {}", e)))?;

        debug!(path = %db_path.display(), "Recorder started");
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    fn enqueue(&self, command: Command) {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let sent = match guard.as_ref() {
            Some(tx) => tx.send(command).is_ok(),
            None => false,
        };
        if !sent {
            warn!(error = %RecordingError::WorkerStopped, "Dropping interaction record");
        }
    }

    /// Write everything queued so far and stop the worker.
    pub fn shutdown(&self) {
        drop(self.tx.lock().unwrap_or_else(|e| e.into_inner()).take());
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = worker {
            if handle.join().is_err() {
                error!("Recorder worker panicked");
            }
        }
    }
}

impl RecordingService for SqliteRecorder {
    fn record_request(&self, record: RequestRecord) {
        self.enqueue(Command::Request(record));
    }

    fn record_response(&self, record: ResponseRecord) {
        self.enqueue(Command::Response(record));
    }
}

impl Drop for SqliteRecorder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(store: RecordingStore, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.blocking_recv() {
        let result = match &command {
            Command::Request(record) => store.insert_request(record),
            Command::Response(record) => store.insert_response(record),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist interaction record");
        }
    }
    debug!("Recorder worker stopped");
}
