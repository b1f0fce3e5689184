//! Background export worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::{run_export, ExportConfig, ExportEvent, ExportState, ExportSummary};
use crate::error::CamtrapError;
use crate::schema::AnnotationFile;
use crate::store::ImageStore;

/// A running export. Events arrive on [`events`](Self::events); the run
/// never waits for them to be consumed.
#[derive(Debug)]
pub struct ExportHandle {
    events: Receiver<ExportEvent>,
    cancel: Arc<AtomicBool>,
    state: Arc<Mutex<ExportState>>,
    worker: JoinHandle<Result<ExportSummary, CamtrapError>>,
}

impl ExportHandle {
    pub fn events(&self) -> &Receiver<ExportEvent> {
        &self.events
    }

    /// Asks the worker to stop before its next example.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn state(&self) -> ExportState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Waits for the worker and returns its result.
    pub fn join(self) -> Result<ExportSummary, CamtrapError> {
        self.worker
            .join()
            .map_err(|_| CamtrapError::WorkerPanicked)?
    }
}

/// Starts an export on a dedicated thread.
///
/// The state moves `Idle -> Running -> Completed | Aborted`; it is updated
/// before the matching terminal event is sent.
pub fn spawn_export(
    config: ExportConfig,
    annotations: AnnotationFile,
    store: Arc<ImageStore>,
) -> Result<ExportHandle, CamtrapError> {
    spawn_with_cancel(config, annotations, store, Arc::new(AtomicBool::new(false)))
}

fn spawn_with_cancel(
    config: ExportConfig,
    annotations: AnnotationFile,
    store: Arc<ImageStore>,
    cancel: Arc<AtomicBool>,
) -> Result<ExportHandle, CamtrapError> {
    let (tx, rx) = mpsc::channel();
    let state = Arc::new(Mutex::new(ExportState::Idle));

    let worker_cancel = Arc::clone(&cancel);
    let worker_state = Arc::clone(&state);
    let worker = thread::Builder::new()
        .name("camtrap-export".to_string())
        .spawn(move || {
            set_state(&worker_state, ExportState::Running);
            run_export(&config, &annotations, &store, &worker_cancel, &mut |event| {
                match &event {
                    ExportEvent::Completed(_) => set_state(&worker_state, ExportState::Completed),
                    ExportEvent::Aborted { .. } => set_state(&worker_state, ExportState::Aborted),
                    _ => {}
                }
                // The caller may have dropped the receiver; the run goes on regardless.
                let _ = tx.send(event);
            })
        })?;

    Ok(ExportHandle {
        events: rx,
        cancel,
        state,
        worker,
    })
}

fn set_state(state: &Mutex<ExportState>, next: ExportState) {
    *state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
}
