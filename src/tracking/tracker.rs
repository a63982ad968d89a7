//! Owns the single active position producer of a trip session.
//!
//! Every producer runs as its own task and tags its events with the
//! generation it was started under. Stopping aborts the task and bumps the
//! generation, so anything still queued from the old producer is discarded
//! by [`Tracker::is_current`].

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::coordinates::RawFix;
use crate::models::tracking::TrackingMode;
use crate::tracking::source::{AcquisitionError, PositionSource};

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Fix { generation: u64, fix: RawFix },
    Failed { generation: u64, error: AcquisitionError },
}

impl TrackerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            TrackerEvent::Fix { generation, .. } | TrackerEvent::Failed { generation, .. } => {
                *generation
            }
        }
    }
}

pub struct Tracker {
    mode: TrackingMode,
    generation: u64,
    producer: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<TrackerEvent>,
}

impl Tracker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TrackerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                mode: TrackingMode::Off,
                generation: 0,
                producer: None,
                events_tx,
            },
            events_rx,
        )
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_producer(&self) -> bool {
        self.producer
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn is_current(&self, event: &TrackerEvent) -> bool {
        self.mode != TrackingMode::Off && event.generation() == self.generation
    }

    /// Tears down the active producer. No event it emitted is current afterwards.
    pub fn stop(&mut self) {
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
        if self.mode != TrackingMode::Off {
            debug!(mode = ?self.mode, "tracking stopped");
        }
        self.generation = self.generation.wrapping_add(1);
        self.mode = TrackingMode::Off;
    }

    /// Replaces whatever producer is running with `source`.
    pub fn start(&mut self, mode: TrackingMode, source: Box<dyn PositionSource>) {
        self.stop();
        if mode == TrackingMode::Off {
            return;
        }

        let generation = self.generation;
        let events_tx = self.events_tx.clone();
        self.producer = Some(tokio::spawn(run_producer(source, generation, events_tx)));
        self.mode = mode;
        debug!(mode = ?mode, generation, "tracking started");
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
    }
}

async fn run_producer(
    mut source: Box<dyn PositionSource>,
    generation: u64,
    events_tx: mpsc::UnboundedSender<TrackerEvent>,
) {
    loop {
        match source.next_fix().await {
            Ok(Some(fix)) => {
                if events_tx.send(TrackerEvent::Fix { generation, fix }).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(error) => {
                warn!(error = %error, generation, "position acquisition failed");
                let _ = events_tx.send(TrackerEvent::Failed { generation, error });
                break;
            }
        }
    }
}
