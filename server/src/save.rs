//! Save coordination
//!
//! Saves are written on a background thread so the simulation never blocks
//! on disk I/O. While a save is in flight, further requests coalesce into a
//! single follow-up save that starts, with a fresh snapshot, as soon as the
//! current one finishes.

use log::{error, info, warn};
use shared::{Persistence, PersistenceError, Snapshot};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::runtime::{Handle, RuntimeFlavor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveRequest {
    /// A write started immediately.
    Started,
    /// A write was already running; one follow-up is now queued.
    Queued,
}

pub struct SaveCoordinator {
    store: Arc<dyn Persistence>,
    location: String,
    in_flight: Option<JoinHandle<Result<(), PersistenceError>>>,
    queued: bool,
    completed: u64,
}

impl SaveCoordinator {
    pub fn new(store: Arc<dyn Persistence>, location: impl Into<String>) -> Self {
        Self {
            store,
            location: location.into(),
            in_flight: None,
            queued: false,
            completed: 0,
        }
    }

    pub fn store(&self) -> &Arc<dyn Persistence> {
        &self.store
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Requests a save. The snapshot is only taken if a write starts now.
    pub fn request(&mut self, snapshot: impl FnOnce() -> Snapshot) -> SaveRequest {
        self.reap();
        if self.in_flight.is_some() {
            if !self.queued {
                info!("Save already in progress, queueing one follow-up");
            }
            self.queued = true;
            return SaveRequest::Queued;
        }
        self.start(snapshot());
        SaveRequest::Started
    }

    /// Called once per tick: collects a finished write and starts the queued one.
    pub fn poll(&mut self, snapshot: impl FnOnce() -> Snapshot) {
        self.reap();
        if self.in_flight.is_none() && self.queued {
            self.queued = false;
            self.start(snapshot());
        }
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn has_queued(&self) -> bool {
        self.queued
    }

    /// Number of writes that have finished, successfully or not.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Blocks until the in-flight write and any queued follow-up are done.
    pub fn flush(&mut self, snapshot: impl FnOnce() -> Snapshot) {
        self.wait();
        if self.queued {
            self.queued = false;
            self.start(snapshot());
            self.wait();
        }
    }

    fn start(&mut self, snapshot: Snapshot) {
        let store = Arc::clone(&self.store);
        let location = self.location.clone();
        let spawned = std::thread::Builder::new()
            .name("world-save".into())
            .spawn(move || store.save(&snapshot, &location));
        match spawned {
            Ok(handle) => self.in_flight = Some(handle),
            Err(e) => error!("Failed to start save thread: {}", e),
        }
    }

    fn reap(&mut self) {
        let finished = self
            .in_flight
            .as_ref()
            .map_or(false, |handle| handle.is_finished());
        if finished {
            self.wait();
        }
    }

    fn wait(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            self.completed += 1;
            match join_blocking(handle) {
                Ok(Ok(())) => info!("World saved to '{}'", self.location),
                Ok(Err(e)) => warn!("Save to '{}' failed: {}", self.location, e),
                Err(_) => error!("Save thread panicked"),
            }
        }
    }
}

/// Joins a save thread. On a multi-threaded runtime the worker is handed
/// back first so connection tasks keep running during the wait.
fn join_blocking<T>(handle: JoinHandle<T>) -> std::thread::Result<T> {
    match Handle::try_current() {
        Ok(runtime) if runtime.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.join())
        }
        _ => handle.join(),
    }
}
