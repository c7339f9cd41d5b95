//! Background reclamation
//!
//! Each cache instance owns at most one [`Sweeper`]: a named thread that runs
//! the sweep body on a fixed period until it is stopped. Stopping disconnects
//! the shutdown channel and joins the thread, so once [`Sweeper::stop`]
//! returns the body is not running and will never run again.

use crate::errors::{CacheError, Result};
use crossbeam::channel::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to a periodic sweep thread
#[derive(Debug)]
pub struct Sweeper {
    name: String,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Run `sweep` every `interval` on a dedicated thread.
    ///
    /// Returns `Ok(None)` for a zero interval, which disables background
    /// sweeping (useful for tests that drive the sweep by hand).
    pub fn spawn<F>(name: &str, interval: Duration, mut sweep: F) -> Result<Option<Self>>
    where
        F: FnMut() + Send + 'static,
    {
        if interval.is_zero() {
            return Ok(None);
        }

        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);
        let ticker = channel::tick(interval);

        let handle = thread::Builder::new()
            .name(format!("{name}-sweeper"))
            .spawn(move || loop {
                crossbeam::select! {
                    recv(shutdown_rx) -> _ => break,
                    recv(ticker) -> _ => sweep(),
                }
            })
            .map_err(|source| CacheError::Background {
                name: name.to_string(),
                source,
            })?;

        tracing::debug!("Started {} sweeper every {:?}", name, interval);

        Ok(Some(Self {
            name: name.to_string(),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }))
    }

    /// Stop the thread and wait for an in-flight sweep to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender wakes the `recv(shutdown_rx)` arm
        drop(self.shutdown.take());

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("{} sweeper panicked", self.name);
            } else {
                tracing::debug!("Stopped {} sweeper", self.name);
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
