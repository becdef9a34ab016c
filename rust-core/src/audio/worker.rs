//! Background worker lifecycle shared by capture, playback and decode
//!
//! A worker is a thread plus a running flag checked at the top of every loop
//! iteration. `stop()` clears the flag and joins, so no device I/O happens
//! after it returns. Workers never panic out; they report how they ended as
//! a [`LoopExit`].

use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::{AudioError, Result};

/// Terminal condition of a worker loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The caller cleared the running flag
    Stopped,
    /// Capture hit the recording duration cap
    DurationCap,
    /// A finite source ran out of samples
    EndOfStream,
    /// Repeated I/O failures
    DeviceFailed(String),
    /// The decoder failed or produced nothing
    NoData(String),
}

/// Flag handed to the loop body
#[derive(Clone)]
pub struct RunFlag(pub(crate) Arc<AtomicBool>);

impl RunFlag {
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owned handle on one background loop
pub struct Worker {
    name: &'static str,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    last_exit: Arc<Mutex<Option<LoopExit>>>,
}

impl Worker {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
            last_exit: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the loop on a new thread
    ///
    /// The body runs until it returns its exit reason. It should poll the
    /// [`RunFlag`] at the top of each iteration.
    pub fn spawn<F>(&mut self, body: F) -> Result<()>
    where
        F: FnOnce(RunFlag) -> LoopExit + Send + 'static,
    {
        // Reap a loop that already finished on its own
        self.join();

        self.running.store(true, Ordering::SeqCst);
        if let Ok(mut slot) = self.last_exit.lock() {
            *slot = None;
        }

        let flag = RunFlag(Arc::clone(&self.running));
        let running = Arc::clone(&self.running);
        let last_exit = Arc::clone(&self.last_exit);
        let name = self.name;

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let exit = body(flag);
                match &exit {
                    LoopExit::Stopped | LoopExit::DurationCap | LoopExit::EndOfStream => {
                        info!("{} loop exited: {:?}", name, exit)
                    }
                    LoopExit::DeviceFailed(_) | LoopExit::NoData(_) => {
                        warn!("{} loop exited: {:?}", name, exit)
                    }
                }
                if let Ok(mut slot) = last_exit.lock() {
                    *slot = Some(exit);
                }
                running.store(false, Ordering::SeqCst);
            });

        match handle {
            Ok(handle) => {
                self.thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(AudioError::DeviceUnavailable(format!("failed to spawn {} thread: {e}", self.name)))
            }
        }
    }

    /// Clear the running flag and wait for the loop to finish
    ///
    /// Safe to call repeatedly and when nothing is running.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// True while the loop thread has not exited
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// How the most recent loop ended, if it has ended
    pub fn last_exit(&self) -> Option<LoopExit> {
        self.last_exit.lock().ok().and_then(|slot| slot.clone())
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            // A loop stopping itself cannot join its own thread
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("{} thread panicked", self.name);
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}
