//! Periodic background scans

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::scanner::LibraryScanner;
use crate::error::Result;

/// Runs a full scan every `interval`, at most `repeats` times.
///
/// A tick that finds a scan already running is skipped but still counts.
/// Dropping the handle stops the timer.
pub struct AutoScan {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<usize>>,
}

impl AutoScan {
    pub fn start(scanner: Arc<LibraryScanner>, interval: Duration, repeats: u32) -> Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("sheets-auto-scan".to_string())
            .spawn(move || {
                let mut scans = 0;
                for tick in 1..=repeats {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if scanner.is_scanning() {
                        tracing::debug!("Auto scan {}/{} skipped, scan in progress", tick, repeats);
                        continue;
                    }
                    tracing::debug!("Auto scan {}/{}", tick, repeats);
                    if scanner.full_scan().is_some() {
                        scans += 1;
                    }
                }
                scans
            })?;

        tracing::info!(
            "Auto scan enabled: every {:?}, {} time(s)",
            interval,
            repeats
        );
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stops the timer and returns the number of scans it ran
    pub fn stop(mut self) -> usize {
        self.shutdown()
    }

    /// Waits for the remaining ticks to run out
    pub fn join(mut self) -> usize {
        self.handle
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or(0)
    }

    fn shutdown(&mut self) -> usize {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.handle
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or(0)
    }
}

impl Drop for AutoScan {
    fn drop(&mut self) {
        self.shutdown();
    }
}
