//! Background line reader
//!
//! Pulls newline-delimited text from an open device on the blocking pool and
//! hands each line to a consumer callback. Cancellation is cooperative: the
//! stop flag is checked before every read and the device's own read timeout
//! bounds how long an in-flight read can delay shutdown.

use super::error::{ReaderError, SessionError};
use super::transport::DeviceHandle;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Device shared between the session (writes, close) and its reader
pub type SharedDevice = Arc<Mutex<Box<dyn DeviceHandle>>>;

/// Wrap a freshly opened device for sharing
pub fn share(device: Box<dyn DeviceHandle>) -> SharedDevice {
    Arc::new(Mutex::new(device))
}

/// Reader timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Upper bound of a single blocking read
    pub read_timeout: Duration,
    /// Pause between reads
    pub poll_interval: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Handle to a running reader task
#[derive(Debug)]
pub struct LineReader {
    generation: u64,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl LineReader {
    /// Spawn a reader on `device`.
    ///
    /// `on_line` receives each line without its `\n`/`\r\n` delimiter, in the
    /// order read. `on_error` is called at most once, after which the loop has
    /// ended.
    pub fn start<L, E>(
        generation: u64,
        device: SharedDevice,
        config: ReaderConfig,
        on_line: L,
        on_error: E,
    ) -> Self
    where
        L: FnMut(String) + Send + 'static,
        E: FnOnce(ReaderError) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        debug!("Starting line reader #{}", generation);
        let handle = tokio::task::spawn_blocking(move || {
            read_loop(&device, config, &token, on_line, on_error);
            debug!("Line reader #{} exited", generation);
        });

        Self {
            generation,
            cancel,
            handle: Some(handle),
        }
    }

    /// Generation number this reader was started with
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Signal the loop to stop; does not wait
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether the loop has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the loop and wait until it has observably exited.
    ///
    /// After this returns no callback of this reader runs again.
    pub async fn join(mut self) -> Result<(), SessionError> {
        self.stop();
        if let Some(handle) = self.handle.take() {
            handle.await?;
        }
        Ok(())
    }
}

impl Drop for LineReader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn read_loop<L, E>(
    device: &SharedDevice,
    config: ReaderConfig,
    cancel: &CancellationToken,
    mut on_line: L,
    on_error: E,
) where
    L: FnMut(String),
    E: FnOnce(ReaderError),
{
    while !cancel.is_cancelled() {
        let result = device.lock().read_line(config.read_timeout);

        match result {
            Ok(bytes) if bytes.is_empty() => {}
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => on_line(strip_delimiter(text)),
                Err(e) => {
                    on_error(ReaderError::Decode(e));
                    return;
                }
            },
            Err(e) => {
                on_error(ReaderError::Io(e));
                return;
            }
        }

        std::thread::sleep(config.poll_interval);
    }
}

fn strip_delimiter(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}
