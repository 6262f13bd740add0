use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dolls_runtime::CancelToken;
use log::debug;

/// Trips a [`CancelToken`] from a background thread once a timeout elapses.
pub struct Watchdog {
    disarm: Sender<()>,
    handle: JoinHandle<bool>,
}

impl Watchdog {
    pub fn arm(token: CancelToken, timeout: Duration) -> Self {
        let (disarm, disarmed) = mpsc::channel();
        let handle = thread::spawn(move || match disarmed.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                debug!("timeout of {:?} elapsed, cancelling", timeout);
                token.cancel();
                true
            }
            _ => false,
        });
        Self { disarm, handle }
    }

    /// Stops the watchdog. Returns `true` if it had already fired.
    pub fn disarm(self) -> bool {
        // the thread may have exited already, then the send fails
        let _ = self.disarm.send(());
        self.handle.join().unwrap_or(false)
    }
}
