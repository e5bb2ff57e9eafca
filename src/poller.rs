use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, select, Sender};
use parking_lot::Mutex;

use crate::tracker::Session;

/// Called with every tick error; the poller swallows the error and keeps
/// ticking either way.
pub type ErrorHook = Box<dyn Fn(&anyhow::Error) + Send>;

/// Drives `Session::tick` on a fixed interval until stopped. Teardown is
/// explicit: `shutdown` (or drop) stops the timer and joins the worker.
pub struct Poller {
    stop: Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Poller {
    pub fn start(session: Arc<Mutex<Session>>, interval: Duration, on_error: ErrorHook) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticks = crossbeam_channel::tick(interval);

        let handle = thread::spawn(move || loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(ticks) -> msg => {
                    if msg.is_err() {
                        break;
                    }
                    if let Err(err) = session.lock().tick() {
                        on_error(&err);
                    }
                }
            }
        });

        Self {
            stop: stop_tx,
            handle: Some(handle),
        }
    }

    pub fn shutdown(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
