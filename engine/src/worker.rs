use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::config::EngineConfig;
use crate::executor::{RunOutcome, run_script};
use crate::scratch::Scratch;
use crate::session::Store;

/// The single evaluation worker. Exactly one worker may serve a store; one
/// evaluation is in flight at a time, and it runs outside any lock.
pub struct Worker {
    store: Arc<Store>,
    scratch: Scratch,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(store: Arc<Store>, config: &EngineConfig) -> std::io::Result<Self> {
        let scratch = match &config.scratch_dir {
            Some(dir) => Scratch::new(dir)?,
            None => Scratch::in_temp_dir()?,
        };
        Ok(Worker {
            store,
            scratch,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    /// One poll tick: claim a pending request, evaluate it, commit the
    /// result. Returns true when a request was processed.
    ///
    /// A panic escaping the Script Executor is a bug, not a user error. It
    /// is caught here, logged, and committed as an internal failure, so
    /// the context never sticks in Calculating.
    pub fn tick(&self) -> bool {
        let Some(request) = self.store.claim() else {
            return false;
        };
        info!(
            module = request.module,
            selection = request.selection.is_some(),
            "claimed evaluation request"
        );

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            run_script(&request.text, request.selection.as_deref(), &self.scratch)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!("evaluation panicked: {}", message);
            RunOutcome {
                error: Some(format!("internal evaluation failure: {}", message)),
                displays: Vec::new(),
            }
        });

        self.store.commit(outcome.error, outcome.displays);
        info!(elapsed = ?started.elapsed(), "evaluation committed");
        true
    }

    /// Poll until `stop` is set, on the configured cadence. Nothing
    /// escaping a tick may kill the loop.
    pub fn run(&self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            std::thread::sleep(self.poll_interval);
            self.tick();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
