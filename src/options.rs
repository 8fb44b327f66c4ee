use std::sync::atomic::{AtomicBool, Ordering};

/// Runtime toggles shared across REPL command invocations.
///
/// Passed by reference into the dispatcher and both execution paths instead
/// of living as process globals. Atomics because the REPL thread that flips a
/// toggle and the dispatch reading it could in principle run concurrently.
#[derive(Debug, Default)]
pub struct RuntimeOptions {
    dry_run: AtomicBool,
    debug: AtomicBool,
}

impl RuntimeOptions {
    pub fn new(dry_run: bool, debug: bool) -> Self {
        Self {
            dry_run: AtomicBool::new(dry_run),
            debug: AtomicBool::new(debug),
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run.load(Ordering::Relaxed)
    }

    pub fn set_dry_run(&self, on: bool) {
        self.dry_run.store(on, Ordering::Relaxed);
    }

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::Relaxed);
    }
}
