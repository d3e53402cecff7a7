//! Process-wide cumulative import time
//!
//! Every profiled load adds its duration to a `CumulativeTimer`. The total is
//! reported once, at process teardown, through a hook handed to a
//! `TeardownRegistry`. The registry is injectable so tests can fire the hook
//! themselves instead of waiting for process exit.

use crate::load_timer::IMPORT_LOG_TARGET;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once, OnceLock};
use std::time::Duration;

/// Hook run at teardown
pub type ExitHook = Box<dyn FnOnce() + Send>;

/// Somewhere to register work that runs when the process shuts down
pub trait TeardownRegistry: Send + Sync {
    fn register(&self, hook: ExitHook);
}

/// Running total of load time in nanoseconds
#[derive(Debug, Default)]
pub struct CumulativeTimer {
    total_ns: AtomicU64,
    loads: AtomicU64,
    hook_registered: AtomicBool,
}

impl CumulativeTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one load's duration
    pub fn add(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_ns(&self) -> u64 {
        self.total_ns.load(Ordering::Relaxed)
    }

    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }

    /// Number of loads added so far
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// `Total cumulative dynamic import() time: <ms>ms`
    pub fn report_line(&self) -> String {
        format!(
            "Total cumulative dynamic import() time: {:.3}ms",
            self.total_ms()
        )
    }

    /// Log the cumulative total and return the logged line
    pub fn report(&self) -> String {
        let line = self.report_line();
        tracing::info!(target: IMPORT_LOG_TARGET, loads = self.loads(), "{}", line);
        line
    }

    /// Register the exit report with `registry`, at most once per timer
    ///
    /// Returns true if this call performed the registration.
    pub fn ensure_exit_report(self: &Arc<Self>, registry: &dyn TeardownRegistry) -> bool {
        if self
            .hook_registered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let timer = Arc::clone(self);
        registry.register(Box::new(move || {
            timer.report();
        }));
        true
    }

    pub fn exit_report_registered(&self) -> bool {
        self.hook_registered.load(Ordering::Acquire)
    }
}

/// The process-wide timer used by default resolvers
pub fn global() -> &'static Arc<CumulativeTimer> {
    static GLOBAL: OnceLock<Arc<CumulativeTimer>> = OnceLock::new();
    GLOBAL.get_or_init(|| Arc::new(CumulativeTimer::new()))
}

/// Runs hooks from `atexit`, after `main` returns or `std::process::exit`
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

static EXIT_HOOKS: Mutex<Vec<ExitHook>> = Mutex::new(Vec::new());
static INSTALL_TRAMPOLINE: Once = Once::new();

extern "C" fn run_exit_hooks() {
    let hooks = match EXIT_HOOKS.lock() {
        Ok(mut hooks) => std::mem::take(&mut *hooks),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    };
    for hook in hooks {
        hook();
    }
}

impl TeardownRegistry for ProcessExit {
    fn register(&self, hook: ExitHook) {
        INSTALL_TRAMPOLINE.call_once(|| {
            // SAFETY: run_exit_hooks is a plain extern "C" fn that does not unwind
            let rc = unsafe { libc::atexit(run_exit_hooks) };
            if rc != 0 {
                tracing::warn!("atexit registration failed; cumulative report disabled");
            }
        });
        match EXIT_HOOKS.lock() {
            Ok(mut hooks) => hooks.push(hook),
            Err(poisoned) => poisoned.into_inner().push(hook),
        }
    }
}

/// Collects hooks so they can be fired by hand
#[derive(Default)]
pub struct ManualTeardown {
    hooks: Mutex<Vec<ExitHook>>,
}

impl ManualTeardown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.hooks.lock().map(|h| h.len()).unwrap_or(0)
    }

    /// Run and drop every registered hook
    pub fn run(&self) {
        let hooks = match self.hooks.lock() {
            Ok(mut hooks) => std::mem::take(&mut *hooks),
            Err(_) => return,
        };
        for hook in hooks {
            hook();
        }
    }
}

impl TeardownRegistry for ManualTeardown {
    fn register(&self, hook: ExitHook) {
        if let Ok(mut hooks) = self.hooks.lock() {
            hooks.push(hook);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_total_is_sum_of_durations() {
        let timer = CumulativeTimer::new();
        timer.add(Duration::from_micros(1500));
        timer.add(Duration::from_nanos(250));
        timer.add(Duration::from_millis(2));

        assert_eq!(timer.total_ns(), 1_500_000 + 250 + 2_000_000);
        assert_eq!(timer.loads(), 3);
    }

    #[test]
    fn test_report_line_three_decimals() {
        let timer = CumulativeTimer::new();
        timer.add(Duration::from_nanos(12_345_678));
        assert_eq!(
            timer.report_line(),
            "Total cumulative dynamic import() time: 12.346ms"
        );
    }

    #[test]
    fn test_empty_report() {
        let timer = CumulativeTimer::new();
        assert_eq!(
            timer.report(),
            "Total cumulative dynamic import() time: 0.000ms"
        );
    }

    #[test]
    fn test_exit_report_registers_once() {
        let timer = Arc::new(CumulativeTimer::new());
        let teardown = ManualTeardown::new();

        assert!(timer.ensure_exit_report(&teardown));
        assert!(!timer.ensure_exit_report(&teardown));
        assert!(!timer.ensure_exit_report(&teardown));

        assert!(timer.exit_report_registered());
        assert_eq!(teardown.pending(), 1);
    }

    #[test]
    fn test_manual_teardown_runs_hooks_once() {
        let teardown = ManualTeardown::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        teardown.register(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        teardown.run();
        teardown.run();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(teardown.pending(), 0);
    }

    #[test]
    fn test_concurrent_adds() {
        let timer = Arc::new(CumulativeTimer::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let timer = Arc::clone(&timer);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        timer.add(Duration::from_nanos(3));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(timer.total_ns(), 8 * 1000 * 3);
        assert_eq!(timer.loads(), 8000);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(global(), global()));
    }
}
