//! Termination signals as a flag the executor polls while a codec runs.
//!
//! Measured codecs live in their own process group, so a terminal's Ctrl-C never reaches them
//! directly. Instead the first SIGINT, SIGTERM or SIGQUIT raises the flag; the executor then
//! kills the codec's process group and the sweep unwinds, removing its scratch directory. A
//! second signal while the flag is still raised terminates immediately.

use signal_hook::consts::TERM_SIGNALS;
use signal_hook::flag;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit status used when a run stops because of a signal.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Shared "stop now" flag, raised by a termination signal or by [`Interrupt::raise`].
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Interrupt::default()
    }

    /// Registers the process-wide handlers for every termination signal.
    pub fn install() -> io::Result<Self> {
        let interrupt = Interrupt::new();
        for &signal in TERM_SIGNALS {
            // Registered first, so it sees the flag before this signal raises it.
            flag::register_conditional_shutdown(signal, EXIT_INTERRUPTED, Arc::clone(&interrupt.0))?;
            flag::register(signal, Arc::clone(&interrupt.0))?;
        }
        Ok(interrupt)
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
