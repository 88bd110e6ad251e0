//! Process-wide signal bookkeeping.
//!
//! The only state shared with the handler is an atomic flag; everything else
//! is plain `sigaction` setup and restore.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
    // Only async-signal-safe calls here.
    unsafe {
        libc::write(libc::STDERR_FILENO, b"\n".as_ptr().cast(), 1);
    }
}

fn action(handler: SigHandler) -> SigAction {
    SigAction::new(handler, SaFlags::SA_RESTART, SigSet::empty())
}

/// Installs the prompt-time handlers: SIGINT sets the interrupt flag, SIGQUIT
/// is ignored.
pub fn install_interactive() -> nix::Result<()> {
    unsafe {
        sigaction(Signal::SIGINT, &action(SigHandler::Handler(on_interrupt)))?;
        sigaction(Signal::SIGQUIT, &action(SigHandler::SigIgn))?;
    }
    clear_interrupt();
    Ok(())
}

pub fn clear_interrupt() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Returns whether SIGINT arrived since the last call, clearing the flag.
pub fn take_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}

/// Restores default dispositions. Called in every forked child before it
/// runs or execs anything. SIGPIPE is included because the Rust runtime
/// ignores it at startup and an ignored disposition survives `execve`.
pub fn reset_to_default() {
    for signal in [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGPIPE] {
        unsafe {
            let _ = sigaction(signal, &action(SigHandler::SigDfl));
        }
    }
}

/// Ignores SIGINT and SIGQUIT in the shell while a command runs; the previous
/// actions come back on drop.
pub struct IgnoreGuard {
    saved: [(Signal, SigAction); 2],
}

impl IgnoreGuard {
    pub fn enter() -> nix::Result<Self> {
        let ignore = action(SigHandler::SigIgn);
        let int = unsafe { sigaction(Signal::SIGINT, &ignore)? };
        let quit = match unsafe { sigaction(Signal::SIGQUIT, &ignore) } {
            Ok(old) => old,
            Err(e) => {
                unsafe {
                    let _ = sigaction(Signal::SIGINT, &int);
                }
                return Err(e);
            }
        };
        Ok(IgnoreGuard {
            saved: [(Signal::SIGINT, int), (Signal::SIGQUIT, quit)],
        })
    }
}

impl Drop for IgnoreGuard {
    fn drop(&mut self) {
        for (signal, old) in &self.saved {
            unsafe {
                let _ = sigaction(*signal, old);
            }
        }
    }
}
