//! Background detach — fork once, then leave the invoking session.
//!
//! The parent returns immediately so the shell gets its prompt back;
//! the child keeps the loaded content and owns the selection until the
//! broker finishes.

use nix::unistd::{ForkResult, Pid, fork, setsid};

/// Detach errors.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("fork failed: {0}")]
    Fork(nix::Error),
    #[error("setsid failed: {0}")]
    Setsid(nix::Error),
}

/// Which side of the fork the caller is on.
#[derive(Debug)]
pub enum Role {
    /// The invoking process. Exits 0 right away.
    Parent { child: Pid },
    /// The detached worker, leader of a new session.
    Worker,
}

/// Fork and, in the child, start a new session.
///
/// Must be called before any thread or display connection exists:
/// the child inherits only the calling thread and every open fd.
pub fn detach() -> Result<Role, DaemonError> {
    // SAFETY: the process is single-threaded at this point, so the
    // child may run arbitrary code after fork.
    match unsafe { fork() }.map_err(DaemonError::Fork)? {
        ForkResult::Parent { child } => Ok(Role::Parent { child }),
        ForkResult::Child => {
            // Detach from the controlling terminal so the worker
            // outlives the invoking shell.
            setsid().map_err(DaemonError::Setsid)?;
            Ok(Role::Worker)
        }
    }
}
