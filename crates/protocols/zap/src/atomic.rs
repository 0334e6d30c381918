//! Atomic sections
//!
//! Every public entry point runs inside one: the reentrancy guard is held for
//! the whole call and all collaborator state is checkpointed, then committed
//! on success or rolled back on any error.

use std::sync::atomic::{AtomicBool, Ordering};

use warp_core::{Result, StateJournal, ZapError};

/// Rejects a second entry while a call is in progress
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: AtomicBool,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard; released when the returned token drops
    pub fn enter(&self) -> Result<GuardToken<'_>> {
        if self
            .entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ZapError::Reentrant);
        }
        Ok(GuardToken { guard: self })
    }

    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

/// Proof the guard is held
#[derive(Debug)]
pub struct GuardToken<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.entered.store(false, Ordering::Release);
    }
}

/// A guarded, journaled unit of work
pub struct AtomicSection<'a> {
    journal: &'a dyn StateJournal,
    operation: &'static str,
    _token: GuardToken<'a>,
}

impl<'a> AtomicSection<'a> {
    /// Take the guard. Fails with [`ZapError::Reentrant`] before any state is
    /// touched if another call holds it.
    pub fn open(
        guard: &'a ReentrancyGuard,
        journal: &'a dyn StateJournal,
        operation: &'static str,
    ) -> Result<Self> {
        let token = guard.enter()?;
        Ok(Self {
            journal,
            operation,
            _token: token,
        })
    }

    /// Run `body` between a checkpoint and its commit or rollback
    pub fn run<T>(self, body: impl FnOnce() -> Result<T>) -> Result<T> {
        let checkpoint = self.journal.checkpoint();
        match body() {
            Ok(value) => {
                if let Err(e) = self.journal.commit(checkpoint) {
                    tracing::error!(operation = self.operation, error = %e, "commit failed");
                    if let Err(rb) = self.journal.rollback(checkpoint) {
                        tracing::error!(operation = self.operation, error = %rb, "rollback failed");
                    }
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(
                    operation = self.operation,
                    code = e.error_code(),
                    error = %e,
                    "rolling back"
                );
                if let Err(rb) = self.journal.rollback(checkpoint) {
                    tracing::error!(operation = self.operation, error = %rb, "rollback failed");
                }
                Err(e)
            }
        }
    }
}
