// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Who currently owns a graphics-shared resource.
//!
//! A resource shared with the graphics API belongs to graphics until compute acquires
//! it, and goes back when compute releases it. The state lives in one atomic so that
//! kernel arguments bound to the resource can see it at dispatch time.
//!
//! States:
//! - `UNSHARED`: graphics owns it; compute may not touch it
//! - `ACQUIRING`: an acquire has been issued and not yet returned
//! - `ACQUIRED`: compute owns it
//! - `RELEASING`: a release has been issued and not yet returned
//!
//! The transitional states make a second acquire (or release) that races the first fail
//! as a protocol violation instead of reaching the runtime.

use crate::error::Violation;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

const UNSHARED: u8 = 0;
const ACQUIRING: u8 = 1;
const ACQUIRED: u8 = 2;
const RELEASING: u8 = 3;

/// Observable ownership of a graphics-shared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Owned by the graphics API.
    Unshared,
    /// Owned by compute.
    Acquired,
}

#[derive(Clone)]
pub(crate) struct Ownership {
    state: Arc<AtomicU8>,
}

impl Debug for Ownership {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = match self.state.load(Ordering::Relaxed) {
            UNSHARED => "UNSHARED",
            ACQUIRING => "ACQUIRING",
            ACQUIRED => "ACQUIRED",
            RELEASING => "RELEASING",
            _ => "UNKNOWN",
        };
        write!(f, "Ownership {{ state: {state} }}")
    }
}

impl Ownership {
    pub(crate) fn new() -> Self {
        Ownership {
            state: Arc::new(AtomicU8::new(UNSHARED)),
        }
    }

    /// Transitional states report as the state they started from.
    pub(crate) fn access(&self) -> Access {
        match self.state.load(Ordering::Acquire) {
            ACQUIRED | RELEASING => Access::Acquired,
            _ => Access::Unshared,
        }
    }

    pub(crate) fn is_acquired(&self) -> bool {
        self.state.load(Ordering::Acquire) == ACQUIRED
    }

    /// Runs `native` as the `UNSHARED -> ACQUIRED` transition.
    ///
    /// If `native` fails the state is restored to `UNSHARED`.
    pub(crate) fn acquire<E>(
        &self,
        native: impl FnOnce() -> Result<(), E>,
    ) -> Result<Result<(), E>, Violation> {
        self.transition(UNSHARED, ACQUIRING, ACQUIRED, Violation::AlreadyAcquired, native)
    }

    /// Runs `native` as the `ACQUIRED -> UNSHARED` transition.
    ///
    /// If `native` fails the state is restored to `ACQUIRED`.
    pub(crate) fn release<E>(
        &self,
        native: impl FnOnce() -> Result<(), E>,
    ) -> Result<Result<(), E>, Violation> {
        self.transition(ACQUIRED, RELEASING, UNSHARED, Violation::NotAcquired, native)
    }

    fn transition<E>(
        &self,
        from: u8,
        during: u8,
        to: u8,
        violation: Violation,
        native: impl FnOnce() -> Result<(), E>,
    ) -> Result<Result<(), E>, Violation> {
        self.state
            .compare_exchange(from, during, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| violation)?;
        let result = native();
        let settled = if result.is_ok() { to } else { from };
        self.state.store(settled, Ordering::Release);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_cycle() {
        let o = Ownership::new();
        assert_eq!(o.access(), Access::Unshared);
        assert_eq!(o.acquire(|| Ok::<_, ()>(())), Ok(Ok(())));
        assert!(o.is_acquired());
        assert_eq!(o.acquire(|| Ok::<_, ()>(())), Err(Violation::AlreadyAcquired));
        assert_eq!(o.release(|| Ok::<_, ()>(())), Ok(Ok(())));
        assert_eq!(o.release(|| Ok::<_, ()>(())), Err(Violation::NotAcquired));
    }

    #[test]
    fn failed_native_call_restores_state() {
        let o = Ownership::new();
        assert_eq!(o.acquire(|| Err(7)), Ok(Err(7)));
        assert_eq!(o.access(), Access::Unshared);
        o.acquire(|| Ok::<_, ()>(())).unwrap().unwrap();
        assert_eq!(o.release(|| Err(9)), Ok(Err(9)));
        assert_eq!(o.access(), Access::Acquired);
    }

    #[test]
    fn violation_does_not_run_native_call() {
        let o = Ownership::new();
        let r = o.release(|| -> Result<(), ()> { panic!("reached the runtime") });
        assert_eq!(r, Err(Violation::NotAcquired));
    }

    #[test]
    fn clones_share_state() {
        let o = Ownership::new();
        let bound = o.clone();
        o.acquire(|| Ok::<_, ()>(())).unwrap().unwrap();
        assert!(bound.is_acquired());
        assert!(format!("{bound:?}").contains("ACQUIRED"));
    }
}
