// Copyright (c) 2024 The vk-command developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Synchronization primitives threaded through queue submission.
//!
//! Semaphores order work across queue submissions, but whether a given submission
//! actually waits on or signals a given semaphore is decided late: several command
//! buffers racing to submit may reference the same semaphore, and it must be signaled
//! by exactly one of them and waited on by exactly one of them. [`SemaphoreAccess`]
//! carries that bookkeeping, and [`SubmitLock`] is the shared lock every submitter
//! must hold while making the decision.

use crate::resource::Resource;
use ash::vk;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether a queue submission should block until the device has finished executing it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyncQueue {
    /// Return as soon as the work is submitted.
    Skip,
    /// Block on the submission's fence before returning. A fence wait timeout is a
    /// fatal device error.
    Force,
}

/// A semaphore participating in queue submission, with conditional-participation
/// bookkeeping.
///
/// The `should_*` predicates and `mark_as_*` mutators must only be called while the
/// process-wide [`SubmitLock`] is held; the lock is what keeps two threads racing to
/// submit from both deciding to signal or wait on the same semaphore. Marking is
/// idempotent and is applied to every semaphore passed to a submission, even those
/// whose predicate was false at submit time.
#[derive(Debug)]
pub struct SemaphoreAccess {
    semaphore: vk::Semaphore,
    signaled: AtomicBool,
    waited: AtomicBool,
}

impl SemaphoreAccess {
    /// Wraps a semaphore handle. The handle's lifetime is managed by the caller; the
    /// command buffers that track this object only extend the lifetime of the wrapper.
    #[inline]
    pub fn new(semaphore: vk::Semaphore) -> SemaphoreAccess {
        SemaphoreAccess {
            semaphore,
            signaled: AtomicBool::new(false),
            waited: AtomicBool::new(false),
        }
    }

    /// Returns the raw semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// Returns true if no submission has signaled this semaphore yet.
    ///
    /// Must be called with the [`SubmitLock`] held.
    #[inline]
    pub fn should_signal(&self) -> bool {
        !self.signaled.load(Ordering::Relaxed)
    }

    /// Returns true if no submission has waited on this semaphore yet.
    ///
    /// Must be called with the [`SubmitLock`] held.
    #[inline]
    pub fn should_wait(&self) -> bool {
        !self.waited.load(Ordering::Relaxed)
    }

    /// Marks the semaphore as signaled. Idempotent.
    ///
    /// Must be called with the [`SubmitLock`] held.
    #[inline]
    pub fn mark_as_signaled(&self) {
        self.signaled.store(true, Ordering::Relaxed);
    }

    /// Marks the semaphore as waited on. Idempotent.
    ///
    /// Must be called with the [`SubmitLock`] held.
    #[inline]
    pub fn mark_as_waited(&self) {
        self.waited.store(true, Ordering::Relaxed);
    }
}

impl Resource for SemaphoreAccess {}

/// The process-wide lock serializing semaphore participation decisions across all
/// submitters.
///
/// One instance is shared by every thread that submits command buffers touching the
/// same pool of semaphores. The lock is held only around the decide-and-mark step of
/// [`submit_to_queue`], not around the native submit call itself.
///
/// [`submit_to_queue`]: crate::command_buffer::PrimaryCommandBuffer::submit_to_queue
#[derive(Debug, Default)]
pub struct SubmitLock {
    inner: Mutex<()>,
}

impl SubmitLock {
    /// Creates a new lock.
    #[inline]
    pub fn new() -> SubmitLock {
        SubmitLock::default()
    }

    /// Acquires the lock.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.inner.lock()
    }
}
