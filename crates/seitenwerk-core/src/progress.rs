// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Progress reporting and cancellation for long-running operations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Result, SeitenwerkError};

type Callback = dyn Fn(f32) + Send + Sync;

/// Shared flag a caller flips to abandon an operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fractional progress channel handed to every long operation.
///
/// Fractions forwarded to the callback are clamped to [0, 1] and strictly
/// increasing. Once the token is cancelled the callback is never invoked
/// again, so abandoned work cannot touch caller state.
#[derive(Clone, Default)]
pub struct Progress {
    callback: Option<Arc<Callback>>,
    cancel: CancelToken,
    last: Arc<Mutex<Option<f32>>>,
}

impl Progress {
    /// A reporter that discards updates.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(callback: impl Fn(f32) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
            ..Self::default()
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Report `done` of `total` units complete.
    pub fn report(&self, done: usize, total: usize) {
        let fraction = if total == 0 {
            1.0
        } else {
            done as f32 / total as f32
        };
        self.report_fraction(fraction);
    }

    pub fn report_fraction(&self, fraction: f32) {
        if self.cancel.is_cancelled() {
            return;
        }
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        // Held across the callback so concurrent reporters stay ordered.
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if (*last).is_some_and(|previous| fraction <= previous) {
            return;
        }
        *last = Some(fraction);
        if let Some(callback) = &self.callback {
            callback(fraction);
        }
    }

    /// Bail out with [`SeitenwerkError::Cancelled`] if the caller gave up.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(SeitenwerkError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Child reporter mapping its own [0, 1] onto `[start, end]` of this one.
    pub fn scoped(&self, start: f32, end: f32) -> ScopedProgress<'_> {
        ScopedProgress {
            parent: self,
            start,
            end,
        }
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("has_callback", &self.callback.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Sub-range of a parent [`Progress`].
pub struct ScopedProgress<'a> {
    parent: &'a Progress,
    start: f32,
    end: f32,
}

impl ScopedProgress<'_> {
    pub fn report(&self, done: usize, total: usize) {
        let local = if total == 0 { 1.0 } else { done as f32 / total as f32 };
        self.parent
            .report_fraction(self.start + (self.end - self.start) * local);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (Progress, Arc<Mutex<Vec<f32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |f| sink.lock().unwrap().push(f));
        (progress, seen)
    }

    #[test]
    fn forwards_only_increasing_fractions() {
        let (progress, seen) = recording();
        progress.report(1, 4);
        progress.report(1, 4);
        progress.report(3, 4);
        progress.report(2, 4);
        progress.report(4, 4);
        assert_eq!(*seen.lock().unwrap(), vec![0.25, 0.75, 1.0]);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let (progress, seen) = recording();
        progress.report_fraction(7.0);
        assert_eq!(*seen.lock().unwrap(), vec![1.0]);
    }

    #[test]
    fn silent_after_cancellation() {
        let (progress, seen) = recording();
        let token = CancelToken::new();
        let progress = progress.with_cancel(token.clone());
        progress.report(1, 2);
        token.cancel();
        progress.report(2, 2);
        assert_eq!(*seen.lock().unwrap(), vec![0.5]);
        assert!(matches!(progress.checkpoint(), Err(SeitenwerkError::Cancelled)));
    }

    #[test]
    fn scoped_maps_into_parent_range() {
        let (progress, seen) = recording();
        let half = progress.scoped(0.5, 1.0);
        half.report(1, 2);
        assert_eq!(*seen.lock().unwrap(), vec![0.75]);
    }
}
