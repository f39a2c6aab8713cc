//! Cooperative cancellation for commit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Polled by `Changeset::commit` before it starts and before each event.
pub trait CancellationSignal {
    fn is_cancelled(&self) -> bool;
}

/// A signal that never fires.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NeverCancel;

impl CancellationSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl CancellationSignal for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

impl<T: CancellationSignal + ?Sized> CancellationSignal for Arc<T> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

impl<T: CancellationSignal + ?Sized> CancellationSignal for &T {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}
