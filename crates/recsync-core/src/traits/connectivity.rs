//! Connectivity capability.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the remote service is currently reachable.
pub trait Connectivity: Send + Sync {
    /// Returns true if network connectivity is available.
    fn is_available(&self) -> bool;
}

/// A connectivity flag flipped by the host application.
///
/// Clones share the same flag.
///
/// # Example
///
/// ```
/// use recsync_core::{Connectivity, ManualConnectivity};
///
/// let connectivity = ManualConnectivity::online();
/// let observer = connectivity.clone();
/// connectivity.set_available(false);
/// assert!(!observer.is_available());
/// ```
#[derive(Debug, Clone)]
pub struct ManualConnectivity(Arc<AtomicBool>);

impl ManualConnectivity {
    /// A flag that starts connected.
    pub fn online() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// A flag that starts disconnected.
    pub fn offline() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Update the flag.
    pub fn set_available(&self, available: bool) {
        self.0.store(available, Ordering::SeqCst);
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::online()
    }
}

impl Connectivity for ManualConnectivity {
    fn is_available(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl<T: Connectivity + ?Sized> Connectivity for Arc<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}
