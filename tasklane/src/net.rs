//! Connectivity signal for the UI layer.
//!
//! The UI consults [`NetworkStatus`] to decide whether to allow or disable
//! submission. The mutation engine is deliberately independent of this
//! signal: connectivity loss surfaces as an ordinary transient transport
//! failure with the same retry and rollback behavior.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared online/offline flag.
///
/// Cheap to clone; all clones observe the same flag. Whatever platform
/// integration detects connectivity changes calls [`set_online`]
/// (`Self::set_online`), and UI code polls [`is_online`](Self::is_online).
#[derive(Debug, Clone)]
pub struct NetworkStatus {
    online: Arc<AtomicBool>,
}

impl NetworkStatus {
    /// Creates a status handle with the given initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    /// Whether the device currently appears to be online.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Records a connectivity change.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::new(true)
    }
}
