//! Concurrent mapping from client key to request window.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::key::ClientKey;
use super::policy::{Decision, Policy};
use super::window::Window;

/// Shared handle to one key's window. The mutex is the per-key exclusion.
pub type WindowHandle = Arc<Mutex<Window>>;

/// Owns every client's window and applies a single [`Policy`] to all of them.
///
/// The map only guards its own structure. Each window has its own lock, and
/// a key's handle is cloned out of the map before that lock is taken, so
/// requests for different keys never wait on each other's windows.
pub struct WindowStore<K = ClientKey> {
    windows: DashMap<K, WindowHandle>,
    policy: Policy,
}

impl<K> WindowStore<K>
where
    K: Eq + Hash + Clone + Display,
{
    pub fn new(policy: Policy) -> Self {
        Self {
            windows: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Return the window for `key`, creating it if the key is new.
    ///
    /// Concurrent callers racing on an unseen key all receive the same window.
    pub fn get_or_create(&self, key: &K, now: Instant) -> WindowHandle {
        if let Some(existing) = self.windows.get(key) {
            return Arc::clone(existing.value());
        }

        let entry = self.windows.entry(key.clone()).or_insert_with(|| {
            debug!(key = %key, "Creating new request window");
            Arc::new(Mutex::new(Window::new(now)))
        });
        Arc::clone(entry.value())
    }

    /// Decide whether a request from `key` arriving at `now` is admitted.
    pub fn evaluate(&self, key: &K, now: Instant) -> Decision {
        loop {
            let handle = self.get_or_create(key, now);
            {
                let mut window = handle.lock();
                if !window.is_evicted() {
                    let decision = window.admit(now, &self.policy);

                    trace!(
                        key = %key,
                        decision = %decision,
                        in_window = window.len(),
                        "Evaluated request"
                    );
                    if decision == Decision::Reject {
                        debug!(
                            key = %key,
                            limit = self.policy.max_requests(),
                            "Rate limit exceeded"
                        );
                    }
                    return decision;
                }
            }

            // The sweep removed this window after we looked it up. Drop it
            // from the map if it is somehow still there and start over.
            trace!(key = %key, "Window evicted during lookup, retrying");
            self.windows
                .remove_if(key, |_, current| Arc::ptr_eq(current, &handle));
        }
    }

    /// Evict every key whose window has been empty for at least `older_than`.
    ///
    /// Windows are pruned against `now` first. A window that is locked by a
    /// concurrent evaluation is in use and is left alone. Returns the number
    /// of evicted keys.
    pub fn sweep(&self, now: Instant, older_than: Duration) -> usize {
        let window_len = self.policy.window();
        let mut removed = 0;

        self.windows.retain(|key, handle| {
            let Some(mut window) = handle.try_lock() else {
                return true;
            };

            match window.idle_for(now, window_len) {
                Some(idle) if idle >= older_than => {
                    window.mark_evicted();
                    removed += 1;
                    trace!(
                        key = %key,
                        idle_ms = idle.as_millis() as u64,
                        "Evicting idle window"
                    );
                    false
                }
                _ => true,
            }
        });

        if removed > 0 {
            debug!(
                removed = removed,
                remaining = self.windows.len(),
                "Sweep evicted idle windows"
            );
        }
        removed
    }

    /// Number of timestamps currently held for `key`, without pruning.
    ///
    /// Returns `None` if the key has no window.
    pub fn request_count(&self, key: &K) -> Option<usize> {
        let handle = self.windows.get(key).map(|entry| Arc::clone(entry.value()))?;
        let count = handle.lock().len();
        Some(count)
    }

    /// Number of keys with a window.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drop every window.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.windows.retain(|_, handle| {
            handle.lock().mark_evicted();
            false
        });
    }
}
