//! Registry mapping device identifiers to live sessions.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::{Mutex, RwLock};

use crate::device::DeviceId;
use crate::session::TunerSession;

/// Shared handle to one registry entry.
///
/// Handles are transient: an operation clones one out of the registry,
/// locks it for the duration of a single driver call, and drops it. The
/// registry entry is the owning home of the session.
pub type SessionRef = Arc<Mutex<TunerSession>>;

/// The one structure shared across all calls: device identifier → session.
///
/// The map lock is held only for lookup/insert/remove, never across a
/// blocking driver call; each entry carries its own lock for that.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<DeviceId, SessionRef>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Return the session for `device_id`, creating it if absent.
    ///
    /// The factory runs only when a new entry is inserted, so creation-time
    /// effects (driver construction, accounting) happen exactly once per
    /// live identifier. Two concurrent callers never observe two distinct
    /// sessions for the same identifier.
    pub fn resolve_or_create<F>(&self, device_id: DeviceId, factory: F) -> SessionRef
    where
        F: FnOnce() -> TunerSession,
    {
        // Fast path: session already exists
        {
            let sessions = self.sessions.read();
            if let Some(session) = sessions.get(&device_id) {
                debug!("Reusing existing session for device {}", device_id);
                return Arc::clone(session);
            }
        }

        let mut sessions = self.sessions.write();

        // Double-check after acquiring write lock
        if let Some(session) = sessions.get(&device_id) {
            debug!("Reusing existing session for device {} (after lock)", device_id);
            return Arc::clone(session);
        }

        let session = Arc::new(Mutex::new(factory()));
        info!("Created new session for device {}", device_id);
        sessions.insert(device_id, Arc::clone(&session));
        session
    }

    /// Return the existing session for `device_id`, if any.
    ///
    /// Read-only; operations that must no-op on an unknown device go
    /// through here.
    pub fn lookup(&self, device_id: DeviceId) -> Option<SessionRef> {
        self.sessions.read().get(&device_id).cloned()
    }

    /// Remove the entry for `device_id` and release its driver.
    ///
    /// Idempotent: removing an absent identifier is a no-op. Returns
    /// whether an entry was removed. If another operation is in flight on
    /// the entry, the driver is released as soon as that operation's
    /// transient handle drops.
    pub fn remove_and_dispose(&self, device_id: DeviceId) -> bool {
        let removed = self.sessions.write().remove(&device_id);
        match removed {
            Some(_) => {
                info!("Removed session for device {}", device_id);
                true
            }
            None => {
                debug!("No session to remove for device {}", device_id);
                false
            }
        }
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{FilterKind, TunerDriver};
    use std::time::Duration;

    struct NullDriver;

    impl TunerDriver for NullDriver {
        fn tune(&mut self, _frequency: u32, _modulation: &str, _timeout: Duration) -> i32 {
            0
        }
        fn stop_tune(&mut self) {}
        fn add_pid_filter(&mut self, _pid: u16, _kind: FilterKind) {}
        fn close_all_pid_filters(&mut self) {}
        fn read_stream(&mut self, _buf: &mut [u8], _timeout: Duration) -> isize {
            0
        }
    }

    fn null_session(id: DeviceId) -> TunerSession {
        TunerSession::new(id, Box::new(NullDriver))
    }

    #[test]
    fn test_resolve_is_identity_stable() {
        let registry = SessionRegistry::new();
        let id = DeviceId::new(1);

        let first = registry.resolve_or_create(id, || null_session(id));
        let second = registry.resolve_or_create(id, || null_session(id));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_factory_runs_once_per_identifier() {
        let registry = SessionRegistry::new();
        let id = DeviceId::new(2);
        let mut created = 0;

        registry.resolve_or_create(id, || {
            created += 1;
            null_session(id)
        });
        registry.resolve_or_create(id, || {
            created += 1;
            null_session(id)
        });

        assert_eq!(created, 1);
    }

    #[test]
    fn test_lookup_unknown_is_none() {
        let registry = SessionRegistry::new();
        assert!(registry.lookup(DeviceId::new(42)).is_none());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = SessionRegistry::new();
        let id = DeviceId::new(3);
        registry.resolve_or_create(id, || null_session(id));

        assert!(registry.remove_and_dispose(id));
        assert!(!registry.remove_and_dispose(id));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_remove_then_resolve_creates_fresh_entry() {
        let registry = SessionRegistry::new();
        let id = DeviceId::new(4);

        let first = registry.resolve_or_create(id, || null_session(id));
        registry.remove_and_dispose(id);
        let second = registry.resolve_or_create(id, || null_session(id));

        assert!(!Arc::ptr_eq(&first, &second));
    }
}
