//! Live sessions keyed by target and platform.

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use log::{debug, info};

use crate::{
    session::{analysis::AnalysisSession, target::SessionKey},
    Result,
};

/// Concurrent map of open sessions.
///
/// A key maps to at most one session. Invalidated sessions are replaced on the next lookup
/// and disposed once the last request holding them finishes.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, Arc<AnalysisSession>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        SessionRegistry {
            sessions: DashMap::new(),
        }
    }

    /// The session for `key`, opening a fresh one when none exists or the existing one has
    /// been invalidated.
    ///
    /// # Errors
    /// As [`AnalysisSession::open`].
    pub fn get_or_open(&self, key: &SessionKey) -> Result<Arc<AnalysisSession>> {
        if let Some(session) = self.sessions.get(key) {
            if !session.is_invalidated() {
                return Ok(Arc::clone(session.value()));
            }
        }

        if let Some((_, stale)) = self
            .sessions
            .remove_if(key, |_, session| session.is_invalidated())
        {
            stale.stop_watching();
            info!(
                "Replacing invalidated session {} for {:?}",
                stale.generation(),
                key.target
            );
        }

        // Opened outside the map so the shard lock is not held across the copy
        let opened = Arc::new(AnalysisSession::open(key.clone())?);
        let (session, unused) = match self.sessions.entry(key.clone()) {
            Entry::Occupied(existing) if !existing.get().is_invalidated() => {
                (Arc::clone(existing.get()), Some(opened))
            }
            Entry::Occupied(mut existing) => {
                let stale = existing.insert(Arc::clone(&opened));
                stale.stop_watching();
                (opened, None)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&opened));
                (opened, None)
            }
        };

        if let Some(unused) = unused {
            debug!(
                "Discarding session {}, another request opened {} first",
                unused.generation(),
                session.generation()
            );
        }
        Ok(session)
    }

    /// Drop the registry's handle on the session for `key`.
    pub fn remove(&self, key: &SessionKey) -> Option<Arc<AnalysisSession>> {
        self.sessions.remove(key).map(|(_, session)| session)
    }

    /// Remove every invalidated session, returning how many were removed.
    pub fn purge_invalidated(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| {
            if session.is_invalidated() {
                session.stop_watching();
                return false;
            }
            true
        });
        before.saturating_sub(self.sessions.len())
    }

    /// Drop every session.
    pub fn clear(&self) {
        self.sessions.clear();
    }

    /// Keys of the registered sessions.
    #[must_use]
    pub fn keys(&self) -> Vec<SessionKey> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// `true` when no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{
        layout::Platform,
        session::target::AnalysisTarget,
        test::{element, write_assembly, FieldSpec, ImageBuilder, TypeSpecBuilder},
    };

    fn output() -> tempfile::TempDir {
        let output = tempfile::tempdir().unwrap();
        write_assembly(
            output.path(),
            "Sample",
            &ImageBuilder::new().assembly("Sample").type_def(
                TypeSpecBuilder::value_type("Sample", "Pair")
                    .sequential()
                    .field(FieldSpec::public("A", &[element::U1]))
                    .field(FieldSpec::public("B", &[element::I])),
            ),
        );
        output
    }

    fn key(directory: &Path, platform: Platform) -> SessionKey {
        SessionKey::new(AnalysisTarget::Assembly(directory.to_path_buf()), platform)
    }

    #[test]
    fn reuse_until_invalidated() {
        let output = output();
        let registry = SessionRegistry::new();
        let key = key(output.path(), Platform::X64);

        let first = registry.get_or_open(&key).unwrap();
        let again = registry.get_or_open(&key).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(registry.len(), 1);

        first.invalidate();
        let replaced = registry.get_or_open(&key).unwrap();
        assert!(!first.is_watching());
        assert!(replaced.is_watching());
        assert!(!Arc::ptr_eq(&first, &replaced));
        assert!(replaced.generation() > first.generation());
        assert_eq!(registry.len(), 1);

        // The old session stays usable for requests still holding it
        assert!(first.load_and_analyze("Sample", "Sample.Pair").unwrap().is_some());

        let context = first.context_handle();
        drop((first, again));
        assert!(context.upgrade().is_none());
    }

    #[test]
    fn platforms_are_separate_sessions() {
        let output = output();
        let registry = SessionRegistry::new();

        let x64 = registry.get_or_open(&key(output.path(), Platform::X64)).unwrap();
        let x86 = registry.get_or_open(&key(output.path(), Platform::X86)).unwrap();
        assert!(!Arc::ptr_eq(&x64, &x86));
        assert_eq!(registry.len(), 2);

        let layout = x86.load_and_analyze("Sample", "Sample.Pair").unwrap().unwrap();
        assert_eq!(layout.total_size, 8);
        let layout = x64.load_and_analyze("Sample", "Sample.Pair").unwrap().unwrap();
        assert_eq!(layout.total_size, 16);
    }

    #[test]
    fn concurrent_opens_share_one_session() {
        let output = output();
        let registry = SessionRegistry::new();
        let key = key(output.path(), Platform::X64);

        let sessions: Vec<Arc<AnalysisSession>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| registry.get_or_open(&key).unwrap()))
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(registry.len(), 1);
        let registered = registry.get_or_open(&key).unwrap();
        assert!(sessions.iter().all(|session| Arc::ptr_eq(session, &registered)));
    }

    #[test]
    fn purge_and_clear() {
        let output = output();
        let registry = SessionRegistry::new();

        let x64 = registry.get_or_open(&key(output.path(), Platform::X64)).unwrap();
        registry.get_or_open(&key(output.path(), Platform::Arm64)).unwrap();
        x64.invalidate();

        assert_eq!(registry.purge_invalidated(), 1);
        assert!(!x64.is_watching());
        assert_eq!(registry.keys(), vec![key(output.path(), Platform::Arm64)]);

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.get_or_open(&key(&output.path().join("missing"), Platform::X64)).is_err());
        assert!(registry.is_empty());
    }
}
