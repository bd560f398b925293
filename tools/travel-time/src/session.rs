//! Router session: the single owner of the routing engine handle
//!
//! The engine handle is not reentrant, so one coarse lock serializes every
//! load, reload, route, locate, raw request and matrix initialization.
//! Calls block until the engine answers. A pool of handles would lift this
//! once the engine is known to tolerate several instances per process.
//!
//! At most one handle exists at a time: a load for a different config
//! releases the old handle before constructing the new one.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{info, warn};
use travel_time_common::{Error, Result};

use crate::engine::{EngineLoader, Router};

/// What happens when a reload fails after the old handle was released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadPolicy {
    /// Stay unloaded
    #[default]
    Discard,
    /// Reconstruct the previous config's handle, still returning the error
    Restore,
}

/// Result of a successful [`RouterSession::load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// First handle for this session
    Loaded,
    /// Same config already loaded; nothing happened
    AlreadyLoaded,
    /// A handle for a different config was replaced
    Reloaded,
}

struct LoadedRouter<R> {
    config_path: PathBuf,
    router: R,
    generation: u64,
}

struct SessionState<R> {
    loaded: Option<LoadedRouter<R>>,
    generations: u64,
}

impl<R> SessionState<R> {
    fn install(&mut self, config_path: PathBuf, router: R) -> u64 {
        self.generations += 1;
        self.loaded = Some(LoadedRouter {
            config_path,
            router,
            generation: self.generations,
        });
        self.generations
    }
}

pub struct RouterSession<L: EngineLoader> {
    loader: L,
    policy: ReloadPolicy,
    state: Mutex<SessionState<L::Router>>,
}

impl<L: EngineLoader> RouterSession<L> {
    pub fn new(loader: L) -> Self {
        Self::with_policy(loader, ReloadPolicy::default())
    }

    pub fn with_policy(loader: L, policy: ReloadPolicy) -> Self {
        Self {
            loader,
            policy,
            state: Mutex::new(SessionState {
                loaded: None,
                generations: 0,
            }),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn policy(&self) -> ReloadPolicy {
        self.policy
    }

    /// Load the engine for `config_path`.
    ///
    /// Same path as the current handle: no-op. Different path: the old
    /// handle is released first, then the new one is constructed. On
    /// failure the session is left unloaded (or restored, per policy) and
    /// the engine's error is returned.
    pub fn load(&self, config_path: impl AsRef<Path>) -> Result<LoadOutcome> {
        let config_path = config_path.as_ref();
        let mut state = self.state.lock();

        if let Some(current) = &state.loaded {
            if current.config_path == config_path {
                return Ok(LoadOutcome::AlreadyLoaded);
            }
        }

        let previous = state.loaded.take().map(|old| {
            info!(
                path = %old.config_path.display(),
                generation = old.generation,
                "Releasing routing engine"
            );
            old.config_path
        });

        match self.loader.load(config_path) {
            Ok(router) => {
                let generation = state.install(config_path.to_path_buf(), router);
                info!(path = %config_path.display(), generation, "Routing engine loaded");
                Ok(if previous.is_some() {
                    LoadOutcome::Reloaded
                } else {
                    LoadOutcome::Loaded
                })
            }
            Err(err) => {
                warn!(path = %config_path.display(), error = %err, "Failed to load routing engine");
                if let (ReloadPolicy::Restore, Some(previous)) = (self.policy, previous) {
                    match self.loader.load(&previous) {
                        Ok(router) => {
                            let generation = state.install(previous.clone(), router);
                            info!(
                                path = %previous.display(),
                                generation,
                                "Restored previous routing engine"
                            );
                        }
                        Err(restore_err) => warn!(
                            path = %previous.display(),
                            error = %restore_err,
                            "Failed to restore previous routing engine"
                        ),
                    }
                }
                Err(err)
            }
        }
    }

    /// True iff a handle is set and the engine reports ready
    pub fn is_ready(&self) -> bool {
        self.state
            .lock()
            .loaded
            .as_ref()
            .is_some_and(|current| current.router.is_ready())
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        self.state
            .lock()
            .loaded
            .as_ref()
            .map(|current| current.config_path.clone())
    }

    /// Identity of the current handle; increases with every construction
    pub fn generation(&self) -> Option<u64> {
        self.state.lock().loaded.as_ref().map(|current| current.generation)
    }

    /// Release the handle. Returns false if nothing was loaded.
    pub fn unload(&self) -> bool {
        let released = self.state.lock().loaded.take();
        if let Some(old) = &released {
            info!(
                path = %old.config_path.display(),
                generation = old.generation,
                "Routing engine unloaded"
            );
        }
        released.is_some()
    }

    /// Run `f` with exclusive access to a ready handle.
    ///
    /// The session lock is held for the duration of `f`.
    pub fn with_router<T>(&self, f: impl FnOnce(&mut L::Router) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();
        match state.loaded.as_mut() {
            Some(current) if current.router.is_ready() => f(&mut current.router),
            _ => Err(Error::EngineNotLoaded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;

    #[test]
    fn test_same_path_is_noop() {
        let engine = MockEngine::new();
        let session = RouterSession::new(engine.clone());

        assert_eq!(session.load("a.json").unwrap(), LoadOutcome::Loaded);
        assert_eq!(session.generation(), Some(1));
        assert_eq!(session.load("a.json").unwrap(), LoadOutcome::AlreadyLoaded);
        assert_eq!(session.generation(), Some(1));
        assert_eq!(engine.loads(), 1);
    }

    #[test]
    fn test_reload_releases_first() {
        let engine = MockEngine::new();
        let session = RouterSession::new(engine.clone());
        session.load("a.json").unwrap();

        assert_eq!(session.load("b.json").unwrap(), LoadOutcome::Reloaded);
        assert_eq!(session.generation(), Some(2));
        assert_eq!(session.config_path(), Some(PathBuf::from("b.json")));
        assert_eq!(engine.releases(), 1);
        assert_eq!(engine.live_handles(), 1);
    }

    #[test]
    fn test_failed_reload_discards() {
        let engine = MockEngine::new();
        engine.fail_path("bad.json");
        let session = RouterSession::new(engine.clone());
        session.load("a.json").unwrap();

        let err = session.load("bad.json").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(!session.is_ready());
        assert_eq!(session.config_path(), None);
        assert_eq!(engine.live_handles(), 0);
    }

    #[test]
    fn test_failed_reload_restores() {
        let engine = MockEngine::new();
        engine.fail_path("bad.json");
        let session = RouterSession::with_policy(engine.clone(), ReloadPolicy::Restore);
        session.load("a.json").unwrap();

        assert!(session.load("bad.json").is_err());
        assert!(session.is_ready());
        assert_eq!(session.config_path(), Some(PathBuf::from("a.json")));
        // restored handle is a fresh construction
        assert_eq!(session.generation(), Some(2));
        assert_eq!(engine.loads(), 2);
        assert_eq!(engine.live_handles(), 1);
    }

    #[test]
    fn test_with_router_requires_ready() {
        let engine = MockEngine::new();
        let session = RouterSession::new(engine.clone());
        let err = session.with_router(|_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::EngineNotLoaded));

        session.load("a.json").unwrap();
        engine.set_ready(false);
        assert!(!session.is_ready());
        assert!(matches!(
            session.with_router(|_| Ok(())).unwrap_err(),
            Error::EngineNotLoaded
        ));

        engine.set_ready(true);
        assert_eq!(session.with_router(|r| Ok(r.handle())).unwrap(), 1);
    }

    #[test]
    fn test_unload() {
        let engine = MockEngine::new();
        let session = RouterSession::new(engine.clone());
        assert!(!session.unload());
        session.load("a.json").unwrap();
        assert!(session.unload());
        assert_eq!(engine.live_handles(), 0);
        assert_eq!(session.load("a.json").unwrap(), LoadOutcome::Loaded);
    }

    #[test]
    fn test_policy_from_str() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: ReloadPolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"restore\"").unwrap();
        assert_eq!(w.policy, ReloadPolicy::Restore);
    }

    #[test]
    fn test_session_is_shareable() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<RouterSession<MockEngine>>();
    }
}
