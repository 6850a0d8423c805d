//! Bridge provider: swappable construction of the host bridge
//!
//! New code should take an `Arc<dyn Bridge>` explicitly (see
//! [`BridgeClient`](crate::client::BridgeClient)). The provider exists for
//! call sites that cannot be handed one, and as the seam tests use to swap
//! in a mock.
//!
//! The provider builds its bridge lazily on the first `get_instance()` and
//! hands out the same `Arc` until `set_factory()` or `reset()` discards it.

use designer_bridge_interface::{Bridge, DetachedBridge};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};
use thiserror::Error;
use tracing::debug;

/// Factory function type for creating bridges
pub type BridgeFactory = Arc<dyn Fn() -> Arc<dyn Bridge> + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// `get_instance()` was called from inside the factory it would run
    #[error("Bridge provider re-entered while its factory was running")]
    Reentrant,

    /// The process-wide provider was already set up
    #[error("Global bridge provider is already installed")]
    AlreadyInstalled,
}

struct ProviderState {
    factory: BridgeFactory,
    instance: Option<Arc<dyn Bridge>>,
    /// Threads currently running the factory
    constructing: HashSet<ThreadId>,
    /// Bumped whenever the factory or instance is replaced
    generation: u64,
}

/// Lazily constructed, swappable bridge singleton
pub struct BridgeProvider {
    default_factory: BridgeFactory,
    state: Mutex<ProviderState>,
}

impl std::fmt::Debug for BridgeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("BridgeProvider")
            .field("constructed", &state.instance.is_some())
            .field("generation", &state.generation)
            .finish()
    }
}

impl BridgeProvider {
    /// Create a provider whose production factory is `default_factory`
    pub fn new(default_factory: BridgeFactory) -> Self {
        Self {
            state: Mutex::new(ProviderState {
                factory: default_factory.clone(),
                instance: None,
                constructing: HashSet::new(),
                generation: 0,
            }),
            default_factory,
        }
    }

    /// Provider over a bridge with no host attached
    pub fn detached() -> Self {
        Self::new(Arc::new(|| Arc::new(DetachedBridge) as Arc<dyn Bridge>))
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the current bridge, constructing it on first use
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Reentrant` if called from inside the factory.
    pub fn get_instance(&self) -> Result<Arc<dyn Bridge>, ProviderError> {
        let me = thread::current().id();

        let (factory, generation) = {
            let mut state = self.lock();
            if let Some(instance) = &state.instance {
                return Ok(instance.clone());
            }
            if !state.constructing.insert(me) {
                return Err(ProviderError::Reentrant);
            }
            (state.factory.clone(), state.generation)
        };

        // The lock is released while the factory runs, so a re-entrant call
        // reaches the check above instead of deadlocking.
        let built = {
            let _guard = ConstructionGuard { provider: self, me };
            factory()
        };

        let mut state = self.lock();
        if let Some(existing) = &state.instance {
            return Ok(existing.clone());
        }
        if state.generation != generation {
            // Factory was swapped mid-build; hand out the bridge but do not keep it
            return Ok(built);
        }

        debug!(bridge = built.name(), "Bridge constructed");
        state.instance = Some(built.clone());
        Ok(built)
    }

    /// Replace the factory and discard the current instance
    pub fn set_factory(&self, factory: BridgeFactory) {
        let mut state = self.lock();
        state.factory = factory;
        state.instance = None;
        state.generation += 1;
    }

    /// Discard the current instance and restore the default factory
    pub fn reset(&self) {
        let mut state = self.lock();
        state.factory = self.default_factory.clone();
        state.instance = None;
        state.generation += 1;
    }

    /// Check if a bridge has been constructed
    pub fn is_constructed(&self) -> bool {
        self.lock().instance.is_some()
    }
}

/// Clears this thread's constructing marker even if the factory panics
struct ConstructionGuard<'a> {
    provider: &'a BridgeProvider,
    me: ThreadId,
}

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        self.provider.lock().constructing.remove(&self.me);
    }
}

impl Default for BridgeProvider {
    fn default() -> Self {
        Self::detached()
    }
}

static GLOBAL_PROVIDER: OnceLock<BridgeProvider> = OnceLock::new();

/// Install the process-wide provider with its production factory.
///
/// Must happen before the first call to [`global`].
pub fn install(default_factory: BridgeFactory) -> Result<&'static BridgeProvider, ProviderError> {
    let mut installed = false;
    let provider = GLOBAL_PROVIDER.get_or_init(|| {
        installed = true;
        BridgeProvider::new(default_factory)
    });

    if installed {
        Ok(provider)
    } else {
        Err(ProviderError::AlreadyInstalled)
    }
}

/// The process-wide provider. Falls back to a detached bridge if nothing
/// was installed.
pub fn global() -> &'static BridgeProvider {
    GLOBAL_PROVIDER.get_or_init(BridgeProvider::detached)
}
