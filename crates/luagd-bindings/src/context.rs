//! Per-state binding context.
//!
//! Handlers are plain native functions, so the host handle and the registry
//! travel with the state as app data.

use std::sync::Arc;

use luagd_core::HostInterface;
use luagd_runtime::{LuaError, LuaResult, LuaState};

use crate::registry::BindingRegistry;

/// Host handle plus binding tables, attached to a [`LuaState`].
#[derive(Clone)]
pub struct BindingContext {
    host: Arc<dyn HostInterface>,
    registry: Arc<BindingRegistry>,
}

impl BindingContext {
    pub fn new(host: Arc<dyn HostInterface>, registry: Arc<BindingRegistry>) -> Self {
        Self { host, registry }
    }

    pub fn host(&self) -> &dyn HostInterface {
        self.host.as_ref()
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    /// Attach this context to `state`, replacing any previous one.
    pub fn install(self, state: &mut LuaState) {
        state.set_app_data(self);
    }

    /// The context attached to `state`.
    ///
    /// Returns an owned handle so callers can keep using it while they
    /// mutate the state.
    pub fn from_state(state: &LuaState) -> LuaResult<Self> {
        state
            .app_data::<BindingContext>()
            .cloned()
            .ok_or_else(|| LuaError::runtime("no binding context installed on this state"))
    }
}

impl std::fmt::Debug for BindingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingContext")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
