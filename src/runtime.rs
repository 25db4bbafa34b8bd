//! A scripting state wired to a host engine.
//!
//! # Example
//!
//! ```
//! use luagd::{Runtime, Vector2};
//! use luagd::bindings::StackOp;
//!
//! let mut runtime = Runtime::reference().unwrap();
//! let state = runtime.state_mut();
//!
//! state.get_global("Vector2").unwrap();
//! state.get_field(-1, "RIGHT").unwrap();
//! assert_eq!(Vector2::get(state, -1), Some(Vector2::new(1.0, 0.0)));
//! ```

use std::sync::Arc;

use log::debug;
use thiserror::Error;

use luagd_bindings::{
    BindingContext, BindingRegistry, open_builtins, open_classes, open_global_enums,
};
use luagd_core::api::ExtensionApi;
use luagd_core::{ApiError, HostInterface};
use luagd_host::{ReferenceHost, extension_api};
use luagd_runtime::{LuaError, LuaState};

/// A [`LuaState`] with the engine's bindings installed.
///
/// Owns the state; shares the host and the binding registry, which can be
/// reused to build further runtimes.
pub struct Runtime {
    state: LuaState,
    host: Arc<dyn HostInterface>,
    registry: Arc<BindingRegistry>,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// A runtime backed by the in-process reference engine with every
    /// library group open.
    pub fn reference() -> Result<Self, RuntimeError> {
        RuntimeBuilder::new()
            .api(extension_api()?)
            .host(ReferenceHost::new())
            .build()
    }

    pub fn state(&self) -> &LuaState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut LuaState {
        &mut self.state
    }

    pub fn host(&self) -> &dyn HostInterface {
        self.host.as_ref()
    }

    pub fn registry(&self) -> &Arc<BindingRegistry> {
        &self.registry
    }

    /// Give up the runtime, keeping the state.
    pub fn into_state(self) -> LuaState {
        self.state
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("state", &self.state)
            .field("builtins", &self.registry.builtin_count())
            .field("classes", &self.registry.class_count())
            .finish_non_exhaustive()
    }
}

enum ApiSource {
    Description(ExtensionApi),
    Registry(Arc<BindingRegistry>),
}

/// Builder for [`Runtime`].
///
/// A host and an API description (or a prebuilt registry) are required.
/// All library groups are opened unless switched off.
pub struct RuntimeBuilder {
    api: Option<ApiSource>,
    host: Option<Arc<dyn HostInterface>>,
    open_builtins: bool,
    open_classes: bool,
    open_enums: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            api: None,
            host: None,
            open_builtins: true,
            open_classes: true,
            open_enums: true,
        }
    }

    /// Bind the types declared by `api`.
    ///
    /// Runtimes built from equal descriptions share one process-wide
    /// registry, so each constant is fetched from the host once per process.
    pub fn api(mut self, api: ExtensionApi) -> Self {
        self.api = Some(ApiSource::Description(api));
        self
    }

    /// Use `registry` as is: a registry from another runtime, or a private
    /// one whose constant cache nothing else sees.
    pub fn registry(mut self, registry: Arc<BindingRegistry>) -> Self {
        self.api = Some(ApiSource::Registry(registry));
        self
    }

    pub fn host(mut self, host: impl HostInterface + 'static) -> Self {
        self.host = Some(Arc::new(host));
        self
    }

    pub fn shared_host(mut self, host: Arc<dyn HostInterface>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn open_builtins(mut self, open: bool) -> Self {
        self.open_builtins = open;
        self
    }

    pub fn open_classes(mut self, open: bool) -> Self {
        self.open_classes = open;
        self
    }

    pub fn open_enums(mut self, open: bool) -> Self {
        self.open_enums = open;
        self
    }

    /// Create the state, install the binding context and open the selected
    /// library groups.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::MissingHost`] / [`RuntimeError::MissingApi`] if
    /// either was not supplied, [`RuntimeError::Api`] if the description is
    /// inconsistent, [`RuntimeError::Lua`] if opening a library fails.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build(self) -> Result<Runtime, RuntimeError> {
        let host = self.host.ok_or(RuntimeError::MissingHost)?;
        let registry = match self.api.ok_or(RuntimeError::MissingApi)? {
            ApiSource::Description(api) => BindingRegistry::shared(&api)?,
            ApiSource::Registry(registry) => registry,
        };

        let mut state = LuaState::new();
        BindingContext::new(Arc::clone(&host), Arc::clone(&registry)).install(&mut state);

        if self.open_builtins {
            open_builtins(&mut state)?;
        }
        if self.open_classes {
            open_classes(&mut state)?;
        }
        if self.open_enums {
            open_global_enums(&mut state)?;
        }
        debug!(
            "runtime ready: {} builtins, {} classes",
            registry.builtin_count(),
            registry.class_count()
        );

        Ok(Runtime {
            state,
            host,
            registry,
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur while building a [`Runtime`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no host engine supplied")]
    MissingHost,

    #[error("no extension API supplied")]
    MissingApi,

    #[error("invalid extension API: {0}")]
    Api(#[from] ApiError),

    #[error("failed to open bindings: {0}")]
    Lua(#[from] LuaError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_runtime_opens_everything() {
        let mut runtime = Runtime::reference().unwrap();
        assert_eq!(runtime.state().get_top(), 0);

        let state = runtime.state_mut();
        for global in ["Vector2", "Color", "Node2D", "Object", "Enum"] {
            state.get_global(global).unwrap();
            assert!(state.is_readonly(-1), "{global}");
            state.pop(1).unwrap();
        }
    }

    #[test]
    fn missing_host_or_api() {
        let err = RuntimeBuilder::new()
            .api(extension_api().unwrap())
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::MissingHost));

        let err = RuntimeBuilder::new()
            .host(ReferenceHost::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::MissingApi));
        assert_eq!(err.to_string(), "no extension API supplied");
    }

    #[test]
    fn groups_can_be_left_closed() {
        let mut runtime = RuntimeBuilder::new()
            .api(extension_api().unwrap())
            .host(ReferenceHost::new())
            .open_classes(false)
            .open_enums(false)
            .build()
            .unwrap();

        let state = runtime.state_mut();
        state.get_global("Node").unwrap();
        assert!(state.is_none_or_nil(-1));
        state.get_global("Enum").unwrap();
        assert!(state.is_none_or_nil(-1));
        state.get_global("Color").unwrap();
        assert!(state.to_table(-1).is_some());
    }

    #[test]
    fn registry_is_shared_between_runtimes() {
        let first = Runtime::reference().unwrap();
        let second = RuntimeBuilder::new()
            .registry(Arc::clone(first.registry()))
            .host(ReferenceHost::new())
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(first.registry(), second.registry()));
    }

    #[test]
    fn reference_runtimes_share_the_bundled_registry() {
        let first = Runtime::reference().unwrap();
        let second = Runtime::reference().unwrap();
        assert!(Arc::ptr_eq(first.registry(), second.registry()));

        let registry = BindingRegistry::from_api(&extension_api().unwrap()).unwrap();
        let private = RuntimeBuilder::new()
            .registry(Arc::new(registry))
            .host(ReferenceHost::new())
            .build()
            .unwrap();
        assert!(!Arc::ptr_eq(first.registry(), private.registry()));
    }

    #[test]
    fn bad_api_is_reported() {
        let json = r#"{
            "header": { "version_major": 4, "version_minor": 2 },
            "builtin_classes": [],
            "classes": [{ "name": "Child", "inherits": "Missing", "is_instantiable": true }]
        }"#;
        let api = ExtensionApi::from_json(json).unwrap();
        let err = RuntimeBuilder::new()
            .api(api)
            .host(ReferenceHost::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Api(ApiError::UnknownParent { .. })));
    }
}
