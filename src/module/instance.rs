//! Live instance of the computational module.
//!
//! Keeps the wasmtime `Store` and `Instance` produced by initialization so
//! later steps (the panic bridge, the UI) can call exports. Every trap raised
//! by such a call is passed to the registered [`TrapObserver`] before it is
//! returned to the caller.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;
use tracing::trace;
use wasmtime::{Instance, Store};

/// Callback receiving the export name and the trap of a failed call.
pub type TrapObserver = Arc<dyn Fn(&str, &wasmtime::Error) + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("export `{export}` is not a callable `() -> ()` function: {cause}")]
    NotCallable { export: String, cause: String },

    #[error("export `{export}` trapped: {trap}")]
    Trapped { export: String, trap: String },
}

struct Live {
    store: Store<()>,
    instance: Instance,
}

/// Shared handle to the instantiated module.
#[derive(Clone)]
pub struct ModuleInstance {
    live: Arc<Mutex<Live>>,
    observer: Arc<OnceLock<TrapObserver>>,
}

impl ModuleInstance {
    pub(super) fn new(store: Store<()>, instance: Instance) -> Self {
        Self {
            live: Arc::new(Mutex::new(Live { store, instance })),
            observer: Arc::new(OnceLock::new()),
        }
    }

    /// Register the trap observer. Only the first registration takes effect.
    pub fn observe_traps(&self, observer: TrapObserver) -> bool {
        self.observer.set(observer).is_ok()
    }

    /// Call a nullary export on the current thread.
    pub fn call(&self, export: &str) -> Result<(), CallError> {
        let mut live = self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Live { store, instance } = &mut *live;

        let func = instance
            .get_typed_func::<(), ()>(&mut *store, export)
            .map_err(|e| CallError::NotCallable {
                export: export.to_string(),
                cause: format!("{:#}", e),
            })?;

        trace!("Calling module export `{}`", export);
        func.call(&mut *store, ()).map_err(|e| {
            if let Some(observer) = self.observer.get() {
                observer(export, &e);
            }
            CallError::Trapped {
                export: export.to_string(),
                trap: format!("{:#}", e),
            }
        })
    }
}

// Identity, not structure: two handles are equal when they share the instance.
impl PartialEq for ModuleInstance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.live, &other.live)
    }
}

impl Eq for ModuleInstance {}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("observed", &self.observer.get().is_some())
            .finish_non_exhaustive()
    }
}
