//! Dynamic extension dispatch.
//!
//! Extension entry points are not exported by the loader; they are resolved
//! at run time through the native get-procedure-address mechanism, then
//! wrapped in the typed callable the generator registered for that name.
//! The registry is process-wide by design: one native library load per
//! process means one wrapper set per process. Resolution results are cached
//! so repeated lookups by name are O(1) after the first call.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::library::PfnVoidFunction;
use crate::LoadingError;

/// Which dynamic-dispatch namespace an extension function belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Instance,
    Device,
}

/// Adapts a raw resolved address into the typed wrapper for one entry point.
/// Registered by the generated module at startup.
pub type ProcBinder = fn(PfnVoidFunction) -> BoundProc;

/// A bound, typed wrapper. Callers downcast to the concrete closure type the
/// generated module documents for the entry point.
pub type BoundProc = Arc<dyn Any + Send + Sync>;

static GLOBAL: Lazy<ProcRegistry> = Lazy::new(ProcRegistry::new);

/// The process-wide table of extension wrappers and the cache of bound
/// procedures. Initialized lazily on first use; never torn down before
/// process exit.
pub struct ProcRegistry {
    binders: Mutex<HashMap<(Scope, String), ProcBinder>>,
    cache: Mutex<HashMap<(Scope, String), BoundProc>>,
}

impl ProcRegistry {
    fn new() -> ProcRegistry {
        ProcRegistry {
            binders: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static ProcRegistry {
        &GLOBAL
    }

    /// Registers the typed wrapper factory for `name` under `scope`.
    /// Device-scoped functions are reachable through the instance namespace
    /// as well, mirroring the native resolver's own rules.
    pub fn register(&self, scope: Scope, name: &'static str, binder: ProcBinder) {
        let mut binders = self.binders.lock().unwrap();
        binders.insert((Scope::Instance, name.to_owned()), binder);
        if scope == Scope::Device {
            binders.insert((Scope::Device, name.to_owned()), binder);
        }
    }

    /// Resolves `name` in `scope`: the native lookup must produce a non-null
    /// address ([`LoadingError::ProcedureNotFound`] otherwise), and a typed
    /// wrapper must have been registered for that scope
    /// ([`LoadingError::ExtensionNotSupported`] otherwise, a distinct,
    /// programmatically matchable condition). The bound wrapper is cached
    /// under `(scope, name)`.
    pub fn resolve_with(
        &self,
        scope: Scope,
        name: &str,
        lookup: impl FnOnce(&str) -> Option<PfnVoidFunction>,
    ) -> Result<BoundProc, LoadingError> {
        if let Some(bound) = self.cache.lock().unwrap().get(&(scope, name.to_owned())) {
            return Ok(Arc::clone(bound));
        }

        let raw = lookup(name).ok_or_else(|| LoadingError::ProcedureNotFound {
            name: name.to_owned(),
        })?;
        let binder = *self
            .binders
            .lock()
            .unwrap()
            .get(&(scope, name.to_owned()))
            .ok_or_else(|| LoadingError::ExtensionNotSupported { name: name.to_owned(), scope })?;

        let bound = binder(raw);
        self.cache
            .lock()
            .unwrap()
            .insert((scope, name.to_owned()), Arc::clone(&bound));
        Ok(bound)
    }

    /// Whether `(scope, name)` has already been bound.
    pub fn is_cached(&self, scope: Scope, name: &str) -> bool {
        self.cache.lock().unwrap().contains_key(&(scope, name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "system" fn nop() {}

    #[test]
    fn null_address_is_procedure_not_found() {
        let reg = ProcRegistry::new();
        let err = reg
            .resolve_with(Scope::Instance, "vkMissing", |_| None)
            .unwrap_err();
        assert!(matches!(err, LoadingError::ProcedureNotFound { .. }));
    }

    #[test]
    fn unregistered_wrapper_is_extension_not_supported() {
        let reg = ProcRegistry::new();
        let err = reg
            .resolve_with(Scope::Instance, "vkResolvedButUnknown", |_| Some(nop as PfnVoidFunction))
            .unwrap_err();
        assert!(matches!(err, LoadingError::ExtensionNotSupported { .. }));
    }

    #[test]
    fn resolution_is_cached_after_first_call() {
        let reg = ProcRegistry::new();
        reg.register(Scope::Instance, "vkCached", |_raw| Arc::new("wrapper"));

        let mut lookups = 0;
        for _ in 0..3 {
            let bound = reg
                .resolve_with(Scope::Instance, "vkCached", |_| {
                    lookups += 1;
                    Some(nop as PfnVoidFunction)
                })
                .unwrap();
            assert_eq!(*bound.downcast_ref::<&str>().unwrap(), "wrapper");
        }
        assert_eq!(lookups, 1);
        assert!(reg.is_cached(Scope::Instance, "vkCached"));
    }

    #[test]
    fn device_scope_is_reachable_from_instance_namespace() {
        let reg = ProcRegistry::new();
        reg.register(Scope::Device, "vkDeviceThing", |_raw| Arc::new(1u8));
        assert!(reg
            .resolve_with(Scope::Instance, "vkDeviceThing", |_| Some(nop as PfnVoidFunction))
            .is_ok());
        assert!(reg
            .resolve_with(Scope::Device, "vkDeviceThing", |_| Some(nop as PfnVoidFunction))
            .is_ok());
    }
}
