//! Native library resolution. The library is opened lazily on first use and
//! stays loaded until the process exits; there is no unload path.

use std::ffi::{CStr, CString};
use std::mem;
use std::os::raw::{c_char, c_void};

use libloading::Library;
use once_cell::sync::OnceCell;

use crate::LoadingError;

/// An untyped native entry point. Generated code transmutes this to the
/// concrete signature it was resolved for.
pub type PfnVoidFunction = unsafe extern "system" fn();

type PfnGetProcAddr =
    unsafe extern "system" fn(*mut c_void, *const c_char) -> Option<PfnVoidFunction>;

#[cfg(windows)]
const CANDIDATES: &[&str] = &["vulkan-1.dll"];
#[cfg(target_os = "macos")]
const CANDIDATES: &[&str] = &["libvulkan.dylib", "libvulkan.1.dylib", "libMoltenVK.dylib"];
#[cfg(all(unix, not(target_os = "macos")))]
const CANDIDATES: &[&str] = &["libvulkan.so.1", "libvulkan.so"];

static LIBRARY: OnceCell<VulkanLibrary> = OnceCell::new();

/// The loaded native library. Exclusively owned by this module's process-wide
/// singleton; [`VulkanLibrary::get`] hands out shared references only.
pub struct VulkanLibrary {
    lib: Library,
    name: String,
}

impl VulkanLibrary {
    /// Returns the process-wide library, loading it on the first call by
    /// trying each platform candidate in order.
    pub fn get() -> Result<&'static VulkanLibrary, LoadingError> {
        LIBRARY.get_or_try_init(|| VulkanLibrary::open(CANDIDATES))
    }

    /// Tries each candidate shared-object name in order, collecting the
    /// per-candidate causes into one aggregated failure if all of them fail.
    pub fn open(candidates: &[&str]) -> Result<VulkanLibrary, LoadingError> {
        let mut tried = Vec::with_capacity(candidates.len());
        for name in candidates {
            match unsafe { Library::new(name) } {
                Ok(lib) => {
                    log::debug!("loaded native library {:?}", name);
                    return Ok(VulkanLibrary { lib, name: (*name).to_owned() });
                }
                Err(e) => tried.push(format!("{}: {}", name, e)),
            }
        }
        Err(LoadingError::LibraryNotFound { tried })
    }

    /// The shared-object name the library was loaded from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves a statically-exported symbol.
    ///
    /// # Safety
    /// The caller must transmute the result to the symbol's true signature
    /// before invoking it.
    pub unsafe fn symbol(&self, name: &str) -> Result<PfnVoidFunction, LoadingError> {
        let cname = CString::new(name).map_err(|_| LoadingError::ProcedureNotFound {
            name: name.to_owned(),
        })?;
        match self.lib.get::<PfnVoidFunction>(cname.as_bytes_with_nul()) {
            Ok(sym) => Ok(*sym),
            Err(_) => Err(LoadingError::ProcedureNotFound { name: name.to_owned() }),
        }
    }

    /// Resolves `name` through the native `vkGetInstanceProcAddr`, in the
    /// namespace of `instance` (null for the global namespace).
    ///
    /// # Safety
    /// `instance` must be null or a live instance handle.
    pub unsafe fn instance_proc_addr(
        &self,
        instance: *mut c_void,
        name: &CStr,
    ) -> Result<Option<PfnVoidFunction>, LoadingError> {
        let getter: PfnGetProcAddr = mem::transmute(self.symbol("vkGetInstanceProcAddr")?);
        Ok(getter(instance, name.as_ptr()))
    }

    /// Resolves `name` through the native `vkGetDeviceProcAddr`, in the
    /// namespace of `device`.
    ///
    /// # Safety
    /// `device` must be a live device handle.
    pub unsafe fn device_proc_addr(
        &self,
        device: *mut c_void,
        name: &CStr,
    ) -> Result<Option<PfnVoidFunction>, LoadingError> {
        let getter: PfnGetProcAddr = mem::transmute(self.symbol("vkGetDeviceProcAddr")?);
        Ok(getter(device, name.as_ptr()))
    }
}
