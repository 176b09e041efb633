/// Resolves `pName` through the native instance-level resolver and returns
/// the typed wrapper bound to it. A null native address raises
/// `ProcedureNotFound`; a resolved name with no registered wrapper raises
/// `ExtensionNotSupported`. Downcast the result to the `Fn` alias documented
/// for the entry point.
pub fn vkGetInstanceProcAddr(instance: VkInstance, pName: &str) -> Result<BoundProc, Error> {
    let lib = VulkanLibrary::get()?;
    let cname = std::ffi::CString::new(pName)
        .map_err(|_| LoadingError::ProcedureNotFound { name: pName.to_owned() })?;
    let bound = ProcRegistry::global().resolve_with(Scope::Instance, pName, |_| unsafe {
        lib.instance_proc_addr(instance, &cname).ok().flatten()
    })?;
    Ok(bound)
}

/// [`vkGetInstanceProcAddr`], scoped to one device's dispatch namespace.
pub fn vkGetDeviceProcAddr(device: VkDevice, pName: &str) -> Result<BoundProc, Error> {
    let lib = VulkanLibrary::get()?;
    let cname = std::ffi::CString::new(pName)
        .map_err(|_| LoadingError::ProcedureNotFound { name: pName.to_owned() })?;
    let bound = ProcRegistry::global().resolve_with(Scope::Device, pName, |_| unsafe {
        lib.device_proc_addr(device, &cname).ok().flatten()
    })?;
    Ok(bound)
}
