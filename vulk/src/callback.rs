//! Storage for caller-supplied callback logic behind a native funcpointer.
//!
//! A native aggregate cannot hold a Rust closure directly; the generated
//! module emits one `extern "system"` trampoline per funcpointer type and
//! one process-wide [`CallbackSlot`] the trampoline forwards into. Installing
//! a callback replaces whatever was installed before; the native API itself
//! only supports one such callback per funcpointer type at a time.

use std::sync::Mutex;

/// A process-wide slot holding the caller-supplied logic for one funcpointer
/// type.
pub struct CallbackSlot<T> {
    inner: Mutex<Option<T>>,
}

impl<T> CallbackSlot<T> {
    pub const fn new() -> CallbackSlot<T> {
        CallbackSlot { inner: Mutex::new(None) }
    }

    /// Installs `callback`, returning the previously installed one.
    pub fn install(&self, callback: T) -> Option<T> {
        self.inner.lock().unwrap().replace(callback)
    }

    /// Clears the slot.
    pub fn clear(&self) -> Option<T> {
        self.inner.lock().unwrap().take()
    }

    /// Invokes `f` with the installed callback, if any. Called from the
    /// generated trampoline.
    pub fn invoke<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.inner.lock().unwrap().as_mut().map(f)
    }
}

impl<T> Default for CallbackSlot<T> {
    fn default() -> CallbackSlot<T> {
        CallbackSlot::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SLOT: CallbackSlot<fn(i32) -> i32> = CallbackSlot::new();

    unsafe extern "system" fn trampoline(x: i32) -> i32 {
        SLOT.invoke(|cb| cb(x)).unwrap_or(0)
    }

    #[test]
    fn trampoline_forwards_into_installed_logic() {
        assert_eq!(SLOT.install(|x| x * 2), None);
        assert_eq!(unsafe { trampoline(21) }, 42);
        assert!(SLOT.clear().is_some());
        assert_eq!(unsafe { trampoline(21) }, 0);
    }
}
