//! Marshaling primitives shared by every generated wrapper.
//!
//! Each native call (and each constructed native aggregate) gets its own
//! [`MarshalArena`]. The arena owns every intermediate buffer produced while
//! lowering logical arguments to raw pointers (encoded C strings, argument
//! arrays, nested struct arrays) and releases all of them together when it
//! is dropped. Buffers never move once allocated, so a pointer handed out by
//! the arena stays valid for the arena's whole lifetime.

use std::any::Any;
use std::borrow::Cow;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

use crate::status::{CodeTable, Completion, VkFailure};

/// Owns the intermediate buffers referenced by one aggregate or one call.
///
/// Ownership is strictly one-way: the arena owns the buffers, the buffers
/// never refer back to the arena or to the aggregate built from them.
#[derive(Default)]
pub struct MarshalArena {
    cstrings: Vec<CString>,
    buffers: Vec<Box<dyn Any>>,
}

impl MarshalArena {
    pub fn new() -> MarshalArena {
        MarshalArena::default()
    }

    /// Number of buffers currently kept alive.
    pub fn retained(&self) -> usize {
        self.cstrings.len() + self.buffers.len()
    }

    /// Encodes `s` as a NUL-terminated C string owned by the arena.
    /// Interior NUL bytes truncate the string; the registry never
    /// produces such names.
    pub fn alloc_cstr(&mut self, s: &str) -> *const c_char {
        let bytes: Vec<u8> = s.bytes().take_while(|&b| b != 0).collect();
        let cstring = CString::new(bytes).expect("interior NULs stripped above");
        let ptr = cstring.as_ptr();
        self.cstrings.push(cstring);
        ptr
    }

    /// Copies `values` into an arena-owned array and returns its base
    /// pointer.
    pub fn alloc_slice<T: Copy + 'static>(&mut self, values: &[T]) -> *mut T {
        let mut boxed: Box<[T]> = values.into();
        let ptr = boxed.as_mut_ptr();
        self.buffers.push(Box::new(boxed));
        ptr
    }

    /// Moves a single value into the arena and returns a pointer to it.
    /// This is the output-slot allocation for single-allocate wrappers.
    pub fn alloc_value<T: 'static>(&mut self, value: T) -> *mut T {
        let mut boxed = Box::new(value);
        let ptr: *mut T = &mut *boxed;
        self.buffers.push(boxed);
        ptr
    }

    /// Encodes each string and returns an arena-owned `*const c_char` array
    /// over them, for `ppEnabledLayerNames`-shaped parameters.
    pub fn alloc_cstr_array(&mut self, items: &[&str]) -> *const *const c_char {
        let ptrs: Vec<*const c_char> = items.iter().map(|s| self.alloc_cstr(s)).collect();
        self.alloc_slice(&ptrs) as *const *const c_char
    }

    /// Lowers an omittable pointer argument: absent values become null, the
    /// rest go through the arena.
    pub fn alloc_opt_value<T: 'static>(&mut self, value: Option<T>) -> *mut T {
        match value {
            Some(v) => self.alloc_value(v),
            None => ptr::null_mut(),
        }
    }
}

/// Runs the count-query / allocate / fill sequence for a status-returning
/// query-then-fill entry point. `call` receives the count pointer and the
/// output pointer (null during the count query) and returns the raw status
/// code; both calls are checked against `table`. The returned [`Completion`]
/// is the fill call's, so a noteworthy success (`VK_INCOMPLETE`) stays
/// visible to the caller.
///
/// # Safety
/// `T` must be valid zero-initialized, and `call` must write at most the
/// queried count of elements.
pub unsafe fn query_then_fill<T: 'static>(
    table: &CodeTable,
    mut call: impl FnMut(*mut u32, *mut T) -> i32,
) -> Result<(Completion, Vec<T>), VkFailure> {
    let mut count: u32 = 0;
    table.check(call(&mut count, ptr::null_mut()))?;

    let mut out: Vec<T> = Vec::with_capacity(count as usize);
    ptr::write_bytes(out.as_mut_ptr(), 0, count as usize);
    out.set_len(count as usize);

    let completion = table.check(call(&mut count, out.as_mut_ptr()))?;
    // The fill call may legitimately report fewer elements than the query.
    out.truncate(count as usize);
    Ok((completion, out))
}

/// [`query_then_fill`] for void-returning entry points (no status to check).
///
/// # Safety
/// Same contract as [`query_then_fill`].
pub unsafe fn query_then_fill_void<T: 'static>(
    mut call: impl FnMut(*mut u32, *mut T),
) -> Vec<T> {
    let mut count: u32 = 0;
    call(&mut count, ptr::null_mut());

    let mut out: Vec<T> = Vec::with_capacity(count as usize);
    ptr::write_bytes(out.as_mut_ptr(), 0, count as usize);
    out.set_len(count as usize);

    call(&mut count, out.as_mut_ptr());
    out.truncate(count as usize);
    out
}

/// Decodes a fixed-width C character buffer up to its first NUL.
pub fn cstr_to_string(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .map(|&c| c as u8)
        .take_while(|&b| b != 0)
        .collect();
    match String::from_utf8_lossy(&bytes) {
        Cow::Borrowed(s) => s.to_owned(),
        Cow::Owned(s) => s,
    }
}

/// A lazily-decoded view over an array whose elements carry fixed-width
/// character buffers (`VkExtensionProperties` and friends). Elements are
/// decoded one at a time, only when the iterator reaches them.
pub struct DecodedStrings<'a, T> {
    items: std::slice::Iter<'a, T>,
    extract: fn(&T) -> &[c_char],
}

impl<'a, T> DecodedStrings<'a, T> {
    pub fn new(items: &'a [T], extract: fn(&T) -> &[c_char]) -> DecodedStrings<'a, T> {
        DecodedStrings { items: items.iter(), extract }
    }
}

impl<'a, T> Iterator for DecodedStrings<'a, T> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.items.next().map(|item| cstr_to_string((self.extract)(item)))
    }
}
