// Generated by vulk_generator from the Vulkan XML registry. Do not edit.
#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals)]
#![allow(dead_code, unused_imports, unused_mut, unused_variables)]

use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

use vulk::{
    query_then_fill, query_then_fill_void, BoundProc, CallbackSlot, CodeTable, Completion,
    DecodedStrings, Error, Lazy, LoadingError, MarshalArena, PfnVoidFunction, ProcRegistry, Scope,
    VulkanLibrary,
};
