//! Calling-convention classification and the success/error partition.
//!
//! Classification is resolved once, here, into an explicit tag per
//! function; nothing downstream ever re-derives it from names. The
//! override lists are fixed: they encode the registry's known exceptions
//! to the naming-convention heuristics, and a function on one of them
//! keeps its forced class no matter what its signature looks like.

use std::collections::HashSet;

use heck::ToUpperCamelCase;
use once_cell::sync::Lazy;

use super::enums::EnumSet;
use crate::registry::Command;
use crate::GenError;

/// Verb prefixes that signal callee-allocated output storage.
pub const ALLOCATE_PREFIXES: [&str; 6] =
    ["vkCreate", "vkGet", "vkEnumerate", "vkAllocate", "vkMap", "vkAcquire"];

/// Functions whose trailing pointer parameter is an output scalar the
/// caller supplies, not an allocation target.
pub static ALLOCATE_EXCEPTIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "vkGetFenceStatus",
        "vkGetEventStatus",
        "vkGetQueryPoolResults",
        "vkGetPhysicalDeviceXlibPresentationSupportKHR",
    ]
    .into_iter()
    .collect()
});

/// Functions whose `uint32_t*` parameter is not a query count.
pub static COUNT_EXCEPTIONS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["vkAcquireNextImageKHR"].into_iter().collect());

/// Entry points with hand-written treatment: the two proc-addr front doors
/// and the pointer-lifetime special cases. Never emitted as ordinary
/// wrappers.
pub static CUSTOM_FUNCTIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "vkGetInstanceProcAddr",
        "vkGetDeviceProcAddr",
        "vkMapMemory",
        "vkGetPipelineCacheData",
    ]
    .into_iter()
    .collect()
});

/// Parameters that default to null in wrapper signatures.
pub const NULL_MEMBERS: [&str; 3] = ["pNext", "pAllocator", "pUserData"];

/// How a wrapper interacts with caller-supplied vs callee-allocated memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convention {
    /// Arguments pass through; no output allocation.
    Direct,
    /// The wrapper allocates the trailing output slot and returns it.
    SingleAllocate { static_count: Option<StaticCount> },
    /// Count query with a null output pointer, then allocate, then fill.
    QueryThenFill,
}

/// A trailing output whose element count is read from a sibling
/// parameter's field (`pAllocateInfo::descriptorSetCount`) instead of
/// queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCount {
    pub param: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnKind {
    /// Participates in the success/error taxonomy.
    Status,
    Boolean,
    Void,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct ParamSig {
    pub name: String,
    pub type_name: String,
    pub pointer: u8,
    pub is_const: bool,
    pub len: Option<String>,
    /// Omittable in the wrapper signature, defaulting to null.
    pub nullable_default: bool,
    /// Allocated by the wrapper rather than supplied by the caller.
    pub output: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<ParamSig>,
    pub return_kind: ReturnKind,
    pub convention: Convention,
    pub is_extension: bool,
}

pub fn return_kind(return_type: &str) -> ReturnKind {
    match return_type {
        "VkResult" => ReturnKind::Status,
        "VkBool32" => ReturnKind::Boolean,
        "void" => ReturnKind::Void,
        other => ReturnKind::Other(other.to_owned()),
    }
}

/// Assigns the one convention class a command belongs to.
///
/// 1. No allocating verb prefix: direct.
/// 2. Allocation-exception override or boolean return: direct, regardless
///    of shape.
/// 3. Otherwise a mutable `uint32_t*` immediately before the final
///    parameter (and no count-exception override) means query-then-fill.
/// 4. A `sibling::field` length on the final parameter means a fixed-size
///    allocation read from that field; holding both that and a count
///    parameter would make the class ambiguous, which is a fatal invariant
///    violation rather than a coin toss.
pub fn classify(command: &Command) -> Result<Convention, GenError> {
    let name = command.name.as_str();
    let is_allocate = ALLOCATE_PREFIXES.iter().any(|p| name.starts_with(p));
    let is_boolean = command.return_type == "VkBool32";

    if !is_allocate || ALLOCATE_EXCEPTIONS.contains(name) || is_boolean {
        return Ok(Convention::Direct);
    }
    if command.params.is_empty() {
        log::warn!("{} has an allocating prefix but no parameters", name);
        return Ok(Convention::Direct);
    }

    let static_count = command
        .params
        .last()
        .and_then(|p| p.len.as_deref())
        .and_then(|len| len.split_once("::"))
        .map(|(param, field)| StaticCount { param: param.to_owned(), field: field.to_owned() });

    let has_count_param = command.params.len() >= 2 && !COUNT_EXCEPTIONS.contains(name) && {
        let count = &command.params[command.params.len() - 2];
        count.type_name == "uint32_t" && count.pointer == 1 && !count.is_const
    };

    match (static_count, has_count_param) {
        (Some(_), true) => Err(GenError::AmbiguousClassification { name: name.to_owned() }),
        (Some(static_count), false) => {
            Ok(Convention::SingleAllocate { static_count: Some(static_count) })
        }
        (None, true) => Ok(Convention::QueryThenFill),
        (None, false) => Ok(Convention::SingleAllocate { static_count: None }),
    }
}

/// Builds the typed signature for one command, with the output slots its
/// convention implies.
pub fn signature(
    command: &Command,
    is_extension: bool,
) -> Result<FunctionSignature, GenError> {
    let convention = classify(command)?;

    let mut params: Vec<ParamSig> = command
        .params
        .iter()
        .map(|p| ParamSig {
            name: p.name.clone(),
            type_name: p.type_name.clone(),
            pointer: p.pointer,
            is_const: p.is_const,
            len: p.len.clone(),
            nullable_default: NULL_MEMBERS.contains(&p.name.as_str()),
            output: false,
        })
        .collect();

    match convention {
        Convention::SingleAllocate { .. } => {
            if let Some(last) = params.last_mut() {
                last.output = true;
            }
        }
        Convention::QueryThenFill => {
            let n = params.len();
            params[n - 1].output = true;
            params[n - 2].output = true;
        }
        Convention::Direct => {}
    }

    Ok(FunctionSignature {
        name: command.name.clone(),
        params,
        return_kind: return_kind(&command.return_type),
        convention,
        is_extension,
    })
}

/// One code of the partition: its numeric value, its registry symbol and
/// the UpperCamelCase name its generated type uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeEntry {
    pub value: i64,
    pub symbol: String,
    pub type_name: String,
}

/// The success/error partition of the status-code enumeration, in the
/// enumeration's declaration order.
#[derive(Debug, Clone, Default)]
pub struct ResultPartition {
    pub successes: Vec<CodeEntry>,
    pub errors: Vec<CodeEntry>,
}

impl ResultPartition {
    pub fn is_empty(&self) -> bool {
        self.successes.is_empty() && self.errors.is_empty()
    }
}

/// Splits the status enumeration by how commands actually use each code.
/// `VK_SUCCESS` (the canonical complete value) and the `VK_RESULT_*`
/// bookkeeping members stay out of the partition; codes no command
/// references are warned about and dropped, surfacing at call time as
/// opaque failures.
pub fn build_result_partition(result_set: Option<&EnumSet>, commands: &[Command]) -> ResultPartition {
    let mut partition = ResultPartition::default();
    let set = match result_set {
        Some(set) => set,
        None => return partition,
    };

    let mut success_names: HashSet<&str> = HashSet::new();
    let mut error_names: HashSet<&str> = HashSet::new();
    for command in commands {
        success_names.extend(command.successcodes.iter().map(String::as_str));
        error_names.extend(command.errorcodes.iter().map(String::as_str));
    }

    for (symbol, value) in &set.members {
        if symbol == "VK_SUCCESS" || symbol.starts_with("VK_RESULT") {
            continue;
        }
        let entry = CodeEntry {
            value: *value,
            symbol: symbol.clone(),
            type_name: symbol.to_upper_camel_case(),
        };
        if success_names.contains(symbol.as_str()) {
            partition.successes.push(entry);
        } else if error_names.contains(symbol.as_str()) {
            partition.errors.push(entry);
        } else {
            log::warn!("return code {} unused", symbol);
        }
    }

    partition
}
