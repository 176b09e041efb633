//! Emission of the two output artifacts: the generated binding module and
//! the flattened C declaration file.
//!
//! The binding emitter is the mirror image of [`crate::model`]: it consumes
//! the typed model and writes source text into one buffer per section
//! (typedefs, enums, macros, result taxonomy, funcpointers, aggregates,
//! wrappers, dispatch), stitched together behind fixed fragment files. The
//! model's collections are ordered, so the output is byte-stable for a
//! given registry. The declaration file is flattened by the external C
//! preprocessor; [`flatten_declarations`] only builds and runs the command.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::path::Path;
use std::process::Command;

use boolinator::Boolinator;
use heck::ToShoutySnakeCase;

use crate::model::{
    Convention, FuncPointerInfo, FunctionSignature, Model, ParamSig, ReturnKind, SetKind,
    ShapeMember, StructShape,
};
use crate::GenError;

/// Platform surfaces compiled into the flattened declarations.
pub const PLATFORM_DEFINES: [&str; 5] = [
    "VK_USE_PLATFORM_XCB_KHR",
    "VK_USE_PLATFORM_WAYLAND_KHR",
    "VK_USE_PLATFORM_ANDROID_KHR",
    "VK_USE_PLATFORM_WIN32_KHR",
    "VK_USE_PLATFORM_XLIB_KHR",
];

/// Renders the complete binding module for `model`.
pub fn emit_bindings(model: &Model) -> String {
    let mut sections = Sections::default();
    write_typedefs(model, &mut sections.typedefs);
    write_enums(model, &mut sections.enums);
    write_macros(model, &mut sections.consts);
    write_results(model, &mut sections.results);
    write_funcpointers(model, &mut sections.funcpointers);
    write_aggregates(model, &mut sections.aggregates);
    write_functions(model, &mut sections.functions);
    write_dispatch(model, &mut sections.dispatch);

    let mut out = String::with_capacity(1 << 20);
    out.push_str(include_str!("prelude.rs"));
    out.push('\n');
    out.push_str(include_str!("defines.rs"));
    for section in [
        &sections.typedefs,
        &sections.enums,
        &sections.consts,
        &sections.results,
        &sections.funcpointers,
        &sections.aggregates,
        &sections.functions,
        &sections.dispatch,
    ] {
        if !section.is_empty() {
            out.push('\n');
            out.push_str(section);
        }
    }
    out
}

#[derive(Default)]
struct Sections {
    typedefs: String,
    enums: String,
    consts: String,
    results: String,
    funcpointers: String,
    aggregates: String,
    functions: String,
    dispatch: String,
}

/// Builds the external preprocessor invocation that flattens `header` into
/// the self-contained declaration file at `out`.
pub fn preprocessor_command(header: &Path, include_dir: &Path, out: &Path) -> Command {
    let mut cmd = Command::new("cpp");
    cmd.arg("-std=c99").arg("-P").arg("-nostdinc");
    cmd.arg(format!("-I{}", include_dir.display()));
    cmd.arg(format!("-o{}", out.display()));
    for define in PLATFORM_DEFINES {
        cmd.arg(format!("-D{}", define));
    }
    cmd.arg(header);
    cmd
}

/// Runs the preprocessor. A missing `cpp` binary surfaces as `Io`; a
/// non-zero exit as `Preprocessor`.
pub fn flatten_declarations(header: &Path, include_dir: &Path, out: &Path) -> Result<(), GenError> {
    let status = preprocessor_command(header, include_dir, out).status()?;
    if !status.success() {
        return Err(GenError::Preprocessor { status });
    }
    log::info!("flattened {} -> {}", header.display(), out.display());
    Ok(())
}

/// Registry-spelled C type name -> the Rust name the module declares or
/// imports from `std::os::raw`.
fn base_type(name: &str) -> &str {
    match name {
        "void" => "c_void",
        "char" => "c_char",
        "float" => "f32",
        "double" => "f64",
        "int" => "c_int",
        "int8_t" => "i8",
        "int16_t" => "i16",
        "int32_t" => "i32",
        "int64_t" => "i64",
        "uint8_t" => "u8",
        "uint16_t" => "u16",
        "uint32_t" => "u32",
        "uint64_t" => "u64",
        "size_t" => "usize",
        other => other,
    }
}

fn raw_type(type_name: &str, pointer: u8, is_const: bool) -> String {
    let mut out = String::new();
    for _ in 0..pointer {
        out.push_str(if is_const { "*const " } else { "*mut " });
    }
    out.push_str(base_type(type_name));
    out
}

/// `vkCreateInstance` -> `VkCreateInstance`.
fn cap_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn write_typedefs(model: &Model, out: &mut String) {
    for (name, underlying) in &model.typedefs {
        if let Some(tag) = underlying.strip_prefix("struct ") {
            if tag.ends_with('*') {
                // Dispatchable handle: an opaque pointer.
                writeln!(out, "pub type {} = *mut c_void;", name).unwrap();
            } else {
                // Window-system type owned by a platform header; declaration
                // only, always used behind a pointer.
                writeln!(out, "#[repr(C)]\npub struct {} {{\n    _opaque: [u8; 0],\n}}", name)
                    .unwrap();
            }
        } else {
            writeln!(out, "pub type {} = {};", name, base_type(underlying)).unwrap();
        }
    }
}

fn write_enums(model: &Model, out: &mut String) {
    for (name, set) in &model.enums {
        match set.kind {
            SetKind::Plain => writeln!(out, "pub type {} = i32;", name).unwrap(),
            SetKind::Bitmask => writeln!(out, "pub type {} = VkFlags;", name).unwrap(),
        }
        for (member, value) in &set.members {
            match set.kind {
                SetKind::Plain => {
                    writeln!(out, "pub const {}: {} = {};", member, name, value).unwrap()
                }
                SetKind::Bitmask => {
                    writeln!(out, "pub const {}: {} = 0x{:08x};", member, name, value).unwrap()
                }
            }
        }
        out.push('\n');
    }
}

fn write_macros(model: &Model, out: &mut String) {
    // Constants that size a fixed array member must be usize to appear in
    // the array type.
    let extent_consts: HashSet<&str> = model
        .structs
        .iter()
        .flat_map(|s| s.members.iter())
        .filter_map(|m| m.array_len.as_deref())
        .filter(|len| len.parse::<usize>().is_err())
        .collect();

    for (name, value) in &model.macros {
        if extent_consts.contains(name.as_str()) {
            writeln!(out, "pub const {}: usize = {};", name, value.render()).unwrap();
        } else {
            writeln!(out, "pub const {}: {} = {};", name, value.rust_type(), value.render())
                .unwrap();
        }
    }
}

fn write_results(model: &Model, out: &mut String) {
    let partition = &model.result_partition;
    if partition.is_empty() {
        return;
    }
    let complete = model
        .enums
        .get("VkResult")
        .and_then(|set| set.value_of("VK_SUCCESS"))
        .unwrap_or(0);

    for (doc, type_name, entries) in [
        (
            "/// Success-partition codes other than the canonical complete value.\n",
            "VkSuccessCode",
            &partition.successes,
        ),
        (
            "/// Error-partition codes, one variant per distinguishable failure.\n",
            "VkErrorCode",
            &partition.errors,
        ),
    ] {
        out.push_str(doc);
        // repr(i32) is rejected on a zero-variant enum.
        if !entries.is_empty() {
            out.push_str("#[repr(i32)]\n");
        }
        out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq)]\n");
        writeln!(out, "pub enum {} {{", type_name).unwrap();
        for entry in entries.iter() {
            writeln!(out, "    {} = {},", entry.type_name, entry.value).unwrap();
        }
        out.push_str("}\n\n");
    }

    for (type_name, entries) in
        [("VkSuccessCode", &partition.successes), ("VkErrorCode", &partition.errors)]
    {
        writeln!(out, "impl {} {{", type_name).unwrap();
        out.push_str("    pub fn from_code(code: i32) -> Option<Self> {\n");
        out.push_str("        match code {\n");
        for entry in entries {
            writeln!(out, "            {} => Some({}::{}),", entry.value, type_name, entry.type_name)
                .unwrap();
        }
        out.push_str("            _ => None,\n        }\n    }\n}\n\n");
    }

    out.push_str("/// The partition every status-returning wrapper checks against.\n");
    out.push_str("pub static RESULT_CODES: Lazy<CodeTable> = Lazy::new(|| {\n");
    writeln!(out, "    CodeTable::new(\n        {},", complete).unwrap();
    out.push_str("        &[\n");
    for entry in &partition.successes {
        writeln!(out, "            ({}, {:?}),", entry.value, entry.symbol).unwrap();
    }
    out.push_str("        ],\n        &[\n");
    for entry in &partition.errors {
        writeln!(out, "            ({}, {:?}),", entry.value, entry.symbol).unwrap();
    }
    out.push_str("        ],\n    )\n});\n");
}

/// `PFN_vkAllocationFunction` -> `vkAllocationFunction`.
fn funcpointer_stem(pfn_name: &str) -> &str {
    pfn_name.strip_prefix("PFN_").unwrap_or(pfn_name)
}

/// The return fragment of a funcpointer signature, `None` for void.
fn funcpointer_ret(return_type: &str) -> Option<String> {
    let stars = return_type.matches('*').count();
    let base = return_type.replace('*', "");
    let base = base.trim().trim_start_matches("const ").trim();
    if base == "void" && stars == 0 {
        return None;
    }
    let mut out = String::new();
    for _ in 0..stars {
        out.push_str("*mut ");
    }
    out.push_str(base_type(base));
    Some(out)
}

fn funcpointer_params(info: &FuncPointerInfo) -> (String, String) {
    let decls: Vec<String> = info
        .params
        .iter()
        .map(|p| format!("{}: {}", p.name, raw_type(&p.type_name, p.pointer, false)))
        .collect();
    let names: Vec<&str> = info.params.iter().map(|p| p.name.as_str()).collect();
    (decls.join(", "), names.join(", "))
}

fn write_funcpointers(model: &Model, out: &mut String) {
    for (pfn_name, info) in &model.funcpointers {
        let stem = funcpointer_stem(pfn_name);
        let slot = format!("{}_CALLBACK", stem.to_shouty_snake_case());
        let alias = format!("{}Callback", cap_first(stem));
        let (decls, names) = funcpointer_params(info);
        let ret = funcpointer_ret(&info.return_type);
        let ret_frag = ret.as_ref().map(|r| format!(" -> {}", r)).unwrap_or_default();

        writeln!(out, "pub type {} = unsafe extern \"system\" fn({}){};", pfn_name, decls, ret_frag)
            .unwrap();
        writeln!(
            out,
            "pub type {} = Box<dyn FnMut({}){} + Send>;",
            alias,
            info.params
                .iter()
                .map(|p| raw_type(&p.type_name, p.pointer, false))
                .collect::<Vec<_>>()
                .join(", "),
            ret_frag
        )
        .unwrap();
        writeln!(out, "pub static {}: CallbackSlot<{}> = CallbackSlot::new();", slot, alias)
            .unwrap();
        writeln!(
            out,
            "unsafe extern \"system\" fn _trampoline_{}({}){} {{",
            stem, decls, ret_frag
        )
        .unwrap();
        match ret.as_deref() {
            None => {
                writeln!(out, "    let _ = {}.invoke(|cb| cb({}));", slot, names).unwrap();
            }
            Some(r) if r.starts_with('*') => {
                writeln!(
                    out,
                    "    {}.invoke(|cb| cb({})).unwrap_or(ptr::null_mut())",
                    slot, names
                )
                .unwrap();
            }
            Some(_) => {
                writeln!(out, "    {}.invoke(|cb| cb({})).unwrap_or_default()", slot, names)
                    .unwrap();
            }
        }
        out.push_str("}\n\n");
    }
}

/// How one aggregate member surfaces in the generated type and its
/// constructor.
struct Lowered {
    field_type: String,
    param: String,
    init: String,
    uses_arena: bool,
}

/// Count members auto-populated from a sibling array argument:
/// member name -> the array member whose slice length supplies the value.
fn count_sources(shape: &StructShape) -> HashMap<&str, &str> {
    let mut sources = HashMap::new();
    for member in &shape.members {
        let len = match member.len.as_deref() {
            Some(len) => len,
            None => continue,
        };
        let lowers_to_slice = member.pointer >= 1
            && (member.type_name == "char" && member.pointer == 2
                || member.type_name != "char" && member.is_const);
        if lowers_to_slice {
            sources.entry(len).or_insert(member.name.as_str());
        }
    }
    sources
}

fn lower_member(
    m: &ShapeMember,
    model: &Model,
    counts: &HashMap<&str, &str>,
) -> Lowered {
    let t = base_type(&m.type_name).to_owned();

    // Callback members: install the caller's logic, store the trampoline.
    if model.funcpointers.contains_key(&m.type_name) {
        let stem = funcpointer_stem(&m.type_name);
        let slot = format!("{}_CALLBACK", stem.to_shouty_snake_case());
        return Lowered {
            field_type: format!("Option<{}>", m.type_name),
            param: format!("{}: Option<{}Callback>", m.name, cap_first(stem)),
            init: format!(
                "match {} {{\n            Some(cb) => {{\n                {}.install(cb);\n                Some(_trampoline_{})\n            }}\n            None => None,\n        }}",
                m.name, slot, stem
            ),
            uses_arena: false,
        };
    }

    if let Some(len) = &m.array_len {
        return Lowered {
            field_type: format!("[{}; {}]", t, len),
            param: format!("{}: Option<[{}; {}]>", m.name, t, len),
            init: format!("{}.unwrap_or(unsafe {{ std::mem::zeroed() }})", m.name),
            uses_arena: false,
        };
    }

    if m.pointer == 0 {
        let init = match (&m.default, counts.get(m.name.as_str())) {
            (Some(default), _) => format!("{}.unwrap_or({})", m.name, default),
            (None, Some(array)) => format!(
                "{}.unwrap_or({}.map_or(0, |s| s.len() as {}))",
                m.name, array, t
            ),
            (None, None) => format!("{}.unwrap_or(unsafe {{ std::mem::zeroed() }})", m.name),
        };
        return Lowered {
            field_type: t.clone(),
            param: format!("{}: Option<{}>", m.name, t),
            init,
            uses_arena: false,
        };
    }

    let raw = raw_type(&m.type_name, m.pointer, m.is_const);
    if m.type_name == "char" && m.pointer == 1 {
        return Lowered {
            field_type: raw,
            param: format!("{}: Option<&str>", m.name),
            init: format!("{}.map_or(ptr::null(), |s| arena.alloc_cstr(s))", m.name),
            uses_arena: true,
        };
    }
    if m.type_name == "char" && m.pointer == 2 {
        return Lowered {
            field_type: raw,
            param: format!("{}: Option<&[&str]>", m.name),
            init: format!("{}.map_or(ptr::null(), |s| arena.alloc_cstr_array(s))", m.name),
            uses_arena: true,
        };
    }
    if m.type_name == "void" {
        let null = if m.is_const { "ptr::null()" } else { "ptr::null_mut()" };
        return Lowered {
            field_type: raw.clone(),
            param: format!("{}: Option<{}>", m.name, raw),
            init: format!("{}.unwrap_or({})", m.name, null),
            uses_arena: false,
        };
    }
    if m.is_const && m.pointer == 1 && m.len.is_some() {
        return Lowered {
            field_type: raw,
            param: format!("{}: Option<&[{}]>", m.name, t),
            init: format!(
                "{}.map_or(ptr::null(), |s| arena.alloc_slice(s) as *const {})",
                m.name, t
            ),
            uses_arena: true,
        };
    }
    if m.is_const && m.pointer == 1 {
        return Lowered {
            field_type: raw,
            param: format!("{}: Option<{}>", m.name, t),
            init: format!(
                "{}.map_or(ptr::null(), |v| arena.alloc_value(v) as *const {})",
                m.name, t
            ),
            uses_arena: true,
        };
    }

    // Mutable or multi-level pointers pass through untouched.
    let null = if m.is_const { "ptr::null()" } else { "ptr::null_mut()" };
    Lowered {
        field_type: raw.clone(),
        param: format!("{}: Option<{}>", m.name, raw),
        init: format!("{}.unwrap_or({})", m.name, null),
        uses_arena: false,
    }
}

fn write_aggregates(model: &Model, out: &mut String) {
    for shape in &model.structs {
        if shape.is_union {
            write_union(shape, model, out);
            continue;
        }
        let counts = count_sources(shape);
        let lowered: Vec<Lowered> = shape
            .members
            .iter()
            .map(|m| lower_member(m, model, &counts))
            .collect();

        out.push_str("#[repr(C)]\n#[derive(Debug, Clone, Copy)]\n");
        writeln!(out, "pub struct {} {{", shape.name).unwrap();
        for (member, low) in shape.members.iter().zip(&lowered) {
            writeln!(out, "    pub {}: {},", member.name, low.field_type).unwrap();
        }
        out.push_str("}\n\n");

        let uses_arena = lowered.iter().any(|l| l.uses_arena);
        writeln!(out, "pub fn {}(", shape.name).unwrap();
        if uses_arena {
            out.push_str("    arena: &mut MarshalArena,\n");
        }
        for low in &lowered {
            writeln!(out, "    {},", low.param).unwrap();
        }
        writeln!(out, ") -> {} {{", shape.name).unwrap();
        writeln!(out, "    {} {{", shape.name).unwrap();
        for (member, low) in shape.members.iter().zip(&lowered) {
            writeln!(out, "        {}: {},", member.name, low.init).unwrap();
        }
        out.push_str("    }\n}\n\n");
    }
}

fn write_union(shape: &StructShape, model: &Model, out: &mut String) {
    let counts = HashMap::new();
    let lowered: Vec<Lowered> = shape
        .members
        .iter()
        .map(|m| lower_member(m, model, &counts))
        .collect();

    out.push_str("#[repr(C)]\n#[derive(Clone, Copy)]\n");
    writeln!(out, "pub union {} {{", shape.name).unwrap();
    for (member, low) in shape.members.iter().zip(&lowered) {
        writeln!(out, "    pub {}: {},", member.name, low.field_type).unwrap();
    }
    out.push_str("}\n\n");

    // One constructor, every variant omittable; the last supplied one wins.
    writeln!(out, "pub fn {}(", shape.name).unwrap();
    for low in &lowered {
        writeln!(out, "    {},", low.param).unwrap();
    }
    writeln!(out, ") -> {} {{", shape.name).unwrap();
    writeln!(out, "    let mut value: {} = unsafe {{ std::mem::zeroed() }};", shape.name).unwrap();
    for member in &shape.members {
        writeln!(out, "    if let Some(v) = {} {{", member.name).unwrap();
        writeln!(out, "        value.{} = v;", member.name).unwrap();
        out.push_str("    }\n");
    }
    out.push_str("    value\n}\n\n");
}

/// One logical wrapper parameter: its declaration, an optional marshaling
/// statement, and the expression handed to the native call.
struct LoweredParam {
    name: String,
    ty: String,
    prologue: Option<String>,
    pass: String,
    uses_arena: bool,
}

fn lower_param(p: &ParamSig) -> LoweredParam {
    let t = base_type(&p.type_name).to_owned();
    let raw = raw_type(&p.type_name, p.pointer, p.is_const);

    if p.pointer == 0 {
        return LoweredParam {
            name: p.name.clone(),
            ty: t,
            prologue: None,
            pass: p.name.clone(),
            uses_arena: false,
        };
    }
    if p.type_name == "char" && p.pointer == 1 && p.is_const {
        return LoweredParam {
            name: p.name.clone(),
            ty: "&str".to_owned(),
            prologue: Some(format!("let {0}_ptr = arena.alloc_cstr({0});", p.name)),
            pass: format!("{}_ptr", p.name),
            uses_arena: true,
        };
    }
    if p.type_name == "char" && p.pointer == 2 {
        return LoweredParam {
            name: p.name.clone(),
            ty: "&[&str]".to_owned(),
            prologue: Some(format!("let {0}_ptr = arena.alloc_cstr_array({0});", p.name)),
            pass: format!("{}_ptr", p.name),
            uses_arena: true,
        };
    }
    if p.type_name == "void" {
        if p.nullable_default {
            let null = if p.is_const { "ptr::null()" } else { "ptr::null_mut()" };
            return LoweredParam {
                name: p.name.clone(),
                ty: format!("Option<{}>", raw),
                prologue: None,
                pass: format!("{}.unwrap_or({})", p.name, null),
                uses_arena: false,
            };
        }
        return LoweredParam {
            name: p.name.clone(),
            ty: raw,
            prologue: None,
            pass: p.name.clone(),
            uses_arena: false,
        };
    }
    if p.nullable_default {
        return LoweredParam {
            name: p.name.clone(),
            ty: format!("Option<&{}>", t),
            prologue: None,
            pass: format!("{}.map_or(ptr::null(), |r| r as *const {})", p.name, t),
            uses_arena: false,
        };
    }
    if p.is_const && p.pointer == 1 && p.len.is_some() {
        return LoweredParam {
            name: p.name.clone(),
            ty: format!("&[{}]", t),
            prologue: None,
            pass: format!("{}.as_ptr()", p.name),
            uses_arena: false,
        };
    }
    if p.is_const && p.pointer == 1 {
        return LoweredParam {
            name: p.name.clone(),
            ty: format!("&{}", t),
            prologue: None,
            pass: format!("{} as *const {}", p.name, t),
            uses_arena: false,
        };
    }
    if !p.is_const && p.pointer == 1 {
        return LoweredParam {
            name: p.name.clone(),
            ty: format!("&mut {}", t),
            prologue: None,
            pass: format!("{} as *mut {}", p.name, t),
            uses_arena: false,
        };
    }
    LoweredParam {
        name: p.name.clone(),
        ty: raw,
        prologue: None,
        pass: p.name.clone(),
        uses_arena: false,
    }
}

fn raw_return(kind: &ReturnKind) -> Option<String> {
    match kind {
        ReturnKind::Status => Some("VkResult".to_owned()),
        ReturnKind::Boolean => Some("VkBool32".to_owned()),
        ReturnKind::Void => None,
        ReturnKind::Other(t) => Some(base_type(t).to_owned()),
    }
}

/// The element/output type a convention's trailing parameter produces.
fn output_type(f: &FunctionSignature) -> String {
    f.params
        .last()
        .map(|p| base_type(&p.type_name).to_owned())
        .unwrap_or_else(|| "c_void".to_owned())
}

fn wrapper_return(f: &FunctionSignature) -> String {
    match &f.convention {
        Convention::Direct => match &f.return_kind {
            ReturnKind::Status => "Result<Completion, Error>".to_owned(),
            ReturnKind::Boolean => "Result<VkBool32, Error>".to_owned(),
            ReturnKind::Void => "Result<(), Error>".to_owned(),
            ReturnKind::Other(t) => format!("Result<{}, Error>", base_type(t)),
        },
        Convention::SingleAllocate { static_count } => {
            let inner = if static_count.is_some() {
                format!("Vec<{}>", output_type(f))
            } else {
                output_type(f)
            };
            match f.return_kind {
                ReturnKind::Status => format!("Result<(Completion, {}), Error>", inner),
                _ => format!("Result<{}, Error>", inner),
            }
        }
        Convention::QueryThenFill => match f.return_kind {
            ReturnKind::Status => format!("Result<(Completion, Vec<{}>), Error>", output_type(f)),
            _ => format!("Result<Vec<{}>, Error>", output_type(f)),
        },
    }
}

/// Writes the wrapper body shared by core functions and extension binders.
/// `native` is in scope as the typed entry point.
fn write_body(f: &FunctionSignature, out: &mut String, indent: &str) {
    let logical: Vec<LoweredParam> = f
        .params
        .iter()
        .filter(|p| !p.output)
        .map(lower_param)
        .collect();
    if logical.iter().any(|l| l.uses_arena) {
        writeln!(out, "{}let mut arena = MarshalArena::new();", indent).unwrap();
    }
    for prologue in logical.iter().filter_map(|l| l.prologue.as_deref()) {
        writeln!(out, "{}{}", indent, prologue).unwrap();
    }
    let args: Vec<&str> = logical.iter().map(|l| l.pass.as_str()).collect();
    let args = args.join(", ");
    let sep = if args.is_empty() { "" } else { ", " };

    match &f.convention {
        Convention::Direct => match &f.return_kind {
            ReturnKind::Status => {
                writeln!(out, "{}let result = unsafe {{ native({}) }};", indent, args).unwrap();
                writeln!(out, "{}Ok(RESULT_CODES.check(result)?)", indent).unwrap();
            }
            ReturnKind::Void => {
                writeln!(out, "{}unsafe {{ native({}) }};", indent, args).unwrap();
                writeln!(out, "{}Ok(())", indent).unwrap();
            }
            _ => {
                writeln!(out, "{}Ok(unsafe {{ native({}) }})", indent, args).unwrap();
            }
        },
        Convention::SingleAllocate { static_count } => {
            let out_ty = output_type(f);
            match static_count {
                Some(sc) => {
                    writeln!(out, "{}let count = {}.{} as usize;", indent, sc.param, sc.field)
                        .unwrap();
                    writeln!(
                        out,
                        "{}let mut out: Vec<{}> = Vec::with_capacity(count);",
                        indent, out_ty
                    )
                    .unwrap();
                    writeln!(out, "{}unsafe {{", indent).unwrap();
                    writeln!(out, "{}    ptr::write_bytes(out.as_mut_ptr(), 0, count);", indent)
                        .unwrap();
                    writeln!(out, "{}    out.set_len(count);", indent).unwrap();
                    writeln!(out, "{}}}", indent).unwrap();
                    match f.return_kind {
                        ReturnKind::Status => {
                            writeln!(
                                out,
                                "{}let result = unsafe {{ native({}{}out.as_mut_ptr()) }};",
                                indent, args, sep
                            )
                            .unwrap();
                            writeln!(out, "{}let completion = RESULT_CODES.check(result)?;", indent)
                                .unwrap();
                            writeln!(out, "{}Ok((completion, out))", indent).unwrap();
                        }
                        _ => {
                            writeln!(
                                out,
                                "{}unsafe {{ native({}{}out.as_mut_ptr()) }};",
                                indent, args, sep
                            )
                            .unwrap();
                            writeln!(out, "{}Ok(out)", indent).unwrap();
                        }
                    }
                }
                None => {
                    writeln!(
                        out,
                        "{}let mut out = std::mem::MaybeUninit::<{}>::zeroed();",
                        indent, out_ty
                    )
                    .unwrap();
                    match f.return_kind {
                        ReturnKind::Status => {
                            writeln!(
                                out,
                                "{}let result = unsafe {{ native({}{}out.as_mut_ptr()) }};",
                                indent, args, sep
                            )
                            .unwrap();
                            writeln!(out, "{}let completion = RESULT_CODES.check(result)?;", indent)
                                .unwrap();
                            writeln!(
                                out,
                                "{}Ok((completion, unsafe {{ out.assume_init() }}))",
                                indent
                            )
                            .unwrap();
                        }
                        _ => {
                            writeln!(
                                out,
                                "{}unsafe {{ native({}{}out.as_mut_ptr()) }};",
                                indent, args, sep
                            )
                            .unwrap();
                            writeln!(out, "{}Ok(unsafe {{ out.assume_init() }})", indent).unwrap();
                        }
                    }
                }
            }
        }
        Convention::QueryThenFill => {
            let elem = output_type(f);
            match f.return_kind {
                ReturnKind::Status => {
                    writeln!(out, "{}let (completion, items) = unsafe {{", indent).unwrap();
                    writeln!(
                        out,
                        "{}    query_then_fill::<{}>(&RESULT_CODES, |count, data| {{",
                        indent, elem
                    )
                    .unwrap();
                    writeln!(out, "{}        native({}{}count, data)", indent, args, sep).unwrap();
                    writeln!(out, "{}    }})", indent).unwrap();
                    writeln!(out, "{}}}?;", indent).unwrap();
                    writeln!(out, "{}Ok((completion, items))", indent).unwrap();
                }
                _ => {
                    writeln!(out, "{}let items = unsafe {{", indent).unwrap();
                    writeln!(
                        out,
                        "{}    query_then_fill_void::<{}>(|count, data| {{",
                        indent, elem
                    )
                    .unwrap();
                    writeln!(out, "{}        native({}{}count, data);", indent, args, sep).unwrap();
                    writeln!(out, "{}    }})", indent).unwrap();
                    writeln!(out, "{}}};", indent).unwrap();
                    writeln!(out, "{}Ok(items)", indent).unwrap();
                }
            }
        }
    }
}

fn write_functions(model: &Model, out: &mut String) {
    for f in &model.functions {
        let raw_params: Vec<String> = f
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, raw_type(&p.type_name, p.pointer, p.is_const)))
            .collect();
        let ret_frag = raw_return(&f.return_kind)
            .map(|r| format!(" -> {}", r))
            .unwrap_or_default();
        writeln!(
            out,
            "type PFN_{} = unsafe extern \"system\" fn({}){};",
            f.name,
            raw_params.join(", "),
            ret_frag
        )
        .unwrap();

        let logical: Vec<LoweredParam> = f
            .params
            .iter()
            .filter(|p| !p.output)
            .map(lower_param)
            .collect();
        let decls: Vec<String> = logical
            .iter()
            .map(|l| format!("{}: {}", l.name, l.ty))
            .collect();
        let ret = wrapper_return(f);

        if f.is_extension {
            // Reachable only through the dynamic-dispatch front doors; the
            // binder adapts the resolved address into the typed callable.
            writeln!(
                out,
                "pub type {}Fn = Box<dyn Fn({}) -> {} + Send + Sync>;",
                cap_first(&f.name),
                logical.iter().map(|l| l.ty.clone()).collect::<Vec<_>>().join(", "),
                ret
            )
            .unwrap();
            writeln!(out, "fn _bind_{}(raw: PfnVoidFunction) -> BoundProc {{", f.name).unwrap();
            writeln!(
                out,
                "    let native: PFN_{} = unsafe {{ std::mem::transmute(raw) }};",
                f.name
            )
            .unwrap();
            writeln!(
                out,
                "    let wrapper: {}Fn = Box::new(move |{}| {{",
                cap_first(&f.name),
                logical.iter().map(|l| l.name.clone()).collect::<Vec<_>>().join(", ")
            )
            .unwrap();
            write_body(f, out, "        ");
            out.push_str("    });\n    std::sync::Arc::new(wrapper)\n}\n\n");
        } else {
            writeln!(out, "pub fn {}({}) -> {} {{", f.name, decls.join(", "), ret).unwrap();
            writeln!(
                out,
                "    let native: PFN_{0} = unsafe {{ std::mem::transmute(VulkanLibrary::get()?.symbol({0:?})?) }};",
                f.name
            )
            .unwrap();
            write_body(f, out, "    ");
            out.push_str("}\n\n");
        }

        write_strings_helper(f, model, out);
    }
}

/// For query-then-fill results whose elements carry fixed-width character
/// buffers, a lazily decoded view over the returned array.
fn write_strings_helper(f: &FunctionSignature, model: &Model, out: &mut String) {
    if f.convention != Convention::QueryThenFill {
        return;
    }
    let elem = output_type(f);
    let field = match model
        .struct_has_str(&elem)
        .and_option_from(|| char_array_member(model, &elem))
    {
        Some(field) => field,
        None => return,
    };
    writeln!(
        out,
        "pub fn {}Strings(items: &[{}]) -> DecodedStrings<'_, {}> {{",
        f.name, elem, elem
    )
    .unwrap();
    writeln!(out, "    DecodedStrings::new(items, |item| &item.{})", field).unwrap();
    out.push_str("}\n\n");
}

fn char_array_member<'m>(model: &'m Model, type_name: &str) -> Option<&'m str> {
    model.struct_shape(type_name).and_then(|shape| {
        shape
            .members
            .iter()
            .find(|m| m.type_name == "char" && m.array_len.is_some())
            .map(|m| m.name.as_str())
    })
}

fn write_dispatch(model: &Model, out: &mut String) {
    out.push_str(
        "/// Registers every generated extension wrapper with the process-wide\n\
         /// dispatch registry. Call once before resolving extension entry points.\n",
    );
    out.push_str("pub fn register_extension_procs() {\n");
    out.push_str("    let reg = ProcRegistry::global();\n");
    for f in &model.functions {
        if !f.is_extension {
            continue;
        }
        let scope = match model.extensions.owner(&f.name) {
            Some((_, scope)) => scope,
            None => continue,
        };
        writeln!(
            out,
            "    reg.register(Scope::{:?}, {:?}, _bind_{});",
            scope, f.name, f.name
        )
        .unwrap();
    }
    out.push_str("}\n\n");
    out.push_str(include_str!("dispatch_doors.rs"));
}
