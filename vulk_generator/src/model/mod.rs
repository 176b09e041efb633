//! The typed registry model: the immutable product of the build stages the
//! emitters consume. Built once per generator run; nothing mutates it
//! afterwards.

pub mod classify;
pub mod enums;

pub use classify::{
    Convention, FunctionSignature, ParamSig, ResultPartition, ReturnKind, StaticCount,
};
pub use enums::{ConstValue, EnumSet, SetKind};

use std::collections::{BTreeMap, HashMap};

use crate::registry::{Command, Registry, TypeDecl};
use crate::GenError;

/// Whether a function resolves through the instance-level or device-level
/// dynamic-dispatch namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Instance,
    Device,
}

/// Function name → owning extension and its scope. A function with no
/// entry here is a core function.
#[derive(Debug, Default)]
pub struct ExtensionOwnership {
    by_function: BTreeMap<String, (String, Scope)>,
}

impl ExtensionOwnership {
    pub fn owner(&self, function: &str) -> Option<(&str, Scope)> {
        self.by_function
            .get(function)
            .map(|(ext, scope)| (ext.as_str(), *scope))
    }

    pub fn is_extension(&self, function: &str) -> bool {
        self.by_function.contains_key(function)
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, &str, Scope)> {
        self.by_function
            .iter()
            .map(|(f, (ext, scope))| (f.as_str(), ext.as_str(), *scope))
    }

    fn insert(&mut self, function: &str, extension: &str, scope: Scope) {
        match self.by_function.get(function) {
            Some((owner, _)) if owner != extension => {
                log::warn!(
                    "{} is listed by both {} and {}; keeping {}",
                    function,
                    owner,
                    extension,
                    owner
                );
            }
            Some(_) => {}
            None => {
                self.by_function
                    .insert(function.to_owned(), (extension.to_owned(), scope));
            }
        }
    }
}

/// An aggregate's ordered member descriptors, as the constructor emitter
/// needs them.
#[derive(Debug, Clone)]
pub struct StructShape {
    pub name: String,
    pub is_union: bool,
    pub members: Vec<ShapeMember>,
}

#[derive(Debug, Clone)]
pub struct ShapeMember {
    pub name: String,
    pub type_name: String,
    pub pointer: u8,
    pub is_const: bool,
    pub array_len: Option<String>,
    /// The registry-mandated default (`sType` values).
    pub default: Option<String>,
    /// The sibling member holding this array's element count, after
    /// filtering out documentation-only lengths.
    pub len: Option<String>,
}

/// A function-pointer type: the struct that carries it (the callback
/// registration key) and the signature its trampoline needs.
#[derive(Debug, Clone)]
pub struct FuncPointerInfo {
    pub owner_struct: Option<String>,
    pub return_type: String,
    pub params: Vec<crate::registry::FuncParam>,
}

/// The complete registry model.
#[derive(Debug, Default)]
pub struct Model {
    pub typedefs: BTreeMap<String, String>,
    pub enums: BTreeMap<String, EnumSet>,
    pub macros: BTreeMap<String, ConstValue>,
    pub funcpointers: BTreeMap<String, FuncPointerInfo>,
    pub structs: Vec<StructShape>,
    pub functions: Vec<FunctionSignature>,
    pub result_partition: ResultPartition,
    pub extensions: ExtensionOwnership,
    pub aliases: BTreeMap<String, String>,
}

impl Model {
    /// Runs every build stage over the raw registry. Pure except for
    /// warn-and-skip logging; optional/extension gaps are skipped, a
    /// classification ambiguity or missing core data aborts the build.
    pub fn build(registry: &Registry) -> Result<Model, GenError> {
        let aliases = collect_aliases(registry);
        let typedefs = build_typedefs(registry);
        let mut enum_sets = enums::build_enum_sets(registry);
        let macros = build_macros(registry, &mut enum_sets);
        let funcpointers = build_funcpointers(registry);
        let structs = build_structs(registry);
        let extensions = build_ownership(registry, &aliases);
        let functions = build_functions(registry, &extensions)?;
        let result_partition =
            classify::build_result_partition(enum_sets.get("VkResult"), &registry.commands);

        let has_status_fn = functions
            .iter()
            .any(|f| f.return_kind == ReturnKind::Status);
        if has_status_fn && !enum_sets.contains_key("VkResult") {
            return Err(GenError::MissingData(
                "status-returning commands declared but VkResult is not".to_owned(),
            ));
        }

        Ok(Model {
            typedefs,
            enums: enum_sets,
            macros,
            funcpointers,
            structs,
            functions,
            result_partition,
            extensions,
            aliases,
        })
    }

    /// Whether an aggregate carries character data in any member, which
    /// makes query-then-fill results over it eligible for the decoded
    /// string view.
    pub fn struct_has_str(&self, type_name: &str) -> bool {
        self.structs
            .iter()
            .find(|s| s.name == type_name)
            .map(|s| s.members.iter().any(|m| m.type_name.contains("char")))
            .unwrap_or(false)
    }

    pub fn struct_shape(&self, type_name: &str) -> Option<&StructShape> {
        self.structs.iter().find(|s| s.name == type_name)
    }
}

/// Deprecated → canonical names for types and commands, one hop. The
/// source registry guarantees the absence of chains; a chain here means a
/// registry bug, so it is reported and the second hop ignored.
fn collect_aliases(registry: &Registry) -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    for decl in &registry.types {
        if let TypeDecl::Alias { name, alias } = decl {
            aliases.insert(name.clone(), alias.clone());
        }
    }
    for command in &registry.commands {
        if let Some(alias) = &command.alias {
            aliases.insert(command.name.clone(), alias.clone());
        }
    }
    for (name, target) in &aliases {
        if aliases.contains_key(target) {
            log::warn!("alias chain {} -> {} -> ...; only one hop is resolved", name, target);
        }
    }
    aliases
}

/// Platform surface types the registry leaves to the window-system
/// headers; declared here so the flattened declarations are
/// self-contained.
const PLATFORM_STRUCT_TYPES: [&str; 8] = [
    "Display",
    "xcb_connection_t",
    "wl_display",
    "wl_surface",
    "MirConnection",
    "MirSurface",
    "ANativeWindow",
    "SECURITY_ATTRIBUTES",
];
const PLATFORM_U32_TYPES: [&str; 4] = ["Window", "VisualID", "xcb_window_t", "xcb_visualid_t"];

fn build_typedefs(registry: &Registry) -> BTreeMap<String, String> {
    let mut typedefs = BTreeMap::new();
    for decl in &registry.types {
        match decl {
            TypeDecl::Basetype { name, typ } | TypeDecl::Bitmask { name, typ } => {
                typedefs.insert(name.clone(), typ.clone());
            }
            TypeDecl::Handle { name, dispatchable } => {
                // Dispatchable handles are opaque pointers, the rest are
                // 64-bit integers; either way exactly one representation.
                let underlying = if *dispatchable {
                    format!("struct {}_T*", name)
                } else {
                    "uint64_t".to_owned()
                };
                typedefs.insert(name.clone(), underlying);
            }
            _ => {}
        }
    }
    for name in PLATFORM_STRUCT_TYPES {
        typedefs.insert(name.to_owned(), format!("struct {}", name));
    }
    for name in PLATFORM_U32_TYPES {
        typedefs.insert(name.to_owned(), "uint32_t".to_owned());
    }
    typedefs
}

fn build_macros(
    registry: &Registry,
    enum_sets: &mut BTreeMap<String, EnumSet>,
) -> BTreeMap<String, ConstValue> {
    let mut macros = BTreeMap::new();

    for block in &registry.enum_blocks {
        if block.kind != crate::registry::EnumKind::Constants {
            continue;
        }
        for member in &block.members {
            match member {
                crate::registry::EnumMember::Value { name, value } => {
                    macros.insert(name.clone(), enums::parse_constant_value(value));
                }
                crate::registry::EnumMember::Bitpos { name, bitpos } => {
                    macros.insert(name.clone(), ConstValue::Hex32(1u32 << bitpos));
                }
                crate::registry::EnumMember::Alias { name, alias } => {
                    macros.insert(name.clone(), ConstValue::Symbol(alias.clone()));
                }
            }
        }
    }

    for ext in &registry.extensions {
        macros.insert(ext.name.clone(), ConstValue::Int(1));
        for req in &ext.requires {
            for en in &req.enums {
                let value = match enums::resolve_extension_constant(&en.spec, ext.number) {
                    Some(value) => value,
                    None => continue,
                };
                match &en.extends {
                    // Values extending an enum merge into that set, not the
                    // flat table.
                    Some(target) => {
                        enums::merge_extension_member(enum_sets, target, &en.name, &value)
                    }
                    None => {
                        macros.entry(en.name.clone()).or_insert(value);
                    }
                }
            }
        }
    }

    macros
}

fn build_funcpointers(registry: &Registry) -> BTreeMap<String, FuncPointerInfo> {
    let mut funcpointers = BTreeMap::new();
    for decl in &registry.types {
        let (pfn, return_type, params) = match decl {
            TypeDecl::FuncPointer { name, return_type, params } => (name, return_type, params),
            _ => continue,
        };
        let owner = registry.types.iter().find_map(|t| match t {
            TypeDecl::Struct { name, members }
                if members.iter().any(|m| &m.type_name == pfn) =>
            {
                Some(name.clone())
            }
            _ => None,
        });
        if owner.is_none() {
            log::warn!("funcpointer {} appears in no struct", pfn);
        }
        funcpointers.insert(
            pfn.clone(),
            FuncPointerInfo {
                owner_struct: owner,
                return_type: return_type.clone(),
                params: params.clone(),
            },
        );
    }
    funcpointers
}

fn build_structs(registry: &Registry) -> Vec<StructShape> {
    let mut structs = Vec::new();
    for decl in &registry.types {
        let (name, members, is_union) = match decl {
            TypeDecl::Struct { name, members } => (name, members, false),
            TypeDecl::Union { name, members } => (name, members, true),
            _ => continue,
        };
        structs.push(StructShape {
            name: name.clone(),
            is_union,
            members: members
                .iter()
                .map(|m| ShapeMember {
                    name: m.name.clone(),
                    type_name: m.type_name.clone(),
                    pointer: m.pointer,
                    is_const: m.is_const,
                    array_len: m.array_len.clone(),
                    default: m.values.clone(),
                    len: parse_len(m.len.as_deref()),
                })
                .collect(),
        });
    }
    structs
}

/// Keeps only machine-usable length references: the first element of a
/// comma list, and never free-text or "null-terminated" documentation.
fn parse_len(len: Option<&str>) -> Option<String> {
    let len = len?;
    let first = len.split(',').next().unwrap_or(len);
    if first.contains("latex") || first.contains("null-terminated") {
        return None;
    }
    Some(first.to_owned())
}

fn build_ownership(registry: &Registry, aliases: &BTreeMap<String, String>) -> ExtensionOwnership {
    let mut ownership = ExtensionOwnership::default();

    for ext in &registry.extensions {
        let scope = match ext.ext_type.as_deref() {
            Some("instance") => Scope::Instance,
            Some("device") => Scope::Device,
            Some(other) => {
                log::warn!("extension {} has unknown type {:?}; skipping", ext.name, other);
                continue;
            }
            None => continue,
        };
        for req in &ext.requires {
            for command in &req.commands {
                ownership.insert(command, &ext.name, scope);
            }
        }
    }

    // A deprecated alias of a listed canonical command stays reachable
    // under the same extension and scope.
    for (alias, canonical) in aliases {
        if let Some((ext, scope)) = ownership
            .owner(canonical)
            .map(|(e, s)| (e.to_owned(), s))
        {
            ownership.insert(alias, &ext, scope);
        }
    }

    ownership
}

fn build_functions(
    registry: &Registry,
    extensions: &ExtensionOwnership,
) -> Result<Vec<FunctionSignature>, GenError> {
    let canonical: HashMap<&str, &Command> = registry
        .commands
        .iter()
        .filter(|c| c.alias.is_none())
        .map(|c| (c.name.as_str(), c))
        .collect();

    let mut functions = Vec::new();
    for command in &registry.commands {
        // Aliases take their canonical target's signature before
        // classification.
        let resolved;
        let command = match &command.alias {
            Some(alias) => match canonical.get(alias.as_str()) {
                Some(target) => {
                    resolved = Command { name: command.name.clone(), ..(*target).clone() };
                    &resolved
                }
                None => {
                    log::warn!("{} aliases unknown command {}; skipping", command.name, alias);
                    continue;
                }
            },
            None => command,
        };

        if classify::CUSTOM_FUNCTIONS.contains(command.name.as_str()) {
            continue;
        }

        functions.push(classify::signature(
            command,
            extensions.is_extension(&command.name),
        )?);
    }
    Ok(functions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    const SAMPLE: &str = r#"
    <registry>
        <types>
            <type category="bitmask">typedef <type>VkFlags</type> <name>VkSurfaceTransformFlagsKHR</name>;</type>
            <type category="handle"><type>VK_DEFINE_HANDLE</type>(<name>VkInstance</name>)</type>
            <type category="handle"><type>VK_DEFINE_NON_DISPATCHABLE_HANDLE</type>(<name>VkSurfaceKHR</name>)</type>
            <type category="enum" name="VkResult"/>
            <type category="funcpointer">typedef void* <name>PFN_vkAllocationFunction</name></type>
            <type category="struct" name="VkAllocationCallbacks">
                <member><type>void</type>* <name>pUserData</name></member>
                <member><type>PFN_vkAllocationFunction</type> <name>pfnAllocation</name></member>
            </type>
            <type category="struct" name="VkInstanceCreateInfo">
                <member values="VK_STRUCTURE_TYPE_INSTANCE_CREATE_INFO"><type>VkStructureType</type> <name>sType</name></member>
                <member><type>uint32_t</type> <name>enabledLayerCount</name></member>
                <member len="enabledLayerCount,null-terminated">const <type>char</type>* const* <name>ppEnabledLayerNames</name></member>
                <member len="latex:\textrm{foo}">const <type>void</type>* <name>pWeird</name></member>
            </type>
        </types>
        <enums name="API Constants">
            <enum name="VK_MAX_EXTENSION_NAME_SIZE" value="256"/>
            <enum name="VK_LOD_CLAMP_NONE" value="1000.0f"/>
        </enums>
        <enums name="VkResult" type="enum">
            <enum name="VK_SUCCESS" value="0"/>
            <enum name="VK_INCOMPLETE" value="5"/>
            <enum name="VK_ERROR_SURFACE_LOST_KHR" value="-1000000000"/>
        </enums>
        <commands>
            <command successcodes="VK_SUCCESS,VK_INCOMPLETE" errorcodes="VK_ERROR_SURFACE_LOST_KHR">
                <proto><type>VkResult</type> <name>vkGetPhysicalDeviceSurfaceFormatsKHR</name></proto>
                <param><type>VkPhysicalDevice</type> <name>physicalDevice</name></param>
                <param><type>VkSurfaceKHR</type> <name>surface</name></param>
                <param><type>uint32_t</type>* <name>pSurfaceFormatCount</name></param>
                <param><type>VkSurfaceFormatKHR</type>* <name>pSurfaceFormats</name></param>
            </command>
            <command name="vkGetPhysicalDeviceSurfaceFormats2Compat" alias="vkGetPhysicalDeviceSurfaceFormatsKHR"/>
        </commands>
        <extensions>
            <extension name="VK_KHR_surface" number="1" type="instance">
                <require>
                    <command name="vkGetPhysicalDeviceSurfaceFormatsKHR"/>
                    <enum name="VK_KHR_SURFACE_SPEC_VERSION" value="25"/>
                    <enum name="VK_ERROR_NATIVE_WINDOW_IN_USE_KHR" offset="1" dir="-" extends="VkResult"/>
                </require>
            </extension>
        </extensions>
    </registry>"#;

    fn model() -> Model {
        Model::build(&Registry::parse(SAMPLE.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn typedefs_have_one_underlying_representation() {
        let m = model();
        assert_eq!(m.typedefs["VkSurfaceTransformFlagsKHR"], "VkFlags");
        assert_eq!(m.typedefs["VkInstance"], "struct VkInstance_T*");
        assert_eq!(m.typedefs["VkSurfaceKHR"], "uint64_t");
        // Fixed platform block.
        assert_eq!(m.typedefs["xcb_window_t"], "uint32_t");
        assert_eq!(m.typedefs["wl_display"], "struct wl_display");
    }

    #[test]
    fn extension_result_codes_merge_into_the_enum_set() {
        let m = model();
        let result = &m.enums["VkResult"];
        assert_eq!(result.value_of("VK_ERROR_NATIVE_WINDOW_IN_USE_KHR"), Some(-1_000_000_001));
        // Merged after synthesis: the core range ignores extension codes.
        assert_eq!(result.value_of("VK_RESULT_BEGIN_RANGE"), Some(-1_000_000_000));
        assert!(!m.macros.contains_key("VK_ERROR_NATIVE_WINDOW_IN_USE_KHR"));
        // Non-extending constants stay in the flat table.
        assert_eq!(m.macros["VK_KHR_SURFACE_SPEC_VERSION"], ConstValue::Int(25));
        assert_eq!(m.macros["VK_KHR_surface"], ConstValue::Int(1));
    }

    #[test]
    fn doc_only_lengths_are_dropped() {
        let m = model();
        let info = m.struct_shape("VkInstanceCreateInfo").unwrap();
        assert_eq!(info.members[2].len.as_deref(), Some("enabledLayerCount"));
        assert_eq!(info.members[3].len, None);
        assert_eq!(info.members[0].default.as_deref(), Some("VK_STRUCTURE_TYPE_INSTANCE_CREATE_INFO"));
    }

    #[test]
    fn funcpointers_map_to_their_owning_struct() {
        let m = model();
        assert_eq!(
            m.funcpointers["PFN_vkAllocationFunction"].owner_struct.as_deref(),
            Some("VkAllocationCallbacks")
        );
    }

    #[test]
    fn alias_is_exposed_under_the_same_extension_scope() {
        let m = model();
        assert_eq!(
            m.extensions.owner("vkGetPhysicalDeviceSurfaceFormatsKHR"),
            Some(("VK_KHR_surface", Scope::Instance))
        );
        assert_eq!(
            m.extensions.owner("vkGetPhysicalDeviceSurfaceFormats2Compat"),
            Some(("VK_KHR_surface", Scope::Instance))
        );
        assert_eq!(
            m.aliases["vkGetPhysicalDeviceSurfaceFormats2Compat"],
            "vkGetPhysicalDeviceSurfaceFormatsKHR"
        );
    }

    #[test]
    fn alias_inherits_the_canonical_classification() {
        let m = model();
        let alias_fn = m
            .functions
            .iter()
            .find(|f| f.name == "vkGetPhysicalDeviceSurfaceFormats2Compat")
            .unwrap();
        assert_eq!(alias_fn.convention, Convention::QueryThenFill);
        assert!(alias_fn.is_extension);
        assert_eq!(alias_fn.params.len(), 4);
    }

    #[test]
    fn partition_covers_extension_codes() {
        let m = model();
        assert_eq!(m.result_partition.successes[0].symbol, "VK_INCOMPLETE");
        assert!(m
            .result_partition
            .errors
            .iter()
            .any(|e| e.symbol == "VK_ERROR_SURFACE_LOST_KHR"));
    }
}
