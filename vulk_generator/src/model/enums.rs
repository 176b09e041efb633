//! Enum sets, synthetic range members and constant-value resolution.

use std::collections::BTreeMap;

use heck::ToShoutySnakeCase;

use crate::registry::{EnumBlock, EnumKind, EnumMember, ExtEnumSpec, Registry, TypeDecl};

/// Vendor author tags stripped before deriving a synthetic member stem.
pub const VENDOR_SUFFIXES: [&str; 4] = ["KHR", "EXT", "NV", "AMD"];

const EXTENSION_BASE: i64 = 1_000_000_000;
const EXTENSION_BLOCK_SIZE: i64 = 1_000;
const MAX_ENUM_SENTINEL: i64 = 0x7FFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    Plain,
    Bitmask,
}

/// An ordered member-name → value mapping for one enum or bitmask type,
/// with the synthetic bookkeeping members appended.
#[derive(Debug, Clone)]
pub struct EnumSet {
    pub name: String,
    pub kind: SetKind,
    pub members: Vec<(String, i64)>,
}

impl EnumSet {
    pub fn value_of(&self, member: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .map(|&(_, value)| value)
    }

    fn contains(&self, member: &str) -> bool {
        self.members.iter().any(|(name, _)| name == member)
    }
}

/// A resolved constant. The variant fixes both the emitted Rust type and
/// the literal formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    /// Rendered as an 8-hex-digit literal (`1 << bitpos` values and `(~0U)`).
    Hex32(u32),
    /// `(~0ULL)`.
    U64Max,
    Float(f64),
    Str(String),
    /// A reference to another constant by name.
    Symbol(String),
}

impl ConstValue {
    /// The literal as it appears in the generated module.
    pub fn render(&self) -> String {
        match self {
            ConstValue::Int(v) => v.to_string(),
            ConstValue::Hex32(v) => format!("0x{:08x}", v),
            ConstValue::U64Max => "!0".to_owned(),
            ConstValue::Float(v) => {
                if v.fract() == 0.0 {
                    format!("{:.1}", v)
                } else {
                    v.to_string()
                }
            }
            ConstValue::Str(s) => format!("{:?}", s),
            ConstValue::Symbol(s) => s.clone(),
        }
    }

    /// The Rust type the constant is declared with.
    pub fn rust_type(&self) -> &'static str {
        match self {
            ConstValue::Int(v) if *v >= 0 && *v <= u32::MAX as i64 => "u32",
            ConstValue::Int(_) => "i64",
            ConstValue::Hex32(_) => "u32",
            ConstValue::U64Max => "u64",
            ConstValue::Float(_) => "f32",
            ConstValue::Str(_) => "&str",
            ConstValue::Symbol(_) => "u32",
        }
    }
}

/// The stem synthetic members are derived from: the SHOUTY_SNAKE form of
/// the type name with any vendor suffix stripped first.
pub fn synthetic_stem(name: &str) -> String {
    let base = VENDOR_SUFFIXES
        .iter()
        .find(|suffix| name.ends_with(*suffix))
        .map(|suffix| &name[..name.len() - suffix.len()])
        .unwrap_or(name);
    base.to_shouty_snake_case()
}

/// Appends the synthetic bookkeeping members. Plain enums get the range
/// quadruple computed from the span of their declared values; bitmasks get
/// the saturating sentinel only. Sets with no declared members get nothing.
pub fn synthesize(set: &mut EnumSet) {
    if set.members.is_empty() {
        return;
    }
    let stem = synthetic_stem(&set.name);
    match set.kind {
        SetKind::Bitmask => {
            set.members.push((format!("{}_MAX_ENUM", stem), MAX_ENUM_SENTINEL));
        }
        SetKind::Plain => {
            let min = set.members.iter().map(|&(_, v)| v).min().unwrap();
            let max = set.members.iter().map(|&(_, v)| v).max().unwrap();
            set.members.push((format!("{}_BEGIN_RANGE", stem), min));
            set.members.push((format!("{}_END_RANGE", stem), max));
            set.members.push((format!("{}_RANGE_SIZE", stem), max - min + 1));
            set.members.push((format!("{}_MAX_ENUM", stem), MAX_ENUM_SENTINEL));
        }
    }
}

/// Builds every enum set from the registry's typed enum blocks, resolving
/// same-set alias members one hop and appending the synthetic members.
/// Extension-contributed values are merged later, after synthesis, so the
/// ranges span declared members only, the same values the native headers
/// compute them from.
pub fn build_enum_sets(registry: &Registry) -> BTreeMap<String, EnumSet> {
    let mut sets = BTreeMap::new();

    // Every declared enum type gets a set, even if no block populates it.
    for decl in &registry.types {
        if let TypeDecl::Enum { name } = decl {
            sets.insert(
                name.clone(),
                EnumSet { name: name.clone(), kind: SetKind::Plain, members: Vec::new() },
            );
        }
    }

    for block in &registry.enum_blocks {
        let kind = match block.kind {
            EnumKind::Plain => SetKind::Plain,
            EnumKind::Bitmask => SetKind::Bitmask,
            EnumKind::Constants => continue,
        };
        let mut set = EnumSet { name: block.name.clone(), kind, members: Vec::new() };
        collect_block_members(block, &mut set);
        synthesize(&mut set);
        sets.insert(block.name.clone(), set);
    }

    sets
}

fn collect_block_members(block: &EnumBlock, set: &mut EnumSet) {
    for member in &block.members {
        match member {
            EnumMember::Value { name, value } => match parse_int(value) {
                Some(value) => set.members.push((name.clone(), value)),
                None => log::warn!("unparseable value for {}::{}; skipping", block.name, name),
            },
            EnumMember::Bitpos { name, bitpos } => {
                set.members.push((name.clone(), 1i64 << bitpos));
            }
            EnumMember::Alias { name, alias } => match set.value_of(alias) {
                Some(value) => set.members.push((name.clone(), value)),
                None => log::warn!(
                    "alias {}::{} targets unknown member {}; skipping",
                    block.name,
                    name,
                    alias
                ),
            },
        }
    }
}

/// Resolves an extension-require constant per the enumerant rules:
/// `bitpos` b is `1 << b`, `offset` o on extension e is
/// `1e9 + (e-1)*1000 + o` (negated for a negative direction), `value` is
/// taken literally.
pub fn resolve_extension_constant(spec: &ExtEnumSpec, ext_number: i64) -> Option<ConstValue> {
    match spec {
        ExtEnumSpec::Bitpos(bitpos) => Some(ConstValue::Hex32(1u32 << bitpos)),
        ExtEnumSpec::Value(value) => Some(parse_constant_value(value)),
        ExtEnumSpec::Offset { offset, negative } => {
            let value = EXTENSION_BASE + (ext_number - 1) * EXTENSION_BLOCK_SIZE + offset;
            Some(ConstValue::Int(if *negative { -value } else { value }))
        }
        ExtEnumSpec::Alias(alias) => Some(ConstValue::Symbol(alias.clone())),
        ExtEnumSpec::Reference => None,
    }
}

/// Parses a raw constant literal from the registry, normalizing the
/// handful of C spellings that appear in the API constant block.
pub fn parse_constant_value(text: &str) -> ConstValue {
    match text {
        "1000.0f" => return ConstValue::Float(1000.0),
        "(~0U)" => return ConstValue::Hex32(!0u32),
        "(~0ULL)" => return ConstValue::U64Max,
        _ => {}
    }
    if text.starts_with('"') && text.ends_with('"') && text.len() >= 2 {
        return ConstValue::Str(text[1..text.len() - 1].to_owned());
    }
    if let Some(value) = parse_int(text) {
        return ConstValue::Int(value);
    }
    if let Some(stripped) = text.strip_suffix('f') {
        if let Ok(value) = stripped.parse::<f64>() {
            return ConstValue::Float(value);
        }
    }
    if let Ok(value) = text.parse::<f64>() {
        return ConstValue::Float(value);
    }
    ConstValue::Symbol(text.to_owned())
}

/// Decimal or 0x-prefixed hexadecimal, optionally negative.
pub fn parse_int(text: &str) -> Option<i64> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let parsed = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => body.parse::<i64>().ok()?,
    };
    Some(if negative { -parsed } else { parsed })
}

/// Merges one extension-contributed member into its target set, after
/// synthesis. Existing names win; the registry repeats some enumerants
/// across extensions.
pub fn merge_extension_member(
    sets: &mut BTreeMap<String, EnumSet>,
    target: &str,
    name: &str,
    value: &ConstValue,
) {
    let set = match sets.get_mut(target) {
        Some(set) => set,
        None => {
            log::warn!("extension enum {} extends unknown type {}; skipping", name, target);
            return;
        }
    };
    if set.contains(name) {
        return;
    }
    let numeric = match value {
        ConstValue::Int(v) => *v,
        ConstValue::Hex32(v) => *v as i64,
        ConstValue::Symbol(alias) => match set.value_of(alias) {
            Some(v) => v,
            None => {
                log::warn!("extension enum {} aliases unknown member {}; skipping", name, alias);
                return;
            }
        },
        other => {
            log::warn!("extension enum {} has non-integer value {:?}; skipping", name, other);
            return;
        }
    };
    set.members.push((name.to_owned(), numeric));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(name: &str, members: &[(&str, i64)]) -> EnumSet {
        EnumSet {
            name: name.to_owned(),
            kind: SetKind::Plain,
            members: members.iter().map(|&(n, v)| (n.to_owned(), v)).collect(),
        }
    }

    #[test]
    fn plain_enum_gets_the_range_quadruple() {
        let mut set = plain(
            "VkImageType",
            &[("VK_IMAGE_TYPE_1D", 0), ("VK_IMAGE_TYPE_2D", 1), ("VK_IMAGE_TYPE_3D", 2)],
        );
        synthesize(&mut set);
        assert_eq!(set.value_of("VK_IMAGE_TYPE_BEGIN_RANGE"), Some(0));
        assert_eq!(set.value_of("VK_IMAGE_TYPE_END_RANGE"), Some(2));
        assert_eq!(set.value_of("VK_IMAGE_TYPE_RANGE_SIZE"), Some(3));
        assert_eq!(set.value_of("VK_IMAGE_TYPE_MAX_ENUM"), Some(0x7FFF_FFFF));
    }

    #[test]
    fn vendor_suffix_is_stripped_from_the_stem() {
        assert_eq!(synthetic_stem("VkColorSpaceKHR"), "VK_COLOR_SPACE");
        assert_eq!(synthetic_stem("VkDebugReportObjectTypeEXT"), "VK_DEBUG_REPORT_OBJECT_TYPE");
        assert_eq!(synthetic_stem("VkImageType"), "VK_IMAGE_TYPE");
    }

    #[test]
    fn bitmask_gets_only_the_sentinel() {
        let mut set = plain("VkQueueFlagBits", &[("VK_QUEUE_GRAPHICS_BIT", 1)]);
        set.kind = SetKind::Bitmask;
        synthesize(&mut set);
        assert_eq!(set.members.len(), 2);
        assert_eq!(set.value_of("VK_QUEUE_FLAG_BITS_MAX_ENUM"), Some(0x7FFF_FFFF));
        assert!(!set.members.iter().any(|(n, _)| n.contains("RANGE")));
    }

    #[test]
    fn empty_set_is_left_alone() {
        let mut set = plain("VkEmpty", &[]);
        synthesize(&mut set);
        assert!(set.members.is_empty());
    }

    #[test]
    fn negative_span_is_handled() {
        let mut set = plain("VkResult", &[("VK_SUCCESS", 0), ("VK_ERROR_DEVICE_LOST", -4)]);
        synthesize(&mut set);
        assert_eq!(set.value_of("VK_RESULT_BEGIN_RANGE"), Some(-4));
        assert_eq!(set.value_of("VK_RESULT_END_RANGE"), Some(0));
        assert_eq!(set.value_of("VK_RESULT_RANGE_SIZE"), Some(5));
    }

    #[test]
    fn bitpos_renders_as_eight_hex_digits() {
        let value = resolve_extension_constant(&ExtEnumSpec::Bitpos(4), 1).unwrap();
        assert_eq!(value.render(), "0x00000010");
    }

    #[test]
    fn offset_law_with_direction() {
        let plus = resolve_extension_constant(
            &ExtEnumSpec::Offset { offset: 3, negative: false },
            12,
        )
        .unwrap();
        assert_eq!(plus, ConstValue::Int(1_000_011_003));

        let minus = resolve_extension_constant(
            &ExtEnumSpec::Offset { offset: 3, negative: true },
            12,
        )
        .unwrap();
        assert_eq!(minus, ConstValue::Int(-1_000_011_003));
    }

    #[test]
    fn special_c_literals_are_normalized() {
        assert_eq!(parse_constant_value("(~0U)"), ConstValue::Hex32(0xffff_ffff));
        assert_eq!(parse_constant_value("(~0ULL)"), ConstValue::U64Max);
        assert_eq!(parse_constant_value("1000.0f"), ConstValue::Float(1000.0));
        assert_eq!(
            parse_constant_value("\"VK_KHR_surface\""),
            ConstValue::Str("VK_KHR_surface".to_owned())
        );
        assert_eq!(parse_constant_value("0x7FFFFFFF"), ConstValue::Int(0x7FFF_FFFF));
    }
}
