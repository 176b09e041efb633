//! The raw registry tree: a faithful, typed view of the registry XML with
//! no interpretation applied. Every entity kind is a tagged variant so the
//! model stages downstream can match exhaustively instead of probing for
//! attribute presence. Missing or malformed data in optional surface is
//! logged and skipped here; interpretation (classification, synthesis,
//! partitioning) happens in [`crate::model`].

mod crawler;

pub use crawler::{Element, Node};

use std::io::Read;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("registry xml: {0}")]
    Xml(#[from] xml::reader::Error),
    #[error("malformed registry: {0}")]
    Malformed(String),
}

/// Everything the registry declares, in declaration order.
#[derive(Debug, Default)]
pub struct Registry {
    pub types: Vec<TypeDecl>,
    pub enum_blocks: Vec<EnumBlock>,
    pub commands: Vec<Command>,
    pub extensions: Vec<Extension>,
    pub features: Vec<Feature>,
}

/// A `type` element, tagged by its category.
#[derive(Debug, Clone)]
pub enum TypeDecl {
    Basetype { name: String, typ: String },
    Bitmask { name: String, typ: String },
    Handle { name: String, dispatchable: bool },
    /// Declaration only; the values live in an [`EnumBlock`].
    Enum { name: String },
    FuncPointer { name: String, return_type: String, params: Vec<FuncParam> },
    Struct { name: String, members: Vec<Member> },
    Union { name: String, members: Vec<Member> },
    /// Deprecated name for another type.
    Alias { name: String, alias: String },
    /// Categories the generator has no use for (include, define, ...).
    Other { name: String },
}

impl TypeDecl {
    pub fn name(&self) -> &str {
        match self {
            TypeDecl::Basetype { name, .. }
            | TypeDecl::Bitmask { name, .. }
            | TypeDecl::Handle { name, .. }
            | TypeDecl::Enum { name }
            | TypeDecl::FuncPointer { name, .. }
            | TypeDecl::Struct { name, .. }
            | TypeDecl::Union { name, .. }
            | TypeDecl::Alias { name, .. }
            | TypeDecl::Other { name } => name,
        }
    }
}

/// One parameter of a function-pointer typedef. The registry spells these
/// out as C text, so only the type, indirection and name survive parsing.
#[derive(Debug, Clone)]
pub struct FuncParam {
    pub type_name: String,
    pub pointer: u8,
    pub name: String,
}

/// A struct member or command parameter.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub type_name: String,
    /// Levels of pointer indirection in the declaration text.
    pub pointer: u8,
    pub is_const: bool,
    /// Fixed-size array bound: a literal count or a constant name.
    pub array_len: Option<String>,
    /// Raw `len` attribute, uninterpreted.
    pub len: Option<String>,
    /// Raw `values` attribute (the member's mandated default).
    pub values: Option<String>,
    pub optional: bool,
}

/// One `enums` block.
#[derive(Debug, Clone)]
pub struct EnumBlock {
    pub name: String,
    pub kind: EnumKind,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    Plain,
    Bitmask,
    /// The API-wide constant block ("API Constants").
    Constants,
}

#[derive(Debug, Clone)]
pub enum EnumMember {
    Value { name: String, value: String },
    Bitpos { name: String, bitpos: u32 },
    Alias { name: String, alias: String },
}

impl EnumMember {
    pub fn name(&self) -> &str {
        match self {
            EnumMember::Value { name, .. }
            | EnumMember::Bitpos { name, .. }
            | EnumMember::Alias { name, .. } => name,
        }
    }
}

/// A `command` element.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub return_type: String,
    pub params: Vec<Member>,
    pub successcodes: Vec<String>,
    pub errorcodes: Vec<String>,
    /// Set when the command is a deprecated alias of another command.
    pub alias: Option<String>,
}

/// An `extension` element with its require blocks.
#[derive(Debug, Clone)]
pub struct Extension {
    pub name: String,
    pub number: i64,
    /// "instance" or "device"; absent for pure-constant extensions.
    pub ext_type: Option<String>,
    pub requires: Vec<RequireBlock>,
}

#[derive(Debug, Clone, Default)]
pub struct RequireBlock {
    pub commands: Vec<String>,
    pub types: Vec<String>,
    pub enums: Vec<ExtensionEnum>,
}

/// An `enum` element inside an extension require block.
#[derive(Debug, Clone)]
pub struct ExtensionEnum {
    pub name: String,
    pub extends: Option<String>,
    pub spec: ExtEnumSpec,
}

#[derive(Debug, Clone)]
pub enum ExtEnumSpec {
    Value(String),
    Bitpos(u32),
    Offset { offset: i64, negative: bool },
    Alias(String),
    /// A bare reference to an already-defined constant.
    Reference,
}

/// A core `feature` block (API version) with the interfaces it requires.
#[derive(Debug, Clone)]
pub struct Feature {
    pub name: String,
    pub number: String,
    pub commands: Vec<String>,
    pub types: Vec<String>,
}

impl Registry {
    /// Parses the registry XML. Optional attributes may be absent; child
    /// elements never collapse to scalars. Unusable entries in optional
    /// surface are logged and skipped; a broken document is an error.
    pub fn parse<R: Read>(source: R) -> Result<Registry, ParseError> {
        let blocks = crawler::crawl(source)?;
        let mut registry = Registry::default();
        for block in &blocks {
            match block.name.as_str() {
                "types" => registry.read_types(block),
                "enums" => registry.read_enum_block(block),
                "commands" => registry.read_commands(block),
                "extensions" => registry.read_extensions(block),
                "feature" => registry.read_feature(block),
                _ => {}
            }
        }
        Ok(registry)
    }

    fn read_types(&mut self, block: &Element) {
        for decl in block.children_named("type") {
            if let Some(parsed) = read_type_decl(decl) {
                self.types.push(parsed);
            }
        }
    }

    fn read_enum_block(&mut self, block: &Element) {
        let name = match block.attr("name") {
            Some(name) => name.to_owned(),
            None => {
                log::warn!("enums block without a name; skipping");
                return;
            }
        };
        let kind = match block.attr("type") {
            Some("enum") => EnumKind::Plain,
            Some("bitmask") => EnumKind::Bitmask,
            _ => EnumKind::Constants,
        };

        let mut members = Vec::new();
        for member in block.children_named("enum") {
            let mname = match member.attr("name") {
                Some(n) => n.to_owned(),
                None => {
                    log::warn!("unnamed member in enums block {}; skipping", name);
                    continue;
                }
            };
            if let Some(alias) = member.attr("alias") {
                members.push(EnumMember::Alias { name: mname, alias: alias.to_owned() });
            } else if let Some(bitpos) = member.attr("bitpos") {
                match bitpos.parse::<u32>() {
                    Ok(bitpos) => members.push(EnumMember::Bitpos { name: mname, bitpos }),
                    Err(_) => log::warn!("bad bitpos {:?} on {}; skipping", bitpos, mname),
                }
            } else if let Some(value) = member.attr("value") {
                members.push(EnumMember::Value { name: mname, value: value.to_owned() });
            } else {
                log::warn!("member {} has neither value nor bitpos; skipping", mname);
            }
        }

        self.enum_blocks.push(EnumBlock { name, kind, members });
    }

    fn read_commands(&mut self, block: &Element) {
        for command in block.children_named("command") {
            // Alias form: <command name="X" alias="Y"/>
            if let (Some(name), Some(alias)) = (command.attr("name"), command.attr("alias")) {
                self.commands.push(Command {
                    name: name.to_owned(),
                    return_type: String::new(),
                    params: Vec::new(),
                    successcodes: Vec::new(),
                    errorcodes: Vec::new(),
                    alias: Some(alias.to_owned()),
                });
                continue;
            }

            let proto = match command.child("proto") {
                Some(p) => p,
                None => {
                    log::warn!("command without a proto; skipping");
                    continue;
                }
            };
            let (name, return_type) = match (proto.child_text("name"), proto.child_text("type")) {
                (Some(name), Some(ret)) => (name, ret),
                _ => {
                    log::warn!("command proto missing name or type; skipping");
                    continue;
                }
            };

            let params = command
                .children_named("param")
                .filter_map(|p| read_member(p, &name))
                .collect();

            self.commands.push(Command {
                name,
                return_type,
                params,
                successcodes: split_codes(command.attr("successcodes")),
                errorcodes: split_codes(command.attr("errorcodes")),
                alias: None,
            });
        }
    }

    fn read_extensions(&mut self, block: &Element) {
        for ext in block.children_named("extension") {
            let name = match ext.attr("name") {
                Some(n) => n.to_owned(),
                None => {
                    log::warn!("extension without a name; skipping");
                    continue;
                }
            };
            if ext.attr("supported") == Some("disabled") {
                log::debug!("extension {} is disabled; skipping", name);
                continue;
            }
            let number = match ext.attr("number").map(str::parse::<i64>) {
                Some(Ok(number)) => number,
                _ => {
                    log::warn!("extension {} has no usable number; skipping", name);
                    continue;
                }
            };

            let requires = ext
                .children_named("require")
                .map(|req| RequireBlock {
                    commands: req
                        .children_named("command")
                        .filter_map(|c| c.attr("name").map(str::to_owned))
                        .collect(),
                    types: req
                        .children_named("type")
                        .filter_map(|t| t.attr("name").map(str::to_owned))
                        .collect(),
                    enums: req.children_named("enum").filter_map(read_extension_enum).collect(),
                })
                .collect();

            self.extensions.push(Extension {
                name,
                number,
                ext_type: ext.attr("type").map(str::to_owned),
                requires,
            });
        }
    }

    fn read_feature(&mut self, block: &Element) {
        let (name, number) = match (block.attr("name"), block.attr("number")) {
            (Some(name), Some(number)) => (name.to_owned(), number.to_owned()),
            _ => {
                log::warn!("feature block missing name or number; skipping");
                return;
            }
        };
        let mut feature = Feature {
            name,
            number,
            commands: Vec::new(),
            types: Vec::new(),
        };
        for req in block.children_named("require") {
            feature.commands.extend(
                req.children_named("command")
                    .filter_map(|c| c.attr("name").map(str::to_owned)),
            );
            feature.types.extend(
                req.children_named("type")
                    .filter_map(|t| t.attr("name").map(str::to_owned)),
            );
        }
        self.features.push(feature);
    }
}

fn split_codes(attr: Option<&str>) -> Vec<String> {
    attr.map(|codes| {
        codes
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_owned)
            .collect()
    })
    .unwrap_or_default()
}

fn read_type_decl(decl: &Element) -> Option<TypeDecl> {
    if let (Some(name), Some(alias)) = (decl.attr("name"), decl.attr("alias")) {
        return Some(TypeDecl::Alias { name: name.to_owned(), alias: alias.to_owned() });
    }

    let named = |fallback: &str| -> Option<String> {
        decl.attr("name")
            .map(str::to_owned)
            .or_else(|| decl.child_text("name"))
            .or_else(|| {
                log::warn!("{} type without a name; skipping", fallback);
                None
            })
    };

    match decl.attr("category") {
        Some("basetype") => {
            let name = named("basetype")?;
            let typ = decl.child_text("type").unwrap_or_else(|| "void".to_owned());
            Some(TypeDecl::Basetype { name, typ })
        }
        Some("bitmask") => {
            let name = named("bitmask")?;
            let typ = decl.child_text("type")?;
            Some(TypeDecl::Bitmask { name, typ })
        }
        Some("handle") => {
            let name = named("handle")?;
            let dispatchable = decl
                .child_text("type")
                .map(|t| t == "VK_DEFINE_HANDLE")
                .unwrap_or(false);
            Some(TypeDecl::Handle { name, dispatchable })
        }
        Some("enum") => Some(TypeDecl::Enum { name: named("enum")? }),
        Some("funcpointer") => read_funcpointer(decl),
        Some("struct") => {
            let name = named("struct")?;
            let members = decl
                .children_named("member")
                .filter_map(|m| read_member(m, &name))
                .collect();
            Some(TypeDecl::Struct { name, members })
        }
        Some("union") => {
            let name = named("union")?;
            let members = decl
                .children_named("member")
                .filter_map(|m| read_member(m, &name))
                .collect();
            Some(TypeDecl::Union { name, members })
        }
        _ => decl
            .attr("name")
            .map(|name| TypeDecl::Other { name: name.to_owned() }),
    }
}

/// Reads a funcpointer typedef. The declaration is C text with `<type>`
/// markers on the parameter types:
/// `typedef void* (VKAPI_PTR *<name>PFN_x</name>)(<type>void</type>* pUserData, ...)`.
fn read_funcpointer(decl: &Element) -> Option<TypeDecl> {
    let name = match decl.child_text("name") {
        Some(name) => name,
        None => {
            log::warn!("funcpointer without a name; skipping");
            return None;
        }
    };

    let leading = decl
        .children
        .iter()
        .find_map(|n| match n {
            Node::Text(t) => Some(t.as_str()),
            _ => None,
        })
        .unwrap_or("");
    let return_type = leading
        .strip_prefix("typedef ")
        .and_then(|rest| rest.split(" (").next())
        .unwrap_or("void")
        .trim()
        .to_owned();

    let mut params = Vec::new();
    let mut past_name = false;
    let mut pending_type: Option<String> = None;
    for node in &decl.children {
        match node {
            Node::Element(el) if el.name == "name" => past_name = true,
            Node::Element(el) if past_name && el.name == "type" => {
                pending_type = Some(el.all_text());
            }
            Node::Text(text) if past_name => {
                if let Some(type_name) = pending_type.take() {
                    let segment = text.split([',', ')']).next().unwrap_or("");
                    let pname = segment
                        .split_whitespace()
                        .last()
                        .unwrap_or("")
                        .trim_matches('*');
                    if pname.is_empty() {
                        log::warn!("funcpointer {} has an unnamed parameter; skipping it", name);
                        continue;
                    }
                    params.push(FuncParam {
                        type_name,
                        pointer: segment.matches('*').count() as u8,
                        name: pname.to_owned(),
                    });
                }
            }
            _ => {}
        }
    }

    Some(TypeDecl::FuncPointer { name, return_type, params })
}

/// Reads a `member` or `param` element: the `<type>`/`<name>` children plus
/// the pointer and array decorations carried by the surrounding text runs.
fn read_member(el: &Element, owner: &str) -> Option<Member> {
    let name = match el.child_text("name") {
        Some(name) => name,
        None => {
            log::warn!("member of {} without a name; skipping", owner);
            return None;
        }
    };
    let type_name = match el.child_text("type") {
        Some(t) => t,
        None => {
            log::warn!("member {}.{} without a type; skipping", owner, name);
            return None;
        }
    };

    let text = el.direct_text();
    let pointer = text.matches('*').count() as u8;
    let is_const = text.trim_start().starts_with("const");

    // Fixed arrays show up as "[4]" in the text or as "[<enum>CONST</enum>]".
    let array_len = if let Some(open) = text.find('[') {
        let tail = &text[open + 1..];
        let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            el.child_text("enum")
        } else {
            Some(digits)
        }
    } else {
        None
    };

    Some(Member {
        name,
        type_name,
        pointer,
        is_const,
        array_len,
        len: el.attr("len").map(str::to_owned),
        values: el.attr("values").map(str::to_owned),
        optional: el.attr("optional") == Some("true"),
    })
}

fn read_extension_enum(el: &Element) -> Option<ExtensionEnum> {
    let name = match el.attr("name") {
        Some(n) => n.to_owned(),
        None => {
            log::warn!("extension enum without a name; skipping");
            return None;
        }
    };
    let extends = el.attr("extends").map(str::to_owned);

    let spec = if let Some(alias) = el.attr("alias") {
        ExtEnumSpec::Alias(alias.to_owned())
    } else if let Some(offset) = el.attr("offset") {
        match offset.parse::<i64>() {
            Ok(offset) => ExtEnumSpec::Offset { offset, negative: el.attr("dir") == Some("-") },
            Err(_) => {
                log::warn!("bad offset {:?} on {}; skipping", offset, name);
                return None;
            }
        }
    } else if let Some(bitpos) = el.attr("bitpos") {
        match bitpos.parse::<u32>() {
            Ok(bitpos) => ExtEnumSpec::Bitpos(bitpos),
            Err(_) => {
                log::warn!("bad bitpos {:?} on {}; skipping", bitpos, name);
                return None;
            }
        }
    } else if let Some(value) = el.attr("value") {
        ExtEnumSpec::Value(value.to_owned())
    } else {
        ExtEnumSpec::Reference
    };

    Some(ExtensionEnum { name, extends, spec })
}
