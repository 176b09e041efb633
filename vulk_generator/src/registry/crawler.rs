//! Event-driven crawl of the registry XML into lightweight element trees.
//!
//! The registry format interleaves markup and free text inside `type`,
//! `member` and `param` elements ("const " `<type>char</type>` "* const*"
//! `<name>p</name>`), so each top-level block is read into an [`Element`]
//! tree that preserves the ordering of text runs and child elements. The
//! typed extraction in [`super`] walks these trees; a child element is
//! always a list entry, never a scalar, so a single occurrence parses the
//! same as many.

use std::io::Read;

use xml::attribute::OwnedAttribute;
use xml::reader::{EventReader, Events, XmlEvent};
use xml::ParserConfig;

use super::ParseError;

/// One XML element with its attributes and ordered content.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    /// Looks up an attribute by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All child elements with the given tag, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter_map(move |node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// The first child element with the given tag.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children_named(name).next()
    }

    /// The concatenated text content of the first child with the given tag.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(Element::all_text)
    }

    /// Concatenates every text run directly inside this element, skipping
    /// child elements (`comment` children in particular).
    pub fn direct_text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                if !out.is_empty() && !t.is_empty() {
                    out.push(' ');
                }
                out.push_str(t);
            }
        }
        out
    }

    /// Concatenates every text run in this element and its descendants,
    /// excluding `comment` elements.
    pub fn all_text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(el: &Element, out: &mut String) {
    for node in &el.children {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(child) if child.name != "comment" => collect_text(child, out),
            Node::Element(_) => {}
        }
    }
}

/// Reads every top-level block of the registry (`types`, `enums`,
/// `commands`, `extensions`, `feature`) into element trees.
pub fn crawl<R: Read>(source: R) -> Result<Vec<Element>, ParseError> {
    let reader = EventReader::new_with_config(
        source,
        ParserConfig::new()
            .trim_whitespace(true)
            .cdata_to_characters(true),
    );
    let mut events = reader.into_iter();
    let mut blocks = Vec::new();

    while let Some(event) = events.next() {
        match event? {
            XmlEvent::StartElement { name, attributes, .. } => {
                match name.local_name.as_str() {
                    "registry" => {} // descend
                    "types" | "enums" | "commands" | "extensions" | "feature" => {
                        blocks.push(read_element(name.local_name, attributes, &mut events)?);
                    }
                    other => {
                        // comment, platforms, tags, vendorids, ...
                        let skipped = read_element(other.to_owned(), attributes, &mut events)?;
                        log::debug!("skipping registry block <{}>", skipped.name);
                    }
                }
            }
            XmlEvent::EndDocument => break,
            _ => {}
        }
    }

    Ok(blocks)
}

fn read_element<R: Read>(
    name: String,
    attributes: Vec<OwnedAttribute>,
    events: &mut Events<R>,
) -> Result<Element, ParseError> {
    let mut element = Element {
        name,
        attributes: attributes
            .into_iter()
            .map(|a| (a.name.local_name, a.value))
            .collect(),
        children: Vec::new(),
    };

    while let Some(event) = events.next() {
        match event? {
            XmlEvent::StartElement { name, attributes, .. } => {
                let child = read_element(name.local_name, attributes, events)?;
                element.children.push(Node::Element(child));
            }
            XmlEvent::EndElement { .. } => return Ok(element),
            XmlEvent::Characters(text) => element.children.push(Node::Text(text)),
            _ => {}
        }
    }

    Err(ParseError::Malformed(format!(
        "element <{}> is never closed",
        element.name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_interleaved_text_and_markup() {
        let xml = br#"<registry><types>
            <type category="struct" name="VkThing">
                <member>const <type>char</type>* const* <name>ppNames</name></member>
            </type>
        </types></registry>"#;
        let blocks = crawl(&xml[..]).unwrap();
        assert_eq!(blocks.len(), 1);

        let types = &blocks[0];
        let decl = types.child("type").unwrap();
        assert_eq!(decl.attr("category"), Some("struct"));

        let member = decl.child("member").unwrap();
        assert_eq!(member.child_text("type").unwrap(), "char");
        assert_eq!(member.child_text("name").unwrap(), "ppNames");
        assert!(member.direct_text().contains("* const*"));
    }

    #[test]
    fn single_child_parses_as_a_one_element_list() {
        let xml = br#"<registry><extensions>
            <extension name="VK_KHR_x" number="2" type="instance">
                <require><command name="vkOnlyOne"/></require>
            </extension>
        </extensions></registry>"#;
        let blocks = crawl(&xml[..]).unwrap();
        let ext = blocks[0].child("extension").unwrap();
        let requires: Vec<_> = ext.children_named("require").collect();
        assert_eq!(requires.len(), 1);
        assert_eq!(requires[0].children_named("command").count(), 1);
    }

    #[test]
    fn unclosed_document_is_malformed() {
        let xml = br#"<registry><types><type category="struct" name="X">"#;
        assert!(crawl(&xml[..]).is_err());
    }
}
