//! Editable XML document tree.
//!
//! The drawing is held in an arena: every node lives in `Document::nodes`
//! and is addressed by a copyable [`NodeId`]. Parent links are plain indices,
//! so ownership stays simple (each node sits in exactly one parent's child
//! list) while still letting us walk upwards for composed transforms and
//! layer lookups.
//!
//! ## Rust Lesson #8: Arenas instead of back-pointers
//!
//! A DOM with parent pointers is a graph with cycles, which fights the
//! borrow checker if modelled with references or `Rc<RefCell<..>>`.
//! Indices into a `Vec` sidestep that: `NodeId` is just a number, and all
//! access goes through `&Document` or `&mut Document`.
//!
//! Parsing uses quick-xml's event reader. Everything that is not an element
//! (text, comments, the XML declaration...) is stored verbatim and written
//! back unchanged.

use std::collections::HashSet;
use std::str::FromStr;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use svgtypes::{Length, LengthUnit};
use tracing::warn;

use crate::config::{Name, Namespaces, XMLNS_NS, XML_NS};
use crate::error::DocumentError;
use crate::geometry::Transform;

/// Index of a node in its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One attribute, with the namespace its prefix resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub local: String,
    pub ns: Option<String>,
    pub value: String,
}

impl Attribute {
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.local)
    }

    fn matches(&self, name: Name<'_>) -> bool {
        self.local == name.local && self.ns.as_deref() == name.ns
    }

    /// `xmlns` / `xmlns:*` declarations.
    fn is_namespace_decl(&self) -> bool {
        self.ns.as_deref() == Some(XMLNS_NS)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub prefix: Option<String>,
    pub local: String,
    pub ns: Option<String>,
    pub attributes: Vec<Attribute>,
}

impl Element {
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.local)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element(Element),
    /// Raw (still escaped) character data.
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
    Declaration(String),
    Doctype(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Typed view of the elements the extensions care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Svg,
    Group,
    /// A `g` with `inkscape:groupmode="layer"`.
    Layer,
    /// `use`: positions a copy of another element.
    Reference,
    Rectangle,
    Symbol,
    Defs,
    Image,
    Generic,
}

/// An XML document held as an arena of nodes.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    prolog: Vec<NodeId>,
    root: NodeId,
    epilog: Vec<NodeId>,
}

fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

/// Parse an SVG length into user units (96 per inch).
///
/// Font-relative units and percentages have no fixed size and yield `None`.
pub fn parse_length(s: &str) -> Option<f64> {
    let length = Length::from_str(s.trim()).ok()?;
    let scale = match length.unit {
        LengthUnit::None | LengthUnit::Px => 1.0,
        LengthUnit::In => 96.0,
        LengthUnit::Cm => 96.0 / 2.54,
        LengthUnit::Mm => 96.0 / 25.4,
        LengthUnit::Pt => 96.0 / 72.0,
        LengthUnit::Pc => 16.0,
        _ => return None,
    };
    Some(length.number * scale)
}

fn split_qname(qname: &str) -> (Option<String>, String) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, qname.to_string()),
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Builds the arena while streaming through quick-xml events.
struct Builder {
    nodes: Vec<Node>,
    prolog: Vec<NodeId>,
    epilog: Vec<NodeId>,
    root: Option<NodeId>,
    stack: Vec<NodeId>,
    /// Namespace declarations in scope, one frame per open element.
    scopes: Vec<Vec<(Option<String>, String)>>,
}

impl Builder {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            prolog: Vec::new(),
            epilog: Vec::new(),
            root: None,
            stack: Vec::new(),
            scopes: Vec::new(),
        }
    }

    fn lookup(&self, prefix: Option<&str>) -> Option<String> {
        match prefix {
            Some("xml") => return Some(XML_NS.to_string()),
            Some("xmlns") => return Some(XMLNS_NS.to_string()),
            _ => {}
        }
        for scope in self.scopes.iter().rev() {
            for (p, uri) in scope.iter().rev() {
                if p.as_deref() == prefix {
                    // xmlns="" undeclares the default namespace
                    return if uri.is_empty() { None } else { Some(uri.clone()) };
                }
            }
        }
        None
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = self.stack.last().copied();
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            kind,
        });
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None if self.root.is_none() => self.prolog.push(id),
            None => self.epilog.push(id),
        }
        id
    }

    fn open_element(&mut self, e: &BytesStart<'_>) -> Result<NodeId, DocumentError> {
        let name = e.name();
        let (prefix, local) = split_qname(std::str::from_utf8(name.as_ref())?);

        let mut raw = Vec::new();
        let mut decls = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            let value = attr.unescape_value()?.into_owned();
            if key == "xmlns" {
                decls.push((None, value.clone()));
            } else if let Some(p) = key.strip_prefix("xmlns:") {
                decls.push((Some(p.to_string()), value.clone()));
            }
            raw.push((key, value));
        }
        self.scopes.push(decls);

        let attributes = raw
            .into_iter()
            .map(|(key, value)| {
                let (prefix, local) = split_qname(&key);
                let ns = if key == "xmlns" {
                    Some(XMLNS_NS.to_string())
                } else {
                    prefix.as_deref().and_then(|p| self.lookup(Some(p)))
                };
                Attribute {
                    prefix,
                    local,
                    ns,
                    value,
                }
            })
            .collect();

        let ns = self.lookup(prefix.as_deref());
        let element = Element {
            prefix,
            local,
            ns,
            attributes,
        };
        let is_root = self.stack.is_empty();
        let id = self.push(NodeKind::Element(element));
        if is_root && self.root.is_none() {
            // push() already filed it under the prolog
            self.prolog.pop();
            self.root = Some(id);
        }
        Ok(id)
    }
}

impl Document {
    /// Parse an XML document.
    pub fn parse(xml: &str) -> Result<Document, DocumentError> {
        let mut reader = Reader::from_str(xml);
        let mut b = Builder::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let id = b.open_element(&e)?;
                    b.stack.push(id);
                }
                Event::Empty(e) => {
                    b.open_element(&e)?;
                    b.scopes.pop();
                }
                Event::End(e) => {
                    if b.stack.pop().is_none() {
                        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        return Err(DocumentError::UnbalancedTag(name));
                    }
                    b.scopes.pop();
                }
                Event::Text(t) => {
                    b.push(NodeKind::Text(std::str::from_utf8(&t)?.to_string()));
                }
                Event::CData(t) => {
                    b.push(NodeKind::CData(std::str::from_utf8(&t)?.to_string()));
                }
                Event::Comment(t) => {
                    b.push(NodeKind::Comment(std::str::from_utf8(&t)?.to_string()));
                }
                Event::Decl(d) => {
                    b.push(NodeKind::Declaration(std::str::from_utf8(&d)?.to_string()));
                }
                Event::PI(p) => {
                    b.push(NodeKind::ProcessingInstruction(std::str::from_utf8(&p)?.to_string()));
                }
                Event::DocType(t) => {
                    b.push(NodeKind::Doctype(std::str::from_utf8(&t)?.to_string()));
                }
                Event::Eof => break,
                #[allow(unreachable_patterns)]
                _ => {}
            }
        }

        if let Some(&open) = b.stack.last() {
            let name = match &b.nodes[open.0].kind {
                NodeKind::Element(el) => el.qualified_name(),
                _ => String::new(),
            };
            return Err(DocumentError::Unclosed(name));
        }
        let root = b.root.ok_or(DocumentError::NoRoot)?;
        Ok(Document {
            nodes: b.nodes,
            prolog: b.prolog,
            root,
            epilog: b.epilog,
        })
    }

    // ========================================================================
    // SERIALIZATION
    // ========================================================================

    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        for &id in &self.prolog {
            self.write_node(id, &mut out);
        }
        self.write_node(self.root, &mut out);
        for &id in &self.epilog {
            self.write_node(id, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Element(el) => {
                let name = el.qualified_name();
                out.push('<');
                out.push_str(&name);
                for attr in &el.attributes {
                    out.push(' ');
                    out.push_str(&attr.qualified_name());
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(&attr.value));
                    out.push('"');
                }
                if node.children.is_empty() {
                    out.push_str(" />");
                } else {
                    out.push('>');
                    for &child in &node.children {
                        self.write_node(child, out);
                    }
                    out.push_str("</");
                    out.push_str(&name);
                    out.push('>');
                }
            }
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::CData(t) => {
                out.push_str("<![CDATA[");
                out.push_str(t);
                out.push_str("]]>");
            }
            NodeKind::Comment(t) => {
                out.push_str("<!--");
                out.push_str(t);
                out.push_str("-->");
            }
            NodeKind::ProcessingInstruction(t) | NodeKind::Declaration(t) => {
                out.push_str("<?");
                out.push_str(t);
                out.push_str("?>");
            }
            NodeKind::Doctype(t) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(t);
                out.push('>');
            }
        }
    }

    // ========================================================================
    // NAVIGATION
    // ========================================================================

    /// The root (`svg`) element.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
    }

    /// Proper ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    /// Elements of the subtree rooted at `id` (self included), in document
    /// order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if self.element(n).is_none() {
                continue;
            }
            out.push(n);
            stack.extend(self.nodes[n.0].children.iter().rev().copied());
        }
        out
    }

    /// True when the node is (still) part of the tree under the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).any(|a| a == self.root)
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.nodes[parent.0].children.iter().position(|&c| c == id)
    }

    // ========================================================================
    // NAMES & ATTRIBUTES
    // ========================================================================

    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.local.as_str())
    }

    /// Does the element have this name? Elements written without any
    /// namespace match on local name alone.
    pub fn is(&self, id: NodeId, name: Name<'_>) -> bool {
        match self.element(id) {
            Some(el) => {
                el.local == name.local && (el.ns.is_none() || el.ns.as_deref() == name.ns)
            }
            None => false,
        }
    }

    pub fn attr(&self, id: NodeId, name: Name<'_>) -> Option<&str> {
        self.element(id)?
            .attributes
            .iter()
            .find(|a| a.matches(name))
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, declaring its namespace on the root if needed.
    pub fn set_attr(&mut self, id: NodeId, name: Name<'_>, value: impl Into<String>) {
        let value = value.into();
        if let Some(el) = self.element_mut(id) {
            if let Some(attr) = el.attributes.iter_mut().find(|a| a.matches(name)) {
                attr.value = value;
                return;
            }
        }
        let prefix = match name.ns {
            Some(uri) => Some(self.ensure_namespace(name.prefix.unwrap_or("ns"), uri)),
            None => None,
        };
        if let Some(el) = self.element_mut(id) {
            el.attributes.push(Attribute {
                prefix,
                local: name.local.to_string(),
                ns: name.ns.map(str::to_string),
                value,
            });
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: Name<'_>) -> Option<String> {
        let el = self.element_mut(id)?;
        let index = el.attributes.iter().position(|a| a.matches(name))?;
        Some(el.attributes.remove(index).value)
    }

    /// The element's `id` attribute.
    pub fn xml_id(&self, id: NodeId) -> Option<&str> {
        self.attr(id, Name::plain("id"))
    }

    /// All attached elements whose `id` attribute equals `xml_id`, in
    /// document order.
    pub fn elements_by_id(&self, xml_id: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&n| self.xml_id(n) == Some(xml_id))
            .collect()
    }

    /// An id of the form `{prefix}{n}` not used anywhere in the document.
    pub fn unique_id(&self, prefix: &str) -> String {
        let used: HashSet<&str> = self
            .descendants(self.root)
            .into_iter()
            .filter_map(|n| self.xml_id(n))
            .collect();
        (1..)
            .map(|n| format!("{}{}", prefix, n))
            .find(|candidate| !used.contains(candidate.as_str()))
            .unwrap_or_else(|| prefix.to_string())
    }

    /// Return a prefix bound to `uri` on the root element, declaring
    /// `xmlns:{preferred}` there when no binding exists yet.
    pub fn ensure_namespace(&mut self, preferred: &str, uri: &str) -> String {
        let root = self.root;
        let bound = self.element(root).and_then(|el| {
            el.attributes
                .iter()
                .find(|a| a.is_namespace_decl() && a.prefix.is_some() && a.value == uri)
                .map(|a| a.local.clone())
        });
        if let Some(prefix) = bound {
            return prefix;
        }

        let taken: HashSet<String> = self
            .element(root)
            .map(|el| {
                el.attributes
                    .iter()
                    .filter(|a| a.is_namespace_decl() && a.prefix.is_some())
                    .map(|a| a.local.clone())
                    .collect()
            })
            .unwrap_or_default();
        let prefix = if taken.contains(preferred) {
            (1..)
                .map(|n| format!("{}{}", preferred, n))
                .find(|p| !taken.contains(p))
                .unwrap_or_else(|| preferred.to_string())
        } else {
            preferred.to_string()
        };

        if let Some(el) = self.element_mut(root) {
            el.attributes.push(Attribute {
                prefix: Some("xmlns".to_string()),
                local: prefix.clone(),
                ns: Some(XMLNS_NS.to_string()),
                value: uri.to_string(),
            });
        }
        prefix
    }

    /// Namespace URI of the root's default (`xmlns="..."`) declaration.
    fn default_namespace(&self) -> Option<&str> {
        self.element(self.root)?
            .attributes
            .iter()
            .find(|a| a.is_namespace_decl() && a.prefix.is_none())
            .map(|a| a.value.as_str())
    }

    // ========================================================================
    // TREE EDITING
    // ========================================================================

    /// Create a detached element.
    pub fn create_element(&mut self, name: Name<'_>) -> NodeId {
        let prefix = match name.ns {
            Some(uri) if self.default_namespace() == Some(uri) => None,
            Some(uri) => Some(self.ensure_namespace(name.prefix.unwrap_or("ns"), uri)),
            None => None,
        };
        let ns = name.ns.map(str::to_string).or_else(|| self.default_namespace().map(str::to_string));
        self.push_node(NodeKind::Element(Element {
            prefix,
            local: name.local.to_string(),
            ns,
            attributes: Vec::new(),
        }))
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    /// Remove a node from its parent. The node stays in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `child` at `index` (clamped) among `parent`'s children.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Put `new` where `old` is and detach `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        if let (Some(parent), Some(index)) = (self.parent(old), self.index_in_parent(old)) {
            self.detach(old);
            self.insert_child(parent, index, new);
        }
    }

    /// Copy a subtree within this document. The copy is detached.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let kind = self.nodes[id.0].kind.clone();
        let copy = self.push_node(kind);
        let children = self.nodes[id.0].children.clone();
        for child in children {
            let child_copy = self.deep_copy(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Copy a subtree from another document. Namespace prefixes used by the
    /// copy are declared on this document's root (renamed if they clash).
    pub fn import(&mut self, other: &Document, id: NodeId) -> NodeId {
        let mut kind = other.nodes[id.0].kind.clone();
        if let NodeKind::Element(el) = &mut kind {
            if let (Some(prefix), Some(uri)) = (el.prefix.clone(), el.ns.clone()) {
                el.prefix = Some(self.ensure_namespace(&prefix, &uri));
            }
            for attr in el.attributes.iter_mut() {
                if attr.is_namespace_decl() {
                    continue;
                }
                if let (Some(prefix), Some(uri)) = (attr.prefix.clone(), attr.ns.clone()) {
                    if uri != XML_NS {
                        attr.prefix = Some(self.ensure_namespace(&prefix, &uri));
                    }
                }
            }
        }
        let copy = self.push_node(kind);
        for &child in &other.nodes[id.0].children {
            let child_copy = self.import(other, child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    // ========================================================================
    // STYLE
    // ========================================================================

    /// Value of one property in the `style` attribute.
    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        let style = self.attr(id, Name::plain("style"))?;
        style
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .find(|(k, _)| k.trim() == property)
            .map(|(_, v)| v.trim().to_string())
    }

    /// Set (or add) one property in the `style` attribute.
    pub fn set_style_property(&mut self, id: NodeId, property: &str, value: &str) {
        let style = self.attr(id, Name::plain("style")).unwrap_or("");
        let mut decls: Vec<(String, String)> = style
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        match decls.iter_mut().find(|(k, _)| k == property) {
            Some(decl) => decl.1 = value.to_string(),
            None => decls.push((property.to_string(), value.to_string())),
        }
        let style = decls
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect::<Vec<_>>()
            .join(";");
        self.set_attr(id, Name::plain("style"), style);
    }

    /// `display:none` via style or presentation attribute.
    pub fn is_display_none(&self, id: NodeId) -> bool {
        self.style_property(id, "display").as_deref() == Some("none")
            || self.attr(id, Name::plain("display")) == Some("none")
    }

    /// A length attribute converted to user units.
    pub fn length_attr(&self, id: NodeId, local: &str) -> Option<f64> {
        self.attr(id, Name::plain(local)).and_then(parse_length)
    }

    // ========================================================================
    // TRANSFORMS
    // ========================================================================

    /// The element's own `transform` attribute.
    pub fn local_transform(&self, id: NodeId) -> Transform {
        match self.attr(id, Name::plain("transform")) {
            None => Transform::IDENTITY,
            Some(s) => s.parse().unwrap_or_else(|e| {
                warn!("ignoring invalid transform {:?}: {}", s, e);
                Transform::IDENTITY
            }),
        }
    }

    /// Write a transform attribute (removed for the identity).
    pub fn set_transform(&mut self, id: NodeId, transform: &Transform) {
        if transform.is_identity() {
            self.remove_attr(id, Name::plain("transform"));
        } else {
            self.set_attr(id, Name::plain("transform"), transform.to_string());
        }
    }

    /// Transform from the element's own coordinates to the document's:
    /// every ancestor's transform composed with the element's own.
    pub fn composed_transform(&self, id: NodeId) -> Transform {
        let mut chain: Vec<NodeId> = self.ancestors(id).collect();
        chain.reverse();
        chain.push(id);
        chain
            .into_iter()
            .fold(Transform::IDENTITY, |acc, n| acc * self.local_transform(n))
    }

    /// Composed transform of the parent (identity for the root).
    pub fn parent_transform(&self, id: NodeId) -> Transform {
        self.parent(id)
            .map(|p| self.composed_transform(p))
            .unwrap_or(Transform::IDENTITY)
    }

    // ========================================================================
    // SVG / INKSCAPE FACADE
    // ========================================================================

    pub fn element_kind(&self, ns: &Namespaces, id: NodeId) -> Option<ElementKind> {
        let el = self.element(id)?;
        if !ns.is_svg(el.ns.as_deref()) {
            return Some(ElementKind::Generic);
        }
        Some(match el.local.as_str() {
            "svg" => ElementKind::Svg,
            "g" if self.attr(id, ns.groupmode()) == Some("layer") => ElementKind::Layer,
            "g" => ElementKind::Group,
            "use" => ElementKind::Reference,
            "rect" => ElementKind::Rectangle,
            "symbol" => ElementKind::Symbol,
            "defs" => ElementKind::Defs,
            "image" => ElementKind::Image,
            _ => ElementKind::Generic,
        })
    }

    pub fn is_layer(&self, ns: &Namespaces, id: NodeId) -> bool {
        self.element_kind(ns, id) == Some(ElementKind::Layer)
    }

    /// Nearest enclosing layer.
    pub fn containing_layer(&self, ns: &Namespaces, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|&a| self.is_layer(ns, a))
    }

    pub fn label(&self, ns: &Namespaces, id: NodeId) -> Option<&str> {
        self.attr(id, ns.label())
    }

    /// Lock (or unlock) an element against selection in the editor.
    pub fn set_sensitive(&mut self, ns: &Namespaces, id: NodeId, sensitive: bool) {
        if sensitive {
            self.remove_attr(id, ns.insensitive());
        } else {
            self.set_attr(id, ns.insensitive(), "true");
        }
    }

    /// Create a detached layer with the given label.
    pub fn new_layer(&mut self, ns: &Namespaces, label: &str) -> NodeId {
        let layer = self.create_element(ns.svg("g"));
        self.set_attr(layer, ns.groupmode(), "layer");
        self.set_attr(layer, ns.label(), label);
        layer
    }
}

/// Iterator over a node's ancestors, see [`Document::ancestors`].
#[derive(Debug)]
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

/// Escape an attribute value. Whitespace other than spaces is written as a
/// character reference, since parsers normalize it to a space on read.
fn escape_attribute(value: &str) -> String {
    let escaped = escape(value);
    if !escaped.contains(['\n', '\r', '\t']) {
        return escaped.into_owned();
    }
    escaped
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;")
}

// ============================================================================
// TESTS
// ============================================================================
