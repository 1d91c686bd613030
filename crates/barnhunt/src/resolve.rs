//! Following `use` references.
//!
//! A `use` element positions a copy of the element its href points at. The
//! copy is drawn in the `use` element's coordinate system, shifted by its
//! `x`/`y` attributes; the target's own ancestors play no part.
//!
//! References can chain (`use` → `use` → `symbol`) and, in a hand-edited
//! drawing, loop. [`RefPath`] records the ids visited along one resolution
//! path so a loop is reported as [`ResolveError::Cycle`] instead of
//! recursing forever.

use std::cell::OnceCell;
use std::collections::HashMap;

use tracing::warn;

use crate::config::{Name, Namespaces};
use crate::document::{Document, ElementKind, NodeId};
use crate::error::ResolveError;
use crate::geometry::Transform;

/// Resolves `use` hrefs within one document.
///
/// The id index is built on the first lookup and kept for the resolver's
/// lifetime; the shared borrow of the document guarantees it stays valid.
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    doc: &'a Document,
    ns: &'a Namespaces,
    ids: OnceCell<HashMap<&'a str, Vec<NodeId>>>,
}

impl<'a> Resolver<'a> {
    pub fn new(doc: &'a Document, ns: &'a Namespaces) -> Self {
        Self {
            doc,
            ns,
            ids: OnceCell::new(),
        }
    }

    /// Elements by id, in document order.
    fn ids(&self) -> &HashMap<&'a str, Vec<NodeId>> {
        self.ids.get_or_init(|| {
            let doc = self.doc;
            let mut index: HashMap<&'a str, Vec<NodeId>> = HashMap::new();
            for node in doc.descendants(doc.root()) {
                if let Some(id) = doc.xml_id(node) {
                    index.entry(id).or_default().push(node);
                }
            }
            index
        })
    }

    /// Raw href of a reference element (`xlink:href`, else SVG 2 `href`).
    pub fn href(&self, node: NodeId) -> Option<&'a str> {
        self.doc
            .attr(node, self.ns.xlink("href"))
            .or_else(|| self.doc.attr(node, Name::plain("href")))
    }

    /// The id a reference element points at.
    pub fn target_id(&self, node: NodeId) -> Result<&'a str, ResolveError> {
        let href = self.href(node).ok_or(ResolveError::MissingHref)?;
        match href.strip_prefix('#') {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(ResolveError::MalformedHref(href.to_string())),
        }
    }

    /// Find the element with the given id.
    ///
    /// Ids should be unique; when they are not we warn and use the first
    /// match in document order.
    pub fn lookup(&self, id: &str) -> Result<NodeId, ResolveError> {
        let found = self.ids().get(id).map(Vec::as_slice).unwrap_or_default();
        match found {
            [] => Err(ResolveError::NotFound(id.to_string())),
            [only] => Ok(*only),
            [first, ..] => {
                warn!("{} elements have id #{}, using the first", found.len(), id);
                Ok(*first)
            }
        }
    }

    /// The element a reference points at (one hop).
    pub fn resolve(&self, node: NodeId) -> Result<NodeId, ResolveError> {
        let id = self.target_id(node)?;
        self.lookup(id)
    }

    /// Transform a reference applies to its target: its own `transform`
    /// followed by the `x`/`y` shift.
    pub fn use_transform(&self, node: NodeId) -> Transform {
        let x = self.doc.length_attr(node, "x").unwrap_or(0.0);
        let y = self.doc.length_attr(node, "y").unwrap_or(0.0);
        self.doc.local_transform(node) * Transform::translate(x, y)
    }

    /// Follow a chain of references to the first non-reference element.
    ///
    /// Returns that element and the transform accumulated by every `use`
    /// along the way (not including the final target's own transform).
    pub fn resolve_chain(&self, node: NodeId) -> Result<(NodeId, Transform), ResolveError> {
        let mut path = RefPath::default();
        let mut current = node;
        let mut transform = Transform::IDENTITY;
        loop {
            let id = self.target_id(current)?;
            path.enter(id)?;
            let target = self.lookup(id)?;
            transform = transform * self.use_transform(current);
            if self.doc.element_kind(self.ns, target) != Some(ElementKind::Reference) {
                return Ok((target, transform));
            }
            current = target;
        }
    }
}

/// Ids visited along the current resolution path.
#[derive(Debug, Clone, Default)]
pub struct RefPath {
    ids: Vec<String>,
}

impl RefPath {
    /// Step into `id`. Fails if `id` is already on the path.
    pub fn enter(&mut self, id: &str) -> Result<(), ResolveError> {
        if self.ids.iter().any(|seen| seen == id) {
            return Err(ResolveError::Cycle(id.to_string()));
        }
        self.ids.push(id.to_string());
        Ok(())
    }

    pub fn leave(&mut self) {
        self.ids.pop();
    }

    pub fn depth(&self) -> usize {
        self.ids.len()
    }
}
