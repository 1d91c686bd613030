//! Discovering permanent placement constraints in a drawing.
//!
//! Course designers mark elements with `bh:rat-placement="exclude"` (no
//! rats here) or `bh:rat-placement="boundary"` (rats go inside this). Marks
//! inside symbols count too: a `use` of a symbol whose content carries an
//! exclusion contributes that exclusion at the place the `use` draws it.

use tracing::warn;

use crate::bbox::{bounding_box, bounding_box_in_page, page_bounds};
use crate::config::Namespaces;
use crate::document::{Document, ElementKind, NodeId};
use crate::geometry::{BoundingBox, Transform, union_all};
use crate::resolve::{RefPath, Resolver};

const EXCLUDE: &str = "exclude";
const BOUNDARY: &str = "boundary";

/// Page-coordinate boxes of every visible exclusion in the drawing.
///
/// Content inside `defs` and inside hidden layers is skipped, as is the
/// subtree rooted at `skip` (the rat guide layer). References are followed
/// into their targets, where no visibility filtering applies.
pub fn find_exclusions(doc: &Document, ns: &Namespaces, skip: Option<NodeId>) -> Vec<BoundingBox> {
    let walker = Walker {
        doc,
        ns,
        resolver: Resolver::new(doc, ns),
    };
    let mut found = Vec::new();
    let mut path = RefPath::default();
    for node in top_level_content(doc, ns, skip, true) {
        walker.visit(node, &doc.parent_transform(node), &mut path, &mut found);
    }
    found
}

/// Union of every `bh:rat-placement="boundary"` element outside `defs`,
/// falling back to the page bounds.
pub fn find_boundary(doc: &Document, ns: &Namespaces, skip: Option<NodeId>) -> BoundingBox {
    let boxes = top_level_content(doc, ns, skip, false)
        .into_iter()
        .filter(|&n| doc.attr(n, ns.rat_placement()) == Some(BOUNDARY))
        .filter_map(|n| bounding_box_in_page(doc, ns, n));
    union_all(boxes).unwrap_or_else(|| page_bounds(doc))
}

/// Elements under the root, excluding `defs` and the `skip` subtree, in
/// document order. With `visible_only`, hidden layers are pruned as well.
fn top_level_content(
    doc: &Document,
    ns: &Namespaces,
    skip: Option<NodeId>,
    visible_only: bool,
) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = doc
        .element_children(doc.root())
        .filter(|&c| doc.element_kind(ns, c) != Some(ElementKind::Defs))
        .collect();
    stack.reverse();
    while let Some(node) = stack.pop() {
        if Some(node) == skip {
            continue;
        }
        if visible_only && doc.is_layer(ns, node) && doc.is_display_none(node) {
            continue;
        }
        out.push(node);
        let mut children: Vec<NodeId> = doc.element_children(node).collect();
        children.reverse();
        stack.extend(children);
    }
    out
}

struct Walker<'a> {
    doc: &'a Document,
    ns: &'a Namespaces,
    resolver: Resolver<'a>,
}

impl Walker<'_> {
    /// Check one element; `outer` maps its parent's frame to page
    /// coordinates. Does not descend into children (callers do).
    fn visit(
        &self,
        node: NodeId,
        outer: &Transform,
        path: &mut RefPath,
        found: &mut Vec<BoundingBox>,
    ) {
        if self.doc.attr(node, self.ns.rat_placement()) == Some(EXCLUDE) {
            found.extend(bounding_box(self.doc, self.ns, node, outer));
        } else if self.doc.element_kind(self.ns, node) == Some(ElementKind::Reference) {
            self.follow(node, outer, path, found);
        }
    }

    fn follow(
        &self,
        node: NodeId,
        outer: &Transform,
        path: &mut RefPath,
        found: &mut Vec<BoundingBox>,
    ) {
        let resolved = self.resolver.target_id(node).and_then(|id| {
            path.enter(id)?;
            self.resolver.lookup(id)
        });
        let target = match resolved {
            Ok(target) => target,
            Err(err) => {
                warn!("{}", err);
                return;
            }
        };
        let frame = *outer * self.resolver.use_transform(node);
        self.walk_target(target, &frame, path, found);
        path.leave();
    }

    /// Descendant-or-self walk of a reference target. `outer` is the frame
    /// of the target's (virtual) parent.
    fn walk_target(
        &self,
        node: NodeId,
        outer: &Transform,
        path: &mut RefPath,
        found: &mut Vec<BoundingBox>,
    ) {
        let flagged = self.doc.attr(node, self.ns.rat_placement()) == Some(EXCLUDE);
        self.visit(node, outer, path, found);
        if flagged || self.doc.element_kind(self.ns, node) == Some(ElementKind::Reference) {
            return;
        }
        let inner = *outer * self.doc.local_transform(node);
        let children: Vec<NodeId> = self.doc.element_children(node).collect();
        for child in children {
            self.walk_target(child, &inner, path, found);
        }
    }
}
