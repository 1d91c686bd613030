//! Geometric bounding boxes of document elements.
//!
//! `bounding_box(doc, ns, node, outer)` answers "where does this element
//! land in the frame described by `outer`?". The element's own transform is
//! applied on top of `outer`, so passing the composed transform of the
//! element's parent gives page coordinates (see [`bounding_box_in_page`]).
//!
//! Stroke width is not included. Curves are measured exactly: an affine map
//! of a Bézier curve is the Bézier curve of the mapped control points, so
//! the control points are transformed first and the extrema computed by
//! `lyon_geom`.

use std::str::FromStr;

use lyon_geom::{CubicBezierSegment, QuadraticBezierSegment, point};
use svgtypes::{PointsParser, SimplePathSegment, SimplifyingPathParser, ViewBox};
use tracing::{debug, warn};

use crate::config::{Name, Namespaces};
use crate::document::{Document, NodeId};
use crate::geometry::{BoundingBox, Point, Transform, union_all};
use crate::resolve::{RefPath, Resolver};

/// Bounding box of `node` mapped through `outer`.
///
/// Returns `None` for elements without geometry (text, metadata, empty
/// groups) and for references that cannot be resolved; the latter are
/// reported as warnings.
pub fn bounding_box(
    doc: &Document,
    ns: &Namespaces,
    node: NodeId,
    outer: &Transform,
) -> Option<BoundingBox> {
    Measure::new(doc, ns).bbox(node, outer, &mut RefPath::default())
}

/// Bounding box of `node` in page (document root) coordinates.
pub fn bounding_box_in_page(doc: &Document, ns: &Namespaces, node: NodeId) -> Option<BoundingBox> {
    bounding_box(doc, ns, node, &doc.parent_transform(node))
}

/// The page rectangle: `(0, 0)` to the viewBox size, or to the root's
/// `width`/`height` when there is no viewBox.
pub fn page_bounds(doc: &Document) -> BoundingBox {
    let root = doc.root();
    if let Some(vb) = doc
        .attr(root, Name::plain("viewBox"))
        .and_then(|s| ViewBox::from_str(s).ok())
    {
        return BoundingBox::from_origin_size(0.0, 0.0, vb.w, vb.h);
    }
    let width = doc.length_attr(root, "width").unwrap_or(0.0);
    let height = doc.length_attr(root, "height").unwrap_or(0.0);
    BoundingBox::from_origin_size(0.0, 0.0, width, height)
}

/// Containers whose children are not drawn in place.
const NON_RENDERING: &[&str] = &[
    "defs",
    "metadata",
    "title",
    "desc",
    "clipPath",
    "mask",
    "marker",
    "pattern",
    "linearGradient",
    "radialGradient",
    "filter",
    "style",
    "script",
];

struct Measure<'a> {
    doc: &'a Document,
    ns: &'a Namespaces,
    resolver: Resolver<'a>,
}

impl<'a> Measure<'a> {
    fn new(doc: &'a Document, ns: &'a Namespaces) -> Self {
        Self {
            doc,
            ns,
            resolver: Resolver::new(doc, ns),
        }
    }

    fn num(&self, node: NodeId, attr: &str) -> f64 {
        self.doc.length_attr(node, attr).unwrap_or(0.0)
    }

    fn bbox(&self, node: NodeId, outer: &Transform, path: &mut RefPath) -> Option<BoundingBox> {
        let el = self.doc.element(node)?;
        if !self.ns.is_svg(el.ns.as_deref()) {
            return None;
        }
        let t = *outer * self.doc.local_transform(node);

        match el.local.as_str() {
            "rect" | "image" => {
                let rect = BoundingBox::from_origin_size(
                    self.num(node, "x"),
                    self.num(node, "y"),
                    self.num(node, "width"),
                    self.num(node, "height"),
                );
                Some(rect.transformed(&t))
            }
            "circle" => {
                let r = self.num(node, "r");
                Some(ellipse_bbox(
                    Point::new(self.num(node, "cx"), self.num(node, "cy")),
                    r,
                    r,
                    &t,
                ))
            }
            "ellipse" => Some(ellipse_bbox(
                Point::new(self.num(node, "cx"), self.num(node, "cy")),
                self.num(node, "rx"),
                self.num(node, "ry"),
                &t,
            )),
            "line" => BoundingBox::from_points([
                t.apply(Point::new(self.num(node, "x1"), self.num(node, "y1"))),
                t.apply(Point::new(self.num(node, "x2"), self.num(node, "y2"))),
            ]),
            "polyline" | "polygon" => {
                let points = self.doc.attr(node, Name::plain("points"))?;
                BoundingBox::from_points(
                    PointsParser::from(points).map(|(x, y)| t.apply(Point::new(x, y))),
                )
            }
            "path" => path_bbox(self.doc.attr(node, Name::plain("d"))?, &t),
            "use" => self.use_bbox(node, &t, path),
            "svg" | "g" | "symbol" | "a" | "switch" => {
                let t = if el.local == "svg" && node != self.doc.root() {
                    t * Transform::translate(self.num(node, "x"), self.num(node, "y"))
                } else {
                    t
                };
                union_all(
                    self.doc
                        .element_children(node)
                        .filter(|&c| {
                            self.doc
                                .local_name(c)
                                .is_some_and(|name| !NON_RENDERING.contains(&name))
                        })
                        .filter_map(|c| self.bbox(c, &t, path)),
                )
            }
            _ => None,
        }
    }

    /// `t` already includes the `use` element's own transform.
    fn use_bbox(&self, node: NodeId, t: &Transform, path: &mut RefPath) -> Option<BoundingBox> {
        let resolved = self.resolver.target_id(node).and_then(|id| {
            path.enter(id)?;
            self.resolver.lookup(id)
        });
        let target = match resolved {
            Ok(target) => target,
            Err(err) => {
                warn!("{}", err);
                return None;
            }
        };
        let frame = *t * Transform::translate(self.num(node, "x"), self.num(node, "y"));
        let bbox = self.bbox(target, &frame, path);
        path.leave();
        bbox
    }
}

/// Exact box of an ellipse (axis-aligned in its own frame) under `t`.
fn ellipse_bbox(center: Point, rx: f64, ry: f64, t: &Transform) -> BoundingBox {
    let c = t.apply(center);
    let u = t.apply_vector(Point::new(rx, 0.0));
    let v = t.apply_vector(Point::new(0.0, ry));
    let half_w = u.x.hypot(v.x);
    let half_h = u.y.hypot(v.y);
    BoundingBox::new(c.x - half_w, c.y - half_h, c.x + half_w, c.y + half_h)
}

/// Box of a path's outline under `t`.
///
/// Parsing stops at the first error, keeping what was read so far (the
/// same way renderers draw a path up to a bad command).
fn path_bbox(d: &str, t: &Transform) -> Option<BoundingBox> {
    let mut acc: Option<BoundingBox> = None;
    let mut include = |bbox: BoundingBox| {
        acc = Some(match acc {
            Some(a) => a.union(&bbox),
            None => bbox,
        });
    };

    let mut current = Point::default();
    let mut start = Point::default();
    for segment in SimplifyingPathParser::from(d) {
        let segment = match segment {
            Ok(segment) => segment,
            Err(err) => {
                debug!("stopping at invalid path data: {}", err);
                break;
            }
        };
        match segment {
            SimplePathSegment::MoveTo { x, y } => {
                current = t.apply(Point::new(x, y));
                start = current;
                include(BoundingBox::new(current.x, current.y, current.x, current.y));
            }
            SimplePathSegment::LineTo { x, y } => {
                current = t.apply(Point::new(x, y));
                include(BoundingBox::new(current.x, current.y, current.x, current.y));
            }
            SimplePathSegment::Quadratic { x1, y1, x, y } => {
                let ctrl = t.apply(Point::new(x1, y1));
                let to = t.apply(Point::new(x, y));
                let b = QuadraticBezierSegment {
                    from: point(current.x, current.y),
                    ctrl: point(ctrl.x, ctrl.y),
                    to: point(to.x, to.y),
                }
                .bounding_box();
                include(BoundingBox::new(b.min.x, b.min.y, b.max.x, b.max.y));
                current = to;
            }
            SimplePathSegment::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                let c1 = t.apply(Point::new(x1, y1));
                let c2 = t.apply(Point::new(x2, y2));
                let to = t.apply(Point::new(x, y));
                let b = CubicBezierSegment {
                    from: point(current.x, current.y),
                    ctrl1: point(c1.x, c1.y),
                    ctrl2: point(c2.x, c2.y),
                    to: point(to.x, to.y),
                }
                .bounding_box();
                include(BoundingBox::new(b.min.x, b.min.y, b.max.x, b.max.y));
                current = to;
            }
            SimplePathSegment::ClosePath => {
                current = start;
            }
        }
    }
    acc
}
