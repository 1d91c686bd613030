//! The rat placement guide layer.
//!
//! Placement state lives in the drawing itself, in a locked layer labelled
//! `[h] Rat Placement Guides`. The layer holds rectangles tagged with
//! `bh:rat-guide-mode`:
//!
//! - `boundary`: where rats may go (one or more, unioned)
//! - `exclusion`: where they may not; rectangles generated for placed rats
//!   also carry `bh:rat-guide-source` naming the rat they came from
//!
//! Untagged top-level children are exclusions drawn by hand and are never
//! touched by the tool.
//!
//! The layer carries the inverse of its parent's transform, so rectangle
//! coordinates are page coordinates.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::bbox::{bounding_box_in_page, page_bounds};
use crate::config::{Name, Namespaces};
use crate::document::{Document, ElementKind, NodeId};
use crate::error::HideRatsError;
use crate::exclusions::{find_boundary, find_exclusions};
use crate::geometry::{BoundingBox, Transform, fmt_number, union_all};

pub const GUIDE_LAYER_LABEL: &str = "[h] Rat Placement Guides";

/// Value of `bh:rat-guide-mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideMode {
    Layer,
    Boundary,
    Exclusion,
}

impl GuideMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuideMode::Layer => "layer",
            GuideMode::Boundary => "boundary",
            GuideMode::Exclusion => "exclusion",
        }
    }

    fn style(&self) -> &'static str {
        match self {
            GuideMode::Boundary => concat!(
                "fill:none;stroke:#0000ff;stroke-width:1;stroke-opacity:0.5;",
                "stroke-dasharray:2,6;stroke-linecap:round;stroke-miterlimit:4"
            ),
            _ => concat!(
                "fill:#c68c8c;fill-opacity:0.125;stroke:#ff0000;stroke-width:1;",
                "stroke-opacity:0.5;stroke-dasharray:2,6;stroke-linecap:round;",
                "stroke-miterlimit:4"
            ),
        }
    }
}

impl fmt::Display for GuideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GuideMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "layer" => Ok(GuideMode::Layer),
            "boundary" => Ok(GuideMode::Boundary),
            "exclusion" => Ok(GuideMode::Exclusion),
            other => Err(format!("unknown rat guide mode {:?}", other)),
        }
    }
}

/// A box recorded in the guide layer, in page coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionZone {
    pub bbox: BoundingBox,
    pub mode: GuideMode,
    /// Id of the rat this exclusion was generated for.
    pub source: Option<String>,
}

/// Handle to the guide layer of one course scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatGuide {
    layer: NodeId,
}

impl RatGuide {
    /// Look for an existing guide layer under `parent`.
    pub fn find(doc: &Document, ns: &Namespaces, parent: NodeId) -> Option<RatGuide> {
        doc.descendants(parent)
            .into_iter()
            .skip(1)
            .find(|&n| {
                doc.element_kind(ns, n) == Some(ElementKind::Layer)
                    && doc.attr(n, ns.rat_guide_mode()) == Some(GuideMode::Layer.as_str())
            })
            .map(|layer| RatGuide { layer })
    }

    /// Find the guide layer under `parent`, or create and populate one.
    pub fn find_or_create(
        doc: &mut Document,
        ns: &Namespaces,
        parent: NodeId,
    ) -> Result<RatGuide, HideRatsError> {
        if let Some(guide) = RatGuide::find(doc, ns, parent) {
            return Ok(guide);
        }

        let layer = doc.new_layer(ns, GUIDE_LAYER_LABEL);
        doc.set_attr(layer, ns.rat_guide_mode(), GuideMode::Layer.as_str());
        doc.set_sensitive(ns, layer, false);
        let parent_transform = doc.composed_transform(parent);
        if !parent_transform.is_identity() {
            let inverse = parent_transform.inverse().ok_or_else(|| {
                HideRatsError::Structure(format!(
                    "can not place a guide layer under a parent with singular transform {}",
                    parent_transform
                ))
            })?;
            doc.set_transform(layer, &inverse);
        }
        doc.append_child(parent, layer);
        debug!("created rat guide layer under {:?}", parent);

        let guide = RatGuide { layer };
        guide.populate(doc, ns)?;
        Ok(guide)
    }

    #[inline]
    pub fn layer(&self) -> NodeId {
        self.layer
    }

    /// Delete every generated rectangle and redraw the permanent boundary
    /// and exclusions. Hand-drawn children are kept.
    pub fn reset(&self, doc: &mut Document, ns: &Namespaces) -> Result<(), HideRatsError> {
        for node in self.tagged(doc, ns) {
            doc.detach(node);
        }
        self.populate(doc, ns)
    }

    fn populate(&self, doc: &mut Document, ns: &Namespaces) -> Result<(), HideRatsError> {
        let boundary = find_boundary(doc, ns, Some(self.layer));
        self.add_rect(doc, ns, &boundary, GuideMode::Boundary, None)?;
        for exclusion in find_exclusions(doc, ns, Some(self.layer)) {
            self.add_rect(doc, ns, &exclusion, GuideMode::Exclusion, None)?;
        }
        Ok(())
    }

    /// Descendants carrying a recognized `bh:rat-guide-mode`.
    fn tagged(&self, doc: &Document, ns: &Namespaces) -> Vec<NodeId> {
        doc.descendants(self.layer)
            .into_iter()
            .skip(1)
            .filter(|&n| {
                doc.attr(n, ns.rat_guide_mode())
                    .is_some_and(|mode| mode.parse::<GuideMode>().is_ok())
            })
            .collect()
    }

    /// Every tagged boundary or exclusion box.
    pub fn zones(&self, doc: &Document, ns: &Namespaces) -> Vec<ExclusionZone> {
        self.tagged(doc, ns)
            .into_iter()
            .filter_map(|n| {
                let mode = doc.attr(n, ns.rat_guide_mode())?.parse().ok()?;
                if mode == GuideMode::Layer {
                    return None;
                }
                Some(ExclusionZone {
                    bbox: bounding_box_in_page(doc, ns, n)?,
                    mode,
                    source: doc.attr(n, ns.rat_guide_source()).map(str::to_string),
                })
            })
            .collect()
    }

    /// Union of the boundary rectangles, or the page if there are none.
    pub fn boundary(&self, doc: &Document, ns: &Namespaces) -> BoundingBox {
        union_all(
            self.zones(doc, ns)
                .into_iter()
                .filter(|z| z.mode == GuideMode::Boundary)
                .map(|z| z.bbox),
        )
        .unwrap_or_else(|| page_bounds(doc))
    }

    /// Tagged exclusions plus the boxes of untagged top-level children.
    pub fn exclusions(&self, doc: &Document, ns: &Namespaces) -> Vec<ExclusionZone> {
        let mut zones: Vec<ExclusionZone> = self
            .zones(doc, ns)
            .into_iter()
            .filter(|z| z.mode == GuideMode::Exclusion)
            .collect();
        zones.extend(
            doc.element_children(self.layer)
                .filter(|&n| doc.attr(n, ns.rat_guide_mode()).is_none())
                .filter_map(|n| bounding_box_in_page(doc, ns, n))
                .map(|bbox| ExclusionZone {
                    bbox,
                    mode: GuideMode::Exclusion,
                    source: None,
                }),
        );
        zones
    }

    /// Record an exclusion. With a `source`, any earlier exclusion generated
    /// for the same source is removed first.
    pub fn add_exclusion(
        &self,
        doc: &mut Document,
        ns: &Namespaces,
        bbox: &BoundingBox,
        source: Option<&str>,
    ) -> Result<(), HideRatsError> {
        if let Some(source) = source {
            let stale: Vec<NodeId> = doc
                .descendants(self.layer)
                .into_iter()
                .filter(|&n| doc.attr(n, ns.rat_guide_source()) == Some(source))
                .collect();
            for node in stale {
                doc.detach(node);
            }
        }
        self.add_rect(doc, ns, bbox, GuideMode::Exclusion, source)
    }

    fn add_rect(
        &self,
        doc: &mut Document,
        ns: &Namespaces,
        bbox: &BoundingBox,
        mode: GuideMode,
        source: Option<&str>,
    ) -> Result<(), HideRatsError> {
        let to_local = self.page_to_local(doc)?;
        let local = bbox.transformed(&to_local);

        let rect = doc.create_element(ns.svg("rect"));
        doc.set_attr(rect, Name::plain("x"), fmt_number(local.left));
        doc.set_attr(rect, Name::plain("y"), fmt_number(local.top));
        doc.set_attr(rect, Name::plain("width"), fmt_number(local.width()));
        doc.set_attr(rect, Name::plain("height"), fmt_number(local.height()));
        doc.set_attr(rect, Name::plain("style"), mode.style());
        doc.set_attr(rect, ns.rat_guide_mode(), mode.as_str());
        if let Some(source) = source {
            doc.set_attr(rect, ns.rat_guide_source(), source);
        }
        doc.append_child(self.layer, rect);
        Ok(())
    }

    /// Maps page coordinates into the layer's own frame.
    fn page_to_local(&self, doc: &Document) -> Result<Transform, HideRatsError> {
        let composed = doc.composed_transform(self.layer);
        composed.inverse().ok_or_else(|| {
            HideRatsError::Structure(format!(
                "rat guide layer has a singular transform {}",
                composed
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COURSE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg"
        xmlns:xlink="http://www.w3.org/1999/xlink"
        xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
        xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd"
        xmlns:bh="http://dairiki.org/barnhunt/inkscape-extensions"
        width="400" height="300">
      <g inkscape:groupmode="layer" inkscape:label="Ring" id="ring">
        <rect id="fence" bh:rat-placement="boundary" x="10" y="10" width="200" height="100"/>
        <rect id="hide" bh:rat-placement="exclude" x="20" y="20" width="10" height="10"/>
      </g>
      <g inkscape:groupmode="layer" inkscape:label="[o] Blind 1" id="rats"/>
    </svg>"##;

    fn course() -> Document {
        Document::parse(COURSE).unwrap()
    }

    fn sorted(mut zones: Vec<ExclusionZone>) -> Vec<ExclusionZone> {
        zones.sort_by(|a, b| {
            a.bbox
                .left
                .total_cmp(&b.bbox.left)
                .then(a.bbox.top.total_cmp(&b.bbox.top))
        });
        zones
    }

    #[test]
    fn created_layer_is_populated_and_locked() {
        let mut doc = course();
        let ns = Namespaces::default();
        let root = doc.root();
        let guide = RatGuide::find_or_create(&mut doc, &ns, root).unwrap();

        let layer = guide.layer();
        assert_eq!(doc.label(&ns, layer), Some(GUIDE_LAYER_LABEL));
        assert_eq!(doc.attr(layer, ns.insensitive()), Some("true"));
        assert_eq!(doc.parent(layer), Some(root));

        assert_eq!(guide.boundary(&doc, &ns), BoundingBox::new(10.0, 10.0, 210.0, 110.0));
        let exclusions = guide.exclusions(&doc, &ns);
        assert_eq!(exclusions.len(), 1);
        assert_eq!(exclusions[0].bbox, BoundingBox::new(20.0, 20.0, 30.0, 30.0));
        assert_eq!(exclusions[0].source, None);
    }

    #[test]
    fn second_lookup_finds_the_same_layer() {
        let mut doc = course();
        let ns = Namespaces::default();
        let root = doc.root();
        let first = RatGuide::find_or_create(&mut doc, &ns, root).unwrap();
        let second = RatGuide::find_or_create(&mut doc, &ns, root).unwrap();
        assert_eq!(first, second);
        assert_eq!(guide_layers(&doc, &ns), 1);
        // Reparsing the output finds it too.
        let reparsed = Document::parse(&doc.to_xml_string()).unwrap();
        assert!(RatGuide::find(&reparsed, &ns, reparsed.root()).is_some());
    }

    fn guide_layers(doc: &Document, ns: &Namespaces) -> usize {
        doc.descendants(doc.root())
            .into_iter()
            .filter(|&n| doc.attr(n, ns.rat_guide_mode()) == Some("layer"))
            .count()
    }

    #[test]
    fn reset_is_idempotent() {
        let mut doc = course();
        let ns = Namespaces::default();
        let root = doc.root();
        let guide = RatGuide::find_or_create(&mut doc, &ns, root).unwrap();
        guide
            .add_exclusion(&mut doc, &ns, &BoundingBox::new(50.0, 50.0, 60.0, 60.0), Some("rat1"))
            .unwrap();

        guide.reset(&mut doc, &ns).unwrap();
        let once = sorted(guide.zones(&doc, &ns));
        guide.reset(&mut doc, &ns).unwrap();
        let twice = sorted(guide.zones(&doc, &ns));
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2, "boundary plus the permanent exclusion");
        assert!(once.iter().all(|z| z.source.is_none()));
    }

    #[test]
    fn reset_keeps_hand_drawn_exclusions() {
        let mut doc = course();
        let ns = Namespaces::default();
        let root = doc.root();
        let guide = RatGuide::find_or_create(&mut doc, &ns, root).unwrap();

        let manual = doc.create_element(ns.svg("rect"));
        for (k, v) in [("x", "100"), ("y", "50"), ("width", "5"), ("height", "5")] {
            doc.set_attr(manual, Name::plain(k), v);
        }
        doc.append_child(guide.layer(), manual);

        guide.reset(&mut doc, &ns).unwrap();
        assert!(doc.is_attached(manual));
        let boxes: Vec<BoundingBox> = guide.exclusions(&doc, &ns).into_iter().map(|z| z.bbox).collect();
        assert!(boxes.contains(&BoundingBox::new(100.0, 50.0, 105.0, 55.0)));
        assert!(boxes.contains(&BoundingBox::new(20.0, 20.0, 30.0, 30.0)));
    }

    #[test]
    fn same_source_replaces_previous_exclusion() {
        let mut doc = course();
        let ns = Namespaces::default();
        let root = doc.root();
        let guide = RatGuide::find_or_create(&mut doc, &ns, root).unwrap();

        guide
            .add_exclusion(&mut doc, &ns, &BoundingBox::new(50.0, 50.0, 60.0, 60.0), Some("rat1"))
            .unwrap();
        guide
            .add_exclusion(&mut doc, &ns, &BoundingBox::new(70.0, 50.0, 80.0, 60.0), Some("rat1"))
            .unwrap();
        guide
            .add_exclusion(&mut doc, &ns, &BoundingBox::new(90.0, 50.0, 95.0, 60.0), Some("rat2"))
            .unwrap();

        let linked: Vec<ExclusionZone> = guide
            .exclusions(&doc, &ns)
            .into_iter()
            .filter(|z| z.source.as_deref() == Some("rat1"))
            .collect();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].bbox, BoundingBox::new(70.0, 50.0, 80.0, 60.0));
        assert_eq!(guide.exclusions(&doc, &ns).len(), 3);
    }

    #[test]
    fn transformed_parent_gets_inverse_transform() {
        let mut doc = Document::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" width="100" height="100">
                 <g inkscape:groupmode="layer" id="outer" transform="translate(30,40) scale(2)">
                   <g inkscape:groupmode="layer" id="rats"/>
                 </g>
               </svg>"#,
        )
        .unwrap();
        let ns = Namespaces::default();
        let outer = doc.elements_by_id("outer")[0];
        let guide = RatGuide::find_or_create(&mut doc, &ns, outer).unwrap();
        assert!(doc.composed_transform(guide.layer()).is_identity());

        let bbox = BoundingBox::new(5.0, 6.0, 15.0, 26.0);
        guide.add_exclusion(&mut doc, &ns, &bbox, Some("r")).unwrap();
        let zone = guide
            .exclusions(&doc, &ns)
            .into_iter()
            .find(|z| z.source.as_deref() == Some("r"))
            .unwrap();
        assert!(zone.bbox.approx_eq(&bbox, 1e-9));
    }

    #[test]
    fn singular_parent_is_a_structure_error() {
        let mut doc = Document::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g id="flat" transform="scale(0)"/></svg>"#,
        )
        .unwrap();
        let ns = Namespaces::default();
        let flat = doc.elements_by_id("flat")[0];
        assert!(matches!(
            RatGuide::find_or_create(&mut doc, &ns, flat),
            Err(HideRatsError::Structure(_))
        ));
    }

    #[test]
    fn guide_modes_parse() {
        assert_eq!("boundary".parse::<GuideMode>(), Ok(GuideMode::Boundary));
        assert!("notation".parse::<GuideMode>().is_err());
        assert_eq!(GuideMode::Exclusion.to_string(), "exclusion");
    }
}
