//! The "Hide Rats" effect: randomize the positions of the selected rats.
//!
//! 1. Check the selection: rats only, all on one layer.
//! 2. Find or create the guide layer next to the rat layer.
//! 3. Optionally reset the guide layer and/or clone the rat layer into a
//!    new blind.
//! 4. Place each rat, recording its new box as an exclusion before placing
//!    the next one.
//!
//! Nothing is modified until the selection has been validated.

use std::collections::HashMap;
use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use tracing::{debug, info};

use crate::bbox::bounding_box_in_page;
use crate::blind::clone_rat_layer;
use crate::config::{Name, Namespaces};
use crate::document::{Document, ElementKind, NodeId};
use crate::error::{BadRats, HideRatsError};
use crate::guide::RatGuide;
use crate::placer::{DEFAULT_MAX_TRIES, Placement, RatPlacer};
use crate::resolve::Resolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HideRatsOptions {
    /// Clear generated exclusions before placing.
    pub restart: bool,
    /// Clone the rat layer into a new blind before placing.
    pub new_blind: bool,
    pub max_tries: usize,
    /// Fixed seed for reproducible placement.
    pub seed: Option<u64>,
}

impl Default for HideRatsOptions {
    fn default() -> Self {
        Self {
            restart: false,
            new_blind: false,
            max_tries: DEFAULT_MAX_TRIES,
            seed: None,
        }
    }
}

/// Where one rat went.
#[derive(Debug, Clone, PartialEq)]
pub struct RatPlacement {
    pub rat: NodeId,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HideRatsReport {
    /// Layer holding the placed rats (the new blind when cloning).
    pub rat_layer: NodeId,
    pub guide_layer: NodeId,
    pub placements: Vec<RatPlacement>,
}

static RAT_HREF: OnceLock<Regex> = OnceLock::new();

fn rat_href_regex() -> &'static Regex {
    RAT_HREF.get_or_init(|| Regex::new(r"^#(rat|.*tube)").expect("invalid regex pattern"))
}

/// A rat is a `use` of a symbol whose id starts with `rat` or ends in
/// `tube`.
pub fn looks_like_rat(doc: &Document, ns: &Namespaces, node: NodeId) -> bool {
    doc.element_kind(ns, node) == Some(ElementKind::Reference)
        && Resolver::new(doc, ns)
            .href(node)
            .is_some_and(|href| rat_href_regex().is_match(href))
}

/// The one layer all the selected rats live on.
pub fn find_rat_layer(doc: &Document, ns: &Namespaces, rats: &[NodeId]) -> Result<NodeId, BadRats> {
    if !rats.iter().all(|&rat| looks_like_rat(doc, ns, rat)) {
        return Err(BadRats::Fishy);
    }
    let mut layers: Vec<Option<NodeId>> = rats
        .iter()
        .map(|&rat| doc.containing_layer(ns, rat))
        .collect();
    layers.sort();
    layers.dedup();
    match layers.as_slice() {
        [] => Err(BadRats::NoneSelected),
        [Some(layer)] => Ok(*layer),
        [None] => Err(BadRats::NotOnLayer),
        _ => Err(BadRats::MultipleLayers),
    }
}

/// Look up selected ids.
pub fn select_by_ids<S: AsRef<str>>(doc: &Document, ids: &[S]) -> Result<Vec<NodeId>, BadRats> {
    ids.iter()
        .map(|id| {
            let id = id.as_ref();
            doc.elements_by_id(id)
                .first()
                .copied()
                .ok_or_else(|| BadRats::UnknownSelection(id.to_string()))
        })
        .collect()
}

/// Run the effect with an RNG built from `options.seed`.
pub fn run(
    doc: &mut Document,
    ns: &Namespaces,
    selection: &[NodeId],
    options: &HideRatsOptions,
) -> Result<HideRatsReport, HideRatsError> {
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    hide_rats(doc, ns, selection, options, &mut rng)
}

pub fn hide_rats<R: Rng>(
    doc: &mut Document,
    ns: &Namespaces,
    selection: &[NodeId],
    options: &HideRatsOptions,
    rng: &mut R,
) -> Result<HideRatsReport, HideRatsError> {
    let mut rat_layer = find_rat_layer(doc, ns, selection)?;
    // The guide belongs to the layer enclosing the rat layer, not to any
    // plain group in between.
    let scope = doc.containing_layer(ns, rat_layer).unwrap_or_else(|| doc.root());

    let guide = RatGuide::find_or_create(doc, ns, scope)?;
    if options.restart || options.new_blind {
        guide.reset(doc, ns)?;
    }

    let mut rats = in_document_order(doc, selection);
    if options.new_blind {
        let (layer, cloned) = clone_rat_layer(doc, ns, rat_layer, &rats)?;
        info!(
            "Started new blind {:?}",
            doc.label(ns, layer).unwrap_or_default()
        );
        rat_layer = layer;
        rats = cloned;
    }

    // Rats without an id can not be linked to their exclusions.
    let mut rat_ids = Vec::with_capacity(rats.len());
    for &rat in &rats {
        let id = match doc.xml_id(rat) {
            Some(id) => id.to_string(),
            None => {
                let id = doc.unique_id("rat");
                doc.set_attr(rat, Name::plain("id"), id.clone());
                id
            }
        };
        rat_ids.push(id);
    }

    // The rats being moved should not avoid where they were before.
    let exclusions = guide
        .exclusions(doc, ns)
        .into_iter()
        .filter(|zone| {
            zone.source
                .as_ref()
                .is_none_or(|source| !rat_ids.contains(source))
        })
        .map(|zone| zone.bbox)
        .collect();
    let boundary = guide.boundary(doc, ns);
    debug!("placing {} rats inside {:?}", rats.len(), boundary);
    let mut placer = RatPlacer::new(boundary, exclusions).with_max_tries(options.max_tries);

    let mut placements = Vec::with_capacity(rats.len());
    for (&rat, rat_id) in rats.iter().zip(&rat_ids) {
        let Some(placement) = placer.place_rat(doc, ns, rat, rng)? else {
            continue;
        };
        if let Some(bbox) = bounding_box_in_page(doc, ns, rat) {
            guide.add_exclusion(doc, ns, &bbox, Some(rat_id.as_str()))?;
            placer.add_exclusion(bbox);
        }
        placements.push(RatPlacement { rat, placement });
    }

    Ok(HideRatsReport {
        rat_layer,
        guide_layer: guide.layer(),
        placements,
    })
}

fn in_document_order(doc: &Document, nodes: &[NodeId]) -> Vec<NodeId> {
    let order: HashMap<NodeId, usize> = doc
        .descendants(doc.root())
        .into_iter()
        .enumerate()
        .map(|(i, n)| (n, i))
        .collect();
    let mut sorted = nodes.to_vec();
    sorted.sort_by_key(|n| order.get(n).copied().unwrap_or(usize::MAX));
    sorted.dedup();
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::guide::GuideMode;

    const COURSE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg"
        xmlns:xlink="http://www.w3.org/1999/xlink"
        xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
        xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd"
        xmlns:bh="http://dairiki.org/barnhunt/inkscape-extensions"
        width="400" height="300">
      <defs>
        <symbol id="rat"><rect width="10" height="5"/></symbol>
        <symbol id="litter-tube"><rect width="4" height="4"/></symbol>
        <symbol id="bale"><rect width="30" height="15"/></symbol>
      </defs>
      <g inkscape:groupmode="layer" inkscape:label="Ring" id="ring">
        <rect id="fence" bh:rat-placement="boundary" x="10" y="10" width="200" height="100"/>
        <rect id="hide" bh:rat-placement="exclude" x="20" y="20" width="100" height="80"/>
        <use id="bale1" xlink:href="#bale" x="300" y="200"/>
      </g>
      <g inkscape:groupmode="layer" inkscape:label="[o] Blind 1" id="blind1">
        <use id="rat1" xlink:href="#rat" x="0" y="0"/>
        <use id="rat2" xlink:href="#rat" x="50" y="0"/>
        <use id="tube1" xlink:href="#litter-tube" x="90" y="0"/>
      </g>
      <g inkscape:groupmode="layer" inkscape:label="Other" id="other">
        <use id="rat9" xlink:href="#rat"/>
      </g>
      <use id="loose" xlink:href="#rat"/>
    </svg>"##;

    fn course() -> Document {
        Document::parse(COURSE).unwrap()
    }

    fn ids(doc: &Document, ids: &[&str]) -> Vec<NodeId> {
        select_by_ids(doc, ids).unwrap()
    }

    fn seeded() -> HideRatsOptions {
        HideRatsOptions {
            seed: Some(1234),
            ..HideRatsOptions::default()
        }
    }

    fn sourced_exclusions(doc: &Document, ns: &Namespaces, guide: NodeId) -> Vec<String> {
        let mut sources: Vec<String> = doc
            .descendants(guide)
            .into_iter()
            .filter(|&n| doc.attr(n, ns.rat_guide_mode()) == Some(GuideMode::Exclusion.as_str()))
            .filter_map(|n| doc.attr(n, ns.rat_guide_source()).map(str::to_string))
            .collect();
        sources.sort();
        sources
    }

    #[test]
    fn recognizes_rats() {
        let doc = course();
        let ns = Namespaces::default();
        for id in ["rat1", "tube1", "loose"] {
            assert!(looks_like_rat(&doc, &ns, ids(&doc, &[id])[0]), "{}", id);
        }
        for id in ["bale1", "fence", "blind1"] {
            assert!(!looks_like_rat(&doc, &ns, ids(&doc, &[id])[0]), "{}", id);
        }
    }

    #[test]
    fn rejects_bad_selections() {
        let doc = course();
        let ns = Namespaces::default();
        assert_eq!(find_rat_layer(&doc, &ns, &[]), Err(BadRats::NoneSelected));
        assert_eq!(
            find_rat_layer(&doc, &ns, &ids(&doc, &["rat1", "bale1"])),
            Err(BadRats::Fishy)
        );
        assert_eq!(
            find_rat_layer(&doc, &ns, &ids(&doc, &["rat1", "rat9"])),
            Err(BadRats::MultipleLayers)
        );
        assert_eq!(
            find_rat_layer(&doc, &ns, &ids(&doc, &["loose"])),
            Err(BadRats::NotOnLayer)
        );
        assert_eq!(
            select_by_ids(&doc, &["rat1", "nope"]),
            Err(BadRats::UnknownSelection("nope".into()))
        );
        let blind1 = ids(&doc, &["blind1"])[0];
        assert_eq!(find_rat_layer(&doc, &ns, &ids(&doc, &["rat2", "rat1"])), Ok(blind1));
    }

    #[test]
    fn bad_selection_leaves_document_untouched() {
        let mut doc = course();
        let ns = Namespaces::default();
        let before = doc.to_xml_string();
        let selection = ids(&doc, &["rat1", "rat9"]);
        let err = run(&mut doc, &ns, &selection, &seeded()).unwrap_err();
        assert_eq!(err.to_string(), "Rats are not all on the same layer");
        assert_eq!(doc.to_xml_string(), before);
    }

    #[test]
    fn rats_land_inside_boundary_and_avoid_exclusions() {
        let mut doc = course();
        let ns = Namespaces::default();
        let selection = ids(&doc, &["rat1", "rat2", "tube1"]);
        let report = run(&mut doc, &ns, &selection, &seeded()).unwrap();
        assert_eq!(report.placements.len(), 3);

        let boundary = BoundingBox::new(10.0, 10.0, 210.0, 110.0);
        let hide = BoundingBox::new(20.0, 20.0, 120.0, 100.0);
        let boxes: Vec<BoundingBox> = selection
            .iter()
            .map(|&rat| bounding_box_in_page(&doc, &ns, rat).unwrap())
            .collect();
        for (bbox, placed) in boxes.iter().zip(&report.placements) {
            assert!(bbox.left >= boundary.left - 1e-6 && bbox.right <= boundary.right + 1e-6);
            assert!(bbox.top >= boundary.top - 1e-6 && bbox.bottom <= boundary.bottom + 1e-6);
            if placed.placement.clear {
                assert!(!bbox.overlaps(&hide), "{:?} overlaps the hide", bbox);
            }
        }
        if report.placements.iter().all(|p| p.placement.clear) {
            assert!(!boxes[0].overlaps(&boxes[1]));
            assert!(!boxes[0].overlaps(&boxes[2]));
            assert!(!boxes[1].overlaps(&boxes[2]));
        }

        assert_eq!(
            sourced_exclusions(&doc, &ns, report.guide_layer),
            vec!["rat1", "rat2", "tube1"]
        );
    }

    #[test]
    fn rerunning_replaces_self_exclusions() {
        let mut doc = course();
        let ns = Namespaces::default();
        let selection = ids(&doc, &["rat1", "rat2"]);
        let first = run(&mut doc, &ns, &selection, &seeded()).unwrap();
        let options = HideRatsOptions {
            seed: Some(99),
            ..HideRatsOptions::default()
        };
        let second = run(&mut doc, &ns, &selection, &options).unwrap();
        assert_eq!(first.guide_layer, second.guide_layer);
        assert_eq!(sourced_exclusions(&doc, &ns, second.guide_layer), vec!["rat1", "rat2"]);
    }

    #[test]
    fn guide_layer_sits_beside_the_rat_layer() {
        let mut doc = course();
        let ns = Namespaces::default();
        let selection = ids(&doc, &["rat1"]);
        let report = run(&mut doc, &ns, &selection, &seeded()).unwrap();
        assert_eq!(doc.parent(report.guide_layer), Some(doc.root()));
        let exclusions = RatGuide::find(&doc, &ns, doc.root())
            .unwrap()
            .exclusions(&doc, &ns);
        assert!(exclusions.iter().any(|z| z.bbox == BoundingBox::new(20.0, 20.0, 120.0, 100.0)));
    }

    #[test]
    fn guide_layer_skips_plain_groups_around_the_rat_layer() {
        let mut doc = Document::parse(
            r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"
                     xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" width="200" height="100">
                 <defs><symbol id="rat"><rect width="10" height="5"/></symbol></defs>
                 <g inkscape:groupmode="layer" id="course" inkscape:label="Course">
                   <g id="plain">
                     <g inkscape:groupmode="layer" id="blind" inkscape:label="[o] Blind 1">
                       <use id="r1" xlink:href="#rat"/>
                     </g>
                   </g>
                 </g>
               </svg>"##,
        )
        .unwrap();
        let ns = Namespaces::default();
        let selection = ids(&doc, &["r1"]);
        let report = run(&mut doc, &ns, &selection, &seeded()).unwrap();
        let course = ids(&doc, &["course"])[0];
        assert_eq!(doc.parent(report.guide_layer), Some(course));
    }

    #[test]
    fn new_blind_moves_the_copies() {
        let mut doc = course();
        let ns = Namespaces::default();
        let selection = ids(&doc, &["rat1", "rat2"]);
        let before: Vec<Option<String>> = selection
            .iter()
            .map(|&r| doc.attr(r, Name::plain("transform")).map(str::to_string))
            .collect();
        let options = HideRatsOptions {
            new_blind: true,
            ..seeded()
        };
        let report = run(&mut doc, &ns, &selection, &options).unwrap();

        assert_eq!(doc.label(&ns, report.rat_layer), Some("[o] Blind 2"));
        let old_layer = ids(&doc, &["blind1"])[0];
        assert!(doc.is_display_none(old_layer));
        let after: Vec<Option<String>> = selection
            .iter()
            .map(|&r| doc.attr(r, Name::plain("transform")).map(str::to_string))
            .collect();
        assert_eq!(before, after, "original rats stay put");

        for placed in &report.placements {
            assert_eq!(doc.parent(placed.rat), Some(report.rat_layer));
            assert!(doc.attr(placed.rat, Name::plain("transform")).is_some());
        }
        // The copies are the ones with exclusions.
        let sources = sourced_exclusions(&doc, &ns, report.guide_layer);
        assert_eq!(sources.len(), 2);
        assert!(!sources.contains(&"rat1".to_string()));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let ns = Namespaces::default();
        let mut a = course();
        let mut b = course();
        let sel_a = ids(&a, &["rat1", "rat2"]);
        let sel_b = ids(&b, &["rat1", "rat2"]);
        run(&mut a, &ns, &sel_a, &seeded()).unwrap();
        run(&mut b, &ns, &sel_b, &seeded()).unwrap();
        assert_eq!(a.to_xml_string(), b.to_xml_string());
    }
}
