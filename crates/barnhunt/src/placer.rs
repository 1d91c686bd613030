//! Random rat placement.
//!
//! ## Rust Lesson #14: Generic randomness
//!
//! `random_position` is generic over `R: Rng`, so production code passes
//! an OS-seeded RNG while tests pass a seeded `StdRng` and get the same
//! positions on every run.

use rand::Rng;
use tracing::{debug, warn};

use crate::bbox::bounding_box;
use crate::config::Namespaces;
use crate::document::{Document, NodeId};
use crate::error::HideRatsError;
use crate::geometry::{BoundingBox, Point, Transform};

/// Attempts before giving up on finding a clear spot.
pub const DEFAULT_MAX_TRIES: usize = 128;

/// Outcome of a position search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// New top-left corner in page coordinates.
    pub position: Point,
    pub tries: usize,
    /// False when every try overlapped an exclusion.
    pub clear: bool,
}

/// Rejection sampler for rat positions inside a boundary.
#[derive(Debug, Clone)]
pub struct RatPlacer {
    boundary: BoundingBox,
    exclusions: Vec<BoundingBox>,
    max_tries: usize,
}

impl RatPlacer {
    pub fn new(boundary: BoundingBox, exclusions: Vec<BoundingBox>) -> Self {
        Self {
            boundary,
            exclusions,
            max_tries: DEFAULT_MAX_TRIES,
        }
    }

    pub fn with_max_tries(mut self, max_tries: usize) -> Self {
        self.max_tries = max_tries.max(1);
        self
    }

    pub fn boundary(&self) -> &BoundingBox {
        &self.boundary
    }

    pub fn exclusions(&self) -> &[BoundingBox] {
        &self.exclusions
    }

    pub fn add_exclusion(&mut self, bbox: BoundingBox) {
        self.exclusions.push(bbox);
    }

    /// Touching counts as overlapping.
    pub fn intersects_excluded(&self, bbox: &BoundingBox) -> bool {
        self.exclusions.iter().any(|excl| excl.overlaps(bbox))
    }

    /// Pick a top-left corner for a box the size of `rat_bbox`.
    ///
    /// The box is kept inside the boundary when it fits; when it is larger
    /// than the boundary on an axis, it starts at the boundary's near edge
    /// on that axis. After `max_tries` overlapping candidates the last one
    /// is returned anyway, with a warning.
    pub fn random_position<R: Rng>(&self, rng: &mut R, rat_bbox: &BoundingBox) -> Placement {
        let (w, h) = (rat_bbox.width(), rat_bbox.height());
        let x0 = self.boundary.left;
        let x1 = (self.boundary.right - w).max(x0);
        let y0 = self.boundary.top;
        let y1 = (self.boundary.bottom - h).max(y0);

        let mut position = Point::new(x0, y0);
        for tries in 1..=self.max_tries {
            position = Point::new(uniform(rng, x0, x1), uniform(rng, y0, y1));
            let candidate = BoundingBox::from_origin_size(position.x, position.y, w, h);
            if !self.intersects_excluded(&candidate) {
                return Placement {
                    position,
                    tries,
                    clear: true,
                };
            }
        }

        warn!(
            "Can not find non-excluded location for rat after {} tries. Giving up.",
            self.max_tries
        );
        Placement {
            position,
            tries: self.max_tries,
            clear: false,
        }
    }

    /// Move a rat to a random position.
    ///
    /// The position is chosen in page coordinates and mapped back through
    /// the inverse of the rat's parent transform, then prepended to the
    /// rat's own transform. Returns `Ok(None)` (after a warning) for a rat
    /// with no measurable geometry.
    pub fn place_rat<R: Rng>(
        &self,
        doc: &mut Document,
        ns: &Namespaces,
        rat: NodeId,
        rng: &mut R,
    ) -> Result<Option<Placement>, HideRatsError> {
        let parent_transform = doc.parent_transform(rat);
        let Some(rat_bbox) = bounding_box(doc, ns, rat, &parent_transform) else {
            warn!("rat #{} has no bounding box, leaving it in place", doc.xml_id(rat).unwrap_or("?"));
            return Ok(None);
        };
        let inverse = parent_transform.inverse().ok_or_else(|| {
            HideRatsError::Structure(format!(
                "rat #{} has a singular parent transform {}",
                doc.xml_id(rat).unwrap_or("?"),
                parent_transform
            ))
        })?;

        let placement = self.random_position(rng, &rat_bbox);
        let offset = inverse.apply(placement.position) - inverse.apply(rat_bbox.minimum());
        let new_local = Transform::translate(offset.x, offset.y) * doc.local_transform(rat);
        doc.set_transform(rat, &new_local);
        debug!(
            "moved rat from ({:.2}, {:.2}) to ({:.2}, {:.2}) after {} tries",
            rat_bbox.left, rat_bbox.top, placement.position.x, placement.position.y, placement.tries
        );
        Ok(Some(placement))
    }
}

/// Uniform sample from `[lo, hi]`; `lo` when the range is empty.
fn uniform<R: Rng>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi > lo { rng.random_range(lo..=hi) } else { lo }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::bounding_box_in_page;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn oversized_rats_start_at_the_boundary_edge() {
        let placer = RatPlacer::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), vec![]);
        let rat = BoundingBox::from_origin_size(0.0, 0.0, 30.0, 5.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let p = placer.random_position(&mut rng, &rat);
            assert_eq!(p.position.x, 0.0);
            assert!((0.0..=5.0).contains(&p.position.y), "y = {}", p.position.y);
            assert!(p.clear);
        }
    }

    #[test]
    fn avoids_exclusions_when_room_exists() {
        let placer = RatPlacer::new(
            BoundingBox::new(0.0, 0.0, 100.0, 100.0),
            vec![BoundingBox::new(0.0, 0.0, 50.0, 100.0)],
        );
        let rat = BoundingBox::from_origin_size(500.0, 500.0, 10.0, 10.0);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let p = placer.random_position(&mut rng, &rat);
            assert!(p.clear);
            assert!(p.position.x > 50.0 && p.position.x <= 90.0, "x = {}", p.position.x);
        }
    }

    #[test]
    fn wide_exclusion_leaves_no_clear_position() {
        // Candidates start at most at x = 90, so every one meets (0,0)-(90,100).
        let placer = RatPlacer::new(
            BoundingBox::new(0.0, 0.0, 100.0, 100.0),
            vec![BoundingBox::new(0.0, 0.0, 90.0, 100.0)],
        );
        let rat = BoundingBox::from_origin_size(0.0, 0.0, 10.0, 10.0);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let p = placer.random_position(&mut rng, &rat);
            // Touching the exclusion's right edge at x = 90 still counts.
            assert!(!p.clear);
            assert!(p.position.x <= 90.0, "x = {}", p.position.x);
        }
    }

    #[tracing_test::traced_test]
    #[test]
    fn exhaustion_warns_and_still_returns_a_position() {
        let placer = RatPlacer::new(
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            vec![BoundingBox::new(0.0, 0.0, 10.0, 10.0)],
        );
        let rat = BoundingBox::from_origin_size(0.0, 0.0, 10.0, 10.0);
        let mut rng = StdRng::seed_from_u64(1);
        let p = placer.random_position(&mut rng, &rat);
        assert!(!p.clear);
        assert_eq!(p.tries, 128);
        assert_eq!(p.position, Point::new(0.0, 0.0));
        assert!(logs_contain(
            "Can not find non-excluded location for rat after 128 tries. Giving up."
        ));
    }

    #[test]
    fn placed_rat_lands_on_the_chosen_position() {
        let mut doc = Document::parse(
            r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"
                     xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" width="300" height="300">
                 <defs><symbol id="rat"><rect width="4" height="2"/></symbol></defs>
                 <g inkscape:groupmode="layer" transform="translate(100,0) rotate(90) scale(2)">
                   <use id="r1" xlink:href="#rat" x="3" y="3" transform="translate(1,1)"/>
                 </g>
               </svg>"##,
        )
        .unwrap();
        let ns = Namespaces::default();
        let rat = doc.elements_by_id("r1")[0];
        let before = bounding_box_in_page(&doc, &ns, rat).unwrap();

        let placer = RatPlacer::new(BoundingBox::new(0.0, 0.0, 300.0, 300.0), vec![]);
        let mut rng = StdRng::seed_from_u64(9);
        let placement = placer.place_rat(&mut doc, &ns, rat, &mut rng).unwrap().unwrap();

        let after = bounding_box_in_page(&doc, &ns, rat).unwrap();
        assert!((after.left - placement.position.x).abs() < 1e-4);
        assert!((after.top - placement.position.y).abs() < 1e-4);
        assert!((after.width() - before.width()).abs() < 1e-4);
        assert!((after.height() - before.height()).abs() < 1e-4);
    }

    #[test]
    fn seeded_placement_is_reproducible() {
        let placer = RatPlacer::new(BoundingBox::new(0.0, 0.0, 100.0, 100.0), vec![]);
        let rat = BoundingBox::from_origin_size(0.0, 0.0, 5.0, 5.0);
        let a = placer.random_position(&mut StdRng::seed_from_u64(11), &rat);
        let b = placer.random_position(&mut StdRng::seed_from_u64(11), &rat);
        assert_eq!(a, b);
    }
}
