//! The "Set Random Seed" effect: give the drawing a `bh:random-seed`.

use rand::Rng;
use tracing::warn;

use crate::config::Namespaces;
use crate::document::Document;

/// Store a random seed on the root element.
///
/// Returns the new seed, or `None` (with a warning) when the drawing already
/// has one; an existing seed is never replaced.
pub fn set_random_seed<R: Rng>(doc: &mut Document, ns: &Namespaces, rng: &mut R) -> Option<u64> {
    let root = doc.root();
    if let Some(existing) = doc.attr(root, ns.random_seed()) {
        warn!("Random seed is already set ({})", existing);
        return None;
    }
    let seed = rng.random_range(0..=u64::from(u32::MAX));
    doc.set_attr(root, ns.random_seed(), seed.to_string());
    Some(seed)
}
