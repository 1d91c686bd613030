//! # barnhunt
//!
//! Course-design helpers for Barn Hunt drawings made in Inkscape.
//!
//! The heart of the crate is the rat hider: it scatters the selected rat
//! markers at random inside the course boundary while keeping them clear of
//! bales, tunnels and each other. Alongside it are the smaller effects:
//! symbol counting, symbol library updates, random seeds and PNG insets.
//!
//! ## Rust Lesson #7: Modules
//!
//! Every module is declared here; the layers build bottom-up:
//! - `geometry`, `config`, `error` have no crate-internal dependencies
//! - `document` is the editable SVG tree everything else works on
//! - `resolve` and `bbox` answer "what does this `use` point at" and
//!   "where is this on the page"
//! - the effect modules sit on top

pub mod bbox;
pub mod blind;
pub mod config;
pub mod count_symbols;
pub mod document;
pub mod error;
pub mod exclusions;
pub mod geometry;
pub mod guide;
pub mod hide_rats;
pub mod inset;
pub mod placer;
pub mod random_seed;
pub mod resolve;
pub mod update_symbols;

// Re-export common types at crate root for convenience.
pub use config::{Name, Namespaces};
pub use count_symbols::{CountSymbolsOptions, SymbolCounts, count_symbols};
pub use document::{Document, ElementKind, NodeId};
pub use error::{BadRats, DocumentError, HideRatsError, InsetError, ResolveError, SymbolError};
pub use geometry::{BoundingBox, Point, Transform};
pub use guide::{GuideMode, RatGuide};
pub use hide_rats::{HideRatsOptions, HideRatsReport, hide_rats, select_by_ids};
pub use inset::{InsetOptions, Rasterizer, Renderer, create_inset};
pub use placer::RatPlacer;
pub use random_seed::set_random_seed;
pub use update_symbols::{SymbolLibrary, UpdateSymbolsOptions, load_symbols, update_symbols};
