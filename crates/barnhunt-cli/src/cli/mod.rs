//! CLI command implementations.
//!
//! One module per Inkscape effect:
//! - `hide-rats` - Randomize rat positions inside the course boundary
//! - `count-symbols` - Tally symbol usage
//! - `update-symbols` - Refresh symbol definitions from the library
//! - `random-seed` - Give the drawing a `bh:random-seed`
//! - `create-inset` - Embed a PNG snapshot of the selection

pub mod common;
pub mod count_symbols;
pub mod create_inset;
pub mod hide_rats;
pub mod random_seed;
pub mod update_symbols;

pub use count_symbols::cmd_count_symbols;
pub use create_inset::cmd_create_inset;
pub use hide_rats::cmd_hide_rats;
pub use random_seed::cmd_random_seed;
pub use update_symbols::cmd_update_symbols;
