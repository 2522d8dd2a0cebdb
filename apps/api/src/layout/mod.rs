// Layout Solver: fits a multi-page text onto a wall as a centered grid.
// Pure and synchronous; callers run it inline, including inside request handlers.

pub mod solver;

// Re-export the public API consumed by the catalog filter, compositor and handlers.
pub use solver::{solve, Layout, PageSpec, SearchStrategy, WallSpec};
