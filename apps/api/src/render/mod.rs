// Grid Compositor: fetch every page image, stretch to its cell, paste onto one canvas.
// Network fan-out is async and bounded; decoding and resizing run in spawn_blocking.

pub mod compose;
pub mod fetch;
pub mod placeholder;

pub use compose::compose;
pub use fetch::{FetchOptions, HttpPageSource, PageSource};
