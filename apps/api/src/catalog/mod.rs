// Catalog: the printed texts on offer, and which of them fit a given wall.
// Records are loaded once at startup and shared read-only through AppState.

pub mod filter;
pub mod records;
pub mod slug;

pub use filter::{dedup_by_slug, filter_catalog, CatalogEntry, CoverUrls};
pub use records::{load_catalog, Catalog};
pub use slug::slugify;
