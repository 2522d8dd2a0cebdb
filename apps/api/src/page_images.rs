//! Page image lookup: `{folder}/Page_{NNN}.jpg` → fetchable URL.
//!
//! Loaded once at startup from a flat JSON object and shared read-only.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PageImageMapError {
    #[error("failed to read page image map: {0}")]
    Io(#[from] std::io::Error),

    #[error("page image map is not a JSON object of strings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The one key format shared by the catalog import and the compositor.
/// `page_num` is 1-based and zero-padded to three digits.
pub fn page_key(folder: &str, page_num: u32) -> String {
    format!("{folder}/Page_{page_num:03}.jpg")
}

#[derive(Debug, Clone, Default)]
pub struct PageImageMap {
    urls: HashMap<String, String>,
}

impl PageImageMap {
    pub fn new(urls: HashMap<String, String>) -> Self {
        Self { urls }
    }

    pub fn from_json(json: &str) -> Result<Self, PageImageMapError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PageImageMapError> {
        let path = path.as_ref();
        let map = Self::from_json(&std::fs::read_to_string(path)?)?;
        info!("Loaded page image map with {} entries from {}", map.len(), path.display());
        Ok(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.urls.get(key).map(String::as_str)
    }

    /// URL of page `page_num` (1-based) of `folder`, if the map has one.
    pub fn page_url(&self, folder: &str, page_num: u32) -> Option<&str> {
        self.get(&page_key(folder, page_num))
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl FromIterator<(String, String)> for PageImageMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
