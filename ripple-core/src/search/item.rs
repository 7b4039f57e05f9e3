//! Search result items.

use serde::{Deserialize, Serialize};
use url::Url;

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    /// Directory-assigned identifier.
    pub id: u64,
    /// Artwork location, if the directory has one.
    pub image_ref: Option<Url>,
    /// Primary label (the podcast name).
    pub title: String,
    /// Secondary label (the creator).
    pub subtitle: String,
}

impl Item {
    /// Create an item without artwork.
    pub fn new(id: u64, title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            id,
            image_ref: None,
            title: title.into(),
            subtitle: subtitle.into(),
        }
    }

    /// Attach an artwork location.
    pub fn with_image(mut self, image_ref: Url) -> Self {
        self.image_ref = Some(image_ref);
        self
    }
}
