//! Podcast directory codec.
//!
//! Builds search request URLs and decodes the directory's JSON responses.
//! Performs no I/O: a transport fetches the URL and hands the status and
//! body back to [`Catalog::decode_response`].
//!
//! Response shape:
//!
//! ```json
//! { "results": [ { "trackId": 1, "collectionName": "...",
//!                  "artistName": "...", "artworkUrl600": "https://..." } ] }
//! ```

use std::str::FromStr;

use serde::Deserialize;
use url::Url;

use super::item::Item;
use crate::error::SearchError;

/// Default directory endpoint.
pub const DEFAULT_BASE_URL: &str = "https://itunes.apple.com";

#[derive(Debug, Deserialize)]
struct SearchResults {
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(alias = "trackID")]
    track_id: u64,
    collection_name: String,
    artist_name: String,
    #[serde(default)]
    artwork_url600: Option<String>,
}

impl From<SearchResult> for Item {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.track_id,
            // Broken artwork links drop the artwork, not the result.
            image_ref: result
                .artwork_url600
                .and_then(|artwork| Url::parse(&artwork).ok()),
            title: result.collection_name,
            subtitle: result.artist_name,
        }
    }
}

/// Request builder and response decoder for one directory endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    base_url: Url,
}

impl Catalog {
    /// Create a catalog rooted at `base_url`.
    ///
    /// The base is treated as a directory: `http://host/api` searches
    /// `http://host/api/search`.
    pub fn new(mut base_url: Url) -> Result<Self, SearchError> {
        if base_url.cannot_be_a_base() {
            return Err(SearchError::InvalidUrl(base_url.to_string()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url })
    }

    /// The public iTunes directory.
    pub fn itunes() -> Result<Self, SearchError> {
        DEFAULT_BASE_URL.parse()
    }

    /// The directory root every request is built from.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL searching podcasts for `query`.
    pub fn search_url(&self, query: &str) -> Result<Url, SearchError> {
        let mut url = self.base_url.join("search")?;
        url.query_pairs_mut()
            .append_pair("term", query)
            .append_pair("media", "podcast");
        Ok(url)
    }

    /// Decode a response body into items, in directory order.
    pub fn decode(&self, body: &[u8]) -> Result<Vec<Item>, SearchError> {
        let results: SearchResults = serde_json::from_slice(body)?;
        Ok(results.results.into_iter().map(Item::from).collect())
    }

    /// Decode a full response, rejecting non-success statuses.
    pub fn decode_response(&self, status: u16, body: &[u8]) -> Result<Vec<Item>, SearchError> {
        if !(200..300).contains(&status) {
            return Err(SearchError::Status(status));
        }
        self.decode(body)
    }
}

impl FromStr for Catalog {
    type Err = SearchError;

    fn from_str(base_url: &str) -> Result<Self, Self::Err> {
        Self::new(Url::parse(base_url)?)
    }
}
