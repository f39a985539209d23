//! Image search with provider fallback.
//!
//! Providers are third-party HTTP APIs implemented outside this crate.
//! They are tried in order; the first success wins.

use serde::{Deserialize, Serialize};

use crate::error::EscherError;

/// A search hit normalized across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub url: String,
    pub thumbnail: String,
    pub description: Option<String>,
    pub author: String,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// One page of results plus pagination metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchPage {
    pub images: Vec<ImageRecord>,
    pub total_pages: u32,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub page: u32,
    pub per_page: u32,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: 1,
            per_page: 12,
        }
    }
}

pub trait SearchProvider {
    fn name(&self) -> &str;
    fn search(&self, query: &SearchQuery) -> Result<SearchPage, EscherError>;
}

/// Query providers in order and return the first successful page.
///
/// Failures are logged and skipped; if every provider fails the result
/// is an empty page.
pub fn search_images(providers: &[&dyn SearchProvider], query: &SearchQuery) -> SearchPage {
    for provider in providers {
        match provider.search(query) {
            Ok(page) => {
                log::debug!(
                    "{}: {} results for {:?}",
                    provider.name(),
                    page.images.len(),
                    query.text
                );
                return page;
            }
            Err(e) => log::warn!("{} failed: {}", provider.name(), e),
        }
    }
    SearchPage::default()
}

/// Page count for providers that only report a total.
pub fn page_count(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page as u64) as u32
}
