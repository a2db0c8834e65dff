//! Authorized site list helpers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

const HTTPS_PREFIX: &str = "https://";

/// One dropdown entry offered on a screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteOption {
    /// Location loaded when the entry is picked.
    pub url: String,
    /// Short display label.
    pub label: String,
}

impl SiteOption {
    /// Builds an option, deriving its label from the location.
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            label: site_label(url),
        }
    }
}

/// Deduplicates sites (first occurrence wins) and sorts them by location,
/// ignoring the `https://` scheme prefix.
#[must_use]
pub fn sort_sites(sites: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut sites: Vec<String> = sites
        .into_iter()
        .map(|site| site.trim().to_owned())
        .filter(|site| !site.is_empty() && seen.insert(site.clone()))
        .collect();
    sites.sort_by(|a, b| {
        let a = a.strip_prefix(HTTPS_PREFIX).unwrap_or(a);
        let b = b.strip_prefix(HTTPS_PREFIX).unwrap_or(b);
        a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
    });
    sites
}

/// Short label for a site: the project segment for GitHub Pages locations,
/// otherwise the first host label.
#[must_use]
pub fn site_label(url: &str) -> String {
    let clean = url.strip_prefix(HTTPS_PREFIX).unwrap_or(url);
    if clean.contains(".github.io/") {
        let mut segments = clean.split('/').filter(|segment| !segment.is_empty());
        let host = segments.next().unwrap_or(clean);
        return segments.last().unwrap_or(host).to_owned();
    }
    match clean.split('.').next() {
        Some(first) if !first.is_empty() => first.to_owned(),
        _ => clean.to_owned(),
    }
}
