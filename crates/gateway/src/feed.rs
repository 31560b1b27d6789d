//! Flattening and de-duplication of discovery feed items.

use crate::normalize::{Payload, decode, lookup, normalize_id};
use std::collections::HashSet;
use wolt_types::{FeedItem, Result, Section};

/// Decodes the `sections` array of a front-page payload. A payload without
/// sections yields an empty list.
///
/// # Errors
///
/// Returns [`wolt_types::WoltError::Shape`] if `sections` is present but malformed.
pub fn sections_from(payload: &Payload) -> Result<Vec<Section>> {
    match lookup(payload, "sections") {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(v) => decode(v.clone(), "front page sections"),
    }
}

/// Identity of a feed item: track id, normalized venue id, link target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub track_id: String,
    pub venue_id: String,
    pub target: String,
}

impl ItemKey {
    /// `None` for items without a venue; those never enter the aggregate.
    #[must_use]
    pub fn of(item: &FeedItem) -> Option<Self> {
        let venue = item.venue.as_ref()?;
        Some(Self {
            track_id: item.track_id.as_deref().unwrap_or_default().trim().to_string(),
            venue_id: normalize_id(&venue.id).unwrap_or_default(),
            target: item
                .link
                .as_ref()
                .and_then(|l| l.target.as_deref())
                .unwrap_or_default()
                .trim()
                .to_string(),
        })
    }
}

/// All venue items across `sections`, first occurrence wins.
#[must_use]
pub fn aggregate_items(sections: &[Section]) -> Vec<FeedItem> {
    let mut seen = HashSet::new();
    sections
        .iter()
        .flat_map(|s| s.items.iter())
        .filter(|item| ItemKey::of(item).is_some_and(|key| seen.insert(key)))
        .cloned()
        .collect()
}

/// Finds the item whose venue slug or link target equals `slug`
/// (case-insensitive).
#[must_use]
pub fn find_by_slug<'a>(items: &'a [FeedItem], slug: &str) -> Option<&'a FeedItem> {
    let slug = slug.trim();
    items.iter().find(|item| {
        let venue_slug = item.venue.as_ref().and_then(|v| v.slug.as_deref());
        let target = item.link.as_ref().and_then(|l| l.target.as_deref());
        [venue_slug, target]
            .into_iter()
            .flatten()
            .any(|candidate| candidate.trim().eq_ignore_ascii_case(slug))
    })
}
