//! Typed shapes decoded from discovery and venue payloads.
//!
//! Only the fields the client relies on are modelled; everything else stays in
//! the raw JSON payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One section of the discovery front page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default)]
    pub items: Vec<FeedItem>,
}

/// A tile inside a discovery section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<VenueSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

/// Venue card data embedded in a feed item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueSummary {
    /// Either a plain string or an `{"$oid": "..."}` object.
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i64>,
}

/// Navigation target of a feed item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// A `{lang, value}` pair used for translated venue strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub value: String,
}

/// Venue detail returned by the slug lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    #[serde(alias = "_id", default)]
    pub id: Value,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: Vec<LocalizedText>,
    #[serde(default)]
    pub short_description: Vec<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alive: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl Restaurant {
    /// Name in `lang`, falling back to the first translation.
    #[must_use]
    pub fn display_name(&self, lang: &str) -> Option<&str> {
        pick_localized(&self.name, lang)
    }

    /// Short description in `lang`, falling back to the first translation.
    #[must_use]
    pub fn display_description(&self, lang: &str) -> Option<&str> {
        pick_localized(&self.short_description, lang)
    }
}

fn pick_localized<'a>(texts: &'a [LocalizedText], lang: &str) -> Option<&'a str> {
    texts
        .iter()
        .find(|t| t.lang.eq_ignore_ascii_case(lang))
        .or_else(|| texts.first())
        .map(|t| t.value.as_str())
}
