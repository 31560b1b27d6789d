//! Upstream base URLs and geographic coordinates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default consumer API host (assortment, baskets, dynamic venue data).
pub const DEFAULT_CONSUMER_API: &str = "https://consumer-api.wolt.com";

/// Default restaurant API host (discovery pages, venues, orders, user).
pub const DEFAULT_RESTAURANT_API: &str = "https://restaurant-api.wolt.com";

/// Default authentication host (token rotation).
pub const DEFAULT_AUTH_API: &str = "https://authentication.wolt.com";

fn default_consumer_api() -> String {
    DEFAULT_CONSUMER_API.to_string()
}
fn default_restaurant_api() -> String {
    DEFAULT_RESTAURANT_API.to_string()
}
fn default_auth_api() -> String {
    DEFAULT_AUTH_API.to_string()
}

/// Base URL per upstream service. Fixed once a gateway is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(default = "default_consumer_api")]
    pub consumer_api: String,
    #[serde(default = "default_restaurant_api")]
    pub restaurant_api: String,
    #[serde(default = "default_auth_api")]
    pub auth: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            consumer_api: default_consumer_api(),
            restaurant_api: default_restaurant_api(),
            auth: default_auth_api(),
        }
    }
}

impl Endpoints {
    /// Applies `overrides` on top of `self`; blank override fields keep the
    /// current value. Trailing slashes are stripped.
    #[must_use]
    pub fn merged(self, overrides: &Endpoints) -> Self {
        fn pick(current: String, over: &str) -> String {
            let over = over.trim().trim_end_matches('/');
            if over.is_empty() {
                current
            } else {
                over.to_string()
            }
        }
        Self {
            consumer_api: pick(self.consumer_api, &overrides.consumer_api),
            restaurant_api: pick(self.restaurant_api, &overrides.restaurant_api),
            auth: pick(self.auth, &overrides.auth),
        }
    }
}

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Latitude as sent on the wire (six decimals).
    #[must_use]
    pub fn lat_param(&self) -> String {
        format!("{:.6}", self.lat)
    }

    /// Longitude as sent on the wire (six decimals).
    #[must_use]
    pub fn lon_param(&self) -> String {
        format!("{:.6}", self.lon)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat_param(), self.lon_param())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_keeps_defaults() {
        let overrides = Endpoints {
            consumer_api: "http://127.0.0.1:9000/".into(),
            restaurant_api: String::new(),
            auth: "  ".into(),
        };
        let merged = Endpoints::default().merged(&overrides);
        assert_eq!(merged.consumer_api, "http://127.0.0.1:9000");
        assert_eq!(merged.restaurant_api, DEFAULT_RESTAURANT_API);
        assert_eq!(merged.auth, DEFAULT_AUTH_API);
    }

    #[test]
    fn test_deserialize_partial() {
        let e: Endpoints = serde_json::from_str(r#"{"auth":"http://auth.local"}"#).unwrap();
        assert_eq!(e.auth, "http://auth.local");
        assert_eq!(e.consumer_api, DEFAULT_CONSUMER_API);
    }

    #[test]
    fn test_coordinates_fixed_precision() {
        let c = Coordinates::new(60.17, 24.9384);
        assert_eq!(c.lat_param(), "60.170000");
        assert_eq!(c.lon_param(), "24.938400");
        assert_eq!(c.to_string(), "60.170000,24.938400");
    }
}
