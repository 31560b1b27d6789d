//! One method per upstream endpoint.
//!
//! Each operation fixes the method and URL template, assembles parameters,
//! and hands off to [`Gateway::execute`]. A few apply a purely local
//! transformation to the decoded payload.

use crate::{
    client::{ApiRequest, Gateway},
    context::CallContext,
    feed,
    normalize::{Payload, decode, lookup},
};
use serde::Serialize;
use serde_json::Value;
use wolt_types::{AuthContext, Coordinates, FeedItem, Restaurant, Result, Section, WoltError};

/// Default page size for order history.
pub const DEFAULT_ORDER_LIMIT: u32 = 20;

#[derive(Serialize)]
struct SearchBody<'a> {
    q: &'a str,
    target: Option<&'a str>,
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct ItemIdsBody<'a> {
    item_ids: Vec<&'a str>,
}

/// Rejects blank path parameters before anything is built.
fn segment<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(WoltError::Request(format!("{what} is blank")));
    }
    Ok(value)
}

/// Trims entries and drops blank ones.
fn non_blank<'a>(values: &'a [String]) -> Vec<&'a str> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect()
}

fn with_coordinates(request: ApiRequest, at: Coordinates) -> ApiRequest {
    request.query("lat", at.lat_param()).query("lon", at.lon_param())
}

impl Gateway {
    fn restaurant_url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        Self::endpoint_url(&self.endpoints().restaurant_api, segments)
    }

    fn consumer_url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        Self::endpoint_url(&self.endpoints().consumer_api, segments)
    }

    /// Raw discovery front page for a location.
    ///
    /// # Errors
    ///
    /// Propagates any pipeline error.
    pub async fn front_page(
        &self,
        ctx: &CallContext,
        auth: &AuthContext,
        at: Coordinates,
    ) -> Result<Payload> {
        let url = self.restaurant_url(&["v1", "pages", "front"])?;
        let request = with_coordinates(ApiRequest::get(url), at);
        self.execute(ctx, request, Some(auth)).await
    }

    /// Front page sections as typed values.
    ///
    /// # Errors
    ///
    /// Propagates pipeline errors; [`WoltError::Shape`] if sections are malformed.
    pub async fn sections(
        &self,
        ctx: &CallContext,
        auth: &AuthContext,
        at: Coordinates,
    ) -> Result<Vec<Section>> {
        let payload = self.front_page(ctx, auth, at).await?;
        feed::sections_from(&payload)
    }

    /// Venue items across all front page sections, de-duplicated.
    ///
    /// # Errors
    ///
    /// Same as [`Gateway::sections`].
    pub async fn feed_items(
        &self,
        ctx: &CallContext,
        auth: &AuthContext,
        at: Coordinates,
    ) -> Result<Vec<FeedItem>> {
        let sections = self.sections(ctx, auth, at).await?;
        Ok(feed::aggregate_items(&sections))
    }

    /// Looks up one feed item by venue slug or link target.
    ///
    /// # Errors
    ///
    /// [`WoltError::Shape`] when no item matches.
    pub async fn item_by_slug(
        &self,
        ctx: &CallContext,
        auth: &AuthContext,
        at: Coordinates,
        slug: &str,
    ) -> Result<FeedItem> {
        let slug = segment("item slug", slug)?;
        let items = self.feed_items(ctx, auth, at).await?;
        feed::find_by_slug(&items, slug)
            .cloned()
            .ok_or_else(|| WoltError::Shape(format!("no feed item with slug {slug:?}")))
    }

    /// Free-text search around a location.
    ///
    /// # Errors
    ///
    /// [`WoltError::Request`] for a blank query; otherwise pipeline errors.
    pub async fn search(
        &self,
        ctx: &CallContext,
        auth: &AuthContext,
        at: Coordinates,
        query: &str,
    ) -> Result<Payload> {
        let query = segment("search query", query)?;
        let url = self.restaurant_url(&["v1", "pages", "search"])?;
        let request = ApiRequest::post(url).json(&SearchBody {
            q: query,
            target: None,
            lat: at.lat,
            lon: at.lon,
        })?;
        self.execute(ctx, request, Some(auth)).await
    }

    /// Venue detail by slug; the first entry of `results`.
    ///
    /// # Errors
    ///
    /// [`WoltError::Shape`] when `results` is missing or empty.
    pub async fn restaurant_by_slug(
        &self,
        ctx: &CallContext,
        auth: &AuthContext,
        slug: &str,
    ) -> Result<Restaurant> {
        let slug = segment("venue slug", slug)?;
        let url = self.restaurant_url(&["v3", "venues", "slug", slug])?;
        let payload = self.execute(ctx, ApiRequest::get(url), Some(auth)).await?;
        let first = lookup(&payload, "results")
            .and_then(Value::as_array)
            .and_then(|results| results.first())
            .cloned()
            .ok_or_else(|| WoltError::Shape(format!("venue {slug:?}: empty results")))?;
        decode(first, "venue detail")
    }

    /// Delivery-dependent venue data (opening state, fees, discounts).
    ///
    /// # Errors
    ///
    /// Propagates any pipeline error.
    pub async fn venue_dynamic(
        &self,
        ctx: &CallContext,
        auth: &AuthContext,
        slug: &str,
        at: Coordinates,
    ) -> Result<Payload> {
        let slug = segment("venue slug", slug)?;
        let url = self.consumer_url(&["order-xp", "web", "v1", "venue", "slug", slug, "dynamic", ""])?;
        let request = with_coordinates(ApiRequest::get(url), at)
            .query("selected_delivery_method", "homedelivery");
        self.execute(ctx, request, Some(auth)).await
    }

    /// Static menu (categories and items) of a venue.
    ///
    /// # Errors
    ///
    /// Propagates any pipeline error.
    pub async fn venue_assortment(
        &self,
        ctx: &CallContext,
        auth: &AuthContext,
        slug: &str,
    ) -> Result<Payload> {
        let slug = segment("venue slug", slug)?;
        let url = self.consumer_url(&[
            "consumer-assortment",
            "v1",
            "venues",
            "slug",
            slug,
            "assortment",
        ])?;
        self.execute(ctx, ApiRequest::get(url), Some(auth)).await
    }

    /// Details for specific menu items. Blank ids are dropped.
    ///
    /// # Errors
    ///
    /// [`WoltError::Request`] if no usable id remains; otherwise pipeline errors.
    pub async fn assortment_items(
        &self,
        ctx: &CallContext,
        auth: &AuthContext,
        slug: &str,
        item_ids: &[String],
    ) -> Result<Payload> {
        let slug = segment("venue slug", slug)?;
        let item_ids = non_blank(item_ids);
        if item_ids.is_empty() {
            return Err(WoltError::Request("no item ids given".into()));
        }
        let url = self.consumer_url(&[
            "consumer-assortment",
            "v1",
            "venues",
            "slug",
            slug,
            "assortment",
            "items",
        ])?;
        let request = ApiRequest::post(url).json(&ItemIdsBody { item_ids })?;
        self.execute(ctx, request, Some(auth)).await
    }

    /// Shopping baskets of the signed-in user.
    ///
    /// # Errors
    ///
    /// Propagates any pipeline error.
    pub async fn baskets(&self, ctx: &CallContext, auth: &AuthContext) -> Result<Payload> {
        let url = self.consumer_url(&["order-xp", "web", "v1", "pages", "baskets"])?;
        self.execute(ctx, ApiRequest::get(url), Some(auth)).await
    }

    /// Past orders, newest first. `statuses` are comma-joined; blanks dropped.
    ///
    /// # Errors
    ///
    /// Propagates any pipeline error.
    pub async fn order_history(
        &self,
        ctx: &CallContext,
        auth: &AuthContext,
        limit: u32,
        statuses: &[String],
    ) -> Result<Payload> {
        let url = self.restaurant_url(&["v2", "order_details", ""])?;
        let limit = if limit == 0 { DEFAULT_ORDER_LIMIT } else { limit };
        let mut request = ApiRequest::get(url).query("limit", limit.to_string());
        let statuses = non_blank(statuses);
        if !statuses.is_empty() {
            request = request.query("statuses", statuses.join(","));
        }
        self.execute(ctx, request, Some(auth)).await
    }

    /// One order by purchase id.
    ///
    /// # Errors
    ///
    /// Propagates any pipeline error.
    pub async fn order_details(
        &self,
        ctx: &CallContext,
        auth: &AuthContext,
        purchase_id: &str,
    ) -> Result<Payload> {
        let purchase_id = segment("purchase id", purchase_id)?;
        let url = self.restaurant_url(&["v2", "order_details", "purchase", purchase_id])?;
        self.execute(ctx, ApiRequest::get(url), Some(auth)).await
    }

    /// Profile of the signed-in user.
    ///
    /// # Errors
    ///
    /// Propagates any pipeline error.
    pub async fn user_me(&self, ctx: &CallContext, auth: &AuthContext) -> Result<Payload> {
        let url = self.restaurant_url(&["v1", "user", "me"])?;
        self.execute(ctx, ApiRequest::get(url), Some(auth)).await
    }

    /// Saved delivery addresses.
    ///
    /// # Errors
    ///
    /// Propagates any pipeline error.
    pub async fn delivery_addresses(
        &self,
        ctx: &CallContext,
        auth: &AuthContext,
    ) -> Result<Payload> {
        let url = self.restaurant_url(&["v2", "delivery", "info"])?;
        self.execute(ctx, ApiRequest::get(url), Some(auth)).await
    }

    /// Favourite venues, with delivery data for a location.
    ///
    /// # Errors
    ///
    /// Propagates any pipeline error.
    pub async fn favorite_venues(
        &self,
        ctx: &CallContext,
        auth: &AuthContext,
        at: Coordinates,
    ) -> Result<Payload> {
        let url = self.restaurant_url(&["v3", "venues", "favourites"])?;
        let request = with_coordinates(ApiRequest::get(url), at);
        self.execute(ctx, request, Some(auth)).await
    }
}
