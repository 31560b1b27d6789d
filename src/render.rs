//! Output formatting for command results and errors.

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use wolt_types::{FeedItem, Restaurant, find_upstream};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    #[default]
    Table,
    Json,
}

/// Renders any serializable value: pretty JSON, or `key  value` rows.
pub fn render<T: Serialize + ?Sized>(format: Format, value: &T) -> serde_json::Result<String> {
    let value = serde_json::to_value(value)?;
    match format {
        Format::Json => serde_json::to_string_pretty(&value),
        Format::Table => {
            let mut rows = Vec::new();
            flatten(&value, String::new(), &mut rows);
            Ok(table(&rows))
        }
    }
}

/// One row per feed item: slug, name, availability and delivery estimate.
pub fn render_items(format: Format, items: &[FeedItem]) -> serde_json::Result<String> {
    if format == Format::Json {
        return serde_json::to_string_pretty(items);
    }
    let rows: Vec<(String, String)> = items
        .iter()
        .filter_map(|item| {
            let venue = item.venue.as_ref()?;
            let slug = venue.slug.clone().unwrap_or_default();
            let name = venue.name.clone().or_else(|| item.title.clone()).unwrap_or_default();
            let mut detail = name;
            if venue.online == Some(false) {
                detail.push_str("  (offline)");
            }
            if let Some(minutes) = venue.estimate {
                detail.push_str(&format!("  ~{minutes} min"));
            }
            if let Some(score) = venue.rating.as_ref().and_then(|r| r.score) {
                detail.push_str(&format!("  {score:.1}"));
            }
            Some((slug, detail))
        })
        .collect();
    Ok(table(&rows))
}

pub fn render_restaurant(format: Format, restaurant: &Restaurant, lang: &str) -> serde_json::Result<String> {
    if format == Format::Json {
        return serde_json::to_string_pretty(restaurant);
    }
    let mut rows = vec![
        ("slug".to_string(), restaurant.slug.clone()),
        (
            "name".to_string(),
            restaurant.display_name(lang).unwrap_or_default().to_string(),
        ),
    ];
    let optional = [
        ("description", restaurant.display_description(lang).map(str::to_string)),
        ("address", restaurant.address.clone()),
        ("city", restaurant.city.clone()),
        ("currency", restaurant.currency.clone()),
        ("online", restaurant.online.map(|o| o.to_string())),
        ("url", restaurant.public_url.clone()),
    ];
    rows.extend(
        optional
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v))),
    );
    Ok(table(&rows))
}

/// Human-readable error line. Upstream 4xx statuses get a short explanation;
/// `verbose` appends the request URL and body preview.
pub fn describe_error(err: &anyhow::Error, verbose: bool) -> String {
    let Some(up) = err.chain().find_map(find_upstream) else {
        return format!("error: {err:#}");
    };
    let mut out = match up.status() {
        Some(404) => "error: not found".to_string(),
        Some(410) => "error: gone (no longer available)".to_string(),
        Some(401 | 403) => {
            "error: not authorized; run `wolt auth set --token ...` or `wolt auth refresh`".to_string()
        }
        Some(status) => format!("error: upstream returned HTTP {status}"),
        None => match &up.cause {
            Some(cause) => format!("error: request failed: {cause}"),
            None => "error: request failed".to_string(),
        },
    };
    if verbose {
        out.push_str(&format!("\n  {} {}", up.method, up.url));
        let preview = up.body_preview();
        if !preview.is_empty() {
            out.push_str(&format!("\n  body: {preview}"));
        }
    }
    out
}

fn flatten(value: &Value, prefix: String, rows: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten(v, key, rows);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten(v, format!("{prefix}[{i}]"), rows);
            }
        }
        Value::Null => {}
        Value::String(s) => rows.push((prefix, s.clone())),
        other => rows.push((prefix, other.to_string())),
    }
}

fn table(rows: &[(String, String)]) -> String {
    let width = rows.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    rows.iter()
        .map(|(k, v)| format!("{k:<width$}  {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}
