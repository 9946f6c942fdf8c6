use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde_json::Value;

/// Publication date from JSON-LD metadata, looking through `@graph` arrays
/// and top-level lists.
pub fn extract_date_published(document: &Html) -> Option<DateTime<Utc>> {
    let script_selector = Selector::parse("script[type='application/ld+json']").ok()?;
    document
        .select(&script_selector)
        .filter_map(|script| serde_json::from_str::<Value>(script.text().collect::<String>().trim()).ok())
        .find_map(|json| find_date(&json))
}

fn find_date(json: &Value) -> Option<DateTime<Utc>> {
    match json {
        Value::Array(items) => items.iter().find_map(find_date),
        Value::Object(obj) => obj
            .get("datePublished")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .or_else(|| obj.get("@graph").and_then(find_date)),
        _ => None,
    }
}

/// RFC 3339 first, then a bare `YYYY-MM-DD` taken as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}
