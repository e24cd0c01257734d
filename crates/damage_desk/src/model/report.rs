//! Damage report record and its display helpers.

use serde::{Deserialize, Deserializer, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Rendered in place of a date that cannot be parsed.
pub const INVALID_DATE: &str = "Invalid Date";

/// Report timestamp as the backend sends it: an ISO-8601 string or epoch milliseconds.
/// Anything else (`null`, fractional numbers, objects) is kept verbatim in
/// `Other` so one odd record does not fail the whole list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportDate {
    Millis(i64),
    Text(String),
    Other(serde_json::Value),
}

impl Default for ReportDate {
    fn default() -> Self {
        ReportDate::Text(String::new())
    }
}

impl ReportDate {
    /// Interpret as a UTC instant. Strings without an offset are taken as UTC.
    pub fn to_utc(&self) -> Option<OffsetDateTime> {
        match self {
            ReportDate::Millis(ms) => {
                OffsetDateTime::from_unix_timestamp_nanos(i128::from(*ms) * 1_000_000).ok()
            }
            ReportDate::Text(s) => parse_date_text(s),
            ReportDate::Other(_) => None,
        }
    }

    /// `M/D/YYYY`, or [`INVALID_DATE`].
    pub fn formatted(&self) -> String {
        match self.to_utc() {
            Some(dt) => format!("{}/{}/{}", u8::from(dt.month()), dt.day(), dt.year()),
            None => INVALID_DATE.to_string(),
        }
    }
}

fn parse_date_text(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(dt.to_offset(UtcOffset::UTC));
    }
    if let Ok(d) = Date::parse(s, format_description!("[year]-[month]-[day]")) {
        return Some(d.midnight().assume_utc());
    }
    let naive = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if let Ok(dt) = PrimitiveDateTime::parse(s, naive) {
        return Some(dt.assume_utc());
    }
    let naive_frac =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    PrimitiveDateTime::parse(s, naive_frac)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// `null` reads as an empty string.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One crowd-sourced damage report. Fields the console does not know about are
/// kept in `extra` so the report can be echoed back to the backend unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "_id", default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub summary: String,
    /// pending / accepted / rejected by convention; not validated here.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub status: String,
    #[serde(default)]
    pub date: ReportDate,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Report {
    pub fn formatted_date(&self) -> String {
        self.date.formatted()
    }

    /// Absolute image URL: `http*` values as-is, anything else relative to `base_url`.
    pub fn resolved_image_url(&self, base_url: &str) -> Option<String> {
        let raw = self.image_url.as_deref()?;
        if raw.starts_with("http") {
            Some(raw.to_string())
        } else {
            Some(format!("{}/{}", base_url.trim_end_matches('/'), raw))
        }
    }
}
