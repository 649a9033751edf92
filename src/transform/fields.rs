//! Field normalizers. Each one is total: malformed input gives `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::product::{Gender, Size};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// `"$1,234.50"` → USD amount times `exchange_rate`.
pub fn price(text: Option<&str>, exchange_rate: f64) -> Option<f64> {
    let cleaned = text?.replace(['$', ','], "");
    let usd = cleaned.trim().parse::<f64>().ok()?;
    Some(usd * exchange_rate).filter(|v| v.is_finite())
}

/// `"Rating: ⭐ 4.8 / 5"` or `"4.8/5 ⭐"` → 4.8.
pub fn rating(text: Option<&str>) -> Option<f64> {
    let text = text?;
    if text.contains("Invalid") || text.contains("Not Rated") {
        return None;
    }
    let cleaned = text.replace('⭐', "").replace("Rating:", "");
    cleaned
        .split('/')
        .next()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// `"3 Colors"` → 3.
pub fn colors(text: Option<&str>) -> Option<i32> {
    let token = text?.split_whitespace().next()?;
    if !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    token.parse::<i32>().ok()
}

pub fn size(text: Option<&str>) -> Option<Size> {
    text?.replace("Size:", "").trim().parse().ok()
}

pub fn gender(text: Option<&str>) -> Option<Gender> {
    text?.replace("Gender:", "").trim().parse().ok()
}

/// Any common datetime spelling → `YYYY-MM-DD HH:MM:SS`. Offsets are dropped,
/// keeping the wall-clock time as written.
pub fn timestamp(text: Option<&str>) -> Option<String> {
    parse_datetime(text?.trim()).map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
