use crate::ArcStr;
use chrono::NaiveDateTime;
use qu::ick_use::*;
use serde::{de, Deserialize, Deserializer, Serializer};
use std::{fs, io, path::Path};

/// Timestamp format used throughout the ED extract.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Converts a not found error to Ok(false)
pub fn path_exists(path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

// Helpers for serde to parse fields with quirks.

/// Markers the extract (or an earlier dataframe round-trip) uses for a missing value.
fn is_null_marker(s: &str) -> bool {
    s.is_empty()
        || s.eq_ignore_ascii_case("null")
        || s.eq_ignore_ascii_case("nan")
        || s.eq_ignore_ascii_case("none")
}

/// Parse a string, but map "null", "nan" and "none" to `None` (in addition to the default
/// "" -> None mapping)
pub fn optional_string<'de, D>(d: D) -> Result<Option<ArcStr>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    let s = s.trim();
    if is_null_marker(s) {
        Ok(None)
    } else {
        Ok(Some(s.into()))
    }
}

/// Best-effort number parsing: anything that isn't a finite number becomes `None`.
pub fn optional_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    Ok(parse_f64(&s))
}

pub(crate) fn parse_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    if is_null_marker(s) {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an identifier. Identifiers sometimes come through as `12345.0` after passing through a
/// float column, so accept that too.
///
/// Anything else (including a fractional part) is coerced to `None`, so one bad row can't fail
/// the load. The loaders report how many rows ended up without an ID.
pub fn optional_id<'de, D>(d: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    Ok(parse_id(&s))
}

pub(crate) fn parse_id(s: &str) -> Option<u64> {
    let s = s.trim();
    if is_null_marker(s) {
        return None;
    }
    if let Ok(id) = s.parse::<u64>() {
        return Some(id);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0. && v == v.floor() => Some(v as u64),
        _ => {
            event!(Level::DEBUG, "invalid identifier \"{}\" read as missing", s);
            None
        }
    }
}

/// Parse a timestamp in the `%Y-%m-%d %H:%M:%S` format.
///
/// Malformed timestamps are coerced to `None` rather than failing the whole load.
pub fn optional_timestamp<'de, D>(d: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    Ok(parse_timestamp(&s))
}

pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()
}

/// Render a number the way the model has always seen them: shortest round-trip form, always
/// with a fractional part (`38.0`, not `38`).
pub fn format_number(v: f64) -> String {
    format!("{:?}", v)
}

/// Write a numeric vector into a single CSV cell as a JSON array.
pub fn json_vector<S, const N: usize>(v: &[f64; N], s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    use serde::ser::Error;
    let json = serde_json::to_string(&v[..]).map_err(S::Error::custom)?;
    s.serialize_str(&json)
}

/// Read a numeric vector back out of a CSV cell written by `json_vector`.
pub fn from_json_vector<'de, D, const N: usize>(d: D) -> Result<[f64; N], D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    let v: Vec<f64> = serde_json::from_str(&s).map_err(de::Error::custom)?;
    let len = v.len();
    v.try_into()
        .map_err(|_| de::Error::custom(format!("expected {} values, found {}", N, len)))
}

pub fn header(header: &str) {
    let len = header.len();
    print!("\n{}\n", header);
    for _ in 0..len {
        print!("=");
    }
    println!("\n")
}

/// Percentage of `count` in `total`, 0 when `total` is 0.
pub fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.
    } else {
        count as f64 / total as f64 * 100.
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_markers() {
        assert_eq!(parse_f64("nan"), None);
        assert_eq!(parse_f64("NULL"), None);
        assert_eq!(parse_f64(""), None);
        assert_eq!(parse_f64("inf"), None);
        assert_eq!(parse_f64("unable"), None);
        assert_eq!(parse_f64(" 98.6 "), Some(98.6));
    }

    #[test]
    fn ids_coerce() {
        assert_eq!(parse_id("123"), Some(123));
        assert_eq!(parse_id(" 123.0 "), Some(123));
        assert_eq!(parse_id(""), None);
        assert_eq!(parse_id("nan"), None);
        assert_eq!(parse_id("12.5"), None);
        assert_eq!(parse_id("-3"), None);
        assert_eq!(parse_id("abc"), None);
    }

    #[test]
    fn timestamps_coerce() {
        assert!(parse_timestamp("2180-07-23 05:54:00").is_some());
        assert!(parse_timestamp("2180-07-23").is_none());
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn numbers_keep_fraction() {
        assert_eq!(format_number(38.), "38.0");
        assert_eq!(format_number(36.5), "36.5");
        assert_eq!(format_number(2.35), "2.35");
    }
}
