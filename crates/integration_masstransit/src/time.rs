//! Decoders for the two upstream time encodings
//!
//! Event and frequency times arrive as `{"value": "1580558400"}` objects
//! wrapping Unix seconds in a string. The server clock arrives as a
//! JavaScript `Date.toString()` rendering such as
//! `Sat Feb 01 2020 12:30:00 GMT+0300 (Moscow Standard Time)`, whose
//! parenthesised zone name no timestamp parser recognises. Known zone names
//! are rewritten to their abbreviation before the fixed layout is parsed.

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};

use crate::error::MasstransitError;

/// Layout of the text timestamp once the zone suffix is split off
const TEXT_TIME_LAYOUT: &str = "%a %b %d %Y %H:%M:%S GMT%z";

/// Zone names the server emits, mapped to recognised abbreviations
const ZONE_SUBSTITUTIONS: &[(&str, &str)] = &[("Moscow Standard Time", "MSK")];

/// Abbreviations accepted in the parenthesised suffix
const RECOGNISED_ZONES: &[&str] = &["MSK"];

/// Parse a decimal Unix-seconds string
///
/// # Errors
///
/// Returns [`MasstransitError::MalformedTime`] if the value is not a signed
/// 64-bit integer or lies outside the representable range.
pub fn parse_unix_seconds(value: &str) -> Result<DateTime<Utc>, MasstransitError> {
    let secs: i64 = value
        .parse()
        .map_err(|e| MasstransitError::MalformedTime(format!("{value:?} is not unix seconds: {e}")))?;

    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| MasstransitError::MalformedTime(format!("{secs} is out of range")))
}

/// Replace known verbose zone names with their abbreviation
fn substitute_zone_name(raw: &str) -> String {
    ZONE_SUBSTITUTIONS
        .iter()
        .fold(raw.to_string(), |acc, (name, abbr)| acc.replacen(name, abbr, 1))
}

/// Parse a `Date.toString()`-style server timestamp
///
/// The offset embedded after `GMT` is authoritative; the parenthesised zone
/// only has to be one we know.
///
/// # Errors
///
/// Returns [`MasstransitError::MalformedTime`] on an unknown zone or a layout
/// mismatch.
pub fn parse_text_time(raw: &str) -> Result<DateTime<FixedOffset>, MasstransitError> {
    let normalized = substitute_zone_name(raw.trim());

    let (stamp, zone) = normalized
        .strip_suffix(')')
        .and_then(|s| s.rsplit_once(" ("))
        .ok_or_else(|| MasstransitError::MalformedTime(format!("{raw:?} has no zone suffix")))?;

    if !RECOGNISED_ZONES.contains(&zone) {
        return Err(MasstransitError::MalformedTime(format!(
            "unrecognised zone {zone:?} in {raw:?}"
        )));
    }

    DateTime::parse_from_str(stamp, TEXT_TIME_LAYOUT)
        .map_err(|e| MasstransitError::MalformedTime(format!("{raw:?}: {e}")))
}

/// Parse a legacy `"HH:MM"` departure time
///
/// # Errors
///
/// Returns [`MasstransitError::MalformedTime`] if the value is not `HH:MM`.
pub fn parse_clock_time(value: &str) -> Result<NaiveTime, MasstransitError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| MasstransitError::MalformedTime(format!("{value:?} is not HH:MM: {e}")))
}
