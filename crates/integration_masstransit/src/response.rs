//! getStopInfo response decoding
//!
//! The endpoint answers every request with the same envelope and signals
//! what happened by which fields are populated:
//!
//! ```json
//! { "csrfToken": "..." }                       // token expired, retry
//! { "error": { "code": 1, "message": "..." } } // service error
//! { "data": { "properties": { ... } } }        // arrivals
//! ```
//!
//! A renewal may arrive alongside a stale `data` block, so the envelope is
//! decoded loosely first and [`decode_stop_info`] decides the shape before
//! anything inside `data` is interpreted.

use serde::Deserialize;

use crate::error::MasstransitError;
use crate::models::{BriefSchedule, Frequency, ScheduledEvent, StopInfo, Thread, TransportEntry};
use crate::time::{parse_clock_time, parse_text_time, parse_unix_seconds};

/// One decoded getStopInfo response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopInfoResponse {
    /// Token expired; carries the replacement
    TokenRenewal(String),
    /// Service-reported failure
    Error {
        /// Service error code
        code: i64,
        /// Service error message
        message: String,
    },
    /// Arrival data
    Data(StopInfo),
}

impl StopInfoResponse {
    /// Short name of the shape, for logging
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::TokenRenewal(_) => "token_renewal",
            Self::Error { .. } => "error",
            Self::Data(_) => "data",
        }
    }
}

/// Decode a getStopInfo body into exactly one shape
///
/// Precedence is token renewal, then error, then data.
///
/// # Errors
///
/// [`MasstransitError::MalformedResponse`] if the body is not JSON or fits no
/// shape, [`MasstransitError::MalformedTime`] if a data-shape timestamp does
/// not parse.
pub fn decode_stop_info(body: &[u8]) -> Result<StopInfoResponse, MasstransitError> {
    let envelope: RawEnvelope = serde_json::from_slice(body)
        .map_err(|e| MasstransitError::MalformedResponse(format!("envelope: {e}")))?;

    if let Some(token) = envelope.csrf_token.filter(|t| !t.is_empty()) {
        return Ok(StopInfoResponse::TokenRenewal(token));
    }

    if let Some(error) = envelope.error {
        let error: RawError = serde_json::from_value(error)
            .map_err(|e| MasstransitError::MalformedResponse(format!("error object: {e}")))?;
        return Ok(StopInfoResponse::Error {
            code: error.code,
            message: error.message,
        });
    }

    let data = envelope.data.ok_or_else(|| {
        MasstransitError::MalformedResponse("no csrfToken, error or data".to_string())
    })?;

    let data: RawData = serde_json::from_value(data)
        .map_err(|e| MasstransitError::MalformedResponse(format!("data: {e}")))?;

    convert_data(data).map(StopInfoResponse::Data)
}

/// Decode the token refresh body, returning the token as sent
///
/// # Errors
///
/// [`MasstransitError::MalformedResponse`] if the body is not a JSON object.
pub fn decode_token(body: &[u8]) -> Result<String, MasstransitError> {
    let response: RawTokenResponse = serde_json::from_slice(body)
        .map_err(|e| MasstransitError::MalformedResponse(format!("token response: {e}")))?;
    Ok(response.csrf_token.unwrap_or_default())
}

fn convert_data(raw: RawData) -> Result<StopInfo, MasstransitError> {
    let properties = raw.properties;
    let current_time = parse_text_time(&properties.current_time)?;

    let transport = properties
        .stop_meta_data
        .transport
        .into_iter()
        .map(convert_transport)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StopInfo {
        stop_id: properties.stop_meta_data.id,
        stop_name: properties.stop_meta_data.name,
        current_time,
        transport,
    })
}

fn convert_transport(raw: RawTransport) -> Result<TransportEntry, MasstransitError> {
    let mut threads = raw
        .threads
        .into_iter()
        .map(|thread| {
            Ok(Thread {
                id: thread.id,
                brief_schedule: convert_brief(thread.brief_schedule)?,
            })
        })
        .collect::<Result<Vec<_>, MasstransitError>>()?;

    // Legacy schema: schedule hangs directly off the transport entry
    if threads.is_empty() && raw.brief_schedule.is_some() {
        threads.push(Thread {
            id: None,
            brief_schedule: convert_brief(raw.brief_schedule)?,
        });
    }

    Ok(TransportEntry {
        name: raw.name,
        kind: raw.kind,
        threads,
    })
}

fn convert_brief(raw: Option<RawBrief>) -> Result<BriefSchedule, MasstransitError> {
    let Some(raw) = raw else {
        return Ok(BriefSchedule::Unavailable);
    };

    if !raw.events.is_empty() {
        let events = raw
            .events
            .into_iter()
            .map(|event| {
                Ok(ScheduledEvent {
                    scheduled: convert_time(event.scheduled)?,
                    estimated: convert_time(event.estimated)?,
                })
            })
            .collect::<Result<Vec<_>, MasstransitError>>()?;
        return Ok(BriefSchedule::Events(events));
    }

    if let Some(freq) = raw.frequency {
        return Ok(BriefSchedule::Frequency(Frequency {
            interval_secs: freq.value,
            begin: convert_time(freq.begin)?,
            end: convert_time(freq.end)?,
        }));
    }

    match raw.departure_time {
        Some(clock) => Ok(BriefSchedule::DepartureTime(parse_clock_time(&clock)?)),
        None => Ok(BriefSchedule::Unavailable),
    }
}

fn convert_time(
    raw: Option<RawTime>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, MasstransitError> {
    raw.map(|t| parse_unix_seconds(&t.value)).transpose()
}

// --- Raw API response types for deserialization ---

#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    #[serde(rename = "csrfToken")]
    csrf_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "csrfToken")]
    csrf_token: Option<String>,
    error: Option<serde_json::Value>,
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawData {
    properties: RawProperties,
}

#[derive(Debug, Deserialize)]
struct RawProperties {
    #[serde(rename = "currentTime")]
    current_time: String,
    #[serde(rename = "StopMetaData")]
    stop_meta_data: RawStopMetaData,
}

#[derive(Debug, Deserialize)]
struct RawStopMetaData {
    id: Option<String>,
    name: Option<String>,
    #[serde(rename = "Transport", default)]
    transport: Vec<RawTransport>,
}

#[derive(Debug, Deserialize)]
struct RawTransport {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(alias = "Threads", default)]
    threads: Vec<RawThread>,
    #[serde(rename = "BriefSchedule")]
    brief_schedule: Option<RawBrief>,
}

#[derive(Debug, Deserialize)]
struct RawThread {
    id: Option<String>,
    #[serde(rename = "BriefSchedule")]
    brief_schedule: Option<RawBrief>,
}

#[derive(Debug, Deserialize)]
struct RawBrief {
    #[serde(rename = "departureTime")]
    departure_time: Option<String>,
    #[serde(rename = "Events", default)]
    events: Vec<RawEvent>,
    #[serde(rename = "Frequency")]
    frequency: Option<RawFrequency>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    scheduled: Option<RawTime>,
    estimated: Option<RawTime>,
}

#[derive(Debug, Deserialize)]
struct RawFrequency {
    #[serde(default)]
    value: i64,
    begin: Option<RawTime>,
    end: Option<RawTime>,
}

#[derive(Debug, Deserialize)]
struct RawTime {
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveTime};

    const CURRENT_TIME: &str = "Sat Feb 01 2020 12:30:00 GMT+0300 (Moscow Standard Time)";

    fn data_block(transport: &str) -> String {
        format!(
            r#"{{
                "properties": {{
                    "currentTime": "{CURRENT_TIME}",
                    "StopMetaData": {{
                        "id": "stop__9640740",
                        "name": "Площадь Революции",
                        "Transport": {transport}
                    }}
                }}
            }}"#
        )
    }

    fn data_json(transport: &str) -> String {
        format!(r#"{{ "data": {} }}"#, data_block(transport))
    }

    #[test]
    fn test_decode_events() {
        let body = data_json(
            r#"[{
                "name": "12",
                "type": "bus",
                "threads": [{
                    "id": "2036925416",
                    "BriefSchedule": {
                        "Events": [
                            { "scheduled": { "value": "1580549700" }, "estimated": { "value": "1580549760" } },
                            { "estimated": { "value": "1580550300" } }
                        ]
                    }
                }]
            }]"#,
        );

        let StopInfoResponse::Data(info) = decode_stop_info(body.as_bytes()).unwrap() else {
            panic!("expected data shape");
        };

        assert_eq!(info.stop_id.as_deref(), Some("stop__9640740"));
        assert_eq!(info.stop_name.as_deref(), Some("Площадь Революции"));
        assert_eq!(info.current_time.timestamp(), 1_580_549_400);
        assert_eq!(info.transport.len(), 1);

        let entry = &info.transport[0];
        assert_eq!(entry.name, "12");
        assert_eq!(entry.kind, "bus");
        assert_eq!(entry.threads[0].id.as_deref(), Some("2036925416"));

        let BriefSchedule::Events(events) = &entry.threads[0].brief_schedule else {
            panic!("expected events");
        };
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].scheduled,
            DateTime::from_timestamp(1_580_549_700, 0)
        );
        assert_eq!(
            events[0].estimated,
            DateTime::from_timestamp(1_580_549_760, 0)
        );
        assert!(events[1].scheduled.is_none());
    }

    #[test]
    fn test_decode_frequency() {
        let body = data_json(
            r#"[{
                "name": "Т25",
                "type": "trolleybus",
                "threads": [{
                    "BriefSchedule": {
                        "Events": [],
                        "Frequency": {
                            "text": "10 min",
                            "value": 600,
                            "begin": { "value": "1580526000", "tzOffset": 10800, "text": "6:00" },
                            "end": { "value": "1580590800", "tzOffset": 10800, "text": "0:00" }
                        }
                    }
                }]
            }]"#,
        );

        let StopInfoResponse::Data(info) = decode_stop_info(body.as_bytes()).unwrap() else {
            panic!("expected data shape");
        };
        assert_eq!(
            info.transport[0].threads[0].brief_schedule,
            BriefSchedule::Frequency(Frequency {
                interval_secs: 600,
                begin: DateTime::from_timestamp(1_580_526_000, 0),
                end: DateTime::from_timestamp(1_580_590_800, 0),
            })
        );
    }

    #[test]
    fn test_decode_huge_frequency_has_no_arrival() {
        let body = data_json(
            r#"[{
                "name": "Т25",
                "type": "trolleybus",
                "threads": [{ "BriefSchedule": { "Frequency": { "value": 9223372036854775807 } } }]
            }]"#,
        );

        let StopInfoResponse::Data(info) = decode_stop_info(body.as_bytes()).unwrap() else {
            panic!("expected data shape");
        };
        let now = info.current_time;
        assert_eq!(info.transport[0].next_arrival(now), None);
    }

    #[test]
    fn test_decode_legacy_departure_time() {
        let body = data_json(
            r#"[{
                "name": "5",
                "type": "tramway",
                "BriefSchedule": { "departureTime": "07:45" }
            }]"#,
        );

        let StopInfoResponse::Data(info) = decode_stop_info(body.as_bytes()).unwrap() else {
            panic!("expected data shape");
        };
        let entry = &info.transport[0];
        assert_eq!(entry.threads.len(), 1);
        assert!(entry.threads[0].id.is_none());
        assert_eq!(
            entry.threads[0].brief_schedule,
            BriefSchedule::DepartureTime(NaiveTime::from_hms_opt(7, 45, 0).unwrap())
        );
    }

    #[test]
    fn test_decode_missing_brief_is_unavailable() {
        let body = data_json(r#"[{ "name": "7", "type": "bus", "threads": [{ "id": "x" }] }]"#);
        let StopInfoResponse::Data(info) = decode_stop_info(body.as_bytes()).unwrap() else {
            panic!("expected data shape");
        };
        assert_eq!(
            info.transport[0].threads[0].brief_schedule,
            BriefSchedule::Unavailable
        );
    }

    #[test]
    fn test_token_takes_precedence_over_data() {
        let body = format!(
            r#"{{ "csrfToken": "fresh-token", "data": {} }}"#,
            data_block(r#"[{ "name": "12", "type": "bus", "threads": [] }]"#)
        );

        assert_eq!(
            decode_stop_info(body.as_bytes()).unwrap(),
            StopInfoResponse::TokenRenewal("fresh-token".to_string())
        );
    }

    #[test]
    fn test_token_takes_precedence_over_stale_garbage() {
        let body = r#"{
            "csrfToken": "fresh-token",
            "error": "not an object",
            "data": { "properties": { "currentTime": "yesterday" } }
        }"#;

        assert_eq!(
            decode_stop_info(body.as_bytes()).unwrap(),
            StopInfoResponse::TokenRenewal("fresh-token".to_string())
        );
    }

    #[test]
    fn test_error_takes_precedence_over_data() {
        let body = r#"{
            "csrfToken": "",
            "error": { "code": 400, "message": "Invalid stop id" },
            "data": { "properties": {} }
        }"#;

        let response = decode_stop_info(body.as_bytes()).unwrap();
        assert_eq!(response.shape(), "error");
        assert_eq!(
            response,
            StopInfoResponse::Error {
                code: 400,
                message: "Invalid stop id".to_string()
            }
        );
    }

    #[test]
    fn test_null_fields_are_absent() {
        let body = data_json("[]").replacen('{', r#"{ "csrfToken": null, "error": null,"#, 1);
        let response = decode_stop_info(body.as_bytes()).unwrap();
        assert_eq!(response.shape(), "data");
    }

    #[test]
    fn test_empty_envelope_is_malformed() {
        let err = decode_stop_info(b"{}").unwrap_err();
        assert!(matches!(err, MasstransitError::MalformedResponse(_)));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = decode_stop_info(b"<html>captcha</html>").unwrap_err();
        assert!(matches!(err, MasstransitError::MalformedResponse(_)));
    }

    #[test]
    fn test_bad_event_time_is_malformed_time() {
        let body = data_json(
            r#"[{
                "name": "12",
                "type": "bus",
                "threads": [{ "BriefSchedule": { "Events": [{ "scheduled": { "value": "soon" } }] } }]
            }]"#,
        );
        let err = decode_stop_info(body.as_bytes()).unwrap_err();
        assert!(matches!(err, MasstransitError::MalformedTime(_)));
    }

    #[test]
    fn test_bad_current_time_is_malformed_time() {
        let body = data_json("[]").replace("Moscow Standard Time", "Pacific Standard Time");
        let err = decode_stop_info(body.as_bytes()).unwrap_err();
        assert!(matches!(err, MasstransitError::MalformedTime(_)));
    }

    #[test]
    fn test_missing_current_time_is_malformed_response() {
        let body = r#"{ "data": { "properties": { "StopMetaData": { "Transport": [] } } } }"#;
        let err = decode_stop_info(body.as_bytes()).unwrap_err();
        assert!(matches!(err, MasstransitError::MalformedResponse(_)));
    }

    #[test]
    fn test_decode_token() {
        assert_eq!(decode_token(br#"{"csrfToken":"abc:123"}"#).unwrap(), "abc:123");
        assert_eq!(decode_token(br#"{"csrfToken":""}"#).unwrap(), "");
        assert_eq!(decode_token(b"{}").unwrap(), "");
        assert!(matches!(
            decode_token(b"nope"),
            Err(MasstransitError::MalformedResponse(_))
        ));
    }
}
