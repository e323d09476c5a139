//! Stop arrival data models
//!
//! Normalised representations of what getStopInfo reports for a stop: the
//! server clock and one entry per route serving the stop.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Arrival information for one stop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StopInfo {
    /// Stop identifier as echoed by the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_id: Option<String>,
    /// Stop display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_name: Option<String>,
    /// Server clock at the time of the response, in the server's offset
    pub current_time: DateTime<FixedOffset>,
    /// Routes serving the stop
    pub transport: Vec<TransportEntry>,
}

impl StopInfo {
    /// `now` expressed in the server's UTC offset
    #[must_use]
    pub fn local_now(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(self.current_time.offset())
    }
}

/// A route serving the stop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportEntry {
    /// Route display name (e.g. "12", "Т25")
    pub name: String,
    /// Raw type tag (e.g. "bus", "tramway")
    pub kind: String,
    /// Route variants, each with its own schedule
    pub threads: Vec<Thread>,
}

impl TransportEntry {
    /// Transport mode derived from the raw type tag
    #[must_use]
    pub fn mode(&self) -> TransportMode {
        TransportMode::from_type(&self.kind)
    }

    /// Next arrival according to the first thread that yields one
    ///
    /// See [`BriefSchedule::select_arrival`] for the heuristic.
    #[must_use]
    pub fn next_arrival(&self, now: DateTime<FixedOffset>) -> Option<DateTime<Utc>> {
        self.threads
            .iter()
            .find_map(|thread| thread.brief_schedule.select_arrival(now))
    }
}

/// One route variant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Thread {
    /// Thread identifier, absent in the legacy schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Upcoming arrivals for this variant
    pub brief_schedule: BriefSchedule,
}

/// Per-variant arrival prediction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BriefSchedule {
    /// Discrete upcoming arrivals, soonest first
    Events(Vec<ScheduledEvent>),
    /// Route runs on an interval inside a validity window
    Frequency(Frequency),
    /// Legacy single local departure time
    DepartureTime(NaiveTime),
    /// Server sent nothing usable
    Unavailable,
}

impl BriefSchedule {
    /// Pick the time the next vehicle is expected
    ///
    /// This is a heuristic, not a guarantee:
    /// - discrete events: the first event's scheduled time, or its estimated
    ///   time if no schedule is known;
    /// - frequency: the window begin if `now` is past the window end,
    ///   otherwise `now` plus one interval;
    /// - legacy departure time: that clock time today in `now`'s offset.
    ///
    /// A pick that is already in the past is moved 24 hours forward, on the
    /// assumption that it refers to the same clock time tomorrow. Intervals or
    /// times outside chrono's range yield `None`.
    #[must_use]
    pub fn select_arrival(&self, now: DateTime<FixedOffset>) -> Option<DateTime<Utc>> {
        let now_utc = now.with_timezone(&Utc);

        let pick = match self {
            Self::Events(events) => {
                let first = events.first()?;
                first.scheduled.or(first.estimated)?
            },
            Self::Frequency(freq) => {
                if freq.end.is_some_and(|end| now_utc > end) {
                    freq.begin?
                } else {
                    now_utc.checked_add_signed(TimeDelta::try_seconds(freq.interval_secs)?)?
                }
            },
            Self::DepartureTime(clock) => now
                .date_naive()
                .and_time(*clock)
                .and_local_timezone(*now.offset())
                .single()?
                .with_timezone(&Utc),
            Self::Unavailable => return None,
        };

        if pick < now_utc {
            pick.checked_add_signed(TimeDelta::hours(24))
        } else {
            Some(pick)
        }
    }
}

/// One predicted arrival
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledEvent {
    /// Timetable arrival
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<DateTime<Utc>>,
    /// Live estimate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated: Option<DateTime<Utc>>,
}

/// Interval service descriptor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Frequency {
    /// Seconds between vehicles
    pub interval_secs: i64,
    /// Window start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin: Option<DateTime<Utc>>,
    /// Window end
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

/// Transport mode classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Bus
    Bus,
    /// Trolleybus
    Trolleybus,
    /// Tram
    Tram,
    /// Fixed-route minibus (marshrutka)
    Minibus,
    /// Metro
    Underground,
    /// Suburban rail
    Suburban,
    /// River transport
    Water,
    /// Unknown type tag
    Unknown,
}

impl TransportMode {
    /// Map a getStopInfo type tag to a transport mode
    #[must_use]
    pub fn from_type(kind: &str) -> Self {
        match kind {
            "bus" => Self::Bus,
            "trolleybus" => Self::Trolleybus,
            "tramway" | "tram" => Self::Tram,
            "minibus" => Self::Minibus,
            "underground" | "metro" => Self::Underground,
            "suburban" | "railway" => Self::Suburban,
            "water" => Self::Water,
            _ => Self::Unknown,
        }
    }

    /// Emoji representation
    #[must_use]
    pub const fn emoji(&self) -> &'static str {
        match self {
            Self::Bus | Self::Minibus => "🚌",
            Self::Trolleybus => "🚎",
            Self::Tram => "🚊",
            Self::Underground => "🚇",
            Self::Suburban => "🚆",
            Self::Water => "⛴️",
            Self::Unknown => "🚋",
        }
    }

    /// Human-readable label
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Bus => "Bus",
            Self::Trolleybus => "Trolleybus",
            Self::Tram => "Tram",
            Self::Minibus => "Minibus",
            Self::Underground => "Metro",
            Self::Suburban => "Suburban",
            Self::Water => "Ferry",
            Self::Unknown => "Transit",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
