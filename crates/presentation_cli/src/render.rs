//! Human-readable arrival output

use chrono::{DateTime, Utc};
use integration_masstransit::StopInfo;

/// Render one line per transport entry, preceded by the server clock
pub fn render_stop_info(info: &StopInfo, now: DateTime<Utc>) -> Vec<String> {
    let mut lines = vec![format!("current time is: {}", info.current_time)];

    if let Some(name) = &info.stop_name {
        lines.push(format!("stop: {name}"));
    }

    if info.transport.is_empty() {
        lines.push("no transport found".to_string());
        return lines;
    }

    let local_now = info.local_now(now);
    for entry in &info.transport {
        let emoji = entry.mode().emoji();
        match entry.next_arrival(local_now) {
            Some(at) => {
                let minutes = minutes_until(now, at);
                let clock = at.with_timezone(local_now.offset()).format("%H:%M");
                lines.push(format!(
                    "{emoji} {:>5} will arrive in {minutes:>4} minutes at {clock}",
                    entry.name
                ));
            },
            None => lines.push(format!("{emoji} {:>5} has no arrival information", entry.name)),
        }
    }

    lines
}

/// Whole minutes from `now` to `at`, rounded to nearest
fn minutes_until(now: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    let secs = (at - now).num_seconds();
    (secs + 30).div_euclid(60)
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeDelta, TimeZone};
    use integration_masstransit::{BriefSchedule, Frequency, ScheduledEvent, Thread, TransportEntry};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap()
    }

    fn info(transport: Vec<TransportEntry>) -> StopInfo {
        let msk = FixedOffset::east_opt(3 * 3600).unwrap();
        StopInfo {
            stop_id: Some("stop__1".to_string()),
            stop_name: Some("Lenina".to_string()),
            current_time: now().with_timezone(&msk),
            transport,
        }
    }

    fn entry(name: &str, kind: &str, schedule: BriefSchedule) -> TransportEntry {
        TransportEntry {
            name: name.to_string(),
            kind: kind.to_string(),
            threads: vec![Thread {
                id: None,
                brief_schedule: schedule,
            }],
        }
    }

    #[test]
    fn renders_event_arrival() {
        let schedule = BriefSchedule::Events(vec![ScheduledEvent {
            scheduled: Some(now() + TimeDelta::minutes(7)),
            estimated: None,
        }]);
        let lines = render_stop_info(&info(vec![entry("12", "bus", schedule)]), now());

        assert_eq!(lines[0], "current time is: 2024-05-10 12:00:00 +03:00");
        assert_eq!(lines[1], "stop: Lenina");
        assert_eq!(lines[2], "🚌    12 will arrive in    7 minutes at 12:07");
    }

    #[test]
    fn renders_frequency_arrival() {
        let schedule = BriefSchedule::Frequency(Frequency {
            interval_secs: 900,
            begin: None,
            end: None,
        });
        let lines = render_stop_info(&info(vec![entry("5", "tramway", schedule)]), now());
        assert_eq!(lines[2], "🚊     5 will arrive in   15 minutes at 12:15");
    }

    #[test]
    fn renders_missing_arrival() {
        let lines = render_stop_info(
            &info(vec![entry("7", "bus", BriefSchedule::Unavailable)]),
            now(),
        );
        assert_eq!(lines[2], "🚌     7 has no arrival information");
    }

    #[test]
    fn renders_empty_stop() {
        let lines = render_stop_info(&info(vec![]), now());
        assert_eq!(lines.last().map(String::as_str), Some("no transport found"));
    }

    #[test]
    fn minutes_round_to_nearest() {
        assert_eq!(minutes_until(now(), now() + TimeDelta::seconds(89)), 1);
        assert_eq!(minutes_until(now(), now() + TimeDelta::seconds(90)), 2);
        assert_eq!(minutes_until(now(), now()), 0);
    }
}
