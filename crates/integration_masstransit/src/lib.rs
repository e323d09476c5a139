//! Stop arrival predictions from the Yandex Maps masstransit API
//!
//! Talks to the undocumented `getStopInfo` endpoint that backs the stop
//! popups on Yandex Maps. The endpoint requires an anti-forgery token that
//! it hands out itself and expires at will, so a session:
//!
//! 1. bootstraps a token (unless one is supplied) and keeps its cookies,
//! 2. fetches a stop with `mode=prognosis` for live estimates,
//! 3. retries with the renewed token when the server says it expired, or
//!    when it has no live data (HTTP 404), asking for schedule data only,
//!
//! issuing at most [`MAX_ATTEMPTS`] requests per fetch.
//!
//! # Example
//!
//! ```rust,ignore
//! use integration_masstransit::{MasstransitClient, MasstransitConfig, StopInfoClient};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = MasstransitClient::connect(&MasstransitConfig::default()).await?;
//! let info = client
//!     .fetch_stop_info("stop__9640740", true, &CancellationToken::new())
//!     .await?;
//!
//! let now = info.local_now(chrono::Utc::now());
//! for entry in &info.transport {
//!     println!("{} {:?}", entry.name, entry.next_arrival(now));
//! }
//! ```

mod client;
mod config;
mod error;
mod models;
mod response;
mod sink;
mod time;

pub use client::{MAX_ATTEMPTS, MasstransitClient, StopInfoClient};
pub use config::{DEFAULT_HOST, MasstransitConfig};
pub use error::MasstransitError;
pub use models::{
    BriefSchedule, Frequency, ScheduledEvent, StopInfo, Thread, TransportEntry, TransportMode,
};
pub use response::{StopInfoResponse, decode_stop_info, decode_token};
pub use sink::{NoopSink, TraceSink, TracingSink};
pub use time::{parse_clock_time, parse_text_time, parse_unix_seconds};
