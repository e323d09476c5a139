//! getStopInfo session client
//!
//! Owns the anti-forgery token and a cookie-bearing HTTP transport, and runs
//! the token refresh and stop-info fetch protocols against one host.

use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use flate2::read::{GzDecoder, ZlibDecoder};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_ENCODING, SET_COOKIE};
use reqwest::{Client, StatusCode, Url};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::config::MasstransitConfig;
use crate::error::MasstransitError;
use crate::models::StopInfo;
use crate::response::{StopInfoResponse, decode_stop_info, decode_token};
use crate::sink::{NoopSink, TraceSink};

/// Upper bound on getStopInfo requests per fetch
pub const MAX_ATTEMPTS: u8 = 3;

/// Encodings [`decode_content`] can undo
const SUPPORTED_ENCODINGS: &str = "gzip, deflate, br";

const BROTLI_BUFFER_SIZE: usize = 4096;

/// Operations a stop-info session offers
#[async_trait]
pub trait StopInfoClient: Send + Sync {
    /// Obtain a fresh anti-forgery token and store the response cookies
    async fn refresh_token(&self) -> Result<(), MasstransitError>;

    /// Fetch arrivals for a stop, renewing the token as the server demands
    ///
    /// Prognosis mode, if requested, only applies to the first request;
    /// every retry asks for schedule data.
    async fn fetch_stop_info(
        &self,
        stop_id: &str,
        prognosis: bool,
        cancel: &CancellationToken,
    ) -> Result<StopInfo, MasstransitError>;
}

/// Result of a single getStopInfo request
#[derive(Debug)]
enum Attempt {
    Data(StopInfo),
    TokenRenewed,
    NotFound,
}

/// Client session for the masstransit getStopInfo endpoint
///
/// The token lives in an atomically swapped cell, so concurrent fetches
/// always read a whole token. Concurrent renewals are last-writer-wins.
pub struct MasstransitClient {
    http: Client,
    host: Url,
    locale: String,
    language: String,
    retry_on_not_found: bool,
    token: ArcSwap<String>,
    cookies: Arc<Jar>,
    sink: Arc<dyn TraceSink>,
}

impl fmt::Debug for MasstransitClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasstransitClient")
            .field("host", &self.host.as_str())
            .field("locale", &self.locale)
            .field("language", &self.language)
            .field("retry_on_not_found", &self.retry_on_not_found)
            .field("has_token", &!self.token.load().is_empty())
            .finish_non_exhaustive()
    }
}

impl MasstransitClient {
    /// Create a session, refreshing the token unless the config supplies one
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the bootstrap
    /// refresh fails.
    pub async fn connect(config: &MasstransitConfig) -> Result<Self, MasstransitError> {
        Self::connect_with_sink(config, Arc::new(NoopSink)).await
    }

    /// Like [`connect`](Self::connect), reporting wire traces to `sink`
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the bootstrap
    /// refresh fails.
    pub async fn connect_with_sink(
        config: &MasstransitConfig,
        sink: Arc<dyn TraceSink>,
    ) -> Result<Self, MasstransitError> {
        let client = Self::build(config, sink)?;

        if config.initial_token().is_some() {
            debug!("csrf token supplied, skipping bootstrap refresh");
            return Ok(client);
        }

        client.refresh_token().await?;
        Ok(client)
    }

    fn build(config: &MasstransitConfig, sink: Arc<dyn TraceSink>) -> Result<Self, MasstransitError> {
        config
            .validate()
            .map_err(MasstransitError::ConfigurationError)?;

        let host = Url::parse(&config.host)
            .map_err(|e| MasstransitError::ConfigurationError(e.to_string()))?;

        let cookies = Arc::new(Jar::default());
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_provider(Arc::clone(&cookies))
            .build()
            .map_err(|e| MasstransitError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            http,
            host,
            locale: config.locale.clone(),
            language: config.language.clone(),
            retry_on_not_found: config.retry_on_not_found,
            token: ArcSwap::from_pointee(config.initial_token().unwrap_or_default().to_string()),
            cookies,
            sink: sink.module("client"),
        })
    }

    /// Current anti-forgery token (empty before the first refresh)
    #[must_use]
    pub fn token(&self) -> Arc<String> {
        self.token.load_full()
    }

    /// Cookie header that will be replayed to the host, if any
    #[must_use]
    pub fn cookies(&self) -> Option<String> {
        self.cookies
            .cookies(&self.host)
            .and_then(|v| v.to_str().ok().map(str::to_string))
    }

    /// Issue one getStopInfo request with the current token
    async fn attempt(&self, stop_id: &str, prognosis: bool) -> Result<Attempt, MasstransitError> {
        let token = self.token.load_full();

        let mut params = vec![
            ("csrfToken", token.as_str()),
            ("locale", self.locale.as_str()),
            ("lang", self.language.as_str()),
            ("id", stop_id),
        ];
        if prognosis {
            params.push(("mode", "prognosis"));
        }

        let request = self
            .http
            .get(self.host.clone())
            .query(&params)
            .header(ACCEPT_ENCODING, SUPPORTED_ENCODINGS)
            .build()?;

        self.sink.trace_fmt(format_args!("request={}", request.url()));

        let response = self.http.execute(request).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND && self.retry_on_not_found {
            debug!(prognosis, "getStopInfo returned 404");
            return Ok(Attempt::NotFound);
        }

        if !status.is_success() {
            self.sink.trace_fmt(format_args!("status code is {status}"));
            return Err(MasstransitError::WrongStatusCode {
                code: status.as_u16(),
            });
        }

        let body = read_body(response).await?;
        self.sink.trace_fmt(format_args!(
            "response ({}): {}",
            body.len(),
            String::from_utf8_lossy(&body)
        ));

        let decoded = decode_stop_info(&body)?;
        debug!(shape = decoded.shape(), "decoded getStopInfo response");

        match decoded {
            StopInfoResponse::TokenRenewal(token) => {
                self.token.store(Arc::new(token));
                Ok(Attempt::TokenRenewed)
            },
            StopInfoResponse::Error { code, message } => {
                Err(MasstransitError::ApplicationError { code, message })
            },
            StopInfoResponse::Data(info) => Ok(Attempt::Data(info)),
        }
    }
}

#[async_trait]
impl StopInfoClient for MasstransitClient {
    #[instrument(skip(self), fields(host = %self.host))]
    async fn refresh_token(&self) -> Result<(), MasstransitError> {
        let current = self.token.load_full();

        let request = self
            .http
            .get(self.host.clone())
            .query(&[("csrfToken", current.as_str())])
            .header(ACCEPT_ENCODING, SUPPORTED_ENCODINGS)
            .header(ACCEPT, "*/*")
            .header(CACHE_CONTROL, "no-cache")
            .build()?;

        let url = request.url().clone();
        self.sink.trace_fmt(format_args!("request={url}"));

        let response = self.http.execute(request).await?;
        let status = response.status();

        if !status.is_success() {
            warn!(%status, "token refresh rejected");
            return Err(MasstransitError::WrongStatusCode {
                code: status.as_u16(),
            });
        }

        let set_cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();

        let body = read_body(response).await?;
        let token = decode_token(&body)?;

        if token.is_empty() {
            self.sink
                .trace_fmt(format_args!("empty token in {}", String::from_utf8_lossy(&body)));
            return Err(MasstransitError::EmptyToken);
        }

        self.token.store(Arc::new(token));

        for cookie in &set_cookies {
            self.sink.trace_fmt(format_args!("raw cookie: {cookie}"));
            self.cookies.add_cookie_str(cookie, &url);
        }

        debug!(cookies = set_cookies.len(), "csrf token updated");
        Ok(())
    }

    #[instrument(skip(self, cancel))]
    async fn fetch_stop_info(
        &self,
        stop_id: &str,
        prognosis: bool,
        cancel: &CancellationToken,
    ) -> Result<StopInfo, MasstransitError> {
        self.sink.trace_fmt(format_args!(
            "cookies for {}: {}",
            self.host,
            self.cookies().unwrap_or_default()
        ));

        let mut prognosis = prognosis;
        let mut last_error = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(MasstransitError::Cancelled),
                outcome = self.attempt(stop_id, prognosis) => outcome?,
            };

            match outcome {
                Attempt::Data(info) => {
                    debug!(attempt, transport = info.transport.len(), "stop info fetched");
                    return Ok(info);
                },
                Attempt::TokenRenewed => {
                    debug!(attempt, "token expired, retrying with renewed token");
                    last_error = None;
                },
                Attempt::NotFound => {
                    debug!(attempt, prognosis, "no data, retrying");
                    last_error = Some(MasstransitError::WrongStatusCode {
                        code: StatusCode::NOT_FOUND.as_u16(),
                    });
                },
            }

            // Any retry falls back to schedule data
            prognosis = false;
        }

        let err = last_error.unwrap_or(MasstransitError::RetriesExhausted {
            attempts: MAX_ATTEMPTS,
        });
        warn!(%err, "giving up on stop info");
        Err(err)
    }
}

/// Read the whole body, undoing any content encoding
async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, MasstransitError> {
    let encoding = response
        .headers()
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase());

    let raw = response.bytes().await?;
    decode_content(encoding.as_deref(), &raw)
}

/// Undo a `content-encoding`
fn decode_content(encoding: Option<&str>, raw: &[u8]) -> Result<Vec<u8>, MasstransitError> {
    match encoding {
        None | Some("" | "identity") => Ok(raw.to_vec()),
        Some("gzip" | "x-gzip") => inflate(GzDecoder::new(raw)),
        // HTTP "deflate" is zlib-wrapped
        Some("deflate") => inflate(ZlibDecoder::new(raw)),
        Some("br") => inflate(brotli::Decompressor::new(raw, BROTLI_BUFFER_SIZE)),
        Some(other) => Err(MasstransitError::MalformedResponse(format!(
            "unsupported content-encoding {other:?}"
        ))),
    }
}

fn inflate(mut reader: impl Read) -> Result<Vec<u8>, MasstransitError> {
    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .map_err(|e| MasstransitError::MalformedResponse(format!("decompressing body: {e}")))?;
    Ok(out)
}
