use base64::{engine::general_purpose::STANDARD as b64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;
use url::Url;

use crate::{
    config::Authorization,
    protocol::{DecryptError, EncryptedReportPayload, KeyIdentifier},
};

use super::{HttpClient, TransportError};

/// Failures while talking to the report aggregation service.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport-level failure, including non-2xx/3xx statuses.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The configured authorization value can't be sent as a header.
    #[error("authorization value is not a valid header: {0}")]
    InvalidAuthorization(#[from] InvalidHeaderValue),
    /// The request body could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    /// The response body is not a report envelope.
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Body of a fetch: one search over a time range and a set of key ids.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct ReportFetchRequest {
    search: Vec<ReportSearch>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct ReportSearch {
    /// Milliseconds since the Unix epoch, as a decimal string.
    start_date: String,
    end_date: String,
    ids: Vec<String>,
}

impl ReportFetchRequest {
    /// Ask for every report published for `ids` in the `number_of_days` days up to `now`.
    pub fn new(ids: &[KeyIdentifier], number_of_days: u32, now: DateTime<Utc>) -> Self {
        let start = window_start(now, number_of_days);

        Self {
            search: vec![ReportSearch {
                start_date: start.timestamp_millis().max(0).to_string(),
                end_date: now.timestamp_millis().max(0).to_string(),
                ids: ids.iter().map(KeyIdentifier::to_base64).collect(),
            }],
        }
    }
}

/// Oldest time of interest for a window of `number_of_days` ending at `now`. Windows reaching
/// past the earliest representable date start there instead.
pub fn window_start(now: DateTime<Utc>, number_of_days: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(number_of_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// The `{"results": [...]}` envelope.
#[derive(Deserialize, Debug, Default)]
pub struct ReportResults {
    /// Reports in the order the server sent them.
    pub results: Vec<ReportResponse>,
}

impl ReportResults {
    /// Decode a response body; an empty body (e.g. from a 3xx) holds no reports.
    pub fn from_slice(body: &[u8]) -> Result<Self, FetchError> {
        if body.is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_slice(body).map_err(FetchError::Decode)
    }
}

/// A single encrypted report as the server returns it.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    /// When the server received the report.
    #[serde(deserialize_with = "deserialize_date_published")]
    pub date_published: DateTime<Utc>,
    /// Base64 of the 88-byte encrypted payload.
    pub payload: String,
    /// Base64 of the [`KeyIdentifier`] the report was filed under.
    pub id: String,
    /// Upstream status, not interpreted.
    pub status_code: i64,
    /// Free-form, usually absent.
    #[serde(default)]
    pub description: Option<String>,
}

impl ReportResponse {
    fn payload_bytes(&self) -> Result<Vec<u8>, DecryptError> {
        b64.decode(&self.payload)
            .map_err(|_| DecryptError::InvalidEncoding)
    }

    /// Decode the base64 payload into its fields.
    pub fn encrypted_report(&self) -> Result<EncryptedReportPayload, DecryptError> {
        EncryptedReportPayload::deserialize(&self.payload_bytes()?)
    }
}

/// `datePublished` is nominally milliseconds since the Unix epoch, but some servers send
/// seconds. Anything that reads as before 2020 in milliseconds is taken to be seconds.
fn deserialize_date_published<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(date_published_from_raw(raw))
}

fn date_published_from_raw(raw: f64) -> DateTime<Utc> {
    const CUTOFF_MILLIS: f64 = 1_577_836_800_000.0; // 2020-01-01T00:00:00Z

    let millis = if raw < CUTOFF_MILLIS { raw * 1000.0 } else { raw };
    DateTime::from_timestamp_millis(millis as i64).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Client for the report aggregation service.
pub struct ReportFetchClient<H> {
    http: H,
}

impl<H: HttpClient> ReportFetchClient<H> {
    /// Send requests over `http`.
    pub fn new(http: H) -> Self {
        Self { http }
    }

    /// POST `request` to `server_url` and decode the envelope.
    pub async fn fetch(
        &self,
        server_url: &Url,
        authorization: &Authorization,
        request: &ReportFetchRequest,
    ) -> Result<ReportResults, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Authorization::HttpHeader(value) = authorization {
            let mut value = HeaderValue::from_str(value)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let body = serde_json::to_vec(request).map_err(FetchError::Encode)?;
        let response = self.http.post(server_url, headers, body).await?;

        let results = ReportResults::from_slice(&response)?;
        debug!(reports = results.results.len(), "fetched reports");

        Ok(results)
    }
}
