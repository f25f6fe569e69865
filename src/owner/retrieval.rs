use base64::{engine::general_purpose::STANDARD as b64, Engine as _};
use chrono::{DateTime, Utc};
use tokio::task::JoinError;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    accessory::{Accessory, AccessoryStatus, KeyStore, Location},
    config::Config,
    protocol::{KeyIdentifier, PrivateKey},
    server::{window_start, FetchError, HttpClient, ReportFetchClient, ReportFetchRequest},
};

use super::batch;

/// Why a refresh produced no accessories at all.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// No server URL is configured, or it doesn't parse.
    #[error("server URL is missing or invalid")]
    InvalidServerUrl,
    /// The server couldn't be reached or answered with something unusable.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// A decryption worker panicked or was cancelled.
    #[error("decryption worker failed: {0}")]
    Decryption(#[from] JoinError),
}

/// Fetches, decrypts and attaches locations to accessories.
pub struct RetrievalPipeline<H, S> {
    client: ReportFetchClient<H>,
    key_store: S,
    config: Config,
}

impl<H: HttpClient, S: KeyStore> RetrievalPipeline<H, S> {
    /// Fetch over `http` and look up private keys in `key_store`.
    pub fn new(http: H, key_store: S, config: Config) -> Self {
        Self {
            client: ReportFetchClient::new(http),
            key_store,
            config,
        }
    }

    /// Refresh `accessories` against the configured server as of now.
    pub async fn refresh_locations(
        &self,
        accessories: Vec<Accessory>,
    ) -> Result<Vec<Accessory>, RefreshError> {
        self.refresh_locations_at(accessories, Utc::now()).await
    }

    /// [`Self::refresh_locations`] with an explicit notion of "now".
    ///
    /// Every accessory comes back with its locations replaced by those observed in the last
    /// `number_of_days` days, newest first. Accessories whose id isn't valid base64 can't be
    /// queried and are left out of the result.
    pub async fn refresh_locations_at(
        &self,
        accessories: Vec<Accessory>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Accessory>, RefreshError> {
        let server_url = self
            .config
            .server
            .server_url
            .as_deref()
            .and_then(|url| Url::parse(url).ok())
            .ok_or(RefreshError::InvalidServerUrl)?;
        let number_of_days = self.config.reports.number_of_days;

        let (mut accessories, query): (Vec<Accessory>, Vec<KeyIdentifier>) = accessories
            .into_iter()
            .filter_map(|accessory| {
                let identifier = query_identifier(&accessory.id)?;
                Some((accessory, identifier))
            })
            .unzip();
        let keys: Vec<(KeyIdentifier, PrivateKey)> = accessories
            .iter()
            .zip(&query)
            .filter_map(|(accessory, identifier)| {
                Some((*identifier, self.key_store.private_key(&accessory.id)?))
            })
            .collect();
        debug!(
            accessories = accessories.len(),
            queried = query.len(),
            with_keys = keys.len(),
            "refreshing locations"
        );

        let request = ReportFetchRequest::new(&query, number_of_days, now);
        let results = self
            .client
            .fetch(&server_url, &self.config.server.authorization, &request)
            .await?;

        let decrypted = batch::decrypt_reports(results.results, &keys).await?;

        let cutoff = window_start(now, number_of_days);
        for (accessory, identifier) in accessories.iter_mut().zip(&query) {
            let mut locations: Vec<Location> = decrypted
                .get(identifier)
                .map(|reports| {
                    reports
                        .iter()
                        .map(Location::from)
                        .filter(|location| location.timestamp >= cutoff)
                        .collect()
                })
                .unwrap_or_default();
            locations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

            accessory.status = if locations.is_empty() {
                AccessoryStatus::Inactive
            } else {
                AccessoryStatus::Active
            };
            accessory.locations = locations;
        }

        info!(
            active = accessories
                .iter()
                .filter(|accessory| accessory.status == AccessoryStatus::Active)
                .count(),
            total = accessories.len(),
            "refreshed locations"
        );

        Ok(accessories)
    }
}

/// What reports for an accessory are filed under: the hash of its decoded id.
fn query_identifier(accessory_id: &str) -> Option<KeyIdentifier> {
    match b64.decode(accessory_id) {
        Ok(advertisement_key) => Some(KeyIdentifier::of(&advertisement_key)),
        Err(_) => {
            warn!(accessory_id, "accessory id is not valid base64, dropping it");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use chrono::Duration;
    use reqwest::header::HeaderMap;

    use crate::{
        accessory::MemoryKeyStore,
        config::ServerConfiguration,
        finder::FinderDevice,
        protocol::{Coordinate, ReportData},
        server::TransportError,
    };

    use super::*;

    /// Serves a canned body and records what was asked for.
    #[derive(Default)]
    pub(crate) struct FakeServer {
        pub(crate) body: Vec<u8>,
        pub(crate) requests: AtomicUsize,
        pub(crate) last_body: Mutex<Vec<u8>>,
    }

    impl HttpClient for &'static FakeServer {
        async fn post(
            &self,
            _url: &Url,
            _headers: HeaderMap,
            body: Vec<u8>,
        ) -> Result<Vec<u8>, TransportError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            *self.last_body.lock().unwrap() = body;
            tokio::task::yield_now().await;
            Ok(self.body.clone())
        }
    }

    pub(crate) fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-08T00:00:00Z")
            .unwrap()
            .into()
    }

    pub(crate) fn config() -> Config {
        Config {
            server: ServerConfiguration {
                server_url: Some("http://localhost:6176".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// A server report for `private_key`, filed under `id`.
    pub(crate) fn report_json(
        private_key: &PrivateKey,
        id: &str,
        raw_latitude: i32,
        observed_at: DateTime<Utc>,
    ) -> serde_json::Value {
        let payload = FinderDevice()
            .encrypt_report(
                &mut rand::rngs::OsRng,
                &private_key.advertisement_key(),
                &ReportData {
                    timestamp: observed_at,
                    confidence: 1,
                    location: crate::protocol::Location {
                        latitude: Coordinate::from_raw(raw_latitude),
                        longitude: Coordinate::from_raw(raw_latitude),
                        horizontal_accuracy: 3,
                    },
                },
            )
            .unwrap()
            .serialize();

        serde_json::json!({
            "datePublished": observed_at.timestamp_millis(),
            "payload": b64.encode(payload),
            "id": id,
            "statusCode": 0,
        })
    }

    pub(crate) fn server_with(reports: Vec<serde_json::Value>) -> &'static FakeServer {
        Box::leak(Box::new(FakeServer {
            body: serde_json::to_vec(&serde_json::json!({ "results": reports })).unwrap(),
            ..Default::default()
        }))
    }

    pub(crate) fn accessory_for(private_key: &PrivateKey, name: &str) -> Accessory {
        Accessory::new(private_key.advertisement_key().to_base64(), name, "")
    }

    #[tokio::test]
    async fn test_only_known_keys_get_locations() {
        let key_a = PrivateKey::random(&mut rand::rngs::OsRng);
        let key_b = PrivateKey::random(&mut rand::rngs::OsRng);
        let key_c = PrivateKey::random(&mut rand::rngs::OsRng);

        let mut key_store = MemoryKeyStore::new();
        key_store.insert(key_a.advertisement_key().to_base64(), key_a.clone());

        let server = server_with(vec![
            report_json(&key_a, &key_a.key_identifier().to_base64(), 1, now() - Duration::hours(1)),
            report_json(&key_b, &key_b.key_identifier().to_base64(), 2, now() - Duration::hours(1)),
            report_json(&key_c, &key_c.key_identifier().to_base64(), 3, now() - Duration::hours(1)),
        ]);
        let pipeline = RetrievalPipeline::new(server, key_store, config());

        let accessories = pipeline
            .refresh_locations_at(
                vec![accessory_for(&key_a, "A"), accessory_for(&key_b, "B")],
                now(),
            )
            .await
            .unwrap();

        assert_eq!(accessories.len(), 2);
        assert_eq!(accessories[0].status, AccessoryStatus::Active);
        assert_eq!(accessories[0].locations.len(), 1);
        assert_eq!(accessories[0].locations[0].latitude, 1e-7);
        assert_eq!(accessories[0].locations[0].timestamp, now() - Duration::hours(1));
        assert_eq!(accessories[0].locations[0].address, None);
        assert_eq!(accessories[1].status, AccessoryStatus::Inactive);
        assert!(accessories[1].locations.is_empty());

        let sent: ReportFetchRequest =
            serde_json::from_slice(&server.last_body.lock().unwrap()).unwrap();
        assert_eq!(
            sent,
            ReportFetchRequest::new(&[key_a.key_identifier(), key_b.key_identifier()], 7, now())
        );
    }

    #[tokio::test]
    async fn test_window_and_ordering() {
        let key = PrivateKey::random(&mut rand::rngs::OsRng);
        let id = key.key_identifier().to_base64();
        let mut key_store = MemoryKeyStore::new();
        key_store.insert(key.advertisement_key().to_base64(), key.clone());

        let server = server_with(vec![
            report_json(&key, &id, 1, now() - Duration::days(3)),
            report_json(&key, &id, 2, now() - Duration::days(8)),
            report_json(&key, &id, 3, now() - Duration::minutes(10)),
            report_json(&key, &id, 4, now() - Duration::days(1)),
        ]);
        let pipeline = RetrievalPipeline::new(server, key_store, config());

        let accessories = pipeline
            .refresh_locations_at(vec![accessory_for(&key, "tag")], now())
            .await
            .unwrap();

        let latitudes: Vec<f64> = accessories[0]
            .locations
            .iter()
            .map(|location| location.latitude)
            .collect();
        assert_eq!(latitudes, vec![3e-7, 4e-7, 1e-7]);
        assert_eq!(
            accessories[0].latest_location().unwrap().timestamp,
            now() - Duration::minutes(10)
        );
    }

    #[tokio::test]
    async fn test_unbounded_window_keeps_everything() {
        let key = PrivateKey::random(&mut rand::rngs::OsRng);
        let id = key.key_identifier().to_base64();
        let mut key_store = MemoryKeyStore::new();
        key_store.insert(key.advertisement_key().to_base64(), key.clone());

        let server = server_with(vec![report_json(&key, &id, 1, now() - Duration::days(400))]);
        let mut config = config();
        config.reports.number_of_days = u32::MAX;
        let pipeline = RetrievalPipeline::new(server, key_store, config);

        let accessories = pipeline
            .refresh_locations_at(vec![accessory_for(&key, "tag")], now())
            .await
            .unwrap();

        assert_eq!(accessories[0].locations.len(), 1);
        assert_eq!(accessories[0].status, AccessoryStatus::Active);
    }

    #[tokio::test]
    async fn test_invalid_accessory_id_is_dropped() {
        let key = PrivateKey::random(&mut rand::rngs::OsRng);
        let server = server_with(Vec::new());
        let pipeline = RetrievalPipeline::new(server, MemoryKeyStore::new(), config());

        let accessories = pipeline
            .refresh_locations_at(
                vec![
                    Accessory::new("not base64!", "broken", ""),
                    accessory_for(&key, "fine"),
                ],
                now(),
            )
            .await
            .unwrap();

        assert_eq!(accessories.len(), 1);
        assert_eq!(accessories[0].name, "fine");
        assert_eq!(accessories[0].status, AccessoryStatus::Inactive);
        let sent: ReportFetchRequest =
            serde_json::from_slice(&server.last_body.lock().unwrap()).unwrap();
        assert_eq!(
            sent,
            ReportFetchRequest::new(&[key.key_identifier()], 7, now())
        );
    }

    #[tokio::test]
    async fn test_missing_server_url() {
        let server = server_with(Vec::new());
        let pipeline = RetrievalPipeline::new(server, MemoryKeyStore::new(), Config::default());

        let result = pipeline.refresh_locations_at(Vec::new(), now()).await;

        assert!(matches!(result, Err(RefreshError::InvalidServerUrl)));
        assert_eq!(server.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unparsable_server_url() {
        let server = server_with(Vec::new());
        let mut config = config();
        config.server.server_url = Some("not a url".to_string());
        let pipeline = RetrievalPipeline::new(server, MemoryKeyStore::new(), config);

        let result = pipeline.refresh_locations_at(Vec::new(), now()).await;

        assert!(matches!(result, Err(RefreshError::InvalidServerUrl)));
        assert_eq!(server.requests.load(Ordering::SeqCst), 0);
    }
}
