use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::accessory::{Accessory, KeyStore};
use crate::server::HttpClient;

use super::{RefreshError, RetrievalPipeline};

type SharedRefresh = Shared<BoxFuture<'static, Result<Vec<Accessory>, Arc<RefreshError>>>>;

/// Owns the current accessory list and keeps at most one refresh in flight.
///
/// Callers that ask for a refresh while one is running wait for that one instead of starting
/// another fetch. The stored list only changes when a refresh succeeds.
pub struct AccessoriesManager<H, S> {
    pipeline: Arc<RetrievalPipeline<H, S>>,
    accessories: Arc<RwLock<Vec<Accessory>>>,
    in_flight: Mutex<Option<SharedRefresh>>,
}

impl<H, S> AccessoriesManager<H, S>
where
    H: HttpClient + 'static,
    S: KeyStore + 'static,
{
    /// Start managing `accessories`, refreshing them through `pipeline`.
    pub fn new(pipeline: RetrievalPipeline<H, S>, accessories: Vec<Accessory>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            accessories: Arc::new(RwLock::new(accessories)),
            in_flight: Mutex::new(None),
        }
    }

    /// A snapshot of the stored accessories.
    pub async fn accessories(&self) -> Vec<Accessory> {
        self.accessories.read().await.clone()
    }

    /// Add accessories; ones whose id is already known replace the stored entry.
    pub async fn add_accessories(&self, accessories: impl IntoIterator<Item = Accessory>) {
        let mut stored = self.accessories.write().await;
        for accessory in accessories {
            match stored.iter_mut().find(|existing| existing.id == accessory.id) {
                Some(existing) => *existing = accessory,
                None => stored.push(accessory),
            }
        }
    }

    /// Stop tracking the accessory with `id`, returning it if it was known.
    pub async fn remove_accessory(&self, id: &str) -> Option<Accessory> {
        let mut stored = self.accessories.write().await;
        let index = stored.iter().position(|accessory| accessory.id == id)?;
        Some(stored.remove(index))
    }

    /// Whether a refresh has started and not yet finished.
    pub fn is_refreshing(&self) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(&*in_flight, Some(refresh) if refresh.peek().is_none())
    }

    /// Refresh every stored accessory's locations, or join the refresh already running.
    pub async fn refresh(&self) -> Result<Vec<Accessory>, Arc<RefreshError>> {
        let refresh = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match &*in_flight {
                Some(refresh) if refresh.peek().is_none() => {
                    debug!("joining in-flight refresh");
                    refresh.clone()
                }
                _ => {
                    let refresh = self.start_refresh();
                    *in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    fn start_refresh(&self) -> SharedRefresh {
        let pipeline = Arc::clone(&self.pipeline);
        let stored = Arc::clone(&self.accessories);

        async move {
            let snapshot = stored.read().await.clone();
            let refreshed = pipeline.refresh_locations(snapshot).await.map_err(|error| {
                warn!(%error, "refresh failed, keeping previous locations");
                Arc::new(error)
            })?;

            let mut stored = stored.write().await;
            for accessory in stored.iter_mut() {
                if let Some(update) = refreshed.iter().find(|update| update.id == accessory.id) {
                    accessory.locations = update.locations.clone();
                    accessory.status = update.status;
                }
            }

            Ok(refreshed)
        }
        .boxed()
        .shared()
    }
}
