// Request interception: precache on install, evict old versions on activate, then serve.

use futures::future::try_join_all;
use reqwest::{Method, Url};
use tracing::{debug, info, warn};

use super::network::Network;
use super::storage::CacheStorage;
use super::{cache_key, Request, Response};
use crate::config::CacheConfig;
use crate::error::{GatewayError, NetworkError};

/// Lifecycle of one cache version.
///
/// An older version is evicted when a newer one activates; its gateway is
/// simply dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    /// Precache not committed yet. Install may be retried.
    Installing,
    /// Precache committed, waiting for activation.
    Installed,
    /// Intercepting requests.
    Active,
}

pub struct CacheGateway<N: Network, C: CacheStorage> {
    version: String,
    origin: Url,
    manifest: Vec<Url>,
    root_document: Url,
    network: N,
    storage: C,
    state: GatewayState,
}

impl<N: Network, C: CacheStorage> CacheGateway<N, C> {
    pub fn new(config: &CacheConfig, network: N, storage: C) -> Result<Self, GatewayError> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| GatewayError::InvalidUrl(format!("{}: {}", config.origin, e)))?;
        let resolve = |path: &str| {
            origin
                .join(path)
                .map_err(|e| GatewayError::InvalidUrl(format!("{}: {}", path, e)))
        };
        let manifest = config
            .manifest
            .iter()
            .map(|p| resolve(p.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let root_document = resolve(config.root_document.as_str())?;

        Ok(Self {
            version: config.version.clone(),
            origin,
            manifest,
            root_document,
            network,
            storage,
            state: GatewayState::Installing,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn state(&self) -> GatewayState {
        self.state
    }

    /// Fetch every manifest entry and commit them together.
    ///
    /// If any fetch fails or returns a non-200 status nothing is stored and the
    /// state is left as it was, so an active gateway keeps serving its cache.
    pub async fn install(&mut self) -> Result<usize, GatewayError> {
        let network = &self.network;
        let fetches = self.manifest.iter().map(|url| {
            let request = Request::get(url.clone());
            async move {
                let fail = |reason: String| GatewayError::InstallFailed {
                    url: url.to_string(),
                    reason,
                };
                match network.fetch(&request).await {
                    Ok(resp) if resp.is_cacheable() => Ok((request.cache_key(), resp)),
                    Ok(resp) => Err(fail(format!("status {}", resp.status))),
                    Err(e) => Err(fail(e.to_string())),
                }
            }
        });
        let entries = try_join_all(fetches).await?;

        let count = entries.len();
        self.storage.put_all(&self.version, entries).await;
        if self.state == GatewayState::Installing {
            self.state = GatewayState::Installed;
        }
        info!("cache {} installed with {} assets", self.version, count);
        Ok(count)
    }

    /// Delete every cache not belonging to this version and start intercepting.
    ///
    /// Returns the names of the deleted caches.
    pub async fn activate(&mut self) -> Result<Vec<String>, GatewayError> {
        if self.state == GatewayState::Installing {
            return Err(GatewayError::NotInstalled);
        }

        let mut deleted = Vec::new();
        for name in self.storage.keys().await {
            if name != self.version && self.storage.delete(&name).await {
                info!("deleted old cache {}", name);
                deleted.push(name);
            }
        }
        self.state = GatewayState::Active;
        Ok(deleted)
    }

    /// Whether `request` is served through the cache rather than passed through.
    pub fn intercepts(&self, request: &Request) -> bool {
        self.state == GatewayState::Active
            && request.method == Method::GET
            && request.url.origin() == self.origin.origin()
    }

    pub async fn handle(&self, request: &Request) -> Result<Response, GatewayError> {
        if !self.intercepts(request) {
            return Ok(self.network.fetch(request).await?);
        }
        if request.is_document() {
            self.network_first(request).await
        } else {
            self.cache_first(request).await
        }
    }

    async fn network_first(&self, request: &Request) -> Result<Response, GatewayError> {
        let key = request.cache_key();
        match self.network.fetch(request).await {
            Ok(resp) => {
                self.store_copy(&key, &resp).await;
                Ok(resp)
            }
            Err(e) => {
                warn!("network failed for {}, trying cache: {}", key, e);
                if let Some(hit) = self.storage.lookup(&self.version, &key).await {
                    return Ok(hit);
                }
                let root = cache_key(&self.root_document);
                if let Some(fallback) = self.storage.lookup(&self.version, &root).await {
                    debug!("serving {} in place of {}", root, key);
                    return Ok(fallback);
                }
                Err(e.into())
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> Result<Response, GatewayError> {
        let key = request.cache_key();
        if let Some(hit) = self.storage.lookup(&self.version, &key).await {
            debug!("cache hit {}", key);
            return Ok(hit);
        }

        debug!("cache miss {}", key);
        let resp = self
            .network
            .fetch(request)
            .await
            .map_err(|e: NetworkError| {
                warn!("{} not cached and network failed: {}", key, e);
                GatewayError::from(e)
            })?;
        self.store_copy(&key, &resp).await;
        Ok(resp)
    }

    async fn store_copy(&self, key: &str, resp: &Response) {
        if resp.is_cacheable() {
            self.storage.put(&self.version, key, resp.clone()).await;
        }
    }
}
