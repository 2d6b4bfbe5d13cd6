//! Server name resolution — resolves a bare server name to a reachable
//! HTTPS base URL plus the `Host` header to present.
//!
//! Resolution order, per the Matrix server-server API:
//!
//! 1. **Literal `host:port`** — used as-is.
//! 2. **`.well-known/matrix/server`** — `GET https://<name>/.well-known/matrix/server`;
//!    on success, follow the delegated `m.server` (itself subject to steps 1/3/4).
//! 3. **SRV** `_matrix._tcp.<name>` — first result by priority/weight.
//! 4. **A/AAAA** on the well-known federation port (8448).
//!
//! Results are cached in memory with a TTL; failures are negatively cached
//! too, so a down server isn't re-resolved on every request.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use hickory_resolver::TokioAsyncResolver;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{FederationError, FederationResult};
use crate::types::WellKnownServer;

/// Default federation port, used whenever discovery falls all the way
/// through to bare A/AAAA resolution.
const DEFAULT_FED_PORT: u16 = 8448;

/// How long a successfully resolved destination is cached.
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// How long a failed resolution is cached, to avoid hammering a dead server.
const NEGATIVE_CACHE_TTL: Duration = Duration::from_secs(60);

/// A resolved destination: the HTTPS origin to connect to, and the SNI /
/// `Host` header value (which may differ from the origin when a well-known
/// delegation or SRV lookup retargets the connection).
#[derive(Debug, Clone)]
pub struct ResolvedDestination {
    pub base_url: String,
    pub host_header: String,
}

#[derive(Debug, Clone)]
enum CacheEntry {
    Hit { destination: ResolvedDestination, at: Instant },
    Miss { error: String, at: Instant },
}

/// In-memory server-name resolution cache, shared across a
/// [`crate::client::FederationClient`].
#[derive(Clone)]
pub struct DiscoveryCache {
    inner: Arc<RwLock<HashMap<String, CacheEntry>>>,
    http: reqwest::Client,
    resolver: Arc<TokioAsyncResolver>,
}

impl DiscoveryCache {
    pub fn new() -> FederationResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent(concat!("ember-federation/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FederationError::from)?;

        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| FederationError::DiscoveryFailed("<resolver init>".into(), e.to_string()))?;

        Ok(Self { inner: Arc::new(RwLock::new(HashMap::new())), http, resolver: Arc::new(resolver) })
    }

    /// Resolve `server_name`, consulting (and populating) the cache.
    pub async fn resolve(&self, server_name: &str) -> FederationResult<ResolvedDestination> {
        {
            let cache = self.inner.read().await;
            match cache.get(server_name) {
                Some(CacheEntry::Hit { destination, at }) if at.elapsed() < CACHE_TTL => {
                    debug!("discovery cache hit: {} -> {}", server_name, destination.base_url);
                    return Ok(destination.clone());
                }
                Some(CacheEntry::Miss { error, at }) if at.elapsed() < NEGATIVE_CACHE_TTL => {
                    return Err(FederationError::DiscoveryFailed(server_name.to_owned(), error.clone()));
                }
                _ => {}
            }
        }

        match self.do_resolve(server_name).await {
            Ok(destination) => {
                self.inner
                    .write()
                    .await
                    .insert(server_name.to_owned(), CacheEntry::Hit { destination: destination.clone(), at: Instant::now() });
                Ok(destination)
            }
            Err(e) => {
                self.inner
                    .write()
                    .await
                    .insert(server_name.to_owned(), CacheEntry::Miss { error: e.to_string(), at: Instant::now() });
                Err(e)
            }
        }
    }

    pub async fn invalidate(&self, server_name: &str) {
        self.inner.write().await.remove(server_name);
    }

    // ── Resolution steps ─────────────────────────────────────────────────────

    async fn do_resolve(&self, server_name: &str) -> FederationResult<ResolvedDestination> {
        // Step 1: explicit port.
        if let Some(port) = explicit_port(server_name) {
            debug!("discovery (literal): {}", server_name);
            let _ = port;
            return Ok(ResolvedDestination {
                base_url: format!("https://{}", server_name),
                host_header: server_name.to_owned(),
            });
        }

        // Step 2: well-known delegation.
        if let Some(delegated) = self.try_well_known(server_name).await {
            debug!("discovery (well-known): {} -> {}", server_name, delegated);
            if let Some(_port) = explicit_port(&delegated) {
                return Ok(ResolvedDestination { base_url: format!("https://{}", delegated), host_header: delegated });
            }
            if let Ok(dest) = self.try_srv(&delegated).await {
                return Ok(dest);
            }
            return self.fallback_direct(&delegated).await;
        }

        // Step 3: SRV record on the original name.
        if let Ok(dest) = self.try_srv(server_name).await {
            debug!("discovery (SRV): {} -> {}", server_name, dest.base_url);
            return Ok(dest);
        }

        // Step 4: bare A/AAAA on the default federation port.
        debug!("discovery (A/AAAA fallback): {}", server_name);
        self.fallback_direct(server_name).await
    }

    async fn try_well_known(&self, server_name: &str) -> Option<String> {
        let url = format!("https://{}/.well-known/matrix/server", server_name);
        let resp = self.http.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let wk: WellKnownServer = resp.json().await.ok()?;
        Some(wk.server)
    }

    async fn try_srv(&self, name: &str) -> FederationResult<ResolvedDestination> {
        let query = format!("_matrix._tcp.{name}");
        let lookup = self
            .resolver
            .srv_lookup(&query)
            .await
            .map_err(|e| FederationError::DiscoveryFailed(name.to_owned(), e.to_string()))?;

        let best = lookup
            .iter()
            .min_by_key(|srv| (srv.priority(), std::cmp::Reverse(srv.weight())))
            .ok_or_else(|| FederationError::DiscoveryFailed(name.to_owned(), "empty SRV answer".into()))?;

        let target = best.target().to_utf8();
        let target = target.trim_end_matches('.');
        Ok(ResolvedDestination {
            base_url: format!("https://{}:{}", target, best.port()),
            host_header: name.to_owned(),
        })
    }

    async fn fallback_direct(&self, name: &str) -> FederationResult<ResolvedDestination> {
        self.resolver
            .lookup_ip(name)
            .await
            .map_err(|e| FederationError::DiscoveryFailed(name.to_owned(), e.to_string()))?;
        Ok(ResolvedDestination {
            base_url: format!("https://{}:{}", name, DEFAULT_FED_PORT),
            host_header: name.to_owned(),
        })
    }
}

fn explicit_port(server_name: &str) -> Option<u16> {
    if server_name.starts_with('[') {
        // IPv6 literal with port: [::1]:8448
        let (_, port) = server_name.rsplit_once("]:")?;
        return port.parse().ok();
    }
    let colon_count = server_name.chars().filter(|&c| c == ':').count();
    if colon_count == 1 {
        server_name.rsplit_once(':').and_then(|(_, port)| port.parse().ok())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::explicit_port;

    #[test]
    fn explicit_port_detection() {
        assert_eq!(explicit_port("example.org:8448"), Some(8448));
        assert_eq!(explicit_port("example.org"), None);
        assert_eq!(explicit_port("[::1]:8448"), Some(8448));
        assert_eq!(explicit_port("::1"), None); // bare IPv6 literal, no port
    }
}
