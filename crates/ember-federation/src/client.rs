//! Server-to-server HTTP client: one signed-request core
//! ([`FederationClient::signed_request`]) and one public method per
//! operation-table row, all sharing the same discovery, signing, pool, and
//! retry machinery.

use std::sync::Arc;
use std::time::Duration;

use ember_common::config::FederationConfig;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::{
    auth::sign_request,
    discovery::DiscoveryCache,
    error::{FederationError, FederationResult},
    keys::{ServerKeyDocument, ServerSigningKey},
    pool::ConnectionPool,
    retry::{backoff, is_retryable_status},
    types::{MakeJoinResponse, SendJoinResponse, ServerVersion, Transaction},
};

/// Async HTTP client for outbound server-to-server federation requests.
pub struct FederationClient {
    server_name: String,
    key: Arc<ServerSigningKey>,
    http: Client,
    discovery: DiscoveryCache,
    pool: ConnectionPool,
    config: FederationConfig,
}

impl FederationClient {
    pub fn new(server_name: impl Into<String>, key: Arc<ServerSigningKey>, config: FederationConfig) -> FederationResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("ember-federation/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FederationError::from)?;

        Ok(Self {
            server_name: server_name.into(),
            key,
            http,
            discovery: DiscoveryCache::new()?,
            pool: ConnectionPool::new(&config),
            config,
        })
    }

    // ── Connection pool predicates ───────────────────────────────────────────

    /// Pre-warm DNS/TLS for `destination` without issuing a request.
    pub async fn prelink(&self, destination: &str) -> FederationResult<()> {
        self.discovery.resolve(destination).await?;
        self.pool.prelink(destination);
        Ok(())
    }

    pub fn avail(&self, destination: &str) -> bool {
        self.pool.avail(destination)
    }

    pub fn linked(&self, destination: &str) -> bool {
        self.pool.linked(destination)
    }

    pub fn errant(&self, destination: &str) -> bool {
        self.pool.errant(destination)
    }

    pub fn exists(&self, destination: &str) -> bool {
        self.pool.exists(destination)
    }

    // ── version ───────────────────────────────────────────────────────────────

    pub async fn version(&self, destination: &str) -> FederationResult<ServerVersion> {
        self.signed_request(destination, Method::GET, "/_matrix/federation/v1/version", None).await
    }

    // ── server keys ───────────────────────────────────────────────────────────

    /// `GET /_matrix/key/v2/server[/key_id]` — unauthenticated, like Matrix.
    pub async fn fetch_server_keys(&self, destination: &str, key_id: Option<&str>) -> FederationResult<ServerKeyDocument> {
        let path = match key_id {
            Some(id) => format!("/_matrix/key/v2/server/{}", urlencoded(id)),
            None => "/_matrix/key/v2/server".to_owned(),
        };
        let resolved = self.discovery.resolve(destination).await?;
        let url = format!("{}{}", resolved.base_url, path);
        debug!("federation GET {}", url);
        let resp = self
            .http
            .get(&url)
            .header("Host", &resolved.host_header)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| FederationError::RemoteHttp(destination.to_owned(), e.to_string()))?;
        Ok(resp.json().await?)
    }

    /// `POST /_matrix/key/v2/query` — batch key query across servers.
    pub async fn query_keys(&self, destination: &str, body: &Value) -> FederationResult<Value> {
        self.signed_request(destination, Method::POST, "/_matrix/key/v2/query", Some(body)).await
    }

    // ── event fetching ────────────────────────────────────────────────────────

    pub async fn get_event(&self, destination: &str, event_id: &str) -> FederationResult<Value> {
        let uri = format!("/_matrix/federation/v1/event/{}", urlencoded(event_id));
        self.signed_request(destination, Method::GET, &uri, None).await
    }

    pub async fn get_event_auth(&self, destination: &str, room_id: &str, event_id: &str) -> FederationResult<Value> {
        let uri = format!(
            "/_matrix/federation/v1/event_auth/{}/{}",
            urlencoded(room_id),
            urlencoded(event_id)
        );
        self.signed_request(destination, Method::GET, &uri, None).await
    }

    // ── room state ────────────────────────────────────────────────────────────

    pub async fn get_state(&self, destination: &str, room_id: &str, event_id: &str) -> FederationResult<Value> {
        let uri = format!("/_matrix/federation/v1/state/{}?event_id={}", urlencoded(room_id), urlencoded(event_id));
        self.signed_request(destination, Method::GET, &uri, None).await
    }

    pub async fn get_state_ids(&self, destination: &str, room_id: &str, event_id: &str) -> FederationResult<Value> {
        let uri = format!("/_matrix/federation/v1/state_ids/{}?event_id={}", urlencoded(room_id), urlencoded(event_id));
        self.signed_request(destination, Method::GET, &uri, None).await
    }

    // ── backfill / missing events ────────────────────────────────────────────

    pub async fn backfill(&self, destination: &str, room_id: &str, limit: u32, event_ids: &[&str]) -> FederationResult<Value> {
        let mut v_params: String = event_ids.iter().map(|id| format!("v={}&", urlencoded(id))).collect();
        v_params.push_str(&format!("limit={limit}"));
        let uri = format!("/_matrix/federation/v1/backfill/{}?{}", urlencoded(room_id), v_params);
        self.signed_request(destination, Method::GET, &uri, None).await
    }

    pub async fn get_missing_events(&self, destination: &str, room_id: &str, body: &Value) -> FederationResult<Value> {
        let uri = format!("/_matrix/federation/v1/get_missing_events/{}", urlencoded(room_id));
        self.signed_request(destination, Method::POST, &uri, Some(body)).await
    }

    // ── join protocol ─────────────────────────────────────────────────────────

    pub async fn make_join(&self, destination: &str, room_id: &str, user_id: &str, room_versions: &[&str]) -> FederationResult<MakeJoinResponse> {
        let ver_params: String = room_versions.iter().map(|v| format!("ver={}", urlencoded(v))).collect::<Vec<_>>().join("&");
        let uri = format!(
            "/_matrix/federation/v1/make_join/{}/{}?{}",
            urlencoded(room_id),
            urlencoded(user_id),
            ver_params
        );
        self.signed_request(destination, Method::GET, &uri, None).await
    }

    pub async fn send_join(&self, destination: &str, room_id: &str, event_id: &str, join_event: &Value) -> FederationResult<SendJoinResponse> {
        let uri = format!(
            "/_matrix/federation/v2/send_join/{}/{}",
            urlencoded(room_id),
            urlencoded(event_id)
        );
        self.signed_request(destination, Method::PUT, &uri, Some(join_event)).await
    }

    /// `invite` exists in both v1 and v2 shape; `version` selects the path.
    pub async fn send_invite(&self, destination: &str, version: u8, room_id: &str, event_id: &str, body: &Value) -> FederationResult<Value> {
        let uri = format!(
            "/_matrix/federation/v{}/invite/{}/{}",
            version,
            urlencoded(room_id),
            urlencoded(event_id)
        );
        self.signed_request(destination, Method::PUT, &uri, Some(body)).await
    }

    // ── transactions ──────────────────────────────────────────────────────────

    pub async fn send_transaction(&self, destination: &str, txn: &Transaction) -> FederationResult<Value> {
        txn.validate()?;
        let txn_id = txn.derive_txn_id()?;
        let uri = format!("/_matrix/federation/v1/send/{}", txn_id);
        let body = serde_json::to_value(txn)?;
        self.signed_request(destination, Method::PUT, &uri, Some(&body)).await
    }

    // ── devices / keys ────────────────────────────────────────────────────────

    pub async fn get_user_devices(&self, destination: &str, user_id: &str) -> FederationResult<Value> {
        let uri = format!("/_matrix/federation/v1/user/devices/{}", urlencoded(user_id));
        self.signed_request(destination, Method::GET, &uri, None).await
    }

    pub async fn query_user_keys(&self, destination: &str, body: &Value) -> FederationResult<Value> {
        self.signed_request(destination, Method::POST, "/_matrix/federation/v1/user/keys/query", Some(body)).await
    }

    pub async fn claim_user_keys(&self, destination: &str, body: &Value) -> FederationResult<Value> {
        self.signed_request(destination, Method::POST, "/_matrix/federation/v1/user/keys/claim", Some(body)).await
    }

    // ── directory queries ─────────────────────────────────────────────────────

    pub async fn query(&self, destination: &str, kind: &str, params: &[(&str, &str)]) -> FederationResult<Value> {
        let query: String = params.iter().map(|(k, v)| format!("{}={}", k, urlencoded(v))).collect::<Vec<_>>().join("&");
        let uri = if query.is_empty() {
            format!("/_matrix/federation/v1/query/{}", urlencoded(kind))
        } else {
            format!("/_matrix/federation/v1/query/{}?{}", urlencoded(kind), query)
        };
        self.signed_request(destination, Method::GET, &uri, None).await
    }

    // ── signed-request core ───────────────────────────────────────────────────

    async fn signed_request<T: DeserializeOwned>(
        &self,
        destination: &str,
        method: Method,
        uri: &str,
        body: Option<&Value>,
    ) -> FederationResult<T> {
        if !self.pool.avail(destination) {
            return Err(FederationError::Errant(destination.to_owned(), 0));
        }

        let mut attempt = 0u32;
        loop {
            let resolved = self.discovery.resolve(destination).await?;
            let auth = sign_request(&self.key, &self.server_name, destination, method.as_str(), uri, body)?;
            let url = format!("{}{}", resolved.base_url, uri);
            debug!("federation {} {}", method, url);

            let mut request = self
                .http
                .request(method.clone(), &url)
                .header("Authorization", auth.to_header())
                .header("Host", &resolved.host_header);
            if let Some(b) = body {
                request = request.json(b);
            }

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        self.pool.record_success(destination);
                        return Ok(resp.json().await?);
                    }

                    self.pool.record_failure(destination);
                    let retryable = is_retryable_status(status.as_u16());
                    if !retryable || attempt >= self.config.max_retry_attempts {
                        let text = resp.text().await.unwrap_or_default();
                        return Err(FederationError::RemoteProtocol(destination.to_owned(), format!("{status}: {text}")));
                    }
                }
                Err(e) => {
                    self.pool.record_failure(destination);
                    if attempt >= self.config.max_retry_attempts {
                        return Err(FederationError::from(e));
                    }
                }
            }

            tokio::time::sleep(backoff(&self.config, attempt)).await;
            attempt += 1;
        }
    }
}

fn urlencoded(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
