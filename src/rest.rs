//! REST implementation of the compute client boundary
//!
//! Speaks the provider's JSON-over-HTTP compute API:
//!
//! - `POST {auth_url}/tokens` issues a token and a service catalog; the
//!   compute endpoint is selected by service type and region, unless the
//!   config carries an explicit endpoint override.
//! - Compute calls send the token in `X-Auth-Token`.
//!
//! One [`RestSessionFactory`] is shared by the whole batch; every
//! `authenticate()` call issues a fresh token and returns an independent
//! [`RestSession`]. The underlying `reqwest::Client` (connection pool, DNS
//! cache) is shared across sessions, which the client library supports for
//! concurrent independent use.

use crate::client::{
    ComputeSession, CreateServerRequest, CreatedServer, Flavor, Image, Keypair, Network,
    ServerDetail, ServerFault, ServerStatus, ServerSummary, SessionFactory,
};
use crate::config::TestEnv;
use crate::error::{FleetError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-request HTTP timeout
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Service catalog entry type naming the compute API
const COMPUTE_SERVICE_TYPE: &str = "compute";

/// Issues tokens and independent compute sessions for one account
pub struct RestSessionFactory {
    env: TestEnv,
    http: reqwest::Client,
}

impl RestSessionFactory {
    /// Create a factory for the given test environment
    pub fn new(env: TestEnv) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(FleetError::Http)?;
        Ok(Self { env, http })
    }

    fn auth_body(&self) -> Result<serde_json::Value> {
        let account = &self.env.account;
        if let Some(api_key) = &account.api_key {
            return Ok(json!({
                "auth": {
                    "RAX-KSKEY:apiKeyCredentials": {
                        "username": account.username,
                        "apiKey": api_key,
                    }
                }
            }));
        }
        if let Some(password) = &account.password {
            let mut auth = json!({
                "passwordCredentials": {
                    "username": account.username,
                    "password": password,
                }
            });
            if let Some(tenant) = &account.tenant_id {
                auth["tenantId"] = json!(tenant);
            }
            return Ok(json!({ "auth": auth }));
        }
        Err(FleetError::config(
            "account needs either an api_key or a password",
        ))
    }

    async fn issue_token(&self) -> Result<(String, String)> {
        let url = format!("{}/tokens", self.env.account.auth_url.trim_end_matches('/'));
        debug!("Requesting token from {}", url);

        let response = self.http.post(&url).json(&self.auth_body()?).send().await?;
        let response = expect_success(response).await?;
        let access: AccessResponse = response.json().await?;

        let endpoint = self.select_endpoint(&access.access.service_catalog)?;
        Ok((access.access.token.id, endpoint))
    }

    fn select_endpoint(&self, catalog: &[CatalogEntry]) -> Result<String> {
        let account = &self.env.account;

        // An explicit override bypasses the catalog; the tenant id is the
        // final path segment of the compute URL.
        if let Some(base) = &account.compute_endpoint {
            let base = base.trim_end_matches('/');
            return Ok(match &account.tenant_id {
                Some(tenant) => format!("{base}/{tenant}"),
                None => base.to_string(),
            });
        }

        let compute = catalog
            .iter()
            .find(|entry| entry.service_type == COMPUTE_SERVICE_TYPE)
            .ok_or_else(|| FleetError::config("no compute service in the catalog"))?;

        let endpoint = match &account.region {
            Some(region) => compute
                .endpoints
                .iter()
                .find(|e| e.region.as_deref() == Some(region))
                .ok_or_else(|| {
                    FleetError::config(format!("no compute endpoint in region '{region}'"))
                })?,
            None => compute
                .endpoints
                .first()
                .ok_or_else(|| FleetError::config("compute service has no endpoints"))?,
        };

        Ok(endpoint.public_url.trim_end_matches('/').to_string())
    }
}

#[async_trait]
impl SessionFactory for RestSessionFactory {
    async fn authenticate(&self) -> Result<Arc<dyn ComputeSession>> {
        let (token, endpoint) = self.issue_token().await?;
        debug!("Authenticated against {}", endpoint);
        let session: Arc<dyn ComputeSession> = Arc::new(RestSession {
            http: self.http.clone(),
            token,
            endpoint,
            default_image_ref: self.env.account.default_image_ref.clone(),
            default_flavor_ref: self.env.account.default_flavor_ref.clone(),
            build_timeout: self.env.run.build_timeout(),
            poll_interval: self.env.run.poll_interval(),
        });
        Ok(session)
    }
}

/// One authenticated REST conversation with the compute API
pub struct RestSession {
    http: reqwest::Client,
    token: String,
    endpoint: String,
    default_image_ref: Option<String>,
    default_flavor_ref: Option<String>,
    build_timeout: Duration,
    poll_interval: Duration,
}

impl RestSession {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .header("X-Auth-Token", &self.token)
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(path))
            .header("X-Auth-Token", &self.token)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ComputeSession for RestSession {
    async fn list_images(&self) -> Result<Vec<Image>> {
        let wire: ImagesResponse = self.get_json("/images/detail").await?;
        Ok(wire.images)
    }

    async fn list_flavors(&self) -> Result<Vec<Flavor>> {
        let wire: FlavorsResponse = self.get_json("/flavors/detail").await?;
        Ok(wire.flavors)
    }

    async fn create_server(&self, req: &CreateServerRequest) -> Result<CreatedServer> {
        let image_ref = req
            .image_ref
            .as_deref()
            .or(self.default_image_ref.as_deref())
            .ok_or_else(|| FleetError::config("no image requested and no default configured"))?;
        let flavor_ref = req
            .flavor_ref
            .as_deref()
            .or(self.default_flavor_ref.as_deref())
            .ok_or_else(|| FleetError::config("no flavor requested and no default configured"))?;

        let mut server = json!({
            "name": req.name,
            "imageRef": image_ref,
            "flavorRef": flavor_ref,
        });
        if let Some(key_name) = &req.key_name {
            server["key_name"] = json!(key_name);
        }

        debug!("Creating server '{}' ({} / {})", req.name, image_ref, flavor_ref);
        let response = self
            .http
            .post(self.url("/servers"))
            .header("X-Auth-Token", &self.token)
            .json(&json!({ "server": server }))
            .send()
            .await?;
        let wire: ServerEnvelope<CreatedServer> = expect_success(response).await?.json().await?;
        Ok(wire.server)
    }

    async fn wait_for_build(&self, server_id: &str) -> Result<()> {
        let start = Instant::now();
        loop {
            let detail = self.get_server(server_id).await?;
            match detail.status {
                ServerStatus::Active => {
                    debug!("Server {} is active", server_id);
                    return Ok(());
                }
                ServerStatus::Error => {
                    let message = detail
                        .fault
                        .map(|f| f.message)
                        .unwrap_or_else(|| "server entered ERROR state".to_string());
                    return Err(FleetError::BuildFailed(message));
                }
                _ => {}
            }

            if start.elapsed() >= self.build_timeout {
                warn!(
                    "Server {} still not built after {:?}",
                    server_id, self.build_timeout
                );
                return Err(FleetError::Timeout(self.build_timeout));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn get_server(&self, server_id: &str) -> Result<ServerDetail> {
        let wire: ServerEnvelope<WireServer> =
            self.get_json(&format!("/servers/{server_id}")).await?;
        Ok(wire.server.into())
    }

    async fn delete_server(&self, server_id: &str) -> Result<()> {
        self.delete(&format!("/servers/{server_id}")).await
    }

    async fn list_servers(&self) -> Result<Vec<ServerSummary>> {
        let wire: ServersResponse = self.get_json("/servers").await?;
        Ok(wire.servers)
    }

    async fn list_keypairs(&self) -> Result<Vec<Keypair>> {
        let wire: KeypairsResponse = self.get_json("/os-keypairs").await?;
        Ok(wire.keypairs.into_iter().map(|item| item.keypair).collect())
    }

    async fn delete_keypair(&self, name: &str) -> Result<()> {
        self.delete(&format!("/os-keypairs/{name}")).await
    }

    async fn list_snapshots(&self) -> Result<Vec<Image>> {
        let wire: ImagesResponse = self.get_json("/images/detail?type=snapshot").await?;
        Ok(wire.images)
    }

    async fn delete_image(&self, image_id: &str) -> Result<()> {
        self.delete(&format!("/images/{image_id}")).await
    }

    async fn list_networks(&self) -> Result<Vec<Network>> {
        let wire: NetworksResponse = self.get_json("/os-networksv2").await?;
        Ok(wire.networks)
    }

    async fn delete_network(&self, network_id: &str) -> Result<()> {
        self.delete(&format!("/os-networksv2/{network_id}")).await
    }
}

async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(FleetError::api(status.as_u16(), message))
}

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AccessResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogEndpoint {
    #[serde(default)]
    region: Option<String>,
    #[serde(rename = "publicURL")]
    public_url: String,
}

#[derive(Debug, Deserialize)]
struct ServerEnvelope<T> {
    server: T,
}

#[derive(Debug, Deserialize)]
struct WireServer {
    id: String,
    status: String,
    #[serde(default)]
    fault: Option<WireFault>,
}

#[derive(Debug, Deserialize)]
struct WireFault {
    message: String,
}

impl From<WireServer> for ServerDetail {
    fn from(wire: WireServer) -> Self {
        Self {
            id: wire.id,
            status: ServerStatus::parse(&wire.status),
            fault: wire.fault.map(|f| ServerFault { message: f.message }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServersResponse {
    servers: Vec<ServerSummary>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct FlavorsResponse {
    flavors: Vec<Flavor>,
}

#[derive(Debug, Deserialize)]
struct KeypairsResponse {
    keypairs: Vec<KeypairItem>,
}

// Keypair listings nest each entry one level down.
#[derive(Debug, Deserialize)]
struct KeypairItem {
    keypair: Keypair,
}

#[derive(Debug, Deserialize)]
struct NetworksResponse {
    networks: Vec<Network>,
}
