use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use pxb_core::{ClusterContext, ResourceDescriptor, ResourceKind};
use pxb_providers::ResourceProvider;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::models::{to_descriptor, Envelope, GuestEntry, NodeEntry, TicketData};

#[derive(Clone, Debug)]
pub struct ProxmoxSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub token_name: Option<String>,
    pub token_value: Option<String>,
    pub verify_ssl: bool,
    pub timeout_secs: u64,
}

enum Auth {
    /// Pre-rendered `Authorization` header value.
    Token(String),
    /// Ticket login, performed lazily and repeated when the ticket is rejected.
    Password {
        password: String,
        ticket: Mutex<Option<TicketData>>,
    },
}

/// Proxmox VE API client acting as the inventory source.
pub struct ProxmoxClient {
    http: Client,
    base_url: String,
    user: String,
    auth: Auth,
}

pub fn token_header(user: &str, token_name: &str, token_value: &str) -> String {
    format!("PVEAPIToken={user}!{token_name}={token_value}")
}

impl ProxmoxClient {
    pub fn new(settings: &ProxmoxSettings) -> Result<Self> {
        let auth = match (&settings.token_name, &settings.token_value, &settings.password) {
            (Some(name), Some(value), _) => Auth::Token(token_header(&settings.user, name, value)),
            (_, _, Some(password)) => Auth::Password {
                password: password.clone(),
                ticket: Mutex::new(None),
            },
            _ => bail!("proxmox credentials missing: configure token_name/token_value or password"),
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .build()
            .context("build proxmox http client")?;

        Ok(Self {
            http,
            base_url: format!("https://{}:{}/api2/json", settings.host, settings.port),
            user: settings.user.clone(),
            auth,
        })
    }

    /// Point the client at a different API root, e.g. a local mock.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn login(&self, password: &str) -> Result<TicketData> {
        let url = format!("{}/access/ticket", self.base_url);
        debug!(user = %self.user, "requesting proxmox ticket");
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "username": self.user, "password": password }))
            .send()
            .await
            .context("proxmox ticket request")?
            .error_for_status()
            .context("proxmox ticket rejected")?
            .json::<Envelope<TicketData>>()
            .await
            .context("decode proxmox ticket")?;
        Ok(resp.data)
    }

    async fn authorize(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.auth {
            Auth::Token(header) => Ok(req.header("Authorization", header)),
            Auth::Password { password, ticket } => {
                let mut guard = ticket.lock().await;
                if guard.is_none() {
                    *guard = Some(self.login(password).await?);
                }
                let t = guard.as_ref().ok_or_else(|| anyhow!("proxmox ticket missing after login"))?;
                Ok(req
                    .header("Cookie", format!("PVEAuthCookie={}", t.ticket))
                    .header("CSRFPreventionToken", &t.csrf_token))
            }
        }
    }

    async fn forget_ticket(&self) {
        if let Auth::Password { ticket, .. } = &self.auth {
            ticket.lock().await.take();
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut retried = false;
        loop {
            let req = self.authorize(self.http.get(&url)).await?;
            let resp = req.send().await.with_context(|| format!("GET {path}"))?;
            if resp.status() == StatusCode::UNAUTHORIZED && !retried && matches!(self.auth, Auth::Password { .. }) {
                // ticket expired, log in again once
                self.forget_ticket().await;
                retried = true;
                continue;
            }
            let body = resp
                .error_for_status()
                .with_context(|| format!("GET {path}"))?
                .json::<Envelope<T>>()
                .await
                .with_context(|| format!("decode {path}"))?;
            return Ok(body.data);
        }
    }

    async fn list_guests(&self, node: &str, kind: ResourceKind) -> Result<Vec<GuestEntry>> {
        self.get(&format!("/nodes/{node}/{}", kind.as_str())).await
    }

    async fn guest_config(&self, node: &str, kind: ResourceKind, vmid: &str) -> Result<Value> {
        self.get(&format!("/nodes/{node}/{}/{vmid}/config", kind.as_str())).await
    }
}

#[async_trait]
impl ResourceProvider for ProxmoxClient {
    async fn list_nodes(&self) -> Result<Vec<String>> {
        let nodes: Vec<NodeEntry> = self.get("/nodes").await.context("list proxmox nodes")?;
        Ok(nodes.into_iter().map(|n| n.node).collect())
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>> {
        let nodes = self.list_nodes().await?;
        let mut out = vec![];
        for node in &nodes {
            for kind in [ResourceKind::Vm, ResourceKind::Container] {
                let guests = match self.list_guests(node, kind).await {
                    Ok(g) => g,
                    Err(e) => {
                        error!(node = %node, kind = kind.as_str(), error = %format!("{e:#}"), "guest listing failed, skipping");
                        continue;
                    }
                };
                for guest in guests {
                    let vmid = guest.vmid.to_string();
                    let config = match self.guest_config(node, kind, &vmid).await {
                        Ok(c) => c,
                        Err(e) => {
                            warn!(node = %node, vmid = %vmid, error = %format!("{e:#}"), "config fetch failed, using empty config");
                            json!({})
                        }
                    };
                    out.push(to_descriptor(node, kind, guest, config));
                }
            }
        }
        debug!(nodes = nodes.len(), resources = out.len(), "inventory fetched");
        Ok(out)
    }

    async fn cluster_context(&self) -> Result<ClusterContext> {
        let status: Value = self.get("/cluster/status").await.context("read cluster status")?;
        let resources: Value = self.get("/cluster/resources").await.context("read cluster resources")?;
        let nodes = self.list_nodes().await?;
        Ok(ClusterContext { status, resources, nodes })
    }
}
