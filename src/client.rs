//! HTTP client for the `slurm-provisioner` REST namespace.
//!
//! All requests go to `<server url>/slurm-provisioner/<endpoint>`. Failures are
//! classified as transport errors (`Network`), non-2xx replies (`Response`,
//! carrying the server's `message` or the raw body) and bodies that are JSON
//! but not the expected shape (`Decode`). A 2xx body that is not JSON at all
//! is logged and treated as an empty catalog.

use std::future::Future;
use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::models::{KernelConfig, OptionCatalog, ServerConfig};

/// REST namespace of the provisioner extension.
pub const API_NAMESPACE: &str = "slurm-provisioner";

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("server returned {status}: {message}")]
    Response { status: StatusCode, message: String },

    /// The body was JSON but not the expected shape
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Which view of the system state to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Full cluster view: option lists, resources and all allocations
    All,
    /// Only the current configuration and allocations touching this session
    Local,
    /// The provisioner's default endpoint
    #[default]
    Default,
}

impl Scope {
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Local => "local",
            Self::Default => "configure",
        }
    }
}

/// Operations the UI needs from the provisioner.
pub trait ProvisionerApi: Send + Sync + 'static {
    /// Fetch the option catalog for `scope`.
    fn fetch_options(
        &self,
        scope: Scope,
    ) -> impl Future<Output = Result<OptionCatalog, ApiError>> + Send;

    /// Store `config` as the Slurm kernel's configuration.
    fn submit_config(
        &self,
        config: &KernelConfig,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Ask the provisioner to cancel an allocation.
    fn cancel_allocation(&self, id: &str) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// reqwest-backed provisioner client.
#[derive(Debug, Clone)]
pub struct ProvisionerClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ProvisionerClient {
    pub fn new(config: &ServerConfig) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            http,
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_NAMESPACE, path)
    }

    /// Send a request and read the whole body, mapping non-2xx to `Response`.
    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let request = match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("token {token}")),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Response {
                status,
                message: error_message(&body),
            });
        }
        Ok(body)
    }
}

impl ProvisionerApi for ProvisionerClient {
    async fn fetch_options(&self, scope: Scope) -> Result<OptionCatalog, ApiError> {
        let url = self.endpoint(scope.endpoint());
        tracing::debug!(%url, "fetching option catalog");
        let body = self.send(self.http.get(&url)).await?;
        decode_catalog(&body)
    }

    async fn submit_config(&self, config: &KernelConfig) -> Result<(), ApiError> {
        let url = self.endpoint("configure");
        tracing::debug!(%url, jobid = %config.allocation, "submitting kernel configuration");
        self.send(self.http.post(&url).json(config)).await?;
        Ok(())
    }

    async fn cancel_allocation(&self, id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("allocations/{id}"));
        tracing::debug!(%url, "cancelling allocation");
        self.send(self.http.delete(&url)).await?;
        Ok(())
    }
}

impl<T: ProvisionerApi> ProvisionerApi for Arc<T> {
    fn fetch_options(
        &self,
        scope: Scope,
    ) -> impl Future<Output = Result<OptionCatalog, ApiError>> + Send {
        (**self).fetch_options(scope)
    }

    fn submit_config(
        &self,
        config: &KernelConfig,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        (**self).submit_config(config)
    }

    fn cancel_allocation(&self, id: &str) -> impl Future<Output = Result<(), ApiError>> + Send {
        (**self).cancel_allocation(id)
    }
}

/// Decode a 2xx catalog body.
///
/// An empty or non-JSON body is logged and yields the empty catalog.
pub fn decode_catalog(body: &str) -> Result<OptionCatalog, ApiError> {
    if body.trim().is_empty() {
        return Ok(OptionCatalog::default());
    }
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "not a JSON response body");
            return Ok(OptionCatalog::default());
        }
    };
    Ok(serde_json::from_value(value)?)
}

/// Error text of a failed response: its `message` field, else the raw body.
#[must_use]
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string())
}

/// Submit a configuration, logging instead of returning failures.
///
/// Returns whether the submission succeeded so callers can report it, but the
/// dialog flow treats every outcome as saved.
pub async fn submit_and_log<A: ProvisionerApi>(api: &A, config: &KernelConfig) -> bool {
    match api.submit_config(config).await {
        Ok(()) => {
            tracing::info!(jobid = %config.allocation, kernel = %config.kernel, "configuration saved");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "could not save slurm-provisioner configuration");
            false
        }
    }
}

/// Fire-and-forget allocation cancel.
///
/// Failures are logged; `on_done` sees the outcome once the request finishes.
pub fn spawn_cancel<A, F>(api: A, id: String, on_done: F) -> JoinHandle<()>
where
    A: ProvisionerApi,
    F: FnOnce(Result<(), ApiError>) + Send + 'static,
{
    tokio::spawn(async move {
        let result = api.cancel_allocation(&id).await;
        match &result {
            Ok(()) => tracing::info!(allocation = %id, "cancel requested"),
            Err(e) => tracing::error!(allocation = %id, error = %e, "could not cancel allocation"),
        }
        on_done(result);
    })
}
