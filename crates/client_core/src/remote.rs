//! Directory service access: the transport-agnostic trait the controllers use
//! and its reqwest implementation.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Patient, PatientId},
    error::ApiError,
    protocol::{Ack, LinkPatientRequest},
};
use tracing::{debug, warn};
use url::Url;

use crate::error::RemoteError;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000/api/doctor-patient";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const SEARCH_FAILED: &str = "Failed to fetch patients";
const LIST_FAILED: &str = "Failed to fetch doctor patients";
const ADD_FAILED: &str = "Failed to add patient";
const REMOVE_FAILED: &str = "Failed to remove patient";

#[async_trait]
pub trait RemoteDirectoryClient: Send + Sync {
    /// Patients matching `query`, in the service's relevance order.
    async fn search(&self, query: &str) -> Result<Vec<Patient>, RemoteError>;
    async fn list_linked(&self) -> Result<Vec<Patient>, RemoteError>;
    async fn add_linked(&self, patient_id: &PatientId) -> Result<Ack, RemoteError>;
    async fn remove_linked(&self, patient_id: &PatientId) -> Result<Ack, RemoteError>;
}

#[derive(Debug, Clone)]
pub struct DirectoryClientConfig {
    pub server_url: String,
    /// Opaque bearer credential, sent as-is.
    pub credential: Option<String>,
    pub request_timeout: Duration,
}

impl Default for DirectoryClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            credential: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct HttpDirectoryClient {
    http: Client,
    server_url: Url,
    credential: Option<String>,
}

impl HttpDirectoryClient {
    pub fn new(config: DirectoryClientConfig) -> Result<Self> {
        let server_url = Url::parse(config.server_url.trim())
            .with_context(|| format!("invalid directory server url '{}'", config.server_url))?;
        if server_url.cannot_be_a_base() {
            return Err(anyhow!(
                "directory server url '{server_url}' cannot carry request paths"
            ));
        }

        let http = Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()
            .context("failed to build directory http client")?;

        Ok(Self {
            http,
            server_url,
            credential: config
                .credential
                .filter(|credential| !credential.trim().is_empty()),
        })
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.server_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.credential {
            Some(credential) => builder.bearer_auth(credential),
            None => builder,
        }
    }

    async fn send(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
        fallback: &'static str,
    ) -> Result<Response, RemoteError> {
        debug!(operation, "sending directory request");
        let response = builder.send().await.map_err(|err| {
            warn!(operation, error = %err, "directory request did not complete");
            RemoteError::transport(format!("{fallback}: {err}"))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let api_error: ApiError = serde_json::from_slice(&body).unwrap_or_default();
        let err = RemoteError::from_status(status.as_u16(), api_error.message_or(fallback));
        warn!(
            operation,
            status = status.as_u16(),
            message = %err.message,
            "directory request rejected"
        );
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
        fallback: &'static str,
    ) -> Result<T, RemoteError> {
        let response = self.send(operation, builder, fallback).await?;
        let status = response.status().as_u16();
        response.json::<T>().await.map_err(|err| {
            warn!(operation, error = %err, "directory response body was not understood");
            RemoteError {
                status: Some(status),
                ..RemoteError::transport(format!("{fallback}: {err}"))
            }
        })
    }

    async fn send_ack(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
        fallback: &'static str,
    ) -> Result<Ack, RemoteError> {
        let response = self.send(operation, builder, fallback).await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| RemoteError::transport(format!("{fallback}: {err}")))?;
        if body.is_empty() {
            return Ok(Ack::default());
        }
        Ok(serde_json::from_slice::<serde_json::Value>(&body)
            .map(|value| Ack::from_value(&value))
            .unwrap_or_default())
    }
}

#[async_trait]
impl RemoteDirectoryClient for HttpDirectoryClient {
    async fn search(&self, query: &str) -> Result<Vec<Patient>, RemoteError> {
        let builder = self
            .request(Method::GET, self.endpoint(&["patients", "search"]))
            .query(&[("query", query)]);
        self.send_json("search", builder, SEARCH_FAILED).await
    }

    async fn list_linked(&self) -> Result<Vec<Patient>, RemoteError> {
        let builder = self.request(Method::GET, self.endpoint(&["doctor", "patients"]));
        self.send_json("list_linked", builder, LIST_FAILED).await
    }

    async fn add_linked(&self, patient_id: &PatientId) -> Result<Ack, RemoteError> {
        let builder = self
            .request(Method::POST, self.endpoint(&["doctor", "patients"]))
            .json(&LinkPatientRequest {
                patient_id: patient_id.clone(),
            });
        self.send_ack("add_linked", builder, ADD_FAILED).await
    }

    async fn remove_linked(&self, patient_id: &PatientId) -> Result<Ack, RemoteError> {
        let url = self.endpoint(&["doctor", "patients", patient_id.as_str()]);
        let builder = self.request(Method::DELETE, url);
        self.send_ack("remove_linked", builder, REMOVE_FAILED).await
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
