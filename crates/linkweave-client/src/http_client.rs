use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use linkweave_core::{ClientError, ClientErrorKind, CreationClient, Record, ServerIri, Value};

use crate::config::HttpClientConfig;

/// Creation client talking to the repository's REST API
#[derive(Debug, Clone)]
pub struct HttpCreationClient {
    config: HttpClientConfig,
    client: Client,
}

/// Request payload for record creation
#[derive(Debug, Serialize)]
struct CreateResourceRequest<'a> {
    #[serde(rename = "@type")]
    class: &'a str,
    #[serde(rename = "rdfs:label")]
    label: &'a str,
    values: &'a [Value],
}

/// Request payload for attaching a value to an existing record
#[derive(Debug, Serialize)]
struct CreateValueRequest<'a> {
    #[serde(rename = "@id")]
    resource: &'a str,
    value: &'a Value,
}

/// Response to a record creation
#[derive(Debug, Deserialize)]
struct CreateResourceResponse {
    #[serde(rename = "@id")]
    id: String,
}

impl HttpCreationClient {
    /// Creates a new client with the provided configuration
    pub fn new(config: HttpClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::new(ClientErrorKind::Unexpected, format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Creates a new client for the given server URL and timeout
    pub fn with_url_and_timeout(server_url: impl Into<String>, timeout_secs: u64) -> Result<Self, ClientError> {
        Self::new(HttpClientConfig {
            server_url: server_url.into(),
            timeout_secs,
            token: None,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.config.server_url.trim_end_matches('/'), route)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Maps a transport error to a ClientError
    fn map_http_error(error: reqwest::Error) -> ClientError {
        if error.is_timeout() {
            ClientError::new(ClientErrorKind::Timeout, format!("Request timeout: {error}"))
        } else if error.is_connect() {
            ClientError::new(ClientErrorKind::Connection, format!("Connection error: {error}"))
        } else {
            ClientError::new(ClientErrorKind::Unexpected, format!("HTTP error: {error}"))
        }
    }

    /// Send a request and turn non-success responses into classified errors
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(Self::map_http_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_response(status.as_u16(), &body))
    }
}

#[async_trait]
impl CreationClient for HttpCreationClient {
    #[instrument(skip(self, record), fields(local_id = %record.local_id))]
    async fn create(&self, record: &Record) -> Result<ServerIri, ClientError> {
        debug!("Creating record of class {}", record.class);

        let payload = CreateResourceRequest {
            class: &record.class,
            label: &record.label,
            values: &record.values,
        };
        let response = self
            .send(self.client.post(self.url("/v2/resources")).json(&payload))
            .await?;

        let created: CreateResourceResponse = response.json().await.map_err(|e| {
            ClientError::new(ClientErrorKind::Unexpected, format!("Invalid creation response: {e}"))
        })?;
        Ok(ServerIri(created.id))
    }

    #[instrument(skip(self, value), fields(value_id = %value.id))]
    async fn patch(&self, iri: &ServerIri, value: &Value) -> Result<(), ClientError> {
        debug!("Adding value to {}", iri);

        let payload = CreateValueRequest {
            resource: iri.as_str(),
            value,
        };
        self.send(self.client.post(self.url("/v2/values")).json(&payload))
            .await?;
        Ok(())
    }
}
