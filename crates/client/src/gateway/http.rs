use async_trait::async_trait;
use reqwest::{header::HeaderMap, header::HeaderValue, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{Gateway, Operation, TypedResponse};
use crate::error::DatastoreError;

/// Connection settings for a remote backend.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub endpoint: Url,
    /// Bearer token presented on every request, when the backend wants one
    pub session: Option<String>,
}

impl GatewayConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            session: None,
        }
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }
}

/// JSON-over-HTTP gateway to a remote backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    endpoint: Url,
    client: Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, DatastoreError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        if let Some(session) = &config.session {
            let value = HeaderValue::from_str(&format!("Bearer {}", session)).map_err(|_| {
                DatastoreError::InvalidRequest(
                    "session token is not a valid header value".to_string(),
                )
            })?;
            default_headers.insert("Authorization", value);
        }
        let client = Client::builder().default_headers(default_headers).build()?;

        Ok(Self {
            endpoint: config.endpoint,
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, path: &str) -> Result<Url, DatastoreError> {
        Ok(self.endpoint.join(path)?)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn submit(&self, operation: Operation) -> Result<TypedResponse, DatastoreError> {
        let verb = operation.verb();
        debug!(verb, datastore_id = %operation.datastore_id(), "submitting operation");

        match operation {
            Operation::Create(bundle) => {
                let url = self.url("/api/v0/datastores")?;
                let response = self.client.post(url).json(&bundle).send().await?;
                Ok(TypedResponse::Ack(handle_response(verb, response).await?))
            }
            Operation::FetchDescriptor { datastore_id } => {
                let url = self.url(&format!("/api/v0/datastores/{}", datastore_id))?;
                let response = self.client.get(url).send().await?;
                Ok(TypedResponse::Descriptor(
                    handle_response(verb, response).await?,
                ))
            }
            Operation::FetchInode {
                datastore_id,
                uuid,
                extended,
            } => {
                let url = self.url(&format!(
                    "/api/v0/datastores/{}/inodes/{}?extended={}",
                    datastore_id, uuid, extended
                ))?;
                let response = self.client.get(url).send().await?;
                Ok(TypedResponse::Inode(handle_response(verb, response).await?))
            }
            Operation::FetchFile {
                datastore_id,
                uuid,
                extended,
            } => {
                let url = self.url(&format!(
                    "/api/v0/datastores/{}/files/{}?extended={}",
                    datastore_id, uuid, extended
                ))?;
                let response = self.client.get(url).send().await?;
                Ok(TypedResponse::File(handle_response(verb, response).await?))
            }
            Operation::Mutate(mutation) => {
                mutation.validate_shape()?;
                let url = self.url(&format!(
                    "/api/v0/datastores/{}/mutations",
                    mutation.datastore_id
                ))?;
                let response = self.client.post(url).json(&mutation).send().await?;
                Ok(TypedResponse::Ack(handle_response(verb, response).await?))
            }
            Operation::DeleteDatastore(bundle) => {
                let url = self.url(&format!("/api/v0/datastores/{}", bundle.datastore_id))?;
                let response = self.client.delete(url).json(&bundle).send().await?;
                Ok(TypedResponse::Ack(handle_response(verb, response).await?))
            }
        }
    }
}

/// Error shape every backend failure is expected to use.
#[derive(Debug, Clone, Deserialize)]
struct WireError {
    code: String,
    message: String,
}

/// Parse a response body against the expected schema, falling back to the
/// generic error schema. A body matching neither is a schema mismatch,
/// which callers treat as fatal for the operation.
async fn handle_response<T: DeserializeOwned>(
    verb: &str,
    response: reqwest::Response,
) -> Result<T, DatastoreError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        match serde_json::from_str::<T>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(typed_err) => match serde_json::from_str::<WireError>(&body) {
                Ok(wire) => Err(map_wire_error(status, wire)),
                Err(_) => Err(DatastoreError::SchemaMismatch {
                    verb: verb.to_string(),
                    detail: typed_err.to_string(),
                }),
            },
        }
    } else {
        match serde_json::from_str::<WireError>(&body) {
            Ok(wire) => Err(map_wire_error(status, wire)),
            Err(_) => Err(map_status(status, &body)),
        }
    }
}

fn map_wire_error(status: StatusCode, wire: WireError) -> DatastoreError {
    match wire.code.as_str() {
        "not_found" => DatastoreError::NotFound(wire.message),
        "access_denied" => DatastoreError::AccessDenied(wire.message),
        "invalid_request" => DatastoreError::InvalidRequest(wire.message),
        "remote_io_error" => DatastoreError::RemoteIo(wire.message),
        "exists" => DatastoreError::Exists(wire.message),
        "not_a_directory" => DatastoreError::NotADirectory(wire.message),
        "stale_version" => DatastoreError::StaleVersion(wire.message),
        _ => map_status(status, &wire.message),
    }
}

fn map_status(status: StatusCode, body: &str) -> DatastoreError {
    match status {
        StatusCode::NOT_FOUND => DatastoreError::NotFound(body.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DatastoreError::AccessDenied(body.to_string())
        }
        StatusCode::CONFLICT => DatastoreError::Exists(body.to_string()),
        StatusCode::BAD_REQUEST => DatastoreError::InvalidRequest(body.to_string()),
        _ => DatastoreError::RemoteIo(format!("HTTP {}: {}", status, body)),
    }
}
