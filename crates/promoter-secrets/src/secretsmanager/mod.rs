//! AWS Secrets Manager adapter.
//!
//! Speaks the service's JSON 1.1 protocol over `reqwest`, signing each
//! request with SigV4. Documents are addressed by secret name; there is no
//! engine.
//!
//! A secret whose string parses as a JSON object is a structured document.
//! Any other string is returned as an unstructured document under
//! [`SCALAR_KEY`](crate::SCALAR_KEY). Binary secrets are not supported.

mod sigv4;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub use sigv4::AwsCredentials;

use self::sigv4::{amz_date, sha256_hex, CanonicalRequest, Signer};
use crate::error::StoreError;
use crate::traits::SecretStore;
use crate::types::{BackendKind, KeyValueDocument, StoreFamily};

const SERVICE: &str = "secretsmanager";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    secret_string: Option<String>,
    secret_binary: Option<String>,
}

#[derive(Deserialize, Default)]
struct AwsErrorBody {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
}

/// Adapter for Secrets Manager in one region.
pub struct SecretsManagerStore {
    client: Client,
    region: String,
    endpoint: Url,
    host: String,
    credentials: AwsCredentials,
}

impl SecretsManagerStore {
    /// Creates an adapter for the public regional endpoint.
    pub fn new(region: impl Into<String>, credentials: AwsCredentials) -> Result<Self, StoreError> {
        let region = region.into();
        let endpoint = format!("https://{SERVICE}.{region}.amazonaws.com/");
        Self::with_endpoint(region, &endpoint, credentials)
    }

    /// Creates an adapter for a custom endpoint (VPC endpoint, local emulator).
    pub fn with_endpoint(
        region: impl Into<String>,
        endpoint: &str,
        credentials: AwsCredentials,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let endpoint = Url::parse(endpoint)
            .map_err(|e| StoreError::Configuration(format!("invalid endpoint {endpoint}: {e}")))?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_owned(),
            (None, _) => {
                return Err(StoreError::Configuration(format!(
                    "endpoint {endpoint} has no host"
                )))
            }
        };

        Ok(Self {
            client,
            region: region.into(),
            endpoint,
            host,
            credentials,
        })
    }

    /// Returns the region this adapter talks to.
    pub fn region(&self) -> &str {
        &self.region
    }

    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        body: &serde_json::Value,
        secret: &str,
    ) -> Result<T, StoreError> {
        let payload = serde_json::to_vec(body)?;
        let now = Utc::now();

        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_owned(), CONTENT_TYPE.to_owned());
        headers.insert("host".to_owned(), self.host.clone());
        headers.insert("x-amz-date".to_owned(), amz_date(now));
        headers.insert("x-amz-target".to_owned(), format!("secretsmanager.{action}"));
        if let Some(token) = self.credentials.session_token() {
            headers.insert("x-amz-security-token".to_owned(), token.to_owned());
        }

        let request = CanonicalRequest {
            method: "POST",
            path: self.endpoint.path(),
            query: "",
            headers,
            payload_hash: sha256_hex(&payload),
        };
        let signer = Signer {
            credentials: &self.credentials,
            region: &self.region,
            service: SERVICE,
        };
        let authorization = signer.authorization(&request, now)?;

        let mut builder = self.client.post(self.endpoint.clone());
        for (name, value) in &request.headers {
            // reqwest derives Host from the URL.
            if name != "host" {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        debug!(
            store.kind = "awssecretsmanager",
            aws.action = action,
            store.path = secret,
            "Calling Secrets Manager"
        );
        let response = builder
            .header(reqwest::header::AUTHORIZATION, authorization)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error: AwsErrorBody = response.json().await.unwrap_or_default();
        Err(map_error(status, &error, secret))
    }

    async fn create(&self, name: &str, payload: &str, token: &str) -> Result<(), StoreError> {
        let _: serde_json::Value = self
            .call(
                "CreateSecret",
                &json!({ "Name": name, "SecretString": payload, "ClientRequestToken": token }),
                name,
            )
            .await?;
        Ok(())
    }

    async fn put(&self, name: &str, payload: &str, token: &str) -> Result<(), StoreError> {
        let _: serde_json::Value = self
            .call(
                "PutSecretValue",
                &json!({ "SecretId": name, "SecretString": payload, "ClientRequestToken": token }),
                name,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    fn kind(&self) -> BackendKind {
        BackendKind::SecretsManager
    }

    fn family(&self) -> StoreFamily {
        StoreFamily::Flat
    }

    fn instance_id(&self) -> &str {
        self.endpoint.as_str()
    }

    fn engine(&self) -> Option<&str> {
        None
    }

    #[instrument(skip(self), fields(store.region = %self.region))]
    async fn fetch(&self, path: &str) -> Result<KeyValueDocument, StoreError> {
        let response: GetSecretValueResponse = self
            .call("GetSecretValue", &json!({ "SecretId": path }), path)
            .await?;

        match (response.secret_string, response.secret_binary) {
            (Some(text), _) => Ok(parse_secret_string(text)),
            (None, Some(_)) => Err(StoreError::NotSupported(format!(
                "secret {path} holds binary data"
            ))),
            (None, None) => Err(StoreError::Serialisation(format!(
                "secret {path} has no value"
            ))),
        }
    }

    #[instrument(skip(self, document), fields(store.region = %self.region))]
    async fn write(
        &self,
        path: &str,
        document: &KeyValueDocument,
        overwrite_existing: bool,
    ) -> Result<(), StoreError> {
        let payload = if document.is_structured() {
            serde_json::to_string(&document.to_json_object())?
        } else {
            document
                .scalar_value()
                .map(|v| v.expose().to_owned())
                .unwrap_or_default()
        };
        // One token per write call: retries inside the call are idempotent,
        // later writes of an earlier value still create a new version.
        let token = Uuid::new_v4().to_string();

        if overwrite_existing {
            match self.put(path, &payload, &token).await {
                Err(StoreError::NotFound { .. }) => self.create(path, &payload, &token).await?,
                other => other?,
            }
        } else {
            self.create(path, &payload, &token).await?;
        }

        info!(
            store.kind = "awssecretsmanager",
            store.path = path,
            store.keys = document.len(),
            store.operation = "write",
            "Secret stored"
        );
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        match self
            .call::<serde_json::Value>("DescribeSecret", &json!({ "SecretId": path }), path)
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.is_absent() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for SecretsManagerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsManagerStore")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint.as_str())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

fn parse_secret_string(text: String) -> KeyValueDocument {
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value @ serde_json::Value::Object(_)) => KeyValueDocument::from_json_object(&value)
            .unwrap_or_else(|| KeyValueDocument::scalar(text)),
        _ => KeyValueDocument::scalar(text),
    }
}

fn map_error(status: StatusCode, error: &AwsErrorBody, secret: &str) -> StoreError {
    // "__type" may be namespaced: "com.amazonaws.secretsmanager#ResourceNotFoundException".
    let kind = error.kind.rsplit('#').next().unwrap_or_default();

    match kind {
        "ResourceNotFoundException" => StoreError::not_found(secret),
        "ResourceExistsException" => StoreError::AlreadyExists {
            path: secret.to_owned(),
        },
        "UnrecognizedClientException"
        | "InvalidSignatureException"
        | "IncompleteSignature"
        | "MissingAuthenticationToken"
        | "ExpiredTokenException"
        | "AccessDeniedException" => StoreError::Unauthenticated(format!(
            "secrets manager rejected credentials for {secret}: {kind}: {}",
            error.message
        )),
        _ if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => {
            StoreError::Unauthenticated(format!(
                "secrets manager returned {status} for {secret}: {}",
                error.message
            ))
        }
        _ => StoreError::Transport(format!(
            "secrets manager returned {status} for {secret}: {kind}: {}",
            error.message
        )),
    }
}
