//! AWS Signature Version 4 request signing.
//!
//! Only what the JSON protocol needs: a canonical request with sorted,
//! lowercase headers, an empty query string and a hashed body.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::error::StoreError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Static AWS credentials.
#[derive(Clone)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: SecretString,
    session_token: Option<SecretString>,
}

impl AwsCredentials {
    /// Creates long-term credentials.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: SecretString) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key,
            session_token: None,
        }
    }

    /// Attaches a session token from temporary credentials.
    #[must_use]
    pub fn with_session_token(mut self, token: SecretString) -> Self {
        self.session_token = Some(token);
        self
    }

    /// Returns the access key id.
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub(crate) fn session_token(&self) -> Option<&str> {
        self.session_token.as_ref().map(|t| t.expose_secret())
    }

    pub(crate) fn secret_access_key(&self) -> &str {
        self.secret_access_key.expose_secret()
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// The parts of an HTTP request covered by the signature.
#[derive(Debug)]
pub(crate) struct CanonicalRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    /// Lowercase header name to trimmed value.
    pub headers: BTreeMap<String, String>,
    pub payload_hash: String,
}

impl CanonicalRequest<'_> {
    pub fn signed_headers(&self) -> String {
        self.headers
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn canonical_string(&self) -> String {
        let headers: String = self
            .headers
            .iter()
            .map(|(name, value)| format!("{name}:{}\n", value.trim()))
            .collect();

        format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method,
            self.path,
            self.query,
            headers,
            self.signed_headers(),
            self.payload_hash
        )
    }
}

/// Signs requests for one service in one region.
pub(crate) struct Signer<'a> {
    pub credentials: &'a AwsCredentials,
    pub region: &'a str,
    pub service: &'a str,
}

impl Signer<'_> {
    fn scope(&self, now: DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}/aws4_request",
            now.format("%Y%m%d"),
            self.region,
            self.service
        )
    }

    /// Computes the hex signature of `request` at time `now`.
    pub fn signature(
        &self,
        request: &CanonicalRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        let string_to_sign = format!(
            "{ALGORITHM}\n{}\n{}\n{}",
            amz_date(now),
            self.scope(now),
            sha256_hex(request.canonical_string().as_bytes())
        );

        let secret = format!("AWS4{}", self.credentials.secret_access_key());
        let date_key = hmac_sha256(secret.as_bytes(), now.format("%Y%m%d").to_string().as_bytes())?;
        let region_key = hmac_sha256(&date_key, self.region.as_bytes())?;
        let service_key = hmac_sha256(&region_key, self.service.as_bytes())?;
        let signing_key = hmac_sha256(&service_key, b"aws4_request")?;

        Ok(hex::encode(hmac_sha256(
            &signing_key,
            string_to_sign.as_bytes(),
        )?))
    }

    /// Builds the `Authorization` header value for `request`.
    pub fn authorization(
        &self,
        request: &CanonicalRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        Ok(format!(
            "{ALGORITHM} Credential={}/{}, SignedHeaders={}, Signature={}",
            self.credentials.access_key_id(),
            self.scope(now),
            request.signed_headers(),
            self.signature(request, now)?
        ))
    }
}

/// Formats `now` as an `X-Amz-Date` value.
pub(crate) fn amz_date(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StoreError::Configuration(format!("invalid signing key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
