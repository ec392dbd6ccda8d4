//! Google service-account authentication.
//!
//! Signs an RS256 JWT assertion with the service account's private key and
//! exchanges it at the OAuth token endpoint for a short-lived access token.
//! The token is cached until shortly before it expires. The cache is keyed by
//! service account, so rebuilt providers reuse a still-valid token.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use lazy_static::lazy_static;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::errors::FetchError;
use crate::provider::http::send_json;

const ANALYTICS_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each signed assertion.
const ASSERTION_TTL_SECS: i64 = 3600;

/// Tokens this close to expiry are refreshed rather than reused.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The fields we need from a service-account key file.
#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_TTL_SECS as u64
}

type TokenSlot = Arc<Mutex<Option<CachedToken>>>;

lazy_static! {
    static ref TOKEN_CACHE: StdMutex<HashMap<String, TokenSlot>> = StdMutex::new(HashMap::new());
}

/// The process-wide token slot for one account at one token endpoint.
fn shared_token_slot(client_email: &str, token_uri: &str) -> TokenSlot {
    let mut slots = TOKEN_CACHE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    slots
        .entry(format!("{}|{}", client_email, token_uri))
        .or_default()
        .clone()
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }
}

/// Access-token source for one service account.
pub(crate) struct ServiceAccountAuth {
    provider: &'static str,
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    cached: TokenSlot,
}

impl ServiceAccountAuth {
    /// Parses a service-account key file given as a JSON string.
    pub(crate) fn from_json(provider: &'static str, json: &str) -> Result<Self, FetchError> {
        let config_error = |message: String| FetchError::Config {
            provider: provider.to_string(),
            message,
        };

        let key: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| config_error(format!("Invalid service account key JSON: {}", e)))?;

        if key.client_email.trim().is_empty() {
            return Err(config_error(
                "Service account key has no client_email".to_string(),
            ));
        }

        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| config_error(format!("Invalid service account private key: {}", e)))?;

        let token_uri = key
            .token_uri
            .filter(|uri| !uri.is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        Ok(Self {
            provider,
            cached: shared_token_slot(&key.client_email, &token_uri),
            client_email: key.client_email,
            token_uri,
            signing_key,
        })
    }

    /// Returns a valid access token, refreshing it when needed.
    pub(crate) async fn access_token(&self, client: &Client) -> Result<String, FetchError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Instant::now()) {
                return Ok(token.token.clone());
            }
        }

        debug!(provider = self.provider, "Requesting new GA4 access token");
        let assertion = self.sign_assertion(Utc::now())?;
        let request = client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())]);
        let response: TokenResponse = send_json(self.provider, request).await?;

        let token = response.access_token.clone();
        *cached = Some(CachedToken {
            token: response.access_token,
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        });
        Ok(token)
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, FetchError> {
        let issued_at = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: ANALYTICS_SCOPE,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_TTL_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key).map_err(|e| {
            FetchError::Auth {
                provider: self.provider.to_string(),
                message: format!("Failed to sign service account assertion: {}", e),
            }
        })
    }
}
