//! Bitwarden Secrets Manager credential provider.
//!
//! Fetches the InfluxDB credential document using the machine-account
//! access token stored in the `BWS_ACCESS_TOKEN` environment variable.
//!
//! Falls back to the plain environment variables `INFLUXDB_TOKEN`,
//! `INFLUXDB_ORG` and `INFLUXDB_BUCKET` when the access token is absent or
//! the fetch fails (useful for local development / CI).

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::Deserialize;

use crate::credentials::{CredentialProvider, Credentials};
use crate::error::{Error, Result};

/// Client for Bitwarden Secrets Manager.
pub struct SecretsClient {
    /// BWS machine-account access token.
    access_token: Option<String>,
    /// Base URL for the Bitwarden Secrets Manager API.
    api_url: String,
    /// Id of the secret holding the credential JSON document.
    secret_id: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct BwsSecretResponse {
    value: String,
}

impl SecretsClient {
    /// Create a new [`SecretsClient`] for `secret_id`.
    ///
    /// The access token is read from `BWS_ACCESS_TOKEN`. If the variable is
    /// absent the client goes straight to the environment fallback.
    pub fn new(secret_id: impl Into<String>) -> Self {
        let access_token = std::env::var("BWS_ACCESS_TOKEN").ok();
        let api_url = std::env::var("BWS_API_URL")
            .unwrap_or_else(|_| "https://api.bitwarden.com".to_string());

        Self {
            access_token,
            api_url,
            secret_id: secret_id.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn fetch_from_bitwarden(&self, token: &str) -> anyhow::Result<String> {
        let url = format!("{}/secrets/{}", self.api_url, self.secret_id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("HTTP request to Bitwarden Secrets Manager failed")?;

        if !resp.status().is_success() {
            return Err(anyhow!("Bitwarden API returned status {}", resp.status()));
        }

        let body: BwsSecretResponse = resp
            .json()
            .await
            .context("Failed to parse Bitwarden response")?;
        Ok(body.value)
    }
}

#[async_trait]
impl CredentialProvider for SecretsClient {
    /// Resolution order:
    /// 1. Bitwarden Secrets Manager (if `BWS_ACCESS_TOKEN` is set)
    /// 2. `INFLUXDB_TOKEN` / `INFLUXDB_ORG` / `INFLUXDB_BUCKET`
    async fn fetch(&self) -> Result<Credentials> {
        if let Some(token) = &self.access_token {
            match self.fetch_from_bitwarden(token).await {
                Ok(raw) => return Credentials::from_secret_payload(&raw),
                Err(e) => {
                    tracing::warn!(
                        secret_id = %self.secret_id,
                        error = %e,
                        "Failed to fetch secret from Bitwarden, falling back to env vars"
                    );
                }
            }
        }
        credentials_from_env(|key| std::env::var(key).ok())
    }
}

/// Build credentials from the three fallback variables.
fn credentials_from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
    let var = |key: &str| {
        lookup(key).filter(|v| !v.is_empty()).ok_or_else(|| {
            Error::CredentialUnavailable(format!(
                "secret not found in Bitwarden and env var '{key}' is not set"
            ))
        })
    };
    Ok(Credentials {
        token: var("INFLUXDB_TOKEN")?,
        org: var("INFLUXDB_ORG")?,
        bucket: var("INFLUXDB_BUCKET")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_fallback_reads_all_three_vars() {
        let env: HashMap<&str, &str> = [
            ("INFLUXDB_TOKEN", "tok"),
            ("INFLUXDB_ORG", "org"),
            ("INFLUXDB_BUCKET", "bucket"),
        ]
        .into_iter()
        .collect();
        let creds = credentials_from_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(creds.token, "tok");
        assert_eq!(creds.org, "org");
        assert_eq!(creds.bucket, "bucket");
    }

    #[test]
    fn env_fallback_names_the_missing_var() {
        let err = credentials_from_env(|k| (k == "INFLUXDB_TOKEN").then(|| "tok".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::CredentialUnavailable(ref m) if m.contains("INFLUXDB_ORG")));
    }
}
