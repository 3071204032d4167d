//! Process-lifetime credential cache.
//!
//! The first successful fetch is memoized for the life of the process and
//! there is no way to refresh or replace it: a rotated token needs a
//! restart. Concurrent first callers share a single in-flight fetch.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::error::{Error, Result};

/// Backend access credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub org: String,
    pub bucket: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .finish()
    }
}

#[derive(Deserialize)]
struct SecretPayload {
    #[serde(rename = "INFLUXDB_INIT_ADMIN_TOKEN")]
    token: Option<String>,
    #[serde(rename = "INFLUXDB_ORG")]
    org: Option<String>,
    #[serde(rename = "INFLUXDB_BUCKET")]
    bucket: Option<String>,
}

impl Credentials {
    /// Parse the JSON document stored in the secret store.
    pub fn from_secret_payload(raw: &str) -> Result<Self> {
        let payload: SecretPayload = serde_json::from_str(raw)
            .map_err(|e| Error::CredentialUnavailable(format!("secret is not valid JSON: {e}")))?;

        let required = |value: Option<String>, key: &str| {
            value.filter(|v| !v.is_empty()).ok_or_else(|| {
                Error::CredentialUnavailable(format!("secret payload is missing '{key}'"))
            })
        };

        Ok(Self {
            token: required(payload.token, "INFLUXDB_INIT_ADMIN_TOKEN")?,
            org: required(payload.org, "INFLUXDB_ORG")?,
            bucket: required(payload.bucket, "INFLUXDB_BUCKET")?,
        })
    }
}

/// Source of backend credentials (secret store, environment, ...).
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch(&self) -> Result<Credentials>;
}

/// Lazily-initialized, single-assignment credential cell.
pub struct CredentialCache {
    provider: Arc<dyn CredentialProvider>,
    cell: OnceCell<Credentials>,
}

impl CredentialCache {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            provider,
            cell: OnceCell::new(),
        }
    }

    /// Return the memoized credentials, fetching them on first use.
    ///
    /// A failed fetch leaves the cell empty, so a later call tries again.
    pub async fn get(&self) -> Result<&Credentials> {
        self.cell
            .get_or_try_init(|| async {
                match self.provider.fetch().await {
                    Ok(creds) => {
                        info!(org = %creds.org, bucket = %creds.bucket, "backend credentials cached");
                        Ok(creds)
                    }
                    Err(e) => {
                        error!(error = %e, "credential fetch failed");
                        Err(e)
                    }
                }
            })
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts fetches; optionally slow to widen the race window.
    #[derive(Default)]
    pub(crate) struct CountingProvider {
        pub calls: AtomicUsize,
        pub delay: Option<Duration>,
        pub fail: bool,
    }

    #[async_trait]
    impl CredentialProvider for CountingProvider {
        async fn fetch(&self) -> Result<Credentials> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail {
                return Err(Error::CredentialUnavailable("secret store unreachable".into()));
            }
            Ok(test_credentials())
        }
    }

    pub(crate) fn test_credentials() -> Credentials {
        Credentials {
            token: "t0k3n".into(),
            org: "home".into(),
            bucket: "SCT013".into(),
        }
    }

    #[tokio::test]
    async fn fetches_once_across_sequential_calls() {
        let provider = Arc::new(CountingProvider::default());
        let cache = CredentialCache::new(provider.clone());
        for _ in 0..5 {
            assert_eq!(cache.get().await.unwrap(), &test_credentials());
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_first_calls_share_one_fetch() {
        let provider = Arc::new(CountingProvider {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let cache = Arc::new(CredentialCache::new(provider.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get().await.map(|c| c.bucket.clone()) })
            })
            .collect();
        for t in tasks {
            assert_eq!(t.await.unwrap().unwrap(), "SCT013");
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_reported_and_not_cached() {
        let provider = Arc::new(CountingProvider {
            fail: true,
            ..Default::default()
        });
        let cache = CredentialCache::new(provider.clone());
        assert!(matches!(cache.get().await, Err(Error::CredentialUnavailable(_))));
        assert!(matches!(cache.get().await, Err(Error::CredentialUnavailable(_))));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn payload_with_all_keys_parses() {
        let creds = Credentials::from_secret_payload(
            r#"{"INFLUXDB_INIT_ADMIN_TOKEN":"abc","INFLUXDB_ORG":"home","INFLUXDB_BUCKET":"SCT013","OTHER":1}"#,
        )
        .unwrap();
        assert_eq!(creds.token, "abc");
        assert_eq!(creds.bucket, "SCT013");
    }

    #[test]
    fn payload_missing_key_is_unavailable() {
        let err = Credentials::from_secret_payload(r#"{"INFLUXDB_ORG":"home","INFLUXDB_BUCKET":"b"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::CredentialUnavailable(ref m) if m.contains("INFLUXDB_INIT_ADMIN_TOKEN")));
    }

    #[test]
    fn debug_output_hides_token() {
        let dbg = format!("{:?}", test_credentials());
        assert!(!dbg.contains("t0k3n"));
    }
}
