//! Ingestion: validate one device sample and write it as one point.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PlannerConfig;
use crate::error::{Error, Result};
use crate::store::{BucketRef, TimeSeriesStore, WritePoint};

/// Inbound body as posted by a device.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(alias = "deviceId")]
    pub device_id: Option<String>,
    /// A JSON number, or a string holding one.
    pub current: Option<serde_json::Value>,
}

/// A validated sample; the backend assigns its timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub device_id: String,
    pub current: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteResult {
    pub device_id: String,
    pub current: f64,
}

impl TelemetrySample {
    pub fn validate(device_id: Option<&str>, current: Option<&serde_json::Value>) -> Result<Self> {
        let device_id = match device_id.map(str::trim) {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => return Err(Error::invalid_sample("device_id must be a non-empty string")),
        };
        if device_id.chars().any(char::is_control) {
            return Err(Error::invalid_sample("device_id must not contain control characters"));
        }

        let current = match current {
            None | Some(serde_json::Value::Null) => {
                return Err(Error::invalid_sample("current is required"))
            }
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        }
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::invalid_sample("current must be a finite number"))?;

        Ok(Self { device_id, current })
    }
}

impl IngestRequest {
    pub fn into_sample(self) -> Result<TelemetrySample> {
        TelemetrySample::validate(self.device_id.as_deref(), self.current.as_ref())
    }
}

/// Write one sample and wait for the backend to acknowledge it.
pub async fn ingest(
    store: &dyn TimeSeriesStore,
    config: &PlannerConfig,
    sample: TelemetrySample,
) -> Result<WriteResult> {
    let point = WritePoint {
        bucket: BucketRef::Raw,
        measurement: config.current.measurement.clone(),
        tags: BTreeMap::from([(config.device_tag.clone(), sample.device_id.clone())]),
        fields: BTreeMap::from([(config.current.field.clone(), sample.current)]),
        timestamp_ns: None,
    };
    store.write(point).await?;

    info!(device = %sample.device_id, current = sample.current, "sample written");
    Ok(WriteResult {
        device_id: sample.device_id,
        current: sample.current,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FakeStore;
    use serde_json::json;

    fn validate(device: Option<&str>, current: serde_json::Value) -> Result<TelemetrySample> {
        TelemetrySample::validate(device, Some(&current))
    }

    #[test]
    fn empty_device_is_invalid() {
        assert!(matches!(validate(Some(""), json!(1.2)), Err(Error::InvalidSample(_))));
        assert!(matches!(validate(Some("   "), json!(1.2)), Err(Error::InvalidSample(_))));
        assert!(matches!(validate(None, json!(1.2)), Err(Error::InvalidSample(_))));
    }

    #[test]
    fn device_with_control_characters_is_invalid() {
        for bad in ["a\nrogue,device=x current=99", "dev\r1", "dev\t1"] {
            assert!(matches!(validate(Some(bad), json!(1.2)), Err(Error::InvalidSample(_))), "{bad:?}");
        }
    }

    #[test]
    fn null_or_missing_current_is_invalid() {
        assert!(matches!(validate(Some("dev1"), json!(null)), Err(Error::InvalidSample(_))));
        assert!(matches!(
            TelemetrySample::validate(Some("dev1"), None),
            Err(Error::InvalidSample(_))
        ));
    }

    #[test]
    fn non_numeric_current_is_invalid() {
        for bad in [json!("abc"), json!(true), json!([1.0]), json!({"v": 1}), json!("NaN"), json!("inf")] {
            assert!(
                matches!(validate(Some("dev1"), bad.clone()), Err(Error::InvalidSample(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn numeric_strings_are_accepted() {
        assert_eq!(validate(Some("dev1"), json!(" 1.2 ")).unwrap().current, 1.2);
        assert_eq!(validate(Some("dev1"), json!(3)).unwrap().current, 3.0);
    }

    #[test]
    fn body_accepts_camel_case_device_id() {
        let req: IngestRequest = serde_json::from_value(json!({"deviceId": "dev1", "current": 0.4})).unwrap();
        assert_eq!(req.into_sample().unwrap().device_id, "dev1");
    }

    #[tokio::test]
    async fn valid_sample_is_written_exactly_once() {
        let store = FakeStore::new();
        let sample = validate(Some("dev1"), json!(1.2)).unwrap();
        let result = ingest(&store, &PlannerConfig::default(), sample).await.unwrap();
        assert_eq!(result.device_id, "dev1");

        let written = store.written();
        assert_eq!(written.len(), 1);
        let point = &written[0];
        assert_eq!(point.bucket, BucketRef::Raw);
        assert_eq!(point.measurement, "environment");
        assert_eq!(point.tags, BTreeMap::from([("device".to_string(), "dev1".to_string())]));
        assert_eq!(point.fields, BTreeMap::from([("current".to_string(), 1.2)]));
        assert_eq!(point.timestamp_ns, None);
    }

    #[tokio::test]
    async fn padded_device_is_written_trimmed() {
        let store = FakeStore::new();
        let sample = validate(Some(" dev1 "), json!(1.2)).unwrap();
        let result = ingest(&store, &PlannerConfig::default(), sample).await.unwrap();
        assert_eq!(result.device_id, "dev1");
        assert_eq!(
            store.written()[0].tags,
            BTreeMap::from([("device".to_string(), "dev1".to_string())])
        );
    }


    #[tokio::test]
    async fn backend_failure_is_reported() {
        let store = FakeStore::new();
        store.fail_writes("connection refused");
        let sample = validate(Some("dev1"), json!(1.2)).unwrap();
        let err = ingest(&store, &PlannerConfig::default(), sample).await.unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable(_)));
        assert!(store.written().is_empty());
    }
}
