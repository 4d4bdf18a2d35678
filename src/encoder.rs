//! Series encoding
//!
//! This module wraps a dense slot series into a self-describing JSON payload
//! with producer and window metadata.

use crate::error::EngineError;
use crate::types::{SeriesPayload, SeriesProducer, SeriesRequest, SlotSummary};
use crate::{CAREWATCH_VERSION, PRODUCER_NAME};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Encoder for series payloads
pub struct SeriesEncoder {
    instance_id: String,
}

impl Default for SeriesEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Encode a computed series into a payload
    pub fn encode(
        &self,
        request: &SeriesRequest,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        slots: Vec<SlotSummary>,
    ) -> Result<SeriesPayload, EngineError> {
        if slots.len() != request.period.slot_count() {
            return Err(EngineError::EncodingError(format!(
                "{} series must have {} slots, got {}",
                request.period,
                request.period.slot_count(),
                slots.len()
            )));
        }

        Ok(SeriesPayload {
            producer: SeriesProducer {
                name: PRODUCER_NAME.to_string(),
                version: CAREWATCH_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            device_address: request.device_address.clone(),
            metric: request.metric,
            period: request.period,
            timezone: request.timezone.clone(),
            window_start_utc: window_start.to_rfc3339_opts(SecondsFormat::Millis, true),
            window_end_utc: window_end.to_rfc3339_opts(SecondsFormat::Millis, true),
            computed_at_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            slots,
        })
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        request: &SeriesRequest,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        slots: Vec<SlotSummary>,
    ) -> Result<String, EngineError> {
        let payload = self.encode(request, window_start, window_end, slots)?;
        serde_json::to_string_pretty(&payload).map_err(EngineError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;
    use crate::types::Metric;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn request() -> SeriesRequest {
        SeriesRequest {
            device_address: "dev-1".to_string(),
            metric: Metric::HeartRate,
            period: Period::Week,
            reference: NaiveDate::from_ymd_opt(2024, 1, 17)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            timezone: "UTC".to_string(),
        }
    }

    fn week_slots() -> Vec<SlotSummary> {
        let monday = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        (0..7)
            .map(|i| SlotSummary::empty(monday + Duration::days(i)))
            .collect()
    }

    #[test]
    fn test_encode_payload() {
        let encoder = SeriesEncoder::with_instance_id("instance-1".to_string());
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 21, 23, 59, 59).unwrap() + Duration::milliseconds(999);

        let json = encoder
            .encode_to_json(&request(), start, end, week_slots())
            .unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["producer"]["name"], "carewatch");
        assert_eq!(payload["producer"]["instance_id"], "instance-1");
        assert_eq!(payload["metric"], "heart_rate");
        assert_eq!(payload["period"], "week");
        assert_eq!(payload["window_start_utc"], "2024-01-15T00:00:00.000Z");
        assert_eq!(payload["window_end_utc"], "2024-01-21T23:59:59.999Z");
        assert_eq!(payload["slots"].as_array().unwrap().len(), 7);
        assert_eq!(payload["slots"][0]["count"], 0);
    }

    #[test]
    fn test_rejects_wrong_cardinality() {
        let encoder = SeriesEncoder::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let mut slots = week_slots();
        slots.pop();

        let result = encoder.encode(&request(), start, start, slots);
        assert!(matches!(result, Err(EngineError::EncodingError(_))));
    }
}
