//! Response envelope seen by response interceptors

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::RequestMetadata;

/// Keys allowed next to `data` for a body to count as an envelope
const ENVELOPE_KEYS: [&str; 4] = ["data", "message", "success", "status"];

/// Metadata carried on a successful response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Request-side metadata, copied after request interceptors ran
    pub request: RequestMetadata,
    /// Wall time of the network attempt sequence (set by timing interceptor)
    #[serde(default, with = "crate::utils::serde::option_duration_millis")]
    pub duration: Option<Duration>,
    pub from_cache: bool,
    pub endpoint: String,
}

/// Successful response before it is decoded into the caller's type
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub data: Value,
    pub metadata: ResponseMetadata,
}

impl ApiResponse {
    pub fn new(status: u16, data: Value) -> Self {
        Self { status, headers: BTreeMap::new(), data, metadata: ResponseMetadata::default() }
    }

    /// Payload with a `{data, message?}` envelope removed
    ///
    /// Bodies that carry keys beyond the envelope keys are returned as-is.
    pub fn unwrapped_data(&self) -> &Value {
        match &self.data {
            Value::Object(map)
                if map.contains_key("data")
                    && map.keys().all(|key| ENVELOPE_KEYS.contains(&key.as_str())) =>
            {
                &map["data"]
            }
            other => other,
        }
    }
}
