/// Messages between the content script and the background worker

use serde::{Deserialize, Serialize};
use serde_json::Value;

const LOG_HOSTNAME: &str = "logHostname";

/// Message sent by the content script on page load
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action")]
pub enum RuntimeMessage {
    #[serde(rename = "logHostname")]
    LogHostname {
        #[serde(default)]
        hostname: String,
        #[serde(default)]
        url: String,
        /// ISO-8601
        #[serde(default)]
        timestamp: String,
    },
}

/// Acknowledgement sent back by the background worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ack {
    pub status: String,
}

impl Ack {
    pub fn received() -> Self {
        Ack {
            status: "received".to_string(),
        }
    }
}

pub fn visit_report(hostname: &str, url: &str, timestamp: &str) -> RuntimeMessage {
    RuntimeMessage::LogHostname {
        hostname: hostname.to_string(),
        url: url.to_string(),
        timestamp: timestamp.to_string(),
    }
}

/// Handle a raw runtime message; `None` means it is not ours to answer
///
/// Every `logHostname` request is acknowledged, whatever fields it carries.
pub fn handle_message(request: &Value) -> Option<Ack> {
    if request.get("action").and_then(Value::as_str) != Some(LOG_HOSTNAME) {
        log::debug!("Ignoring runtime message {}", request);
        return None;
    }

    match serde_json::from_value::<RuntimeMessage>(request.clone()) {
        Ok(RuntimeMessage::LogHostname { hostname, url, timestamp }) => {
            log::info!("Content script reported: {} ({} at {})", hostname, url, timestamp);
        }
        Err(e) => log::info!("Content script reported {}: {}", request, e),
    }
    Some(Ack::received())
}
