/// Background worker: logs page visits reported by the content script
///
/// The worker script registers the runtime listeners synchronously and
/// forwards events here once the module has loaded.

use crate::chrome::to_js;
use crate::messaging::handle_message;
use serde_json::Value;
use wasm_bindgen::prelude::*;

pub fn log_installed(details: JsValue) {
    let reason = js_sys::Reflect::get(&details, &JsValue::from_str("reason"))
        .ok()
        .and_then(|reason| reason.as_string())
        .unwrap_or_default();
    log::info!("Site Time Companion installed ({})", reason);
}

/// Acknowledgement for `request`, or `undefined` when it is not ours to answer
pub fn answer_message(request: JsValue) -> JsValue {
    let request: Value = match serde_wasm_bindgen::from_value(request) {
        Ok(request) => request,
        Err(e) => {
            log::debug!("Unreadable runtime message: {}", e);
            return JsValue::UNDEFINED;
        }
    };

    match handle_message(&request).map(|ack| to_js(&ack)) {
        Some(Ok(ack)) => ack,
        Some(Err(e)) => {
            log::warn!("Failed to serialize acknowledgement: {}", e);
            JsValue::UNDEFINED
        }
        None => JsValue::UNDEFINED,
    }
}
