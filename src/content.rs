/// Content script: reports each page visit to the background worker

use crate::chrome::{runtime_send_message, to_js};
use crate::messaging::visit_report;
use wasm_bindgen_futures::spawn_local;

pub fn report_page_visit() {
    let Some(window) = web_sys::window() else {
        return;
    };
    let location = window.location();
    let hostname = location.hostname().unwrap_or_default();
    let url = location.href().unwrap_or_default();
    let timestamp = String::from(js_sys::Date::new_0().to_iso_string());

    log::debug!("Content script loaded on: {}", hostname);

    let message = match to_js(&visit_report(&hostname, &url, &timestamp)) {
        Ok(message) => message,
        Err(e) => {
            log::warn!("Failed to serialize visit report: {}", e);
            return;
        }
    };

    // Fire and forget: no retry
    spawn_local(async move {
        if let Err(e) = runtime_send_message(message).await {
            log::warn!("Visit report not delivered: {:?}", e);
        }
    });
}
