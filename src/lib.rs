/// Site Time Companion - Chrome Extension tracking time spent per site
/// Built with Rust + WASM + Yew

mod background;
pub mod category;
mod chrome;
mod content;
pub mod domain;
pub mod error;
pub mod messaging;
pub mod notify;
pub mod session;
pub mod settings;
pub mod storage;
pub mod tab_data;
pub mod timer;
pub mod ui;

use category::CategoryTable;
use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Re-export classification helpers for JavaScript access
#[wasm_bindgen]
pub fn extract_domain(url: &str) -> String {
    domain::extract_domain(url)
}

#[wasm_bindgen]
pub fn detect_category(url: &str) -> String {
    CategoryTable::fallback().detect_category_key(url)
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

// Background worker handlers, called from the listeners in background.js
#[wasm_bindgen]
pub fn handle_installed(details: JsValue) {
    background::log_installed(details);
}

#[wasm_bindgen]
pub fn handle_runtime_message(request: JsValue) -> JsValue {
    background::answer_message(request)
}

// Report the current page from the content script
#[wasm_bindgen]
pub fn start_content_script() {
    content::report_page_visit();
}
