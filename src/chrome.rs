/// Bindings to the extension platform APIs (storage, tabs, runtime, fetch)

use crate::category::{CategorySource, CategoryTable, CATEGORY_RESOURCE_PATH};
use crate::error::{CatalogError, PopupError, StoreError};
use crate::storage::KeyValueStore;
use crate::tab_data::{TabInfo, TabSource};
use serde::Serialize;
use serde_json::{json, Map, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = get)]
    async fn storage_local_get(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = set)]
    async fn storage_local_set(items: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = remove)]
    async fn storage_local_remove(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = query)]
    async fn tabs_query(query_info: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "runtime"], js_name = sendMessage)]
    pub async fn runtime_send_message(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "runtime"], js_name = getURL)]
    fn runtime_get_url(path: &str) -> String;
}

/// Milliseconds since the epoch, from the JS clock
pub fn now_ms() -> i64 {
    js_sys::Date::now() as i64
}

/// Convert to a plain JS object/array (not a JS `Map`)
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

/// `chrome.storage.local`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeStorage;

impl KeyValueStore for ChromeStorage {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let keys_js = to_js(keys).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let result = storage_local_get(keys_js).await.map_err(|e| StoreError::Backend {
            op: "get",
            message: format!("{:?}", e),
        })?;

        serde_wasm_bindgen::from_value(result).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        let items_js = to_js(&items).map_err(|e| StoreError::Serialization(e.to_string()))?;
        storage_local_set(items_js).await.map_err(|e| StoreError::Backend {
            op: "set",
            message: format!("{:?}", e),
        })?;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let keys_js = to_js(keys).map_err(|e| StoreError::Serialization(e.to_string()))?;
        storage_local_remove(keys_js).await.map_err(|e| StoreError::Backend {
            op: "remove",
            message: format!("{:?}", e),
        })?;
        Ok(())
    }
}

/// `chrome.tabs.query({ active: true, currentWindow: true })`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeTabs;

impl TabSource for ChromeTabs {
    async fn active_tab(&self) -> Result<Option<TabInfo>, PopupError> {
        let query = to_js(&json!({ "active": true, "currentWindow": true }))
            .map_err(|e| PopupError::Tabs(e.to_string()))?;
        let tabs_js = tabs_query(query)
            .await
            .map_err(|e| PopupError::Tabs(format!("{:?}", e)))?;
        let tabs: Vec<TabInfo> = serde_wasm_bindgen::from_value(tabs_js)
            .map_err(|e| PopupError::Tabs(format!("Failed to parse tabs: {}", e)))?;

        Ok(tabs.into_iter().next())
    }
}

/// The classification document packaged with the extension
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledCategories;

impl CategorySource for BundledCategories {
    async fn load(&self) -> Result<CategoryTable, CatalogError> {
        let window = web_sys::window().ok_or_else(|| CatalogError::Fetch("no window".to_string()))?;
        let url = runtime_get_url(CATEGORY_RESOURCE_PATH);

        let response: web_sys::Response = JsFuture::from(window.fetch_with_str(&url))
            .await
            .map_err(|e| CatalogError::Fetch(format!("{:?}", e)))?
            .dyn_into()
            .map_err(|e| CatalogError::Fetch(format!("not a response: {:?}", e)))?;

        if !response.ok() {
            return Err(CatalogError::Fetch(format!("{} returned {}", url, response.status())));
        }

        let text = response.text().map_err(|e| CatalogError::Fetch(format!("{:?}", e)))?;
        let text = JsFuture::from(text)
            .await
            .map_err(|e| CatalogError::Fetch(format!("{:?}", e)))?
            .as_string()
            .ok_or_else(|| CatalogError::Fetch("response body is not text".to_string()))?;

        CategoryTable::from_json(&text)
    }
}
