/// Browser tab data used by the popup
use crate::error::PopupError;
use serde::{Deserialize, Serialize};

/// The subset of a `chrome.tabs.Tab` the popup reads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabInfo {
    #[serde(default)]
    pub id: Option<i32>,
    /// Missing for tabs the extension has no host permission for
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl TabInfo {
    pub fn new(url: &str) -> TabInfo {
        TabInfo {
            id: None,
            url: Some(url.to_string()),
            title: None,
        }
    }
}

/// Query for the focused tab of the current window
#[allow(async_fn_in_trait)]
pub trait TabSource {
    async fn active_tab(&self) -> Result<Option<TabInfo>, PopupError>;
}
