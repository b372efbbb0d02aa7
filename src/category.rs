/// Site classification: maps a domain to a category key and label
use crate::domain::extract_domain;
use crate::error::CatalogError;
use serde::{Deserialize, Serialize};

/// Category key returned when no site list matches
pub const OTHER_KEY: &str = "other";

/// Path of the bundled classification document inside the extension
pub const CATEGORY_RESOURCE_PATH: &str = "data/categories.json";

/// Built-in table used when the bundled document is unavailable
const FALLBACK_TABLE: &[(&str, &str, &[&str])] = &[
    (
        "social",
        "Social Media",
        &[
            "facebook.com",
            "twitter.com",
            "instagram.com",
            "linkedin.com",
            "reddit.com",
            "tiktok.com",
            "snapchat.com",
            "pinterest.com",
        ],
    ),
    (
        "education",
        "Education",
        &[
            "coursera.org",
            "edx.org",
            "khanacademy.org",
            "udemy.com",
            "wikipedia.org",
            "duolingo.com",
            "brilliant.org",
        ],
    ),
    (
        "entertainment",
        "Entertainment",
        &[
            "youtube.com",
            "netflix.com",
            "twitch.tv",
            "spotify.com",
            "hulu.com",
            "disneyplus.com",
            "primevideo.com",
        ],
    ),
    (
        "productivity",
        "Productivity",
        &[
            "github.com",
            "gitlab.com",
            "notion.so",
            "trello.com",
            "slack.com",
            "docs.google.com",
            "calendar.google.com",
            "asana.com",
        ],
    ),
    (
        "news",
        "News",
        &[
            "cnn.com",
            "bbc.com",
            "bbc.co.uk",
            "nytimes.com",
            "theguardian.com",
            "reuters.com",
            "apnews.com",
        ],
    ),
];

/// One category of the classification table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub sites: Vec<String>,
}

/// Shape of the bundled document: `{ "categories": { key: { label, sites } } }`
#[derive(Debug, Deserialize)]
struct CategoryDocument {
    categories: serde_json::Map<String, serde_json::Value>,
}

/// Ordered category table; lookup order is document order
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTable {
    entries: Vec<(String, Category)>,
}

impl CategoryTable {
    /// The built-in table with the five known categories
    pub fn fallback() -> Self {
        let entries = FALLBACK_TABLE
            .iter()
            .map(|(key, label, sites)| {
                (
                    key.to_string(),
                    Category {
                        label: label.to_string(),
                        sites: sites.iter().map(|s| s.to_string()).collect(),
                    },
                )
            })
            .collect();

        CategoryTable { entries }
    }

    /// Parse the bundled classification document, keeping key order
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let document: CategoryDocument = serde_json::from_str(json)?;
        let entries = document
            .categories
            .into_iter()
            .map(|(key, value)| {
                let mut category: Category = serde_json::from_value(value)?;
                if category.label.trim().is_empty() {
                    category.label = capitalize(&key);
                }
                Ok((key, category))
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        Ok(CategoryTable { entries })
    }

    /// Category keys in table order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&Category> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, category)| category)
    }

    /// First category whose site list has a substring of `domain`
    pub fn key_for_domain(&self, domain: &str) -> &str {
        self.entries
            .iter()
            .find(|(_, category)| category.sites.iter().any(|site| domain.contains(site.as_str())))
            .map(|(key, _)| key.as_str())
            .unwrap_or(OTHER_KEY)
    }

    /// Display label for a category key
    pub fn label_for_key(&self, key: &str) -> String {
        match self.get(key) {
            Some(category) => category.label.clone(),
            None => capitalize(key),
        }
    }

    pub fn detect_category_key(&self, url: &str) -> String {
        self.key_for_domain(&extract_domain(url)).to_string()
    }

    pub fn detect_category_label(&self, url: &str) -> String {
        let domain = extract_domain(url);
        self.label_for_key(self.key_for_domain(&domain))
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::fallback()
    }
}

/// Where the popup loads its category table from
#[allow(async_fn_in_trait)]
pub trait CategorySource {
    async fn load(&self) -> Result<CategoryTable, CatalogError>;
}

/// Load the table from `source`, falling back to the built-in one on failure
pub async fn load_categories<C: CategorySource>(source: &C) -> CategoryTable {
    match source.load().await {
        Ok(table) => {
            log::info!("Loaded category table with {} categories", table.entries.len());
            table
        }
        Err(e) => {
            log::warn!("Using built-in category table: {}", e);
            CategoryTable::fallback()
        }
    }
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
