/// Popup session: the state one open popup owns, and its open pipeline
///
/// Opening runs strictly in order: settings, category table, active tab,
/// then the timer for the tab's domain. The tick logic reads settings and
/// categories synchronously, so both must be loaded before the timer starts.

use crate::category::{load_categories, CategorySource, CategoryTable};
use crate::domain::extract_domain;
use crate::error::{PopupError, StoreError};
use crate::notify::Notifier;
use crate::settings::{load_settings, save_settings, Settings, SettingsForm};
use crate::storage::KeyValueStore;
use crate::tab_data::TabSource;
use crate::timer::{TickReport, TimerEngine, TimerStart};

/// What the popup header shows for the active site
#[derive(Debug, Clone, PartialEq)]
pub struct SiteView {
    pub url: String,
    pub domain: String,
    pub category_key: String,
    pub category_label: String,
}

pub struct PopupSession<S, H = ()> {
    store: S,
    settings: Settings,
    categories: CategoryTable,
    timer: TimerEngine<H>,
}

impl<S: KeyValueStore, H> PopupSession<S, H> {
    /// Load settings, then the category table
    pub async fn load<C: CategorySource>(store: S, source: &C) -> Self {
        let mut settings = load_settings(&store).await;
        let categories = load_categories(source).await;
        settings.enable_table_categories(&categories);

        PopupSession {
            store,
            settings,
            categories,
            timer: TimerEngine::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    pub fn timer(&self) -> &TimerEngine<H> {
        &self.timer
    }

    pub fn classify(&self, url: &str) -> SiteView {
        let domain = extract_domain(url);
        let category_key = self.categories.key_for_domain(&domain).to_string();
        let category_label = self.categories.label_for_key(&category_key);

        SiteView {
            url: url.to_string(),
            domain,
            category_key,
            category_label,
        }
    }

    pub async fn start_timer(&mut self, url: &str, now_ms: i64) -> TimerStart {
        self.timer.start(&self.store, url, now_ms).await
    }

    pub fn attach_ticker(&mut self, generation: u64, handle: H) -> bool {
        self.timer.attach(generation, handle)
    }

    pub async fn tick<N: Notifier + ?Sized>(
        &mut self,
        generation: u64,
        now_ms: i64,
        notifier: &N,
    ) -> Option<TickReport> {
        self.timer
            .tick(&self.store, generation, now_ms, &self.settings, &self.categories, notifier)
            .await
    }

    pub async fn reset(&mut self, now_ms: i64) -> Result<TimerStart, PopupError> {
        self.timer.reset(&self.store, now_ms).await
    }

    pub fn settings_form(&self) -> SettingsForm {
        SettingsForm::from_settings(&self.settings, &self.categories)
    }

    /// Apply the settings panel form; memory is updated even if persisting fails
    pub async fn apply_settings(&mut self, form: &SettingsForm) -> Result<(), StoreError> {
        self.settings = form.to_settings();
        save_settings(&self.store, &self.settings).await
    }
}

/// A freshly opened popup with its timer running
pub struct OpenedPopup<S, H> {
    pub session: PopupSession<S, H>,
    pub site: SiteView,
    pub timer: TimerStart,
}

/// Run the popup open pipeline
///
/// `now` is read only after the tab query completes.
pub async fn open_popup<S, H, C, T, F>(
    store: S,
    categories: &C,
    tabs: &T,
    now: F,
) -> Result<OpenedPopup<S, H>, PopupError>
where
    S: KeyValueStore,
    C: CategorySource,
    T: TabSource,
    F: Fn() -> i64,
{
    let mut session = PopupSession::load(store, categories).await;

    let tab = tabs.active_tab().await?.ok_or(PopupError::NoActiveTab)?;
    let url = tab.url.unwrap_or_default();
    log::info!("Active tab: {}", url);

    let site = session.classify(&url);
    let timer = session.start_timer(&url, now()).await;

    Ok(OpenedPopup { session, site, timer })
}
