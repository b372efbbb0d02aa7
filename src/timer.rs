/// Per-domain elapsed-time timer with a one-shot reminder
///
/// The engine owns the single active tick loop of a popup session. Each start
/// bumps a generation counter; ticks carry the generation they were scheduled
/// with, so a tick queued by a cancelled loop is ignored.

use crate::category::CategoryTable;
use crate::domain::extract_domain;
use crate::error::PopupError;
use crate::notify::Notifier;
use crate::settings::Settings;
use crate::storage::{
    remove_with_retry, reminder_sent_key, set_with_retry, site_start_key, KeyValueStore,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Period of the repeating tick
pub const TICK_INTERVAL_MS: u32 = 1000;

const MS_PER_MINUTE: i64 = 60_000;

/// Whole minutes between `start_ms` and `now_ms`, floored
///
/// A clock that moved backwards gives a negative value.
pub fn elapsed_minutes(start_ms: i64, now_ms: i64) -> i64 {
    now_ms.saturating_sub(start_ms).div_euclid(MS_PER_MINUTE)
}

/// Render elapsed minutes for the time display
pub fn format_elapsed(minutes: i64) -> String {
    let minutes = minutes.max(0);
    if minutes < 60 {
        format!("{} min", minutes)
    } else {
        format!("{} h {} min", minutes / 60, minutes % 60)
    }
}

pub fn reminder_message(domain: &str, category_label: &str, minutes: i64) -> String {
    format!(
        "You've spent {} minutes on {} ({}). Time for a break?",
        minutes, domain, category_label
    )
}

/// Result of starting or resuming the timer for a site
#[derive(Debug, Clone, PartialEq)]
pub struct TimerStart {
    pub generation: u64,
    pub domain: String,
    pub start_time: i64,
    pub elapsed_minutes: i64,
    pub first_visit: bool,
    pub reminder_sent: bool,
}

/// Outcome of one tick of the active timer
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub domain: String,
    pub elapsed_minutes: i64,
    pub reminder_fired: bool,
}

struct ActiveTimer<H> {
    generation: u64,
    url: String,
    domain: String,
    start_time: i64,
    /// Dropping the handle stops the repeating tick
    handle: Option<H>,
}

pub struct TimerEngine<H> {
    generation: u64,
    active: Option<ActiveTimer<H>>,
    sent_reminders: HashMap<String, bool>,
}

impl<H> Default for TimerEngine<H> {
    fn default() -> Self {
        TimerEngine {
            generation: 0,
            active: None,
            sent_reminders: HashMap::new(),
        }
    }
}

impl<H> TimerEngine<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_domain(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.domain.as_str())
    }

    pub fn current_url(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.url.as_str())
    }

    /// True once a tick handle is attached to the active timer
    pub fn is_ticking(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.handle.is_some())
    }

    pub fn reminder_sent(&self, domain: &str) -> bool {
        self.sent_reminders.get(domain).copied().unwrap_or(false)
    }

    /// Stop the active tick loop, if any
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            log::debug!("Stopping timer for {} (generation {})", active.domain, active.generation);
        }
    }

    /// Start or resume timing the domain of `url`
    ///
    /// The previous timer is cancelled first. A missing start time is created
    /// as `now_ms` and persisted right away. When the stored state cannot be
    /// read, the site is timed from `now_ms` in memory only and its reminder
    /// counts as sent unless this session already knows otherwise.
    pub async fn start<S: KeyValueStore>(
        &mut self,
        store: &S,
        url: &str,
        now_ms: i64,
    ) -> TimerStart {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;

        let domain = extract_domain(url);
        let start_key = site_start_key(&domain);
        let sent_key = reminder_sent_key(&domain);

        let (start_time, first_visit, reminder_sent) =
            match store.get(&[start_key.as_str(), sent_key.as_str()]).await {
                Ok(stored) => {
                    let reminder_sent = stored
                        .get(&sent_key)
                        .and_then(Value::as_bool)
                        .unwrap_or(false);

                    match stored.get(&start_key).and_then(as_millis) {
                        Some(start_time) => (start_time, false, reminder_sent),
                        None => {
                            let mut items = Map::new();
                            items.insert(start_key.clone(), Value::from(now_ms));
                            if let Err(e) = set_with_retry(store, items).await {
                                log::error!("Could not persist start time for {}: {}", domain, e);
                            }
                            (now_ms, true, reminder_sent)
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Timing {} in memory, state unreadable: {}", domain, e);
                    let reminder_sent = self.sent_reminders.get(&domain).copied().unwrap_or(true);
                    (now_ms, false, reminder_sent)
                }
            };
        self.sent_reminders.insert(domain.clone(), reminder_sent);

        log::info!(
            "Timing {} since {} ({}, generation {})",
            domain,
            start_time,
            if first_visit { "first visit" } else { "resumed" },
            generation
        );

        self.active = Some(ActiveTimer {
            generation,
            url: url.to_string(),
            domain: domain.clone(),
            start_time,
            handle: None,
        });

        TimerStart {
            generation,
            domain,
            start_time,
            elapsed_minutes: elapsed_minutes(start_time, now_ms),
            first_visit,
            reminder_sent,
        }
    }

    /// Attach the repeating tick handle for `generation`
    ///
    /// A handle for a stale generation is dropped at once, which stops it.
    pub fn attach(&mut self, generation: u64, handle: H) -> bool {
        match self.active.as_mut() {
            Some(active) if active.generation == generation => {
                active.handle = Some(handle);
                true
            }
            _ => {
                log::debug!("Dropping tick handle for stale generation {}", generation);
                false
            }
        }
    }

    /// One tick: compute elapsed minutes and fire the reminder when due
    ///
    /// Returns `None` when `generation` is not the active timer.
    pub async fn tick<S: KeyValueStore, N: Notifier + ?Sized>(
        &mut self,
        store: &S,
        generation: u64,
        now_ms: i64,
        settings: &Settings,
        categories: &CategoryTable,
        notifier: &N,
    ) -> Option<TickReport> {
        let active = self.active.as_ref().filter(|active| active.generation == generation)?;
        let domain = active.domain.clone();
        let elapsed = elapsed_minutes(active.start_time, now_ms);
        let category = categories.key_for_domain(&domain);

        let due = settings.reminders_enabled
            && settings.is_category_enabled(category)
            && !self.reminder_sent(&domain)
            && elapsed >= i64::from(settings.reminder_interval);

        if due {
            let label = categories.label_for_key(category);
            notifier.notify(&reminder_message(&domain, &label, elapsed));
            self.sent_reminders.insert(domain.clone(), true);
            log::info!("Reminder sent for {} after {} min", domain, elapsed);

            let mut items = Map::new();
            items.insert(reminder_sent_key(&domain), Value::Bool(true));
            if let Err(e) = set_with_retry(store, items).await {
                log::error!("Could not persist reminder flag for {}: {}", domain, e);
            }
        }

        Some(TickReport {
            domain,
            elapsed_minutes: elapsed,
            reminder_fired: due,
        })
    }

    /// Forget the active domain's timing and start it again from zero
    pub async fn reset<S: KeyValueStore>(
        &mut self,
        store: &S,
        now_ms: i64,
    ) -> Result<TimerStart, PopupError> {
        let (url, domain) = self
            .active
            .as_ref()
            .map(|active| (active.url.clone(), active.domain.clone()))
            .ok_or(PopupError::NoActiveDomain)?;

        let start_key = site_start_key(&domain);
        let sent_key = reminder_sent_key(&domain);
        remove_with_retry(store, &[start_key.as_str(), sent_key.as_str()]).await?;
        self.sent_reminders.insert(domain.clone(), false);
        log::info!("Reset timer for {}", domain);

        Ok(self.start(store, &url, now_ms).await)
    }
}

/// Stored timestamps may come back from JS as floats
fn as_millis(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|millis| millis as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use futures::executor::block_on;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    const START: i64 = 1_700_000_000_000;
    const URL: &str = "https://www.youtube.com/watch?v=1";

    #[derive(Default)]
    struct RecordingNotifier {
        messages: RefCell<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, message: &str) {
            self.messages.borrow_mut().push(message.to_string());
        }
    }

    /// Tick handle that records when it is dropped
    struct Guard(Rc<Cell<bool>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    fn minutes(n: i64) -> i64 {
        n * 60_000
    }

    #[test]
    fn test_elapsed_minutes() {
        assert_eq!(elapsed_minutes(START, START + 125_000), 2);
        assert_eq!(elapsed_minutes(START, START), 0);
        assert_eq!(elapsed_minutes(START, START + 59_999), 0);
        assert!(elapsed_minutes(START, START - 5_000) <= 0);
        assert!(elapsed_minutes(i64::MAX, i64::MIN) <= 0);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "0 min");
        assert_eq!(format_elapsed(59), "59 min");
        assert_eq!(format_elapsed(61), "1 h 1 min");
        assert_eq!(format_elapsed(-3), "0 min");
    }

    #[test]
    fn test_start_creates_start_time_on_first_visit() {
        let store = MemoryStore::new();
        let mut engine: TimerEngine<()> = TimerEngine::new();

        let start = block_on(engine.start(&store, URL, START));

        assert!(start.first_visit);
        assert_eq!(start.domain, "youtube.com");
        assert_eq!(start.elapsed_minutes, 0);
        assert_eq!(store.value("siteStartTime_youtube.com"), Some(json!(START)));
    }

    #[test]
    fn test_start_resumes_stored_start_time() {
        let store = MemoryStore::new();
        store.insert("siteStartTime_youtube.com", json!(START as f64));
        store.insert("reminderSent_youtube.com", json!(true));
        let mut engine: TimerEngine<()> = TimerEngine::new();

        let start = block_on(engine.start(&store, URL, START + minutes(7)));

        assert!(!start.first_visit);
        assert_eq!(start.start_time, START);
        assert_eq!(start.elapsed_minutes, 7);
        assert!(start.reminder_sent);
        assert!(engine.reminder_sent("youtube.com"));
    }

    #[test]
    fn test_failed_read_keeps_stored_history() {
        let store = MemoryStore::new();
        store.insert("siteStartTime_youtube.com", json!(START));
        store.insert("reminderSent_youtube.com", json!(true));
        let settings = Settings::default();
        let categories = CategoryTable::fallback();
        let notifier = RecordingNotifier::default();
        let mut engine: TimerEngine<()> = TimerEngine::new();

        store.fail_next_reads(1);
        let now = START + minutes(45);
        let start = block_on(engine.start(&store, URL, now));

        assert!(!start.first_visit);
        assert_eq!(start.start_time, now);
        assert!(start.reminder_sent);
        assert_eq!(store.value("siteStartTime_youtube.com"), Some(json!(START)));

        let report = block_on(engine.tick(
            &store,
            start.generation,
            now + minutes(20),
            &settings,
            &categories,
            &notifier,
        ));
        assert!(!report.unwrap().reminder_fired);
        assert!(notifier.messages.borrow().is_empty());

        // The next successful read resumes from the stored start time
        let resumed = block_on(engine.start(&store, URL, now + minutes(21)));
        assert_eq!(resumed.start_time, START);
        assert_eq!(resumed.elapsed_minutes, 66);
    }

    #[test]
    fn test_failed_read_keeps_known_reminder_state() {
        let store = MemoryStore::new();
        let mut engine: TimerEngine<()> = TimerEngine::new();
        block_on(engine.start(&store, URL, START));

        store.fail_next_reads(1);
        let start = block_on(engine.start(&store, URL, START + minutes(3)));

        assert!(!start.reminder_sent);
        assert_eq!(store.value("siteStartTime_youtube.com"), Some(json!(START)));
    }

    #[test]
    fn test_reminder_fires_once() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let categories = CategoryTable::fallback();
        let notifier = RecordingNotifier::default();
        let mut engine: TimerEngine<()> = TimerEngine::new();

        let start = block_on(engine.start(&store, URL, START));
        let generation = start.generation;

        let before = block_on(engine.tick(
            &store,
            generation,
            START + minutes(9),
            &settings,
            &categories,
            &notifier,
        ));
        assert!(!before.unwrap().reminder_fired);

        let first = block_on(engine.tick(
            &store,
            generation,
            START + minutes(10),
            &settings,
            &categories,
            &notifier,
        ));
        assert!(first.unwrap().reminder_fired);

        let second = block_on(engine.tick(
            &store,
            generation,
            START + minutes(25),
            &settings,
            &categories,
            &notifier,
        ));
        assert!(!second.unwrap().reminder_fired);

        assert_eq!(notifier.messages.borrow().len(), 1);
        assert!(notifier.messages.borrow()[0].contains("youtube.com"));
        assert_eq!(store.value("reminderSent_youtube.com"), Some(json!(true)));
    }

    #[test]
    fn test_reminder_not_repeated_after_reopen() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let categories = CategoryTable::fallback();
        let notifier = RecordingNotifier::default();

        let mut engine: TimerEngine<()> = TimerEngine::new();
        let generation = block_on(engine.start(&store, URL, START)).generation;
        block_on(engine.tick(
            &store,
            generation,
            START + minutes(11),
            &settings,
            &categories,
            &notifier,
        ));

        // A new popup session rebuilds the mirror from storage
        let mut reopened: TimerEngine<()> = TimerEngine::new();
        let generation = block_on(reopened.start(&store, URL, START + minutes(12))).generation;
        let report = block_on(reopened.tick(
            &store,
            generation,
            START + minutes(13),
            &settings,
            &categories,
            &notifier,
        ));

        assert!(!report.unwrap().reminder_fired);
        assert_eq!(notifier.messages.borrow().len(), 1);
    }

    #[test]
    fn test_reminder_gating() {
        let store = MemoryStore::new();
        let categories = CategoryTable::fallback();
        let notifier = RecordingNotifier::default();
        let mut engine: TimerEngine<()> = TimerEngine::new();
        let generation = block_on(engine.start(&store, URL, START)).generation;

        let mut disabled = Settings::default();
        disabled.reminders_enabled = false;
        let report = block_on(engine.tick(
            &store,
            generation,
            START + minutes(30),
            &disabled,
            &categories,
            &notifier,
        ));
        assert!(!report.unwrap().reminder_fired);

        let mut category_off = Settings::default();
        category_off.enabled_categories.insert("entertainment".to_string(), false);
        let report = block_on(engine.tick(
            &store,
            generation,
            START + minutes(30),
            &category_off,
            &categories,
            &notifier,
        ));
        assert!(!report.unwrap().reminder_fired);

        assert!(notifier.messages.borrow().is_empty());
        assert!(!store.contains("reminderSent_youtube.com"));
    }

    #[test]
    fn test_other_category_never_reminds() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let mut engine: TimerEngine<()> = TimerEngine::new();
        let generation = block_on(engine.start(&store, "https://example.org", START)).generation;

        let report = block_on(engine.tick(
            &store,
            generation,
            START + minutes(60),
            &Settings::default(),
            &CategoryTable::fallback(),
            &notifier,
        ));

        assert_eq!(report.unwrap().elapsed_minutes, 60);
        assert!(notifier.messages.borrow().is_empty());
    }

    #[test]
    fn test_reset_starts_fresh() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let categories = CategoryTable::fallback();
        let notifier = RecordingNotifier::default();
        let mut engine: TimerEngine<()> = TimerEngine::new();

        let generation = block_on(engine.start(&store, URL, START)).generation;
        block_on(engine.tick(
            &store,
            generation,
            START + minutes(10),
            &settings,
            &categories,
            &notifier,
        ));
        assert!(store.contains("reminderSent_youtube.com"));

        let now = START + minutes(12);
        let restart = block_on(engine.reset(&store, now)).unwrap();

        assert!(restart.first_visit);
        assert_eq!(restart.start_time, now);
        assert_eq!(restart.elapsed_minutes, 0);
        assert!(!restart.reminder_sent);
        assert!(!store.contains("reminderSent_youtube.com"));
        assert_eq!(store.value("siteStartTime_youtube.com"), Some(json!(now)));

        // The reminder can fire again after the threshold passes once more
        let report = block_on(engine.tick(
            &store,
            restart.generation,
            now + minutes(10),
            &settings,
            &categories,
            &notifier,
        ));
        assert!(report.unwrap().reminder_fired);
        assert_eq!(notifier.messages.borrow().len(), 2);
    }

    #[test]
    fn test_reset_without_active_timer() {
        let store = MemoryStore::new();
        let mut engine: TimerEngine<()> = TimerEngine::new();

        let result = block_on(engine.reset(&store, START));

        assert!(matches!(result, Err(PopupError::NoActiveDomain)));
    }

    #[test]
    fn test_reset_keeps_timer_when_storage_fails() {
        let store = MemoryStore::new();
        let mut engine: TimerEngine<()> = TimerEngine::new();
        block_on(engine.start(&store, URL, START));
        store.fail_next_writes(2);

        let result = block_on(engine.reset(&store, START + minutes(5)));

        assert!(matches!(result, Err(PopupError::Store(_))));
        assert_eq!(engine.current_domain(), Some("youtube.com"));
        assert!(store.contains("siteStartTime_youtube.com"));
    }

    #[test]
    fn test_new_domain_cancels_previous_loop() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let categories = CategoryTable::fallback();
        let notifier = RecordingNotifier::default();
        let mut engine: TimerEngine<Guard> = TimerEngine::new();

        let a = block_on(engine.start(&store, URL, START));
        let a_stopped = Rc::new(Cell::new(false));
        assert!(engine.attach(a.generation, Guard(a_stopped.clone())));
        assert!(engine.is_ticking());

        let b = block_on(engine.start(&store, "https://www.reddit.com/r/rust", START));
        assert!(a_stopped.get());
        assert_eq!(engine.current_domain(), Some("reddit.com"));

        // A tick queued by A's loop is ignored
        let stale = block_on(engine.tick(
            &store,
            a.generation,
            START + minutes(30),
            &settings,
            &categories,
            &notifier,
        ));
        assert!(stale.is_none());
        assert!(!store.contains("reminderSent_youtube.com"));

        let live = block_on(engine.tick(
            &store,
            b.generation,
            START + minutes(30),
            &settings,
            &categories,
            &notifier,
        ));
        assert_eq!(live.unwrap().domain, "reddit.com");
        assert!(store.contains("reminderSent_reddit.com"));
    }

    #[test]
    fn test_attach_stale_handle_is_dropped() {
        let store = MemoryStore::new();
        let mut engine: TimerEngine<Guard> = TimerEngine::new();
        let a = block_on(engine.start(&store, URL, START));
        block_on(engine.start(&store, "https://github.com", START));

        let stopped = Rc::new(Cell::new(false));
        assert!(!engine.attach(a.generation, Guard(stopped.clone())));
        assert!(stopped.get());
        assert!(!engine.is_ticking());
    }

    #[test]
    fn test_reminder_persist_failure_still_fires_once() {
        let store = MemoryStore::new();
        let settings = Settings::default();
        let categories = CategoryTable::fallback();
        let notifier = RecordingNotifier::default();
        let mut engine: TimerEngine<()> = TimerEngine::new();
        let generation = block_on(engine.start(&store, URL, START)).generation;

        store.fail_next_writes(2);
        block_on(engine.tick(
            &store,
            generation,
            START + minutes(10),
            &settings,
            &categories,
            &notifier,
        ));
        block_on(engine.tick(
            &store,
            generation,
            START + minutes(11),
            &settings,
            &categories,
            &notifier,
        ));

        assert_eq!(notifier.messages.borrow().len(), 1);
        assert!(!store.contains("reminderSent_youtube.com"));
    }
}
