/// Popup UI: current site, elapsed time, reset and settings

use crate::chrome::{now_ms, BundledCategories, ChromeStorage, ChromeTabs};
use crate::notify::{Notifier, ToastNotifier, TOAST_ID};
use crate::session::{open_popup, PopupSession, SiteView};
use crate::settings::SettingsForm;
use crate::timer::TICK_INTERVAL_MS;
use crate::ui::components::{SettingsPanel, SiteSummary};
use futures::lock::Mutex;
use gloo_timers::callback::Interval;
use patternfly_yew::prelude::*;
use std::rc::Rc;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

/// Session shared by the UI handlers and the tick callback; the async lock
/// serialises ticks with resets and settings saves
type SharedSession = Rc<Mutex<PopupSession<ChromeStorage, Interval>>>;

#[derive(Clone, PartialEq)]
enum PopupState {
    Loading,
    Ready,
    Error(String),
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_state(|| PopupState::Loading);
    let site = use_state(|| None::<SiteView>);
    let elapsed = use_state(|| 0_i64);
    let session = use_state(|| None::<SharedSession>);
    // Some while the settings panel is open
    let settings_form = use_state(|| None::<SettingsForm>);
    let notifier = use_memo((), |_| ToastNotifier::new());

    // Settings, categories, active tab, then the timer
    {
        let state = state.clone();
        let site = site.clone();
        let elapsed = elapsed.clone();
        let session = session.clone();
        let notifier = notifier.clone();

        use_effect_with((), move |_| {
            spawn_local(async move {
                let opened = open_popup::<_, Interval, _, _, _>(
                    ChromeStorage,
                    &BundledCategories,
                    &ChromeTabs,
                    now_ms,
                )
                .await;

                match opened {
                    Ok(opened) => {
                        let generation = opened.timer.generation;
                        elapsed.set(opened.timer.elapsed_minutes);
                        site.set(Some(opened.site));

                        let shared: SharedSession = Rc::new(Mutex::new(opened.session));
                        start_ticking(shared.clone(), generation, elapsed, notifier).await;
                        session.set(Some(shared));
                        state.set(PopupState::Ready);
                    }
                    Err(e) => {
                        log::error!("Popup failed to open: {}", e);
                        state.set(PopupState::Error(format!("Failed to start timer: {}", e)));
                    }
                }
            });
            || ()
        });
    }

    let on_toggle = {
        let notifier = notifier.clone();
        Callback::from(move |_: MouseEvent| {
            log::info!("Toggle pressed");
            notifier.notify("Pausing tracking is coming soon");
        })
    };

    let on_reset = {
        let session = session.clone();
        let elapsed = elapsed.clone();
        let notifier = notifier.clone();

        Callback::from(move |_: MouseEvent| {
            let Some(shared) = (*session).clone() else {
                return;
            };
            let elapsed = elapsed.clone();
            let notifier = notifier.clone();

            spawn_local(async move {
                let restart = shared.lock().await.reset(now_ms()).await;
                match restart {
                    Ok(restart) => {
                        elapsed.set(0);
                        start_ticking(shared, restart.generation, elapsed, notifier).await;
                    }
                    Err(e) => {
                        log::error!("Reset failed: {}", e);
                        notifier.notify(&format!("Reset failed: {}", e));
                    }
                }
            });
        })
    };

    let on_open_settings = {
        let session = session.clone();
        let settings_form = settings_form.clone();

        Callback::from(move |_: MouseEvent| {
            let Some(shared) = (*session).clone() else {
                return;
            };
            let settings_form = settings_form.clone();

            spawn_local(async move {
                let form = shared.lock().await.settings_form();
                settings_form.set(Some(form));
            });
        })
    };

    let on_close_settings = {
        let settings_form = settings_form.clone();
        Callback::from(move |_: MouseEvent| {
            settings_form.set(None);
        })
    };

    let on_save_settings = {
        let session = session.clone();
        let settings_form = settings_form.clone();
        let notifier = notifier.clone();

        Callback::from(move |_: MouseEvent| {
            let (Some(shared), Some(form)) = ((*session).clone(), (*settings_form).clone()) else {
                return;
            };
            let settings_form = settings_form.clone();
            let notifier = notifier.clone();

            spawn_local(async move {
                let saved = shared.lock().await.apply_settings(&form).await;
                match saved {
                    Ok(()) => notifier.notify("Settings saved"),
                    Err(e) => {
                        log::error!("Saving settings failed: {}", e);
                        notifier.notify(&format!("Settings could not be saved: {}", e));
                    }
                }
                settings_form.set(None);
            });
        })
    };

    let update_form = {
        let settings_form = settings_form.clone();
        move |edit: Box<dyn Fn(&mut SettingsForm)>| {
            if let Some(mut form) = (*settings_form).clone() {
                edit(&mut form);
                settings_form.set(Some(form));
            }
        }
    };

    let on_reminders_toggle = {
        let update_form = update_form.clone();
        Callback::from(move |enabled: bool| {
            update_form(Box::new(move |form: &mut SettingsForm| form.reminders_enabled = enabled));
        })
    };

    let on_interval_input = {
        let update_form = update_form.clone();
        Callback::from(move |value: String| {
            update_form(Box::new(move |form: &mut SettingsForm| {
                form.reminder_interval = value.clone()
            }));
        })
    };

    let on_category_toggle = {
        let update_form = update_form.clone();
        Callback::from(move |(key, checked): (String, bool)| {
            update_form(Box::new(move |form: &mut SettingsForm| form.set_category(&key, checked)));
        })
    };

    let is_ready = matches!(*state, PopupState::Ready);

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"Site Time Companion"}</h1>

            {match &*state {
                PopupState::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                        <p class="loading-text">{"Loading..."}</p>
                    </div>
                },
                PopupState::Error(err) => html! {
                    <div class="message-top-margin">
                        <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                            {err.clone()}
                        </Alert>
                    </div>
                },
                PopupState::Ready => html! {}
            }}

            <SiteSummary site={(*site).clone()} elapsed_minutes={*elapsed} />

            <div class="button-row">
                <button id="toggleBtn" onclick={on_toggle} disabled={!is_ready}>{"Pause"}</button>
                <button id="settingsBtn" onclick={on_open_settings} disabled={!is_ready}>
                    {"Settings"}
                </button>
                <button id="resetBtn" onclick={on_reset} disabled={!is_ready}>{"Reset"}</button>
            </div>

            if let Some(form) = (*settings_form).clone() {
                <SettingsPanel
                    form={form}
                    on_reminders_toggle={on_reminders_toggle}
                    on_interval_input={on_interval_input}
                    on_category_toggle={on_category_toggle}
                    on_save={on_save_settings}
                    on_close={on_close_settings}
                />
            }

            <div id={TOAST_ID} class="toast"></div>

            <p class="footer-popup">
                {"Site Time Companion v0.1.0"}
            </p>
        </div>
    }
}

/// Start the repeating tick for `generation` and hand its handle to the session
async fn start_ticking(
    shared: SharedSession,
    generation: u64,
    elapsed: UseStateHandle<i64>,
    notifier: Rc<ToastNotifier>,
) {
    let tick_session = shared.clone();
    let interval = Interval::new(TICK_INTERVAL_MS, move || {
        let session = tick_session.clone();
        let elapsed = elapsed.clone();
        let notifier = notifier.clone();

        spawn_local(async move {
            let report = session
                .lock()
                .await
                .tick(generation, now_ms(), notifier.as_ref())
                .await;
            if let Some(report) = report {
                elapsed.set(report.elapsed_minutes);
            }
        });
    });

    shared.lock().await.attach_ticker(generation, interval);
}
