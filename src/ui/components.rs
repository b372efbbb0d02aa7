/// Reusable UI components

use crate::session::SiteView;
use crate::settings::SettingsForm;
use crate::timer::format_elapsed;
use web_sys::HtmlInputElement;
use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct SiteSummaryProps {
    pub site: Option<SiteView>,
    pub elapsed_minutes: i64,
}

/// Current site, its category and the elapsed time
#[function_component(SiteSummary)]
pub fn site_summary(props: &SiteSummaryProps) -> Html {
    let (domain, category) = match &props.site {
        Some(site) => (site.domain.clone(), site.category_label.clone()),
        None => ("-".to_string(), "-".to_string()),
    };

    html! {
        <div class="site-summary">
            <p class="site-row">
                <span class="site-label">{"Site: "}</span>
                <span id="siteUrl">{domain}</span>
            </p>
            <p class="site-row">
                <span class="site-label">{"Category: "}</span>
                <span id="siteCategory">{category}</span>
            </p>
            <div id="timeDisplay" class="time-display">
                {format_elapsed(props.elapsed_minutes)}
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct SettingsPanelProps {
    pub form: SettingsForm,
    pub on_reminders_toggle: Callback<bool>,
    pub on_interval_input: Callback<String>,
    /// (category key, checked)
    pub on_category_toggle: Callback<(String, bool)>,
    pub on_save: Callback<MouseEvent>,
    pub on_close: Callback<MouseEvent>,
}

#[function_component(SettingsPanel)]
pub fn settings_panel(props: &SettingsPanelProps) -> Html {
    let on_reminders_change = {
        let on_reminders_toggle = props.on_reminders_toggle.clone();
        Callback::from(move |e: Event| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                on_reminders_toggle.emit(input.checked());
            }
        })
    };

    let on_interval = {
        let on_interval_input = props.on_interval_input.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                on_interval_input.emit(input.value());
            }
        })
    };

    html! {
        <div id="settingsPanel" class="settings-panel">
            <h2 class="settings-title">{"Settings"}</h2>

            <label class="settings-row">
                <input
                    type="checkbox"
                    id="remindersEnabled"
                    checked={props.form.reminders_enabled}
                    onchange={on_reminders_change}
                />
                {" Enable reminders"}
            </label>

            <label class="settings-row">
                {"Remind me after "}
                <input
                    type="number"
                    id="reminderInterval"
                    min="1"
                    value={props.form.reminder_interval.clone()}
                    oninput={on_interval}
                />
                {" minutes"}
            </label>

            <div class="category-list">
                {for props.form.categories.iter().map(|(key, label, checked)| {
                    let on_category_toggle = props.on_category_toggle.clone();
                    let key_for_change = key.clone();
                    let onchange = Callback::from(move |e: Event| {
                        if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                            on_category_toggle.emit((key_for_change.clone(), input.checked()));
                        }
                    });

                    html! {
                        <label class="settings-row" key={key.clone()}>
                            <input
                                type="checkbox"
                                class="category-checkbox"
                                data-cat={key.clone()}
                                checked={*checked}
                                onchange={onchange}
                            />
                            {format!(" {}", label)}
                        </label>
                    }
                })}
            </div>

            <div class="settings-actions">
                <button id="saveSettingsBtn" onclick={props.on_save.clone()}>{"Save"}</button>
                <button id="closeSettingsBtn" onclick={props.on_close.clone()}>{"Close"}</button>
            </div>
        </div>
    }
}
