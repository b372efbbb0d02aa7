/// Non-blocking notifications shown in the popup

use gloo_timers::callback::Timeout;
use std::cell::RefCell;

/// DOM id of the toast element
pub const TOAST_ID: &str = "toast";

/// How long a toast stays visible
pub const TOAST_DISMISS_MS: u32 = 3000;

pub trait Notifier {
    fn notify(&self, message: &str);
}

/// Shows messages in the `#toast` element, or a blocking alert if it is missing
pub struct ToastNotifier {
    dismiss: RefCell<Option<Timeout>>,
    fallback: Box<dyn Fn(&str)>,
}

impl Default for ToastNotifier {
    fn default() -> Self {
        Self::with_fallback(alert)
    }
}

impl ToastNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `fallback` instead of `alert` when there is no toast element
    pub fn with_fallback(fallback: impl Fn(&str) + 'static) -> Self {
        ToastNotifier {
            dismiss: RefCell::new(None),
            fallback: Box::new(fallback),
        }
    }
}

fn alert(message: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.alert_with_message(message);
    }
}

impl Notifier for ToastNotifier {
    fn notify(&self, message: &str) {
        let toast = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id(TOAST_ID));

        match toast {
            Some(toast) => {
                toast.set_text_content(Some(message));
                if let Err(e) = toast.class_list().add_1("show") {
                    log::warn!("Failed to show toast: {:?}", e);
                }

                // Replacing the handle cancels any pending dismissal
                let element = toast.clone();
                let handle = Timeout::new(TOAST_DISMISS_MS, move || {
                    let _ = element.class_list().remove_1("show");
                });
                self.dismiss.replace(Some(handle));
            }
            None => {
                log::warn!("Toast element missing, falling back to alert");
                (self.fallback)(message);
            }
        }
    }
}
