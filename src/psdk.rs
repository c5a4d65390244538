use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::config::PsdkConfig;
use crate::controller::ServoController;
use crate::error::PsdkError;

/// Display surface of the ground-control app. Pushes are best-effort: an
/// unavailable sink is logged by the caller, never fatal.
pub trait StatusSink: Send + Sync {
    fn push_status(&self, text: &str) -> Result<(), PsdkError>;
}

/// Widget surface of the ground-control app.
pub trait WidgetBackend: Send + Sync {
    fn register_button(&self, config: &PsdkConfig) -> Result<(), PsdkError>;
}

/// Console-backed stand-in for the vendor payload SDK. Status pushes land in
/// the debug log; button registration is announced and always succeeds.
pub struct ConsolePayload;

impl StatusSink for ConsolePayload {
    fn push_status(&self, text: &str) -> Result<(), PsdkError> {
        debug!("status update: {}", text);
        Ok(())
    }
}

impl WidgetBackend for ConsolePayload {
    fn register_button(&self, config: &PsdkConfig) -> Result<(), PsdkError> {
        info!(
            "button '{}' ({}) registered: {}",
            config.button_name, config.button_id, config.button_description
        );
        Ok(())
    }
}

/// Command ingress for widget events delivered on the SDK callback thread.
///
/// The SDK reports the pressed level on every callback, not just on
/// transitions, so the handler keeps the last observed level and toggles only
/// on the release-to-press edge. A release re-arms the edge detector.
pub struct ButtonHandler {
    button_id: String,
    last_pressed: AtomicBool,
    controller: Arc<ServoController>,
}

impl ButtonHandler {
    pub fn new(button_id: impl Into<String>, controller: Arc<ServoController>) -> Self {
        ButtonHandler {
            button_id: button_id.into(),
            last_pressed: AtomicBool::new(false),
            controller,
        }
    }

    pub fn button_id(&self) -> &str {
        &self.button_id
    }

    /// Runs synchronously on the calling (SDK) thread.
    pub fn handle_event(&self, widget_id: &str, is_pressed: bool) {
        if widget_id != self.button_id {
            return;
        }

        let was_pressed = self.last_pressed.swap(is_pressed, Ordering::AcqRel);
        if is_pressed && !was_pressed {
            info!("button '{}' pressed, toggling servo", self.button_id);
            if let Err(err) = self.controller.toggle() {
                // The controller already logged the refusal.
                debug!("toggle rejected: {}", err);
            }
        }
    }
}
