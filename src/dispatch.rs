use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{AgentError, Result};
use crate::hands::BrowserCapability;
use crate::types::{Action, KeyCode, Observation};

/// Turns one [`Action`] into browser primitives and reports what the page looks like afterwards.
#[derive(Clone)]
pub struct Dispatcher {
    browser: Arc<dyn BrowserCapability>,
    wait_duration: Duration,
}

impl Dispatcher {
    pub fn new(browser: Arc<dyn BrowserCapability>, wait_duration: Duration) -> Self {
        Self {
            browser,
            wait_duration,
        }
    }

    /// Blocking. Run it off the async runtime.
    pub fn execute(&self, action: &Action) -> Result<Observation> {
        self.perform(action).map_err(|source| AgentError::Action {
            kind: action.kind().to_string(),
            source,
        })?;
        self.observe()
    }

    fn perform(&self, action: &Action) -> anyhow::Result<()> {
        let browser = &self.browser;
        match action {
            Action::Screenshot => {}
            Action::Type { text } => browser.type_text(text)?,
            Action::Click { x, y, button } => browser.click(*x, *y, *button)?,
            Action::DoubleClick { x, y } => browser.double_click(*x, *y)?,
            Action::Move { x, y } => browser.move_pointer(*x, *y)?,
            Action::Scroll {
                x,
                y,
                scroll_x,
                scroll_y,
            } => browser.scroll(*x, *y, *scroll_x, *scroll_y)?,
            Action::KeyPress { keys } => {
                let keys = translate_keys(keys);
                if !keys.is_empty() {
                    browser.key_press(&keys)?;
                }
            }
            Action::Wait => std::thread::sleep(self.wait_duration),
            Action::Unrecognized { kind } => {
                warn!(%kind, "action is not implemented, skipping");
            }
        }
        debug!(kind = action.kind(), "action performed");
        Ok(())
    }

    /// Capture the screenshot and location that make up an [`Observation`].
    pub fn observe(&self) -> Result<Observation> {
        let screenshot = self
            .browser
            .screenshot()
            .map_err(|source| AgentError::Capture {
                what: "screenshot",
                source,
            })?;
        if screenshot.is_empty() {
            return Err(AgentError::Capture {
                what: "screenshot",
                source: anyhow::anyhow!("browser returned an empty image"),
            });
        }

        let location = self
            .browser
            .current_location()
            .map_err(|source| AgentError::Capture {
                what: "current location",
                source,
            })?;

        Ok(Observation {
            screenshot,
            location,
        })
    }
}

/// Map key names to key codes, dropping the ones we cannot press.
fn translate_keys(names: &[String]) -> Vec<KeyCode> {
    names
        .iter()
        .filter_map(|name| {
            let key = KeyCode::from_name(name);
            if key.is_none() {
                warn!(key = %name, "key is not implemented, skipping");
            }
            key
        })
        .collect()
}
