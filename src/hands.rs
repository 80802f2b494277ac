use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use headless_chrome::browser::tab::point::Point;
use headless_chrome::protocol::cdp::{Emulation, Input};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info};

use crate::config::BrowserConfig;
use crate::types::{KeyCode, MouseButton};

/// Time given to the page to react after an input event.
const SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Blocking browser primitives against a single active page.
///
/// Every mutating call returns only once the effect has had time to settle, so a
/// screenshot taken right after reflects it.
pub trait BrowserCapability: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
    fn screenshot(&self) -> Result<Vec<u8>>;
    fn current_location(&self) -> Result<String>;
    fn click(&self, x: i64, y: i64, button: MouseButton) -> Result<()>;
    fn double_click(&self, x: i64, y: i64) -> Result<()>;
    fn move_pointer(&self, x: i64, y: i64) -> Result<()>;
    fn type_text(&self, text: &str) -> Result<()>;
    fn scroll(&self, x: i64, y: i64, scroll_x: i64, scroll_y: i64) -> Result<()>;
    fn key_press(&self, keys: &[KeyCode]) -> Result<()>;
    /// Release the page and the browser. Safe to call more than once.
    fn close(&self) -> Result<()>;
}

/// Chrome driven over the DevTools protocol, owning exactly one tab.
pub struct HeadlessBrowser {
    browser: Mutex<Option<Browser>>,
    tab: Mutex<Option<Arc<Tab>>>,
    viewport: (u32, u32),
}

impl HeadlessBrowser {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        let options = LaunchOptions {
            headless: config.headless,
            path: config.chrome_path.clone(),
            window_size: Some((config.width, config.height)),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-infobars"),
                OsStr::new("--hide-scrollbars"),
            ],
            idle_browser_timeout: config.idle_timeout,
            ..Default::default()
        };

        info!(headless = config.headless, width = config.width, height = config.height, "launching Chrome");
        let browser = Browser::new(options).context("Browser launch failed")?;
        Ok(Self::from_browser(browser, config))
    }

    /// Attach to a Chrome that is already running with remote debugging enabled.
    ///
    /// Only the viewport size is taken from `config`; the launch settings are ignored.
    pub fn connect(debugger_url: &str, config: &BrowserConfig) -> Result<Self> {
        info!(%debugger_url, width = config.width, height = config.height, "attaching to existing Chrome");
        let browser = Browser::connect(debugger_url.to_string())
            .with_context(|| format!("Could not attach to Chrome at {debugger_url}"))?;
        Ok(Self::from_browser(browser, config))
    }

    fn from_browser(browser: Browser, config: &BrowserConfig) -> Self {
        Self {
            browser: Mutex::new(Some(browser)),
            tab: Mutex::new(None),
            viewport: (config.width, config.height),
        }
    }

    /// Pin the page's layout viewport to the size declared to the decision service,
    /// whatever the window around it looks like.
    fn pin_viewport(&self, tab: &Tab) -> Result<()> {
        let (width, height) = self.viewport;
        tab.call_method(viewport_override(width, height))
            .context("could not set viewport size")?;
        debug!(width, height, "viewport pinned");
        Ok(())
    }

    fn page(&self) -> Result<Arc<Tab>> {
        self.tab
            .lock()
            .map_err(|_| anyhow!("browser state poisoned"))?
            .clone()
            .ok_or_else(|| anyhow!("no page is open"))
    }

    fn mouse_event(
        tab: &Tab,
        kind: Input::DispatchMouseEventTypeOption,
        x: i64,
        y: i64,
        button: Option<Input::MouseButton>,
        click_count: Option<u32>,
        delta: Option<(i64, i64)>,
    ) -> Result<()> {
        tab.call_method(Input::DispatchMouseEvent {
            Type: kind,
            x: x as f64,
            y: y as f64,
            modifiers: None,
            timestamp: None,
            button,
            buttons: None,
            click_count,
            force: None,
            tangential_pressure: None,
            tilt_x: None,
            tilt_y: None,
            twist: None,
            delta_x: delta.map(|(dx, _)| dx as f64),
            delta_y: delta.map(|(_, dy)| dy as f64),
            pointer_Type: None,
        })?;
        Ok(())
    }

    fn press_and_release(tab: &Tab, x: i64, y: i64, button: Input::MouseButton, clicks: u32) -> Result<()> {
        use Input::DispatchMouseEventTypeOption::{MousePressed, MouseReleased};
        Self::mouse_event(tab, MousePressed, x, y, Some(button.clone()), Some(clicks), None)?;
        Self::mouse_event(tab, MouseReleased, x, y, Some(button), Some(clicks), None)
    }
}

fn viewport_override(width: u32, height: u32) -> Emulation::SetDeviceMetricsOverride {
    Emulation::SetDeviceMetricsOverride {
        width,
        height,
        device_scale_factor: 1.0,
        mobile: false,
        scale: None,
        screen_width: None,
        screen_height: None,
        position_x: None,
        position_y: None,
        dont_set_visible_size: None,
        screen_orientation: None,
        viewport: None,
        display_feature: None,
        device_posture: None,
    }
}

fn cdp_button(button: MouseButton) -> Input::MouseButton {
    match button {
        MouseButton::Left => Input::MouseButton::Left,
        MouseButton::Right => Input::MouseButton::Right,
        MouseButton::Middle => Input::MouseButton::Middle,
    }
}

impl BrowserCapability for HeadlessBrowser {
    fn open(&self, url: &str) -> Result<()> {
        let mut slot = self.tab.lock().map_err(|_| anyhow!("browser state poisoned"))?;
        if slot.is_some() {
            bail!("a page is already open; only one page per session is supported");
        }

        let tab = {
            let browser = self.browser.lock().map_err(|_| anyhow!("browser state poisoned"))?;
            let browser = browser.as_ref().ok_or_else(|| anyhow!("browser is closed"))?;
            browser.new_tab()?
        };
        self.pin_viewport(&tab)?;
        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;
        debug!(%url, "page opened");
        *slot = Some(tab);
        Ok(())
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        let tab = self.page()?;
        tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .context("error taking screenshot")
    }

    fn current_location(&self) -> Result<String> {
        let tab = self.page()?;
        let result = tab.evaluate("window.location.href", false)?;
        result
            .value
            .and_then(|v| v.as_str().map(String::from))
            .ok_or_else(|| anyhow!("page did not report a location"))
    }

    fn click(&self, x: i64, y: i64, button: MouseButton) -> Result<()> {
        let tab = self.page()?;
        self.move_pointer(x, y)?;
        Self::press_and_release(&tab, x, y, cdp_button(button), 1)?;
        std::thread::sleep(SETTLE_DELAY);
        Ok(())
    }

    fn double_click(&self, x: i64, y: i64) -> Result<()> {
        let tab = self.page()?;
        self.move_pointer(x, y)?;
        Self::press_and_release(&tab, x, y, Input::MouseButton::Left, 1)?;
        Self::press_and_release(&tab, x, y, Input::MouseButton::Left, 2)?;
        std::thread::sleep(SETTLE_DELAY);
        Ok(())
    }

    fn move_pointer(&self, x: i64, y: i64) -> Result<()> {
        let tab = self.page()?;
        tab.move_mouse_to_point(Point {
            x: x as f64,
            y: y as f64,
        })?;
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<()> {
        let tab = self.page()?;
        tab.call_method(Input::InsertText {
            text: text.to_string(),
        })?;
        Ok(())
    }

    fn scroll(&self, x: i64, y: i64, scroll_x: i64, scroll_y: i64) -> Result<()> {
        let tab = self.page()?;
        self.move_pointer(x, y)?;
        Self::mouse_event(
            &tab,
            Input::DispatchMouseEventTypeOption::MouseWheel,
            x,
            y,
            None,
            None,
            Some((scroll_x, scroll_y)),
        )?;
        std::thread::sleep(SETTLE_DELAY);
        Ok(())
    }

    fn key_press(&self, keys: &[KeyCode]) -> Result<()> {
        let tab = self.page()?;
        for key in keys {
            tab.press_key(key.dom_key())?;
        }
        std::thread::sleep(SETTLE_DELAY);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let tab = self
            .tab
            .lock()
            .map_err(|_| anyhow!("browser state poisoned"))?
            .take();
        if let Some(tab) = tab {
            if let Err(e) = tab.close(false) {
                debug!("tab close failed: {e:#}");
            }
        }
        // Dropping a launched Browser terminates the Chrome process.
        let browser = self
            .browser
            .lock()
            .map_err(|_| anyhow!("browser state poisoned"))?
            .take();
        if browser.is_some() {
            info!("browser closed");
        }
        Ok(())
    }
}

impl Drop for HeadlessBrowser {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
