use anyhow::{anyhow, Context, Result};
use tauri::{AppHandle, Manager};
use tauri_plugin_opener::OpenerExt;
use url::Url;

use super::{BrowserOpener, ContextHandle};

/// The system browser. Once handed off it cannot be observed, so it never
/// reports closed.
struct SystemBrowser;

impl ContextHandle for SystemBrowser {
    fn is_closed(&self) -> bool {
        false
    }
}

pub struct TauriOpener {
    app_handle: AppHandle,
}

impl TauriOpener {
    pub fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }
}

impl BrowserOpener for TauriOpener {
    fn open_new_context(&self, url: &str) -> Result<Box<dyn ContextHandle>> {
        self.app_handle
            .opener()
            .open_url(url, None::<&str>)
            .map_err(|err| anyhow!("failed to open {url} in the system browser: {err}"))?;
        Ok(Box::new(SystemBrowser))
    }

    fn navigate_current(&self, url: &str) -> Result<()> {
        let target = Url::parse(url).with_context(|| format!("invalid checkout url '{url}'"))?;
        let window = self
            .app_handle
            .get_webview_window("main")
            .ok_or_else(|| anyhow!("main window is not available"))?;
        window
            .navigate(target)
            .map_err(|err| anyhow!("failed to navigate main window: {err}"))
    }
}
