//! Browser collaborator. Handlers only talk to [`Browser`]; the real session is
//! a W3C WebDriver client, tests and `--dry-run` use [`RecordingBrowser`].

pub mod recording;
pub mod webdriver;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

pub use recording::RecordingBrowser;
pub use webdriver::WebDriver;

pub trait Browser {
    fn navigate(&mut self, url: &str) -> Result<()>;
    fn current_url(&mut self) -> Result<String>;
    fn title(&mut self) -> Result<String>;
    fn back(&mut self) -> Result<()>;
    fn refresh(&mut self) -> Result<()>;

    /// Number of elements matching a CSS selector in the current frame.
    fn count_elements(&mut self, selector: &str) -> Result<usize>;
    fn click(&mut self, selector: &str) -> Result<()>;
    fn send_keys(&mut self, selector: &str, text: &str) -> Result<()>;
    fn hover(&mut self, selector: &str) -> Result<()>;
    fn scroll_to(&mut self, selector: &str) -> Result<()>;
    /// Attribute of the first element matching `selector`.
    fn attribute(&mut self, selector: &str, name: &str) -> Result<Option<String>>;

    /// Runs `script` as a function body; `arguments[i]` are `args`.
    fn execute_script(&mut self, script: &str, args: Vec<Value>) -> Result<Value>;
    /// Like [`execute_script`](Self::execute_script), but the result is the
    /// value passed to the callback appended as the last argument.
    fn execute_async_script(&mut self, script: &str, args: Vec<Value>) -> Result<Value>;

    fn set_window_size(&mut self, width: u32, height: u32) -> Result<()>;
    /// Grows the window so the whole document fits without scrolling.
    fn fit_window_to_content(&mut self) -> Result<()>;
    fn screenshot(&mut self, path: &Path, selector: Option<&str>) -> Result<()>;
    fn add_cookie(&mut self, cookie: &Value) -> Result<()>;
    /// `None` returns to the top-level document.
    fn switch_frame(&mut self, selector: Option<&str>) -> Result<()>;

    fn wait_loaded(&mut self, timeout: Duration) -> Result<()>;
    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<()>;
    fn quit(&mut self) -> Result<()>;
}

/// Joins a relative target onto the scheme and host of `current`.
/// Targets starting with `http` are returned unchanged.
pub fn resolve_url(current: &str, target: &str) -> String {
    let target = target.trim();
    if target.starts_with("http") {
        return target.to_string();
    }
    let path = if target.starts_with('/') {
        target.to_string()
    } else {
        format!("/{target}")
    };
    match origin(current) {
        Some(origin) => format!("{origin}{path}"),
        None => path,
    }
}

/// `scheme://host[:port]` of a URL, `None` for URLs without a host.
pub fn origin(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let mut origin = format!("{}://{host}", parsed.scheme());
    if let Some(port) = parsed.port() {
        origin.push_str(&format!(":{port}"));
    }
    Some(origin)
}

/// Navigates to `target` (relative targets stay on the current site) and
/// waits for the page to settle.
pub fn open(browser: &mut dyn Browser, target: &str, timeout: Duration) -> Result<()> {
    let url = if target.trim().starts_with("http") {
        target.trim().to_string()
    } else {
        let current = browser.current_url()?;
        resolve_url(&current, target)
    };
    debug!("goto url: {url}");
    browser.navigate(&url)?;
    browser.wait_loaded(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_targets_keep_the_current_origin() {
        let cur = "https://example.com:8443/app/page?x=1";
        assert_eq!(resolve_url(cur, "/login"), "https://example.com:8443/login");
        assert_eq!(resolve_url(cur, "servlet/Browse"), "https://example.com:8443/servlet/Browse");
        assert_eq!(resolve_url(cur, "http://other.org/"), "http://other.org/");
        assert_eq!(resolve_url("about:blank", "/x"), "/x");
    }

    #[test]
    fn open_waits_after_navigation() -> Result<()> {
        let mut b = RecordingBrowser::new().with_url("http://site.test/start");
        open(&mut b, "/next", Duration::from_secs(1))?;
        assert_eq!(b.current_url()?, "http://site.test/next");
        assert_eq!(
            b.calls(),
            &["navigate http://site.test/next".to_string(), "wait_loaded".to_string()]
        );
        Ok(())
    }
}
