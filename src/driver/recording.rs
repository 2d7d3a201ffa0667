use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Result, bail};
use serde_json::Value;

use super::Browser;

/// In-memory browser. Every side-effecting call is appended to [`calls`] as a
/// short line (`"click #ok"`); queries answer from a scripted page.
///
/// [`calls`]: RecordingBrowser::calls
#[derive(Debug, Clone)]
pub struct RecordingBrowser {
    url: String,
    history: Vec<String>,
    titles: HashMap<String, String>,
    elements: HashMap<String, usize>,
    attributes: HashMap<(String, String), String>,
    script_results: Vec<(String, Value)>,
    strict: bool,
    window: (u32, u32),
    frame: Option<String>,
    cookies: Vec<Value>,
    calls: Vec<String>,
}

impl Default for RecordingBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBrowser {
    pub fn new() -> Self {
        Self {
            url: "about:blank".to_string(),
            history: Vec::new(),
            titles: HashMap::new(),
            elements: HashMap::new(),
            attributes: HashMap::new(),
            script_results: Vec::new(),
            strict: false,
            window: (1920, 1080),
            frame: None,
            cookies: Vec::new(),
            calls: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn with_title(mut self, url: &str, title: &str) -> Self {
        self.titles.insert(url.to_string(), title.to_string());
        self
    }

    pub fn with_elements(mut self, selector: &str, count: usize) -> Self {
        self.elements.insert(selector.to_string(), count);
        self
    }

    pub fn with_attribute(mut self, selector: &str, name: &str, value: &str) -> Self {
        self.attributes
            .insert((selector.to_string(), name.to_string()), value.to_string());
        self
    }

    /// Scripts containing `needle` return `result`; first match wins.
    pub fn with_script_result(mut self, needle: &str, result: Value) -> Self {
        self.script_results.push((needle.to_string(), result));
        self
    }

    /// Element interactions fail unless the selector was registered with
    /// [`with_elements`](Self::with_elements).
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    pub fn cookies(&self) -> &[Value] {
        &self.cookies
    }

    pub fn window(&self) -> (u32, u32) {
        self.window
    }

    pub fn frame(&self) -> Option<&str> {
        self.frame.as_deref()
    }

    fn record(&mut self, line: String) {
        self.calls.push(line);
    }

    /// Records the call and answers with the first registered result whose
    /// needle occurs in `script`, or null.
    fn scripted(&mut self, kind: &str, script: &str, args: Vec<Value>) -> Value {
        if args.is_empty() {
            self.record(format!("{kind} {script}"));
        } else {
            self.record(format!("{kind} {script} {}", Value::Array(args)));
        }
        self.script_results
            .iter()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null)
    }

    fn require(&self, selector: &str) -> Result<()> {
        if self.strict && self.elements.get(selector).copied().unwrap_or(0) == 0 {
            bail!("no element matches selector '{selector}'");
        }
        Ok(())
    }
}

impl Browser for RecordingBrowser {
    fn navigate(&mut self, url: &str) -> Result<()> {
        let prev = std::mem::replace(&mut self.url, url.to_string());
        self.history.push(prev);
        self.frame = None;
        self.record(format!("navigate {url}"));
        Ok(())
    }

    fn current_url(&mut self) -> Result<String> {
        Ok(self.url.clone())
    }

    fn title(&mut self) -> Result<String> {
        Ok(self.titles.get(&self.url).cloned().unwrap_or_default())
    }

    fn back(&mut self) -> Result<()> {
        if let Some(prev) = self.history.pop() {
            self.url = prev;
        }
        self.record("back".to_string());
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.record("refresh".to_string());
        Ok(())
    }

    fn count_elements(&mut self, selector: &str) -> Result<usize> {
        Ok(self.elements.get(selector).copied().unwrap_or(0))
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        self.require(selector)?;
        self.record(format!("click {selector}"));
        Ok(())
    }

    fn send_keys(&mut self, selector: &str, text: &str) -> Result<()> {
        self.require(selector)?;
        self.record(format!("send_keys {selector}={text}"));
        Ok(())
    }

    fn hover(&mut self, selector: &str) -> Result<()> {
        self.require(selector)?;
        self.record(format!("hover {selector}"));
        Ok(())
    }

    fn scroll_to(&mut self, selector: &str) -> Result<()> {
        self.require(selector)?;
        self.record(format!("scroll_to {selector}"));
        Ok(())
    }

    fn attribute(&mut self, selector: &str, name: &str) -> Result<Option<String>> {
        self.require(selector)?;
        Ok(self
            .attributes
            .get(&(selector.to_string(), name.to_string()))
            .cloned())
    }

    fn execute_script(&mut self, script: &str, args: Vec<Value>) -> Result<Value> {
        Ok(self.scripted("script", script, args))
    }

    fn execute_async_script(&mut self, script: &str, args: Vec<Value>) -> Result<Value> {
        Ok(self.scripted("async_script", script, args))
    }

    fn set_window_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.window = (width, height);
        self.record(format!("resize {width}x{height}"));
        Ok(())
    }

    fn fit_window_to_content(&mut self) -> Result<()> {
        self.record("fit_window".to_string());
        Ok(())
    }

    fn screenshot(&mut self, path: &Path, selector: Option<&str>) -> Result<()> {
        match selector {
            Some(sel) => {
                self.require(sel)?;
                self.record(format!("screenshot {}={sel}", path.display()));
            }
            None => self.record(format!("screenshot {}", path.display())),
        }
        Ok(())
    }

    fn add_cookie(&mut self, cookie: &Value) -> Result<()> {
        self.cookies.push(cookie.clone());
        self.record(format!("cookie {cookie}"));
        Ok(())
    }

    fn switch_frame(&mut self, selector: Option<&str>) -> Result<()> {
        match selector {
            Some(sel) => {
                self.require(sel)?;
                self.frame = Some(sel.to_string());
                self.record(format!("frame {sel}"));
            }
            None => {
                self.frame = None;
                self.record("frame top".to_string());
            }
        }
        Ok(())
    }

    fn wait_loaded(&mut self, _timeout: Duration) -> Result<()> {
        self.record("wait_loaded".to_string());
        Ok(())
    }

    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        if self.strict && self.elements.get(selector).copied().unwrap_or(0) == 0 {
            bail!(
                "timed out after {}s waiting for '{selector}'",
                timeout.as_secs()
            );
        }
        self.record(format!("wait_for {selector}"));
        Ok(())
    }

    fn quit(&mut self) -> Result<()> {
        self.record("quit".to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn back_restores_previous_url() -> Result<()> {
        let mut b = RecordingBrowser::new().with_url("http://a.test/");
        b.navigate("http://a.test/two")?;
        b.back()?;
        assert_eq!(b.current_url()?, "http://a.test/");
        Ok(())
    }

    #[test]
    fn strict_mode_rejects_unknown_selectors() {
        let mut b = RecordingBrowser::new().strict().with_elements("#ok", 1);
        assert!(b.click("#ok").is_ok());
        assert!(b.click("#missing").is_err());
        assert!(b.wait_for("#missing", Duration::from_secs(2)).is_err());
    }

    #[test]
    fn scripted_results_match_by_substring() -> Result<()> {
        let mut b = RecordingBrowser::new().with_script_result("document.title", json!("Home"));
        assert_eq!(b.execute_script("return document.title", vec![])?, json!("Home"));
        assert_eq!(b.execute_script("return 1", vec![])?, Value::Null);
        Ok(())
    }
}
