use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result, anyhow, bail};
use base64::Engine as _;
use reqwest::blocking::Client;
use reqwest::{Method, Url};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::Browser;
use crate::kernel::config::{BrowserKind, Config};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const POLL_INTERVAL: Duration = Duration::from_millis(200);

const READY_SCRIPT: &str = "return document.readyState === 'complete' && \
    window.performance.getEntriesByType('resource').filter(r => r.responseEnd === 0).length === 0";

const CONTENT_SIZE_SCRIPT: &str = "return [\
    Math.max(document.documentElement.scrollWidth, document.body ? document.body.scrollWidth : 0), \
    Math.max(document.documentElement.scrollHeight, document.body ? document.body.scrollHeight : 0), \
    window.outerWidth - window.innerWidth, window.outerHeight - window.innerHeight];";

/// Minimal W3C WebDriver client speaking to chromedriver, geckodriver,
/// msedgedriver or a Selenium server.
pub struct WebDriver {
    client: Client,
    base: Url,
    session: String,
}

fn capabilities(cfg: &Config) -> Value {
    let mut always = json!({ "browserName": cfg.browser.capability_name() });
    let (w, h) = cfg.resolution;
    let size = format!("--window-size={w},{h}");
    match cfg.browser {
        BrowserKind::Chrome | BrowserKind::Edge => {
            let mut args = vec![size];
            if cfg.headless {
                args.push("--headless=new".to_string());
            }
            let key = if cfg.browser == BrowserKind::Chrome {
                "goog:chromeOptions"
            } else {
                "ms:edgeOptions"
            };
            always[key] = json!({ "args": args });
        }
        BrowserKind::Firefox => {
            let args: Vec<&str> = if cfg.headless { vec!["-headless"] } else { vec![] };
            always["moz:firefoxOptions"] = json!({ "args": args });
        }
    }
    json!({ "capabilities": { "alwaysMatch": always } })
}

impl WebDriver {
    pub fn connect(cfg: &Config) -> Result<Self> {
        let base = Url::parse(cfg.webdriver_url.trim_end_matches('/'))
            .with_context(|| format!("invalid webdriver url '{}'", cfg.webdriver_url))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.wait_timeout_secs.max(30)))
            .build()?;
        let mut driver = Self {
            client,
            base,
            session: String::new(),
        };
        let created = driver
            .call(Method::POST, "session", Some(capabilities(cfg)))
            .with_context(|| format!("cannot start a browser session at {}", cfg.webdriver_url))?;
        driver.session = created
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("webdriver did not return a session id"))?
            .to_string();
        info!(session = %driver.session, "browser session started");

        let (w, h) = cfg.resolution;
        driver.set_window_size(w, h)?;
        Ok(driver)
    }

    fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}/{}", self.base.as_str().trim_end_matches('/'), path);
        debug!("webdriver {method} {path}");
        let mut req = self.client.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().map_err(|e| anyhow!("E_WEBDRIVER: {e}"))?;
        let status = resp.status();
        let payload: Value = resp
            .json()
            .map_err(|e| anyhow!("E_WEBDRIVER_JSON: {e}"))?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);
        if !status.is_success() {
            let kind = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
            let message = value.get("message").and_then(Value::as_str).unwrap_or("");
            bail!("{kind}: {}", message.lines().next().unwrap_or(""));
        }
        Ok(value)
    }

    fn session_call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let full = format!("session/{}/{}", self.session, path);
        self.call(method, &full, body)
    }

    fn find_all(&self, selector: &str) -> Result<Vec<String>> {
        let found = self.session_call(
            Method::POST,
            "elements",
            Some(json!({ "using": "css selector", "value": selector })),
        )?;
        Ok(found
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|el| el.get(ELEMENT_KEY).and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn find(&self, selector: &str) -> Result<String> {
        self.find_all(selector)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no element matches selector '{selector}'"))
    }

    fn poll(&mut self, timeout: Duration, mut ready: impl FnMut(&mut Self) -> Result<bool>) -> Result<bool> {
        let start = Instant::now();
        loop {
            if ready(self)? {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                return Ok(false);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Browser for WebDriver {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.session_call(Method::POST, "url", Some(json!({ "url": url })))?;
        Ok(())
    }

    fn current_url(&mut self) -> Result<String> {
        let v = self.session_call(Method::GET, "url", None)?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    fn title(&mut self) -> Result<String> {
        let v = self.session_call(Method::GET, "title", None)?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    fn back(&mut self) -> Result<()> {
        self.session_call(Method::POST, "back", Some(json!({})))?;
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.session_call(Method::POST, "refresh", Some(json!({})))?;
        Ok(())
    }

    fn count_elements(&mut self, selector: &str) -> Result<usize> {
        Ok(self.find_all(selector)?.len())
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        let el = self.find(selector)?;
        self.session_call(Method::POST, &format!("element/{el}/click"), Some(json!({})))?;
        Ok(())
    }

    fn send_keys(&mut self, selector: &str, text: &str) -> Result<()> {
        let el = self.find(selector)?;
        self.session_call(
            Method::POST,
            &format!("element/{el}/value"),
            Some(json!({ "text": text })),
        )?;
        Ok(())
    }

    fn hover(&mut self, selector: &str) -> Result<()> {
        let el = self.find(selector)?;
        let actions = json!({
            "actions": [{
                "type": "pointer",
                "id": "mouse",
                "parameters": { "pointerType": "mouse" },
                "actions": [{
                    "type": "pointerMove",
                    "duration": 0,
                    "origin": { ELEMENT_KEY: el },
                    "x": 0,
                    "y": 0
                }]
            }]
        });
        self.session_call(Method::POST, "actions", Some(actions))?;
        Ok(())
    }

    fn scroll_to(&mut self, selector: &str) -> Result<()> {
        let el = self.find(selector)?;
        self.execute_script(
            "arguments[0].scrollIntoView();",
            vec![json!({ ELEMENT_KEY: el })],
        )?;
        Ok(())
    }

    fn attribute(&mut self, selector: &str, name: &str) -> Result<Option<String>> {
        let el = self.find(selector)?;
        let v = self.session_call(Method::GET, &format!("element/{el}/attribute/{name}"), None)?;
        Ok(v.as_str().map(str::to_string))
    }

    fn execute_script(&mut self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.session_call(
            Method::POST,
            "execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
    }

    fn execute_async_script(&mut self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.session_call(
            Method::POST,
            "execute/async",
            Some(json!({ "script": script, "args": args })),
        )
    }

    fn set_window_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.session_call(
            Method::POST,
            "window/rect",
            Some(json!({ "width": width, "height": height })),
        )?;
        Ok(())
    }

    fn fit_window_to_content(&mut self) -> Result<()> {
        let dims = self.execute_script(CONTENT_SIZE_SCRIPT, vec![])?;
        let nth = |i: usize| dims.get(i).and_then(Value::as_u64).unwrap_or(0) as u32;
        let (w, h) = (nth(0) + nth(2), nth(1) + nth(3));
        if w == 0 || h == 0 {
            bail!("cannot measure the page content");
        }
        self.set_window_size(w, h)
    }

    fn screenshot(&mut self, path: &Path, selector: Option<&str>) -> Result<()> {
        let encoded = match selector {
            Some(sel) => {
                let el = self.find(sel)?;
                self.session_call(Method::GET, &format!("element/{el}/screenshot"), None)?
            }
            None => self.session_call(Method::GET, "screenshot", None)?,
        };
        let encoded = encoded
            .as_str()
            .ok_or_else(|| anyhow!("webdriver returned no screenshot data"))?;
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)
            .with_context(|| format!("cannot write screenshot '{}'", path.display()))
    }

    fn add_cookie(&mut self, cookie: &Value) -> Result<()> {
        self.session_call(Method::POST, "cookie", Some(json!({ "cookie": cookie })))?;
        Ok(())
    }

    fn switch_frame(&mut self, selector: Option<&str>) -> Result<()> {
        let id = match selector {
            Some(sel) => json!({ ELEMENT_KEY: self.find(sel)? }),
            None => Value::Null,
        };
        self.session_call(Method::POST, "frame", Some(json!({ "id": id })))?;
        Ok(())
    }

    fn wait_loaded(&mut self, timeout: Duration) -> Result<()> {
        let done = self.poll(timeout, |d| {
            Ok(d.execute_script(READY_SCRIPT, vec![])?.as_bool().unwrap_or(false))
        })?;
        if !done {
            bail!("page did not finish loading within {}s", timeout.as_secs());
        }
        Ok(())
    }

    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let found = self.poll(timeout, |d| Ok(d.count_elements(selector)? > 0))?;
        if !found {
            bail!("timed out after {}s waiting for '{selector}'", timeout.as_secs());
        }
        Ok(())
    }

    fn quit(&mut self) -> Result<()> {
        if self.session.is_empty() {
            return Ok(());
        }
        self.call(Method::DELETE, &format!("session/{}", self.session), None)?;
        self.session.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_capabilities_carry_headless_and_size() {
        let cfg = Config::default();
        let caps = capabilities(&cfg);
        let always = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(always["browserName"], "chrome");
        let args = always["goog:chromeOptions"]["args"].as_array().cloned().unwrap_or_default();
        assert!(args.contains(&json!("--headless=new")));
        assert!(args.contains(&json!("--window-size=1920,1080")));
    }

    #[test]
    fn firefox_uses_its_own_options_key() {
        let cfg = Config {
            browser: BrowserKind::Firefox,
            headless: false,
            ..Config::default()
        };
        let caps = capabilities(&cfg);
        let always = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(always["browserName"], "firefox");
        assert_eq!(always["moz:firefoxOptions"]["args"], json!([]));
    }
}
