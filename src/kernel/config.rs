use std::path::{Path, PathBuf};

use tracing::warn;

use crate::router::DEFAULT_MAX_INCLUDE_DEPTH;

pub const CONFIG_FILE_NAME: &str = ".a11ycheck.toml";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrowserKind {
    Chrome,
    Edge,
    Firefox,
}

impl BrowserKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "chrome" | "chromium" => Some(Self::Chrome),
            "edge" | "msedge" => Some(Self::Edge),
            "firefox" | "gecko" => Some(Self::Firefox),
            _ => None,
        }
    }

    /// W3C `browserName` capability.
    pub fn capability_name(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Edge => "MicrosoftEdge",
            Self::Firefox => "firefox",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Abort the run on the first failing action.
    pub debug: bool,
    pub max_include_depth: usize,
    pub browser: BrowserKind,
    pub headless: bool,
    pub webdriver_url: String,
    pub output: PathBuf,
    pub resolution: (u32, u32),
    /// Visited before anything else when set.
    pub login: Option<String>,
    pub json: bool,
    pub wait_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            browser: BrowserKind::Chrome,
            headless: true,
            webdriver_url: "http://localhost:4444".to_string(),
            output: PathBuf::from("output"),
            resolution: (1920, 1080),
            login: None,
            json: true,
            wait_timeout_secs: 10,
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// `1280x720` or `1280,720`.
pub fn parse_resolution(v: &str) -> Option<(u32, u32)> {
    let (w, h) = v.trim().split_once(['x', 'X', ','])?;
    let w = w.trim().parse().ok()?;
    let h = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

fn apply_toml(cfg: &mut Config, val: &toml::Value) {
    let get = |table: &str, key: &str| val.get(table).and_then(|t| t.get(key));

    // run.debug (bool)
    if let Some(b) = get("run", "debug").and_then(|v| v.as_bool()) {
        cfg.debug = b;
    }
    // run.max_include_depth (usize)
    if let Some(n) = get("run", "max_include_depth").and_then(|v| v.as_integer())
        && n > 0
    {
        cfg.max_include_depth = n as usize;
    }
    // run.wait_timeout_secs (u64)
    if let Some(n) = get("run", "wait_timeout_secs").and_then(|v| v.as_integer())
        && n >= 0
    {
        cfg.wait_timeout_secs = n as u64;
    }
    // run.login (string)
    if let Some(s) = get("run", "login").and_then(|v| v.as_str()) {
        cfg.login = Some(s.to_string()).filter(|s| !s.trim().is_empty());
    }
    // browser.kind (string)
    if let Some(s) = get("browser", "kind").and_then(|v| v.as_str()) {
        match BrowserKind::parse(s) {
            Some(kind) => cfg.browser = kind,
            None => warn!("unknown browser '{s}' in config; keeping {:?}", cfg.browser),
        }
    }
    // browser.headless (bool)
    if let Some(b) = get("browser", "headless").and_then(|v| v.as_bool()) {
        cfg.headless = b;
    }
    // browser.webdriver_url (string)
    if let Some(s) = get("browser", "webdriver_url").and_then(|v| v.as_str()) {
        cfg.webdriver_url = s.to_string();
    }
    // browser.resolution ("WxH")
    if let Some(s) = get("browser", "resolution").and_then(|v| v.as_str()) {
        match parse_resolution(s) {
            Some(res) => cfg.resolution = res,
            None => warn!("invalid resolution '{s}' in config"),
        }
    }
    // output.dir (string)
    if let Some(s) = get("output", "dir").and_then(|v| v.as_str()) {
        cfg.output = PathBuf::from(s);
    }
    // output.json (bool)
    if let Some(b) = get("output", "json").and_then(|v| v.as_bool()) {
        cfg.json = b;
    }
}

fn read_toml(path: &Path) -> Option<toml::Value> {
    let s = std::fs::read_to_string(path).ok()?;
    match s.parse::<toml::Value>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("ignoring '{}': {e}", path.display());
            None
        }
    }
}

pub fn load(root: Option<&Path>) -> Config {
    load_with(root, |key| std::env::var(key).ok())
}

/// Defaults, then the user-wide config, then `.a11ycheck.toml` under `root`,
/// then `A11YCHECK_*` variables read through `env`.
pub fn load_with(root: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Config {
    let mut cfg = Config::default();

    if let Some(dir) = dirs::config_dir()
        && let Some(val) = read_toml(&dir.join("a11ycheck").join("config.toml"))
    {
        apply_toml(&mut cfg, &val);
    }

    if let Some(root) = root
        && let Some(val) = read_toml(&root.join(CONFIG_FILE_NAME))
    {
        apply_toml(&mut cfg, &val);
    }

    // Env overrides
    if let Some(b) = env("A11YCHECK_DEBUG").as_deref().and_then(parse_bool) {
        cfg.debug = b;
    }
    if let Some(n) = env("A11YCHECK_MAX_INCLUDE_DEPTH").and_then(|v| v.trim().parse::<usize>().ok())
        && n > 0
    {
        cfg.max_include_depth = n;
    }
    if let Some(url) = env("A11YCHECK_WEBDRIVER_URL").filter(|s| !s.trim().is_empty()) {
        cfg.webdriver_url = url;
    }
    if let Some(dir) = env("A11YCHECK_OUTPUT").filter(|s| !s.trim().is_empty()) {
        cfg.output = PathBuf::from(dir);
    }
    if let Some(kind) = env("A11YCHECK_BROWSER").as_deref().and_then(BrowserKind::parse) {
        cfg.browser = kind;
    }
    if let Some(b) = env("A11YCHECK_HEADLESS").as_deref().and_then(parse_bool) {
        cfg.headless = b;
    }

    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn toml_overrides_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
[run]
debug = true
max_include_depth = 3
login = "https://example.com/login"

[browser]
kind = "firefox"
resolution = "1280x720"

[output]
dir = "reports"
json = false
"#,
        )?;
        let cfg = load_with(Some(dir.path()), no_env);
        assert!(cfg.debug);
        assert_eq!(cfg.max_include_depth, 3);
        assert_eq!(cfg.browser, BrowserKind::Firefox);
        assert_eq!(cfg.resolution, (1280, 720));
        assert_eq!(cfg.output, PathBuf::from("reports"));
        assert!(!cfg.json);
        assert_eq!(cfg.login.as_deref(), Some("https://example.com/login"));
        Ok(())
    }

    #[test]
    fn env_wins_over_toml() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[run]\ndebug = true\nmax_include_depth = 3\n",
        )?;
        let env: HashMap<&str, &str> = HashMap::from([
            ("A11YCHECK_DEBUG", "no"),
            ("A11YCHECK_MAX_INCLUDE_DEPTH", "7"),
            ("A11YCHECK_BROWSER", "edge"),
            ("A11YCHECK_HEADLESS", "0"),
        ]);
        let cfg = load_with(Some(dir.path()), |k| env.get(k).map(|v| v.to_string()));
        assert!(!cfg.debug);
        assert_eq!(cfg.max_include_depth, 7);
        assert_eq!(cfg.browser, BrowserKind::Edge);
        assert!(!cfg.headless);
        Ok(())
    }

    #[test]
    fn bad_values_are_ignored() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[run\nbroken")?;
        let env: HashMap<&str, &str> = HashMap::from([("A11YCHECK_MAX_INCLUDE_DEPTH", "0")]);
        let cfg = load_with(Some(dir.path()), |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.max_include_depth, DEFAULT_MAX_INCLUDE_DEPTH);
        Ok(())
    }

    #[test]
    fn resolution_forms() {
        assert_eq!(parse_resolution("1920x1080"), Some((1920, 1080)));
        assert_eq!(parse_resolution(" 375 , 667 "), Some((375, 667)));
        assert_eq!(parse_resolution("0x10"), None);
        assert_eq!(parse_resolution("wide"), None);
    }
}
