use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::driver::{self, Browser};
use crate::kernel::ast::Action;
use crate::kernel::config::Config;
use crate::kernel::context::Context;
use crate::kernel::packet_catalog::ActionRegistry;
use crate::kernel::runtime::{Runtime, TraceEntry};
use crate::router;

/// Inputs with this prefix name a script file; anything else is a URL.
pub const SCRIPT_PREFIX: &str = "config:";
pub const RESULTS_FILE: &str = "actions_results.json";

/// Turns command-line inputs into one program. Each script file gets its own
/// parse session.
pub fn parse_inputs(inputs: &[String], max_include_depth: usize) -> Vec<Action> {
    let mut actions = Vec::new();
    for input in inputs {
        match input.strip_prefix(SCRIPT_PREFIX) {
            Some(path) => {
                info!("reading actions from '{path}'");
                actions.extend(router::parse_script_file(Path::new(path.trim()), max_include_depth));
            }
            None => actions.push(Action::Url {
                target: input.trim().to_string(),
            }),
        }
    }
    actions
}

/// Directory of the first script input, used to find `.a11ycheck.toml`.
pub fn config_root(inputs: &[String]) -> Option<PathBuf> {
    inputs
        .iter()
        .find_map(|i| i.strip_prefix(SCRIPT_PREFIX))
        .and_then(|p| Path::new(p.trim()).parent().map(Path::to_path_buf))
        .filter(|p| !p.as_os_str().is_empty())
}

/// Seeds the variable store from a JSON, YAML or TOML file.
pub fn load_vars(path: &Path) -> Result<Context> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read '{}'", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let value: Value = match ext.as_str() {
        "json" => serde_json::from_str(&text)?,
        "yaml" | "yml" => serde_yaml::from_str(&text)?,
        "toml" => toml::from_str(&text)?,
        other => bail!("unsupported variables file type '{other}' (use json, yaml or toml)"),
    };
    Context::from_json(value).with_context(|| format!("in '{}'", path.display()))
}

#[derive(Debug)]
pub struct RunReport {
    pub base_url: String,
    pub trace: Vec<TraceEntry>,
    pub results_file: Option<PathBuf>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.trace
            .iter()
            .filter(|e| matches!(e.outcome, crate::kernel::Outcome::Failed(_)))
            .count()
    }
}

pub fn results_json(base_url: &str, trace: &[TraceEntry]) -> Value {
    let entries: Vec<Value> = trace
        .iter()
        .filter(|e| e.is_reportable())
        .map(TraceEntry::to_json)
        .collect();
    json!({
        "timestamp": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        "base_url": base_url,
        "total_inputs": entries.len(),
        "inputs": entries,
    })
}

/// Logs in if configured, runs the program and writes the results file.
pub fn check_run(
    cfg: &Config,
    registry: &ActionRegistry,
    browser: &mut dyn Browser,
    actions: &[Action],
    ctx: &mut Context,
) -> Result<RunReport> {
    let screenshots = cfg.output.join("screenshots");
    fs::create_dir_all(&screenshots)
        .with_context(|| format!("cannot create '{}'", screenshots.display()))?;

    if let Some(login) = &cfg.login {
        info!("logging in via {login}");
        driver::open(browser, login, Duration::from_secs(cfg.wait_timeout_secs))?;
    }
    let current = browser.current_url()?;
    let base_url = driver::origin(&current).unwrap_or(current);
    debug!("base url: {base_url}");

    info!("running {} action(s)", actions.len());
    let trace = Runtime::new(registry, cfg, browser).run(actions, ctx)?;

    let results_file = if cfg.json {
        let path = cfg.output.join(RESULTS_FILE);
        let body = serde_json::to_string_pretty(&results_json(&base_url, &trace))?;
        fs::write(&path, body).with_context(|| format!("cannot write '{}'", path.display()))?;
        info!("results written to {}", path.display());
        Some(path)
    } else {
        None
    };

    Ok(RunReport {
        base_url,
        trace,
        results_file,
    })
}
